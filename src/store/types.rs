//! Canonical record types.
//!
//! These are produced once at the fetch boundary (see `api_types`) and are the
//! only shape the rest of the crate reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reorder threshold used when a part doesn't carry its own.
pub const DEFAULT_REORDER_LEVEL: u32 = 10;

/// Days ahead of the due date an invoice counts as "due soon".
pub const DUE_SOON_DAYS: i64 = 7;

/// Status of records that can be archived and restored (parts, suppliers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveStatus {
  #[default]
  Active,
  Inactive,
}

impl ActiveStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ActiveStatus::Active => "active",
      ActiveStatus::Inactive => "inactive",
    }
  }
}

/// Inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
  pub id: String,
  pub name: String,
  pub part_number: String,
  pub brand: Option<String>,
  pub category: Option<String>,
  /// Shelf/bin location
  pub location: Option<String>,
  pub quantity: u32,
  pub reorder_level: Option<u32>,
  pub cost_price: f64,
  pub selling_price: f64,
  pub supplier_id: Option<String>,
  pub status: ActiveStatus,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Stock level bucket relative to a part's reorder threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
  OutOfStock,
  Low,
  InStock,
}

impl Part {
  /// Minimal active part, mostly useful for fixtures.
  pub fn new(id: String, name: String, quantity: u32) -> Self {
    Self {
      id,
      name,
      part_number: String::new(),
      brand: None,
      category: None,
      location: None,
      quantity,
      reorder_level: None,
      cost_price: 0.0,
      selling_price: 0.0,
      supplier_id: None,
      status: ActiveStatus::Active,
      created_at: None,
      updated_at: None,
    }
  }

  pub fn reorder_threshold(&self) -> u32 {
    self.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL)
  }

  pub fn stock_level(&self) -> StockLevel {
    if self.quantity == 0 {
      StockLevel::OutOfStock
    } else if self.quantity <= self.reorder_threshold() {
      StockLevel::Low
    } else {
      StockLevel::InStock
    }
  }

  /// Value of stock on hand at cost
  pub fn stock_value(&self) -> f64 {
    self.quantity as f64 * self.cost_price
  }
}

/// Stored invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
  #[default]
  Draft,
  Sent,
  Paid,
  Cancelled,
}

impl InvoiceStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      InvoiceStatus::Draft => "draft",
      InvoiceStatus::Sent => "sent",
      InvoiceStatus::Paid => "paid",
      InvoiceStatus::Cancelled => "cancelled",
    }
  }
}

impl std::str::FromStr for InvoiceStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "draft" => Ok(InvoiceStatus::Draft),
      "sent" | "pending" | "unpaid" => Ok(InvoiceStatus::Sent),
      "paid" => Ok(InvoiceStatus::Paid),
      "cancelled" | "canceled" | "void" => Ok(InvoiceStatus::Cancelled),
      other => Err(format!("unknown invoice status '{}'", other)),
    }
  }
}

/// Status shown to users; `Overdue` is derived and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
  Draft,
  Sent,
  Overdue,
  Paid,
  Cancelled,
}

impl DisplayStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      DisplayStatus::Draft => "draft",
      DisplayStatus::Sent => "sent",
      DisplayStatus::Overdue => "overdue",
      DisplayStatus::Paid => "paid",
      DisplayStatus::Cancelled => "cancelled",
    }
  }
}

/// One billed line on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
  pub part_id: Option<String>,
  pub description: String,
  pub quantity: f64,
  pub unit_price: f64,
  /// Cost recorded on the line itself, used when the part is unknown
  pub unit_cost: Option<f64>,
}

impl InvoiceLine {
  pub fn amount(&self) -> f64 {
    self.quantity * self.unit_price
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
  pub id: String,
  pub invoice_number: String,
  pub customer_name: String,
  pub customer_phone: Option<String>,
  pub lines: Vec<InvoiceLine>,
  pub total: f64,
  pub status: InvoiceStatus,
  pub issue_date: NaiveDate,
  pub due_date: Option<NaiveDate>,
  pub paid_at: Option<DateTime<Utc>>,
  pub created_at: Option<DateTime<Utc>>,
}

impl Invoice {
  /// Status as of `as_of`: a sent invoice past its due date is overdue.
  pub fn display_status(&self, as_of: NaiveDate) -> DisplayStatus {
    match self.status {
      InvoiceStatus::Draft => DisplayStatus::Draft,
      InvoiceStatus::Paid => DisplayStatus::Paid,
      InvoiceStatus::Cancelled => DisplayStatus::Cancelled,
      InvoiceStatus::Sent => match self.due_date {
        Some(due) if due < as_of => DisplayStatus::Overdue,
        _ => DisplayStatus::Sent,
      },
    }
  }

  /// Sent, not overdue, and due within [`DUE_SOON_DAYS`] of `as_of`.
  pub fn is_due_soon(&self, as_of: NaiveDate) -> bool {
    match (self.status, self.due_date) {
      (InvoiceStatus::Sent, Some(due)) => {
        due >= as_of && (due - as_of).num_days() <= DUE_SOON_DAYS
      }
      _ => false,
    }
  }

  /// Sum of line amounts
  pub fn lines_total(&self) -> f64 {
    self.lines.iter().map(InvoiceLine::amount).sum()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
  pub id: String,
  pub name: String,
  pub contact_person: Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub status: ActiveStatus,
  pub created_at: Option<DateTime<Utc>>,
}

/// Direction of a cash-flow entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Income,
  Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
  #[default]
  Posted,
  Voided,
}

/// Cash-flow entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  pub id: String,
  pub kind: TransactionKind,
  /// Always non-negative; `kind` carries the sign
  pub amount: f64,
  pub category: Option<String>,
  pub description: String,
  pub reference: Option<String>,
  pub date: NaiveDate,
  pub status: TransactionStatus,
}
