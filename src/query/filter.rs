use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Debug;
use std::str::FromStr;

use crate::cache::Record;
use crate::store::types::{
  DisplayStatus, Invoice, InvoiceStatus, Part, StockLevel, Transaction, TransactionKind,
};

/// Named predicate selecting a business-meaningful subset of records.
///
/// Predicates must be total: a record missing the field a predicate looks at
/// is judged against a documented default, never rejected with an error.
pub trait CategoryFilter<R>: Clone + Debug + PartialEq + Serialize {
  /// Human-readable label, also the name accepted on the command line
  fn label(&self) -> &'static str;

  /// True for the "all" sentinel, which keeps every record
  fn is_all(&self) -> bool;

  fn matches(&self, record: &R) -> bool;
}

/// Filter for collections that have no categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AllRecords;

impl<R: Record> CategoryFilter<R> for AllRecords {
  fn label(&self) -> &'static str {
    "all"
  }

  fn is_all(&self) -> bool {
    true
  }

  fn matches(&self, _record: &R) -> bool {
    true
  }
}

// ============================================================================
// Parts
// ============================================================================

/// Stock filter for parts. A missing reorder level counts as
/// [`crate::store::types::DEFAULT_REORDER_LEVEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartFilter {
  #[default]
  All,
  /// Quantity above the reorder threshold
  InStock,
  /// Quantity between 1 and the reorder threshold
  LowStock,
  OutOfStock,
}

impl PartFilter {
  pub fn all_variants() -> &'static [PartFilter] {
    &[
      PartFilter::All,
      PartFilter::InStock,
      PartFilter::LowStock,
      PartFilter::OutOfStock,
    ]
  }
}

impl CategoryFilter<Part> for PartFilter {
  fn label(&self) -> &'static str {
    match self {
      PartFilter::All => "all",
      PartFilter::InStock => "in-stock",
      PartFilter::LowStock => "low-stock",
      PartFilter::OutOfStock => "out-of-stock",
    }
  }

  fn is_all(&self) -> bool {
    matches!(self, PartFilter::All)
  }

  fn matches(&self, part: &Part) -> bool {
    match self {
      PartFilter::All => true,
      PartFilter::InStock => part.stock_level() == StockLevel::InStock,
      PartFilter::LowStock => part.stock_level() == StockLevel::Low,
      PartFilter::OutOfStock => part.stock_level() == StockLevel::OutOfStock,
    }
  }
}

impl FromStr for PartFilter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_lowercase();
    PartFilter::all_variants()
      .iter()
      .copied()
      .find(|f| CategoryFilter::<Part>::label(f) == wanted)
      .ok_or_else(|| format!("unknown part filter '{}' (all, in-stock, low-stock, out-of-stock)", s))
  }
}

// ============================================================================
// Invoices
// ============================================================================

/// Invoice filter. Date-dependent variants carry the day they are judged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvoiceFilter {
  #[default]
  All,
  /// Sent and not yet paid or cancelled, overdue included
  Outstanding,
  Overdue { as_of: NaiveDate },
  DueSoon { as_of: NaiveDate },
}

impl InvoiceFilter {
  /// Parse a filter name, anchoring date-dependent filters at `as_of`.
  pub fn parse(s: &str, as_of: NaiveDate) -> Result<Self, String> {
    match s.trim().to_lowercase().as_str() {
      "all" => Ok(InvoiceFilter::All),
      "outstanding" | "unpaid" => Ok(InvoiceFilter::Outstanding),
      "overdue" => Ok(InvoiceFilter::Overdue { as_of }),
      "due-soon" => Ok(InvoiceFilter::DueSoon { as_of }),
      _ => Err(format!(
        "unknown invoice filter '{}' (all, outstanding, overdue, due-soon)",
        s
      )),
    }
  }

  /// Stored status every match must have, if the filter implies one.
  ///
  /// Outstanding, overdue and due-soon invoices are all stored as sent, so a
  /// view using these filters has to browse the sent partition.
  pub fn implied_status(&self) -> Option<InvoiceStatus> {
    match self {
      InvoiceFilter::All => None,
      InvoiceFilter::Outstanding | InvoiceFilter::Overdue { .. } | InvoiceFilter::DueSoon { .. } => {
        Some(InvoiceStatus::Sent)
      }
    }
  }
}

impl CategoryFilter<Invoice> for InvoiceFilter {
  fn label(&self) -> &'static str {
    match self {
      InvoiceFilter::All => "all",
      InvoiceFilter::Outstanding => "outstanding",
      InvoiceFilter::Overdue { .. } => "overdue",
      InvoiceFilter::DueSoon { .. } => "due-soon",
    }
  }

  fn is_all(&self) -> bool {
    matches!(self, InvoiceFilter::All)
  }

  fn matches(&self, invoice: &Invoice) -> bool {
    match self {
      InvoiceFilter::All => true,
      InvoiceFilter::Outstanding => invoice.status == InvoiceStatus::Sent,
      InvoiceFilter::Overdue { as_of } => invoice.display_status(*as_of) == DisplayStatus::Overdue,
      InvoiceFilter::DueSoon { as_of } => invoice.is_due_soon(*as_of),
    }
  }
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionFilter {
  #[default]
  All,
  Income,
  Expense,
}

impl CategoryFilter<Transaction> for TransactionFilter {
  fn label(&self) -> &'static str {
    match self {
      TransactionFilter::All => "all",
      TransactionFilter::Income => "income",
      TransactionFilter::Expense => "expense",
    }
  }

  fn is_all(&self) -> bool {
    matches!(self, TransactionFilter::All)
  }

  fn matches(&self, tx: &Transaction) -> bool {
    match self {
      TransactionFilter::All => true,
      TransactionFilter::Income => tx.kind == TransactionKind::Income,
      TransactionFilter::Expense => tx.kind == TransactionKind::Expense,
    }
  }
}

impl FromStr for TransactionFilter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "all" => Ok(TransactionFilter::All),
      "income" => Ok(TransactionFilter::Income),
      "expense" | "expenses" => Ok(TransactionFilter::Expense),
      _ => Err(format!("unknown transaction filter '{}' (all, income, expense)", s)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn part(id: &str, quantity: u32, reorder_level: Option<u32>) -> Part {
    let mut part = Part::new(id.to_string(), format!("Part {}", id), quantity);
    part.reorder_level = reorder_level;
    part
  }

  #[test]
  fn test_part_filters_partition_by_stock_level() {
    let parts = vec![
      part("empty", 0, None),
      part("low", 10, None),
      part("ok", 11, None),
      part("own-threshold", 3, Some(2)),
    ];

    let ids = |filter: PartFilter| {
      parts
        .iter()
        .filter(|p| filter.matches(p))
        .map(|p| p.id.as_str())
        .collect::<Vec<_>>()
    };

    assert_eq!(ids(PartFilter::OutOfStock), vec!["empty"]);
    assert_eq!(ids(PartFilter::LowStock), vec!["low"]);
    assert_eq!(ids(PartFilter::InStock), vec!["ok", "own-threshold"]);
    assert_eq!(ids(PartFilter::All).len(), 4);
  }

  #[test]
  fn test_part_filter_round_trips_through_label() {
    for filter in PartFilter::all_variants() {
      let label = CategoryFilter::<Part>::label(filter);
      assert_eq!(label.parse::<PartFilter>().unwrap(), *filter);
    }
    assert!("cheap".parse::<PartFilter>().is_err());
  }

  #[test]
  fn test_invoice_filter_parse_anchors_date() {
    let as_of = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    assert_eq!(
      InvoiceFilter::parse("Overdue", as_of),
      Ok(InvoiceFilter::Overdue { as_of })
    );
    assert_eq!(
      InvoiceFilter::parse("unpaid", as_of),
      Ok(InvoiceFilter::Outstanding)
    );
    assert!(InvoiceFilter::parse("late", as_of).is_err());
  }

  #[test]
  fn test_invoice_filters_imply_sent_partition() {
    let as_of = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    assert_eq!(InvoiceFilter::All.implied_status(), None);
    for name in ["outstanding", "overdue", "due-soon"] {
      let filter = InvoiceFilter::parse(name, as_of).unwrap();
      assert_eq!(filter.implied_status(), Some(InvoiceStatus::Sent), "{}", name);
    }
  }

  #[test]
  fn test_all_records_keeps_everything() {
    let p = part("1", 0, None);
    assert!(CategoryFilter::<Part>::is_all(&AllRecords));
    assert!(AllRecords.matches(&p));
  }
}
