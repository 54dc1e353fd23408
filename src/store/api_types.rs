//! Serde-deserializable types matching store API responses.
//!
//! The backend has accumulated several naming conventions over time
//! (`sellingPrice` next to `selling_price`, numbers sent as strings, numeric
//! ids). These wire types accept all of them and are converted into the
//! canonical types in `types.rs` exactly once, when a response is decoded.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use super::types::{
  ActiveStatus, Invoice, InvoiceLine, InvoiceStatus, Part, Supplier, Transaction,
  TransactionKind, TransactionStatus,
};

/// Decode a JSON body into the canonical record type via its wire type.
pub fn decode_list<W, R>(body: &str) -> serde_json::Result<Vec<R>>
where
  W: DeserializeOwned + Into<R>,
{
  let list: ApiList<W> = serde_json::from_str(body)?;
  Ok(list.into_vec().into_iter().map(Into::into).collect())
}

/// Decode a single record, accepting a bare object or a `{"data": {...}}` envelope.
pub fn decode_one<W, R>(body: &str) -> serde_json::Result<R>
where
  W: DeserializeOwned + Into<R>,
{
  let one: ApiOne<W> = serde_json::from_str(body)?;
  Ok(one.into_inner().into())
}

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiList<T> {
  Bare(Vec<T>),
  Envelope {
    #[serde(alias = "items", alias = "results")]
    data: Vec<T>,
  },
}

impl<T> ApiList<T> {
  pub fn into_vec(self) -> Vec<T> {
    match self {
      ApiList::Bare(items) => items,
      ApiList::Envelope { data } => data,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiOne<T> {
  Envelope { data: T },
  Bare(T),
}

impl<T> ApiOne<T> {
  pub fn into_inner(self) -> T {
    match self {
      ApiOne::Envelope { data } => data,
      ApiOne::Bare(item) => item,
    }
  }
}

// ============================================================================
// Lenient field helpers
// ============================================================================

/// Ids arrive as strings or numbers.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "expected string or number id, got {}",
      other
    ))),
  }
}

/// Numbers arrive as numbers, numeric strings, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.and_then(|v| match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }))
}

/// Optional ids that may be numeric.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.and_then(|v| match v {
    Value::String(s) if !s.is_empty() => Some(s),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }))
}

/// Parse `YYYY-MM-DD`, ignoring any time part that follows.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  s.get(..10)
    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Parse an RFC 3339 timestamp, or a bare date taken as midnight UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s.trim())
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
    .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN).and_utc()))
}

fn non_empty(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn whole_quantity(q: Option<f64>) -> u32 {
  // Negative stock counts from manual adjustments are treated as empty shelves.
  q.map(|q| q.max(0.0).round() as u32).unwrap_or(0)
}

fn archived_flag(status: Option<&str>, is_active: Option<bool>) -> ActiveStatus {
  match status.map(|s| s.trim().to_lowercase()) {
    Some(s) if matches!(s.as_str(), "inactive" | "archived" | "deleted" | "disabled") => {
      ActiveStatus::Inactive
    }
    Some(s) if s == "active" => ActiveStatus::Active,
    _ => match is_active {
      Some(false) => ActiveStatus::Inactive,
      _ => ActiveStatus::Active,
    },
  }
}

// ============================================================================
// Parts
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPart {
  #[serde(alias = "_id", deserialize_with = "id_string")]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default, alias = "sku")]
  pub part_number: Option<String>,
  #[serde(default, rename = "part_number")]
  pub part_number_snake: Option<String>,
  #[serde(default)]
  pub brand: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default, alias = "stock", alias = "qty", deserialize_with = "lenient_f64")]
  pub quantity: Option<f64>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub reorder_level: Option<f64>,
  #[serde(default, rename = "reorder_level", deserialize_with = "lenient_f64")]
  pub reorder_level_snake: Option<f64>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub min_stock: Option<f64>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub cost_price: Option<f64>,
  #[serde(default, rename = "cost_price", deserialize_with = "lenient_f64")]
  pub cost_price_snake: Option<f64>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub selling_price: Option<f64>,
  #[serde(default, rename = "selling_price", deserialize_with = "lenient_f64")]
  pub selling_price_snake: Option<f64>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub price: Option<f64>,
  #[serde(default, alias = "supplier_id", deserialize_with = "lenient_id")]
  pub supplier_id: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default, alias = "is_active")]
  pub is_active: Option<bool>,
  #[serde(default, alias = "created_at")]
  pub created_at: Option<String>,
  #[serde(default, alias = "updated_at")]
  pub updated_at: Option<String>,
}

impl From<ApiPart> for Part {
  fn from(api: ApiPart) -> Self {
    Part {
      status: archived_flag(api.status.as_deref(), api.is_active),
      id: api.id,
      name: api.name.trim().to_string(),
      part_number: non_empty(api.part_number.or(api.part_number_snake)).unwrap_or_default(),
      brand: non_empty(api.brand),
      category: non_empty(api.category),
      location: non_empty(api.location),
      quantity: whole_quantity(api.quantity),
      reorder_level: api
        .reorder_level
        .or(api.reorder_level_snake)
        .or(api.min_stock)
        .map(|r| whole_quantity(Some(r))),
      cost_price: api.cost_price.or(api.cost_price_snake).unwrap_or(0.0),
      selling_price: api
        .selling_price
        .or(api.selling_price_snake)
        .or(api.price)
        .unwrap_or(0.0),
      supplier_id: api.supplier_id,
      created_at: api.created_at.as_deref().and_then(parse_timestamp),
      updated_at: api.updated_at.as_deref().and_then(parse_timestamp),
    }
  }
}

// ============================================================================
// Invoices
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInvoiceLine {
  #[serde(default, alias = "part_id", deserialize_with = "lenient_id")]
  pub part_id: Option<String>,
  #[serde(default, alias = "name", alias = "partName")]
  pub description: Option<String>,
  #[serde(default, alias = "qty", deserialize_with = "lenient_f64")]
  pub quantity: Option<f64>,
  #[serde(default, alias = "unit_price", alias = "price", deserialize_with = "lenient_f64")]
  pub unit_price: Option<f64>,
  #[serde(default, alias = "unit_cost", alias = "costPrice", deserialize_with = "lenient_f64")]
  pub unit_cost: Option<f64>,
}

impl From<ApiInvoiceLine> for InvoiceLine {
  fn from(api: ApiInvoiceLine) -> Self {
    InvoiceLine {
      part_id: api.part_id,
      description: non_empty(api.description).unwrap_or_default(),
      quantity: api.quantity.unwrap_or(1.0),
      unit_price: api.unit_price.unwrap_or(0.0),
      unit_cost: api.unit_cost,
    }
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInvoice {
  #[serde(alias = "_id", deserialize_with = "id_string")]
  pub id: String,
  #[serde(default, alias = "invoice_number", alias = "number")]
  pub invoice_number: Option<String>,
  #[serde(default, alias = "customer_name", alias = "customer")]
  pub customer_name: Option<String>,
  #[serde(default, alias = "customer_phone")]
  pub customer_phone: Option<String>,
  #[serde(default, alias = "items", alias = "lineItems")]
  pub lines: Vec<ApiInvoiceLine>,
  #[serde(default, alias = "totalAmount", alias = "total_amount", deserialize_with = "lenient_f64")]
  pub total: Option<f64>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default, alias = "issue_date", alias = "date")]
  pub issue_date: Option<String>,
  #[serde(default, alias = "due_date")]
  pub due_date: Option<String>,
  #[serde(default, alias = "paid_at", alias = "paidDate")]
  pub paid_at: Option<String>,
  #[serde(default, alias = "created_at")]
  pub created_at: Option<String>,
}

impl From<ApiInvoice> for Invoice {
  fn from(api: ApiInvoice) -> Self {
    let paid_at = api.paid_at.as_deref().and_then(parse_timestamp);
    let created_at = api.created_at.as_deref().and_then(parse_timestamp);
    let status = api
      .status
      .as_deref()
      .and_then(|s| s.parse::<InvoiceStatus>().ok())
      .unwrap_or(if paid_at.is_some() {
        InvoiceStatus::Paid
      } else {
        InvoiceStatus::Draft
      });
    let lines: Vec<InvoiceLine> = api.lines.into_iter().map(InvoiceLine::from).collect();
    let total = api
      .total
      .unwrap_or_else(|| lines.iter().map(InvoiceLine::amount).sum());
    // Records without an issue date fall back to their creation date, then the epoch.
    let issue_date = api
      .issue_date
      .as_deref()
      .and_then(parse_date)
      .or_else(|| created_at.map(|c| c.date_naive()))
      .unwrap_or_default();

    Invoice {
      invoice_number: non_empty(api.invoice_number).unwrap_or_else(|| api.id.clone()),
      id: api.id,
      customer_name: non_empty(api.customer_name).unwrap_or_default(),
      customer_phone: non_empty(api.customer_phone),
      lines,
      total,
      status,
      issue_date,
      due_date: api.due_date.as_deref().and_then(parse_date),
      paid_at,
      created_at,
    }
  }
}

// ============================================================================
// Suppliers
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSupplier {
  #[serde(alias = "_id", deserialize_with = "id_string")]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default, alias = "contact_person", alias = "contactName")]
  pub contact_person: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default, alias = "is_active")]
  pub is_active: Option<bool>,
  #[serde(default, alias = "created_at")]
  pub created_at: Option<String>,
}

impl From<ApiSupplier> for Supplier {
  fn from(api: ApiSupplier) -> Self {
    Supplier {
      status: archived_flag(api.status.as_deref(), api.is_active),
      id: api.id,
      name: api.name.trim().to_string(),
      contact_person: non_empty(api.contact_person),
      phone: non_empty(api.phone),
      email: non_empty(api.email),
      created_at: api.created_at.as_deref().and_then(parse_timestamp),
    }
  }
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTransaction {
  #[serde(alias = "_id", deserialize_with = "id_string")]
  pub id: String,
  #[serde(default, rename = "type", alias = "kind")]
  pub kind: Option<String>,
  #[serde(default, deserialize_with = "lenient_f64")]
  pub amount: Option<f64>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default, alias = "note")]
  pub description: Option<String>,
  #[serde(default, alias = "invoiceId", alias = "invoice_id")]
  pub reference: Option<String>,
  #[serde(default, alias = "created_at", alias = "createdAt")]
  pub date: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
}

impl From<ApiTransaction> for Transaction {
  fn from(api: ApiTransaction) -> Self {
    let amount = api.amount.unwrap_or(0.0);
    let kind = match api.kind.as_deref().map(|k| k.trim().to_lowercase()) {
      Some(k) if matches!(k.as_str(), "expense" | "purchase" | "debit") => TransactionKind::Expense,
      Some(k) if matches!(k.as_str(), "income" | "sale" | "credit") => TransactionKind::Income,
      _ if amount < 0.0 => TransactionKind::Expense,
      _ => TransactionKind::Income,
    };
    let status = match api.status.as_deref().map(|s| s.trim().to_lowercase()) {
      Some(s) if matches!(s.as_str(), "voided" | "void" | "cancelled") => TransactionStatus::Voided,
      _ => TransactionStatus::Posted,
    };

    Transaction {
      id: api.id,
      kind,
      amount: amount.abs(),
      category: non_empty(api.category),
      description: non_empty(api.description).unwrap_or_default(),
      reference: non_empty(api.reference),
      date: api.date.as_deref().and_then(parse_date).unwrap_or_default(),
      status,
    }
  }
}
