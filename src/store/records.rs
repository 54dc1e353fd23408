//! Record implementations for the shop's collections.

use crate::cache::{FieldValue, Record};

use super::types::{
  ActiveStatus, Invoice, InvoiceStatus, Part, Supplier, Transaction, TransactionStatus,
};

// ============================================================================
// Parts
// ============================================================================

impl Record for Part {
  type Status = ActiveStatus;

  fn id(&self) -> &str {
    &self.id
  }

  fn status(&self) -> ActiveStatus {
    self.status
  }

  fn set_status(&mut self, status: ActiveStatus) {
    self.status = status;
  }

  fn search_fields(&self) -> Vec<&str> {
    let mut fields = vec![self.name.as_str(), self.part_number.as_str()];
    fields.extend(self.brand.as_deref());
    fields.extend(self.category.as_deref());
    fields.extend(self.location.as_deref());
    fields
  }

  fn field(&self, key: &str) -> Option<FieldValue<'_>> {
    match key {
      "name" => Some(FieldValue::Text(&self.name)),
      "part_number" => Some(FieldValue::Text(&self.part_number)),
      "brand" => self.brand.as_deref().map(FieldValue::Text),
      "category" => self.category.as_deref().map(FieldValue::Text),
      "quantity" => Some(FieldValue::Number(self.quantity as f64)),
      "cost_price" => Some(FieldValue::Number(self.cost_price)),
      "selling_price" => Some(FieldValue::Number(self.selling_price)),
      "created_at" => self.created_at.map(FieldValue::Timestamp),
      "updated_at" => self.updated_at.map(FieldValue::Timestamp),
      _ => None,
    }
  }

  fn sort_keys() -> &'static [&'static str] {
    &[
      "name",
      "part_number",
      "brand",
      "category",
      "quantity",
      "cost_price",
      "selling_price",
      "created_at",
      "updated_at",
    ]
  }

  fn active_status() -> ActiveStatus {
    ActiveStatus::Active
  }

  fn collection() -> &'static str {
    "parts"
  }
}

// ============================================================================
// Invoices
// ============================================================================

impl Record for Invoice {
  type Status = InvoiceStatus;

  fn id(&self) -> &str {
    &self.id
  }

  fn status(&self) -> InvoiceStatus {
    self.status
  }

  fn set_status(&mut self, status: InvoiceStatus) {
    self.status = status;
  }

  fn search_fields(&self) -> Vec<&str> {
    let mut fields = vec![self.invoice_number.as_str(), self.customer_name.as_str()];
    fields.extend(self.customer_phone.as_deref());
    fields
  }

  fn field(&self, key: &str) -> Option<FieldValue<'_>> {
    match key {
      "invoice_number" => Some(FieldValue::Text(&self.invoice_number)),
      "customer_name" => Some(FieldValue::Text(&self.customer_name)),
      "total" => Some(FieldValue::Number(self.total)),
      "issue_date" => Some(FieldValue::Date(self.issue_date)),
      "due_date" => self.due_date.map(FieldValue::Date),
      "created_at" => self.created_at.map(FieldValue::Timestamp),
      _ => None,
    }
  }

  fn sort_keys() -> &'static [&'static str] {
    &[
      "invoice_number",
      "customer_name",
      "total",
      "issue_date",
      "due_date",
      "created_at",
    ]
  }

  /// Restoring a cancelled invoice puts it back in draft.
  fn active_status() -> InvoiceStatus {
    InvoiceStatus::Draft
  }

  fn collection() -> &'static str {
    "invoices"
  }
}

// ============================================================================
// Suppliers
// ============================================================================

impl Record for Supplier {
  type Status = ActiveStatus;

  fn id(&self) -> &str {
    &self.id
  }

  fn status(&self) -> ActiveStatus {
    self.status
  }

  fn set_status(&mut self, status: ActiveStatus) {
    self.status = status;
  }

  fn search_fields(&self) -> Vec<&str> {
    let mut fields = vec![self.name.as_str()];
    fields.extend(self.contact_person.as_deref());
    fields.extend(self.phone.as_deref());
    fields.extend(self.email.as_deref());
    fields
  }

  fn field(&self, key: &str) -> Option<FieldValue<'_>> {
    match key {
      "name" => Some(FieldValue::Text(&self.name)),
      "contact_person" => self.contact_person.as_deref().map(FieldValue::Text),
      "created_at" => self.created_at.map(FieldValue::Timestamp),
      _ => None,
    }
  }

  fn sort_keys() -> &'static [&'static str] {
    &["name", "contact_person", "created_at"]
  }

  fn active_status() -> ActiveStatus {
    ActiveStatus::Active
  }

  fn collection() -> &'static str {
    "suppliers"
  }
}

// ============================================================================
// Transactions
// ============================================================================

impl Record for Transaction {
  type Status = TransactionStatus;

  fn id(&self) -> &str {
    &self.id
  }

  fn status(&self) -> TransactionStatus {
    self.status
  }

  fn set_status(&mut self, status: TransactionStatus) {
    self.status = status;
  }

  fn search_fields(&self) -> Vec<&str> {
    let mut fields = vec![self.description.as_str()];
    fields.extend(self.category.as_deref());
    fields.extend(self.reference.as_deref());
    fields
  }

  fn field(&self, key: &str) -> Option<FieldValue<'_>> {
    match key {
      "amount" => Some(FieldValue::Number(self.amount)),
      "date" => Some(FieldValue::Date(self.date)),
      "category" => self.category.as_deref().map(FieldValue::Text),
      "description" => Some(FieldValue::Text(&self.description)),
      _ => None,
    }
  }

  fn sort_keys() -> &'static [&'static str] {
    &["amount", "date", "category", "description"]
  }

  fn active_status() -> TransactionStatus {
    TransactionStatus::Posted
  }

  fn collection() -> &'static str {
    "transactions"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_part_search_fields_skip_missing() {
    let mut part = Part::new("1".to_string(), "Bolt".to_string(), 5);
    part.part_number = "B-100".to_string();
    part.brand = Some("Bosch".to_string());

    assert_eq!(part.search_fields(), vec!["Bolt", "B-100", "Bosch"]);
  }

  #[test]
  fn test_every_sort_key_is_recognized() {
    let mut part = Part::new("1".to_string(), "Bolt".to_string(), 5);
    part.brand = Some("Bosch".to_string());
    part.category = Some("Fasteners".to_string());
    part.created_at = Some(chrono::Utc::now());
    part.updated_at = part.created_at;

    for key in Part::sort_keys() {
      assert!(part.field(key).is_some(), "missing field {}", key);
    }
    assert!(part.field("colour").is_none());
  }
}
