//! Plain-text rendering for list pages and reports.

use chrono::NaiveDate;

use crate::report::ReportData;
use crate::store::types::{
  Invoice, Part, StockLevel, Supplier, Transaction, TransactionKind, TransactionStatus,
};

/// Widest any single column is rendered
const MAX_COLUMN_WIDTH: usize = 32;

/// Truncate a string to a maximum length in characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Two decimals with thousands separators, e.g. `-1,234.50`
pub fn money(amount: f64) -> String {
  let cents = (amount.abs() * 100.0).round() as u64;
  let whole = (cents / 100).to_string();

  let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
  for (i, c) in whole.chars().enumerate() {
    if i > 0 && (whole.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }

  let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
  format!("{}{}.{:02}", sign, grouped, cents % 100)
}

fn or_dash(value: Option<&str>) -> String {
  value.unwrap_or("-").to_string()
}

/// A record that can be listed as one table row.
pub trait Tabular {
  fn headers() -> &'static [&'static str];

  /// Cells in header order. `as_of` is used for derived state like overdue.
  fn row(&self, as_of: NaiveDate) -> Vec<String>;
}

impl Tabular for Part {
  fn headers() -> &'static [&'static str] {
    &["ID", "PART NO", "NAME", "QTY", "STOCK", "PRICE", "LOCATION", "STATUS"]
  }

  fn row(&self, _as_of: NaiveDate) -> Vec<String> {
    let stock = match self.stock_level() {
      StockLevel::OutOfStock => "out",
      StockLevel::Low => "low",
      StockLevel::InStock => "ok",
    };
    vec![
      self.id.clone(),
      self.part_number.clone(),
      self.name.clone(),
      self.quantity.to_string(),
      stock.to_string(),
      money(self.selling_price),
      or_dash(self.location.as_deref()),
      self.status.as_str().to_string(),
    ]
  }
}

impl Tabular for Invoice {
  fn headers() -> &'static [&'static str] {
    &["ID", "NUMBER", "CUSTOMER", "ISSUED", "DUE", "TOTAL", "STATUS"]
  }

  fn row(&self, as_of: NaiveDate) -> Vec<String> {
    vec![
      self.id.clone(),
      self.invoice_number.clone(),
      self.customer_name.clone(),
      self.issue_date.to_string(),
      self
        .due_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string()),
      money(self.total),
      self.display_status(as_of).as_str().to_string(),
    ]
  }
}

impl Tabular for Supplier {
  fn headers() -> &'static [&'static str] {
    &["ID", "NAME", "CONTACT", "PHONE", "EMAIL", "STATUS"]
  }

  fn row(&self, _as_of: NaiveDate) -> Vec<String> {
    vec![
      self.id.clone(),
      self.name.clone(),
      or_dash(self.contact_person.as_deref()),
      or_dash(self.phone.as_deref()),
      or_dash(self.email.as_deref()),
      self.status.as_str().to_string(),
    ]
  }
}

impl Tabular for Transaction {
  fn headers() -> &'static [&'static str] {
    &["ID", "DATE", "KIND", "AMOUNT", "CATEGORY", "DESCRIPTION", "STATUS"]
  }

  fn row(&self, _as_of: NaiveDate) -> Vec<String> {
    let (kind, signed) = match self.kind {
      TransactionKind::Income => ("income", self.amount),
      TransactionKind::Expense => ("expense", -self.amount),
    };
    let status = match self.status {
      TransactionStatus::Posted => "posted",
      TransactionStatus::Voided => "voided",
    };
    vec![
      self.id.clone(),
      self.date.to_string(),
      kind.to_string(),
      money(signed),
      or_dash(self.category.as_deref()),
      self.description.clone(),
      status.to_string(),
    ]
  }
}

/// Render rows as an aligned table with a header line.
pub fn table<T: Tabular>(rows: &[&T], as_of: NaiveDate) -> String {
  let headers = T::headers();
  let cells: Vec<Vec<String>> = rows
    .iter()
    .map(|r| {
      r.row(as_of)
        .into_iter()
        .map(|c| truncate(&c, MAX_COLUMN_WIDTH))
        .collect()
    })
    .collect();

  let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
  for row in &cells {
    for (width, cell) in widths.iter_mut().zip(row) {
      *width = (*width).max(cell.chars().count());
    }
  }

  let mut out = String::new();
  push_line(&mut out, headers.iter().copied(), &widths);
  for row in &cells {
    push_line(&mut out, row.iter().map(String::as_str), &widths);
  }
  out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
  let line: Vec<String> = cells
    .zip(widths)
    .map(|(cell, &width)| {
      let pad = width.saturating_sub(cell.chars().count());
      format!("{}{}", cell, " ".repeat(pad))
    })
    .collect();
  out.push_str(line.join("  ").trim_end());
  out.push('\n');
}

/// Render the profit and loss report.
pub fn report(data: &ReportData) -> String {
  let mut out = format!("Report {} to {}\n\n", data.period.from, data.period.to);

  let rows = [
    ("Revenue", money(data.revenue)),
    ("Cost of goods", money(data.cost_of_goods)),
    ("Gross profit", money(data.gross_profit)),
    ("Gross margin", format!("{:.1}%", data.gross_margin)),
    ("Other income", money(data.other_income)),
    ("Expenses", money(data.expenses)),
    ("Net profit", money(data.net_profit)),
    ("", String::new()),
    ("Outstanding", money(data.outstanding)),
    ("Overdue invoices", data.overdue_count.to_string()),
    ("Inventory value", money(data.inventory_value)),
    ("Low stock parts", data.low_stock_count.to_string()),
  ];
  for (label, value) in rows {
    if label.is_empty() {
      out.push('\n');
    } else {
      out.push_str(&format!("{:<18}{:>14}\n", label, value));
    }
  }

  if !data.invoice_counts.is_empty() {
    out.push_str("\nInvoices issued\n");
    for (status, count) in &data.invoice_counts {
      out.push_str(&format!("  {:<16}{:>14}\n", status.as_str(), count));
    }
  }

  if !data.top_parts.is_empty() {
    out.push_str("\nTop parts\n");
    for (rank, sales) in data.top_parts.iter().enumerate() {
      out.push_str(&format!(
        "  {}. {:<24}{:>8}{:>14}\n",
        rank + 1,
        truncate(&sales.name, 24),
        sales.quantity,
        money(sales.revenue)
      ));
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Bremsbeläge vorne", 10), "Bremsbe...");
    assert_eq!(truncate("ölfilter", 8), "ölfilter");
  }

  #[test]
  fn test_money() {
    assert_eq!(money(0.0), "0.00");
    assert_eq!(money(12.5), "12.50");
    assert_eq!(money(1234.567), "1,234.57");
    assert_eq!(money(-1_000_000.0), "-1,000,000.00");
    assert_eq!(money(-0.001), "0.00");
  }

  #[test]
  fn test_table_aligns_columns() {
    let a = Part::new("1".to_string(), "Bolt".to_string(), 50);
    let b = Part::new("22".to_string(), "Brake pad".to_string(), 0);
    let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    let out = table(&[&a, &b], as_of);
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ID  PART NO  NAME"));
    assert!(lines[1].starts_with("1   "));
    assert!(lines[2].contains("Brake pad"));
    assert!(lines[2].contains(" out "));
  }

  #[test]
  fn test_table_empty_has_header_only() {
    let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let out = table::<Supplier>(&[], as_of);
    assert_eq!(out, "ID  NAME  CONTACT  PHONE  EMAIL  STATUS\n");
  }
}
