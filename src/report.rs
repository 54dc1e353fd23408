//! Profit and loss report over a date range.
//!
//! Joins invoices, transactions and parts that are already in memory. Nothing
//! here talks to the store.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::store::types::{
  ActiveStatus, DisplayStatus, Invoice, InvoiceStatus, Part, StockLevel, Transaction,
  TransactionKind, TransactionStatus,
};

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
  pub from: NaiveDate,
  pub to: NaiveDate,
}

impl ReportPeriod {
  /// Swaps the bounds if they are given in the wrong order.
  pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
    if from <= to {
      Self { from, to }
    } else {
      Self { from: to, to: from }
    }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.from <= date && date <= self.to
  }
}

/// Units and revenue of one part across paid invoices
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSales {
  pub part_id: String,
  pub name: String,
  pub quantity: f64,
  pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
  pub period: ReportPeriod,
  pub revenue: f64,
  pub cost_of_goods: f64,
  pub gross_profit: f64,
  /// Percentage of revenue, 0 when there is no revenue
  pub gross_margin: f64,
  pub other_income: f64,
  pub expenses: f64,
  pub net_profit: f64,
  /// Total of sent invoices not yet paid, overdue included
  pub outstanding: f64,
  pub overdue_count: usize,
  /// Invoices issued in the period, per display status
  pub invoice_counts: BTreeMap<DisplayStatus, usize>,
  pub top_parts: Vec<PartSales>,
  pub inventory_value: f64,
  pub low_stock_count: usize,
}

impl ReportData {
  /// Build the report. Overdue is judged as of the period's last day.
  pub fn calculate(
    period: ReportPeriod,
    invoices: &[Invoice],
    transactions: &[Transaction],
    parts: &[Part],
    top_n: usize,
  ) -> Self {
    let parts_by_id: HashMap<&str, &Part> = parts.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut revenue = 0.0;
    let mut cost_of_goods = 0.0;
    let mut sales: HashMap<String, PartSales> = HashMap::new();
    let mut invoice_counts = BTreeMap::new();

    for invoice in invoices.iter().filter(|i| period.contains(i.issue_date)) {
      *invoice_counts
        .entry(invoice.display_status(period.to))
        .or_insert(0) += 1;

      if invoice.status != InvoiceStatus::Paid {
        continue;
      }
      revenue += invoice.total;

      for line in &invoice.lines {
        let part = line
          .part_id
          .as_deref()
          .and_then(|id| parts_by_id.get(id).copied());
        let unit_cost = part
          .map(|p| p.cost_price)
          .or(line.unit_cost)
          .unwrap_or(0.0);
        cost_of_goods += line.quantity * unit_cost;

        if let Some(part_id) = &line.part_id {
          let entry = sales.entry(part_id.clone()).or_insert_with(|| PartSales {
            part_id: part_id.clone(),
            name: part
              .map(|p| p.name.clone())
              .unwrap_or_else(|| line.description.clone()),
            quantity: 0.0,
            revenue: 0.0,
          });
          entry.quantity += line.quantity;
          entry.revenue += line.amount();
        }
      }
    }

    let mut outstanding = 0.0;
    let mut overdue_count = 0;
    for invoice in invoices {
      match invoice.display_status(period.to) {
        DisplayStatus::Sent => outstanding += invoice.total,
        DisplayStatus::Overdue => {
          outstanding += invoice.total;
          overdue_count += 1;
        }
        _ => {}
      }
    }

    let mut other_income = 0.0;
    let mut expenses = 0.0;
    for tx in transactions
      .iter()
      .filter(|t| t.status == TransactionStatus::Posted && period.contains(t.date))
    {
      match tx.kind {
        TransactionKind::Income => other_income += tx.amount,
        TransactionKind::Expense => expenses += tx.amount,
      }
    }

    let active_parts = parts.iter().filter(|p| p.status == ActiveStatus::Active);
    let (inventory_value, low_stock_count) =
      active_parts.fold((0.0, 0), |(value, low), part| {
        let is_low = part.stock_level() != StockLevel::InStock;
        (value + part.stock_value(), low + usize::from(is_low))
      });

    let gross_profit = revenue - cost_of_goods;
    let gross_margin = if revenue > 0.0 {
      gross_profit / revenue * 100.0
    } else {
      0.0
    };

    Self {
      period,
      revenue,
      cost_of_goods,
      gross_profit,
      gross_margin,
      other_income,
      expenses,
      net_profit: gross_profit + other_income - expenses,
      outstanding,
      overdue_count,
      invoice_counts,
      top_parts: top_parts(sales.into_values().collect(), top_n),
      inventory_value,
      low_stock_count,
    }
  }
}

/// Highest revenue first, then most units, then name.
fn top_parts(mut sales: Vec<PartSales>, n: usize) -> Vec<PartSales> {
  sales.sort_by(|a, b| {
    b.revenue
      .total_cmp(&a.revenue)
      .then_with(|| b.quantity.total_cmp(&a.quantity))
      .then_with(|| a.name.cmp(&b.name))
  });
  sales.truncate(n);
  sales
}
