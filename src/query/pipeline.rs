//! The query pipeline: status partition, search, categorical filter, sort.
//!
//! [`run`] is a pure function of its inputs. Stages run in a fixed order and
//! each sees only the previous stage's output.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::cache::{FieldValue, Record};

use super::filter::CategoryFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
  /// Field name understood by [`Record::field`]
  pub key: String,
  pub direction: SortDirection,
}

/// Everything a list view asks of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParams<S, F> {
  /// Free-text search; blank means no search
  pub search_text: String,
  /// Status view being browsed. Views never mix statuses.
  pub status: S,
  /// Categorical filter; `None` behaves like the "all" sentinel
  pub filter: Option<F>,
  /// Sort key and direction; `None` keeps fetch order
  pub sort: Option<SortSpec>,
}

impl<S, F> QueryParams<S, F> {
  pub fn new(status: S) -> Self {
    Self {
      search_text: String::new(),
      status,
      filter: None,
      sort: None,
    }
  }

  pub fn with_search(mut self, text: impl Into<String>) -> Self {
    self.search_text = text.into();
    self
  }

  pub fn with_filter(mut self, filter: F) -> Self {
    self.filter = Some(filter);
    self
  }

  pub fn sorted_by(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
    self.sort = Some(SortSpec {
      key: key.into(),
      direction,
    });
    self
  }
}

/// Run the pipeline and return matching records in view order.
pub fn run<'a, R, F>(items: &'a [R], params: &QueryParams<R::Status, F>) -> Vec<&'a R>
where
  R: Record,
  F: CategoryFilter<R>,
{
  run_indices(items, params)
    .into_iter()
    .map(|i| &items[i])
    .collect()
}

/// Same as [`run`], returning positions into `items`.
pub fn run_indices<R, F>(items: &[R], params: &QueryParams<R::Status, F>) -> Vec<usize>
where
  R: Record,
  F: CategoryFilter<R>,
{
  let needle = search_needle(&params.search_text);
  let filter = params.filter.as_ref().filter(|f| !f.is_all());

  let mut indices: Vec<usize> = items
    .iter()
    .enumerate()
    .filter(|(_, r)| r.status() == params.status)
    .filter(|(_, r)| match &needle {
      Some(needle) => matches_search(*r, needle),
      None => true,
    })
    .filter(|(_, r)| filter.map_or(true, |f| f.matches(r)))
    .map(|(i, _)| i)
    .collect();

  if let Some(sort) = &params.sort {
    sort_indices::<R>(items, &mut indices, sort);
  }

  indices
}

/// Case-folded search text, or `None` when blank.
fn search_needle(text: &str) -> Option<String> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_lowercase())
  }
}

fn matches_search<R: Record>(record: &R, needle: &str) -> bool {
  record
    .search_fields()
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Stable sort of `indices` by the record field named in `sort`.
///
/// An unknown key leaves the order unchanged. This is the documented
/// "no sort" case, not an error.
fn sort_indices<R: Record>(items: &[R], indices: &mut [usize], sort: &SortSpec) {
  if !R::sort_keys().contains(&sort.key.as_str()) {
    debug!(
      collection = R::collection(),
      key = %sort.key,
      "unknown sort key, keeping fetch order"
    );
    return;
  }

  let compare = |a: usize, b: usize| {
    let ord = compare_fields(items[a].field(&sort.key), items[b].field(&sort.key));
    match sort.direction {
      SortDirection::Ascending => ord,
      SortDirection::Descending => ord.reverse(),
    }
  };

  // Missing fields make the comparator non-transitive, which `slice::sort_by`
  // may panic on. Stable insertion sort instead.
  for i in 1..indices.len() {
    let mut j = i;
    while j > 0 && compare(indices[j - 1], indices[j]) == Ordering::Greater {
      indices.swap(j - 1, j);
      j -= 1;
    }
  }
}

/// Compare two field values. Absent values and mismatched kinds compare equal.
pub fn compare_fields(a: Option<FieldValue<'_>>, b: Option<FieldValue<'_>>) -> Ordering {
  match (a, b) {
    (Some(FieldValue::Number(x)), Some(FieldValue::Number(y))) => {
      x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
    (Some(FieldValue::Text(x)), Some(FieldValue::Text(y))) => compare_text(x, y),
    (Some(FieldValue::Date(x)), Some(FieldValue::Date(y))) => x.cmp(&y),
    (Some(FieldValue::Timestamp(x)), Some(FieldValue::Timestamp(y))) => x.cmp(&y),
    _ => Ordering::Equal,
  }
}

/// Human ordering for names: case-insensitive first, lowercase before
/// uppercase on ties, so "bolt" < "Bolt" < "brake".
pub fn compare_text(a: &str, b: &str) -> Ordering {
  a.to_lowercase()
    .cmp(&b.to_lowercase())
    .then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::filter::{InvoiceFilter, PartFilter};
  use crate::store::types::{ActiveStatus, Invoice, InvoiceStatus, Part};
  use chrono::NaiveDate;

  fn part(id: &str, name: &str, quantity: u32) -> Part {
    Part::new(id.to_string(), name.to_string(), quantity)
  }

  fn ids<'a>(records: &[&'a Part]) -> Vec<&'a str> {
    records.iter().map(|p| p.id.as_str()).collect()
  }

  fn params() -> QueryParams<ActiveStatus, PartFilter> {
    QueryParams::new(ActiveStatus::Active)
  }

  fn bolt_and_nut() -> Vec<Part> {
    vec![part("1", "Bolt", 5), part("2", "Nut", 0)]
  }

  #[test]
  fn test_out_of_stock_filter() {
    let items = bolt_and_nut();
    let out = run(&items, &params().with_filter(PartFilter::OutOfStock));
    assert_eq!(ids(&out), vec!["2"]);
  }

  #[test]
  fn test_search_is_case_insensitive_substring() {
    let items = bolt_and_nut();
    let out = run(&items, &params().with_search("bolt"));
    assert_eq!(ids(&out), vec!["1"]);

    let out = run(&items, &params().with_search("  OL "));
    assert_eq!(ids(&out), vec!["1"]);
  }

  #[test]
  fn test_whitespace_search_is_ignored() {
    let items = bolt_and_nut();
    let out = run(&items, &params().with_search("   "));
    assert_eq!(ids(&out), vec!["1", "2"]);
  }

  #[test]
  fn test_search_matches_any_field() {
    let mut items = bolt_and_nut();
    items[1].brand = Some("Bosch".to_string());
    items[0].location = Some("Aisle 4".to_string());

    assert_eq!(ids(&run(&items, &params().with_search("bosch"))), vec!["2"]);
    assert_eq!(ids(&run(&items, &params().with_search("aisle"))), vec!["1"]);
  }

  #[test]
  fn test_empty_input_yields_empty_output() {
    let items: Vec<Part> = Vec::new();
    let out = run(
      &items,
      &params()
        .with_search("x")
        .with_filter(PartFilter::InStock)
        .sorted_by("name", SortDirection::Descending),
    );
    assert!(out.is_empty());
  }

  #[test]
  fn test_sort_is_stable() {
    let items = vec![part("1", "A", 5), part("2", "B", 5), part("3", "C", 1)];
    let out = run(&items, &params().sorted_by("quantity", SortDirection::Ascending));
    assert_eq!(ids(&out), vec!["3", "1", "2"]);
  }

  #[test]
  fn test_descending_keeps_ties_in_input_order() {
    let items = vec![part("1", "A", 5), part("2", "B", 5), part("3", "C", 9)];
    let out = run(&items, &params().sorted_by("quantity", SortDirection::Descending));
    assert_eq!(ids(&out), vec!["3", "1", "2"]);
  }

  #[test]
  fn test_text_sort_ignores_case() {
    let items = vec![
      part("1", "brake pad", 1),
      part("2", "Air filter", 1),
      part("3", "Clutch", 1),
    ];
    let out = run(&items, &params().sorted_by("name", SortDirection::Ascending));
    assert_eq!(ids(&out), vec!["2", "1", "3"]);
  }

  #[test]
  fn test_unknown_sort_key_keeps_order() {
    let items = vec![part("1", "Z", 3), part("2", "A", 1)];
    let out = run(&items, &params().sorted_by("colour", SortDirection::Ascending));
    assert_eq!(ids(&out), vec!["1", "2"]);
  }

  #[test]
  fn test_missing_field_compares_equal() {
    let mut items = vec![part("1", "A", 1), part("2", "B", 1), part("3", "C", 1)];
    items[0].brand = Some("Valeo".to_string());
    items[2].brand = Some("Bosch".to_string());

    // "2" has no brand, so it is equal to both neighbours and nothing moves past it.
    let out = run(&items, &params().sorted_by("brand", SortDirection::Ascending));
    assert_eq!(ids(&out), vec!["1", "2", "3"]);
  }

  #[test]
  fn test_pipeline_is_idempotent() {
    let items = vec![
      part("1", "Bolt", 12),
      part("2", "bolt cover", 3),
      part("3", "Nut", 0),
      part("4", "Bolt", 12),
    ];
    let query = params()
      .with_search("bolt")
      .sorted_by("quantity", SortDirection::Descending);

    let first = ids(&run(&items, &query));
    let second = ids(&run(&items, &query));
    assert_eq!(first, second);
    assert_eq!(first, vec!["1", "4", "2"]);
  }

  #[test]
  fn test_status_views_are_disjoint_and_cover() {
    let mut items: Vec<Part> = (0..10)
      .map(|i| part(&i.to_string(), &format!("Part {}", i), i))
      .collect();
    for p in items.iter_mut().filter(|p| p.quantity % 3 == 0) {
      p.status = ActiveStatus::Inactive;
    }

    let active = ids(&run(&items, &QueryParams::<_, PartFilter>::new(ActiveStatus::Active)));
    let inactive = ids(&run(&items, &QueryParams::<_, PartFilter>::new(ActiveStatus::Inactive)));

    assert!(active.iter().all(|id| !inactive.contains(id)));
    assert_eq!(active.len() + inactive.len(), items.len());
  }

  #[test]
  fn test_invoice_pipeline_overdue_sorted_by_due_date() {
    let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
    let invoice = |id: &str, due: &str| Invoice {
      id: id.to_string(),
      invoice_number: format!("INV-{}", id),
      customer_name: "Garage Nord".to_string(),
      customer_phone: None,
      lines: Vec::new(),
      total: 10.0,
      status: InvoiceStatus::Sent,
      issue_date: date("2024-01-01"),
      due_date: Some(date(due)),
      paid_at: None,
      created_at: None,
    };
    let items = vec![
      invoice("a", "2024-02-20"),
      invoice("b", "2024-04-01"),
      invoice("c", "2024-02-01"),
    ];

    let query = QueryParams::new(InvoiceStatus::Sent)
      .with_filter(InvoiceFilter::Overdue {
        as_of: date("2024-03-01"),
      })
      .sorted_by("due_date", SortDirection::Ascending);
    let out: Vec<&str> = run(&items, &query).iter().map(|i| i.id.as_str()).collect();
    assert_eq!(out, vec!["c", "a"]);
  }

  #[test]
  fn test_compare_text_tie_break() {
    assert_eq!(compare_text("bolt", "Bolt"), Ordering::Less);
    assert_eq!(compare_text("Bolt", "bolt"), Ordering::Greater);
    assert_eq!(compare_text("Bolt", "Bolt"), Ordering::Equal);
  }
}
