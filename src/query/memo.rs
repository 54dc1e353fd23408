//! Memoization of pipeline results keyed by input hash.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cache::Record;

use super::filter::CategoryFilter;
use super::pipeline::{run_indices, QueryParams};

/// Remembers the last pipeline result for one collection.
///
/// The key is a SHA-256 over the collection name, the cache revision, the item
/// count and the serialized parameters, so any cache mutation or parameter
/// change misses. One memo must only ever be used with one cache.
#[derive(Debug, Default)]
pub struct MemoizedPipeline {
  key: Option<String>,
  indices: Vec<usize>,
  hits: u64,
  misses: u64,
}

impl MemoizedPipeline {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn run<'a, R, F>(
    &mut self,
    items: &'a [R],
    revision: u64,
    params: &QueryParams<R::Status, F>,
  ) -> Vec<&'a R>
  where
    R: Record,
    F: CategoryFilter<R>,
  {
    let key = input_hash::<R, _>(revision, items.len(), params);

    if key.is_some() && key == self.key {
      self.hits += 1;
    } else {
      self.indices = run_indices(items, params);
      self.key = key;
      self.misses += 1;
    }

    self.indices.iter().map(|&i| &items[i]).collect()
  }

  /// Forget the remembered result.
  pub fn clear(&mut self) {
    self.key = None;
    self.indices.clear();
  }

  pub fn hits(&self) -> u64 {
    self.hits
  }

  pub fn misses(&self) -> u64 {
    self.misses
  }
}

/// Stable, fixed-length key for a pipeline input.
/// Returns `None` if the parameters can't be serialized, which disables reuse.
fn input_hash<R: Record, P: Serialize>(revision: u64, len: usize, params: &P) -> Option<String> {
  let params = serde_json::to_string(params).ok()?;
  let input = format!("{}:{}:{}:{}", R::collection(), revision, len, params);

  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  Some(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::RecordCache;
  use crate::query::filter::PartFilter;
  use crate::query::pipeline::SortDirection;
  use crate::store::types::{ActiveStatus, Part};

  fn cache() -> RecordCache<Part> {
    let mut cache = RecordCache::new();
    cache.set(vec![
      Part::new("1".to_string(), "Bolt".to_string(), 5),
      Part::new("2".to_string(), "Nut".to_string(), 0),
      Part::new("3".to_string(), "Washer".to_string(), 20),
    ]);
    cache
  }

  #[test]
  fn test_same_input_hits() {
    let cache = cache();
    let mut memo = MemoizedPipeline::new();
    let params = QueryParams::<_, PartFilter>::new(ActiveStatus::Active)
      .sorted_by("quantity", SortDirection::Ascending);

    let first: Vec<String> = memo
      .run(cache.items(), cache.revision(), &params)
      .iter()
      .map(|p| p.id.clone())
      .collect();
    let second: Vec<String> = memo
      .run(cache.items(), cache.revision(), &params)
      .iter()
      .map(|p| p.id.clone())
      .collect();

    assert_eq!(first, vec!["2", "1", "3"]);
    assert_eq!(first, second);
    assert_eq!(memo.hits(), 1);
    assert_eq!(memo.misses(), 1);
  }

  #[test]
  fn test_param_change_misses() {
    let cache = cache();
    let mut memo = MemoizedPipeline::new();
    let params = QueryParams::<_, PartFilter>::new(ActiveStatus::Active);

    memo.run(cache.items(), cache.revision(), &params);
    let out = memo.run(
      cache.items(),
      cache.revision(),
      &params.clone().with_search("nut"),
    );

    assert_eq!(out.len(), 1);
    assert_eq!(memo.misses(), 2);
  }

  #[test]
  fn test_cache_patch_misses() {
    let mut cache = cache();
    let mut memo = MemoizedPipeline::new();
    let params = QueryParams::<_, PartFilter>::new(ActiveStatus::Active);

    assert_eq!(memo.run(cache.items(), cache.revision(), &params).len(), 3);

    cache.patch_one("2", |p| p.status = ActiveStatus::Inactive);
    assert_eq!(memo.run(cache.items(), cache.revision(), &params).len(), 2);
    assert_eq!(memo.hits(), 0);
  }
}
