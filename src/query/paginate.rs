//! Fixed-size pagination over an already materialized result.
//!
//! Pages are 1-based. A page past the end is valid and simply empty.

/// Items of page `current_page` (1-based). Page 0 is treated as page 1.
pub fn slice<T>(items: &[T], page_size: usize, current_page: usize) -> &[T] {
  let page_size = page_size.max(1);
  let current_page = current_page.max(1);
  let start = (current_page - 1).saturating_mul(page_size).min(items.len());
  let end = current_page.saturating_mul(page_size).min(items.len());
  &items[start..end]
}

/// Whether any item lies beyond page `current_page`.
pub fn has_more(len: usize, page_size: usize, current_page: usize) -> bool {
  current_page.max(1).saturating_mul(page_size.max(1)) < len
}

/// Page cursor for one list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
  page_size: usize,
  current_page: usize,
}

impl PageState {
  /// Start at page 1. A zero page size is bumped to 1.
  pub fn new(page_size: usize) -> Self {
    Self {
      page_size: page_size.max(1),
      current_page: 1,
    }
  }

  /// Jump to a specific page (clamped to at least 1).
  pub fn at_page(mut self, page: usize) -> Self {
    self.current_page = page.max(1);
    self
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  pub fn current_page(&self) -> usize {
    self.current_page
  }

  pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
    slice(items, self.page_size, self.current_page)
  }

  /// Every item from page 1 through the current page, for infinite scroll.
  pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
    let end = self
      .current_page
      .saturating_mul(self.page_size)
      .min(items.len());
    &items[..end]
  }

  pub fn has_more(&self, len: usize) -> bool {
    has_more(len, self.page_size, self.current_page)
  }

  /// Move to the next page. Returns false, and stays put, when there is none.
  pub fn advance(&mut self, len: usize) -> bool {
    if self.has_more(len) {
      self.current_page += 1;
      true
    } else {
      false
    }
  }

  /// Back to page 1, e.g. after the query parameters change.
  pub fn reset(&mut self) {
    self.current_page = 1;
  }

  /// Number of non-empty pages (0 for an empty result).
  pub fn page_count(&self, len: usize) -> usize {
    len.div_ceil(self.page_size)
  }
}
