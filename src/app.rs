//! Command handlers for the `stockroom` binary.
//!
//! Each handler loads the collections it needs (seeding from the snapshot
//! store first), runs the query pipeline or a mutation, and prints plain text.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use color_eyre::{eyre::eyre, Result};
use tracing::{debug, warn};

use crate::cache::{CacheSource, Record, SnapshotStorage};
use crate::collection::{Collection, LoadState};
use crate::config::Config;
use crate::error::QueryError;
use crate::format::{self, Tabular};
use crate::query::{
  AllRecords, CategoryFilter, InvoiceFilter, PageState, PartFilter, QueryParams, SortDirection,
  TransactionFilter,
};
use crate::report::{ReportData, ReportPeriod};
use crate::store::types::{
  ActiveStatus, Invoice, InvoiceStatus, Part, Supplier, Transaction, TransactionStatus,
};
use crate::store::RecordStore;

/// How collections are loaded for this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
  /// Serve the snapshot while fresh, refetch once expired
  #[default]
  Normal,
  /// Always refetch, ignoring the time-to-live
  Refresh,
  /// Serve the persisted snapshot only
  Offline,
}

/// Options shared by every list command
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
  pub search: Option<String>,
  pub filter: Option<String>,
  pub sort: Option<String>,
  pub descending: bool,
  pub page: usize,
  pub page_size: Option<usize>,
}

/// Runs commands against a record store `S`, persisting snapshots to `St`.
pub struct App<S, St> {
  config: Config,
  store: Arc<S>,
  storage: St,
  mode: LoadMode,
  today: NaiveDate,
}

impl<S, St> App<S, St>
where
  S: Send + Sync + 'static,
  St: SnapshotStorage,
{
  pub fn new(config: Config, store: S, storage: St, mode: LoadMode) -> Self {
    Self {
      config,
      store: Arc::new(store),
      storage,
      mode,
      today: Local::now().date_naive(),
    }
  }

  // ==========================================================================
  // Lists
  // ==========================================================================

  pub async fn list_parts(&self, opts: &ListOptions, inactive: bool) -> Result<()>
  where
    S: RecordStore<Part>,
  {
    let filter = parse_opt::<PartFilter>(opts.filter.as_deref())?;
    let params = self.params(opts, status_for(inactive), filter)?;
    let mut parts = self.load::<Part>().await?;
    self.print_page(&mut parts, &params, opts);
    Ok(())
  }

  pub async fn list_invoices(&self, opts: &ListOptions, status: Option<&str>) -> Result<()>
  where
    S: RecordStore<Invoice>,
  {
    let params = self.invoice_params(opts, status)?;
    let mut invoices = self.load::<Invoice>().await?;
    self.print_page(&mut invoices, &params, opts);
    Ok(())
  }

  pub async fn list_suppliers(&self, opts: &ListOptions, inactive: bool) -> Result<()>
  where
    S: RecordStore<Supplier>,
  {
    if opts.filter.is_some() {
      return Err(eyre!("Suppliers have no filters"));
    }
    let params = self.params::<Supplier, AllRecords>(opts, status_for(inactive), None)?;
    let mut suppliers = self.load::<Supplier>().await?;
    self.print_page(&mut suppliers, &params, opts);
    Ok(())
  }

  pub async fn list_transactions(&self, opts: &ListOptions, voided: bool) -> Result<()>
  where
    S: RecordStore<Transaction>,
  {
    let filter = parse_opt::<TransactionFilter>(opts.filter.as_deref())?;
    let status = if voided {
      TransactionStatus::Voided
    } else {
      TransactionStatus::Posted
    };
    let params = self.params(opts, status, filter)?;
    let mut transactions = self.load::<Transaction>().await?;
    self.print_page(&mut transactions, &params, opts);
    Ok(())
  }

  /// The status partition follows the filter when the filter implies one;
  /// an explicit `--status` that contradicts it is rejected.
  fn invoice_params(
    &self,
    opts: &ListOptions,
    status: Option<&str>,
  ) -> Result<QueryParams<InvoiceStatus, InvoiceFilter>> {
    let status = status
      .map(str::parse::<InvoiceStatus>)
      .transpose()
      .map_err(|e| eyre!(e))?;
    let filter = opts
      .filter
      .as_deref()
      .map(|f| InvoiceFilter::parse(f, self.today))
      .transpose()
      .map_err(|e| eyre!(e))?;

    let implied = filter.and_then(|f| f.implied_status());
    let status = match (status, implied) {
      (Some(explicit), Some(implied)) if explicit != implied => {
        return Err(eyre!(
          "--filter {} only matches {} invoices, not {}",
          CategoryFilter::<Invoice>::label(&filter.unwrap_or_default()),
          implied.as_str(),
          explicit.as_str()
        ));
      }
      (Some(explicit), _) => explicit,
      (None, Some(implied)) => implied,
      (None, None) => Invoice::active_status(),
    };

    self.params(opts, status, filter)
  }

  fn params<R, F>(
    &self,
    opts: &ListOptions,
    status: R::Status,
    filter: Option<F>,
  ) -> Result<QueryParams<R::Status, F>>
  where
    R: Record,
    F: CategoryFilter<R>,
  {
    let mut params = QueryParams::new(status);
    if let Some(search) = &opts.search {
      params = params.with_search(search.clone());
    }
    if let Some(filter) = filter {
      params = params.with_filter(filter);
    }
    if let Some(key) = &opts.sort {
      if !R::sort_keys().contains(&key.as_str()) {
        return Err(eyre!(
          "Unknown sort key '{}' for {}. Valid keys: {}",
          key,
          R::collection(),
          R::sort_keys().join(", ")
        ));
      }
      let direction = if opts.descending {
        SortDirection::Descending
      } else {
        SortDirection::Ascending
      };
      params = params.sorted_by(key.clone(), direction);
    }
    Ok(params)
  }

  fn print_page<R, F>(
    &self,
    collection: &mut Collection<R, S>,
    params: &QueryParams<R::Status, F>,
    opts: &ListOptions,
  ) where
    R: Record + Tabular,
    F: CategoryFilter<R>,
    S: RecordStore<R>,
  {
    let page = PageState::new(opts.page_size.unwrap_or(self.config.list.page_size)).at_page(opts.page);
    let source = collection.source();
    let fetched_at = collection.fetched_at();
    let results = collection.view(params);

    let rows = page.slice(&results);
    if rows.is_empty() {
      println!("No {} match.", R::collection());
    } else {
      print!("{}", format::table(rows, self.today));
    }

    let mut footer = format!(
      "\nPage {} of {} ({} {}, {}",
      page.current_page(),
      page.page_count(results.len()).max(1),
      results.len(),
      R::collection(),
      source.label()
    );
    if source != CacheSource::Network {
      if let Some(at) = fetched_at {
        footer.push_str(&format!(" from {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M")));
      }
    }
    footer.push(')');
    if page.has_more(results.len()) {
      footer.push_str(&format!(" - more with --page {}", page.current_page() + 1));
    }
    println!("{}", footer);
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  pub async fn deactivate_part(&self, id: &str) -> Result<()>
  where
    S: RecordStore<Part>,
  {
    self.set_status::<Part>(id, ActiveStatus::Inactive).await
  }

  pub async fn restore_part(&self, id: &str) -> Result<()>
  where
    S: RecordStore<Part>,
  {
    self.set_status::<Part>(id, Part::active_status()).await
  }

  pub async fn set_invoice_status(&self, id: &str, status: &str) -> Result<()>
  where
    S: RecordStore<Invoice>,
  {
    let status = status.parse::<InvoiceStatus>().map_err(|e| eyre!(e))?;
    self.set_status::<Invoice>(id, status).await
  }

  async fn set_status<R>(&self, id: &str, status: R::Status) -> Result<()>
  where
    R: Record,
    S: RecordStore<R>,
  {
    if self.mode == LoadMode::Offline {
      return Err(eyre!("Cannot change {} while offline", R::collection()));
    }

    // A missing or unreachable snapshot doesn't block the write itself.
    let mut collection = match self.load::<R>().await {
      Ok(collection) => collection,
      Err(e) => {
        warn!(collection = R::collection(), error = %e, "writing without a cached snapshot");
        Collection::new(Arc::clone(&self.store)).with_ttl(self.config.ttl())
      }
    };

    let outcome = collection.apply_status_change(id, status).await;
    match &outcome {
      Ok(()) => println!("{} {} is now {:?}", R::collection(), id, status),
      Err(QueryError::StaleReadAfterWrite { .. }) => {
        println!(
          "{} {} was updated, but the store did not return it yet; showing the local change",
          R::collection(),
          id
        );
      }
      Err(_) => {}
    }

    match outcome {
      Ok(()) | Err(QueryError::StaleReadAfterWrite { .. }) => {
        self.persist(&collection);
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }

  // ==========================================================================
  // Report
  // ==========================================================================

  /// Defaults to the current month up to today.
  pub async fn report(
    &self,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    top: Option<usize>,
  ) -> Result<()>
  where
    S: RecordStore<Invoice> + RecordStore<Transaction> + RecordStore<Part>,
  {
    let to = to.unwrap_or(self.today);
    let from = match from {
      Some(from) => from,
      None => to
        .with_day(1)
        .ok_or_else(|| eyre!("Cannot compute the start of month for {}", to))?,
    };
    let period = ReportPeriod::new(from, to);

    let (invoices, transactions, parts) = futures::try_join!(
      self.load::<Invoice>(),
      self.load::<Transaction>(),
      self.load::<Part>(),
    )?;

    let data = ReportData::calculate(
      period,
      invoices.items(),
      transactions.items(),
      parts.items(),
      top.unwrap_or(self.config.report.top_parts),
    );
    print!("{}", format::report(&data));
    Ok(())
  }

  // ==========================================================================
  // Loading
  // ==========================================================================

  /// Load one collection according to the run's [`LoadMode`].
  ///
  /// A failed fetch is only an error when there is nothing cached to show.
  async fn load<R>(&self) -> Result<Collection<R, S>>
  where
    R: Record,
    S: RecordStore<R>,
  {
    let mut collection = Collection::new(Arc::clone(&self.store)).with_ttl(self.config.ttl());

    match self.storage.load_snapshot::<R>() {
      Ok(Some(snapshot)) => collection.seed(snapshot.items, snapshot.cached_at),
      Ok(None) => debug!(collection = R::collection(), "no snapshot"),
      Err(e) => warn!(collection = R::collection(), error = %e, "ignoring unreadable snapshot"),
    }

    match self.mode {
      LoadMode::Offline => {
        if collection.items().is_empty() {
          return Err(eyre!(
            "No cached {} available offline. Run once without --offline first.",
            R::collection()
          ));
        }
        return Ok(collection);
      }
      LoadMode::Refresh => collection.refresh(),
      LoadMode::Normal => {
        collection.ensure_fresh();
      }
    }

    let fetched = collection.settle().await;
    if fetched && collection.state() == LoadState::Loaded {
      self.persist(&collection);
    }

    if let Some(err) = collection.take_error() {
      if collection.items().is_empty() {
        return Err(err.into());
      }
      warn!(collection = R::collection(), kind = err.kind(), "serving stale items");
      eprintln!(
        "warning: {}; showing {} {}",
        err,
        collection.source().label(),
        R::collection()
      );
    }

    Ok(collection)
  }

  fn persist<R>(&self, collection: &Collection<R, S>)
  where
    R: Record,
    S: RecordStore<R>,
  {
    let Some(fetched_at) = collection.fetched_at() else {
      return;
    };
    if let Err(e) = self.storage.store_snapshot(collection.items(), fetched_at) {
      warn!(collection = R::collection(), error = %e, "failed to persist snapshot");
    }
  }
}

fn status_for(inactive: bool) -> ActiveStatus {
  if inactive {
    ActiveStatus::Inactive
  } else {
    ActiveStatus::Active
  }
}

fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>>
where
  T: std::str::FromStr<Err = String>,
{
  value.map(str::parse::<T>).transpose().map_err(|e| eyre!(e))
}
