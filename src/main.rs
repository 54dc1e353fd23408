use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use stockroom::app::{App, ListOptions, LoadMode};
use stockroom::cache::{NoopStorage, SnapshotStorage, SqliteStorage};
use stockroom::config::Config;
use stockroom::store::HttpStore;

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "Query and update a parts shop's inventory, invoices and books")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/stockroom/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Refetch even if the cached snapshot is still fresh
  #[arg(long, global = true, conflicts_with = "offline")]
  refresh: bool,

  /// Serve the last persisted snapshot without contacting the store
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
  /// Case-insensitive text to look for in names, numbers and notes
  #[arg(short, long)]
  search: Option<String>,

  /// Named filter, e.g. low-stock or overdue
  #[arg(short, long)]
  filter: Option<String>,

  /// Field to sort by
  #[arg(long)]
  sort: Option<String>,

  /// Sort descending
  #[arg(long, requires = "sort")]
  desc: bool,

  /// Page to show, starting at 1
  #[arg(short, long, default_value_t = 1)]
  page: usize,

  /// Rows per page (default from config)
  #[arg(long)]
  page_size: Option<usize>,
}

impl From<ListArgs> for ListOptions {
  fn from(args: ListArgs) -> Self {
    ListOptions {
      search: args.search,
      filter: args.filter,
      sort: args.sort,
      descending: args.desc,
      page: args.page,
      page_size: args.page_size,
    }
  }
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List parts
  Parts {
    #[command(flatten)]
    list: ListArgs,
    /// Show deactivated parts instead of active ones
    #[arg(long)]
    inactive: bool,
  },
  /// List invoices
  Invoices {
    #[command(flatten)]
    list: ListArgs,
    /// Stored status to show (draft, sent, paid, cancelled)
    #[arg(long)]
    status: Option<String>,
  },
  /// List suppliers
  Suppliers {
    #[command(flatten)]
    list: ListArgs,
    #[arg(long)]
    inactive: bool,
  },
  /// List cash-flow transactions
  Transactions {
    #[command(flatten)]
    list: ListArgs,
    /// Show voided transactions instead of posted ones
    #[arg(long)]
    voided: bool,
  },
  /// Mark a part inactive
  Deactivate { id: String },
  /// Make an inactive part active again
  Restore { id: String },
  /// Change an invoice's status
  InvoiceStatus { id: String, status: String },
  /// Profit and loss summary
  Report {
    /// First day, YYYY-MM-DD (default: start of the month)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    /// Last day, YYYY-MM-DD (default: today)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
    /// Number of best-selling parts to show
    #[arg(long)]
    top: Option<usize>,
  },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let mode = if args.offline {
    LoadMode::Offline
  } else if args.refresh {
    LoadMode::Refresh
  } else {
    LoadMode::Normal
  };

  // Offline runs never send requests, so they don't need a token
  let store = if mode == LoadMode::Offline {
    HttpStore::with_token(
      &config.store.url,
      None,
      Duration::from_secs(config.store.timeout_secs),
    )?
  } else {
    HttpStore::new(&config)?
  };

  if config.cache.persist {
    let storage = SqliteStorage::open()?;
    run(App::new(config, store, storage, mode), args.command).await
  } else {
    run(App::new(config, store, NoopStorage, mode), args.command).await
  }
}

async fn run<St: SnapshotStorage>(app: App<HttpStore, St>, command: Command) -> Result<()> {
  match command {
    Command::Parts { list, inactive } => app.list_parts(&list.into(), inactive).await,
    Command::Invoices { list, status } => app.list_invoices(&list.into(), status.as_deref()).await,
    Command::Suppliers { list, inactive } => app.list_suppliers(&list.into(), inactive).await,
    Command::Transactions { list, voided } => app.list_transactions(&list.into(), voided).await,
    Command::Deactivate { id } => app.deactivate_part(&id).await,
    Command::Restore { id } => app.restore_part(&id).await,
    Command::InvoiceStatus { id, status } => app.set_invoice_status(&id, &status).await,
    Command::Report { from, to, top } => app.report(from, to, top).await,
  }
}

/// Log to `<data dir>/stockroom/stockroom.log`, filtered by STOCKROOM_LOG
/// (default `warn`). Falls back to stderr if the data dir is unusable.
fn init_logging() -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env("STOCKROOM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

  let (writer, guard) = match log_dir() {
    Ok(dir) => {
      let appender = tracing_appender::rolling::never(dir, "stockroom.log");
      let (non_blocking, guard) = tracing_appender::non_blocking(appender);
      (BoxMakeWriter::new(non_blocking), Some(guard))
    }
    Err(_) => (BoxMakeWriter::new(std::io::stderr), None),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  guard
}

fn log_dir() -> Result<PathBuf> {
  let path = SqliteStorage::default_path()?;
  let dir = path
    .parent()
    .map(Path::to_path_buf)
    .ok_or_else(|| eyre!("Could not determine log directory"))?;
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create log directory: {}", e))?;
  Ok(dir)
}
