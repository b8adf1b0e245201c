mod completion;
mod config;
mod content;
mod day;
mod engine;
mod gateway;
mod normalize;
mod progress;
mod scheduler;
mod store;
mod streak;

use chrono::Timelike;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use engine::Engine;
use gateway::{
  AssetRequest, CacheWorker, Destination, HttpClient, ServedFrom, SqliteAssetStore,
};
use store::SqliteKvStore;

#[derive(Parser, Debug)]
#[command(name = "adhkar")]
#[command(about = "Offline-first adhkar engine: daily counters, streaks, and a versioned asset cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/adhkar/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Count one repetition of an item
  Count { item: String },
  /// Take back one repetition of an item
  Undo { item: String },
  /// Reset an item's count to zero
  Reset { item: String },
  /// Show per-category completion and the current streak
  Status,
  /// Search the corpus, ignoring diacritics and letter variants
  Search { query: String },
  /// Stay open and roll progress over at local midnight
  Watch,
  /// Manage the versioned asset cache
  Cache {
    #[command(subcommand)]
    command: CacheCommand,
  },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Precache the application shell and activate this cache version
  Install,
  /// Fetch a resource through the gateway's strategies
  Fetch {
    url: String,
    /// Request destination hint
    #[arg(long, value_enum, default_value_t = DestArg::Other)]
    dest: DestArg,
    /// Treat the request as accepting HTML (gets the shell fallback)
    #[arg(long)]
    html: bool,
  },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DestArg {
  Document,
  Script,
  Style,
  Image,
  Font,
  Other,
}

impl From<DestArg> for Destination {
  fn from(dest: DestArg) -> Self {
    match dest {
      DestArg::Document => Destination::Document,
      DestArg::Script => Destination::Script,
      DestArg::Style => Destination::Style,
      DestArg::Image => Destination::Image,
      DestArg::Font => Destination::Font,
      DestArg::Other => Destination::Other,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::Count { item } => {
      let engine = build_engine(&config)?;
      let count = engine.increment(&item)?;
      print_item(&engine, &item, count);
    }
    Command::Undo { item } => {
      let engine = build_engine(&config)?;
      let count = engine.undo(&item)?;
      print_item(&engine, &item, count);
    }
    Command::Reset { item } => {
      let engine = build_engine(&config)?;
      let count = engine.reset(&item)?;
      print_item(&engine, &item, count);
    }
    Command::Status => {
      print_status(&build_engine(&config)?)?;
    }
    Command::Search { query } => {
      let engine = build_engine(&config)?;
      for item in engine.search(&query) {
        let title = item.title.as_deref().unwrap_or(&item.text);
        println!(
          "{}  [{}]  {}/{}  {}",
          item.id,
          item.category_id,
          engine.count(&item.id)?,
          item.effective_target(),
          title
        );
      }
    }
    Command::Watch => {
      let engine = Arc::new(build_engine(&config)?);
      print_status(&engine)?;
      scheduler::spawn_rollover(engine);
      tokio::signal::ctrl_c().await?;
    }
    Command::Cache { command } => {
      run_cache(&config, command).await?;
    }
  }

  Ok(())
}

fn build_engine(config: &Config) -> Result<Engine<SqliteKvStore>> {
  let corpus = content::Corpus::load(&config.data_path()?)?;
  let store = Arc::new(match &config.state_db {
    Some(path) => SqliteKvStore::open_at(path)?,
    None => SqliteKvStore::open()?,
  });
  Ok(Engine::new(corpus, store, config.completion.policy()))
}

fn print_item(engine: &Engine<SqliteKvStore>, item_id: &str, count: u32) {
  let target = engine
    .corpus()
    .item(item_id)
    .map(|i| i.effective_target())
    .unwrap_or(0);
  println!("{}: {}/{}", item_id, count, target);
}

fn print_status(engine: &Engine<SqliteKvStore>) -> Result<()> {
  let status = engine.status()?;
  let now_category = engine::default_category_for_hour(chrono::Local::now().hour());

  for category in &status.categories {
    let marker = if category.complete { "x" } else { " " };
    let required = if category.required { "*" } else { " " };
    let now = if category.id == now_category { "  <- now" } else { "" };
    println!(
      "[{}]{} {:<16} {:>4}/{}{}",
      marker, required, category.id, category.progress, category.target, now
    );
  }

  println!();
  println!(
    "day: {}   streak: {} day(s)",
    if status.day_complete { "complete" } else { "in progress" },
    status.streak.count
  );
  Ok(())
}

async fn run_cache(config: &Config, command: CacheCommand) -> Result<()> {
  let store = Arc::new(match &config.cache_db {
    Some(path) => SqliteAssetStore::open_at(path)?,
    None => SqliteAssetStore::open()?,
  });
  let env = config.cache.environment();
  let settings = config.cache.worker_settings()?;
  let client = HttpClient::new()?;

  match command {
    CacheCommand::Install => {
      let mut worker = CacheWorker::new(store, env, settings);
      worker
        .install(|url| {
          let client = client.clone();
          async move { client.get(&url).await }
        })
        .await?;
      worker.activate()?;
      println!("Installed and activated {} ({:?})", worker.version(), env);
    }
    CacheCommand::Fetch { url, dest, html } => {
      let worker = CacheWorker::resume(store, env, settings);
      let mut request = AssetRequest::new(&url).with_destination(dest.into());
      if html {
        request = request.accepting_html();
      }

      let served = worker
        .handle_fetch(&request, || {
          let client = client.clone();
          let url = url.clone();
          async move { client.get(&url).await }
        })
        .await?;

      let source = match served.source {
        ServedFrom::Network => "network",
        ServedFrom::Cache => "cache",
        ServedFrom::Shell => "shell",
        ServedFrom::Synthesized => "offline",
      };
      println!(
        "{} {} ({} bytes) via {}",
        served.snapshot.status,
        url,
        served.snapshot.body.len(),
        source
      );
    }
  }

  Ok(())
}
