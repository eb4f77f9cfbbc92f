//! Mirrorstore CLI
//!
//! Loads a snapshot of mirrored objects into an indexed cache and queries it:
//! - Show store statistics
//! - List keys or fetch one object
//! - Query by index value
//! - Print the default configuration

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use mirrorstore::config::{generate_default_config, Config, ConfigSource, LoggingConfig};
use mirrorstore::objects::meta_namespace_key_func;
use mirrorstore::store::Cache;
use serde_json::Value;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mirrorstore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query a snapshot of mirrored objects through an indexed store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a default config file
    InitConfig,

    /// Show store statistics
    Stats {
        /// JSON array of objects, or a list document with an "items" array
        file: PathBuf,
    },

    /// List all keys
    Keys { file: PathBuf },

    /// Print the object stored under a key ("namespace/name" or "name")
    Get { file: PathBuf, key: String },

    /// Find objects by index value
    Query {
        file: PathBuf,
        /// Index name
        #[arg(short, long)]
        index: String,
        /// Index value
        #[arg(short, long)]
        value: String,
        /// Print keys instead of objects
        #[arg(long)]
        keys_only: bool,
    },

    /// List the values an index currently holds
    Values {
        file: PathBuf,
        #[arg(short, long)]
        index: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let source = match &cli.config {
        Some(path) => ConfigSource::from_file(path)?,
        None => Config::load_default(),
    };
    init_logging(&source.config.logging)?;
    source.report();
    let config = source.config;

    match cli.command {
        Commands::InitConfig => {
            print!("{}", generate_default_config());
        }
        Commands::Stats { file } => {
            let cache = load_cache(&config, &file)?;
            let stats = cache.stats();
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Table => {
                    println!("{}", stats);
                    let mut indexers: Vec<String> = cache.get_indexers().into_keys().collect();
                    indexers.sort();
                    for name in indexers {
                        println!(
                            "  {:<24} {} values",
                            name,
                            cache.list_index_func_values(&name).len()
                        );
                    }
                }
            }
        }
        Commands::Keys { file } => {
            let cache = load_cache(&config, &file)?;
            print_keys(cache.list_keys(), cli.format)?;
        }
        Commands::Get { file, key } => {
            let cache = load_cache(&config, &file)?;
            let Some(obj) = cache.get_by_key(&key) else {
                bail!("no object with key {:?}", key);
            };
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
        Commands::Query {
            file,
            index,
            value,
            keys_only,
        } => {
            let cache = load_cache(&config, &file)?;
            if keys_only {
                print_keys(cache.index_keys(&index, &value)?, cli.format)?;
            } else {
                print_objects(&cache, cache.by_index(&index, &value)?, cli.format)?;
            }
        }
        Commands::Values { file, index } => {
            let cache = load_cache(&config, &file)?;
            if !cache.get_indexers().contains_key(&index) {
                bail!("unknown index {:?}", index);
            }
            print_keys(cache.list_index_func_values(&index), cli.format)?;
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mirrorstore={}", config.level)));

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let (json, pretty) = if config.format == "json" {
        (Some(tracing_subscriber::fmt::layer().json().with_writer(writer)), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_writer(writer)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();

    Ok(())
}

/// Read a snapshot file and load it with a single replace
fn load_cache(config: &Config, path: &Path) -> anyhow::Result<Cache<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let (objects, resource_version) = split_snapshot(document)?;

    let indexers = config.store.build_indexers()?;
    let cache = Cache::with_capacity(
        meta_namespace_key_func(),
        indexers,
        config.store.initial_capacity.max(objects.len()),
    );
    cache
        .replace(objects, resource_version)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        items = cache.len(),
        "Loaded snapshot"
    );
    Ok(cache)
}

/// Objects and resource version from a bare array or a list document
fn split_snapshot(document: Value) -> anyhow::Result<(Vec<Value>, String)> {
    match document {
        Value::Array(objects) => Ok((objects, String::new())),
        Value::Object(mut list) => {
            let Some(Value::Array(objects)) = list.remove("items") else {
                bail!("list document has no \"items\" array");
            };
            let resource_version = list
                .get("metadata")
                .and_then(|m| m.get("resourceVersion"))
                .or_else(|| list.get("resourceVersion"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok((objects, resource_version))
        }
        _ => bail!("expected a JSON array or a list document"),
    }
}

fn print_keys(mut keys: Vec<String>, format: OutputFormat) -> anyhow::Result<()> {
    keys.sort();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
        OutputFormat::Table => {
            for key in keys {
                println!("{}", key);
            }
        }
    }
    Ok(())
}

fn print_objects(cache: &Cache<Value>, objects: Vec<Value>, format: OutputFormat) -> anyhow::Result<()> {
    let mut keyed = objects
        .into_iter()
        .map(|obj| Ok((cache.key_of(&obj)?, obj)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    match format {
        OutputFormat::Json => {
            let objects: Vec<Value> = keyed.into_iter().map(|(_, obj)| obj).collect();
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }
        OutputFormat::Table => {
            for (key, obj) in keyed {
                println!("{:<40} {}", key, obj);
            }
        }
    }
    Ok(())
}
