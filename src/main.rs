//! Konsum CLI
//!
//! Command-line interface for the konsum meter store:
//! - Define categories (meters)
//! - Record and list values
//! - Attach notes
//! - Export everything as text

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use konsum_db::config::{generate_default_config, Config, LoggingConfig};
use konsum_db::model::{key::SEPARATOR, Category, Entity, ModelError, Note, TimeQuery};
use konsum_db::storage::{open_store, Backend, Store};
use konsum_db::time::{format_time, now_millis, parse_time};

#[derive(Parser)]
#[command(name = "konsum")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Utility meter readings and notes in a sorted key-value store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/konsum/config.toml or ./konsum.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overrides the configured path
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Store backend (sqlite, memory)
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },

    /// Record values
    Value {
        #[command(subcommand)]
        command: ValueCommands,
    },

    /// List the values of a category
    Values {
        /// Category name
        category: String,
        /// Earliest time (ms, "now-7d", RFC 3339, YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest time
        #[arg(long)]
        to: Option<String>,
        /// Newest first
        #[arg(short, long)]
        reverse: bool,
        /// Stop after this many values
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print raw "<time> <value>" lines for piping into other tools
        #[arg(long)]
        pipe: bool,
    },

    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// List notes, optionally of one category
    Notes {
        /// Category name
        category: Option<String>,
        /// Earliest time; needs a category
        #[arg(long, requires = "category")]
        from: Option<String>,
        /// Latest time; needs a category
        #[arg(long, requires = "category")]
        to: Option<String>,
        /// Newest first; needs a category
        #[arg(short, long, requires = "category")]
        reverse: bool,
    },

    /// Export categories and notes as INI-style text
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create or replace a category
    Add {
        name: String,
        #[arg(short, long)]
        unit: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Decimal places used when printing values
        #[arg(long)]
        fractional_digits: Option<u32>,
    },

    /// List categories
    List {
        /// First name to include
        #[arg(long)]
        from: Option<String>,
        /// Last name to include
        #[arg(long)]
        to: Option<String>,
    },

    /// Show one category and its latest value
    Show { name: String },
}

#[derive(Subcommand)]
pub enum ValueCommands {
    /// Record a value
    Add {
        category: String,
        value: f64,
        /// Timestamp (default: now)
        #[arg(short, long)]
        time: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Attach a note to a category
    Add {
        category: String,
        description: String,
        /// Timestamp (default: now)
        #[arg(short, long)]
        time: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_ref());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(path) = &cli.database {
        config.storage.path = path.clone();
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }

    init_logging(&config.logging)?;

    let store = open_store(&config.storage)
        .with_context(|| format!("Failed to open store at {:?}", config.storage.path))?;
    let json = cli.format == "json";

    run(cli.command, store, json).await
}

async fn run(command: Commands, store: Arc<dyn Store>, json: bool) -> Result<()> {
    let store = store.as_ref();

    match command {
        Commands::Category { command } => match command {
            CategoryCommands::Add {
                name,
                unit,
                description,
                fractional_digits,
            } => {
                if name.is_empty() || name.contains(SEPARATOR) {
                    bail!(
                        "Category names must be non-empty and must not contain '{}'",
                        SEPARATOR
                    );
                }

                let mut category = Category::new(name);
                if let Some(unit) = unit {
                    category = category.with_unit(unit);
                }
                if let Some(description) = description {
                    category = category.with_description(description);
                }
                if let Some(digits) = fractional_digits {
                    category = category.with_fractional_digits(digits);
                }
                category.write(store).await?;
                println!("Saved {}", category);
            }

            CategoryCommands::List { from, to } => {
                let mut scan =
                    Category::entries_between(store, from.as_deref(), to.as_deref()).await?;
                let mut categories = Vec::new();
                while let Some(category) = scan.next().await? {
                    if !category.name().contains(SEPARATOR) {
                        categories.push(category);
                    }
                }

                if json {
                    println!("{}", serde_json::to_string_pretty(&categories)?);
                } else if categories.is_empty() {
                    println!("No categories defined yet.");
                    println!();
                    println!("Create your first category with:");
                    println!("  konsum category add power --unit kWh");
                } else {
                    println!("{:<20} {:<8} {:<7} {}", "Name", "Unit", "Digits", "Description");
                    println!("{}", "-".repeat(60));
                    for category in &categories {
                        println!(
                            "{:<20} {:<8} {:<7} {}",
                            category.name(),
                            category.unit().unwrap_or("-"),
                            category
                                .fractional_digits()
                                .map(|d| d.to_string())
                                .unwrap_or_else(|| "-".to_string()),
                            category.description().unwrap_or(""),
                        );
                    }
                }
            }

            CategoryCommands::Show { name } => {
                let category = load_category(store, &name).await?;
                let latest = category
                    .values(store, TimeQuery::new().reverse(true))
                    .await?
                    .next()
                    .await?;

                if json {
                    let body = serde_json::json!({
                        "category": category,
                        "latest": latest,
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                } else {
                    println!("{}", category);
                    if let Some(description) = category.description() {
                        println!("  {}", description);
                    }
                    match latest {
                        Some(value) => println!(
                            "  Latest: {} at {}",
                            format_value(&category, value.value),
                            format_time(value.time)
                        ),
                        None => println!("  No values recorded"),
                    }
                }
            }
        },

        Commands::Value { command } => match command {
            ValueCommands::Add {
                category,
                value,
                time,
            } => {
                let category = load_category(store, &category).await?;
                let time = resolve_time(time.as_deref())?;
                category.write_value(store, value, time).await?;
                println!(
                    "Recorded {}: {} at {}",
                    category.name(),
                    format_value(&category, value),
                    format_time(time)
                );
            }
        },

        Commands::Values {
            category,
            from,
            to,
            reverse,
            limit,
            pipe,
        } => {
            let category = load_category(store, &category).await?;

            if pipe {
                let mut stdout = tokio::io::stdout();
                category.pipe(store, &mut stdout).await?;
                return Ok(());
            }

            let query = time_query(from.as_deref(), to.as_deref(), reverse)?;
            let mut scan = category.values(store, query).await?;
            let limit = limit.unwrap_or(usize::MAX);
            let mut values = Vec::new();
            while values.len() < limit {
                match scan.next().await? {
                    Some(value) => values.push(value),
                    None => break,
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else if values.is_empty() {
                println!("No values in range.");
            } else {
                let unit = category.unit().unwrap_or("");
                println!("{:<26} {:>14}", "Time", format!("Value ({})", unit));
                println!("{}", "-".repeat(41));
                for value in &values {
                    println!(
                        "{:<26} {:>14}",
                        format_time(value.time),
                        format_value(&category, value.value)
                    );
                }
            }
        }

        Commands::Note { command } => match command {
            NoteCommands::Add {
                category,
                description,
                time,
            } => {
                if let Err(ModelError::NotFound(_)) = Category::entry(store, &category).await {
                    tracing::warn!(category = %category, "note refers to an unknown category");
                }
                let time = resolve_time(time.as_deref())?;
                let note = Note::new(time, category, description)?;
                note.write(store).await?;
                println!("Saved note {}", note.key());
            }
        },

        Commands::Notes {
            category,
            from,
            to,
            reverse,
        } => {
            let query = time_query(from.as_deref(), to.as_deref(), reverse)?;
            let scan = match &category {
                Some(category) => Note::entries_for(store, category, query).await?,
                None => Note::entries(store).await?,
            };
            let notes = scan.try_collect().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&notes)?);
            } else if notes.is_empty() {
                println!("No notes found.");
            } else {
                for note in &notes {
                    println!(
                        "{:<26} {:<20} {}",
                        format_time(note.time()),
                        note.category(),
                        note.description().unwrap_or("")
                    );
                }
            }
        }

        Commands::Export { output } => {
            let blocks = match output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {:?}", path))?;
                    let blocks = konsum_db::export_text(store, &mut file).await?;
                    eprintln!("Exported {} blocks to {:?}", blocks, path);
                    blocks
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    let blocks = konsum_db::export_text(store, &mut stdout).await?;
                    stdout.flush().await?;
                    blocks
                }
            };
            tracing::info!(blocks, "export finished");
        }

        Commands::Config { output } => write_default_config(output.as_ref())?,
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level: {}", logging.level))?;
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        _ => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }

    Ok(())
}

fn write_default_config(output: Option<&PathBuf>) -> Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn load_category(store: &dyn Store, name: &str) -> Result<Category> {
    match Category::entry(store, name).await {
        Ok(category) => Ok(category),
        Err(ModelError::NotFound(_)) => bail!(
            "Unknown category '{}'. Create it with: konsum category add {}",
            name,
            name
        ),
        Err(e) => Err(e.into()),
    }
}

fn resolve_time(time: Option<&str>) -> Result<i64> {
    match time {
        Some(s) => Ok(parse_time(s)?),
        None => Ok(now_millis()),
    }
}

fn time_query(from: Option<&str>, to: Option<&str>, reverse: bool) -> Result<TimeQuery> {
    let mut query = TimeQuery::new().reverse(reverse);
    if let Some(from) = from {
        query = query.gte(parse_time(from)?);
    }
    if let Some(to) = to {
        query = query.lte(parse_time(to)?);
    }
    Ok(query)
}

fn format_value(category: &Category, value: f64) -> String {
    format!("{:.*}", category.fractional_digits().unwrap_or(2), value)
}
