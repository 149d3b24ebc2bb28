use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use cardlist::collector::{DEFAULT_PAGE_SIZE, StdioPrompter, ValueCollector};
use cardlist::export::{write_records, write_records_json};
use cardlist::types::ItemIdentifier;
use cardlist::{ScraperConfig, WebScraper};
use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "cardlist")]
#[command(about = "Search the card catalog and save decoded card details", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        global = true,
        default_value = "https://en.ws-tcg.com",
        help = "Catalog site to query"
    )]
    base_url: String,

    #[arg(
        long,
        global = true,
        default_value_t = 30,
        help = "Request timeout in seconds"
    )]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill in the search form interactively and save every matching card
    Search {
        #[arg(
            short = 'o',
            long = "output",
            default_value = "card_info.txt",
            help = "File to write the decoded cards to"
        )]
        output: PathBuf,

        #[arg(
            short = 'f',
            long = "format",
            value_enum,
            default_value = "text",
            help = "Output file format"
        )]
        format: OutputFormat,

        #[arg(
            long,
            default_value_t = DEFAULT_PAGE_SIZE,
            help = "Options shown per page when browsing a selection",
            value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
        )]
        page_size: usize,

        #[arg(
            long,
            default_value_t = 1,
            help = "Card detail pages fetched at once",
            value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
        )]
        concurrency: usize,

        #[arg(
            long = "set",
            value_name = "NAME=VALUE",
            value_parser = parse_preset,
            help = "Answer a form field up front instead of being prompted (repeatable)"
        )]
        presets: Vec<(String, String)>,
    },
    /// Fetch and decode a single card by its card number
    Card {
        #[arg(help = "Card number, e.g. AB/W31-E058")]
        id: String,

        #[arg(
            short = 'f',
            long = "format",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Show the fields of the search form
    Form {
        #[arg(
            short = 'f',
            long = "format",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_preset(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Expected NAME=VALUE, got '{}'", s)),
    }
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn build_scraper(cli: &Cli, concurrency: usize) -> WebScraper {
    let config = ScraperConfig {
        timeout: Duration::from_secs(cli.timeout),
        concurrency,
        ..ScraperConfig::with_base_url(&cli.base_url)
    };
    WebScraper::with_config(config).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match &cli.command {
        Commands::Search {
            output,
            format,
            page_size,
            concurrency,
            presets,
        } => {
            let scraper = build_scraper(&cli, *concurrency);

            let schema = scraper.fetch_form_schema().await.unwrap_or_else(|e| {
                log::error!("Error reading search form: {}", e);
                process::exit(1);
            });

            let presets: HashMap<String, String> = presets.iter().cloned().collect();
            let page_size = *page_size;
            let form = schema.clone();
            let params = tokio::task::spawn_blocking(move || {
                ValueCollector::new(StdioPrompter::new())
                    .with_page_size(page_size)
                    .with_presets(presets)
                    .collect(&form)
            })
            .await
            .unwrap_or_else(|e| {
                log::error!("Prompt task failed: {}", e);
                process::exit(1);
            })
            .unwrap_or_else(|e| {
                log::error!("Error collecting search values: {}", e);
                process::exit(1);
            });

            let results = scraper.search(&schema, &params).await.unwrap_or_else(|e| {
                log::error!("Error submitting search: {}", e);
                process::exit(1);
            });

            for failure in &results.failures {
                log::warn!("Skipped {}", failure);
            }

            let saved = match format {
                OutputFormat::Text => write_records(output, &results.records),
                OutputFormat::Json => write_records_json(output, &results.records),
            };
            if let Err(e) = saved {
                log::error!("Error writing {}: {}", output.display(), e);
                process::exit(1);
            }

            print!("{}", results);
        }

        Commands::Card { id, format } => {
            let scraper = build_scraper(&cli, 1);
            let record = scraper
                .fetch_card_detail(&ItemIdentifier::new(id.as_str()))
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error fetching card {}: {}", id, e);
                    process::exit(1);
                });

            match format {
                OutputFormat::Json => serialize_json(&record),
                OutputFormat::Text => print!("{}", record),
            }
        }

        Commands::Form { format } => {
            let scraper = build_scraper(&cli, 1);
            let schema = scraper.fetch_form_schema().await.unwrap_or_else(|e| {
                log::error!("Error reading search form: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&schema),
                OutputFormat::Text => println!("{}", schema),
            }
        }
    }
}
