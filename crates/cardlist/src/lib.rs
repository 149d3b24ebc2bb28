pub mod collector;
pub mod detail;
pub mod export;
pub mod parser;
pub mod scraper;
pub mod types;

pub use collector::{Prompter, StdioPrompter, ValueCollector};
pub use scraper::{ScraperConfig, ScraperError, WebScraper};

pub(crate) const BASE_URL: &str = "https://en.ws-tcg.com";
