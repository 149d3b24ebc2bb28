use crate::detail::parse_card_detail;
use crate::parser::{ParseError, parse_form_schema, parse_result_page};
use crate::types::{FormSchema, ItemIdentifier, Method, QueryParameters, Record};

use futures::{StreamExt, stream};
use reqwest::{Client, Url};
use std::fmt::Display;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub search_path: String,
    /// Detail page prefix; the card number is appended as-is.
    pub detail_path: String,
    pub timeout: Duration,
    /// Detail pages in flight at once. Output order never depends on it.
    pub concurrency: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: crate::BASE_URL.to_string(),
            search_path: "/cardlist/cardsearch/exec".to_string(),
            detail_path: "/cardlist/list/?cardno=".to_string(),
            timeout: Duration::from_secs(30),
            concurrency: 1,
        }
    }
}

impl ScraperConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url, self.search_path)
    }

    pub fn detail_url(&self, id: &ItemIdentifier) -> String {
        format!("{}{}{}", self.base_url, self.detail_path, id)
    }
}

/// A fetched result listing and the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct ResultDocument {
    pub url: Url,
    pub html: String,
}

/// A page or card that could not be read during a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub source: String,
    pub error: String,
}

impl Failure {
    fn new(source: impl Into<String>, error: impl Display) -> Self {
        Self {
            source: source.into(),
            error: error.to_string(),
        }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub item_ids: Vec<ItemIdentifier>,
    pub records: Vec<Record>,
    pub failures: Vec<Failure>,
}

impl Display for SearchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nSummary:")?;
        writeln!(f, "  Cards found:   {}", self.item_ids.len())?;
        writeln!(f, "  Cards decoded: {}", self.records.len())?;
        writeln!(f, "  Failures:      {}", self.failures.len())
    }
}

fn resolve(base: &Url, href: &str) -> Result<Url, ScraperError> {
    base.join(href).map_err(|e| ScraperError::InvalidUrl {
        url: href.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    config: ScraperConfig,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(ScraperConfig::default())
    }

    pub fn with_config(config: ScraperConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub async fn fetch_form_schema(&self) -> Result<FormSchema, ScraperError> {
        let url = self.config.search_url();
        log::info!("Fetching search form from {}...", url);
        let html = self.get_html(&url).await?;
        Ok(parse_form_schema(&html)?)
    }

    /// Submits the form once and returns the first result listing.
    pub async fn submit_query(
        &self,
        schema: &FormSchema,
        params: &QueryParameters,
    ) -> Result<ResultDocument, ScraperError> {
        let search_url = self.config.search_url();
        let base = Url::parse(&search_url).map_err(|e| ScraperError::InvalidUrl {
            url: search_url.clone(),
            reason: e.to_string(),
        })?;
        let url = resolve(&base, &schema.submit_url)?;
        log::info!("Submitting search ({} {})...", schema.method, url);
        self.submit_to(url, schema.method, params).await
    }

    /// Item identifiers of the first listing followed by those of every
    /// page it links to, in document order. Pages that fail to load are
    /// reported and skipped.
    pub async fn collect_item_ids(
        &self,
        schema: &FormSchema,
        params: &QueryParameters,
        first: &ResultDocument,
    ) -> (Vec<ItemIdentifier>, Vec<Failure>) {
        let page = parse_result_page(&first.html);
        let mut items = page.items;
        let mut failures = Vec::new();
        log::info!(
            "Result page 1: {} card(s), {} more page(s)",
            items.len(),
            page.next_page_links.len()
        );

        for (i, link) in page.next_page_links.iter().enumerate() {
            let url = match resolve(&first.url, link) {
                Ok(url) => url,
                Err(e) => {
                    log::warn!("Skipping result page {}: {}", link, e);
                    failures.push(Failure::new(link.as_str(), e));
                    continue;
                }
            };

            match self.submit_to(url.clone(), schema.method, params).await {
                Ok(doc) => {
                    let page_items = parse_result_page(&doc.html).items;
                    log::info!("Result page {}: {} card(s)", i + 2, page_items.len());
                    items.extend(page_items);
                }
                Err(e) => {
                    log::warn!("Failed to fetch result page {}: {}", url, e);
                    failures.push(Failure::new(url.as_str(), e));
                }
            }
        }

        (items, failures)
    }

    pub async fn fetch_card_detail(&self, id: &ItemIdentifier) -> Result<Record, ScraperError> {
        let url = self.config.detail_url(id);
        log::info!("Fetching card {}...", id);
        let html = self.get_html(&url).await?;
        Ok(parse_card_detail(&html, &url)?)
    }

    /// Fetches detail pages with up to `concurrency` requests in flight.
    /// Records come back in the order of `ids`; unreadable cards are
    /// reported and left out.
    pub async fn fetch_records(&self, ids: &[ItemIdentifier]) -> (Vec<Record>, Vec<Failure>) {
        let results: Vec<_> = stream::iter(ids)
            .map(|id| async move { (id, self.fetch_card_detail(id).await) })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (id, result) in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("Failed to fetch card {}: {}", id, e);
                    failures.push(Failure::new(id.as_str(), e));
                }
            }
        }
        (records, failures)
    }

    /// Runs a full search: submission, pagination and detail decoding.
    /// Only a failed first submission aborts; later failures are collected
    /// alongside the records that were read.
    pub async fn search(
        &self,
        schema: &FormSchema,
        params: &QueryParameters,
    ) -> Result<SearchResults, ScraperError> {
        let first = self.submit_query(schema, params).await?;
        let (item_ids, mut failures) = self.collect_item_ids(schema, params, &first).await;
        log::info!("Compiling {} card(s)...", item_ids.len());

        let (records, detail_failures) = self.fetch_records(&item_ids).await;
        failures.extend(detail_failures);
        log::info!("Finished compilation.");

        Ok(SearchResults {
            item_ids,
            records,
            failures,
        })
    }

    async fn submit_to(
        &self,
        url: Url,
        method: Method,
        params: &QueryParameters,
    ) -> Result<ResultDocument, ScraperError> {
        let request = match method {
            Method::Get => self.client.get(url).query(params.as_pairs()),
            Method::Post => self.client.post(url).form(params.as_pairs()),
        };

        let response = request
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?;
        let url = response.url().clone();
        let html = response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        Ok(ResultDocument { url, html })
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}
