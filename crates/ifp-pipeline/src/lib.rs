//! State query orchestration: one fetch → extract → normalize pass per fuel type,
//! merged into a single per-city result.
//!
//! Every call builds its result from scratch; nothing is cached between queries.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use ifp_adapters::{adapter_for_source, normalize, PageAdapter};
use ifp_core::{city_id, CityMerger, Diagnostic, FuelType, StateDirectory, StateResult, StateSlug};
use ifp_fetch::{BackoffPolicy, FetchError, HttpClientConfig, HttpFetcher, PageFetcher, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "ifp-pipeline";

/// What a failed page fetch does to the rest of the query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    /// The whole query fails on the first fetch error.
    #[default]
    Abort,
    /// The failed fuel type contributes nothing and a diagnostic is recorded.
    Partial,
}

impl FromStr for FetchFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "partial" => Ok(Self::Partial),
            other => bail!("unknown fetch failure policy {other:?} (expected abort or partial)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_id: String,
    /// Overrides the adapter's site root when set.
    pub base_url: Option<String>,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub http_max_retries: usize,
    pub http_concurrency: usize,
    pub fetch_failure_policy: FetchFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_id: "goodreturns".to_string(),
            base_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_secs: 20,
            http_max_retries: 0,
            http_concurrency: 8,
            fetch_failure_policy: FetchFailurePolicy::Abort,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let fetch_failure_policy = match std::env::var("IFP_FETCH_FAILURE_POLICY") {
            Ok(value) => value
                .parse()
                .context("parsing IFP_FETCH_FAILURE_POLICY")?,
            Err(_) => defaults.fetch_failure_policy,
        };

        Ok(Self {
            source_id: std::env::var("IFP_SOURCE").unwrap_or(defaults.source_id),
            base_url: std::env::var("IFP_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            user_agent: std::env::var("IFP_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: std::env::var("IFP_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            http_max_retries: std::env::var("IFP_HTTP_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_max_retries),
            http_concurrency: std::env::var("IFP_HTTP_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_concurrency),
            fetch_failure_policy,
        })
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("state not found: {name:?}")]
    StateNotFound { name: String },
    #[error("fetching {fuel} prices failed: {source}")]
    Fetch {
        fuel: FuelType,
        url: String,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub run_id: Uuid,
    pub result: StateResult,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct QueryPipeline {
    config: PipelineConfig,
    states: StateDirectory,
    adapter: Box<dyn PageAdapter>,
    fetcher: Arc<dyn PageFetcher>,
}

impl QueryPipeline {
    /// Pipeline that fetches live pages over HTTP.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let adapter = adapter_for_source(&config.source_id)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| adapter.default_base_url().to_string());
        let http = HttpFetcher::new(HttpClientConfig {
            base_url,
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: config.user_agent.clone(),
            concurrency: config.http_concurrency,
            backoff: BackoffPolicy {
                max_retries: config.http_max_retries,
                ..Default::default()
            },
        })?;
        Ok(Self {
            config,
            states: StateDirectory::bundled(),
            adapter,
            fetcher: Arc::new(http),
        })
    }

    /// Pipeline that reads pages through `fetcher` instead of the network.
    pub fn with_fetcher(config: PipelineConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let adapter = adapter_for_source(&config.source_id)?;
        Ok(Self {
            config,
            states: StateDirectory::bundled(),
            adapter,
            fetcher,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn states(&self) -> &StateDirectory {
        &self.states
    }

    pub async fn query_state(&self, state_name: &str) -> Result<QueryOutcome, QueryError> {
        self.query_state_on(state_name, Local::now().date_naive()).await
    }

    /// Runs one query with every city stamped `applicable_on`.
    pub async fn query_state_on(
        &self,
        state_name: &str,
        applicable_on: NaiveDate,
    ) -> Result<QueryOutcome, QueryError> {
        let slug = self
            .states
            .lookup(state_name)
            .cloned()
            .ok_or_else(|| QueryError::StateNotFound {
                name: state_name.to_string(),
            })?;

        let run_id = Uuid::new_v4();
        let span = info_span!("state_query", %run_id, state = %slug, source = self.adapter.source_id());
        self.run(run_id, state_name, &slug, applicable_on)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        run_id: Uuid,
        state_name: &str,
        slug: &StateSlug,
        applicable_on: NaiveDate,
    ) -> Result<QueryOutcome, QueryError> {
        let tokens = slug.title_tokens();
        let mut merger = CityMerger::new(applicable_on);
        let mut diagnostics = Vec::new();

        for fuel in FuelType::ALL {
            let path = self.adapter.page_path(fuel, slug);
            let markup = match self.fetcher.fetch_page(run_id, &path).await {
                Ok(markup) => markup,
                Err(source) => {
                    let url = self.fetcher.page_url(&path);
                    match self.config.fetch_failure_policy {
                        FetchFailurePolicy::Abort => {
                            return Err(QueryError::Fetch { fuel, url, source });
                        }
                        FetchFailurePolicy::Partial => {
                            warn!(%fuel, %url, error = %source, "skipping fuel type after fetch failure");
                            diagnostics.push(Diagnostic::FetchFailed {
                                fuel,
                                url,
                                message: source.to_string(),
                            });
                            continue;
                        }
                    }
                }
            };

            let extraction = self.adapter.extract(&markup, &tokens, fuel);
            for diagnostic in &extraction.diagnostics {
                warn!(%fuel, %diagnostic, "page failed structure checks");
            }
            debug!(%fuel, rows = extraction.rows.len(), "extracted price rows");

            for row in extraction.rows {
                let entry = normalize(&row.today_text, &row.yesterday_text).into_entry();
                merger.merge(&city_id(&row.city_name), &row.city_name, fuel, entry);
            }
            diagnostics.extend(extraction.diagnostics);
        }

        let result = StateResult::new(slug, state_name, merger.into_records());
        info!(
            cities = result.city_prices.len(),
            diagnostics = diagnostics.len(),
            "state query complete"
        );
        Ok(QueryOutcome {
            run_id,
            result,
            diagnostics,
        })
    }
}
