//! Environment-driven configuration: one small document selecting
//! model endpoints, budgets, and feature flags.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,

    pub serp_url_template: String,
    pub academic_url_template: String,
    pub tor_proxy_url: String,
    pub archive_availability_api_base: String,

    pub llm_api_key: String,
    pub llm_model: String,
    pub embed_url: String,
    pub rerank_url: String,
    pub nli_url: String,

    /// Default cap on pages fetched by a single search before it is
    /// forced to `exhausted`.
    pub serp_max_pages: u32,
    pub default_task_max_pages: u32,
    pub default_task_max_seconds: u64,

    pub step_timeout: Duration,
    pub fetch_rung_timeout: Duration,
    pub llm_call_timeout: Duration,

    /// How long an auth-queue item may sit with no operator action
    /// before `get_status.waiting_for` surfaces it.
    pub auth_wait_stale_after: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            serp_url_template: env::var("SERP_URL_TEMPLATE")
                .unwrap_or_else(|_| "https://search.example.invalid/?q={query}".to_string()),
            academic_url_template: env::var("ACADEMIC_URL_TEMPLATE").unwrap_or_else(|_| {
                "https://api.crossref.example.invalid/works?query={query}".to_string()
            }),
            tor_proxy_url: env::var("TOR_PROXY_URL")
                .unwrap_or_else(|_| "socks5h://127.0.0.1:9050".to_string()),
            archive_availability_api_base: env::var("ARCHIVE_AVAILABILITY_API_BASE")
                .unwrap_or_else(|_| "https://archive.org/wayback/available".to_string()),

            llm_api_key: env::var("LLM_API_KEY").context("LLM_API_KEY must be set")?,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
            embed_url: env::var("EMBED_URL").context("EMBED_URL must be set")?,
            rerank_url: env::var("RERANK_URL").context("RERANK_URL must be set")?,
            nli_url: env::var("NLI_URL").context("NLI_URL must be set")?,

            serp_max_pages: env::var("SERP_MAX_PAGES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("SERP_MAX_PAGES must be a valid number")?,
            default_task_max_pages: env::var("DEFAULT_TASK_MAX_PAGES")
                .unwrap_or_else(|_| "40".to_string())
                .parse()
                .context("DEFAULT_TASK_MAX_PAGES must be a valid number")?,
            default_task_max_seconds: env::var("DEFAULT_TASK_MAX_SECONDS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .context("DEFAULT_TASK_MAX_SECONDS must be a valid number")?,

            step_timeout: Duration::from_secs(
                env::var("STEP_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("STEP_TIMEOUT_SECONDS must be a valid number")?,
            ),
            fetch_rung_timeout: Duration::from_secs(
                env::var("FETCH_RUNG_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("FETCH_RUNG_TIMEOUT_SECONDS must be a valid number")?,
            ),
            llm_call_timeout: Duration::from_secs(
                env::var("LLM_CALL_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .context("LLM_CALL_TIMEOUT_SECONDS must be a valid number")?,
            ),
            auth_wait_stale_after: Duration::from_secs(
                env::var("AUTH_WAIT_STALE_SECONDS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .context("AUTH_WAIT_STALE_SECONDS must be a valid number")?,
            ),
        })
    }
}
