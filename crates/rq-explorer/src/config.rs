//! # Configuration
//!
//! `rq.toml`, two sections:
//!
//! ```toml
//! [service]
//! base_url = "http://127.0.0.1:8000/api"
//! api_key = "..."
//! timeout_secs = 30
//!
//! [explorer]
//! page_size = 50
//! sort_field = "@timestamp"
//! sort_order = "desc"
//! aggregation_field = "event.type"
//! aggregation_size = 10
//! timeline_interval = "1h"
//! columns = ["timestamp", "parser", "message"]
//! ```
//!
//! A missing file means defaults. `RQ_BASE_URL` and `RQ_API_KEY` override
//! the service section.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rq_core::state::{DEFAULT_AGGREGATION_SIZE, DEFAULT_SORT_FIELD};
use rq_core::{ColumnConfig, Mutation, QueryState, SortOrder, StateError, DEFAULT_COLUMNS};

use crate::error::FetchError;
use crate::http::HttpBackend;

pub const DEFAULT_CONFIG_FILE: &str = "rq.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct ExplorerConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub explorer: ExplorerDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Initial query state of a session.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExplorerDefaults {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_sort_field")]
    pub sort_field: String,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub aggregation_field: Option<String>,
    #[serde(default = "default_aggregation_size")]
    pub aggregation_size: usize,
    #[serde(default)]
    pub timeline_interval: Option<String>,
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
}

impl Default for ExplorerDefaults {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            sort_field: default_sort_field(),
            sort_order: SortOrder::default(),
            aggregation_field: None,
            aggregation_size: default_aggregation_size(),
            timeline_interval: None,
            columns: default_columns(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_page_size() -> usize {
    25
}
fn default_sort_field() -> String {
    DEFAULT_SORT_FIELD.to_string()
}
fn default_aggregation_size() -> usize {
    DEFAULT_AGGREGATION_SIZE
}
fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|(f, _)| f.to_string()).collect()
}

impl ExplorerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// [`load`](Self::load), then apply `RQ_BASE_URL` / `RQ_API_KEY`.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_overrides(
            std::env::var("RQ_BASE_URL").ok(),
            std::env::var("RQ_API_KEY").ok(),
        );
        Ok(config)
    }

    pub fn apply_overrides(&mut self, base_url: Option<String>, api_key: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.service.base_url = url;
        }
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.service.api_key = Some(key);
        }
    }

    pub fn backend(&self) -> Result<HttpBackend, FetchError> {
        HttpBackend::new(
            self.service.base_url.clone(),
            self.service.api_key.clone(),
            Duration::from_secs(self.service.timeout_secs),
        )
    }

    /// Validated starting state; no case is selected yet.
    pub fn initial_state(&self) -> Result<QueryState, StateError> {
        let e = &self.explorer;
        let mut state = QueryState {
            columns: ColumnConfig::with_visible(e.columns.iter().cloned()),
            ..QueryState::default()
        };
        for mutation in [
            Mutation::SetPageSize(e.page_size),
            Mutation::SetSort {
                field: e.sort_field.clone(),
                order: e.sort_order,
            },
            Mutation::SetAggregationField(e.aggregation_field.clone()),
            Mutation::SetAggregationSize(e.aggregation_size),
            Mutation::SetTimelineInterval(e.timeline_interval.clone()),
        ] {
            state = state.apply(mutation)?;
        }
        Ok(state)
    }
}
