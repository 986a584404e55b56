use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StandardResult, StrapiError};

pub const DEFAULT_API_ENDPOINT: &str = "/api";
pub const DEFAULT_LABEL: &str = "Strapi Adapter";
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// What a full-collection fetch does when a page after the first cannot be retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPagePolicy {
    /// Log the failure, leave the page out and still report success.
    #[default]
    Drop,
    /// Fail the whole call with [`StrapiError::PartialAggregation`].
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningConfig {
    pub suppress_legacy_api_warning: bool,
}

/// Adapter configuration. Built once when the context is created and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Base URL of the CMS, e.g. `https://cms.example.com`.
    pub api_location: String,
    /// Path prefix of the REST API, joined in front of every collection name.
    pub api_endpoint: String,
    pub label: String,
    pub default_page_size: u32,
    /// Maximum number of page fetches in flight. `None` fans out to every page at once.
    pub page_concurrency: Option<usize>,
    pub partial_page_policy: PartialPagePolicy,
    pub normalize_strapi_data: bool,
    pub warnings: WarningConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            api_location: String::new(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            label: DEFAULT_LABEL.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            page_concurrency: None,
            partial_page_policy: PartialPagePolicy::Drop,
            normalize_strapi_data: false,
            warnings: WarningConfig::default(),
        }
    }
}

impl AdapterConfig {
    pub fn new(api_location: impl Into<String>) -> Self {
        Self {
            api_location: api_location.into(),
            ..Self::default()
        }
    }

    pub fn with_page_concurrency(mut self, limit: usize) -> Self {
        self.page_concurrency = Some(limit);
        self
    }

    pub fn with_partial_page_policy(mut self, policy: PartialPagePolicy) -> Self {
        self.partial_page_policy = policy;
        self
    }

    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn validate(&self) -> StandardResult<()> {
        if self.api_location.trim().is_empty() {
            return Err(StrapiError::Config("Strapi API location is required.".into()));
        }
        if let Err(e) = url::Url::parse(&self.api_location) {
            return Err(StrapiError::Config(format!(
                "Invalid Strapi API location `{}`: {e}",
                self.api_location
            )));
        }
        if self.default_page_size == 0 {
            return Err(StrapiError::Config("default_page_size must be at least 1".into()));
        }
        if self.page_concurrency == Some(0) {
            return Err(StrapiError::Config("page_concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Emits the one-off configuration warnings and a summary of the loaded values.
    pub fn trace_loaded(&self) {
        if self.uses_legacy_api_location() && !self.warnings.suppress_legacy_api_warning {
            warn!(
                api_location = %self.api_location,
                "api_location is using a legacy pattern. If you meant to include (/api) in your URL, set warnings.suppress_legacy_api_warning to true"
            );
        }
        info!(
            label = %self.label,
            api_location = %self.api_location,
            api_endpoint = %self.api_endpoint,
            default_page_size = self.default_page_size,
            page_concurrency = ?self.page_concurrency,
            partial_page_policy = ?self.partial_page_policy,
            "Loaded AdapterConfig"
        );
        debug!(?self, "AdapterConfig loaded (full debug)");
    }

    pub fn uses_legacy_api_location(&self) -> bool {
        self.api_location.trim_end_matches('/').ends_with("api")
    }
}
