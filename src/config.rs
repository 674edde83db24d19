use dotenvy::dotenv;
use std::env;
use uuid::Uuid;

const DEFAULT_NAMESPACE: &str = "loyalty";

/// Scenario metrics configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Prefix for every metric name
    pub namespace: String,
    /// Tags attached to every metric
    pub default_tags: Vec<String>,
}

impl ReporterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let unknown = || "unknown".to_string();

        Self {
            namespace: var("METRICS_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            default_tags: vec![
                format!("repository:{}", var("GITHUB_REPOSITORY").unwrap_or_else(unknown)),
                format!("workflow:{}", var("GITHUB_WORKFLOW").unwrap_or_else(unknown)),
                format!(
                    "run_id:{}",
                    var("GITHUB_RUN_ID").unwrap_or_else(|| Uuid::new_v4().to_string())
                ),
                format!("commit:{}", var("GITHUB_SHA").unwrap_or_else(unknown)),
                format!("branch:{}", var("GITHUB_REF_NAME").unwrap_or_else(unknown)),
            ],
        }
    }

    /// Configuration with the given namespace and no default tags
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            default_tags: Vec::new(),
        }
    }

    pub(crate) fn metric_name(&self, suffix: &str) -> String {
        format!("{}.{}", self.namespace, suffix)
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }
}
