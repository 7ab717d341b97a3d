use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string. Falls back to `DATABASE_URL` when unset.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Policy knobs for the aggregation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Contribution weight used when a course has no weight row for an outcome.
    #[serde(default = "default_weight")]
    pub default_weight: f64,

    /// Outcome scores below this raise a danger alert and count as at-risk.
    #[serde(default = "default_danger_threshold")]
    pub danger_threshold: f64,

    /// Outcome scores below this (and at or above danger) raise a warning.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Size of the student pool examined by the at-risk view.
    #[serde(default = "default_candidate_limit")]
    pub at_risk_candidate_limit: usize,

    #[serde(default = "default_top_performance")]
    pub top_performance: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_weight: default_weight(),
            danger_threshold: default_danger_threshold(),
            warning_threshold: default_warning_threshold(),
            at_risk_candidate_limit: default_candidate_limit(),
            top_performance: default_top_performance(),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

fn default_danger_threshold() -> f64 {
    55.0
}

fn default_warning_threshold() -> f64 {
    70.0
}

fn default_candidate_limit() -> usize {
    100
}

fn default_top_performance() -> usize {
    5
}

impl Config {
    /// Loads the file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                Self::from_toml(&content)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        let analytics = &self.analytics;
        if !analytics.default_weight.is_finite() || analytics.default_weight <= 0.0 {
            bail!("analytics.default_weight must be positive");
        }
        if analytics.warning_threshold < analytics.danger_threshold {
            bail!("analytics.warning_threshold must not be below analytics.danger_threshold");
        }
        if analytics.at_risk_candidate_limit == 0 {
            bail!("analytics.at_risk_candidate_limit must be at least 1");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        Ok(())
    }

    /// Connection string from the file, else from `DATABASE_URL`.
    pub fn database_url(&self) -> Result<String> {
        match &self.database.url {
            Some(url) => Ok(url.clone()),
            None => std::env::var("DATABASE_URL")
                .context("DATABASE_URL must be set when database.url is not configured"),
        }
    }
}
