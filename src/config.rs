//! Configuration types.
//!
//! Deployment settings come from the environment; the folder policy
//! (expansion rules and scope chain) comes from an optional JSON file.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::folders::policy::{ExpansionPolicy, ExpansionRuleSpec};
use crate::folders::scorer::{ScopeChain, ScopeTier};
use crate::folders::tree::DEFAULT_MAX_IN_FLIGHT;
use crate::services::graph::DEFAULT_BASE_URL;

// ── Deployment ──────────────────────────────────────────────────────

/// Where the Graph collaborator finds its drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveLocation {
    /// The signed-in user's OneDrive.
    Personal,
    /// A known drive id.
    Drive(String),
    /// A SharePoint site path (`host:/sites/Name`) resolved at startup.
    Site(String),
}

/// Graph connection settings.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub access_token: SecretString,
    pub base_url: String,
    pub drive: DriveLocation,
}

/// Panel configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// `None` when `GRAPH_ACCESS_TOKEN` is not set (offline mode).
    pub graph: Option<GraphConfig>,
    pub policy_path: Option<PathBuf>,
    pub max_in_flight: usize,
    pub root_id: String,
}

impl PanelConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let graph = std::env::var("GRAPH_ACCESS_TOKEN").ok().map(|token| {
            let base_url =
                std::env::var("GRAPH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
            let drive = match (
                std::env::var("GRAPH_DRIVE_ID").ok(),
                std::env::var("GRAPH_SITE_PATH").ok(),
            ) {
                (Some(id), _) => DriveLocation::Drive(id),
                (None, Some(path)) => DriveLocation::Site(path),
                (None, None) => DriveLocation::Personal,
            };
            GraphConfig {
                access_token: SecretString::from(token),
                base_url,
                drive,
            }
        });

        let max_in_flight = match std::env::var("PANEL_MAX_IN_FLIGHT") {
            Ok(raw) => parse_max_in_flight(&raw)?,
            Err(_) => DEFAULT_MAX_IN_FLIGHT,
        };

        Ok(Self {
            graph,
            policy_path: std::env::var("PANEL_POLICY_PATH").ok().map(PathBuf::from),
            max_in_flight,
            root_id: std::env::var("PANEL_ROOT_ID").unwrap_or_else(|_| "root".to_string()),
        })
    }

    /// Load the policy file, or the empty policy when none is configured.
    pub fn load_policy(&self) -> Result<PanelPolicy, ConfigError> {
        match &self.policy_path {
            Some(path) => PanelPolicy::load(path),
            None => Ok(PanelPolicy::default()),
        }
    }
}

fn parse_max_in_flight(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: "PANEL_MAX_IN_FLIGHT".to_string(),
            message: format!("expected a positive integer, got {raw:?}"),
        }),
    }
}

// ── Policy file ─────────────────────────────────────────────────────

/// Folder policy as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelPolicy {
    #[serde(default)]
    pub expansion: Vec<ExpansionRuleSpec>,
    #[serde(default)]
    pub scopes: Vec<ScopeTier>,
    #[serde(default)]
    pub fallback: Option<Vec<String>>,
}

impl PanelPolicy {
    /// Read and validate a policy file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let policy = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            rules = policy.expansion.len(),
            tiers = policy.scopes.len(),
            "Loaded folder policy"
        );
        Ok(policy)
    }

    /// Parse and validate policy JSON.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let policy: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        policy.expansion_policy()?;
        if let Some(tier) = policy
            .scopes
            .iter()
            .find(|t| t.threshold.is_some_and(|v| !(0.0..=f64::MAX).contains(&v)))
        {
            return Err(ConfigError::InvalidValue {
                key: "scopes.threshold".to_string(),
                message: format!("negative or non-finite threshold in tier {:?}", tier.scope),
            });
        }
        Ok(policy)
    }

    /// Compiled expansion rules.
    pub fn expansion_policy(&self) -> Result<ExpansionPolicy, ConfigError> {
        ExpansionPolicy::from_specs(&self.expansion).map_err(|e| ConfigError::InvalidValue {
            key: "expansion".to_string(),
            message: e.to_string(),
        })
    }

    /// Scope chain for the scorer.
    pub fn scope_chain(&self) -> ScopeChain {
        ScopeChain {
            tiers: self.scopes.clone(),
            fallback: self.fallback.clone(),
        }
    }
}
