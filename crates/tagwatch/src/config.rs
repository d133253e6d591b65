//! TOML configuration for the tagwatch binary.
//!
//! The config file lists the repositories to track plus the broker the
//! notifications go to. Tokens are never stored in the file itself; each
//! repository may name an environment variable that holds its bearer token.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tagwatch_protocol::paths;

fn default_fetch_concurrency() -> usize {
    4
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where the persisted tag state lives. Defaults to the tagwatch home.
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    /// How many repositories to inspect in parallel per cycle.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    pub broker: BrokerConfig,

    #[serde(default, rename = "repositories")]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// ZeroMQ endpoint the publisher connects to, e.g. `tcp://127.0.0.1:5556`.
    pub endpoint: String,

    /// Prefix for notification topics. A trailing dot is tolerated.
    #[serde(default)]
    pub topic_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Full repository reference, e.g. `quay.io/acme/app` or `docker.io/library/nginx`.
    pub repo: String,

    /// Name of the environment variable holding this repository's bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

impl Config {
    /// Resolved state file path, falling back to the per-user default.
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(paths::default_state_path)
    }
}

impl RepositoryConfig {
    /// Resolve the bearer token from the configured environment variable.
    ///
    /// An unset or empty variable means anonymous access; it is not an error,
    /// the registry simply gets no Authorization header.
    pub fn token(&self) -> Option<String> {
        let var = self.token_env.as_deref()?;
        match std::env::var(var) {
            Ok(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

/// Load and parse the configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
        state_path = "/var/lib/tagwatch/state.json"
        fetch_concurrency = 8

        [broker]
        endpoint = "tcp://127.0.0.1:5556"
        topic_prefix = "registry."

        [[repositories]]
        repo = "quay.io/acme/app"
        token_env = "QUAY_TOKEN"

        [[repositories]]
        repo = "docker.io/library/nginx"
    "#;

    #[test]
    fn parses_full_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.state_path(),
            PathBuf::from("/var/lib/tagwatch/state.json")
        );
        assert_eq!(config.fetch_concurrency, 8);
        assert_eq!(config.broker.endpoint, "tcp://127.0.0.1:5556");
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[0].token_env.as_deref(), Some("QUAY_TOKEN"));
        assert!(config.repositories[1].token_env.is_none());
    }

    #[test]
    fn defaults_apply_when_fields_omitted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [broker]
            endpoint = "tcp://localhost:5556"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.state_path.is_none());
        assert_eq!(config.fetch_concurrency, 4);
        assert_eq!(config.broker.topic_prefix, "");
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            state_pth = "typo.json"

            [broker]
            endpoint = "tcp://localhost:5556"
            "#,
        )
        .unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_token_env_means_anonymous() {
        let repo = RepositoryConfig {
            repo: "quay.io/acme/app".into(),
            token_env: Some("TAGWATCH_TEST_UNSET_TOKEN_VAR".into()),
        };
        assert!(repo.token().is_none());

        let anonymous = RepositoryConfig {
            repo: "docker.io/library/nginx".into(),
            token_env: None,
        };
        assert!(anonymous.token().is_none());
    }
}
