//! Orchestrator configuration
//!
//! Everything is read from environment variables and falls back to defaults
//! suited to running next to an `environments/` checkout.

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

use crate::service::ExecutionPolicy;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// Directory holding one sub-directory per environment
    pub environments_dir: PathBuf,

    /// Build tool program followed by leading arguments
    pub builder_command: Vec<String>,

    /// Extra arguments appended to every build invocation
    pub builder_args: Vec<String>,

    /// Time a cancelled build tool gets to exit before it is killed
    pub termination_grace_period: Duration,

    pub execution_policy: ExecutionPolicy,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognised variables:
    /// - EEBUILDER_BIND_ADDR (default: 0.0.0.0:8000)
    /// - EEBUILDER_ENVIRONMENTS_DIR (default: ./environments)
    /// - EEBUILDER_BUILDER_COMMAND (default: ansible-builder)
    /// - EEBUILDER_BUILDER_ARGS (optional, whitespace separated)
    /// - EEBUILDER_TERMINATION_GRACE_SECS (default: 10)
    /// - EEBUILDER_EXECUTION_POLICY (per-job | global, default: per-job)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_addr = var("EEBUILDER_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let environments_dir = var("EEBUILDER_ENVIRONMENTS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.environments_dir);

        let builder_command = var("EEBUILDER_BUILDER_COMMAND")
            .map(|s| split_words(&s))
            .unwrap_or(defaults.builder_command);

        let builder_args = var("EEBUILDER_BUILDER_ARGS")
            .map(|s| split_words(&s))
            .unwrap_or_default();

        let termination_grace_period = match var("EEBUILDER_TERMINATION_GRACE_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("Invalid EEBUILDER_TERMINATION_GRACE_SECS '{}'", raw))?,
            None => defaults.termination_grace_period,
        };

        let execution_policy = match var("EEBUILDER_EXECUTION_POLICY") {
            Some(raw) => raw.parse::<ExecutionPolicy>().map_err(anyhow::Error::msg)?,
            None => defaults.execution_policy,
        };

        Ok(Self {
            bind_addr,
            environments_dir,
            builder_command,
            builder_args,
            termination_grace_period,
            execution_policy,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.builder_command.is_empty() {
            anyhow::bail!("builder_command cannot be empty");
        }

        if self.termination_grace_period.is_zero() {
            anyhow::bail!("termination_grace_period must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            environments_dir: PathBuf::from("./environments"),
            builder_command: vec!["ansible-builder".to_string()],
            builder_args: Vec::new(),
            termination_grace_period: Duration::from_secs(10),
            execution_policy: ExecutionPolicy::PerJob,
        }
    }
}

fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.builder_command, vec!["ansible-builder"]);
        assert_eq!(config.termination_grace_period, Duration::from_secs(10));
        assert_eq!(config.execution_policy, ExecutionPolicy::PerJob);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup(&[("EEBUILDER_BIND_ADDR", "  ")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.environments_dir, PathBuf::from("./environments"));
        assert!(config.builder_args.is_empty());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("EEBUILDER_BIND_ADDR", "127.0.0.1:9000"),
            ("EEBUILDER_ENVIRONMENTS_DIR", "/srv/envs"),
            ("EEBUILDER_BUILDER_COMMAND", "python3 -m ansible_builder"),
            ("EEBUILDER_BUILDER_ARGS", "--verbosity 3  --no-cache"),
            ("EEBUILDER_TERMINATION_GRACE_SECS", "3"),
            ("EEBUILDER_EXECUTION_POLICY", "global"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.environments_dir, PathBuf::from("/srv/envs"));
        assert_eq!(
            config.builder_command,
            vec!["python3", "-m", "ansible_builder"]
        );
        assert_eq!(config.builder_args, vec!["--verbosity", "3", "--no-cache"]);
        assert_eq!(config.termination_grace_period, Duration::from_secs(3));
        assert_eq!(config.execution_policy, ExecutionPolicy::Global);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(
            Config::from_lookup(lookup(&[("EEBUILDER_TERMINATION_GRACE_SECS", "soon")])).is_err()
        );
        assert!(Config::from_lookup(lookup(&[("EEBUILDER_EXECUTION_POLICY", "random")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.termination_grace_period = Duration::ZERO;
        assert!(config.validate().is_err());

        config.termination_grace_period = Duration::from_secs(1);
        config.builder_command.clear();
        assert!(config.validate().is_err());
    }
}
