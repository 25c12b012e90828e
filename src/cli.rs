//! Minimal CLI parsing for configuration overrides.

use std::env;

use anyhow::{Context, Result};

use crate::config::{Config, parse_upstream_url};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub port_override: Option<String>,
    pub upstream_url_override: Option<String>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    /// Parse `--port` and `--upstream-url` (space or `=` separated). Unknown
    /// arguments are ignored.
    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--port" => options.port_override = args.next(),
                "--upstream-url" => options.upstream_url_override = args.next(),
                _ if arg.starts_with("--port=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.port_override = Some(value.to_string());
                    }
                }
                _ if arg.starts_with("--upstream-url=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.upstream_url_override = Some(value.to_string());
                    }
                }
                _ => {}
            }
        }
        options
    }

    /// Apply the overrides on top of the environment configuration.
    pub fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(port) = self.port_override {
            config.port = port.parse().context("Invalid --port")?;
        }
        if let Some(url) = self.upstream_url_override {
            config.upstream_url = parse_upstream_url(&url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_both_forms() {
        let options = CliOptions::parse(args(&[
            "--port",
            "5000",
            "--upstream-url=http://coins.internal/coins",
            "--verbose",
        ]));
        assert_eq!(
            options,
            CliOptions {
                port_override: Some("5000".to_string()),
                upstream_url_override: Some("http://coins.internal/coins".to_string()),
            }
        );
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::from_lookup(|_| None).unwrap();
        CliOptions::parse(args(&["--port=9000", "--upstream-url", "https://x.test/coins"]))
            .apply(&mut config)
            .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.upstream_url.as_str(), "https://x.test/coins");
    }

    #[test]
    fn test_apply_rejects_bad_port() {
        let mut config = Config::from_lookup(|_| None).unwrap();
        let result = CliOptions::parse(args(&["--port", "-1"])).apply(&mut config);
        assert!(result.is_err());
        assert_eq!(config.port, 4002);
    }
}
