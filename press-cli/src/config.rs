use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use press_core::SiteConfig;
use press_core::builder::default_root_files;
use serde::{Deserialize, Serialize};

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PressConfig {
    pub build: BuildConfig,
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Directory holding metadata, markdown, static files and templates
    pub source: String,
    /// Output directory for the generated site
    pub output: String,
    /// Template directory; empty means `<source>/templates`
    pub templates: String,
    /// Configuration file path
    pub config: String,
    /// Host for the dev server
    pub host: String,
    /// Port for the dev server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
    /// Cache-busting token; empty draws a random one per build
    pub cache_token: String,
    /// Files copied from the source root into the output root
    pub root_files: Vec<String>,
    /// Output-relative pages left out of the sitemap
    pub sitemap_exclude: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "./src".to_string(),
            output: "./published".to_string(),
            templates: String::new(),
            config: "./press.toml".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            open: false,
            cache_token: String::new(),
            root_files: default_root_files(),
            sitemap_exclude: vec!["404.html".to_string()],
        }
    }
}

impl BuildConfig {
    pub fn source_dir(&self) -> PathBuf {
        PathBuf::from(&self.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output)
    }

    pub fn templates_dir(&self) -> PathBuf {
        if self.templates.is_empty() {
            self.source_dir().join("templates")
        } else {
            PathBuf::from(&self.templates)
        }
    }

    pub fn cache_token(&self) -> Option<&str> {
        (!self.cache_token.is_empty()).then_some(self.cache_token.as_str())
    }
}

impl PressConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (PRESS_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = arg(args, "config").unwrap_or_else(|| BuildConfig::default().config);

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        builder = builder.add_source(ConfigBuilder::try_from(&Self::default())?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        }

        // 3. Add environment variables with PRESS_ prefix
        builder = builder.add_source(
            Environment::with_prefix("PRESS")
                .prefix_separator("_")
                .separator("__"),
        );

        // 4. Override with CLI arguments that were actually given
        let mut cli_overrides = HashMap::new();
        for key in ["source", "output", "templates", "config", "host", "cache_token"] {
            if let Some(value) = arg(args, key) {
                cli_overrides.insert(format!("build.{key}"), value);
            }
        }
        if let Some(port) = arg(args, "port") {
            let port: u16 = port.parse().map_err(|_| anyhow::anyhow!("invalid port: {port}"))?;
            cli_overrides.insert("build.port".to_string(), port.to_string());
        }
        if args.try_get_one::<bool>("open").ok().flatten() == Some(&true) {
            cli_overrides.insert("build.open".to_string(), "true".to_string());
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(ConfigBuilder::try_from(&cli_overrides)?);
        }

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

/// A string argument, if this subcommand defines it and it was given.
fn arg(args: &ArgMatches, id: &str) -> Option<String> {
    args.try_get_one::<String>(id).ok().flatten().cloned()
}
