use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use stock_lookup_core::normalize::{lemmatizer_for, DEFAULT_MIN_TOKEN_LENGTH};
use stock_lookup_core::paginate::DEFAULT_PAGE_SIZE;
use stock_lookup_core::{ColumnMapping, Normalizer};

/// Environment variable that overrides `[catalog].path`.
pub const CATALOG_PATH_ENV: &str = "STOCKBOT_CATALOG_PATH";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub path: PathBuf,
    /// 1-based worksheet index.
    #[serde(default = "default_sheet")]
    pub sheet: usize,
    #[serde(default)]
    pub columns: ColumnMapping,
}

fn default_sheet() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_min_token_length")]
    pub min_token_length: usize,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_token_length: DEFAULT_MIN_TOKEN_LENGTH,
            language: default_language(),
        }
    }
}

fn default_min_token_length() -> usize {
    DEFAULT_MIN_TOKEN_LENGTH
}
fn default_language() -> String {
    "russian".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Config {
    /// Defaults for every section, reading `./data/SALES_Stock_report.xlsx`.
    pub fn minimal() -> Self {
        Self {
            catalog: CatalogConfig {
                path: PathBuf::from("./data/SALES_Stock_report.xlsx"),
                sheet: default_sheet(),
                columns: ColumnMapping::default(),
            },
            search: SearchConfig::default(),
            pagination: PaginationConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Builds the normalizer described by `[search]`.
    pub fn normalizer(&self) -> Result<Normalizer> {
        let n = Normalizer::from_options(self.search.min_token_length, &self.search.language)?;
        Ok(n)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_env_overrides(&mut config);
    validate(&config)?;

    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = std::env::var(CATALOG_PATH_ENV) {
        if !path.trim().is_empty() {
            tracing::info!(path = %path, "catalog path overridden from {}", CATALOG_PATH_ENV);
            config.catalog.path = PathBuf::from(path);
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.pagination.page_size == 0 {
        anyhow::bail!("pagination.page_size must be >= 1");
    }

    if config.search.min_token_length == 0 {
        anyhow::bail!("search.min_token_length must be >= 1");
    }

    if config.catalog.sheet == 0 {
        anyhow::bail!("catalog.sheet is 1-based and must be >= 1");
    }

    lemmatizer_for(&config.search.language)
        .with_context(|| "search.language must be a Snowball language or \"none\"")?;

    let columns = &config.catalog.columns;
    for (key, value) in [
        ("code", &columns.code),
        ("name", &columns.name),
        ("on_hand", &columns.on_hand),
        ("reserved", &columns.reserved),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("catalog.columns.{} must not be empty", key);
        }
    }

    Ok(())
}
