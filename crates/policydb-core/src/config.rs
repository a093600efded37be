//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (`__` separates nesting, e.g.
//! `APP_GRAPH__PASSWORD`). [`Settings`] is the typed view of the result.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::{ChunkingMode, DEFAULT_WINDOW};
use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Build from an explicit figment (layered on the defaults).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration.
    pub fn settings(&self) -> crate::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if matches!(env, "prod" | "production") && settings.graph.uri.is_some() {
            settings.graph.require_credentials()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub vector: VectorSettings,
    pub graph: GraphSettings,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
    pub usage_log: UsageLogSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if !r.graph_score_penalty.is_finite() || r.graph_score_penalty < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "retrieval.graph_score_penalty must be a non-negative number, got {}",
                r.graph_score_penalty
            )));
        }
        if self.vector.collection.trim().is_empty() {
            return Err(Error::InvalidConfig("vector.collection must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub path: String,
    pub collection: String,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self { path: "data/lancedb".to_string(), collection: "governance_docs".to_string() }
    }
}

impl VectorSettings {
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub timeout_secs: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self { uri: None, user: None, password: None, database: "neo4j".to_string(), timeout_secs: 10 }
    }
}

impl GraphSettings {
    /// `(uri, user, password)`, or an error naming every missing field.
    pub fn require_credentials(&self) -> crate::Result<(&str, &str, &str)> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }
        match (present(&self.uri), present(&self.user), present(&self.password)) {
            (Some(uri), Some(user), Some(password)) => Ok((uri, user, password)),
            (uri, user, password) => {
                let missing: Vec<&str> = [("graph.uri", uri), ("graph.user", user), ("graph.password", password)]
                    .into_iter()
                    .filter(|(_, v)| v.is_none())
                    .map(|(k, _)| k)
                    .collect();
                Err(Error::InvalidConfig(format!("missing graph settings: {}", missing.join(", "))))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub expand_graph: bool,
    /// Added to the distance of chunks reached only through the graph.
    pub graph_score_penalty: f32,
    pub graph_chunks_per_doc: usize,
    pub rel_types: Option<Vec<String>>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, expand_graph: true, graph_score_penalty: 0.1, graph_chunks_per_doc: 2, rel_types: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Headers,
    SentenceWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub mode: ChunkingStrategy,
    pub window: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { mode: ChunkingStrategy::Headers, window: DEFAULT_WINDOW }
    }
}

impl ChunkingSettings {
    pub fn mode(&self) -> ChunkingMode {
        match self.mode {
            ChunkingStrategy::Headers => ChunkingMode::Headers,
            ChunkingStrategy::SentenceWindow => ChunkingMode::SentenceWindow { window: self.window },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLogSettings {
    pub path: Option<String>,
}

impl UsageLogSettings {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.as_deref().filter(|p| !p.trim().is_empty()).map(expand_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
