use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraversalConfig {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: u64,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_ignore_globs")]
    pub ignore_globs: Vec<String>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            follow_symlinks: false,
            ignore_globs: default_ignore_globs(),
        }
    }
}

fn default_max_nodes() -> u64 {
    30_000
}

fn default_ignore_globs() -> Vec<String> {
    vec!["thumbs.db".to_string()]
}

/// What to do when neither a parser nor the fallback table knows a file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedPolicy {
    #[default]
    Fail,
    OctetStream,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetadataConfig {
    #[serde(default)]
    pub unresolved: UnresolvedPolicy,
}

/// What to do when content already in the catalog shows up at a new path.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    #[default]
    Fail,
    Link,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./log.csv")
}

impl TraversalConfig {
    /// Compiled ignore patterns, matched against lowercased basenames.
    pub fn ignore_set(&self) -> Result<GlobSet> {
        build_globset(&self.ignore_globs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.traversal.max_nodes == 0 {
        anyhow::bail!("traversal.max_nodes must be > 0");
    }

    let source = &config.archive.source_root;
    let dest = &config.archive.dest_root;
    if source == dest {
        anyhow::bail!("archive.source_root and archive.dest_root must differ");
    }
    if dest.starts_with(source) {
        anyhow::bail!(
            "archive.dest_root ({}) must not be inside archive.source_root ({})",
            dest.display(),
            source.display()
        );
    }

    config
        .traversal
        .ignore_set()
        .with_context(|| "Invalid pattern in traversal.ignore_globs")?;

    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(&pattern.to_lowercase())?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/tracker.sqlite"

[archive]
source_root = "/data/photos"
dest_root = "/archive/photos"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.traversal.max_nodes, 30_000);
        assert!(!config.traversal.follow_symlinks);
        assert_eq!(config.traversal.ignore_globs, vec!["thumbs.db"]);
        assert_eq!(config.metadata.unresolved, UnresolvedPolicy::Fail);
        assert_eq!(config.ingest.on_duplicate, DuplicatePolicy::Fail);
        assert_eq!(config.log.path, PathBuf::from("./log.csv"));
    }

    #[test]
    fn policies_parse_kebab_case() {
        let text = format!(
            "{}\n[metadata]\nunresolved = \"octet-stream\"\n\n[ingest]\non_duplicate = \"link\"\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&text).unwrap();
        assert_eq!(config.metadata.unresolved, UnresolvedPolicy::OctetStream);
        assert_eq!(config.ingest.on_duplicate, DuplicatePolicy::Link);
    }

    #[test]
    fn rejects_dest_inside_source() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.archive.dest_root = PathBuf::from("/data/photos/archive");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_zero_ceiling() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.traversal.max_nodes = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn ignore_set_is_case_insensitive_by_lowering() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let set = config.traversal.ignore_set().unwrap();
        assert!(set.is_match("thumbs.db"));
        assert!(!set.is_match("photo.jpg"));
    }
}
