//! Build configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_ENGINES: [&str; 2] = ["podman", "docker"];
pub const DEFAULT_LOCAL_REPOSITORY: &str = "mendix-buildpack";
pub const DEFAULT_DOWNLOAD_URL: &str = "https://download.mendix.com/runtimes/";
pub const DEFAULT_BUILDPACK_URL: &str = "https://github.com/mendix/cf-mendix-buildpack/releases/download/v5.0.26/cf-mendix-buildpack.zip";

// Parsed once. Both constants are covered by `test_builtin_urls_parse`.
static DOWNLOAD_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_DOWNLOAD_URL).expect("DEFAULT_DOWNLOAD_URL is valid"));
static BUILDPACK_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_BUILDPACK_URL).expect("DEFAULT_BUILDPACK_URL is valid"));

/// Settings for a build run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Container engine executables, in order of preference.
    pub engines: Vec<String>,
    /// Registry used to share builder images between machines.
    pub artifacts_repository: Option<String>,
    /// Repository name for builder images that are only kept locally.
    pub local_repository: String,
    /// Base URL the compiler tarball is downloaded from.
    pub download_url: Url,
    /// Directory holding the builder image definitions.
    pub builder_context: PathBuf,
    /// Directory holding the `Dockerfile` and `scripts/` scaffolding.
    pub scaffold_dir: PathBuf,
    /// Overrides the detected host architecture.
    pub platform_arch: Option<String>,
    pub prefetch: PrefetchConfig,
}

/// Settings for the offline dependency prefetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchConfig {
    pub cache_dir: PathBuf,
    pub buildpack_url: Url,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            engines: DEFAULT_ENGINES.iter().map(|e| e.to_string()).collect(),
            artifacts_repository: None,
            local_repository: DEFAULT_LOCAL_REPOSITORY.to_string(),
            download_url: DOWNLOAD_URL.clone(),
            builder_context: PathBuf::from("mxbuild"),
            scaffold_dir: PathBuf::from("."),
            platform_arch: None,
            prefetch: PrefetchConfig::default(),
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("docker-buildpack").join("build-cache"),
            buildpack_url: BUILDPACK_URL.clone(),
        }
    }
}

/// Load the build configuration from a file, falling back to defaults when
/// the file does not exist.
pub fn load_build_config(path: &Path) -> ConfigResult<BuildConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No configuration file, using defaults");
        return Ok(BuildConfig::default());
    }

    info!(path = %path.display(), "Loading configuration");
    let content = std::fs::read_to_string(path)?;
    parse_build_config(&content)
}

/// Parse a build configuration from KDL text.
pub fn parse_build_config(kdl: &str) -> ConfigResult<BuildConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = BuildConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "engines" => {
                let engines = get_all_string_args(node);
                if engines.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "engines".to_string(),
                        message: "at least one engine is required".to_string(),
                    });
                }
                config.engines = engines;
            }
            "artifacts-repository" => {
                config.artifacts_repository = Some(require_string(node)?);
            }
            "local-repository" => {
                config.local_repository = require_string(node)?;
            }
            "download-url" => {
                config.download_url = with_trailing_slash(require_url(node)?);
            }
            "builder-context" => {
                config.builder_context = PathBuf::from(require_string(node)?);
            }
            "scaffold" => {
                config.scaffold_dir = PathBuf::from(require_string(node)?);
            }
            "platform-arch" => {
                config.platform_arch = Some(require_string(node)?);
            }
            "prefetch" => {
                config.prefetch = parse_prefetch(node)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_prefetch(node: &KdlNode) -> ConfigResult<PrefetchConfig> {
    let mut prefetch = PrefetchConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "cache-dir" => {
                    prefetch.cache_dir = PathBuf::from(require_string(child)?);
                }
                "buildpack-url" => {
                    prefetch.buildpack_url = require_url(child)?;
                }
                _ => {}
            }
        }
    }

    Ok(prefetch)
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn require_string(node: &KdlNode) -> ConfigResult<String> {
    let field = node.name().value();
    match get_first_string_arg(node) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        }),
        None if node.entries().iter().any(|e| e.name().is_none()) => {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "expected a string".to_string(),
            })
        }
        None => Err(ConfigError::MissingField(field.to_string())),
    }
}

fn require_url(node: &KdlNode) -> ConfigResult<Url> {
    let raw = require_string(node)?;
    Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        field: node.name().value().to_string(),
        message: e.to_string(),
    })
}

// Url::join replaces the last path segment unless the base ends with a slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_build_config("").unwrap();
        assert_eq!(config, BuildConfig::default());
        assert_eq!(config.engines, vec!["podman", "docker"]);
        assert_eq!(config.local_repository, "mendix-buildpack");
        assert!(config.artifacts_repository.is_none());
    }

    #[test]
    fn test_builtin_urls_parse() {
        assert!(Url::parse(DEFAULT_DOWNLOAD_URL).is_ok());
        assert!(Url::parse(DEFAULT_BUILDPACK_URL).is_ok());
        assert_eq!(DOWNLOAD_URL.as_str(), DEFAULT_DOWNLOAD_URL);
        assert!(BUILDPACK_URL.path().ends_with("/cf-mendix-buildpack.zip"));
    }

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            engines "docker"
            artifacts-repository "registry.example.com/mendix/mxbuild"
            local-repository "local-builders"
            download-url "https://mirror.example.com/mendix/runtimes/"
            builder-context "images/mxbuild"
            scaffold "docker-buildpack"
            platform-arch "aarch64"

            prefetch {
                cache-dir "/var/cache/mxpack"
                buildpack-url "https://mirror.example.com/cf-mendix-buildpack.zip"
            }
        "#;

        let config = parse_build_config(kdl).unwrap();
        assert_eq!(config.engines, vec!["docker"]);
        assert_eq!(
            config.artifacts_repository.as_deref(),
            Some("registry.example.com/mendix/mxbuild")
        );
        assert_eq!(config.local_repository, "local-builders");
        assert_eq!(
            config.download_url.as_str(),
            "https://mirror.example.com/mendix/runtimes/"
        );
        assert_eq!(config.builder_context, PathBuf::from("images/mxbuild"));
        assert_eq!(config.scaffold_dir, PathBuf::from("docker-buildpack"));
        assert_eq!(config.platform_arch.as_deref(), Some("aarch64"));
        assert_eq!(config.prefetch.cache_dir, PathBuf::from("/var/cache/mxpack"));
        assert_eq!(
            config.prefetch.buildpack_url.as_str(),
            "https://mirror.example.com/cf-mendix-buildpack.zip"
        );
    }

    #[test]
    fn test_engine_order_is_preserved() {
        let config = parse_build_config(r#"engines "docker" "podman""#).unwrap();
        assert_eq!(config.engines, vec!["docker", "podman"]);
    }

    #[test]
    fn test_empty_engine_list_is_rejected() {
        let result = parse_build_config("engines");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "engines"
        ));
    }

    #[test]
    fn test_download_url_gets_trailing_slash() {
        let config =
            parse_build_config(r#"download-url "https://mirror.example.com/runtimes""#).unwrap();
        assert_eq!(
            config.download_url.as_str(),
            "https://mirror.example.com/runtimes/"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = parse_build_config(r#"download-url "not a url""#);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let result = parse_build_config("local-repository 42");
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_value_is_reported() {
        let result = parse_build_config("artifacts-repository");
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = parse_build_config(r#"telemetry "off""#).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn test_syntax_error() {
        let result = parse_build_config("engines \"podman");
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_build_config(&dir.path().join("mxpack.kdl")).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mxpack.kdl");
        std::fs::write(&path, r#"artifacts-repository "cache.local/mxbuild""#).unwrap();

        let config = load_build_config(&path).unwrap();
        assert_eq!(
            config.artifacts_repository.as_deref(),
            Some("cache.local/mxbuild")
        );
    }
}
