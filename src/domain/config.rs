use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{
    data_source::{CatalogError, DataSourceCatalog, DataSourceSpec},
    query::SortOrder,
};

/// Application configuration.
///
/// Holds the identifier-mapping backends to consult, extra identifier
/// systems, and the defaults used when reading interaction files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Delimiter assumed for newly opened interaction files.
    pub delimiter: String,

    /// Number of leading lines read from each file for column inference.
    pub sample_lines: usize,

    /// Rows between progress events during an import.
    pub progress_interval: usize,

    /// How query partners are ordered for display.
    pub sort: SortOrder,

    /// Identifier-mapping backends, all of which are consulted.
    ///
    /// If this is empty, identifier resolution is unavailable and both
    /// imports and queries are refused.
    pub mappers: Vec<MapperSpec>,

    /// Extra (or overriding) identifier systems.
    pub data_sources: Vec<DataSourceSpec>,
}

/// A configured identifier-mapping backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MapperSpec {
    /// A delimited equivalence table on disk.
    Table {
        /// Path to the table. Relative paths are resolved against the
        /// directory holding the configuration file.
        path: PathBuf,

        /// Column delimiter of the table.
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
}

/// Errors loading or saving the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("failed to access config file {}", path.display())]
    Io {
        /// The config file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration TOML.
    #[error("failed to parse config file {}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("failed to serialize config")]
    Serialize(#[from] toml::ser::Error),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            sample_lines: default_sample_lines(),
            progress_interval: default_progress_interval(),
            sort: SortOrder::default(),
            mappers: Vec::new(),
            data_sources: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// Relative mapper paths are rebased onto the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.rebase_paths(base);
        }
        Ok(config)
    }

    /// Loads the configuration at `path` if it exists, falling back to the
    /// defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the identifier-system catalog: built-ins plus configured extras.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured system is malformed.
    pub fn catalog(&self) -> Result<DataSourceCatalog, CatalogError> {
        DataSourceCatalog::with_specs(&self.data_sources)
    }

    fn rebase_paths(&mut self, base: &Path) {
        for mapper in &mut self.mappers {
            match mapper {
                MapperSpec::Table { path, .. } => {
                    if path.is_relative() {
                        *path = base.join(&*path);
                    }
                }
            }
        }
    }
}

fn default_delimiter() -> String {
    "\t".to_string()
}

const fn default_sample_lines() -> usize {
    50
}

const fn default_progress_interval() -> usize {
    50
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_delimiter")]
        delimiter: String,

        #[serde(default = "default_sample_lines")]
        sample_lines: usize,

        #[serde(default = "default_progress_interval")]
        progress_interval: usize,

        #[serde(default)]
        sort: SortOrder,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        mappers: Vec<MapperSpec>,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        data_sources: Vec<DataSourceSpec>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                delimiter,
                sample_lines,
                progress_interval,
                sort,
                mappers,
                data_sources,
            } => Self {
                delimiter,
                sample_lines,
                progress_interval,
                sort,
                mappers,
                data_sources,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            delimiter: config.delimiter,
            sample_lines: config.sample_lines,
            progress_interval: config.progress_interval,
            sort: config.sort,
            mappers: config.mappers,
            data_sources: config.data_sources,
        }
    }
}
