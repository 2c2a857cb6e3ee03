//! Identifier resolution.
//!
//! An [`IdMapper`] is one identifier-mapping backend. The [`Resolver`]
//! consults every configured backend and unions their answers into the
//! [`EquivalenceClass`] of an identifier.

use std::{collections::BTreeSet, fmt, path::PathBuf, sync::Arc};

use tracing::trace;

use crate::domain::{Config, EquivalenceClass, MapperSpec, SystemCode, Xref};

mod table;
pub use table::TableMapper;

/// An identifier-mapping backend.
pub trait IdMapper: Send + Sync + fmt::Debug {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Returns every identifier known to denote the same entity as `xref`.
    ///
    /// If `systems` is non-empty, only identifiers in those systems are
    /// returned. The result may or may not include `xref` itself.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if the backend cannot answer.
    fn map_id(&self, xref: &Xref, systems: &[SystemCode]) -> Result<BTreeSet<Xref>, MappingError>;
}

/// No identifier-mapping backend is configured.
///
/// Reported before any resolution is attempted; the operation is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no identifier mapping is configured; add a [[mappers]] entry to the configuration")]
pub struct ConfigurationError;

/// Identifier resolution failed.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// Resolution was attempted without any backend.
    #[error("no identifier mapping backend is available")]
    Unconfigured,

    /// A backend could not answer.
    #[error("identifier mapper '{mapper}' is unavailable: {reason}")]
    Unavailable {
        /// The backend's name.
        mapper: String,
        /// What went wrong.
        reason: String,
    },

    /// A mapping file could not be read.
    #[error("failed to read mapping file {}", path.display())]
    Io {
        /// The mapping file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A mapping file is malformed.
    #[error("{}:{line}: {reason}", path.display())]
    Format {
        /// The mapping file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },
}

/// Resolves identifiers to equivalence classes through every configured
/// backend.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    mappers: Vec<Arc<dyn IdMapper>>,
}

impl Resolver {
    /// Creates a resolver with no backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend.
    #[must_use]
    pub fn with_mapper(mut self, mapper: impl IdMapper + 'static) -> Self {
        self.push(mapper);
        self
    }

    /// Adds a backend.
    pub fn push(&mut self, mapper: impl IdMapper + 'static) {
        self.mappers.push(Arc::new(mapper));
    }

    /// Builds a resolver from the configured backends, loading any mapping
    /// files.
    ///
    /// # Errors
    ///
    /// Returns an error if a mapping file cannot be read or parsed.
    pub fn from_config(config: &Config) -> Result<Self, MappingError> {
        let mut resolver = Self::new();
        for spec in &config.mappers {
            match spec {
                MapperSpec::Table { path, delimiter } => {
                    resolver.push(TableMapper::load(path, delimiter)?);
                }
            }
        }
        Ok(resolver)
    }

    /// Whether at least one backend is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.mappers.is_empty()
    }

    /// Checks that at least one backend is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if there is none.
    pub fn ensure_configured(&self) -> Result<(), ConfigurationError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ConfigurationError)
        }
    }

    /// Computes the equivalence class of `xref`, restricted to `systems`
    /// (unless that is empty). The class always contains `xref`.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Unconfigured`] if there is no backend, or the
    /// first backend failure.
    pub fn resolve(
        &self,
        xref: &Xref,
        systems: &[SystemCode],
    ) -> Result<EquivalenceClass, MappingError> {
        if self.mappers.is_empty() {
            return Err(MappingError::Unconfigured);
        }
        let mut class = EquivalenceClass::new(xref.clone());
        for mapper in &self.mappers {
            class.extend(mapper.map_id(xref, systems)?);
        }
        trace!(%xref, members = class.len(), "resolved");
        Ok(class)
    }
}
