//! Domain model for regulatory interactions.
//!
//! This module contains the core types: identifiers and identifier systems,
//! interactions, the interaction graph with its merge pass, the query engine,
//! and configuration. Nothing here touches the filesystem except
//! configuration loading.

/// Identifiers, identifier systems and equivalence classes.
pub mod xref;
pub use xref::{EquivalenceClass, InvalidSystemCodeError, SystemCode, Xref, XrefError};

/// The catalog of identifier systems and their id patterns.
pub mod data_source;
pub use data_source::{CatalogError, DataSource, DataSourceCatalog, DataSourceSpec};

mod config;
pub use config::{Config, ConfigError, MapperSpec};

mod interaction;
pub use interaction::{FileRef, Interaction, InteractionId, MiscTable};

/// The interaction graph and the merge pass.
pub mod graph;
pub use graph::{FileStatus, InteractionGraph, LoadedFile, MergeOutcome, ParsedRow};

/// The query engine.
pub mod query;
pub use query::{FileSelection, QueryError, QueryResult, SortOrder, find_interactions};
