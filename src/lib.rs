//! Regulatory interaction tables
//!
//! Delimited files listing regulator → target pairs are imported into a
//! single graph, merging rows that name the same entities under different
//! identifier systems. The graph is then queried by identifier.

pub mod domain;
pub use domain::{
    Config, EquivalenceClass, FileSelection, Interaction, InteractionGraph, QueryResult,
    SortOrder, SystemCode, Xref, find_interactions,
};

pub mod mapping;
pub use mapping::{ConfigurationError, IdMapper, MappingError, Resolver, TableMapper};

pub mod ingest;
pub use ingest::{ImportConfig, ImportJob, Importer, SharedGraph};
