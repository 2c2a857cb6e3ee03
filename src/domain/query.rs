//! Looking up the interaction partners of an identifier.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    domain::{graph::InteractionGraph, interaction::Interaction, xref::Xref},
    mapping::{ConfigurationError, MappingError, Resolver},
};

/// How interaction partners are ordered for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// By identifier.
    #[default]
    Alphabetical,
    /// By number of supporting files, most first. Ties keep identifier order.
    Occurrences,
}

/// The files whose interactions a query should report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FileSelection {
    /// Every imported file.
    #[default]
    All,
    /// Only these files.
    Only(BTreeSet<PathBuf>),
}

impl FileSelection {
    /// Selects only the given files.
    pub fn only(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self::Only(paths.into_iter().collect())
    }

    /// Whether `path` is selected.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        match self {
            Self::All => true,
            Self::Only(paths) => paths.contains(path),
        }
    }

    /// Number of `interaction`'s supporting files that are selected.
    #[must_use]
    pub fn count_in(&self, interaction: &Interaction) -> usize {
        interaction.files().filter(|f| self.contains(f)).count()
    }

    /// Whether any of `interaction`'s supporting files is selected.
    #[must_use]
    pub fn intersects(&self, interaction: &Interaction) -> bool {
        interaction.files().any(|f| self.contains(f))
    }
}

/// The interactions an identifier takes part in, split by its role.
#[derive(Debug, Clone)]
pub struct QueryResult<'g> {
    query: Xref,
    regulators: BTreeMap<&'g Xref, &'g Interaction>,
    targets: BTreeMap<&'g Xref, &'g Interaction>,
}

impl<'g> QueryResult<'g> {
    /// The identifier that was looked up.
    #[must_use]
    pub const fn query(&self) -> &Xref {
        &self.query
    }

    /// Regulators of the queried entity, keyed by the regulator's key.
    #[must_use]
    pub const fn regulators(&self) -> &BTreeMap<&'g Xref, &'g Interaction> {
        &self.regulators
    }

    /// Targets of the queried entity, keyed by the target's key.
    #[must_use]
    pub const fn targets(&self) -> &BTreeMap<&'g Xref, &'g Interaction> {
        &self.targets
    }

    /// Regulators in display order.
    #[must_use]
    pub fn sorted_regulators(&self, order: SortOrder) -> Vec<(&'g Xref, &'g Interaction)> {
        sorted(&self.regulators, order)
    }

    /// Targets in display order.
    #[must_use]
    pub fn sorted_targets(&self, order: SortOrder) -> Vec<(&'g Xref, &'g Interaction)> {
        sorted(&self.targets, order)
    }

    /// Whether neither role has any partner, which happens when the selection
    /// excludes every supporting file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regulators.is_empty() && self.targets.is_empty()
    }
}

fn sorted<'g>(
    partners: &BTreeMap<&'g Xref, &'g Interaction>,
    order: SortOrder,
) -> Vec<(&'g Xref, &'g Interaction)> {
    let mut list: Vec<_> = partners.iter().map(|(k, v)| (*k, *v)).collect();
    if order == SortOrder::Occurrences {
        list.sort_by(|a, b| b.1.file_count().cmp(&a.1.file_count()));
    }
    list
}

/// Errors from [`find_interactions`].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// No identifier mapping is configured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The identifier mapping failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Finds every interaction `query` (or any identifier equivalent to it) takes
/// part in.
///
/// Returns `Ok(None)` if no member of the query's equivalence class is a key
/// in the graph. Only interactions supported by a selected file are reported;
/// if the selection excludes them all, the result is present but empty.
///
/// For each partner the record is taken from the partner's own adjacency
/// list, so it carries the partner's merged file set and reference.
///
/// # Errors
///
/// Returns [`QueryError::Configuration`] if the resolver has no mapping
/// backend, before anything is resolved, and [`QueryError::Mapping`] if
/// resolution fails.
pub fn find_interactions<'g>(
    graph: &'g InteractionGraph,
    resolver: &Resolver,
    query: &Xref,
    selection: &FileSelection,
) -> Result<Option<QueryResult<'g>>, QueryError> {
    resolver.ensure_configured()?;
    let class = resolver.resolve(query, graph.used_systems())?;

    let mut found = false;
    let mut regulators = BTreeMap::new();
    let mut targets = BTreeMap::new();

    for key in class.iter().filter(|k| graph.contains_key(k)) {
        found = true;
        for interaction in graph.adjacent(key).filter(|i| selection.intersects(i)) {
            if interaction.regulator() == key {
                let partner = interaction.target();
                if let Some(record) = graph
                    .adjacent(partner)
                    .find(|j| j.regulator() == key && j.target() == partner)
                {
                    targets.insert(record.target(), record);
                }
            } else if interaction.target() == key {
                let partner = interaction.regulator();
                if let Some(record) = graph
                    .adjacent(partner)
                    .find(|j| j.target() == key && j.regulator() == partner)
                {
                    regulators.insert(record.regulator(), record);
                }
            }
        }
    }

    if !found {
        debug!(%query, "no equivalent identifier in the graph");
        return Ok(None);
    }

    Ok(Some(QueryResult {
        query: query.clone(),
        regulators,
        targets,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::graph::tests::{class, file, row, xref},
        mapping::TableMapper,
    };

    fn merge(graph: &mut InteractionGraph, regulator: &str, target: &str, source: &str) {
        graph.merge(
            row(regulator, target),
            &file(source),
            &class(&[regulator]),
            &class(&[target]),
        );
    }

    fn identity_resolver() -> Resolver {
        Resolver::new().with_mapper(TableMapper::from_groups(Vec::<Vec<Xref>>::new()))
    }

    fn sample_graph() -> InteractionGraph {
        let mut graph = InteractionGraph::new();
        merge(&mut graph, "L:1", "L:2", "a.txt");
        merge(&mut graph, "L:1", "L:3", "a.txt");
        merge(&mut graph, "L:1", "L:3", "b.txt");
        merge(&mut graph, "L:4", "L:1", "b.txt");
        graph
    }

    #[test]
    fn roles_are_split() {
        let graph = sample_graph();
        let resolver = identity_resolver();

        let result = find_interactions(&graph, &resolver, &xref("L:1"), &FileSelection::All)
            .unwrap()
            .unwrap();

        let targets: Vec<_> = result.targets().keys().map(ToString::to_string).collect();
        let regulators: Vec<_> = result.regulators().keys().map(ToString::to_string).collect();
        assert_eq!(targets, ["L:2", "L:3"]);
        assert_eq!(regulators, ["L:4"]);
    }

    #[test]
    fn every_interaction_appears_once_from_each_side() {
        let graph = sample_graph();
        let resolver = identity_resolver();

        for (_, interaction) in graph.interactions() {
            let from_regulator =
                find_interactions(&graph, &resolver, interaction.regulator(), &FileSelection::All)
                    .unwrap()
                    .unwrap();
            assert!(from_regulator.targets().contains_key(interaction.target()));
            assert!(!from_regulator.regulators().contains_key(interaction.target()));

            let from_target =
                find_interactions(&graph, &resolver, interaction.target(), &FileSelection::All)
                    .unwrap()
                    .unwrap();
            assert!(from_target.regulators().contains_key(interaction.regulator()));
            assert!(!from_target.targets().contains_key(interaction.regulator()));
        }
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let graph = sample_graph();
        let result = find_interactions(
            &graph,
            &identity_resolver(),
            &xref("L:99"),
            &FileSelection::All,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn equivalent_identifier_finds_interactions() {
        let graph = sample_graph();
        let resolver = Resolver::new().with_mapper(TableMapper::from_groups([vec![
            xref("L:1"),
            xref("En:ENSG00000000001"),
        ]]));

        let result = find_interactions(
            &graph,
            &resolver,
            &xref("En:ENSG00000000001"),
            &FileSelection::All,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.targets().len(), 2);
        assert_eq!(result.query(), &xref("En:ENSG00000000001"));
    }

    #[test]
    fn selection_filters_interactions() {
        let graph = sample_graph();
        let resolver = identity_resolver();
        let selection = FileSelection::only([PathBuf::from("b.txt")]);

        let result = find_interactions(&graph, &resolver, &xref("L:1"), &selection)
            .unwrap()
            .unwrap();
        assert_eq!(result.targets().len(), 1);
        assert_eq!(result.regulators().len(), 1);

        let nothing = FileSelection::only([PathBuf::from("c.txt")]);
        let empty = find_interactions(&graph, &resolver, &xref("L:1"), &nothing)
            .unwrap()
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn selected_file_count() {
        let graph = sample_graph();
        let (_, interaction) = graph
            .interactions()
            .find(|(_, i)| i.target() == &xref("L:3"))
            .unwrap();
        assert_eq!(FileSelection::All.count_in(interaction), 2);
        assert_eq!(
            FileSelection::only([PathBuf::from("a.txt")]).count_in(interaction),
            1
        );
    }

    #[test]
    fn self_regulation_is_reported_as_target_only() {
        let mut graph = InteractionGraph::new();
        merge(&mut graph, "L:1", "L:1", "a.txt");

        let result = find_interactions(
            &graph,
            &identity_resolver(),
            &xref("L:1"),
            &FileSelection::All,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.targets().len(), 1);
        assert!(result.regulators().is_empty());
    }

    #[test]
    fn occurrence_order_is_stable() {
        let graph = sample_graph();
        let result = find_interactions(
            &graph,
            &identity_resolver(),
            &xref("L:1"),
            &FileSelection::All,
        )
        .unwrap()
        .unwrap();

        let alphabetical: Vec<_> = result
            .sorted_targets(SortOrder::Alphabetical)
            .into_iter()
            .map(|(x, _)| x.to_string())
            .collect();
        let by_count: Vec<_> = result
            .sorted_targets(SortOrder::Occurrences)
            .into_iter()
            .map(|(x, _)| x.to_string())
            .collect();
        assert_eq!(alphabetical, ["L:2", "L:3"]);
        assert_eq!(by_count, ["L:3", "L:2"]);
    }

    #[test]
    fn unconfigured_resolver_is_refused() {
        let graph = sample_graph();
        let error = find_interactions(&graph, &Resolver::new(), &xref("L:1"), &FileSelection::All)
            .unwrap_err();
        assert!(matches!(error, QueryError::Configuration(_)));
    }
}
