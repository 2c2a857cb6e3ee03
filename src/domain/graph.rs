//! The in-memory interaction graph and the merge pass that feeds it.
//!
//! The [`InteractionGraph`] maps each canonical key (an [`Xref`]) to the
//! interactions it takes part in, as regulator or as target. Records live in
//! an arena and adjacency lists hold [`InteractionId`]s, so an interaction is
//! stored once and reachable from both of its keys.
//!
//! Rows arrive with the equivalence classes of their regulator and target
//! already resolved. [`InteractionGraph::merge`] uses those classes to find
//! an existing interaction between the same two entities (possibly written
//! under different identifier systems) before creating a new one.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use serde::Serialize;
use tracing::trace;

use crate::domain::{
    interaction::{FileRef, Interaction, InteractionId, MiscTable},
    xref::{EquivalenceClass, SystemCode, Xref},
};

/// One parsed row of an interaction file, ready to be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// Regulator as written in the file.
    pub regulator: Xref,
    /// Target as written in the file.
    pub target: Xref,
    /// Publication reference cell, if the file has a reference column.
    pub reference: Option<String>,
    /// Values of non-role columns.
    pub misc: Option<MiscTable>,
}

/// What [`InteractionGraph::merge`] did with a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The row described an interaction already in the graph; these records
    /// were updated.
    Merged(Vec<InteractionId>),
    /// A new interaction was created.
    Created(InteractionId),
}

/// How much of a file made it into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Every row was processed.
    Complete,
    /// The import was cancelled part-way; earlier rows remain merged.
    Partial,
}

/// A file whose rows have been merged into the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    /// The file.
    pub path: FileRef,
    /// Whether every row was processed.
    pub status: FileStatus,
}

/// Regulatory interactions keyed by the identifiers that take part in them.
///
/// Invariants:
/// - an interaction is listed under its regulator key and, if different,
///   under its target key, and appears at most once in any list;
/// - there is at most one interaction per pair of equivalent
///   (regulator, target) entities.
#[derive(Debug, Clone, Default)]
pub struct InteractionGraph {
    interactions: Vec<Interaction>,
    adjacency: HashMap<Xref, Vec<InteractionId>>,
    used_systems: Vec<SystemCode>,
    files: Vec<LoadedFile>,
}

impl InteractionGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether the graph holds no interactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Number of canonical keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Whether `xref` is a canonical key.
    #[must_use]
    pub fn contains_key(&self, xref: &Xref) -> bool {
        self.adjacency.contains_key(xref)
    }

    /// All canonical keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &Xref> {
        self.adjacency.keys()
    }

    /// Looks up an interaction by id.
    #[must_use]
    pub fn interaction(&self, id: InteractionId) -> Option<&Interaction> {
        self.interactions.get(id.0)
    }

    /// All interactions, in creation order.
    pub fn interactions(&self) -> impl Iterator<Item = (InteractionId, &Interaction)> {
        self.interactions
            .iter()
            .enumerate()
            .map(|(index, interaction)| (InteractionId(index), interaction))
    }

    /// The adjacency list stored under `key`, if it is a key.
    #[must_use]
    pub fn adjacency(&self, key: &Xref) -> Option<&[InteractionId]> {
        self.adjacency.get(key).map(Vec::as_slice)
    }

    /// Interactions listed under `key`, in insertion order. Empty if `key` is
    /// not in the graph.
    pub fn adjacent(&self, key: &Xref) -> impl Iterator<Item = &Interaction> {
        self.adjacency
            .get(key)
            .into_iter()
            .flatten()
            .map(|id| &self.interactions[id.0])
    }

    /// Identifier systems seen in imported rows, in first-seen order.
    #[must_use]
    pub fn used_systems(&self) -> &[SystemCode] {
        &self.used_systems
    }

    /// Records that an identifier system occurs in the imported data.
    pub fn register_system(&mut self, system: &SystemCode) {
        if !self.used_systems.contains(system) {
            self.used_systems.push(system.clone());
        }
    }

    /// Files merged into the graph, in import order.
    #[must_use]
    pub fn files(&self) -> &[LoadedFile] {
        &self.files
    }

    /// Records a file as imported, replacing any earlier record for it.
    pub fn record_file(&mut self, path: FileRef, status: FileStatus) {
        if let Some(existing) = self.files.iter_mut().find(|f| f.path == path) {
            existing.status = status;
        } else {
            self.files.push(LoadedFile { path, status });
        }
    }

    /// The first member of `class` (in the class's order) that is a key.
    #[must_use]
    pub fn first_key_in<'a>(&'a self, class: &'a EquivalenceClass) -> Option<&'a Xref> {
        class.iter().find(|xref| self.adjacency.contains_key(*xref))
    }

    /// Merges one row into the graph.
    ///
    /// `regulators` and `targets` are the equivalence classes of the row's
    /// regulator and target. If an existing interaction connects a member of
    /// `regulators` to a member of `targets`, it is updated: `file` joins its
    /// file set and its reference is filled in if it had none. Otherwise a new
    /// interaction is created whose keys are the existing keys of the two
    /// entities, falling back to the identifiers from the row for entities
    /// new to the graph.
    pub fn merge(
        &mut self,
        row: ParsedRow,
        file: &FileRef,
        regulators: &EquivalenceClass,
        targets: &EquivalenceClass,
    ) -> MergeOutcome {
        // Every interaction is listed under its regulator key, so scanning the
        // regulator class's keys finds every candidate.
        let existing: BTreeSet<InteractionId> = regulators
            .iter()
            .filter_map(|key| self.adjacency.get(key))
            .flatten()
            .copied()
            .filter(|id| {
                let interaction = &self.interactions[id.0];
                regulators.contains(interaction.regulator())
                    && targets.contains(interaction.target())
            })
            .collect();

        if !existing.is_empty() {
            for id in &existing {
                let interaction = &mut self.interactions[id.0];
                interaction.fill_reference(row.reference.as_deref());
                interaction.add_file(file);
            }
            trace!(
                regulator = %row.regulator,
                target = %row.target,
                "merged into existing interaction"
            );
            return MergeOutcome::Merged(existing.into_iter().collect());
        }

        let regulator = self
            .first_key_in(regulators)
            .cloned()
            .unwrap_or(row.regulator);
        let target = self.first_key_in(targets).cloned().unwrap_or(row.target);
        let distinct = regulator != target;

        let id = InteractionId(self.interactions.len());
        self.interactions.push(
            Interaction::new(regulator.clone(), target.clone(), Arc::clone(file))
                .with_reference(row.reference)
                .with_misc(row.misc),
        );

        self.adjacency.entry(regulator).or_default().push(id);
        if distinct {
            self.adjacency.entry(target).or_default().push(id);
        }

        MergeOutcome::Created(id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::HashSet, path::Path};

    use super::*;

    pub(crate) fn xref(s: &str) -> Xref {
        s.parse().unwrap()
    }

    pub(crate) fn file(name: &str) -> FileRef {
        Arc::from(Path::new(name))
    }

    pub(crate) fn class(members: &[&str]) -> EquivalenceClass {
        let mut class = EquivalenceClass::new(xref(members[0]));
        class.extend(members.iter().map(|m| xref(m)));
        class
    }

    pub(crate) fn row(regulator: &str, target: &str) -> ParsedRow {
        ParsedRow {
            regulator: xref(regulator),
            target: xref(target),
            reference: None,
            misc: None,
        }
    }

    /// Checks the structural invariants documented on [`InteractionGraph`].
    pub(crate) fn assert_invariants(graph: &InteractionGraph) {
        for (id, interaction) in graph.interactions() {
            let reg_list = graph.adjacency(interaction.regulator()).unwrap();
            assert_eq!(reg_list.iter().filter(|i| **i == id).count(), 1);
            let tar_list = graph.adjacency(interaction.target()).unwrap();
            assert_eq!(tar_list.iter().filter(|i| **i == id).count(), 1);
        }
        for key in graph.keys() {
            let list = graph.adjacency(key).unwrap();
            let unique: HashSet<_> = list.iter().collect();
            assert_eq!(unique.len(), list.len(), "duplicate entry under {key}");
        }
        let pairs: HashSet<_> = graph
            .interactions()
            .map(|(_, i)| (i.regulator().clone(), i.target().clone()))
            .collect();
        assert_eq!(pairs.len(), graph.len(), "duplicate key pair");
    }

    fn merge_plain(
        graph: &mut InteractionGraph,
        regulator: &str,
        target: &str,
        source: &str,
    ) -> MergeOutcome {
        graph.merge(
            row(regulator, target),
            &file(source),
            &class(&[regulator]),
            &class(&[target]),
        )
    }

    #[test]
    fn new_pair_creates_two_keys() {
        let mut graph = InteractionGraph::new();
        let outcome = merge_plain(&mut graph, "L:1", "L:2", "a.txt");

        assert_eq!(outcome, MergeOutcome::Created(InteractionId(0)));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.key_count(), 2);
        assert_invariants(&graph);
    }

    #[test]
    fn same_row_twice_is_merged() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");
        let outcome = merge_plain(&mut graph, "L:1", "L:2", "b.txt");

        assert_eq!(outcome, MergeOutcome::Merged(vec![InteractionId(0)]));
        assert_eq!(graph.len(), 1);
        let interaction = graph.interaction(InteractionId(0)).unwrap();
        assert_eq!(interaction.file_count(), 2);
        assert_invariants(&graph);
    }

    #[test]
    fn same_row_twice_in_one_file_keeps_one_file() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");

        assert_eq!(graph.interaction(InteractionId(0)).unwrap().file_count(), 1);
    }

    #[test]
    fn equivalent_regulator_merges_under_existing_key() {
        let mut graph = InteractionGraph::new();
        let equivalents = class(&["X:A1", "Y:A2"]);

        graph.merge(
            row("X:A1", "L:B"),
            &file("file1"),
            &equivalents,
            &class(&["L:B"]),
        );
        let outcome = graph.merge(
            row("Y:A2", "L:B"),
            &file("file2"),
            &equivalents,
            &class(&["L:B"]),
        );

        assert!(matches!(outcome, MergeOutcome::Merged(_)));
        assert_eq!(graph.len(), 1);
        assert!(graph.contains_key(&xref("X:A1")));
        assert!(!graph.contains_key(&xref("Y:A2")));
        let files: Vec<_> = graph
            .adjacent(&xref("X:A1"))
            .flat_map(Interaction::files)
            .cloned()
            .collect();
        assert_eq!(files, vec![file("file1"), file("file2")]);
        assert_invariants(&graph);
    }

    #[test]
    fn known_regulator_new_target_appends_and_creates_target_key() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");

        // L:1 is now known as S:P1's equivalent; the target is new.
        graph.merge(
            row("S:P1", "L:3"),
            &file("a.txt"),
            &class(&["S:P1", "L:1"]),
            &class(&["L:3"]),
        );

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.adjacency(&xref("L:1")).unwrap().len(), 2);
        assert_eq!(graph.adjacency(&xref("L:3")).unwrap().len(), 1);
        assert!(!graph.contains_key(&xref("S:P1")));
        let created = graph.interaction(InteractionId(1)).unwrap();
        assert_eq!(created.regulator(), &xref("L:1"));
        assert_eq!(created.target(), &xref("L:3"));
        assert_invariants(&graph);
    }

    #[test]
    fn known_target_new_regulator_is_symmetric() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");

        graph.merge(
            row("L:9", "En:ENSG2"),
            &file("a.txt"),
            &class(&["L:9"]),
            &class(&["En:ENSG2", "L:2"]),
        );

        let created = graph.interaction(InteractionId(1)).unwrap();
        assert_eq!(created.regulator(), &xref("L:9"));
        assert_eq!(created.target(), &xref("L:2"));
        assert_eq!(graph.adjacency(&xref("L:2")).unwrap().len(), 2);
        assert_eq!(graph.adjacency(&xref("L:9")).unwrap().len(), 1);
        assert_invariants(&graph);
    }

    #[test]
    fn both_known_appends_to_both_lists() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");
        merge_plain(&mut graph, "L:3", "L:4", "a.txt");

        merge_plain(&mut graph, "L:1", "L:4", "a.txt");

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.key_count(), 4);
        assert_eq!(graph.adjacency(&xref("L:1")).unwrap().len(), 2);
        assert_eq!(graph.adjacency(&xref("L:4")).unwrap().len(), 2);
        assert_invariants(&graph);
    }

    #[test]
    fn reversed_direction_is_a_different_interaction() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");
        merge_plain(&mut graph, "L:2", "L:1", "a.txt");

        assert_eq!(graph.len(), 2);
        assert_invariants(&graph);
    }

    #[test]
    fn self_regulation_is_listed_once() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:1", "a.txt");

        assert_eq!(graph.key_count(), 1);
        assert_eq!(graph.adjacency(&xref("L:1")).unwrap(), &[InteractionId(0)]);
        assert_invariants(&graph);
    }

    #[test]
    fn merge_fills_missing_reference_only() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");

        let mut with_reference = row("L:1", "L:2");
        with_reference.reference = Some("11111".to_string());
        graph.merge(
            with_reference,
            &file("b.txt"),
            &class(&["L:1"]),
            &class(&["L:2"]),
        );
        let mut another = row("L:1", "L:2");
        another.reference = Some("22222".to_string());
        graph.merge(another, &file("c.txt"), &class(&["L:1"]), &class(&["L:2"]));

        let interaction = graph.interaction(InteractionId(0)).unwrap();
        assert_eq!(interaction.reference(), Some("11111"));
        assert_eq!(interaction.file_count(), 3);
    }

    #[test]
    fn created_interaction_keeps_reference_and_misc_under_existing_keys() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:1", "L:2", "a.txt");

        let mut parsed = row("S:P1", "L:3");
        parsed.reference = Some("12345".to_string());
        parsed.misc = Some(vec![("Evidence".to_string(), "ChIP".to_string())]);
        graph.merge(
            parsed,
            &file("a.txt"),
            &class(&["S:P1", "L:1"]),
            &class(&["L:3"]),
        );

        let created = graph.interaction(InteractionId(1)).unwrap();
        assert_eq!(created.reference(), Some("12345"));
        assert_eq!(
            created.misc(),
            Some(&[("Evidence".to_string(), "ChIP".to_string())][..])
        );
    }

    #[test]
    fn first_key_is_deterministic() {
        let mut graph = InteractionGraph::new();
        merge_plain(&mut graph, "L:5", "L:9", "a.txt");
        merge_plain(&mut graph, "L:3", "L:9", "a.txt");

        let class = class(&["L:5", "L:3"]);
        assert_eq!(graph.first_key_in(&class), Some(&xref("L:3")));
    }

    #[test]
    fn used_systems_are_unique_and_ordered() {
        let mut graph = InteractionGraph::new();
        graph.register_system(&SystemCode::new("L").unwrap());
        graph.register_system(&SystemCode::new("En").unwrap());
        graph.register_system(&SystemCode::new("L").unwrap());

        let codes: Vec<_> = graph.used_systems().iter().map(SystemCode::as_str).collect();
        assert_eq!(codes, ["L", "En"]);
    }

    #[test]
    fn record_file_replaces_status() {
        let mut graph = InteractionGraph::new();
        graph.record_file(file("a.txt"), FileStatus::Partial);
        graph.record_file(file("a.txt"), FileStatus::Complete);

        assert_eq!(graph.files().len(), 1);
        assert_eq!(graph.files()[0].status, FileStatus::Complete);
    }
}
