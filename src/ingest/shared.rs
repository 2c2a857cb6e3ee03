use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::domain::InteractionGraph;

/// An interaction graph shared between one importer and any number of
/// readers.
///
/// Readers take an immutable [`snapshot`](Self::snapshot) and never wait
/// for an import. The importer works on a private copy obtained through
/// [`writer`](Self::writer) and swaps it in with
/// [`GraphWriter::publish`] when a file is done, so a snapshot always
/// reflects a whole number of files.
#[derive(Debug, Default)]
pub struct SharedGraph {
    current: RwLock<Arc<InteractionGraph>>,
    write_lock: Mutex<()>,
}

impl SharedGraph {
    /// Creates a shared, empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares an existing graph.
    #[must_use]
    pub fn from_graph(graph: InteractionGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
            write_lock: Mutex::new(()),
        }
    }

    /// The most recently published graph.
    #[must_use]
    pub fn snapshot(&self) -> Arc<InteractionGraph> {
        Arc::clone(&*self.current.read())
    }

    /// Starts a write. Blocks while another writer is active.
    ///
    /// The writer begins as a copy of the current graph. Dropping it without
    /// publishing discards its changes.
    #[must_use]
    pub fn writer(&self) -> GraphWriter<'_> {
        let guard = self.write_lock.lock();
        let working = InteractionGraph::clone(&self.current.read());
        GraphWriter {
            shared: self,
            _guard: guard,
            working,
        }
    }
}

/// A private working copy of a [`SharedGraph`].
#[derive(Debug)]
pub struct GraphWriter<'a> {
    shared: &'a SharedGraph,
    _guard: MutexGuard<'a, ()>,
    working: InteractionGraph,
}

impl GraphWriter<'_> {
    /// Makes the working copy the current graph.
    pub fn publish(self) {
        *self.shared.current.write() = Arc::new(self.working);
    }
}

impl Deref for GraphWriter<'_> {
    type Target = InteractionGraph;

    fn deref(&self) -> &Self::Target {
        &self.working
    }
}

impl DerefMut for GraphWriter<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.working
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::tests::{class, file, row};

    fn add(graph: &mut InteractionGraph, regulator: &str, target: &str) {
        graph.merge(
            row(regulator, target),
            &file("a.txt"),
            &class(&[regulator]),
            &class(&[target]),
        );
    }

    #[test]
    fn snapshot_is_unchanged_until_publish() {
        let shared = SharedGraph::new();
        let before = shared.snapshot();

        let mut writer = shared.writer();
        add(&mut writer, "L:1", "L:2");
        assert_eq!(writer.len(), 1);
        assert!(shared.snapshot().is_empty());

        writer.publish();
        assert!(before.is_empty());
        assert_eq!(shared.snapshot().len(), 1);
    }

    #[test]
    fn dropped_writer_discards_changes() {
        let shared = SharedGraph::new();
        {
            let mut writer = shared.writer();
            add(&mut writer, "L:1", "L:2");
        }
        assert!(shared.snapshot().is_empty());
    }

    #[test]
    fn writer_starts_from_published_graph() {
        let shared = SharedGraph::new();
        let mut first = shared.writer();
        add(&mut first, "L:1", "L:2");
        first.publish();

        let mut second = shared.writer();
        add(&mut second, "L:3", "L:4");
        second.publish();

        assert_eq!(shared.snapshot().len(), 2);
    }

    #[test]
    fn readers_proceed_during_a_write() {
        let shared = Arc::new(SharedGraph::new());
        let writer = shared.writer();

        let reader = Arc::clone(&shared);
        let len = std::thread::spawn(move || reader.snapshot().len())
            .join()
            .unwrap();

        assert_eq!(len, 0);
        drop(writer);
    }
}
