//! Script writing.
//!
//! Turns a diff into a new persisted revision record: fresh id, parent
//! pointer at the current head, and a downgrade body derived by inverting
//! the upgrade body.

use std::collections::HashSet;

use tracing::info;

use crate::differ::DiffResult;
use crate::error::MigrateResult;
use crate::graph::RevisionGraph;
use crate::revision::Revision;
use crate::store::RevisionStore;

/// Materializes diffs as revision records.
pub struct ScriptWriter<'a> {
    store: &'a RevisionStore,
    graph: &'a RevisionGraph,
}

impl<'a> ScriptWriter<'a> {
    /// Create a writer over a store and the graph built from it.
    pub fn new(store: &'a RevisionStore, graph: &'a RevisionGraph) -> Self {
        Self { store, graph }
    }

    /// Persist `diff` as a new revision.
    ///
    /// Returns `None` without writing anything when the diff is empty and
    /// `allow_empty` is false; that is the ordinary "no changes detected"
    /// outcome, not an error. The new revision's parent is the single
    /// current head; a branched history must be resolved before new work
    /// can be written on top of it.
    pub async fn write(
        &self,
        diff: &DiffResult,
        message: Option<&str>,
        allow_empty: bool,
    ) -> MigrateResult<Option<Revision>> {
        if diff.is_empty() && !allow_empty {
            info!("no changes detected");
            return Ok(None);
        }

        let parents = match self.graph.single_head()? {
            Some(head) => vec![head.id.clone()],
            None => Vec::new(),
        };

        let existing: HashSet<String> = self.graph.ids().map(str::to_string).collect();
        let id = self.store.fresh_id(&existing);

        let mut revision = Revision::new(id, parents, diff.ops.clone(), diff.invert().ops);
        if let Some(message) = message {
            revision = revision.with_message(message);
        }

        self.store.write(&revision).await?;
        info!(id = %revision.id, summary = %diff.summary(), "generated revision");
        Ok(Some(revision))
    }
}
