//! Transaction handles.
//!
//! `Graph::begin_transaction` returns a handle that dereferences to the
//! graph. The handle is consumed by `commit` or `rollback`; dropping it
//! without either rolls back. Rollback always returns to the last commit,
//! so changes left pending before the transaction began are discarded too.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::model::Change;

use super::Graph;

pub struct Transaction<'g> {
    graph: &'g mut Graph,
    open: bool,
}

impl<'g> Transaction<'g> {
    pub(crate) fn begin(graph: &'g mut Graph) -> Self {
        debug!(graph = %graph.id, pending = graph.changes.len(), "begin transaction");
        Self { graph, open: true }
    }

    /// Keep all pending changes and finalize them.
    ///
    /// Returns the change log drained by the commit.
    pub fn commit(mut self) -> Vec<Change> {
        self.open = false;
        self.graph.commit()
    }

    /// Restore the graph to its state at the last commit.
    pub fn rollback(mut self) {
        self.open = false;
        self.graph.rollback();
    }
}

impl Deref for Transaction<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &*self.graph
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        &mut *self.graph
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open {
            self.graph.rollback();
        }
    }
}
