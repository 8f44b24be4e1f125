//! Static index of cross-field dependencies.
//!
//! Built once per schema by scanning every compiled rule for `$data`
//! references. A write at path `w` makes every node whose rules reference a
//! target overlapping `w` stale: the target is a prefix of `w` (a write
//! inside a referenced subtree) or `w` is a prefix of the target (a write
//! that replaced the referenced value wholesale).

use crate::path::Path;
use crate::schema::{NodeId, Schema};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    by_target: BTreeMap<Path, BTreeSet<NodeId>>,
}

impl DependencyIndex {
    pub fn build(schema: &Schema) -> Self {
        let mut by_target: BTreeMap<Path, BTreeSet<NodeId>> = BTreeMap::new();
        for (id, node) in schema.nodes() {
            for rule in &node.rules {
                for target in &rule.refs {
                    by_target.entry(target.clone()).or_default().insert(id);
                }
            }
        }
        Self { by_target }
    }

    /// Nodes whose rules must be re-run after a write at `written`.
    pub fn dependents_of(&self, written: &Path) -> BTreeSet<NodeId> {
        self.by_target
            .iter()
            .filter(|(target, _)| target.overlaps(written))
            .flat_map(|(_, nodes)| nodes.iter().copied())
            .collect()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Path> {
        self.by_target.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
