//! Multi-channel truth models and the random bipartite graph generator.
//!
//! This module provides:
//! - **multiple_bsc**: items observed through one binary symmetric channel each
//! - **multiple_bsc_pair**: items observed through two-layer channels
//! - **prior**: the empirical-Bayes Beta prior over noise rates
//! - **random_graph**: random bipartite graphs with given degree sequences

pub mod multiple_bsc;
pub mod multiple_bsc_pair;
pub mod prior;
pub mod random_graph;

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::VarId;

/// Names mapped to graph variables, remembering insertion order.
#[derive(Debug, Clone, Default)]
pub(crate) struct NameTable {
    index: FxHashMap<Arc<str>, VarId>,
    names: Vec<Arc<str>>,
    ids: Vec<VarId>,
}

impl NameTable {
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Interned name for an entry already in the table.
    pub fn key(&self, name: &str) -> Option<Arc<str>> {
        self.index.get_key_value(name).map(|(k, _)| k.clone())
    }

    /// Registers a new name. The caller checks it is not present.
    pub fn insert(&mut self, name: &str, id: VarId) -> Arc<str> {
        let key: Arc<str> = Arc::from(name);
        self.index.insert(key.clone(), id);
        self.names.push(key.clone());
        self.ids.push(id);
        key
    }

    /// Variables in insertion order.
    pub fn ids(&self) -> &[VarId] {
        &self.ids
    }

    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.names.iter().map(|n| &**n).zip(self.ids.iter().copied())
    }

    /// Current values keyed by name.
    pub fn values(&self, graph: &FactorGraph) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(name, id)| (name.to_string(), graph.variables()[id.index()].value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::variable::RandomVariable;

    #[test]
    fn name_table_keeps_insertion_order() {
        let mut graph = FactorGraph::new();
        let mut table = NameTable::default();
        for name in ["zeta", "alpha", "mid"] {
            let id = graph.add_variable(RandomVariable::boolean(name == "alpha"));
            table.insert(name, id);
        }
        assert_eq!(table.ids().len(), 3);
        assert!(table.contains("mid"));
        assert_eq!(table.get("alpha"), Some(VarId(1)));
        let order: Vec<&str> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
        let values = table.values(&graph);
        assert_eq!(values["alpha"], 1.0);
        assert_eq!(values["zeta"], 0.0);
        assert_eq!(&*table.key("mid").unwrap(), "mid");
    }
}
