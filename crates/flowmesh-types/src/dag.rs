//! Seed-time graph description supplied by a caller of `Orchestrator::seed`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::TaskId;

/// One node of a caller-supplied DAG. `dependents` is intentionally absent
/// here: it's always derived as the transpose of `depends_on` (spec §4.2.1
/// step 1), never supplied directly, so there's no way to seed an
/// inconsistent graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSpec {
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    pub target_address: String,
}

/// A finite, caller-supplied DAG. The reference graph from spec §4.2.1
/// (`A -> {B1,B2,B3} -> C`) is just one instance of this; any acyclic graph
/// is admitted.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DagSpec {
    pub nodes: HashMap<TaskId, NodeSpec>,
}

impl DagSpec {
    /// Convenience constructor for the fixed reference DAG used throughout
    /// the test scenarios in spec §8.
    pub fn diamond(targets: HashMap<TaskId, String>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            "A".to_string(),
            NodeSpec { depends_on: vec![], target_address: targets["A"].clone() },
        );
        for b in ["B1", "B2", "B3"] {
            nodes.insert(
                b.to_string(),
                NodeSpec { depends_on: vec!["A".to_string()], target_address: targets[b].clone() },
            );
        }
        nodes.insert(
            "C".to_string(),
            NodeSpec {
                depends_on: vec!["B1".to_string(), "B2".to_string(), "B3".to_string()],
                target_address: targets["C"].clone(),
            },
        );
        Self { nodes }
    }
}
