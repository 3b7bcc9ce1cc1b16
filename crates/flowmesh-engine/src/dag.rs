//! Graph validation and dependents derivation for a seeded workflow.
//!
//! The reference DAG is `A -> {B1,B2,B3} -> C`, but nothing here assumes
//! that shape; any finite, acyclic, fully-addressed graph is accepted
//! (spec §4.2.1, §9 "hard-coded reference DAG").

use std::collections::{HashMap, HashSet, VecDeque};

use flowmesh_types::{DagSpec, TaskId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidGraph {
    #[error("task {task_id} depends on {depends_on}, which has no entry in the graph")]
    DanglingDependency { task_id: TaskId, depends_on: TaskId },
    #[error("graph contains a cycle reachable from {task_id}")]
    Cycle { task_id: TaskId },
}

/// Validates that `spec` is a finite DAG with no dangling edges, and
/// derives each node's `dependents` list as the transpose of `depends_on`.
///
/// Returns the dependents map keyed by taskId on success.
pub fn validate_graph(spec: &DagSpec) -> Result<HashMap<TaskId, Vec<TaskId>>, InvalidGraph> {
    for (task_id, node) in &spec.nodes {
        for parent in &node.depends_on {
            if !spec.nodes.contains_key(parent) {
                return Err(InvalidGraph::DanglingDependency { task_id: task_id.clone(), depends_on: parent.clone() });
            }
        }
    }

    let mut dependents: HashMap<TaskId, Vec<TaskId>> = spec.nodes.keys().map(|id| (id.clone(), Vec::new())).collect();
    for (task_id, node) in &spec.nodes {
        for parent in &node.depends_on {
            dependents.get_mut(parent).expect("parent existence checked above").push(task_id.clone());
        }
    }

    assert_acyclic(spec)?;

    Ok(dependents)
}

/// Kahn's algorithm: repeatedly remove nodes with in-degree zero. If any
/// node remains once the queue drains, the graph has a cycle.
fn assert_acyclic(spec: &DagSpec) -> Result<(), InvalidGraph> {
    let mut in_degree: HashMap<&TaskId, usize> = spec.nodes.iter().map(|(id, node)| (id, node.depends_on.len())).collect();
    let mut children: HashMap<&TaskId, Vec<&TaskId>> = spec.nodes.keys().map(|id| (id, Vec::new())).collect();
    for (task_id, node) in &spec.nodes {
        for parent in &node.depends_on {
            children.get_mut(parent).expect("parent existence checked above").push(task_id);
        }
    }

    let mut queue: VecDeque<&TaskId> = in_degree.iter().filter(|(_, degree)| **degree == 0).map(|(id, _)| *id).collect();
    let mut visited: HashSet<&TaskId> = HashSet::new();

    while let Some(task_id) = queue.pop_front() {
        visited.insert(task_id);
        for child_id in &children[task_id] {
            let entry = in_degree.get_mut(child_id).expect("child present in graph");
            *entry -= 1;
            if *entry == 0 {
                queue.push_back(child_id);
            }
        }
    }

    if visited.len() == spec.nodes.len() {
        Ok(())
    } else {
        let stuck = spec
            .nodes
            .keys()
            .find(|id| !visited.contains(id))
            .expect("visited.len() < nodes.len() implies a remaining key");
        Err(InvalidGraph::Cycle { task_id: stuck.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmesh_types::NodeSpec;

    fn node(depends_on: &[&str], target: &str) -> NodeSpec {
        NodeSpec { depends_on: depends_on.iter().map(|s| s.to_string()).collect(), target_address: target.to_string() }
    }

    #[test]
    fn diamond_dag_derives_dependents() {
        let mut nodes = HashMap::new();
        nodes.insert("A".to_string(), node(&[], "http://a"));
        nodes.insert("B1".to_string(), node(&["A"], "http://b1"));
        nodes.insert("B2".to_string(), node(&["A"], "http://b2"));
        nodes.insert("C".to_string(), node(&["B1", "B2"], "http://c"));
        let spec = DagSpec { nodes };

        let dependents = validate_graph(&spec).unwrap();
        let mut a_dependents = dependents["A"].clone();
        a_dependents.sort();
        assert_eq!(a_dependents, vec!["B1".to_string(), "B2".to_string()]);
        assert_eq!(dependents["C"], Vec::<String>::new());
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let mut nodes = HashMap::new();
        nodes.insert("B".to_string(), node(&["A"], "http://b"));
        let spec = DagSpec { nodes };

        assert_eq!(validate_graph(&spec), Err(InvalidGraph::DanglingDependency { task_id: "B".to_string(), depends_on: "A".to_string() }));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut nodes = HashMap::new();
        nodes.insert("A".to_string(), node(&["B"], "http://a"));
        nodes.insert("B".to_string(), node(&["A"], "http://b"));
        let spec = DagSpec { nodes };

        assert!(matches!(validate_graph(&spec), Err(InvalidGraph::Cycle { .. })));
    }
}
