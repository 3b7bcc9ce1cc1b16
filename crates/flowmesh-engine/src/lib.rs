//! Orchestrator and Worker reactors: the two cooperating state machines
//! that drive a workflow's DAG forward through the State Store (spec §4.2,
//! §4.3). Neither reactor holds in-process state across invocations — all
//! coordination flows through `flowmesh_store::StateStore`.

pub mod dag;
pub mod orchestrator;
pub mod worker;

pub use dag::{validate_graph, InvalidGraph};
pub use orchestrator::Orchestrator;
pub use worker::{ClaimOutcome, Worker};
