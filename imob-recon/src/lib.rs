//! # Property Update Reconciliation Engine
//!
//! Accepts a heterogeneous update payload for a property record, decides
//! what actually needs to change, selectively recomputes derived geographic
//! data, atomically synchronizes the dependent relations, and produces a
//! minimal, human-auditable record of what changed. Invoked in-process by
//! the HTTP layer; request parsing, auth and response shaping live there.

pub mod audit;
pub mod error;
pub mod geocoding;
pub mod history;
pub mod normalize;
pub mod orchestrator;
pub mod outcome;
pub mod payload;
pub mod relations;
pub mod snapshot;

pub use error::{UpdateError, UpdateResult};
pub use orchestrator::{ReconcileReport, RequestClass, UpdateOrchestrator};
pub use snapshot::PropertySnapshot;
