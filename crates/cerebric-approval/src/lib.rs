//! C6 — Approval Protocol & Dry-Run Simulator.

pub mod engine;
pub mod simulator;
pub mod store;

pub use engine::{ApprovalEngine, ApprovalMode};
pub use simulator::{simulate, ActionRequest};
pub use store::ApprovalStore;
