//! Background jobs

pub mod reconcile;

pub use reconcile::{ReconcileJob, StepReport, SweepReport};
