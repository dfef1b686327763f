pub mod settlement;

pub use settlement::{call_with_deadline, ReconcileOutcome, ReconcileReport, SettlementService};
