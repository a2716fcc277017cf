//! Background tasks spawned by the server binary.

pub mod reconciliation;
