//! Trait interfaces for pluggable ledger implementations.

pub mod position_ledger;

pub use position_ledger::{
    CompletedPosition, PersistenceError, PositionLedger, PositionStream, Result,
};
