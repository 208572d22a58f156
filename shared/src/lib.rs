//! Shared types and stock logic for the Home Service medicine cabinet
//!
//! This crate has no I/O: it holds the domain models, the FEFO allocation
//! engine and the rules that derive low-stock / expiring flags, so the
//! backend and its tests work from one definition.

pub mod alerts;
pub mod allocation;
pub mod models;
pub mod stock;
pub mod validation;

pub use models::*;
