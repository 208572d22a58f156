//! HTTP handlers

pub mod alerts;
pub mod health;
pub mod inventory;
pub mod location;

pub use alerts::*;
pub use health::*;
pub use inventory::*;
pub use location::*;
