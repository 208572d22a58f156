//! Domain models for the medicine cabinet

mod alert;
mod batch;
mod item;
mod ledger;
mod location;

pub use alert::*;
pub use batch::*;
pub use item::*;
pub use ledger::*;
pub use location::*;
