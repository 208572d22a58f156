//! Business logic services for the medicine cabinet

pub mod alert_scanner;
pub mod applier;
pub mod inventory;
pub mod notifier;

pub use alert_scanner::{AlertScanner, ScanReport};
pub use applier::{CommittedStep, TransactionApplier};
pub use inventory::{InventoryService, MovementOutcome};
pub use notifier::{Notifier, TracingNotifier, WebhookNotifier};
