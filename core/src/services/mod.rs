pub mod journal;
pub mod ledger;
pub mod manager;
pub mod ports;
pub mod queue;
pub mod reservation_engine;

pub use journal::TransactionJournal;
pub use ledger::InventoryLedger;
pub use manager::{InventoryManager, MutationOutcome, MutationRequest};
pub use ports::{LocationPriority, SingleLocationDirectory, VariantDirectory};
pub use queue::{CommandRegistry, DelayedJobQueue, Dispatcher, JobHandler};
pub use reservation_engine::{AllocatedReservation, CreateItem, CreateOutcome, CreateRequest, ReservationEngine};
