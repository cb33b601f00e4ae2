pub mod context;
pub mod inventory;
pub mod job;
pub mod reservation;
pub mod transaction;

pub use context::RequestContext;
pub use inventory::InventoryItem;
pub use job::{ExpiryPayload, ScheduledJobEnvelope, EXPIRY_COMMAND};
pub use reservation::{Reservation, ReservationStatus};
pub use transaction::{Direction, Transaction, TransactionFilter, TransactionType};
