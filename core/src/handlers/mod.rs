pub mod inventory;

pub use inventory::router;
