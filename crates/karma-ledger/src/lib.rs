pub mod error;
pub mod memory;
pub mod sqlite_store;
pub mod store;

pub use error::LedgerError;
pub use memory::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use store::{KarmaLedger, PeriodTotal};
