pub mod memory;
pub mod postgres;
pub mod whale_alert;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use whale_alert::WhaleAlertClient;
