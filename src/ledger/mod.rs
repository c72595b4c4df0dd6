pub mod hub;
pub mod store;
pub mod table;

pub use store::{append_record, append_records, LedgerStore, LocalStore};
pub use table::Ledger;
