//! Storage abstractions for service layer
//!
//! `EntryStore` is the contract both handlers consume; the file-backed and
//! set-backed implementations are chosen at startup.

pub mod entry_store;
pub mod file_entry_store;
pub mod set_entry_store;

pub use entry_store::{EntryStore, InsertOutcome};
pub use file_entry_store::FileEntryStore;
pub use set_entry_store::{SetEntryStore, SetStoreConfig};
