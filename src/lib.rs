//! Auction snapshot cache.
//!
//! A background watcher polls a saved-variables file, decodes its table
//! literal, selects the sellable items of the most recent scan and publishes
//! them as an immutable [`cache::Snapshot`]. Readers call
//! [`cache::SnapshotStore::read`], which never blocks on the writer.

pub mod cache;
pub mod core;
pub mod decoder;
pub mod selector;
pub mod server;
pub mod source;

pub use cache::{FileWatcher, ReloadPipeline, Snapshot, SnapshotStore};
pub use selector::Item;
