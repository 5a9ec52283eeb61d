//! fandian: shared restaurant lists with a random "where do we eat" picker.
//!
//! Lists live on each device in a [`local_store::LocalStore`]. A sync server
//! ([`server`]) holds the shared copy, and [`sync::SyncEngine`] keeps the
//! selected list in step with it.

pub mod config;
pub mod filter;
pub mod ids;
pub mod local_store;
pub mod picker;
pub mod server;
pub mod service;
pub mod storage;
pub mod sync;

pub use fandian_shared as model;
