//! List records and merge rules for fandian.
//!
//! Used on both sides of the wire:
//!
//! - the sync server applies [`ListUpsert::resolve`] and [`join`] to the
//!   stored record before writing it back,
//! - the client runs [`reconcile`] once per sync tick to decide whether the
//!   local copy or the remote copy of a list wins.
//!
//! Nothing in here touches the network or the filesystem.

mod model;
mod reconcile;
mod upsert;

pub use model::{
    Member, Restaurant, RestaurantDraft, RestaurantList, RestaurantPatch, ValidationError,
};
pub use reconcile::{reconcile, SyncDecision};
pub use upsert::{join, JoinRequest, ListUpsert, DEFAULT_LIST_NAME, DEFAULT_SHARED_LIST_NAME};
