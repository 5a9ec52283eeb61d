use crate::model::RestaurantList;

/// What one sync tick should do with a list, plus the payload that wins.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncDecision {
    /// The remote store has never seen this list; push the local copy verbatim.
    UpSync(RestaurantList),
    /// The remote copy differs; this is the local list with the remote name,
    /// restaurants and members swapped in.
    DownSync(RestaurantList),
    NoOp,
}

/// Decide the direction of one sync step.
///
/// `remote` is `None` when the remote store answered "not found". Transport
/// failures never reach this function; the caller skips the tick instead.
///
/// Remote wins whenever both copies exist and differ. `updatedAt` is not
/// consulted, so a local edit whose push has not landed yet is overwritten
/// by the older remote copy (last-fetch-wins).
pub fn reconcile(local: Option<&RestaurantList>, remote: Option<&RestaurantList>) -> SyncDecision {
    let Some(local) = local else {
        return SyncDecision::NoOp;
    };

    match remote {
        None => SyncDecision::UpSync(local.clone()),
        Some(remote) if remote.id != local.id => SyncDecision::NoOp,
        Some(remote) if local.same_content(remote) => SyncDecision::NoOp,
        Some(remote) => {
            let mut merged = local.clone();
            merged.name = remote.name.clone();
            merged.restaurants = remote.restaurants.clone();
            merged.users = remote.users.clone();
            SyncDecision::DownSync(merged)
        }
    }
}
