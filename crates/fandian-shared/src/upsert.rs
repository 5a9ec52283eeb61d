//! Write rules the sync server applies to a stored list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Member, Restaurant, RestaurantList, ValidationError};

/// Name given to a list pushed without one.
pub const DEFAULT_LIST_NAME: &str = "未命名列表";
/// Name given to a list that is created by someone joining it.
pub const DEFAULT_SHARED_LIST_NAME: &str = "共享列表";

/// Body of `POST /lists`. Every field may be omitted; omitted fields keep
/// the stored value (or a default for a brand-new list).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListUpsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurants: Option<Vec<Restaurant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<Member>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
}

/// A client push of `list`. Members are left out: only [`join`] changes them,
/// so a push from a stale copy cannot drop anyone who joined since.
impl From<RestaurantList> for ListUpsert {
    fn from(list: RestaurantList) -> Self {
        Self {
            id: Some(list.id),
            name: Some(list.name),
            restaurants: Some(list.restaurants),
            users: None,
            created_at: Some(list.created_at),
            share_code: list.share_code,
        }
    }
}

impl ListUpsert {
    /// The target id, if the body names one.
    pub fn target_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// Produce the record to store, replacing `existing` in full.
    ///
    /// `id` is the resolved target id (the body's own, or a freshly generated
    /// one). When the result has the same content as `existing` the stored
    /// record comes back untouched, `updatedAt` included, so repeating a put
    /// is a no-op.
    pub fn resolve(
        self,
        id: String,
        existing: Option<&RestaurantList>,
        now: DateTime<Utc>,
    ) -> Result<RestaurantList, ValidationError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| existing.map(|e| e.name.clone()))
            .unwrap_or_else(|| DEFAULT_LIST_NAME.to_string());
        let restaurants = self
            .restaurants
            .or_else(|| existing.map(|e| e.restaurants.clone()))
            .unwrap_or_default();
        let users = self
            .users
            .or_else(|| existing.map(|e| e.users.clone()))
            .unwrap_or_default();
        let created_at = self
            .created_at
            .or_else(|| existing.map(|e| e.created_at))
            .unwrap_or(now);
        let share_code = self
            .share_code
            .or_else(|| existing.and_then(|e| e.share_code.clone()));

        let mut list = RestaurantList {
            id,
            name,
            restaurants,
            created_at,
            share_code,
            users,
            updated_at: None,
        };
        list.validate()?;

        match existing {
            Some(stored) if unchanged(stored, &list) => Ok(stored.clone()),
            _ => {
                list.updated_at = Some(now);
                Ok(list)
            }
        }
    }
}

fn unchanged(stored: &RestaurantList, candidate: &RestaurantList) -> bool {
    stored.id == candidate.id
        && stored.same_content(candidate)
        && stored.users == candidate.users
        && stored.created_at == candidate.created_at
        && stored.share_code == candidate.share_code
}

/// Body of `POST /lists/{id}/join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
}

/// Add a member to a list, creating an empty shared list if none is stored.
///
/// Returns the resulting list and whether anything changed (and so needs writing).
pub fn join(
    list_id: &str,
    existing: Option<RestaurantList>,
    request: &JoinRequest,
    now: DateTime<Utc>,
) -> Result<(RestaurantList, bool), ValidationError> {
    if list_id.trim().is_empty() {
        return Err(ValidationError::MissingField("id"));
    }
    if request.user_id.trim().is_empty() {
        return Err(ValidationError::MissingField("userId"));
    }

    let (mut list, mut changed) = match existing {
        Some(list) => (list, false),
        None => {
            let mut list = RestaurantList::new(list_id, DEFAULT_SHARED_LIST_NAME, None, now);
            list.updated_at = Some(now);
            (list, true)
        }
    };

    if !list.has_member(&request.user_id) {
        list.users.push(Member {
            id: request.user_id.clone(),
            name: request.user_name.clone(),
            joined_at: now,
        });
        list.updated_at = Some(now);
        changed = true;
    }

    Ok((list, changed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{at, list, restaurant};

    #[test]
    fn test_new_list_without_name_gets_default() {
        let stored = ListUpsert::default()
            .resolve("l1".into(), None, at(5))
            .unwrap();
        assert_eq!(stored.name, DEFAULT_LIST_NAME);
        assert!(stored.restaurants.is_empty());
        assert_eq!(stored.created_at, at(5));
        assert_eq!(stored.updated_at, Some(at(5)));
    }

    #[test]
    fn test_client_push_keeps_members_who_joined_later() {
        let request = |id: &str| JoinRequest {
            user_id: id.to_string(),
            user_name: id.to_uppercase(),
        };
        let (first, _) = join("shared", None, &request("ua"), at(1)).unwrap();
        let (stored, _) = join("shared", Some(first.clone()), &request("ub"), at(2)).unwrap();

        // ua's copy only knows about ua
        let mut stale = first;
        stale.restaurants.push(restaurant("r1", "Dumplings", 25.0));
        let pushed = ListUpsert::from(stale);
        assert!(pushed.users.is_none());

        let result = pushed.resolve("shared".into(), Some(&stored), at(3)).unwrap();
        assert!(result.has_member("ua"));
        assert!(result.has_member("ub"));
        assert_eq!(result.restaurants.len(), 1);
    }

    #[test]
    fn test_omitted_fields_keep_stored_values() {
        let existing = list("l1", "Weekend", vec![restaurant("a", "A", 10.0)]);
        let body = ListUpsert {
            id: Some("l1".into()),
            name: Some("Renamed".into()),
            ..ListUpsert::default()
        };
        let stored = body.resolve("l1".into(), Some(&existing), at(9)).unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.restaurants, existing.restaurants);
        assert_eq!(stored.share_code, existing.share_code);
    }

    #[test]
    fn test_full_payload_replaces_restaurants_wholesale() {
        let existing = list(
            "l1",
            "Weekend",
            vec![restaurant("a", "A", 10.0), restaurant("b", "B", 20.0)],
        );
        let incoming = list("l1", "Weekend", vec![restaurant("c", "C", 30.0)]);
        let stored = ListUpsert::from(incoming.clone())
            .resolve("l1".into(), Some(&existing), at(9))
            .unwrap();
        assert_eq!(stored.restaurants, incoming.restaurants);
    }

    #[test]
    fn test_identical_put_keeps_stored_record() {
        let payload = list("l1", "Weekend", vec![restaurant("a", "A", 10.0)]);
        let first = ListUpsert::from(payload.clone())
            .resolve("l1".into(), None, at(1))
            .unwrap();
        let second = ListUpsert::from(payload)
            .resolve("l1".into(), Some(&first), at(2))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.updated_at, Some(at(1)));
    }

    #[test]
    fn test_resolve_rejects_duplicate_restaurants() {
        let payload = list(
            "l1",
            "Weekend",
            vec![restaurant("a", "A", 10.0), restaurant("a", "A2", 11.0)],
        );
        let err = ListUpsert::from(payload)
            .resolve("l1".into(), None, at(1))
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateRestaurant("a".into()));
    }

    #[test]
    fn test_blank_body_id_is_not_a_target() {
        let body = ListUpsert {
            id: Some("   ".into()),
            ..ListUpsert::default()
        };
        assert_eq!(body.target_id(), None);
    }

    #[test]
    fn test_join_creates_missing_list() {
        let request = JoinRequest {
            user_id: "u1".into(),
            user_name: "Mei".into(),
        };
        let (list, changed) = join("l7", None, &request, at(3)).unwrap();
        assert!(changed);
        assert_eq!(list.id, "l7");
        assert_eq!(list.name, DEFAULT_SHARED_LIST_NAME);
        assert!(list.restaurants.is_empty());
        assert_eq!(list.users.len(), 1);
        assert_eq!(list.users[0].name, "Mei");
    }

    #[test]
    fn test_join_twice_adds_member_once() {
        let request = JoinRequest {
            user_id: "u1".into(),
            user_name: "Mei".into(),
        };
        let (first, _) = join("l7", None, &request, at(3)).unwrap();
        let (second, changed) = join("l7", Some(first.clone()), &request, at(4)).unwrap();
        assert!(!changed);
        assert_eq!(second, first);
    }

    #[test]
    fn test_join_requires_user_id() {
        let request = JoinRequest {
            user_id: String::new(),
            user_name: "Mei".into(),
        };
        assert_eq!(
            join("l7", None, &request, at(3)),
            Err(ValidationError::MissingField("userId"))
        );
    }
}
