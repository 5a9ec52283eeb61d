use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Rejections for records that break the list invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("duplicate restaurant id `{0}` in list")]
    DuplicateRestaurant(String),

    #[error("field `{field}` of restaurant `{restaurant}` is not a finite number")]
    NotFinite {
        restaurant: String,
        field: &'static str,
    },
}

/// A bookmarked restaurant. Only ever exists as a child of a [`RestaurantList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
    /// Average spend per person, currency-agnostic.
    #[serde(default)]
    pub avg_price: f64,
    /// Local wall-clock "HH:MM".
    #[serde(default)]
    pub open_time: String,
    #[serde(default)]
    pub close_time: String,
    #[serde(default)]
    pub dishes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Skipped by the picker without being deleted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub excluded: bool,
}

impl Restaurant {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("restaurants[].id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("restaurants[].name"));
        }
        let numbers = [
            ("lat", Some(self.lat)),
            ("lng", Some(self.lng)),
            ("avgPrice", Some(self.avg_price)),
            ("rating", self.rating),
        ];
        for (field, value) in numbers {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ValidationError::NotFinite {
                    restaurant: self.id.clone(),
                    field,
                });
            }
        }
        Ok(())
    }

    /// True when `tag` is one of this restaurant's tags.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Restaurant fields supplied by the user; `id` and `createdAt` are assigned on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestaurantDraft {
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub avg_price: f64,
    pub open_time: String,
    pub close_time: String,
    pub dishes: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub excluded: bool,
}

impl RestaurantDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn into_restaurant(self, id: String, created_at: DateTime<Utc>) -> Restaurant {
        Restaurant {
            id,
            name: self.name,
            address: self.address,
            lat: self.lat,
            lng: self.lng,
            avg_price: self.avg_price,
            open_time: self.open_time,
            close_time: self.close_time,
            dishes: self.dishes,
            tags: dedup_tags(self.tags),
            rating: self.rating,
            phone: self.phone,
            note: self.note,
            source: self.source,
            source_url: self.source_url,
            image_url: self.image_url,
            created_at,
            excluded: self.excluded,
        }
    }
}

/// Tags are a set; keep the first occurrence of each so ordering stays stable.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Partial update merged onto an existing restaurant. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestaurantPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub avg_price: Option<f64>,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub dishes: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub rating: Option<f64>,
    pub phone: Option<String>,
    pub note: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub excluded: Option<bool>,
}

impl RestaurantPatch {
    pub fn excluded(excluded: bool) -> Self {
        Self {
            excluded: Some(excluded),
            ..Self::default()
        }
    }

    pub fn apply(self, target: &mut Restaurant) {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    target.$field = value;
                })*
            };
        }
        merge!(name, address, lat, lng, avg_price, open_time, close_time, dishes, excluded);

        if let Some(tags) = self.tags {
            target.tags = dedup_tags(tags);
        }
        if self.rating.is_some() {
            target.rating = self.rating;
        }
        if self.phone.is_some() {
            target.phone = self.phone;
        }
        if self.note.is_some() {
            target.note = self.note;
        }
        if self.source.is_some() {
            target.source = self.source;
        }
        if self.source_url.is_some() {
            target.source_url = self.source_url;
        }
        if self.image_url.is_some() {
            target.image_url = self.image_url;
        }
    }
}

/// A user who joined a shared list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

/// A named, shareable collection of restaurants. `id` doubles as the sharing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantList {
    pub id: String,
    pub name: String,
    /// Insertion order, never re-sorted.
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<Member>,
    /// Stamped by the server on every content change. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RestaurantList {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        share_code: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            restaurants: Vec::new(),
            created_at,
            share_code,
            users: Vec::new(),
            updated_at: None,
        }
    }

    pub fn restaurant(&self, restaurant_id: &str) -> Option<&Restaurant> {
        self.restaurants.iter().find(|r| r.id == restaurant_id)
    }

    pub fn restaurant_mut(&mut self, restaurant_id: &str) -> Option<&mut Restaurant> {
        self.restaurants.iter_mut().find(|r| r.id == restaurant_id)
    }

    /// Restaurants the picker may choose from.
    pub fn active(&self) -> impl Iterator<Item = &Restaurant> {
        self.restaurants.iter().filter(|r| !r.excluded)
    }

    /// Whether the fields a sync tick compares (name and restaurants) are equal.
    pub fn same_content(&self, other: &RestaurantList) -> bool {
        self.name == other.name && self.restaurants == other.restaurants
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        let mut ids = HashSet::with_capacity(self.restaurants.len());
        for restaurant in &self.restaurants {
            restaurant.validate()?;
            if !ids.insert(restaurant.id.as_str()) {
                return Err(ValidationError::DuplicateRestaurant(restaurant.id.clone()));
            }
        }
        Ok(())
    }
}
