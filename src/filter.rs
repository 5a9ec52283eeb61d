use std::collections::BTreeSet;

use fandian_shared::Restaurant;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_PRICE: f64 = 500.0;

/// Narrowing applied before showing or picking restaurants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    /// Inclusive per-person price bounds.
    pub price_range: (f64, f64),
    /// Match any of these tags; empty means no tag filter.
    pub tags: Vec<String>,
    /// Case-insensitive substring of name or address.
    pub search_text: String,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            price_range: (0.0, DEFAULT_MAX_PRICE),
            tags: Vec::new(),
            search_text: String::new(),
        }
    }
}

impl FilterOptions {
    pub fn matches(&self, restaurant: &Restaurant) -> bool {
        let (min, max) = self.price_range;
        if restaurant.avg_price < min || restaurant.avg_price > max {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| restaurant.has_tag(t)) {
            return false;
        }
        let needle = self.search_text.trim().to_lowercase();
        if !needle.is_empty() {
            return restaurant.name.to_lowercase().contains(&needle)
                || restaurant.address.to_lowercase().contains(&needle);
        }
        true
    }

    pub fn apply<'s, 'a: 's>(
        &'s self,
        restaurants: &'a [Restaurant],
    ) -> impl Iterator<Item = &'a Restaurant> + 's {
        restaurants.iter().filter(move |r| self.matches(r))
    }
}

/// Every tag used in `restaurants`, sorted and de-duplicated.
pub fn all_tags(restaurants: &[Restaurant]) -> Vec<String> {
    restaurants
        .iter()
        .flat_map(|r| r.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Slider bounds: never narrower than 0..=500.
pub fn price_bounds(restaurants: &[Restaurant]) -> (f64, f64) {
    restaurants.iter().fold((0.0, DEFAULT_MAX_PRICE), |(lo, hi), r| {
        (lo.min(r.avg_price), hi.max(r.avg_price))
    })
}
