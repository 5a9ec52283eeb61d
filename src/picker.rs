//! Random restaurant picker.
//!
//! One uniform draw per call. No weighting, no memory of earlier picks:
//! the same restaurant can come up twice in a row.

use fandian_shared::Restaurant;
use rand::Rng;

use crate::filter::FilterOptions;

/// Draw one candidate uniformly at random. `None` only when `candidates` is empty.
pub fn pick<'a, T, R: Rng + ?Sized>(candidates: &'a [T], rng: &mut R) -> Option<&'a T> {
    if candidates.is_empty() {
        return None;
    }
    let idx = rng.gen_range(0..candidates.len());
    candidates.get(idx)
}

/// Restaurants passing `filter` that are not excluded.
pub fn available<'a>(restaurants: &'a [Restaurant], filter: &FilterOptions) -> Vec<&'a Restaurant> {
    filter.apply(restaurants).filter(|r| !r.excluded).collect()
}

/// Filter, drop excluded restaurants, then draw.
pub fn pick_available<'a, R: Rng + ?Sized>(
    restaurants: &'a [Restaurant],
    filter: &FilterOptions,
    rng: &mut R,
) -> Option<&'a Restaurant> {
    pick(&available(restaurants, filter), rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fandian_shared::RestaurantDraft;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn restaurant(id: &str, price: f64, excluded: bool) -> Restaurant {
        RestaurantDraft {
            avg_price: price,
            excluded,
            ..RestaurantDraft::new(id.to_uppercase())
        }
        .into_restaurant(id.to_string(), Utc::now())
    }

    #[test]
    fn test_empty_candidates_pick_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty: [Restaurant; 0] = [];
        assert!(pick(&empty, &mut rng).is_none());
    }

    #[test]
    fn test_all_excluded_picks_none() {
        let mut rng = StdRng::seed_from_u64(2);
        let all = vec![restaurant("a", 10.0, true), restaurant("b", 20.0, true)];
        assert!(pick_available(&all, &FilterOptions::default(), &mut rng).is_none());
    }

    #[test]
    fn test_weekend_list_always_picks_the_only_active_restaurant() {
        // A(price 50) active, B(price 200) excluded
        let weekend = vec![restaurant("a", 50.0, false), restaurant("b", 200.0, true)];
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let picked = pick_available(&weekend, &FilterOptions::default(), &mut rng).unwrap();
            assert_eq!(picked.id, "a");
        }
    }

    #[test]
    fn test_filter_applies_before_draw() {
        let all = vec![restaurant("cheap", 30.0, false), restaurant("dear", 300.0, false)];
        let filter = FilterOptions {
            price_range: (0.0, 100.0),
            ..FilterOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            assert_eq!(pick_available(&all, &filter, &mut rng).unwrap().id, "cheap");
        }
    }

    #[test]
    fn test_draws_are_uniform_chi_square() {
        const N: usize = 8;
        const TRIALS: usize = 80_000;
        let candidates: Vec<usize> = (0..N).collect();
        let mut counts = [0usize; N];
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..TRIALS {
            counts[*pick(&candidates, &mut rng).unwrap()] += 1;
        }

        let expected = TRIALS as f64 / N as f64;
        let chi2: f64 = counts
            .iter()
            .map(|&c| {
                let d = c as f64 - expected;
                d * d / expected
            })
            .sum();
        // 7 degrees of freedom, p = 0.001 critical value
        assert!(chi2 < 24.32, "chi-square {chi2} too large for uniform draws: {counts:?}");
    }

    #[test]
    fn test_repeat_picks_are_allowed() {
        let one = vec![restaurant("solo", 10.0, false)];
        let mut rng = StdRng::seed_from_u64(5);
        let first = pick(&one, &mut rng).unwrap();
        let second = pick(&one, &mut rng).unwrap();
        assert_eq!(first.id, second.id);
    }
}
