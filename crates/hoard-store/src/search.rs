//! Choosing which prefixes to search for an hour range.
//!
//! Listing a prefix is a network round trip on remote backends, so a range
//! query lists as few prefixes as possible. The range is enumerated at the
//! finest of hour, day, month or year granularity whose prefix count stays
//! under a per-granularity limit; the backend then returns every non-empty
//! hour beneath each prefix and the caller filters to the exact range.

use std::collections::BTreeSet;

use hoard_types::{Hour, Prefix};

pub const MAX_HOUR_PREFIXES: i64 = 10;
pub const MAX_DAY_PREFIXES: i64 = 9;
pub const MAX_MONTH_PREFIXES: i64 = 6;

const HOURS_PER_DAY: i64 = 24;
const HOURS_PER_SHORTEST_MONTH: i64 = 28 * HOURS_PER_DAY;
const HOURS_PER_SHORTEST_YEAR: i64 = 364 * HOURS_PER_DAY;

/// Prefixes whose union covers every hour in `[start, end]`.
///
/// All returned prefixes have the same length and are distinct, so their
/// search spaces never overlap. An unbounded start yields the single empty
/// prefix.
pub fn prefixes_for_range(start: Option<Hour>, end: Hour) -> Vec<Prefix> {
    let Some(start) = start else {
        return vec![Prefix::empty()];
    };
    if end < start {
        return Vec::new();
    }
    let num_hours = end.hours_since(start) + 1;
    // N day (month) long ranges can touch N+1 calendar days (months), hence
    // the minus one on the day and month limits.
    let (increment, length) = if num_hours <= MAX_HOUR_PREFIXES {
        (1, 4)
    } else if num_hours / HOURS_PER_DAY + 1 <= MAX_DAY_PREFIXES - 1 {
        (HOURS_PER_DAY, 3)
    } else if num_hours / HOURS_PER_SHORTEST_MONTH + 1 <= MAX_MONTH_PREFIXES - 1 {
        (HOURS_PER_SHORTEST_MONTH, 2)
    } else {
        (HOURS_PER_SHORTEST_YEAR, 1)
    };

    let last = end.persistence_prefix().truncated(length);
    let mut prefixes = BTreeSet::new();
    let mut cursor = start;
    // Every step is shorter than the enclosing calendar unit, so no unit is
    // skipped and the loop reaches `last`.
    while !prefixes.contains(&last) {
        prefixes.insert(cursor.persistence_prefix().truncated(length));
        cursor = cursor.add(increment);
    }
    prefixes.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour(y: i32, m: u32, d: u32, h: u32) -> Hour {
        Hour::new(y, m, d, h).unwrap()
    }

    fn ids(prefixes: &[Prefix]) -> Vec<String> {
        prefixes.iter().map(Prefix::id).collect()
    }

    #[test]
    fn unbounded_start_is_one_empty_prefix() {
        assert_eq!(prefixes_for_range(None, hour(2020, 1, 1, 0)), vec![Prefix::empty()]);
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(prefixes_for_range(Some(hour(2020, 1, 2, 0)), hour(2020, 1, 1, 0)).is_empty());
    }

    #[test]
    fn short_ranges_use_hours() {
        let prefixes = prefixes_for_range(Some(hour(2020, 2, 3, 4)), hour(2020, 2, 3, 7));
        assert_eq!(
            ids(&prefixes),
            vec!["2020/02/03/04", "2020/02/03/05", "2020/02/03/06", "2020/02/03/07"]
        );
    }

    #[test]
    fn day_ranges_cross_month_boundaries() {
        let prefixes = prefixes_for_range(Some(hour(2020, 2, 28, 12)), hour(2020, 3, 2, 1));
        assert_eq!(ids(&prefixes), vec!["2020/02/28", "2020/02/29", "2020/03/01", "2020/03/02"]);
    }

    #[test]
    fn month_ranges() {
        let prefixes = prefixes_for_range(Some(hour(2020, 4, 3, 4)), hour(2020, 6, 6, 7));
        assert_eq!(ids(&prefixes), vec!["2020/04", "2020/05", "2020/06"]);
    }

    #[test]
    fn year_ranges() {
        let prefixes = prefixes_for_range(Some(hour(2019, 2, 3, 4)), hour(2020, 11, 3, 4));
        assert_eq!(ids(&prefixes), vec!["2019", "2020"]);
    }

    #[test]
    fn prefixes_share_one_length() {
        let cases = [
            (hour(2020, 1, 1, 0), hour(2020, 1, 1, 9)),
            (hour(2020, 1, 1, 0), hour(2020, 1, 5, 0)),
            (hour(2020, 1, 1, 0), hour(2020, 3, 5, 0)),
            (hour(2018, 1, 1, 0), hour(2020, 3, 5, 0)),
        ];
        for (start, end) in cases {
            let prefixes = prefixes_for_range(Some(start), end);
            let length = prefixes[0].len();
            assert!(prefixes.iter().all(|p| p.len() == length));
            assert!(prefixes.iter().any(|p| p.is_parent_of(&start.persistence_prefix())));
            assert!(prefixes.iter().any(|p| p.is_parent_of(&end.persistence_prefix())));
        }
    }
}
