use std::hash::Hash;
use std::collections::HashSet;

use chrono::Duration;

pub fn first_duplicate<A>(iter: impl IntoIterator<Item=A>) -> Option<A>
where A: Eq + Hash + Copy {
    let mut seen = HashSet::<A>::new();
    iter.into_iter().find(|a| !seen.insert(*a))
}

/// Renders the time left before an advisory deadline, e.g. `2h 5m`.
pub fn format_remaining(remaining: Duration) -> String {
    if remaining < Duration::zero() {
        return "expired".to_owned();
    }

    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;

    match (hours, minutes) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}
