//! Staleness metric calculators
//!
//! Three pure functions derived from the libyear paper
//! (<https://ericbouwers.github.io/papers/icse15.pdf>): elapsed-time
//! staleness, release-count staleness and version-component staleness.

use chrono::{DateTime, Utc};
use semver::Version;

use crate::module::VersionsDiff;

/// Fixed 365-day year; calendar accuracy is intentionally not a goal.
pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Elapsed time between two releases in 365-day years, clamped at zero.
///
/// A latest release published before the base time (a backported patch on a
/// superseded line, for instance) must not offset the aggregate.
pub fn libyear(base: DateTime<Utc>, latest: DateTime<Utc>) -> f64 {
    let seconds = (latest - base).num_seconds() as f64;
    (seconds / SECONDS_PER_YEAR).max(0.0)
}

/// Number of releases between declared and latest: the index gap in the
/// ascending-sorted combined version list.
///
/// Returns `None` when either version is missing from the list.
///
/// Example:
/// ```text
/// v:  v1 | v2 | v3 | v4
/// i:  0    1    2    3
///          ^         ^
///    declared (i:1)  latest (i:3)  -> 2
/// ```
pub fn releases_diff(declared: &Version, latest: &Version, versions: &[Version]) -> Option<i64> {
    let declared_index = versions.iter().position(|v| v == declared)?;
    let latest_index = versions.iter().position(|v| v == latest)?;
    Some(latest_index as i64 - declared_index as i64)
}

/// Per-component version delta: the absolute difference of the highest-order
/// component that changed, all lower-order components zeroed.
///
/// Example:
/// ```text
/// declared: v2.3.4
/// latest:   v3.6.4
/// diff:     [(3-2), 0, 0] = [1, 0, 0]
/// ```
pub fn versions_diff(declared: &Version, latest: &Version) -> VersionsDiff {
    if latest.major != declared.major {
        VersionsDiff([latest.major as i64 - declared.major as i64, 0, 0])
    } else if latest.minor != declared.minor {
        VersionsDiff([0, latest.minor as i64 - declared.minor as i64, 0])
    } else if latest.patch != declared.patch {
        VersionsDiff([0, 0, latest.patch as i64 - declared.patch as i64])
    } else {
        VersionsDiff::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(s: &str) -> DateTime<Utc> {
        format!("{s}T00:00:00Z").parse().unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[rstest]
    #[case("2022-01-01", "2022-01-01", 0.0)] // equal timestamps
    #[case("2021-05-15", "2021-05-14", 0.0)] // negative delta clamps to zero
    #[case("2021-01-01", "2022-01-01", 1.0)] // exactly 365 days
    fn libyear_clamps_and_scales(#[case] base: &str, #[case] latest: &str, #[case] expected: f64) {
        assert_eq!(libyear(date(base), date(latest)), expected);
    }

    #[test]
    fn libyear_scales_linearly_with_elapsed_seconds() {
        let result = libyear(date("2021-05-12"), date("2022-01-01"));
        assert!((result - 0.64).abs() < 0.01, "got {result}");
    }

    #[rstest]
    #[case("1.9.0", "2.10.2", VersionsDiff([1, 0, 0]))]
    #[case("1.9.0", "1.12.3", VersionsDiff([0, 3, 0]))]
    #[case("1.9.0", "1.9.12", VersionsDiff([0, 0, 12]))]
    #[case("1.0.0", "1.0.0", VersionsDiff([0, 0, 0]))]
    fn versions_diff_keeps_only_highest_order_component(
        #[case] declared: &str,
        #[case] latest: &str,
        #[case] expected: VersionsDiff,
    ) {
        assert_eq!(versions_diff(&v(declared), &v(latest)), expected);
    }

    #[test]
    fn releases_diff_is_the_index_gap() {
        let versions = vec![v("0.9.0"), v("0.9.1"), v("0.9.2"), v("0.10.0"), v("1.0.0")];
        assert_eq!(releases_diff(&v("0.9.0"), &v("1.0.0"), &versions), Some(4));
        assert_eq!(releases_diff(&v("0.9.1"), &v("0.10.0"), &versions), Some(2));
        assert_eq!(releases_diff(&v("1.0.0"), &v("1.0.0"), &versions), Some(0));
    }

    #[test]
    fn releases_diff_requires_both_versions_in_the_list() {
        let versions = vec![v("0.9.0"), v("1.0.0")];
        assert_eq!(releases_diff(&v("0.8.0"), &v("1.0.0"), &versions), None);
        assert_eq!(releases_diff(&v("0.9.0"), &v("2.0.0"), &versions), None);
    }
}
