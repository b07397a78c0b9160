use chrono::Duration;

use crate::{daemon::storage::entities::DailySummary, utils::time::saturating_add};

use super::category::matches_any;

/// Rounded percentage of `part` in `whole`. An empty whole is 0%.
pub fn share(part: Duration, whole: Duration) -> u8 {
    let whole = whole.num_milliseconds();
    if whole <= 0 {
        return 0;
    }
    let part = part.num_milliseconds().clamp(0, whole);
    (part as f64 / whole as f64 * 100.).round() as u8
}

/// Share of the day spent on domains matching the work patterns, from 0 to 100.
pub fn score(summary: &DailySummary, work_patterns: &[String]) -> u8 {
    let (productive, total) = summary.sites.iter().fold(
        (Duration::zero(), Duration::zero()),
        |(productive, total), (domain, entry)| {
            if matches_any(domain, work_patterns) {
                (
                    saturating_add(productive, entry.total_time),
                    saturating_add(total, entry.total_time),
                )
            } else {
                (productive, saturating_add(total, entry.total_time))
            }
        },
    );
    share(productive, total)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use super::{score, share};
    use crate::{
        daemon::storage::entities::{DailySummary, SiteTimeEntry},
        tracking::domain::Domain,
    };

    fn summary(sites: &[(&str, i64)]) -> DailySummary {
        let mut summary = DailySummary::empty(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap());
        for (domain, seconds) in sites {
            let mut entry = SiteTimeEntry::default();
            entry.add(Duration::seconds(*seconds), 1, Utc::now());
            summary.merge_site(&Domain::from(*domain), &entry);
        }
        summary
    }

    #[test]
    fn test_score_without_time_is_zero() {
        assert_eq!(score(&summary(&[]), &["github.com".into()]), 0);
        assert_eq!(score(&summary(&[("github.com", 0)]), &["github.com".into()]), 0);
    }

    #[test]
    fn test_score_rounds() {
        let day = summary(&[("github.com", 2), ("docs.google.com", 0), ("youtube.com", 1)]);
        let work = ["github.com".to_string(), "docs.google.com".to_string()];

        assert_eq!(score(&day, &work), 67);
        assert_eq!(score(&day, &[]), 0);
        assert_eq!(score(&summary(&[("github.com", 5)]), &work), 100);
    }

    #[test]
    fn test_share() {
        assert_eq!(share(Duration::seconds(1), Duration::seconds(8)), 13);
        assert_eq!(share(Duration::seconds(1), Duration::zero()), 0);
        assert_eq!(share(Duration::seconds(9), Duration::seconds(3)), 100);
    }
}
