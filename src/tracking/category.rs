use std::{collections::HashMap, fmt::Display};

use chrono::Duration;

use crate::{
    daemon::storage::entities::{CategoryRule, DailySummary},
    utils::time::saturating_add,
};

use super::error::EngineError;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Classification<'a> {
    Category(&'a str),
    Uncategorized,
}

impl Display for Classification<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Category(name) => f.write_str(name),
            Classification::Uncategorized => f.write_str(UNCATEGORIZED),
        }
    }
}

/// Containment test shared by classification and scoring. Empty patterns never match.
pub fn matches_any(domain: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && domain.contains(pattern.as_str()))
}

/// Rules are checked in their stored order and the first one containing a matching pattern wins,
/// even if a later rule matches more specifically.
pub fn classify<'a>(domain: &str, rules: &'a [CategoryRule]) -> Classification<'a> {
    rules
        .iter()
        .find(|rule| matches_any(domain, &rule.domain_patterns))
        .map_or(Classification::Uncategorized, |rule| {
            Classification::Category(&rule.name)
        })
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CategoryUsage {
    pub category: String,
    pub total_time: Duration,
}

/// Time of a day per category, the largest first. Unmatched time is reported as
/// [UNCATEGORIZED].
pub fn time_by_category(summary: &DailySummary, rules: &[CategoryRule]) -> Vec<CategoryUsage> {
    let mut totals = HashMap::<String, Duration>::new();
    for (domain, entry) in &summary.sites {
        let category = classify(domain, rules).to_string();
        let total = totals.entry(category).or_insert_with(Duration::zero);
        *total = saturating_add(*total, entry.total_time);
    }

    let mut usages = totals
        .into_iter()
        .filter(|(_, time)| !time.is_zero())
        .map(|(category, total_time)| CategoryUsage {
            category,
            total_time,
        })
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| {
        b.total_time
            .cmp(&a.total_time)
            .then_with(|| a.category.cmp(&b.category))
    });
    usages
}

/// Cleans user input into a rule. Patterns may also be given comma separated, they are trimmed,
/// lowercased and deduplicated, empty ones are dropped.
pub fn normalize_rule(name: &str, patterns: &[String]) -> Result<CategoryRule, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidCategoryRule(
            "category name can't be empty".into(),
        ));
    }
    if name == UNCATEGORIZED {
        return Err(EngineError::InvalidCategoryRule(format!(
            "{UNCATEGORIZED} is reserved"
        )));
    }

    let mut domain_patterns = Vec::<String>::new();
    for pattern in patterns.iter().flat_map(|v| v.split(',')) {
        let pattern = pattern.trim().to_lowercase();
        if !pattern.is_empty() && !domain_patterns.contains(&pattern) {
            domain_patterns.push(pattern);
        }
    }

    Ok(CategoryRule {
        name: name.to_owned(),
        domain_patterns,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use super::{classify, normalize_rule, time_by_category, CategoryUsage, Classification};
    use crate::{
        daemon::storage::entities::{CategoryRule, DailySummary},
        tracking::{domain::Domain, error::EngineError},
    };

    #[test]
    fn test_classify_first_match_wins() {
        let rules = [
            CategoryRule::new("work", &["git"]),
            CategoryRule::new("social", &["gitlab-social.com"]),
        ];

        assert_eq!(
            classify("gitlab-social.com", &rules),
            Classification::Category("work")
        );
    }

    #[test]
    fn test_classify_uncategorized() {
        let rules = [
            CategoryRule::new("work", &["github.com", "slack.com"]),
            CategoryRule::new("empty", &[""]),
        ];

        assert_eq!(
            classify("app.slack.com", &rules),
            Classification::Category("work")
        );
        assert_eq!(classify("netflix.com", &rules), Classification::Uncategorized);
        assert_eq!(classify("netflix.com", &[]).to_string(), "Uncategorized");
    }

    #[test]
    fn test_time_by_category() {
        let mut summary = DailySummary::empty(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap());
        for (domain, minutes) in [("github.com", 30), ("youtube.com", 45), ("example.org", 5)] {
            let mut entry = crate::daemon::storage::entities::SiteTimeEntry::default();
            entry.add(Duration::minutes(minutes), 1, Utc::now());
            summary.merge_site(&Domain::from(domain), &entry);
        }
        let rules = [
            CategoryRule::new("work", &["github.com"]),
            CategoryRule::new("entertainment", &["youtube.com"]),
            CategoryRule::new("social", &["twitter.com"]),
        ];

        assert_eq!(
            time_by_category(&summary, &rules),
            vec![
                CategoryUsage {
                    category: "entertainment".into(),
                    total_time: Duration::minutes(45)
                },
                CategoryUsage {
                    category: "work".into(),
                    total_time: Duration::minutes(30)
                },
                CategoryUsage {
                    category: "Uncategorized".into(),
                    total_time: Duration::minutes(5)
                },
            ]
        );
    }

    #[test]
    fn test_normalize_rule() {
        let rule = normalize_rule(
            "  reading ",
            &["News.ycombinator.com, lobste.rs".into(), " ".into(), "lobste.rs".into()],
        )
        .unwrap();

        assert_eq!(rule.name, "reading");
        assert_eq!(rule.domain_patterns, ["news.ycombinator.com", "lobste.rs"]);
        assert!(matches!(
            normalize_rule(" ", &[]),
            Err(EngineError::InvalidCategoryRule(_))
        ));
        assert!(normalize_rule("Uncategorized", &[]).is_err());
    }
}
