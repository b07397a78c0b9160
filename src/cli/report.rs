use std::fmt::{Display, Write};

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    daemon::storage::{
        entities::{Categories, DailySummary},
        kv::KeyValueStore,
    },
    tracking::{category::CategoryUsage, score::share, Engine},
    utils::time::{date_key, saturating_add},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ScoreCommand {
    #[arg(
        long,
        short,
        help = "Day to score, today by default. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

pub async fn process_today_command<S: KeyValueStore>(
    engine: &Engine<S>,
    top: usize,
    by_category: bool,
) -> Result<()> {
    if by_category {
        let breakdown = engine.category_breakdown().await?;
        print!("{}", render_breakdown(&breakdown));
    } else {
        let summary = engine.today_summary().await?;
        print!("{}", render_summary(&summary, top));
    }
    Ok(())
}

pub async fn process_history_command<S: KeyValueStore>(
    engine: &Engine<S>,
    days: u32,
) -> Result<()> {
    let history = engine.history(days).await?;
    print!("{}", render_history(&history));
    Ok(())
}

pub async fn process_score_command<S: KeyValueStore>(
    engine: &Engine<S>,
    ScoreCommand { date, date_style }: ScoreCommand,
) -> Result<()> {
    let date = match date {
        Some(text) => parse_day(&text, date_style, engine.now())?,
        None => engine.today(),
    };
    let score = engine.productivity_score(date).await?;
    println!("{}\t{score}%", date_key(date));
    Ok(())
}

pub async fn process_categories_command<S: KeyValueStore>(engine: &Engine<S>) -> Result<()> {
    let categories = engine.categories().await?;
    print!("{}", render_categories(&categories));
    Ok(())
}

/// Dates are keyed in UTC, so relative dates are resolved against `now` in UTC.
fn parse_day(text: &str, date_style: DateStyle, now: DateTime<Utc>) -> Result<NaiveDate> {
    match parse_date_string(text, now, date_style.into()) {
        Ok(v) => Ok(v.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {e}"),
            )
            .into()),
    }
}

fn render_summary(summary: &DailySummary, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}\t{}",
        date_key(summary.date),
        format_duration(summary.total_time)
    );
    for (domain, entry) in summary.ranked_sites().into_iter().take(top) {
        let _ = writeln!(
            out,
            "{}%\t{}\t{}\t{domain}",
            share(entry.total_time, summary.total_time),
            format_duration(entry.total_time),
            entry.visits,
        );
    }
    out
}

fn render_history(history: &[DailySummary]) -> String {
    let mut out = String::new();
    for day in history {
        let top = day
            .ranked_sites()
            .first()
            .map(|(domain, _)| domain.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}\t{}\t{top}",
            date_key(day.date),
            format_duration(day.total_time)
        );
    }
    out
}

fn render_breakdown(breakdown: &[CategoryUsage]) -> String {
    let total = breakdown
        .iter()
        .fold(Duration::zero(), |sum, v| saturating_add(sum, v.total_time));
    let mut out = String::new();
    for usage in breakdown {
        let _ = writeln!(
            out,
            "{}%\t{}\t{}",
            share(usage.total_time, total),
            format_duration(usage.total_time),
            usage.category
        );
    }
    out
}

fn render_categories(categories: &Categories) -> String {
    let mut out = String::new();
    for rule in &categories.0 {
        let _ = writeln!(out, "{}\t{}", rule.name, rule.domain_patterns.join(", "));
    }
    out
}

pub(crate) fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
