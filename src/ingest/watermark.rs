use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::RawObservation;

/// Where the next incremental fetch picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// Most recent date with quorum coverage
    Watermark(NaiveDate),
    /// No date reached quorum; latest date present
    LatestDate(NaiveDate),
    /// No data at all
    Epoch(NaiveDate),
}

impl ResumePoint {
    pub fn start_date(&self) -> NaiveDate {
        match self {
            ResumePoint::Watermark(date) | ResumePoint::LatestDate(date) => {
                date.succ_opt().unwrap_or(*date)
            }
            ResumePoint::Epoch(date) => *date,
        }
    }
}

impl std::fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResumePoint::Watermark(date) => write!(f, "watermark {}", date),
            ResumePoint::LatestDate(date) => write!(f, "latest date {} (no quorum)", date),
            ResumePoint::Epoch(date) => write!(f, "epoch {}", date),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    UpToDate,
    Window { start: NaiveDate, end: NaiveDate },
}

/// Walk distinct dates newest first and return the first one on which at
/// least `threshold` of the series' regions have a valid record.
///
/// The denominator is every region appearing anywhere in the series, so a
/// date on which only a few regions reported cannot reach quorum.
pub fn find_resume_watermark(
    series: &[RawObservation],
    epoch: NaiveDate,
    threshold: f64,
) -> ResumePoint {
    let regions: BTreeSet<&str> = series.iter().map(|r| r.region.as_str()).collect();
    if regions.is_empty() {
        return ResumePoint::Epoch(epoch);
    }

    let mut valid_by_date: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    for record in series {
        let entry = valid_by_date.entry(record.date).or_default();
        if record.is_valid() {
            entry.insert(record.region.as_str());
        }
    }

    let total = regions.len() as f64;
    for (date, valid) in valid_by_date.iter().rev() {
        let fraction = valid.len() as f64 / total;
        if fraction >= threshold {
            tracing::info!(
                "Last valid date found: {} ({}/{} regions = {:.1}% valid)",
                date,
                valid.len(),
                regions.len(),
                fraction * 100.0
            );
            return ResumePoint::Watermark(*date);
        }
        tracing::debug!(
            "Date {}: {}/{} regions valid, below quorum",
            date,
            valid.len(),
            regions.len()
        );
    }

    match valid_by_date.keys().next_back() {
        Some(latest) => {
            tracing::warn!("No date reached quorum; continuing from latest date {}", latest);
            ResumePoint::LatestDate(*latest)
        }
        None => ResumePoint::Epoch(epoch),
    }
}

/// Decide the `[start, end]` window for a run happening on `today`.
pub fn plan_fetch_window(resume: &ResumePoint, today: NaiveDate) -> FetchPlan {
    if let ResumePoint::Watermark(date) = resume {
        if today.signed_duration_since(*date) <= Duration::days(1) {
            return FetchPlan::UpToDate;
        }
    }

    let start = resume.start_date();
    let Some(end) = today.pred_opt() else {
        return FetchPlan::UpToDate;
    };
    if start > end {
        return FetchPlan::UpToDate;
    }
    FetchPlan::Window { start, end }
}
