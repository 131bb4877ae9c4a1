use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{ReviewCategory, ReviewItem, SlaStatus};
use super::sla::SlaCalculator;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlaCounts {
    pub total: usize,
    pub on_track: usize,
    pub at_risk: usize,
    pub breached: usize,
}

impl SlaCounts {
    fn record(&mut self, status: SlaStatus) {
        self.total += 1;
        match status {
            SlaStatus::OnTrack => self.on_track += 1,
            SlaStatus::AtRisk => self.at_risk += 1,
            SlaStatus::Breached => self.breached += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: ReviewCategory,
    #[serde(flatten)]
    pub counts: SlaCounts,
}

/// Queue-wide compliance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaStatistics {
    pub generated_at: DateTime<Utc>,
    pub actionable: SlaCounts,
    pub current_compliance_pct: f64,
    pub history_window_days: i64,
    pub resolved_in_window: usize,
    pub resolved_within_sla: usize,
    pub historical_compliance_pct: f64,
    pub by_category: Vec<CategoryBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingTimeEntry {
    pub category: ReviewCategory,
    pub resolved: usize,
    pub average_hours: f64,
}

/// Aggregates current SLA state and trailing-window resolution history.
///
/// Actionable items are re-evaluated against `now` rather than trusting the last sweep.
pub struct StatisticsAggregator<'a> {
    calculator: &'a SlaCalculator,
    window_days: i64,
}

impl<'a> StatisticsAggregator<'a> {
    pub fn new(calculator: &'a SlaCalculator, window_days: i64) -> Self {
        Self {
            calculator,
            window_days: window_days.max(0),
        }
    }

    pub fn summarize(&self, items: &[ReviewItem], now: DateTime<Utc>) -> SlaStatistics {
        let mut actionable = SlaCounts::default();
        let mut by_category: BTreeMap<ReviewCategory, SlaCounts> = BTreeMap::new();

        for item in items.iter().filter(|item| item.is_actionable()) {
            let status = self.calculator.evaluate_item(item, now).status;
            actionable.record(status);
            by_category
                .entry(item.category.clone())
                .or_default()
                .record(status);
        }

        let resolved: Vec<&ReviewItem> = self.resolved_in_window(items, now).collect();
        let resolved_within_sla = resolved
            .iter()
            .filter(|item| item.resolved_within_sla() == Some(true))
            .count();

        SlaStatistics {
            generated_at: now,
            current_compliance_pct: percentage(actionable.on_track, actionable.total),
            actionable,
            history_window_days: self.window_days,
            resolved_in_window: resolved.len(),
            resolved_within_sla,
            historical_compliance_pct: percentage(resolved_within_sla, resolved.len()),
            by_category: by_category
                .into_iter()
                .map(|(category, counts)| CategoryBreakdown { category, counts })
                .collect(),
        }
    }

    /// Mean submit-to-resolution time per category across the trailing window.
    pub fn processing_times(
        &self,
        items: &[ReviewItem],
        now: DateTime<Utc>,
    ) -> Vec<ProcessingTimeEntry> {
        let mut totals: BTreeMap<ReviewCategory, (usize, i64)> = BTreeMap::new();

        for item in self.resolved_in_window(items, now) {
            if let Some(elapsed) = item.processing_time() {
                let entry = totals.entry(item.category.clone()).or_default();
                entry.0 += 1;
                entry.1 += elapsed.num_seconds();
            }
        }

        totals
            .into_iter()
            .map(|(category, (resolved, seconds))| ProcessingTimeEntry {
                category,
                resolved,
                average_hours: round_to(seconds as f64 / resolved as f64 / 3_600.0, 2),
            })
            .collect()
    }

    fn resolved_in_window<'i>(
        &self,
        items: &'i [ReviewItem],
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'i ReviewItem> {
        let window_start = now - Duration::days(self.window_days);
        items.iter().filter(move |item| {
            item.status.is_terminal()
                && item
                    .reviewed_at
                    .is_some_and(|reviewed_at| reviewed_at >= window_start && reviewed_at <= now)
        })
    }
}

/// Vacuously compliant (100%) when there is nothing to measure.
fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    round_to(part as f64 * 100.0 / total as f64, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
