use crate::infra::{InMemoryNotifier, InMemorySubjectDirectory, QueueService};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use review_queue::clock::ManualClock;
use review_queue::config::AppConfig;
use review_queue::error::AppError;
use review_queue::workflows::review::{
    BulkResolution, InMemoryReviewStore, Milestone, NewReviewItem, ProcessingTimeEntry,
    QueueSettings, ReviewCategory, ReviewIntakeImporter, ReviewItem, ReviewItemId,
    ReviewQueueService, ReviewerId, SlaStatistics, SubjectRef, SweepSummary, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QueueReportArgs {
    /// CSV export of pending submissions (category,subject_type,subject_id,user_id,submitted_at)
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Evaluate SLA state as of this instant (defaults to now)
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Maximum number of queue entries to print
    #[arg(long, default_value_t = 25)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Instant the demo queue opens (defaults to now)
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Skip the bulk resolution portion of the demo.
    #[arg(long)]
    pub(crate) skip_bulk: bool,
}

pub(crate) struct DemoQueue {
    pub(crate) service: Arc<QueueService>,
    pub(crate) notifier: Arc<InMemoryNotifier>,
    pub(crate) subjects: Arc<InMemorySubjectDirectory>,
    pub(crate) clock: ManualClock,
}

impl DemoQueue {
    pub(crate) fn new(settings: QueueSettings, opened_at: DateTime<Utc>) -> Self {
        let notifier = Arc::new(InMemoryNotifier::default());
        let subjects = Arc::new(InMemorySubjectDirectory::default());
        let clock = ManualClock::new(opened_at);
        let service = Arc::new(ReviewQueueService::with_clock(
            Arc::new(InMemoryReviewStore::default()),
            notifier.clone(),
            subjects.clone(),
            settings,
            Arc::new(clock.clone()),
        ));

        Self {
            service,
            notifier,
            subjects,
            clock,
        }
    }
}

pub(crate) fn run_queue_report(args: QueueReportArgs) -> Result<(), AppError> {
    let QueueReportArgs { csv, now, limit } = args;

    let settings = AppConfig::load()?.queue;
    let now = now.unwrap_or_else(Utc::now);
    let queue = DemoQueue::new(settings, now);

    let submissions = ReviewIntakeImporter::from_path(&csv)?;
    let imported = submissions.len();
    for submission in submissions {
        queue.service.submit(submission)?;
    }
    let sweep = queue.service.refresh_sla()?;

    println!("Verification review queue as of {}", now.to_rfc3339());
    println!("- {} submissions imported from {}", imported, csv.display());
    render_sweep(&sweep);
    render_queue(&queue.service, &queue.service.actionable()?, limit);
    render_statistics(&queue.service.statistics()?);

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { start, skip_bulk } = args;
    let start = start.unwrap_or_else(Utc::now);
    let queue = DemoQueue::new(QueueSettings::default(), start);

    println!("Verification review queue demo");
    let seeded = seed_demo_queue(&queue, start)?;
    println!("- {} submissions queued at {}", seeded.len(), start.to_rfc3339());

    queue.clock.advance(Duration::hours(40));
    let sweep = queue.service.refresh_sla()?;
    println!("\nQueue 40 hours later");
    render_sweep(&sweep);
    render_queue(&queue.service, &queue.service.actionable()?, 25);

    println!("\nSLA alerts");
    for item in queue.service.needing_warning()? {
        if queue.service.record_milestone(&item.id, Milestone::Warning)? {
            println!("  - warning sent for {} ({})", item.id, item.category);
        }
    }
    for item in queue.service.needing_breach_notice()? {
        if queue.service.record_milestone(&item.id, Milestone::Breach)? {
            println!("  - breach escalated for {} ({})", item.id, item.category);
        }
    }

    let reviewer = ReviewerId("ops-demo".to_string());
    let ranked = queue.service.actionable()?;

    println!("\nSingle resolutions");
    let mut approved_id = None;
    if let Some(top) = ranked.first() {
        queue.service.mark_in_review(&top.id, reviewer.clone())?;
        let approved = queue.service.approve(
            &top.id,
            reviewer.clone(),
            Some("documents verified against source".to_string()),
        )?;
        println!(
            "  - approved {} [{}] with SLA {}",
            approved.id,
            approved.category,
            approved.sla_status.label()
        );
        approved_id = Some(approved.id);
    }
    if let Some(next) = ranked.get(1) {
        match queue
            .service
            .reject(&next.id, reviewer.clone(), "registry number does not match")
        {
            Ok(rejected) => println!(
                "  - rejected {} [{}]: {}",
                rejected.id,
                rejected.category,
                rejected.notes.as_deref().unwrap_or_default()
            ),
            Err(err) => println!("  - rejection failed for {}: {}", next.id, err),
        }
    }

    if !skip_bulk {
        let mut ids: Vec<ReviewItemId> = queue
            .service
            .actionable()?
            .into_iter()
            .map(|item| item.id)
            .collect();
        ids.extend(approved_id);
        ids.push(ReviewItemId("rev-unknown".to_string()));

        println!("\nBulk approval of the remaining queue");
        let result = queue.service.bulk_approve(&ids, reviewer, None);
        render_bulk(&result);
    }

    println!();
    render_statistics(&queue.service.statistics()?);
    render_processing_times(&queue.service.processing_times()?);

    let events = queue.notifier.events();
    if events.is_empty() {
        println!("Outcome notifications: none dispatched");
    } else {
        println!("Outcome notifications:");
        for event in events {
            println!(
                "  - {} -> {} ({} item(s))",
                event.outcome.label(),
                event.user_id.0,
                event.items.len()
            );
        }
    }

    let verified = seeded
        .iter()
        .filter(|item| queue.subjects.is_verified(&item.subject))
        .count();
    println!("Subjects marked verified: {verified}");

    Ok(())
}

/// Six submissions spread across categories and ages so every SLA state shows up after 40 hours.
pub(crate) fn seed_demo_queue(
    queue: &DemoQueue,
    opened_at: DateTime<Utc>,
) -> Result<Vec<ReviewItem>, AppError> {
    let license = SubjectRef::BusinessLicense("lic-4401".to_string());
    queue
        .subjects
        .register(license.clone(), UserId("user-201".to_string()));

    let submissions = [
        (
            ReviewCategory::Identity,
            SubjectRef::WorkerIdentity("w-1001".to_string()),
            Some("user-101"),
            0,
        ),
        (
            ReviewCategory::BackgroundCheck,
            SubjectRef::BackgroundCheck("bg-2201".to_string()),
            Some("user-102"),
            -12,
        ),
        (
            ReviewCategory::Certification,
            SubjectRef::Certification("cert-3301".to_string()),
            Some("user-101"),
            0,
        ),
        (ReviewCategory::BusinessLicense, license, None, 0),
        (
            ReviewCategory::Agency,
            SubjectRef::AgencyApplication("agency-5501".to_string()),
            Some("user-301"),
            -60,
        ),
        (
            ReviewCategory::Other("insurance".to_string()),
            SubjectRef::BusinessLicense("ins-6601".to_string()),
            Some("user-202"),
            0,
        ),
    ];

    let mut queued = Vec::with_capacity(submissions.len());
    for (category, subject, user, offset_hours) in submissions {
        let item = queue.service.submit(NewReviewItem {
            subject,
            category,
            user_id: user.map(|user| UserId(user.to_string())),
            submitted_at: Some(opened_at + Duration::hours(offset_hours)),
        })?;
        queued.push(item);
    }

    Ok(queued)
}

fn render_sweep(summary: &SweepSummary) {
    println!(
        "- SLA sweep: {} actionable | {} on track | {} at risk | {} breached",
        summary.refreshed, summary.on_track, summary.at_risk, summary.breached
    );
}

fn render_queue(service: &QueueService, items: &[ReviewItem], limit: usize) {
    if items.is_empty() {
        println!("Actionable queue: empty");
        return;
    }

    println!("Actionable queue (highest priority first):");
    for (rank, item) in items.iter().take(limit).enumerate() {
        let assignee = item
            .assignee
            .as_ref()
            .map(|reviewer| format!(" | assigned to {}", reviewer.0))
            .unwrap_or_default();
        println!(
            "  {}. {} [{}] {} | {} | score {} | {}{}",
            rank + 1,
            item.id,
            item.category,
            item.subject,
            item.sla_status.label(),
            item.priority_score,
            service.time_remaining(item).label,
            assignee
        );
    }
    if items.len() > limit {
        println!("  ... {} more", items.len() - limit);
    }
}

fn render_bulk(result: &BulkResolution) {
    println!("- {} of {} processed", result.summary(), result.processed);
    if result.rolled_back {
        println!("  Batch rolled back; no items were changed");
    }
    for warning in &result.warnings {
        println!("  Warning: {warning}");
    }
    for error in &result.errors {
        println!("  Failed: {error}");
    }
}

fn render_statistics(statistics: &SlaStatistics) {
    println!(
        "SLA compliance: {:.1}% of {} actionable on track",
        statistics.current_compliance_pct, statistics.actionable.total
    );
    println!(
        "- {:.1}% of {} resolved within SLA (last {} days)",
        statistics.historical_compliance_pct,
        statistics.resolved_in_window,
        statistics.history_window_days
    );
    for breakdown in &statistics.by_category {
        println!(
            "  - {}: {} open | {} on track | {} at risk | {} breached",
            breakdown.category,
            breakdown.counts.total,
            breakdown.counts.on_track,
            breakdown.counts.at_risk,
            breakdown.counts.breached
        );
    }
}

fn render_processing_times(entries: &[ProcessingTimeEntry]) {
    if entries.is_empty() {
        return;
    }
    println!("Average processing time:");
    for entry in entries {
        println!(
            "  - {}: {:.2}h across {} resolution(s)",
            entry.category, entry.average_hours, entry.resolved
        );
    }
}
