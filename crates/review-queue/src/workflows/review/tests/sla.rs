use chrono::Duration;

use super::common::{hours, pending_item, t0};
use crate::workflows::review::domain::{ReviewCategory, ReviewStatus, SlaStatus};
use crate::workflows::review::priority::PriorityScorer;
use crate::workflows::review::sla::{SlaCalculator, SlaPolicy, TimeRemaining};

#[test]
fn deadlines_follow_category_targets() {
    let calculator = SlaCalculator::default();
    let cases = [
        (ReviewCategory::Identity, 48),
        (ReviewCategory::BackgroundCheck, 48),
        (ReviewCategory::Certification, 48),
        (ReviewCategory::BusinessLicense, 72),
        (ReviewCategory::Agency, 96),
        (ReviewCategory::Other("insurance".to_string()), 72),
    ];

    for (category, expected_hours) in cases {
        assert_eq!(
            calculator.deadline(&category, t0()),
            t0() + hours(expected_hours),
            "{category} window"
        );
    }
}

#[test]
fn overridden_targets_replace_the_standard_window() {
    let policy = SlaPolicy::standard()
        .with_target(ReviewCategory::BusinessLicense, 120)
        .with_default_hours(24);
    let calculator = SlaCalculator::new(policy, 0.8);

    assert_eq!(
        calculator.deadline(&ReviewCategory::BusinessLicense, t0()),
        t0() + hours(120)
    );
    assert_eq!(
        calculator.deadline(&ReviewCategory::Other("payroll".to_string()), t0()),
        t0() + hours(24)
    );
}

#[test]
fn identity_review_crosses_thresholds_at_expected_instants() {
    let calculator = SlaCalculator::default();
    let deadline = t0() + hours(48);

    let early = calculator.evaluate(t0(), deadline, t0() + hours(10));
    assert_eq!(early.status, SlaStatus::OnTrack);

    // 80% of 48h is 38h24m.
    let at_threshold = calculator.evaluate(t0(), deadline, t0() + Duration::minutes(38 * 60 + 24));
    assert_eq!(at_threshold.status, SlaStatus::AtRisk);

    let just_before = calculator.evaluate(t0(), deadline, t0() + Duration::minutes(38 * 60 + 23));
    assert_eq!(just_before.status, SlaStatus::OnTrack);

    let at_deadline = calculator.evaluate(t0(), deadline, deadline);
    assert_eq!(at_deadline.status, SlaStatus::Breached);
    assert_eq!(at_deadline.seconds_remaining, 0);
}

#[test]
fn status_agrees_with_elapsed_fraction_across_the_window() {
    let calculator = SlaCalculator::default();
    let deadline = t0() + hours(72);

    for minute in (0..=80 * 60).step_by(17) {
        let now = t0() + Duration::minutes(minute);
        let evaluation = calculator.evaluate(t0(), deadline, now);
        let expected = if now >= deadline {
            SlaStatus::Breached
        } else if evaluation.elapsed_fraction >= 0.8 {
            SlaStatus::AtRisk
        } else {
            SlaStatus::OnTrack
        };
        assert_eq!(evaluation.status, expected, "minute {minute}");
    }
}

#[test]
fn submission_in_the_future_counts_as_no_time_elapsed() {
    let calculator = SlaCalculator::default();
    let submitted = t0() + hours(2);
    let evaluation = calculator.evaluate(submitted, submitted + hours(48), t0());

    assert_eq!(evaluation.elapsed_fraction, 0.0);
    assert_eq!(evaluation.status, SlaStatus::OnTrack);
}

#[test]
fn zero_length_window_is_immediately_breached() {
    let calculator = SlaCalculator::new(
        SlaPolicy::standard().with_target(ReviewCategory::Identity, 0),
        0.8,
    );
    let deadline = calculator.deadline(&ReviewCategory::Identity, t0());
    let evaluation = calculator.evaluate(t0(), deadline, t0());

    assert_eq!(evaluation.elapsed_fraction, 1.0);
    assert_eq!(evaluation.status, SlaStatus::Breached);
}

#[test]
fn invalid_threshold_falls_back_to_default() {
    assert_eq!(SlaCalculator::new(SlaPolicy::standard(), 0.0).at_risk_threshold(), 0.8);
    assert_eq!(SlaCalculator::new(SlaPolicy::standard(), 1.5).at_risk_threshold(), 0.8);
    assert_eq!(SlaCalculator::new(SlaPolicy::standard(), f64::NAN).at_risk_threshold(), 0.8);
    assert_eq!(SlaCalculator::new(SlaPolicy::standard(), 0.5).at_risk_threshold(), 0.5);
}

#[test]
fn refresh_leaves_terminal_items_untouched() {
    let calculator = SlaCalculator::default();
    let mut item = pending_item("rev-1");
    item.status = ReviewStatus::Approved;
    item.reviewed_at = Some(t0() + hours(1));

    let changed = calculator.refresh(&mut item, &PriorityScorer, t0() + hours(100));

    assert!(!changed);
    assert_eq!(item.sla_status, SlaStatus::OnTrack);
    assert_eq!(item.priority_score, 52);
}

#[test]
fn refresh_updates_actionable_items() {
    let calculator = SlaCalculator::default();
    let mut item = pending_item("rev-1");

    assert!(calculator.refresh(&mut item, &PriorityScorer, t0() + hours(40)));
    assert_eq!(item.sla_status, SlaStatus::AtRisk);
    assert_eq!(item.priority_score, 92);

    assert!(calculator.refresh(&mut item, &PriorityScorer, t0() + hours(49)));
    assert_eq!(item.sla_status, SlaStatus::Breached);
    assert_eq!(item.priority_score, 1_000);
}

#[test]
fn time_remaining_labels_both_sides_of_the_deadline() {
    let deadline = t0() + hours(48);

    let remaining = TimeRemaining::until(deadline, t0() + Duration::minutes(30 * 60 + 15));
    assert!(!remaining.overdue);
    assert_eq!((remaining.hours, remaining.minutes), (17, 45));
    assert_eq!(remaining.label, "17h 45m remaining");

    let overdue = TimeRemaining::until(deadline, deadline + Duration::minutes(125));
    assert!(overdue.overdue);
    assert_eq!(overdue.label, "overdue by 2h 5m");

    let exact = TimeRemaining::until(deadline, deadline);
    assert!(exact.overdue);
    assert_eq!(exact.label, "overdue by 0h 0m");
}
