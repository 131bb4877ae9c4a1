//! Verification review queue for the staffing marketplace.
//!
//! Pending compliance reviews (worker identity, background checks, certifications,
//! business licenses, agency approvals) are tracked against category-specific SLA
//! windows, ranked by urgency, and resolved one at a time or in bulk batches.

pub mod clock;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
