use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::bulk::{BulkRejectRequest, BulkResolutionRequest};
use super::domain::{Milestone, NewReviewItem, ReviewItem, ReviewItemId, ReviewerId};
use super::repository::{
    Notifier, QueueFilter, RepositoryError, ReviewRepository, SubjectDirectory,
};
use super::service::{ReviewError, ReviewQueueService};
use super::sla::TimeRemaining;

type SharedService<R, N, S> = Arc<ReviewQueueService<R, N, S>>;

/// Router builder exposing the operator-facing queue endpoints.
pub fn review_router<R, N, S>(service: SharedService<R, N, S>) -> Router
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/reviews",
            get(list_handler::<R, N, S>).post(submit_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/statistics",
            get(statistics_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/processing-times",
            get(processing_times_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/sla/refresh",
            post(refresh_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/bulk-approve",
            post(bulk_approve_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/bulk-reject",
            post(bulk_reject_handler::<R, N, S>),
        )
        .route("/api/v1/reviews/:review_id", get(get_handler::<R, N, S>))
        .route(
            "/api/v1/reviews/:review_id/in-review",
            post(in_review_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/:review_id/approve",
            post(approve_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/:review_id/reject",
            post(reject_handler::<R, N, S>),
        )
        .route(
            "/api/v1/reviews/:review_id/milestones/:milestone",
            post(milestone_handler::<R, N, S>),
        )
        .with_state(service)
}

/// Queue entry as rendered for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItemView {
    #[serde(flatten)]
    pub item: ReviewItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<TimeRemaining>,
}

impl ReviewItemView {
    fn render<R, N, S>(service: &ReviewQueueService<R, N, S>, item: ReviewItem) -> Self
    where
        R: ReviewRepository + 'static,
        N: Notifier + 'static,
        S: SubjectDirectory + 'static,
    {
        let time_remaining = item
            .is_actionable()
            .then(|| service.time_remaining(&item));
        Self {
            item,
            time_remaining,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewerRequest {
    pub(crate) reviewer_id: ReviewerId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApproveRequest {
    pub(crate) reviewer_id: ReviewerId,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    pub(crate) reviewer_id: ReviewerId,
    #[serde(default)]
    pub(crate) reason: String,
}

pub(crate) fn error_response(error: ReviewError) -> Response {
    let status = match &error {
        ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
        ReviewError::InvalidState { .. } | ReviewError::MilestoneNotReached { .. } => {
            StatusCode::CONFLICT
        }
        ReviewError::MissingReason => StatusCode::UNPROCESSABLE_ENTITY,
        ReviewError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ReviewError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn list_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    Query(filter): Query<QueueFilter>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.queue(&filter) {
        Ok(items) => {
            let views: Vec<ReviewItemView> = items
                .into_iter()
                .map(|item| ReviewItemView::render(&service, item))
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    axum::Json(request): axum::Json<NewReviewItem>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.submit(request) {
        Ok(item) => {
            let view = ReviewItemView::render(&service, item);
            (StatusCode::CREATED, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    Path(review_id): Path<String>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.get(&ReviewItemId(review_id)) {
        Ok(item) => {
            let view = ReviewItemView::render(&service, item);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn in_review_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    Path(review_id): Path<String>,
    axum::Json(request): axum::Json<ReviewerRequest>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.mark_in_review(&ReviewItemId(review_id), request.reviewer_id) {
        Ok(item) => (StatusCode::OK, axum::Json(item)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    Path(review_id): Path<String>,
    axum::Json(request): axum::Json<ApproveRequest>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.approve(&ReviewItemId(review_id), request.reviewer_id, request.notes) {
        Ok(item) => (StatusCode::OK, axum::Json(item)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    Path(review_id): Path<String>,
    axum::Json(request): axum::Json<RejectRequest>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.reject(&ReviewItemId(review_id), request.reviewer_id, &request.reason) {
        Ok(item) => (StatusCode::OK, axum::Json(item)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bulk_approve_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    axum::Json(request): axum::Json<BulkResolutionRequest>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    let result = service.bulk_approve(&request.ids, request.reviewer_id, request.notes);
    (StatusCode::OK, axum::Json(result)).into_response()
}

pub(crate) async fn bulk_reject_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    axum::Json(request): axum::Json<BulkRejectRequest>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    let result = service.bulk_reject(&request.ids, request.reviewer_id, &request.reason);
    (StatusCode::OK, axum::Json(result)).into_response()
}

pub(crate) async fn refresh_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.refresh_sla() {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn milestone_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
    Path((review_id, milestone)): Path<(String, Milestone)>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    let id = ReviewItemId(review_id);
    match service.record_milestone(&id, milestone) {
        Ok(recorded) => {
            let payload = json!({
                "review_id": id.0,
                "milestone": milestone,
                "recorded": recorded,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn statistics_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.statistics() {
        Ok(statistics) => (StatusCode::OK, axum::Json(statistics)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn processing_times_handler<R, N, S>(
    State(service): State<SharedService<R, N, S>>,
) -> Response
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    match service.processing_times() {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}
