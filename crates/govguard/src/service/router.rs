use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::{RiskScoringService, ServiceError};
use crate::rules::{Rule, RuleStore};
use crate::scoring::{
    ApplicantRecord, BulkSummary, CsvExportOptions, RiskLevel, ScoredDataset, ScoredRow,
};

/// Router builder exposing rule management and scoring endpoints.
pub fn scoring_router<S>(service: Arc<RiskScoringService<S>>) -> Router
where
    S: RuleStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/rules",
            get(list_rules_handler::<S>).put(replace_rules_handler::<S>),
        )
        .route("/api/v1/score", post(score_handler::<S>))
        .route("/api/v1/score/bulk", post(bulk_score_handler::<S>))
        .with_state(service)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkScoreRequest {
    /// Raw CSV upload including the header row.
    pub csv: String,
    #[serde(default)]
    pub include_csv: bool,
    #[serde(default)]
    pub review_column: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkScoreResponse {
    pub scored_at: DateTime<Utc>,
    pub summary: BulkSummary,
    pub rows: Vec<ScoredRowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scored_csv: Option<String>,
}

/// Per-row projection used by dashboards: identity columns plus the computed score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRowView {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub triggered_rules: Vec<String>,
    pub needs_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
}

impl ScoredRowView {
    fn from_row(index: usize, row: &ScoredRow) -> Self {
        let needs_review = row.needs_review();
        Self {
            row: index + 1,
            applicant_id: row.value("Applicant_ID").map(str::to_string),
            name: row.value("Name").map(str::to_string),
            risk_level: row.result.risk_level,
            risk_score: row.result.risk_score,
            triggered_rules: row.result.triggered_rules.clone(),
            needs_review,
            review_notes: needs_review.then(|| row.review_notes()),
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn service_error_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::Bulk(_) => StatusCode::BAD_REQUEST,
        ServiceError::Store(_) | ServiceError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "scoring service failure");
    }
    error_response(status, err.to_string())
}

pub(crate) async fn list_rules_handler<S>(
    State(service): State<Arc<RiskScoringService<S>>>,
) -> Response
where
    S: RuleStore + 'static,
{
    match service.rules() {
        Ok(rules) => (StatusCode::OK, Json(rules)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn replace_rules_handler<S>(
    State(service): State<Arc<RiskScoringService<S>>>,
    Json(rules): Json<Vec<Rule>>,
) -> Response
where
    S: RuleStore + 'static,
{
    match service.replace_rules(rules) {
        Ok(saved) => (StatusCode::OK, Json(saved)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn score_handler<S>(
    State(service): State<Arc<RiskScoringService<S>>>,
    Json(applicant): Json<ApplicantRecord>,
) -> Response
where
    S: RuleStore + 'static,
{
    match service.score_applicant(&applicant) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn bulk_score_handler<S>(
    State(service): State<Arc<RiskScoringService<S>>>,
    Json(request): Json<BulkScoreRequest>,
) -> Response
where
    S: RuleStore + 'static,
{
    let BulkScoreRequest {
        csv,
        include_csv,
        review_column,
    } = request;

    let scored = tokio::task::spawn_blocking(move || {
        service.score_csv(Cursor::new(csv.into_bytes()))
    })
    .await;

    let scored = match scored {
        Ok(Ok(scored)) => scored,
        Ok(Err(err)) => return service_error_response(err),
        Err(join_error) => {
            error!(error = %join_error, "bulk scoring task failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "bulk scoring task failed".to_string(),
            );
        }
    };

    match bulk_response(&scored, include_csv, CsvExportOptions { review_column }) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => service_error_response(err),
    }
}

fn bulk_response(
    scored: &ScoredDataset,
    include_csv: bool,
    options: CsvExportOptions,
) -> Result<BulkScoreResponse, ServiceError> {
    let scored_csv = if include_csv {
        Some(scored.to_csv_string(options)?)
    } else {
        None
    };

    Ok(BulkScoreResponse {
        scored_at: Utc::now(),
        summary: scored.summary(),
        rows: scored
            .rows()
            .iter()
            .enumerate()
            .map(|(index, row)| ScoredRowView::from_row(index, row))
            .collect(),
        scored_csv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{default_rules, InMemoryRuleStore};
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> (Router, Arc<InMemoryRuleStore>) {
        let store = Arc::new(InMemoryRuleStore::with_defaults());
        let service =
            Arc::new(RiskScoringService::load(Arc::clone(&store)).expect("service loads"));
        (scoring_router(service), store)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("body encodes")))
            .expect("request builds")
    }

    async fn read_json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn score_route_returns_result_for_simulated_applicant() {
        let (router, _) = router();
        let response = router
            .oneshot(json_request(
                "POST",
                "/api/v1/score",
                json!({
                    "SSN": "123-45-6789",
                    "Income": 100000,
                    "Age": 17,
                    "Program": "SNAP"
                }),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json_body(response).await;
        assert_eq!(body["risk_score"], json!(9.0));
        assert_eq!(body["risk_level"], json!("High"));
        assert_eq!(body["triggered_rules"].as_array().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn put_rules_saves_through_store() {
        let (router, store) = router();
        let mut rules = default_rules();
        rules.truncate(2);

        let response = router
            .oneshot(json_request(
                "PUT",
                "/api/v1/rules",
                serde_json::to_value(&rules).expect("rules encode"),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.load().expect("store readable"), rules);
    }

    #[tokio::test]
    async fn get_rules_lists_stored_order() {
        let (router, _) = router();
        let response = router
            .oneshot(
                Request::get("/api/v1/rules")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        let body = read_json_body(response).await;
        let descriptions: Vec<&str> = body
            .as_array()
            .expect("array body")
            .iter()
            .filter_map(|rule| rule["Description"].as_str())
            .collect();
        assert_eq!(descriptions.len(), 4);
        assert!(descriptions[0].contains("Duplicate SSN"));
    }

    #[tokio::test]
    async fn bulk_route_scores_rows_and_optionally_returns_csv() {
        let (router, _) = router();
        let csv = "Applicant_ID,Name,SSN,Monthly_Income,Age,Program\n\
A-1,Jordan Reyes,123-45-6789,100000,17,SNAP\n\
A-2,Casey Lin,000-00-0000,,30,TANF\n";

        let response = router
            .oneshot(json_request(
                "POST",
                "/api/v1/score/bulk",
                json!({ "csv": csv, "include_csv": true }),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json_body(response).await;
        assert_eq!(body["summary"]["total_rows"], json!(2));
        assert_eq!(body["rows"][0]["applicant_id"], json!("A-1"));
        assert_eq!(body["rows"][0]["risk_level"], json!("High"));
        assert_eq!(body["rows"][1]["needs_review"], json!(true));
        let scored_csv = body["scored_csv"].as_str().expect("csv included");
        assert!(scored_csv.starts_with("Applicant_ID,Name,SSN,Monthly_Income,Age,Program,Risk_Score"));
    }

    #[tokio::test]
    async fn bulk_route_rejects_headerless_upload() {
        let (router, _) = router();
        let response = router
            .oneshot(json_request(
                "POST",
                "/api/v1/score/bulk",
                json!({ "csv": "" }),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json_body(response).await;
        assert!(body["error"]
            .as_str()
            .expect("error message")
            .contains("header"));
    }
}
