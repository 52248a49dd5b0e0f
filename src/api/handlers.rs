use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AdsError;
use crate::model::placements::PlacementType;
use crate::model::results::ShowResult;
use crate::service::{AdsOrchestrator, AdsService};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AdsOrchestrator>,
}

#[derive(Deserialize, Debug)]
pub struct ShowRequest {
    /// 为空时展示该类型下第一个可用广告位
    #[serde(default)]
    pub placement_id: Option<String>,
    pub placement_type: PlacementType,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AvailabilityResponse {
    pub placement_id: String,
    pub available: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(error: AdsError) -> ApiError {
    let status = match error {
        AdsError::PlacementNotFound(_) => StatusCode::NOT_FOUND,
        AdsError::NoProviderSelected => StatusCode::CONFLICT,
        AdsError::Cancelled | AdsError::Disposed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = status.as_u16(), error = %error, "ads request failed");
    (status, Json(ErrorResponse { error: error.to_string() }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ads/show", post(handle_show))
        .route("/ads/available/{placement}", get(handle_available))
        .route("/ads/load", post(handle_load))
        .with_state(state)
}

/// **处理广告展示请求** `POST /ads/show`
///
/// 无填充、被限频、已有广告在展示等情况仍返回 200，body 中 `error: true`
pub async fn handle_show(
    State(state): State<AppState>,
    Json(request): Json<ShowRequest>,
) -> Result<Json<ShowResult>, ApiError> {
    let orchestrator = &state.orchestrator;
    let result = match &request.placement_id {
        Some(placement_id) => orchestrator.show(placement_id, request.placement_type).await,
        None => orchestrator.show_type(request.placement_type).await,
    }
    .map_err(api_error)?;

    info!(
        placement = %result.placement_id,
        rewarded = result.rewarded,
        error = result.error,
        "show answered"
    );
    Ok(Json(result))
}

/// **查询广告位是否可用** `GET /ads/available/{placement}`
pub async fn handle_available(
    State(state): State<AppState>,
    Path(placement): Path<String>,
) -> Json<AvailabilityResponse> {
    let available = state.orchestrator.is_placement_available(&placement).await;
    Json(AvailabilityResponse {
        placement_id: placement,
        available,
    })
}

/// **预加载所有广告** `POST /ads/load`
pub async fn handle_load(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.load_ads().await;
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::debug::{DebugAdsService, DebugSettings};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(orchestrator: Arc<AdsOrchestrator>) -> Router {
        router(AppState { orchestrator })
    }

    fn orchestrator() -> Arc<AdsOrchestrator> {
        let orchestrator = Arc::new(AdsOrchestrator::new());
        orchestrator
            .register_provider(
                "editor",
                Arc::new(DebugAdsService::new(DebugSettings {
                    unavailable_placements: vec!["blocked".to_string()],
                    ..Default::default()
                })),
            )
            .unwrap();
        orchestrator
    }

    fn show_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ads/show")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn show_returns_result_body() {
        let response = app(orchestrator())
            .oneshot(show_request(r#"{"placement_id":"reward1","placement_type":"rewarded"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let result: ShowResult = serde_json::from_slice(&body).unwrap();
        assert!(result.rewarded);
        assert_eq!(result.placement_id, "reward1");
    }

    #[tokio::test]
    async fn availability_reflects_orchestrator() {
        let response = app(orchestrator())
            .oneshot(Request::builder().uri("/ads/available/blocked").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let availability: AvailabilityResponse = serde_json::from_slice(&body).unwrap();
        assert!(!availability.available);
    }

    #[tokio::test]
    async fn disposed_orchestrator_answers_unavailable() {
        let orchestrator = orchestrator();
        orchestrator.dispose();
        let response = app(orchestrator)
            .oneshot(show_request(r#"{"placement_type":"interstitial"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn load_is_accepted() {
        let response = app(orchestrator())
            .oneshot(Request::builder().method("POST").uri("/ads/load").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
