use std::collections::BTreeMap;
use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use shared::protocol::AGGREGATE_PATH;
use shared::types::ServiceDescriptor;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/:key", get(get_services))
        .fallback(not_found)
        .with_state(state)
}

async fn get_services(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
) -> Response {
    match key {
        Ok(Path(key)) => json_response(&lookup(&state.registry, &key).await),
        Err(e) => {
            tracing::debug!("Rejected query path: {}", e);
            json_response(&BTreeMap::new())
        }
    }
}

async fn not_found() -> Response {
    json_response(&BTreeMap::new())
}

/// Resolve a query key: the aggregate path, then a service id, then an
/// instance id or owner uuid.
pub async fn lookup(registry: &Registry, key: &str) -> BTreeMap<String, ServiceDescriptor> {
    if key == AGGREGATE_PATH {
        return registry.lookup_all().await;
    }
    if let Some(desc) = registry.lookup_by_service_id(key).await {
        return BTreeMap::from([(desc.service_id.clone(), desc)]);
    }
    registry.lookup_by_owner_key(key).await
}

/// 200 with the services as a JSON object, or 404 `{}` when there are none
fn json_response(services: &BTreeMap<String, ServiceDescriptor>) -> Response {
    let (status, body) = match serde_json::to_string(services) {
        Ok(body) if !services.is_empty() => (StatusCode::OK, body),
        Ok(body) => (StatusCode::NOT_FOUND, body),
        Err(e) => {
            tracing::error!("Failed to serialize services: {}", e);
            (StatusCode::NOT_FOUND, "{}".to_string())
        }
    };

    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        format!("{}\n", body),
    )
        .into_response()
}
