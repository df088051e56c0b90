//! 🛣️ The `/aqua/*` routes. Thin on purpose: parse the query, call the UI app, wrap the JSON.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::Uri;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;

use super::error::HttpError;
use crate::aqua::AquaUiApp;
use crate::aqua::cli::CliDetails;
use crate::aqua::ui::{TAG_AQUA_EVALUATION, TAG_AQUA_FINETUNING};

type ApiResult<T> = Result<Json<T>, HttpError>;

#[derive(Debug, Default, Deserialize)]
pub struct CompartmentQuery {
    pub compartment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BucketsQuery {
    pub compartment_id: Option<String>,
    pub versioned: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubnetsQuery {
    pub compartment_id: Option<String>,
    pub vcn_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrivateEndpointsQuery {
    pub compartment_id: Option<String>,
    pub resource_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShapeLimitQuery {
    pub compartment_id: Option<String>,
    pub instance_shape: Option<String>,
    pub limit_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BucketVersioningQuery {
    pub bucket_uri: Option<String>,
}

/// 🗺️ Every route, nested under `/aqua`, with request tracing on top.
pub fn router(app: AquaUiApp) -> Router {
    let the_aqua_routes = Router::new()
        .route("/logging", get(list_log_groups))
        .route("/logging/:log_group_id", get(list_logs))
        .route("/compartments", get(list_compartments))
        .route("/compartments/default", get(get_default_compartment))
        .route("/compartments/cache", delete(clear_compartments_cache))
        .route("/experiment", get(list_experiments))
        .route("/versionsets", get(list_version_sets))
        .route("/buckets", get(list_buckets))
        .route("/job/shapes", get(list_job_shapes))
        .route("/modeldeployment/shapes", get(list_model_deployment_shapes))
        .route("/vcn", get(list_vcn))
        .route("/subnets", get(list_subnets))
        .route("/privateendpoints", get(list_private_endpoints))
        .route("/shapes/limit", get(get_shape_availability))
        .route("/bucket/versioning", get(is_bucket_versioned))
        .route("/containers", get(list_containers))
        .route("/capacityreservations/enabled", get(is_capacity_reservation_enabled))
        .route("/capacityreservations", get(list_capacity_reservations))
        .route("/cli", post(build_cli))
        .with_state(app);

    Router::new()
        .nest("/aqua", the_aqua_routes)
        .fallback(unknown_route)
        .layer(TraceLayer::new_for_http())
}

/// ✂️ The router behind a trailing-slash trim, so `/aqua/vcn/` lands on `/aqua/vcn`.
///
/// The trim has to run before routing, which is why it wraps the router instead
/// of being one of its layers.
pub fn service(app: AquaUiApp) -> NormalizePath<Router> {
    NormalizePath::trim_trailing_slash(router(app))
}

async fn unknown_route(uri: Uri) -> HttpError {
    HttpError::bad_request(format!("The request {} is invalid.", uri.path()))
}

// ===== 🪵 logging =====

async fn list_log_groups(State(app): State<AquaUiApp>, Query(q): Query<CompartmentQuery>) -> ApiResult<Vec<Value>> {
    Ok(Json(app.list_log_groups(q.compartment_id.as_deref()).await?))
}

async fn list_logs(State(app): State<AquaUiApp>, Path(log_group_id): Path<String>) -> ApiResult<Vec<Value>> {
    Ok(Json(app.list_logs(&log_group_id).await?))
}

// ===== 🏛️ compartments =====

async fn list_compartments(State(app): State<AquaUiApp>) -> ApiResult<Vec<Value>> {
    Ok(Json(app.list_compartments().await?))
}

async fn get_default_compartment(State(app): State<AquaUiApp>) -> Json<Value> {
    Json(app.get_default_compartment())
}

async fn clear_compartments_cache(State(app): State<AquaUiApp>) -> ApiResult<Value> {
    Ok(Json(app.clear_compartments_list_cache().await?))
}

// ===== 🧪 version sets =====

async fn list_experiments(State(app): State<AquaUiApp>, Query(q): Query<CompartmentQuery>) -> ApiResult<Vec<Value>> {
    Ok(Json(
        app.list_model_version_sets(q.compartment_id.as_deref(), TAG_AQUA_EVALUATION)
            .await?,
    ))
}

async fn list_version_sets(State(app): State<AquaUiApp>, Query(q): Query<CompartmentQuery>) -> ApiResult<Vec<Value>> {
    Ok(Json(
        app.list_model_version_sets(q.compartment_id.as_deref(), TAG_AQUA_FINETUNING)
            .await?,
    ))
}

// ===== 🪣 buckets =====

async fn list_buckets(State(app): State<AquaUiApp>, Query(q): Query<BucketsQuery>) -> ApiResult<Vec<Value>> {
    let versioned = q
        .versioned
        .as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    Ok(Json(app.list_buckets(q.compartment_id.as_deref(), versioned).await?))
}

async fn is_bucket_versioned(State(app): State<AquaUiApp>, Query(q): Query<BucketVersioningQuery>) -> ApiResult<Value> {
    let bucket_uri = required(q.bucket_uri.as_deref(), "bucket_uri")?;
    Ok(Json(app.is_bucket_versioned(bucket_uri).await?))
}

// ===== 🖥️ shapes =====

async fn list_job_shapes(State(app): State<AquaUiApp>, Query(q): Query<CompartmentQuery>) -> ApiResult<Vec<Value>> {
    Ok(Json(app.list_job_shapes(q.compartment_id.as_deref()).await?))
}

async fn list_model_deployment_shapes(
    State(app): State<AquaUiApp>,
    Query(q): Query<CompartmentQuery>,
) -> ApiResult<Vec<Value>> {
    Ok(Json(
        app.list_model_deployment_shapes(q.compartment_id.as_deref())
            .await?,
    ))
}

async fn get_shape_availability(State(app): State<AquaUiApp>, Query(q): Query<ShapeLimitQuery>) -> ApiResult<Value> {
    Ok(Json(
        app.get_shape_availability(
            q.compartment_id.as_deref(),
            q.instance_shape.as_deref().unwrap_or_default(),
            q.limit_name.as_deref().unwrap_or_default(),
        )
        .await?,
    ))
}

async fn list_capacity_reservations(
    State(app): State<AquaUiApp>,
    Query(q): Query<CompartmentQuery>,
) -> ApiResult<Vec<Value>> {
    Ok(Json(
        app.list_capacity_reservations(q.compartment_id.as_deref())
            .await?,
    ))
}

async fn is_capacity_reservation_enabled(State(app): State<AquaUiApp>) -> Json<Value> {
    Json(app.is_capacity_reservation_enabled())
}

// ===== 🕸️ networking =====

async fn list_vcn(State(app): State<AquaUiApp>, Query(q): Query<CompartmentQuery>) -> ApiResult<Vec<Value>> {
    Ok(Json(app.list_vcn(q.compartment_id.as_deref()).await?))
}

async fn list_subnets(State(app): State<AquaUiApp>, Query(q): Query<SubnetsQuery>) -> ApiResult<Vec<Value>> {
    Ok(Json(
        app.list_subnets(q.compartment_id.as_deref(), q.vcn_id.as_deref())
            .await?,
    ))
}

async fn list_private_endpoints(
    State(app): State<AquaUiApp>,
    Query(q): Query<PrivateEndpointsQuery>,
) -> ApiResult<Vec<Value>> {
    Ok(Json(
        app.list_private_endpoints(q.compartment_id.as_deref(), q.resource_type.as_deref())
            .await?,
    ))
}

// ===== 📦 containers =====

async fn list_containers(State(app): State<AquaUiApp>) -> ApiResult<Value> {
    let groups = app.list_containers().await?;
    let body = serde_json::to_value(groups).map_err(crate::error::AquaError::from)?;
    Ok(Json(body))
}

// ===== ⌨️ cli =====

async fn build_cli(body: Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(HttpError::bad_request("No input data provided."));
    }
    let input: Value =
        serde_json::from_slice(&body).map_err(|_| HttpError::bad_request("Invalid format of input data."))?;
    if input.is_null() || input.as_object().is_some_and(|fields| fields.is_empty()) {
        return Err(HttpError::bad_request("No input data provided."));
    }
    let details: CliDetails = serde_json::from_value(input)
        .map_err(|e| HttpError::bad_request(format!("Invalid format of input data: {e}")))?;
    Ok(Json(json!({ "command": details.build_cli()? })))
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, HttpError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| HttpError::bad_request(format!("Missing required parameter: '{name}'")))
}
