use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::models::{ForecastPoint, ForecastResult};
use crate::pipeline::{ErrorKind, PipelineError};
use crate::presenter::page;
use crate::presenter::{TableLabels, YearTable};
use crate::services::{ForecastReport, ForecastService, ServiceError};

const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub forecast_service: ForecastService,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ForecastQuery {
    /// Calendar year to tabulate; defaults to the configured target year
    pub target_year: Option<i32>,
}

/// Multipart body carrying the measurement file
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    /// Header row of the uploaded file
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub cleaned_rows: usize,
    pub dropped_rows: usize,
    pub invalid_values: usize,
    pub invalid_timestamps: usize,
    pub model: String,
    pub target_year: i32,
    pub table: YearTable,
    pub forecast: ForecastResult,
}

impl From<ForecastReport> for ForecastResponse {
    fn from(report: ForecastReport) -> Self {
        let cleaning = &report.output.cleaning;
        Self {
            columns: report.output.columns.clone(),
            total_rows: cleaning.total_rows,
            cleaned_rows: cleaning.series.len(),
            dropped_rows: cleaning.dropped_rows,
            invalid_values: cleaning.invalid_values,
            invalid_timestamps: cleaning.invalid_timestamps,
            model: report.output.model_name.to_string(),
            target_year: report.table.year,
            table: report.table,
            forecast: report.output.forecast,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Failure of an upload request, before or inside the pipeline
#[derive(Debug)]
pub enum ApiError {
    MissingFile,
    InvalidUpload(String),
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            Self::Service(ServiceError::Pipeline(e)) => match e.kind() {
                ErrorKind::ModelFittingError => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            Self::MissingFile => ErrorResponse {
                error: "invalid_upload".to_string(),
                message: format!("multipart field '{UPLOAD_FIELD}' is required"),
                hint: None,
            },
            Self::InvalidUpload(msg) => ErrorResponse {
                error: "invalid_upload".to_string(),
                message: msg.clone(),
                hint: None,
            },
            Self::Service(ServiceError::Pipeline(e)) => ErrorResponse {
                error: e.kind().as_str().to_string(),
                message: e.to_string(),
                hint: Some(PipelineError::HINT.to_string()),
            },
            Self::Service(e) => ErrorResponse {
                error: "internal_error".to_string(),
                message: e.to_string(),
                hint: None,
            },
        }
    }

    fn log(&self) {
        match self {
            Self::Service(ServiceError::Pipeline(e)) => {
                warn!("Upload rejected ({}): {}", e.kind().as_str(), e)
            }
            Self::Service(e) => error!("Forecast failed: {}", e),
            other => warn!("Invalid upload request: {:?}", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        (self.status(), Json(self.body())).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, create_forecast, create_forecast_chart),
    components(schemas(
        HealthResponse,
        UploadForm,
        ForecastResponse,
        ErrorResponse,
        YearTable,
        TableLabels,
        ForecastResult,
        ForecastPoint
    )),
    tags((name = "forecasts", description = "Upload a measurement file and forecast the next year"))
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.forecast_service.config().max_upload_bytes;

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/forecasts", post(create_forecast))
        .route("/forecasts/chart", post(create_forecast_chart));

    Router::new()
        .route("/", get(upload_form))
        .route("/report", post(create_report))
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Read the `file` field of a multipart upload
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
            debug!("Received upload {:?} ({} bytes)", file_name, bytes.len());
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::MissingFile)
}

async fn run_upload(
    state: &AppState,
    query: ForecastQuery,
    multipart: Multipart,
    render_chart: bool,
) -> Result<ForecastReport, ApiError> {
    let bytes = read_upload(multipart).await?;
    let ctx = state.forecast_service.context(query.target_year);
    let report = state
        .forecast_service
        .process_upload(ctx, bytes, render_chart)
        .await?;
    Ok(report)
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/forecasts",
    tag = "forecasts",
    params(ForecastQuery),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Forecast for the uploaded file", body = ForecastResponse),
        (status = 400, description = "Unreadable file, missing columns or no valid rows", body = ErrorResponse),
        (status = 422, description = "The model could not be fitted to the series", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart), fields(target_year = ?query.target_year))]
async fn create_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
    multipart: Multipart,
) -> Result<Json<ForecastResponse>, ApiError> {
    let report = run_upload(&state, query, multipart, false).await?;
    info!(
        "Forecast served: {} cleaned rows, {} rows for {}",
        report.output.cleaning.series.len(),
        report.table.rows.len(),
        report.table.year
    );
    Ok(Json(ForecastResponse::from(report)))
}

#[utoipa::path(
    post,
    path = "/api/v1/forecasts/chart",
    tag = "forecasts",
    params(ForecastQuery),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "SVG chart of history, estimate and uncertainty band", content_type = "image/svg+xml", body = String),
        (status = 400, description = "Unreadable file, missing columns or no valid rows", body = ErrorResponse),
        (status = 422, description = "The model could not be fitted to the series", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart), fields(target_year = ?query.target_year))]
async fn create_forecast_chart(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let report = run_upload(&state, query, multipart, true).await?;
    let svg = report.chart_svg.unwrap_or_default();
    info!("Chart served ({} bytes)", svg.len());
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

#[instrument(skip(state))]
async fn upload_form(State(state): State<AppState>) -> Html<String> {
    let year = state.forecast_service.config().target_year;
    Html(page::upload_page(&page::page_title(year)))
}

#[instrument(skip(state, multipart), fields(target_year = ?query.target_year))]
async fn create_report(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
    multipart: Multipart,
) -> Response {
    let year = query
        .target_year
        .unwrap_or(state.forecast_service.config().target_year);
    let title = page::page_title(year);

    match run_upload(&state, query, multipart, true).await {
        Ok(report) => {
            let svg = report.chart_svg.as_deref().unwrap_or_default();
            Html(page::report_page(&title, &report.output, &report.table, svg)).into_response()
        }
        Err(err) => {
            err.log();
            let status = err.status();
            let body = err.body();
            let kind = match &err {
                ApiError::Service(ServiceError::Pipeline(e)) => Some(e.kind()),
                _ => None,
            };
            let html = page::error_page(
                &title,
                kind,
                &body.message,
                body.hint.as_deref().unwrap_or(PipelineError::HINT),
            );
            (status, Html(html)).into_response()
        }
    }
}
