use crate::dtos::{ExportQuery, LineItemsResponse, ReportQuery, ReportResponse};
use crate::models::Dimension;
use crate::services::export::{self, ExportFile};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use service_core::error::AppError;

/// Searches carrying the same value supersede each other.
pub const REPORT_SESSION_HEADER: &str = "x-report-session";

fn session(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REPORT_SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn parse_dimension(raw: &str) -> Result<Dimension, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(raw_dimension): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, AppError> {
    let dimension = parse_dimension(&raw_dimension)?;
    let request = query.into_request(session(&headers))?;

    let outcome = state.pipeline.run(&request, dimension).await?;
    Ok(Json(outcome.into()))
}

pub async fn export_report(
    State(state): State<AppState>,
    Path(raw_dimension): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
    Query(options): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let dimension = parse_dimension(&raw_dimension)?;
    let request = query.into_request(session(&headers))?;

    let outcome = state.pipeline.run(&request, dimension).await?;
    let file = export::export_report(
        &outcome.report,
        options.format,
        &state.config.report.export_prefix,
        Local::now().naive_local(),
    )?;
    attachment(file)
}

pub async fn list_line_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<Json<LineItemsResponse>, AppError> {
    let request = query.into_request(session(&headers))?;

    let outcome = state.pipeline.line_items(&request).await?;
    Ok(Json(outcome.into()))
}

pub async fn export_line_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
    Query(options): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let request = query.into_request(session(&headers))?;

    let outcome = state.pipeline.line_items(&request).await?;
    let items: Vec<_> = outcome.line_items.iter().collect();
    let file = export::export_line_items(
        &items,
        &outcome.directory,
        options.format,
        &state.config.report.export_prefix,
        Local::now().naive_local(),
    )?;
    attachment(file)
}

fn attachment(file: ExportFile) -> Result<Response, AppError> {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file.file_name
    ))
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("Invalid export file name: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(file.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}
