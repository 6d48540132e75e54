use crate::dtos::{InsertHeaderFooterRequest, InsertHeaderFooterResponse, RetrieveDocumentRequest};
use crate::services::metrics::record_composition;
use crate::services::ComposeError;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const NOT_FOUND_MESSAGE: &str = "Archivo no encontrado";

fn json_rejection(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(anyhow::anyhow!("Request body is too large"));
    }
    AppError::BadRequest(anyhow::anyhow!(rejection.body_text()))
}

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!(NOT_FOUND_MESSAGE))
}

fn outcome_of(err: &ComposeError) -> &'static str {
    match err {
        ComposeError::Template { .. } | ComposeError::InvalidTemplate { .. } => "error",
        _ => "rejected",
    }
}

/// `POST /api/WordDocument/insertar-header-footer`
pub async fn insert_header_footer(
    State(state): State<AppState>,
    payload: Result<Json<InsertHeaderFooterRequest>, JsonRejection>,
) -> Result<Json<InsertHeaderFooterResponse>, AppError> {
    let Json(request) = payload.map_err(json_rejection)?;
    request.validate()?;

    let requested_variant = if request.is_metadata_variant() {
        "metadata"
    } else {
        "images"
    };

    let composer = state.composer.clone();
    let composed = tokio::task::spawn_blocking(move || composer.run(&request))
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Composition task failed: {}", e)))?;

    let (variant, bytes) = composed.map_err(|e| {
        record_composition(requested_variant, outcome_of(&e));
        tracing::info!(variant = requested_variant, error = %e, "Composition failed");
        AppError::from(e)
    })?;

    let size = bytes.len();
    let stored = state.store.put(bytes).await.map_err(|e| {
        record_composition(variant, "error");
        tracing::error!(variant, error = %e, "Failed to store composed document");
        e
    })?;

    record_composition(variant, "success");
    tracing::info!(
        document_id = %stored.id,
        variant,
        size,
        "Document composed"
    );

    Ok(Json(InsertHeaderFooterResponse {
        ruta: stored.reference(),
    }))
}

/// `POST /api/WordDocument/obtener-archivo`
pub async fn retrieve_document(
    State(state): State<AppState>,
    payload: Result<Json<RetrieveDocumentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(json_rejection)?;

    let document = state.store.resolve(&request.ruta).await.ok_or_else(|| {
        tracing::info!(reference = %request.ruta, "Rejected unknown document reference");
        not_found()
    })?;

    let data = state.store.get(document.id).await?.ok_or_else(not_found)?;

    tracing::info!(
        document_id = %document.id,
        size = data.len(),
        "Document download completed"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.file_name()),
            ),
        ],
        data,
    ))
}
