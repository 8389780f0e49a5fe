use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::service::{ExencionService, ExencionServiceError};
use crate::registro::UserId;
use crate::workflows::convocatorias::domain::ConvocatoriaId;
use crate::workflows::expedientes::documentos::DocumentError;
use crate::workflows::expedientes::domain::{ExencionId, StoreError, UploadedFile};

pub fn exencion_router(service: Arc<ExencionService>) -> Router {
    Router::new()
        .route("/api/v1/exencion/iniciar", post(iniciar_handler))
        .route("/api/v1/exencion/:exencion_id", get(detalle_handler))
        .route(
            "/api/v1/exencion/:exencion_id/documentos",
            post(upload_handler),
        )
        .route(
            "/api/v1/exencion/:exencion_id/confirmar",
            post(confirmar_handler),
        )
        .route("/api/v1/exencion/aprobar", post(aprobar_handler))
        .with_state(service)
}

fn error_response(error: ExencionServiceError) -> Response {
    let status = match &error {
        ExencionServiceError::Eligibility(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExencionServiceError::Forbidden => StatusCode::FORBIDDEN,
        ExencionServiceError::Transition(_) => StatusCode::CONFLICT,
        ExencionServiceError::Document(DocumentError::Store(StoreError::NotFound))
        | ExencionServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        ExencionServiceError::Document(DocumentError::Forbidden) => StatusCode::FORBIDDEN,
        ExencionServiceError::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExencionServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}

#[derive(Debug, Deserialize)]
struct IniciarPayload {
    user: String,
    convocatoria: Option<String>,
}

async fn iniciar_handler(
    State(service): State<Arc<ExencionService>>,
    axum::Json(payload): axum::Json<IniciarPayload>,
) -> Response {
    let user = UserId(payload.user);
    let convocatoria = payload.convocatoria.map(ConvocatoriaId);
    match service.iniciar(&user, convocatoria, Utc::now()) {
        Ok((exencion, created)) => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let body = axum::Json(json!({
                "exencion": exencion.id.0,
                "estado": exencion.estado.label(),
                "numero_constancia": exencion.numero_constancia(),
                "created": created,
            }));
            (status, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn detalle_handler(
    State(service): State<Arc<ExencionService>>,
    Path(exencion_id): Path<String>,
) -> Response {
    match service.exencion(&ExencionId(exencion_id)) {
        Ok(exencion) => {
            let body = axum::Json(json!({
                "exencion": exencion.id.0,
                "estado": exencion.estado.label(),
                "numero_constancia": exencion.numero_constancia(),
                "fecha_emision": exencion.fecha_emision,
                "fecha_vencimiento": exencion.fecha_vencimiento,
                "certificado": exencion.certificado.map(|c| c.0),
            }));
            (StatusCode::OK, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct UploadPayload {
    user: String,
    nombre: String,
    bytes: Vec<u8>,
    #[serde(default)]
    es_subsanacion: bool,
}

async fn upload_handler(
    State(service): State<Arc<ExencionService>>,
    Path(exencion_id): Path<String>,
    axum::Json(payload): axum::Json<UploadPayload>,
) -> Response {
    let user = UserId(payload.user);
    let file = UploadedFile {
        nombre: payload.nombre,
        bytes: payload.bytes,
    };
    match service.upload_document(
        &ExencionId(exencion_id),
        &user,
        file,
        payload.es_subsanacion,
        Utc::now(),
    ) {
        Ok(documento) => {
            let body = axum::Json(json!({
                "documento": documento.id.0,
                "estado": documento.estado.label(),
            }));
            (StatusCode::CREATED, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct ActingUser {
    user: String,
}

async fn confirmar_handler(
    State(service): State<Arc<ExencionService>>,
    Path(exencion_id): Path<String>,
    axum::Json(payload): axum::Json<ActingUser>,
) -> Response {
    let user = UserId(payload.user);
    match service.confirm_documents(&ExencionId(exencion_id), &user, Utc::now()) {
        Ok(documentos) => {
            let body = axum::Json(json!({ "confirmados": documentos.len() }));
            (StatusCode::OK, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct AprobarPayload {
    exenciones: Vec<String>,
}

async fn aprobar_handler(
    State(service): State<Arc<ExencionService>>,
    axum::Json(payload): axum::Json<AprobarPayload>,
) -> Response {
    let ids: Vec<ExencionId> = payload.exenciones.into_iter().map(ExencionId).collect();
    let outcome = service.approve_batch(&ids, Utc::now().date_naive());
    (StatusCode::OK, axum::Json(outcome)).into_response()
}
