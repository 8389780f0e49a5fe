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

use super::service::{InscribirseOutcome, PostulacionService, PostulacionServiceError};
use crate::registro::UserId;
use crate::workflows::convocatorias::domain::ConvocatoriaId;
use crate::workflows::expedientes::documentos::DocumentError;
use crate::workflows::expedientes::domain::{CategoriaObservacion, PostulacionId, StoreError};

/// Router builder exposing the operator/applicant JSON surface for the
/// application lifecycle.
pub fn postulacion_router(service: Arc<PostulacionService>) -> Router {
    Router::new()
        .route(
            "/api/v1/convocatorias/:convocatoria_id/inscripcion",
            post(inscribirse_handler),
        )
        .route("/api/v1/postulaciones/:postulacion_id", get(status_handler))
        .route(
            "/api/v1/postulaciones/:postulacion_id/enviar",
            post(submit_handler),
        )
        .route(
            "/api/v1/postulaciones/:postulacion_id/subsanacion",
            post(correction_handler),
        )
        .route(
            "/api/v1/postulaciones/:postulacion_id/observaciones",
            post(observe_handler),
        )
        .route("/api/v1/rendiciones/crear", post(create_rendiciones_handler))
        .with_state(service)
}

fn error_response(error: PostulacionServiceError) -> Response {
    let status = match &error {
        PostulacionServiceError::Eligibility(_)
        | PostulacionServiceError::CallClosed(_)
        | PostulacionServiceError::KindNotApplicable(_)
        | PostulacionServiceError::NoProjectDocuments => StatusCode::UNPROCESSABLE_ENTITY,
        PostulacionServiceError::Forbidden => StatusCode::FORBIDDEN,
        PostulacionServiceError::Transition(_) => StatusCode::CONFLICT,
        PostulacionServiceError::Document(DocumentError::Store(StoreError::NotFound))
        | PostulacionServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        PostulacionServiceError::Document(DocumentError::Forbidden) => StatusCode::FORBIDDEN,
        PostulacionServiceError::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PostulacionServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}

#[derive(Debug, Deserialize)]
struct ActingUser {
    user: String,
}

async fn inscribirse_handler(
    State(service): State<Arc<PostulacionService>>,
    Path(convocatoria_id): Path<String>,
    axum::Json(payload): axum::Json<ActingUser>,
) -> Response {
    let user = UserId(payload.user);
    match service.inscribirse(&user, &ConvocatoriaId(convocatoria_id), Utc::now()) {
        Ok(InscribirseOutcome::Postulacion {
            postulacion,
            created,
        }) => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let body = axum::Json(json!({
                "postulacion": postulacion.id.0,
                "estado": postulacion.estado.label(),
                "created": created,
            }));
            (status, body).into_response()
        }
        Ok(InscribirseOutcome::Curso {
            inscripcion,
            created,
        }) => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let body = axum::Json(json!({
                "inscripcion": inscripcion.id.0,
                "created": created,
            }));
            (status, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn status_handler(
    State(service): State<Arc<PostulacionService>>,
    Path(postulacion_id): Path<String>,
) -> Response {
    match service.status_view(&PostulacionId(postulacion_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn submit_handler(
    State(service): State<Arc<PostulacionService>>,
    Path(postulacion_id): Path<String>,
    axum::Json(payload): axum::Json<ActingUser>,
) -> Response {
    let user = UserId(payload.user);
    match service.submit(&PostulacionId(postulacion_id), &user, Utc::now()) {
        Ok(postulacion) => {
            let body = axum::Json(json!({
                "postulacion": postulacion.id.0,
                "estado": postulacion.estado.label(),
                "fecha_envio": postulacion.fecha_envio,
            }));
            (StatusCode::OK, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn correction_handler(
    State(service): State<Arc<PostulacionService>>,
    Path(postulacion_id): Path<String>,
    axum::Json(payload): axum::Json<ActingUser>,
) -> Response {
    let user = UserId(payload.user);
    match service.submit_correction(&PostulacionId(postulacion_id), &user, Utc::now()) {
        Ok(postulacion) => {
            let body = axum::Json(json!({
                "postulacion": postulacion.id.0,
                "estado": postulacion.estado.label(),
            }));
            (StatusCode::OK, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct ObservePayload {
    admin: String,
    categoria: CategoriaObservacion,
    descripcion: String,
}

async fn observe_handler(
    State(service): State<Arc<PostulacionService>>,
    Path(postulacion_id): Path<String>,
    axum::Json(payload): axum::Json<ObservePayload>,
) -> Response {
    let admin = UserId(payload.admin);
    match service.observe(
        &PostulacionId(postulacion_id),
        payload.categoria,
        &payload.descripcion,
        &admin,
        Utc::now(),
    ) {
        Ok(outcome) => {
            let body = axum::Json(json!({
                "observacion": outcome.record.observacion.id.0,
                "estado": outcome.postulacion.estado.label(),
                "notified": outcome.record.notified,
                "warnings": outcome.record.warnings,
            }));
            (StatusCode::CREATED, body).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct CreateRendicionesPayload {
    admin: String,
    postulaciones: Vec<String>,
}

async fn create_rendiciones_handler(
    State(service): State<Arc<PostulacionService>>,
    axum::Json(payload): axum::Json<CreateRendicionesPayload>,
) -> Response {
    let admin = UserId(payload.admin);
    let ids: Vec<PostulacionId> = payload.postulaciones.into_iter().map(PostulacionId).collect();
    let outcome = service.create_rendiciones(&ids, &admin, Utc::now());
    (StatusCode::OK, axum::Json(outcome)).into_response()
}
