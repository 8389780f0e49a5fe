use std::sync::Arc;

use crate::config::LinksConfig;
use crate::memoria::{BuzonNotificaciones, MemoriaBlobs, MemoriaDocumentos, MemoriaObservaciones};
use crate::workflows::expedientes::documentos::SubmissionService;
use crate::workflows::expedientes::domain::{Expediente, PostulacionId, UploadedFile};
use crate::workflows::expedientes::observaciones::ObservacionEngine;
use crate::workflows::expedientes::policy::DocumentPolicy;

pub(super) fn expediente(id: &str) -> Expediente {
    Expediente::Postulacion(PostulacionId(id.to_string()))
}

pub(super) fn pdf(nombre: &str) -> UploadedFile {
    UploadedFile {
        nombre: nombre.to_string(),
        bytes: b"%PDF-1.4 fixture".to_vec(),
    }
}

pub(super) fn submission_service() -> (SubmissionService, Arc<MemoriaBlobs>) {
    let blobs = Arc::new(MemoriaBlobs::default());
    let service = SubmissionService::new(
        DocumentPolicy::default(),
        Arc::new(MemoriaDocumentos::default()),
        blobs.clone(),
    );
    (service, blobs)
}

pub(super) fn observation_engine() -> (ObservacionEngine, Arc<BuzonNotificaciones>) {
    let buzon = Arc::new(BuzonNotificaciones::default());
    let engine = ObservacionEngine::new(
        Arc::new(MemoriaObservaciones::default()),
        buzon.clone(),
        LinksConfig::new("https://cultura.test"),
    );
    (engine, buzon)
}
