use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::config::LinksConfig;
use crate::memoria::{
    BuzonNotificaciones, MemoriaBlobs, MemoriaDocumentos, MemoriaExenciones,
    MemoriaObservaciones, MemoriaRegistro, RenderizadorConstancias,
};
use crate::registro::{DatosFiscales, PersonaHumana, UserId};
use crate::workflows::exencion::certificado::CertificatePipeline;
use crate::workflows::exencion::domain::{EstadoExencion, Exencion};
use crate::workflows::exencion::service::ExencionService;
use crate::workflows::expedientes::documentos::SubmissionService;
use crate::workflows::expedientes::domain::{ExencionId, UploadedFile};
use crate::workflows::expedientes::observaciones::ObservacionEngine;
use crate::workflows::expedientes::policy::DocumentPolicy;

pub(super) struct Fixture {
    pub service: ExencionService,
    pub registry: Arc<MemoriaRegistro>,
    pub exenciones: Arc<MemoriaExenciones>,
    pub blobs: Arc<MemoriaBlobs>,
    pub buzon: Arc<BuzonNotificaciones>,
    pub renderer: Arc<RenderizadorConstancias>,
}

pub(super) fn hoy() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 15).expect("valid")
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn user() -> UserId {
    UserId("ana".to_string())
}

pub(super) fn admin() -> UserId {
    UserId("rentas".to_string())
}

pub(super) fn persona_completa(user: UserId) -> PersonaHumana {
    PersonaHumana {
        user,
        nombre_completo: "Ana Paredes".to_string(),
        cuil_cuit: "27-23456789-4".to_string(),
        fecha_nacimiento: NaiveDate::from_ymd_opt(1988, 3, 14).expect("valid"),
        email: Some("ana@example.com".to_string()),
        telefono: None,
        fiscales: DatosFiscales {
            situacion_iva: Some("M".to_string()),
            actividad_dgr: Some("591110".to_string()),
            domicilio_fiscal: Some("Av. Belgrano 1349".to_string()),
            localidad_fiscal: Some("SC".to_string()),
            codigo_postal_fiscal: Some("4400".to_string()),
        },
    }
}

pub(super) fn fixture() -> Fixture {
    let registry = Arc::new(MemoriaRegistro::default());
    registry.agregar_humana(persona_completa(user()));

    let exenciones = Arc::new(MemoriaExenciones::default());
    let blobs = Arc::new(MemoriaBlobs::default());
    let buzon = Arc::new(BuzonNotificaciones::default());
    let renderer = Arc::new(RenderizadorConstancias::default());

    let service = ExencionService::new(
        registry.clone(),
        exenciones.clone(),
        SubmissionService::new(
            DocumentPolicy::default(),
            Arc::new(MemoriaDocumentos::default()),
            blobs.clone(),
        ),
        ObservacionEngine::new(
            Arc::new(MemoriaObservaciones::default()),
            buzon.clone(),
            LinksConfig::new("https://cultura.test"),
        ),
        CertificatePipeline::new(renderer.clone(), blobs.clone()),
        buzon.clone(),
    );

    Fixture {
        service,
        registry,
        exenciones,
        blobs,
        buzon,
        renderer,
    }
}

pub(super) fn pdf(nombre: &str) -> UploadedFile {
    UploadedFile {
        nombre: nombre.to_string(),
        bytes: b"%PDF-1.4 fixture".to_vec(),
    }
}

/// Snapshot row with a hole, inserted behind the service's back to exercise
/// the approval precondition.
pub(super) fn exencion_incompleta(id: &str, user: UserId) -> Exencion {
    Exencion {
        id: ExencionId(id.to_string()),
        user,
        convocatoria: None,
        nombre_razon_social: "Ana Paredes".to_string(),
        email: Some("ana@example.com".to_string()),
        cuit: "27-23456789-4".to_string(),
        domicilio_fiscal: String::new(),
        localidad_fiscal: "SC".to_string(),
        codigo_postal_fiscal: "4400".to_string(),
        actividad_dgr: "591110".to_string(),
        estado: EstadoExencion::Enviada,
        fecha_creacion: now(),
        fecha_emision: None,
        fecha_vencimiento: None,
        certificado: None,
    }
}
