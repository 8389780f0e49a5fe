use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::config::LinksConfig;
use crate::memoria::{
    BuzonNotificaciones, MemoriaBlobs, MemoriaConvocatorias, MemoriaDocumentos,
    MemoriaInscripciones, MemoriaObservaciones, MemoriaPostulaciones, MemoriaRegistro,
    MemoriaRendiciones,
};
use crate::registro::{DatosFiscales, PersonaHumana, UserId};
use crate::workflows::convocatorias::domain::{
    Convocatoria, ConvocatoriaId, DetallesProyecto, GeneroProyecto, Linea, Postulacion,
    TipoProyecto,
};
use crate::workflows::convocatorias::repository::ConvocatoriaStore;
use crate::workflows::convocatorias::service::{InscribirseOutcome, PostulacionService};
use crate::workflows::expedientes::documentos::SubmissionService;
use crate::workflows::expedientes::domain::{DocumentKind, UploadedFile};
use crate::workflows::expedientes::observaciones::ObservacionEngine;
use crate::workflows::expedientes::policy::DocumentPolicy;

pub(super) struct Fixture {
    pub service: Arc<PostulacionService>,
    pub buzon: Arc<BuzonNotificaciones>,
    pub registry: Arc<MemoriaRegistro>,
    pub postulaciones: Arc<MemoriaPostulaciones>,
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 14, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn user() -> UserId {
    UserId("ana".to_string())
}

pub(super) fn admin() -> UserId {
    UserId("mesa-entradas".to_string())
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

fn convocatoria(id: &str, titulo: &str, linea: Linea) -> Convocatoria {
    Convocatoria {
        id: ConvocatoriaId(id.to_string()),
        titulo: titulo.to_string(),
        linea,
        apertura: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid"),
        // Far-future close date: the router handlers stamp wall-clock time.
        cierre: NaiveDate::from_ymd_opt(2099, 12, 31).expect("valid"),
    }
}

pub(super) fn fomento() -> ConvocatoriaId {
    ConvocatoriaId("conc-cortos".to_string())
}

pub(super) fn libre() -> ConvocatoriaId {
    ConvocatoriaId("linea-libre".to_string())
}

pub(super) fn curso() -> ConvocatoriaId {
    ConvocatoriaId("taller-animacion".to_string())
}

pub(super) fn cerrada() -> ConvocatoriaId {
    ConvocatoriaId("conc-2025".to_string())
}

pub(super) fn fixture() -> Fixture {
    let registry = Arc::new(MemoriaRegistro::default());
    registry.agregar_humana(persona_completa(user()));

    let convocatorias = Arc::new(MemoriaConvocatorias::default());
    convocatorias
        .insert(convocatoria("conc-cortos", "Concurso de cortometrajes", Linea::Fomento))
        .expect("seed");
    convocatorias
        .insert(convocatoria("linea-libre", "Línea libre", Linea::Libre))
        .expect("seed");
    convocatorias
        .insert(convocatoria("taller-animacion", "Taller de animación", Linea::Formacion))
        .expect("seed");
    let mut vieja = convocatoria("conc-2025", "Concurso 2025", Linea::Fomento);
    vieja.apertura = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid");
    vieja.cierre = NaiveDate::from_ymd_opt(2025, 12, 31).expect("valid");
    convocatorias.insert(vieja).expect("seed");

    let postulaciones = Arc::new(MemoriaPostulaciones::default());
    let buzon = Arc::new(BuzonNotificaciones::default());
    let blobs = Arc::new(MemoriaBlobs::default());

    let service = Arc::new(PostulacionService::new(
        registry.clone(),
        convocatorias,
        postulaciones.clone(),
        Arc::new(MemoriaInscripciones::default()),
        Arc::new(MemoriaRendiciones::default()),
        SubmissionService::new(
            DocumentPolicy::default(),
            Arc::new(MemoriaDocumentos::default()),
            blobs,
        ),
        ObservacionEngine::new(
            Arc::new(MemoriaObservaciones::default()),
            buzon.clone(),
            LinksConfig::new("https://cultura.test"),
        ),
    ));

    Fixture {
        service,
        buzon,
        registry,
        postulaciones,
    }
}

pub(super) fn pdf(nombre: &str) -> UploadedFile {
    UploadedFile {
        nombre: nombre.to_string(),
        bytes: b"%PDF-1.4 fixture".to_vec(),
    }
}

pub(super) fn detalles() -> DetallesProyecto {
    DetallesProyecto {
        nombre_proyecto: Some("Niebla en los cerros".to_string()),
        tipo_proyecto: Some(TipoProyecto::Corto),
        genero: Some(GeneroProyecto::Ficcion),
        duracion_minutos: Some(15),
        declaracion_jurada: true,
    }
}

pub(super) fn draft(fixture: &Fixture) -> Postulacion {
    match fixture
        .service
        .inscribirse(&user(), &fomento(), now())
        .expect("draft starts")
    {
        InscribirseOutcome::Postulacion { postulacion, .. } => postulacion,
        other => panic!("expected application draft, got {other:?}"),
    }
}

/// Draft with project data and one confirmed-on-submit project document.
pub(super) fn submitted(fixture: &Fixture) -> Postulacion {
    let postulacion = draft(fixture);
    fixture
        .service
        .set_project_details(&postulacion.id, &user(), detalles())
        .expect("details");
    fixture
        .service
        .upload_document(&postulacion.id, &user(), DocumentKind::Proyecto, pdf("carpeta.pdf"), now())
        .expect("upload");
    fixture
        .service
        .submit(&postulacion.id, &user(), now())
        .expect("submit")
}
