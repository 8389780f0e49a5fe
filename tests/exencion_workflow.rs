//! End-to-end scenarios for the exemption lifecycle and the certificate
//! issuance pipeline.

mod common {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use convocatorias::config::LinksConfig;
    use convocatorias::memoria::{
        BuzonNotificaciones, MemoriaBlobs, MemoriaDocumentos, MemoriaExenciones,
        MemoriaObservaciones, MemoriaRegistro, RenderizadorConstancias,
    };
    use convocatorias::registro::{DatosFiscales, PersonaHumana, UserId};
    use convocatorias::workflows::exencion::{CertificatePipeline, ExencionService};
    use convocatorias::workflows::expedientes::{
        DocumentPolicy, ObservacionEngine, SubmissionService,
    };

    pub struct Harness {
        pub service: ExencionService,
        pub blobs: Arc<MemoriaBlobs>,
        pub buzon: Arc<BuzonNotificaciones>,
        pub renderer: Arc<RenderizadorConstancias>,
    }

    pub fn hoy() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).expect("valid")
    }

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    pub fn user() -> UserId {
        UserId("ana".to_string())
    }

    pub fn admin() -> UserId {
        UserId("rentas".to_string())
    }

    pub fn harness() -> Harness {
        let registry = Arc::new(MemoriaRegistro::default());
        registry.agregar_humana(PersonaHumana {
            user: user(),
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
        });

        let blobs = Arc::new(MemoriaBlobs::default());
        let buzon = Arc::new(BuzonNotificaciones::default());
        let renderer = Arc::new(RenderizadorConstancias::default());

        let service = ExencionService::new(
            registry,
            Arc::new(MemoriaExenciones::default()),
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

        Harness {
            service,
            blobs,
            buzon,
            renderer,
        }
    }
}

use common::*;
use convocatorias::workflows::exencion::{EstadoExencion, ResultadoAprobacion};
use convocatorias::workflows::expedientes::{CategoriaObservacion, UploadedFile};

fn pdf(nombre: &str) -> UploadedFile {
    UploadedFile {
        nombre: nombre.to_string(),
        bytes: b"%PDF-1.4 integration".to_vec(),
    }
}

#[test]
fn exemption_request_to_certificate_delivery() {
    let harness = harness();
    let service = &harness.service;

    let (exencion, created) = service.iniciar(&user(), None, now()).expect("start");
    assert!(created);
    assert_eq!(exencion.estado, EstadoExencion::Enviada);

    service
        .upload_document(&exencion.id, &user(), pdf("constancia-dgr.pdf"), false, now())
        .expect("upload");
    service
        .confirm_documents(&exencion.id, &user(), now())
        .expect("confirm");

    let outcome = service
        .observe(&exencion.id, CategoriaObservacion::Fiscal, "CUIT ilegible", &admin(), now())
        .expect("observe");
    assert!(outcome.notified);

    service
        .upload_document(&exencion.id, &user(), pdf("cuit.pdf"), true, now())
        .expect("correction upload");
    service
        .submit_correction(&exencion.id, &user(), now())
        .expect("correction");

    let approval = service.approve_and_issue(&exencion.id, hoy()).expect("approve");
    assert_eq!(approval.resultado, ResultadoAprobacion::Aprobada);
    assert!(approval.warnings.is_empty());

    let aprobada = approval.exencion;
    assert_eq!(aprobada.estado, EstadoExencion::Aprobada);
    assert_eq!(aprobada.fecha_emision, Some(hoy()));
    let locator = aprobada.certificado.expect("certificate stored");
    assert!(harness.blobs.contiene(&locator.0));

    // One observation notice plus one certificate delivery.
    let enviadas = harness.buzon.enviadas();
    assert_eq!(enviadas.len(), 2);
    assert!(enviadas[1].attachment.is_some());
}

#[test]
fn issuance_retry_after_renderer_outage() {
    let harness = harness();
    let service = &harness.service;
    let (exencion, _) = service.iniciar(&user(), None, now()).expect("start");

    harness.renderer.fallar_una_vez();
    let first = service.approve_and_issue(&exencion.id, hoy()).expect("approve");
    assert_eq!(first.resultado, ResultadoAprobacion::Aprobada);
    assert_eq!(first.warnings.len(), 1);
    assert!(first.exencion.certificado.is_none());

    let second = service.approve_and_issue(&exencion.id, hoy()).expect("retry");
    assert_eq!(second.resultado, ResultadoAprobacion::Reemitida);
    assert!(second.exencion.certificado.is_some());
    assert_eq!(second.exencion.fecha_emision, Some(hoy()));
    assert_eq!(harness.blobs.cantidad(), 1);
}

#[test]
fn restart_resumes_the_same_request() {
    let harness = harness();
    let service = &harness.service;

    let (primera, created) = service.iniciar(&user(), None, now()).expect("first");
    assert!(created);
    let (segunda, created) = service.iniciar(&user(), None, now()).expect("second");
    assert!(!created);
    assert_eq!(primera.id, segunda.id);
}
