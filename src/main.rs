use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use convocatorias::config::{AppConfig, LinksConfig};
use convocatorias::error::AppError;
use convocatorias::memoria::{
    BuzonNotificaciones, MemoriaBlobs, MemoriaConvocatorias, MemoriaDocumentos,
    MemoriaExenciones, MemoriaInscripciones, MemoriaObservaciones, MemoriaPostulaciones,
    MemoriaRegistro, MemoriaRendiciones, RenderizadorConstancias,
};
use convocatorias::registro::{DatosFiscales, PersonaHumana, UserId};
use convocatorias::telemetry;
use convocatorias::workflows::convocatorias::{
    postulacion_router, Convocatoria, ConvocatoriaId, ConvocatoriaStore, DetallesProyecto,
    GeneroProyecto, InscribirseOutcome, Linea, PostulacionService, TipoProyecto,
};
use convocatorias::workflows::exencion::{
    exencion_router, CertificatePipeline, ExencionService,
};
use convocatorias::workflows::expedientes::{
    CategoriaObservacion, DocumentKind, DocumentPolicy, ObservacionEngine, SubmissionService,
    SubsanadoTarget, UploadedFile,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Convocatorias Culturales",
    about = "Run the application and document lifecycle engine for cultural funding calls",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk one application and one exemption through the full lifecycle
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

/// Everything the binary wires together: both service façades plus the
/// handles it needs to seed data.
struct Infra {
    postulaciones: Arc<PostulacionService>,
    exenciones: Arc<ExencionService>,
    registry: Arc<MemoriaRegistro>,
    convocatorias: Arc<MemoriaConvocatorias>,
    buzon: Arc<BuzonNotificaciones>,
}

fn build_infra(links: LinksConfig) -> Infra {
    let registry = Arc::new(MemoriaRegistro::default());
    let convocatorias_store = Arc::new(MemoriaConvocatorias::default());
    let documentos_store = Arc::new(MemoriaDocumentos::default());
    let observaciones_store = Arc::new(MemoriaObservaciones::default());
    let blobs = Arc::new(MemoriaBlobs::default());
    let buzon = Arc::new(BuzonNotificaciones::default());

    let postulaciones = Arc::new(PostulacionService::new(
        registry.clone(),
        convocatorias_store.clone(),
        Arc::new(MemoriaPostulaciones::default()),
        Arc::new(MemoriaInscripciones::default()),
        Arc::new(MemoriaRendiciones::default()),
        SubmissionService::new(
            DocumentPolicy::default(),
            documentos_store.clone(),
            blobs.clone(),
        ),
        ObservacionEngine::new(observaciones_store.clone(), buzon.clone(), links.clone()),
    ));

    let exenciones = Arc::new(ExencionService::new(
        registry.clone(),
        Arc::new(MemoriaExenciones::default()),
        SubmissionService::new(DocumentPolicy::default(), documentos_store, blobs.clone()),
        ObservacionEngine::new(observaciones_store, buzon.clone(), links),
        CertificatePipeline::new(Arc::new(RenderizadorConstancias::default()), blobs),
        buzon.clone(),
    ));

    Infra {
        postulaciones,
        exenciones,
        registry,
        convocatorias: convocatorias_store,
        buzon,
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let infra = build_infra(config.links.clone());

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(postulacion_router(infra.postulaciones))
        .merge(exencion_router(infra.exenciones))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "convocatorias lifecycle engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Seed one call and one applicant, then drive both lifecycles end to end,
/// printing each step. Uses the same wiring as the server.
fn run_demo() -> Result<(), AppError> {
    let infra = build_infra(LinksConfig::new("https://cultura.example.gob.ar"));
    let now = Utc::now();
    let today = now.date_naive();

    let user = UserId("demo".to_string());
    infra.registry.agregar_humana(PersonaHumana {
        user: user.clone(),
        nombre_completo: "Ana Paredes".to_string(),
        cuil_cuit: "27-23456789-4".to_string(),
        fecha_nacimiento: NaiveDate::from_ymd_opt(1988, 3, 14).unwrap_or(today),
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

    let convocatoria = Convocatoria {
        id: ConvocatoriaId("conc-cortos".to_string()),
        titulo: "Concurso de cortometrajes".to_string(),
        linea: Linea::Fomento,
        apertura: today - Duration::days(7),
        cierre: today + Duration::days(30),
    };
    infra
        .convocatorias
        .insert(convocatoria.clone())
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;

    let service = &infra.postulaciones;
    let admin = UserId("mesa-entradas".to_string());

    let run = || -> Result<(), Box<dyn std::error::Error>> {
        let outcome = service.inscribirse(&user, &convocatoria.id, now)?;
        let InscribirseOutcome::Postulacion { postulacion, .. } = outcome else {
            return Ok(());
        };
        println!("postulacion {} -> {}", postulacion.id.0, postulacion.estado.label());

        service.set_project_details(
            &postulacion.id,
            &user,
            DetallesProyecto {
                nombre_proyecto: Some("Niebla en los cerros".to_string()),
                tipo_proyecto: Some(TipoProyecto::Corto),
                genero: Some(GeneroProyecto::Ficcion),
                duracion_minutos: Some(15),
                declaracion_jurada: true,
            },
        )?;

        service.upload_document(
            &postulacion.id,
            &user,
            DocumentKind::Proyecto,
            UploadedFile {
                nombre: "carpeta.pdf".to_string(),
                bytes: b"%PDF-1.4 demo".to_vec(),
            },
            now,
        )?;

        let enviada = service.submit(&postulacion.id, &user, now)?;
        println!(
            "postulacion {} -> {} (fecha_envio {:?})",
            enviada.id.0,
            enviada.estado.label(),
            enviada.fecha_envio
        );

        service.pick_up_for_review(&postulacion.id)?;
        let observada = service.observe(
            &postulacion.id,
            CategoriaObservacion::Proyecto,
            "Falta el presupuesto firmado",
            &admin,
            now,
        )?;
        println!(
            "postulacion {} -> {} (notificada: {})",
            postulacion.id.0,
            observada.postulacion.estado.label(),
            observada.record.notified
        );

        service.upload_document(
            &postulacion.id,
            &user,
            DocumentKind::Subsanado(SubsanadoTarget::Proyecto),
            UploadedFile {
                nombre: "presupuesto.pdf".to_string(),
                bytes: b"%PDF-1.4 demo".to_vec(),
            },
            now,
        )?;
        service.submit_correction(&postulacion.id, &user, now)?;
        service.admit(&postulacion.id)?;
        service.hand_to_jury(&postulacion.id)?;
        let seleccionada = service.decide(&postulacion.id, true, &admin, now)?;
        println!("postulacion {} -> {}", seleccionada.id.0, seleccionada.estado.label());

        service.submit_rendicion(
            &postulacion.id,
            &user,
            Some("https://drive.example/carpeta-rendicion".to_string()),
            None,
            now,
        )?;
        let rendicion = service.approve_rendicion(&postulacion.id, &admin, now)?;
        println!(
            "rendicion {} digital -> {}",
            rendicion.id.0,
            rendicion.estado_digital.label()
        );

        let (exencion, _) = infra.exenciones.iniciar(&user, Some(convocatoria.id.clone()), now)?;
        let approval = infra.exenciones.approve_and_issue(&exencion.id, today)?;
        println!(
            "exencion {} -> {} ({} warnings), constancia {}",
            approval.exencion.id.0,
            approval.exencion.estado.label(),
            approval.warnings.len(),
            approval.exencion.numero_constancia()
        );

        println!("notificaciones enviadas: {}", infra.buzon.enviadas().len());
        Ok(())
    };

    run().map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))
}
