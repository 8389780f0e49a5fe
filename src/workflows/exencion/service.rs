use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use super::certificado::CertificatePipeline;
use super::domain::{EstadoExencion, Exencion};
use super::repository::ExencionRepository;
use crate::notificaciones::{Adjunto, Notificacion, NotificationSender, Warning};
use crate::registro::{
    check_eligible, check_fiscal_complete, email_de_contacto, valor_presente, EligibilityError,
    RegistryReader, UserId,
};
use crate::workflows::convocatorias::domain::ConvocatoriaId;
use crate::workflows::expedientes::documentos::{DocumentError, SubmissionService};
use crate::workflows::expedientes::domain::{
    BulkOutcome, CategoriaObservacion, Documento, DocumentKind, DocumentoId, Expediente,
    ExencionId, StoreError, TransitionError, UploadedFile,
};
use crate::workflows::expedientes::observaciones::{ObservacionEngine, RecordOutcome};

static EXENCION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_exencion_id() -> ExencionId {
    let id = EXENCION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ExencionId(format!("exe-{id:06}"))
}

#[derive(Debug, thiserror::Error)]
pub enum ExencionServiceError {
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    #[error("operation allowed only for the owner of the record")]
    Forbidden,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How an `approve_and_issue` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultadoAprobacion {
    /// Fresh `enviada → aprobada` transition.
    Aprobada,
    /// Row was already approved without a certificate; only the pipeline
    /// re-ran. Emission/expiry dates untouched.
    Reemitida,
    /// Row was already approved with a certificate; nothing to do.
    YaEmitida,
}

/// Two-phase outcome: the durable exemption state plus best-effort
/// side-effect results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub exencion: Exencion,
    pub resultado: ResultadoAprobacion,
    pub warnings: Vec<Warning>,
}

pub struct ExencionService {
    registry: Arc<dyn RegistryReader>,
    exenciones: Arc<dyn ExencionRepository>,
    documentos: SubmissionService,
    observaciones: ObservacionEngine,
    pipeline: CertificatePipeline,
    notifier: Arc<dyn NotificationSender>,
}

impl ExencionService {
    pub fn new(
        registry: Arc<dyn RegistryReader>,
        exenciones: Arc<dyn ExencionRepository>,
        documentos: SubmissionService,
        observaciones: ObservacionEngine,
        pipeline: CertificatePipeline,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            registry,
            exenciones,
            documentos,
            observaciones,
            pipeline,
            notifier,
        }
    }

    fn fetch_exencion(&self, id: &ExencionId) -> Result<Exencion, ExencionServiceError> {
        Ok(self.exenciones.fetch(id)?.ok_or(StoreError::NotFound)?)
    }

    fn owned(&self, id: &ExencionId, by: &UserId) -> Result<Exencion, ExencionServiceError> {
        let exencion = self.fetch_exencion(id)?;
        if exencion.user != *by {
            return Err(ExencionServiceError::Forbidden);
        }
        Ok(exencion)
    }

    /// Start (or resume) an exemption request. Both gates run before any
    /// row exists: the user must hold a registry profile and its fiscal
    /// data must be complete, because those fields freeze into the snapshot
    /// right here.
    pub fn iniciar(
        &self,
        user: &UserId,
        convocatoria: Option<ConvocatoriaId>,
        now: DateTime<Utc>,
    ) -> Result<(Exencion, bool), ExencionServiceError> {
        let persona = check_eligible(self.registry.as_ref(), user)?;
        check_fiscal_complete(&persona)?;

        let fiscales = persona.fiscales().clone();
        let exencion = Exencion {
            id: next_exencion_id(),
            user: user.clone(),
            convocatoria,
            nombre_razon_social: persona.nombre_razon_social().to_string(),
            email: email_de_contacto(self.registry.as_ref(), &persona),
            cuit: persona.cuil_cuit().to_string(),
            domicilio_fiscal: fiscales.domicilio_fiscal.unwrap_or_default(),
            localidad_fiscal: fiscales.localidad_fiscal.unwrap_or_default(),
            codigo_postal_fiscal: fiscales.codigo_postal_fiscal.unwrap_or_default(),
            actividad_dgr: fiscales.actividad_dgr.unwrap_or_default(),
            estado: EstadoExencion::Enviada,
            fecha_creacion: now,
            fecha_emision: None,
            fecha_vencimiento: None,
            certificado: None,
        };

        let outcome = self.exenciones.create_if_absent(exencion)?;
        let created = outcome.was_created();
        if created {
            info!(user = %user.0, "exemption request opened");
        }
        Ok((outcome.into_inner(), created))
    }

    pub fn upload_document(
        &self,
        id: &ExencionId,
        by: &UserId,
        file: UploadedFile,
        es_subsanacion: bool,
        now: DateTime<Utc>,
    ) -> Result<Documento, ExencionServiceError> {
        let exencion = self.owned(id, by)?;
        Ok(self.documentos.upload(
            Expediente::Exencion(exencion.id),
            by,
            DocumentKind::Exencion,
            file,
            es_subsanacion,
            now,
        )?)
    }

    pub fn delete_document(
        &self,
        documento: &DocumentoId,
        by: &UserId,
    ) -> Result<(), ExencionServiceError> {
        Ok(self.documentos.delete(documento, by)?)
    }

    pub fn confirm_documents(
        &self,
        id: &ExencionId,
        by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Documento>, ExencionServiceError> {
        let exencion = self.owned(id, by)?;
        Ok(self.documentos.confirm_batch(
            &Expediente::Exencion(exencion.id),
            DocumentKind::Exencion,
            now,
        )?)
    }

    /// Correction batch confirmed: documents flip to sent and every
    /// unresolved observation resolves. The exemption state itself does not
    /// move; it stays under review as `enviada`.
    pub fn submit_correction(
        &self,
        id: &ExencionId,
        by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<usize, ExencionServiceError> {
        let exencion = self.owned(id, by)?;
        let expediente = Expediente::Exencion(exencion.id);
        self.documentos
            .confirm_batch(&expediente, DocumentKind::Exencion, now)?;
        Ok(self.observaciones.resolve_on_correction(&expediente)?)
    }

    pub fn observe(
        &self,
        id: &ExencionId,
        categoria: CategoriaObservacion,
        descripcion: &str,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, ExencionServiceError> {
        let exencion = self.fetch_exencion(id)?;
        if exencion.estado != EstadoExencion::Enviada {
            return Err(TransitionError::InvalidState {
                from: exencion.estado.label(),
                attempted: "observada",
            }
            .into());
        }
        let contacto = exencion
            .email
            .clone()
            .filter(|email| valor_presente(Some(email.as_str())));
        Ok(self.observaciones.record(
            &Expediente::Exencion(exencion.id),
            None,
            categoria,
            descripcion,
            admin,
            contacto.as_deref(),
            now,
        )?)
    }

    pub fn observaciones_de(
        &self,
        id: &ExencionId,
    ) -> Result<Vec<crate::workflows::expedientes::domain::Observacion>, ExencionServiceError>
    {
        Ok(self
            .observaciones
            .for_expediente(&Expediente::Exencion(id.clone()))?)
    }

    pub fn documentos_de(
        &self,
        id: &ExencionId,
    ) -> Result<Vec<Documento>, ExencionServiceError> {
        Ok(self.documentos.documentos(&Expediente::Exencion(id.clone()))?)
    }

    pub fn exencion(&self, id: &ExencionId) -> Result<Exencion, ExencionServiceError> {
        self.fetch_exencion(id)
    }

    /// Approve and issue the constancia.
    ///
    /// Phase 1 (durable): precondition check, `enviada → aprobada`, dates.
    /// Phase 2 (best-effort): certificate pipeline and delivery; failures
    /// surface as warnings and never roll back phase 1. Re-invoking on an
    /// approved row without a certificate re-runs only phase 2.
    pub fn approve_and_issue(
        &self,
        id: &ExencionId,
        hoy: NaiveDate,
    ) -> Result<ApprovalOutcome, ExencionServiceError> {
        let mut exencion = self.fetch_exencion(id)?;
        let mut warnings = Vec::new();

        let resultado = match exencion.estado {
            EstadoExencion::Rechazada => {
                return Err(TransitionError::InvalidState {
                    from: exencion.estado.label(),
                    attempted: "aprobada",
                }
                .into())
            }
            EstadoExencion::Aprobada if exencion.certificado.is_some() => {
                return Ok(ApprovalOutcome {
                    exencion,
                    resultado: ResultadoAprobacion::YaEmitida,
                    warnings,
                });
            }
            EstadoExencion::Aprobada => ResultadoAprobacion::Reemitida,
            EstadoExencion::Enviada => {
                let missing = exencion.campos_snapshot_faltantes();
                if !missing.is_empty() {
                    return Err(EligibilityError::IncompleteFiscalData { missing }.into());
                }
                exencion.aprobar(hoy)?;
                self.exenciones.update(exencion.clone())?;
                info!(exencion = %exencion.id.0, "exemption approved");
                ResultadoAprobacion::Aprobada
            }
        };

        match self.pipeline.issue(&exencion) {
            Err(err) => {
                warn!(exencion = %exencion.id.0, error = %err, "certificate issuance failed");
                warnings.push(Warning::ArtifactGenerationFailed {
                    reason: err.to_string(),
                });
            }
            Ok((locator, bytes)) => {
                exencion.certificado = Some(locator);
                self.exenciones.update(exencion.clone())?;

                if let Some(to) = exencion
                    .email
                    .clone()
                    .filter(|e| valor_presente(Some(e.as_str())))
                {
                    let numero = exencion.numero_constancia();
                    let filename = format!("Constancia_{numero}.pdf");
                    let notice = Notificacion {
                        to: to.clone(),
                        subject: format!("Constancia de exención {numero}"),
                        text_body: format!(
                            "Hola {},\n\n\
                             Tu solicitud de exención impositiva fue aprobada.\n\
                             Adjuntamos la constancia en formato PDF.\n\n\
                             Secretaría de Cultura",
                            exencion.nombre_razon_social
                        ),
                        html_body: None,
                        attachment: Some(Adjunto::pdf(filename, bytes)),
                    };
                    if let Err(err) = self.notifier.send(notice) {
                        warn!(exencion = %exencion.id.0, error = %err, "certificate delivery failed");
                        warnings.push(Warning::delivery_failed(&to, &err));
                    }
                }
            }
        }

        Ok(ApprovalOutcome {
            exencion,
            resultado,
            warnings,
        })
    }

    pub fn rechazar(&self, id: &ExencionId) -> Result<Exencion, ExencionServiceError> {
        let mut exencion = self.fetch_exencion(id)?;
        exencion.rechazar()?;
        self.exenciones.update(exencion.clone())?;
        info!(exencion = %exencion.id.0, "exemption rejected");
        Ok(exencion)
    }

    /// Bulk approval over a selection, reporting per-row outcomes instead
    /// of failing the batch.
    pub fn approve_batch(&self, ids: &[ExencionId], hoy: NaiveDate) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for id in ids {
            match self.approve_and_issue(id, hoy) {
                Ok(approval) => match approval.resultado {
                    ResultadoAprobacion::Aprobada | ResultadoAprobacion::Reemitida => {
                        outcome.succeed(id.0.clone())
                    }
                    ResultadoAprobacion::YaEmitida => outcome.already(id.0.clone()),
                },
                Err(err) => outcome.reject(id.0.clone(), err.to_string()),
            }
        }
        outcome
    }
}
