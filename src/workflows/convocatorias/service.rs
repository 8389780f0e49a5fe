use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{
    Convocatoria, ConvocatoriaId, DetallesProyecto, EstadoPostulacion, Inscripcion, InscripcionId,
    Postulacion,
};
use super::rendicion::{Rendicion, RendicionId, RendicionStore};
use super::repository::{ConvocatoriaStore, InscripcionStore, PostulacionRepository};
use crate::registro::{
    check_eligible, check_fiscal_complete, email_de_contacto, EligibilityError, RegistryReader,
    UserId,
};
use crate::workflows::expedientes::documentos::{DocumentError, SubmissionService};
use crate::workflows::expedientes::domain::{
    BulkOutcome, CategoriaObservacion, Documento, DocumentKind, DocumentoId, Expediente,
    GetOrCreate, ObservacionId, PostulacionId, StoreError, SubsanadoTarget, TransitionError,
    UploadedFile,
};
use crate::workflows::expedientes::observaciones::{ObservacionEngine, RecordOutcome};

static POSTULACION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static INSCRIPCION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static RENDICION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_postulacion_id() -> PostulacionId {
    let id = POSTULACION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PostulacionId(format!("post-{id:06}"))
}

fn next_inscripcion_id() -> InscripcionId {
    let id = INSCRIPCION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    InscripcionId(format!("insc-{id:06}"))
}

fn next_rendicion_id() -> RendicionId {
    let id = RENDICION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RendicionId(format!("rend-{id:06}"))
}

#[derive(Debug, thiserror::Error)]
pub enum PostulacionServiceError {
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    #[error("convocatoria '{0}' is not open today")]
    CallClosed(String),
    #[error("document kind '{0}' does not apply to applications")]
    KindNotApplicable(&'static str),
    #[error("at least one confirmed project document is required to submit")]
    NoProjectDocuments,
    #[error("operation allowed only for the owner of the record")]
    Forbidden,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What starting the flow against a call produced, depending on its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InscribirseOutcome {
    Postulacion {
        postulacion: Postulacion,
        created: bool,
    },
    Curso {
        inscripcion: Inscripcion,
        created: bool,
    },
}

/// Observation recorded against an application, with the machine flip and
/// the best-effort notification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOutcome {
    pub postulacion: Postulacion,
    pub record: RecordOutcome,
}

/// Sanitized status exposed to operator tooling.
#[derive(Debug, Clone, Serialize)]
pub struct PostulacionView {
    pub id: String,
    pub convocatoria: String,
    pub estado: &'static str,
    pub fecha_envio: Option<DateTime<Utc>>,
    pub nombre_proyecto: Option<String>,
    pub documentos: usize,
    pub observaciones_pendientes: usize,
}

/// Façade composing the registry gate, the document sub-machine, the
/// observation engine, and the application/rendición stores.
pub struct PostulacionService {
    registry: Arc<dyn RegistryReader>,
    convocatorias: Arc<dyn ConvocatoriaStore>,
    postulaciones: Arc<dyn PostulacionRepository>,
    inscripciones: Arc<dyn InscripcionStore>,
    rendiciones: Arc<dyn RendicionStore>,
    documentos: SubmissionService,
    observaciones: ObservacionEngine,
}

impl PostulacionService {
    pub fn new(
        registry: Arc<dyn RegistryReader>,
        convocatorias: Arc<dyn ConvocatoriaStore>,
        postulaciones: Arc<dyn PostulacionRepository>,
        inscripciones: Arc<dyn InscripcionStore>,
        rendiciones: Arc<dyn RendicionStore>,
        documentos: SubmissionService,
        observaciones: ObservacionEngine,
    ) -> Self {
        Self {
            registry,
            convocatorias,
            postulaciones,
            inscripciones,
            rendiciones,
            documentos,
            observaciones,
        }
    }

    fn fetch_postulacion(
        &self,
        id: &PostulacionId,
    ) -> Result<Postulacion, PostulacionServiceError> {
        Ok(self.postulaciones.fetch(id)?.ok_or(StoreError::NotFound)?)
    }

    fn owned(
        &self,
        id: &PostulacionId,
        by: &UserId,
    ) -> Result<Postulacion, PostulacionServiceError> {
        let postulacion = self.fetch_postulacion(id)?;
        if postulacion.user != *by {
            return Err(PostulacionServiceError::Forbidden);
        }
        Ok(postulacion)
    }

    fn contact_for(&self, user: &UserId) -> Option<String> {
        let persona = check_eligible(self.registry.as_ref(), user).ok()?;
        email_de_contacto(self.registry.as_ref(), &persona)
    }

    /// Entry point of the flow: gate eligibility and the call window, then
    /// get-or-create either an application or a simple enrollment depending
    /// on the call's line.
    pub fn inscribirse(
        &self,
        user: &UserId,
        convocatoria_id: &ConvocatoriaId,
        now: DateTime<Utc>,
    ) -> Result<InscribirseOutcome, PostulacionServiceError> {
        let convocatoria = self
            .convocatorias
            .fetch(convocatoria_id)?
            .ok_or(StoreError::NotFound)?;
        if !convocatoria.is_open(now.date_naive()) {
            return Err(PostulacionServiceError::CallClosed(convocatoria.id.0));
        }

        let persona = check_eligible(self.registry.as_ref(), user)?;
        check_fiscal_complete(&persona)?;

        if convocatoria.linea.enrollment_only() {
            let inscripcion = Inscripcion {
                id: next_inscripcion_id(),
                user: user.clone(),
                convocatoria: convocatoria.id.clone(),
                fecha_creacion: now,
            };
            let outcome = self.inscripciones.create_if_absent(inscripcion)?;
            let created = outcome.was_created();
            return Ok(InscribirseOutcome::Curso {
                inscripcion: outcome.into_inner(),
                created,
            });
        }

        let postulacion = Postulacion::new(
            next_postulacion_id(),
            user.clone(),
            convocatoria.id.clone(),
            now,
        );
        let outcome = self.postulaciones.create_if_absent(postulacion)?;
        let created = outcome.was_created();
        if created {
            info!(
                user = %user.0,
                convocatoria = %convocatoria.id.0,
                "application draft created"
            );
        }
        Ok(InscribirseOutcome::Postulacion {
            postulacion: outcome.into_inner(),
            created,
        })
    }

    /// Project form, editable only while the application is a draft.
    pub fn set_project_details(
        &self,
        id: &PostulacionId,
        by: &UserId,
        detalles: DetallesProyecto,
    ) -> Result<Postulacion, PostulacionServiceError> {
        let mut postulacion = self.owned(id, by)?;
        if postulacion.estado != EstadoPostulacion::Borrador {
            return Err(TransitionError::InvalidState {
                from: postulacion.estado.label(),
                attempted: "editar_borrador",
            }
            .into());
        }
        postulacion.nombre_proyecto = detalles.nombre_proyecto;
        postulacion.tipo_proyecto = detalles.tipo_proyecto;
        postulacion.genero = detalles.genero;
        postulacion.duracion_minutos = detalles.duracion_minutos;
        postulacion.declaracion_jurada = detalles.declaracion_jurada;
        self.postulaciones.update(postulacion.clone())?;
        Ok(postulacion)
    }

    pub fn upload_document(
        &self,
        id: &PostulacionId,
        by: &UserId,
        kind: DocumentKind,
        file: UploadedFile,
        now: DateTime<Utc>,
    ) -> Result<Documento, PostulacionServiceError> {
        if matches!(kind, DocumentKind::Exencion) {
            return Err(PostulacionServiceError::KindNotApplicable(kind.slug()));
        }
        let postulacion = self.owned(id, by)?;
        let es_subsanacion = matches!(kind, DocumentKind::Subsanado(_));
        Ok(self.documentos.upload(
            Expediente::Postulacion(postulacion.id),
            by,
            kind,
            file,
            es_subsanacion,
            now,
        )?)
    }

    pub fn delete_document(
        &self,
        documento: &DocumentoId,
        by: &UserId,
    ) -> Result<(), PostulacionServiceError> {
        Ok(self.documentos.delete(documento, by)?)
    }

    pub fn confirm_documents(
        &self,
        id: &PostulacionId,
        by: &UserId,
        kind: DocumentKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<Documento>, PostulacionServiceError> {
        if matches!(kind, DocumentKind::Exencion) {
            return Err(PostulacionServiceError::KindNotApplicable(kind.slug()));
        }
        let postulacion = self.owned(id, by)?;
        Ok(self
            .documentos
            .confirm_batch(&Expediente::Postulacion(postulacion.id), kind, now)?)
    }

    /// `borrador → enviado`: guards run first so nothing is confirmed when
    /// the flip is going to be rejected, then the final project batch is
    /// confirmed immediately before the status change.
    pub fn submit(
        &self,
        id: &PostulacionId,
        by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Postulacion, PostulacionServiceError> {
        let mut postulacion = self.owned(id, by)?;
        let convocatoria = self
            .convocatorias
            .fetch(&postulacion.convocatoria)?
            .ok_or(StoreError::NotFound)?;

        if postulacion.estado != EstadoPostulacion::Borrador {
            return Err(TransitionError::InvalidState {
                from: postulacion.estado.label(),
                attempted: "enviado",
            }
            .into());
        }
        if convocatoria.linea.requires_project() {
            let missing = postulacion.campos_proyecto_faltantes();
            if !missing.is_empty() {
                return Err(TransitionError::ProjectDataMissing { missing }.into());
            }
        }

        let expediente = Expediente::Postulacion(postulacion.id.clone());
        match self
            .documentos
            .confirm_batch(&expediente, DocumentKind::Proyecto, now)
        {
            Ok(_) => {}
            Err(DocumentError::NothingPending { .. }) => {
                if !self
                    .documentos
                    .has_confirmed(&expediente, DocumentKind::Proyecto)?
                {
                    return Err(PostulacionServiceError::NoProjectDocuments);
                }
            }
            Err(err) => return Err(err.into()),
        }

        postulacion.submit(convocatoria.linea.requires_project(), now)?;
        self.postulaciones.update(postulacion.clone())?;
        info!(postulacion = %postulacion.id.0, "application submitted");
        Ok(postulacion)
    }

    /// Applicant confirms a correction batch: documents flip to sent, every
    /// unresolved observation resolves, and the application returns to
    /// administrative review.
    pub fn submit_correction(
        &self,
        id: &PostulacionId,
        by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Postulacion, PostulacionServiceError> {
        let mut postulacion = self.owned(id, by)?;
        if postulacion.estado != EstadoPostulacion::Observado {
            return Err(TransitionError::InvalidState {
                from: postulacion.estado.label(),
                attempted: "revision_admin",
            }
            .into());
        }

        let expediente = Expediente::Postulacion(postulacion.id.clone());
        self.documentos.confirm_batch(
            &expediente,
            DocumentKind::Subsanado(SubsanadoTarget::Admin),
            now,
        )?;
        self.observaciones.resolve_on_correction(&expediente)?;
        postulacion.return_to_review()?;
        self.postulaciones.update(postulacion.clone())?;
        info!(postulacion = %postulacion.id.0, "correction submitted");
        Ok(postulacion)
    }

    pub fn pick_up_for_review(
        &self,
        id: &PostulacionId,
    ) -> Result<Postulacion, PostulacionServiceError> {
        let mut postulacion = self.fetch_postulacion(id)?;
        postulacion.pick_up_for_review()?;
        self.postulaciones.update(postulacion.clone())?;
        Ok(postulacion)
    }

    /// Record an observation. Flips `revision_admin → observado`; further
    /// observations while already observed leave the state alone.
    pub fn observe(
        &self,
        id: &PostulacionId,
        categoria: CategoriaObservacion,
        descripcion: &str,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<ObserveOutcome, PostulacionServiceError> {
        let mut postulacion = self.fetch_postulacion(id)?;
        match postulacion.estado {
            EstadoPostulacion::RevisionAdmin => {
                postulacion.observe()?;
                self.postulaciones.update(postulacion.clone())?;
            }
            EstadoPostulacion::Observado => {}
            _ => {
                return Err(TransitionError::InvalidState {
                    from: postulacion.estado.label(),
                    attempted: "observado",
                }
                .into())
            }
        }

        let contacto = self.contact_for(&postulacion.user);
        let record = self.observaciones.record(
            &Expediente::Postulacion(postulacion.id.clone()),
            None,
            categoria,
            descripcion,
            admin,
            contacto.as_deref(),
            now,
        )?;
        Ok(ObserveOutcome {
            postulacion,
            record,
        })
    }

    /// Edit an existing observation; the engine re-notifies only on
    /// material change.
    pub fn edit_observation(
        &self,
        observacion: &ObservacionId,
        categoria: CategoriaObservacion,
        descripcion: &str,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, PostulacionServiceError> {
        let previa = self
            .observaciones
            .observacion(observacion)?
            .ok_or(StoreError::NotFound)?;
        let Expediente::Postulacion(postulacion_id) = &previa.expediente else {
            return Err(StoreError::NotFound.into());
        };
        let postulacion = self.fetch_postulacion(postulacion_id)?;
        let contacto = self.contact_for(&postulacion.user);
        Ok(self.observaciones.record(
            &previa.expediente,
            Some(observacion),
            categoria,
            descripcion,
            admin,
            contacto.as_deref(),
            now,
        )?)
    }

    pub fn admit(&self, id: &PostulacionId) -> Result<Postulacion, PostulacionServiceError> {
        let mut postulacion = self.fetch_postulacion(id)?;
        postulacion.admit()?;
        self.postulaciones.update(postulacion.clone())?;
        Ok(postulacion)
    }

    pub fn hand_to_jury(&self, id: &PostulacionId) -> Result<Postulacion, PostulacionServiceError> {
        let mut postulacion = self.fetch_postulacion(id)?;
        postulacion.hand_to_jury()?;
        self.postulaciones.update(postulacion.clone())?;
        Ok(postulacion)
    }

    /// Jury decision. Entering `seleccionado` lazily opens the expense
    /// report (idempotent one-to-one).
    pub fn decide(
        &self,
        id: &PostulacionId,
        selected: bool,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Postulacion, PostulacionServiceError> {
        let mut postulacion = self.fetch_postulacion(id)?;
        postulacion.decide(selected)?;
        self.postulaciones.update(postulacion.clone())?;
        if selected {
            self.ensure_rendicion(&postulacion, admin, now)?;
        }
        info!(
            postulacion = %postulacion.id.0,
            estado = postulacion.estado.label(),
            "jury decision recorded"
        );
        Ok(postulacion)
    }

    fn ensure_rendicion(
        &self,
        postulacion: &Postulacion,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<GetOrCreate<Rendicion>, StoreError> {
        let nueva = Rendicion::new(
            next_rendicion_id(),
            postulacion.id.clone(),
            postulacion.user.clone(),
            actor,
            now,
        );
        match self.rendiciones.create_if_absent(nueva)? {
            GetOrCreate::Created(rendicion) => Ok(GetOrCreate::Created(rendicion)),
            GetOrCreate::Existing(mut rendicion) => {
                if rendicion.user != postulacion.user {
                    rendicion.user = postulacion.user.clone();
                    rendicion.log_event(actor, "resincronizacion", "owner re-synced", now);
                    self.rendiciones.update(rendicion.clone())?;
                }
                Ok(GetOrCreate::Existing(rendicion))
            }
        }
    }

    /// Bulk "open expense report for selected applications". Rows that are
    /// not selected are reported, never a batch-wide failure.
    pub fn create_rendiciones(
        &self,
        ids: &[PostulacionId],
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for id in ids {
            match self.postulaciones.fetch(id) {
                Err(err) => outcome.reject(id.0.clone(), err.to_string()),
                Ok(None) => outcome.reject(id.0.clone(), "not found"),
                Ok(Some(postulacion)) => {
                    if postulacion.estado != EstadoPostulacion::Seleccionado {
                        outcome.reject(
                            id.0.clone(),
                            format!("estado '{}' is not 'seleccionado'", postulacion.estado.label()),
                        );
                        continue;
                    }
                    match self.ensure_rendicion(&postulacion, admin, now) {
                        Ok(GetOrCreate::Created(_)) => outcome.succeed(id.0.clone()),
                        Ok(GetOrCreate::Existing(_)) => outcome.already(id.0.clone()),
                        Err(err) => outcome.reject(id.0.clone(), err.to_string()),
                    }
                }
            }
        }
        outcome
    }

    pub fn rendicion(
        &self,
        postulacion: &PostulacionId,
    ) -> Result<Option<Rendicion>, PostulacionServiceError> {
        Ok(self.rendiciones.fetch_by_postulacion(postulacion)?)
    }

    pub fn submit_rendicion(
        &self,
        postulacion: &PostulacionId,
        by: &UserId,
        link: Option<String>,
        remarks: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        if rendicion.user != *by {
            return Err(PostulacionServiceError::Forbidden);
        }
        rendicion.submit_digital(link, remarks, by, now)?;
        self.rendiciones.update(rendicion.clone())?;
        Ok(rendicion)
    }

    pub fn observe_rendicion(
        &self,
        postulacion: &PostulacionId,
        remarks: String,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        rendicion.observe_digital(remarks, admin, now)?;
        self.rendiciones.update(rendicion.clone())?;
        Ok(rendicion)
    }

    pub fn subsanar_rendicion(
        &self,
        postulacion: &PostulacionId,
        by: &UserId,
        link: Option<String>,
        remarks: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        if rendicion.user != *by {
            return Err(PostulacionServiceError::Forbidden);
        }
        rendicion.subsanar_digital(link, remarks, by, now)?;
        self.rendiciones.update(rendicion.clone())?;
        Ok(rendicion)
    }

    /// Approving the digital track closes the report and finalizes the
    /// owning application.
    pub fn approve_rendicion(
        &self,
        postulacion: &PostulacionId,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        rendicion.approve_digital(admin, now)?;
        self.rendiciones.update(rendicion.clone())?;

        let mut owner = self.fetch_postulacion(&rendicion.postulacion)?;
        owner.finalize()?;
        self.postulaciones.update(owner)?;
        info!(postulacion = %rendicion.postulacion.0, "expense report closed");
        Ok(rendicion)
    }

    pub fn reject_rendicion(
        &self,
        postulacion: &PostulacionId,
        remarks: String,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        rendicion.reject_digital(remarks, admin, now)?;
        self.rendiciones.update(rendicion.clone())?;
        Ok(rendicion)
    }

    pub fn receive_physical(
        &self,
        postulacion: &PostulacionId,
        fecha: NaiveDate,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        rendicion.receive_physical(fecha, admin, now)?;
        self.rendiciones.update(rendicion.clone())?;
        Ok(rendicion)
    }

    pub fn observe_physical(
        &self,
        postulacion: &PostulacionId,
        remarks: String,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        rendicion.observe_physical(remarks, admin, now)?;
        self.rendiciones.update(rendicion.clone())?;
        Ok(rendicion)
    }

    pub fn approve_physical(
        &self,
        postulacion: &PostulacionId,
        admin: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Rendicion, PostulacionServiceError> {
        let mut rendicion = self
            .rendiciones
            .fetch_by_postulacion(postulacion)?
            .ok_or(StoreError::NotFound)?;
        rendicion.approve_physical(admin, now)?;
        self.rendiciones.update(rendicion.clone())?;
        Ok(rendicion)
    }

    pub fn postulacion(
        &self,
        id: &PostulacionId,
    ) -> Result<Postulacion, PostulacionServiceError> {
        self.fetch_postulacion(id)
    }

    pub fn convocatoria(
        &self,
        id: &ConvocatoriaId,
    ) -> Result<Option<Convocatoria>, PostulacionServiceError> {
        Ok(self.convocatorias.fetch(id)?)
    }

    pub fn documentos_de(
        &self,
        id: &PostulacionId,
    ) -> Result<Vec<Documento>, PostulacionServiceError> {
        Ok(self
            .documentos
            .documentos(&Expediente::Postulacion(id.clone()))?)
    }

    pub fn remaining_quota(
        &self,
        id: &PostulacionId,
        kind: DocumentKind,
    ) -> Result<usize, PostulacionServiceError> {
        Ok(self
            .documentos
            .remaining(&Expediente::Postulacion(id.clone()), kind)?)
    }

    pub fn observaciones_de(
        &self,
        id: &PostulacionId,
    ) -> Result<Vec<crate::workflows::expedientes::domain::Observacion>, PostulacionServiceError>
    {
        Ok(self
            .observaciones
            .for_expediente(&Expediente::Postulacion(id.clone()))?)
    }

    pub fn status_view(
        &self,
        id: &PostulacionId,
    ) -> Result<PostulacionView, PostulacionServiceError> {
        let postulacion = self.fetch_postulacion(id)?;
        let expediente = Expediente::Postulacion(postulacion.id.clone());
        let observaciones = self.observaciones.for_expediente(&expediente)?;
        let documentos = self.documentos.documentos(&expediente)?;
        Ok(PostulacionView {
            id: postulacion.id.0,
            convocatoria: postulacion.convocatoria.0,
            estado: postulacion.estado.label(),
            fecha_envio: postulacion.fecha_envio,
            nombre_proyecto: postulacion.nombre_proyecto,
            documentos: documentos.len(),
            observaciones_pendientes: observaciones.iter().filter(|o| !o.subsanada).count(),
        })
    }
}
