//! Administrative observation engine.
//!
//! Persists correction requests and dispatches the applicant notice exactly
//! once per semantically new observation: a notification goes out only when
//! the row is unresolved and either newly created or materially different
//! from the previously persisted (categoria, descripcion, subsanada) triple.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{
    CategoriaObservacion, Expediente, Observacion, ObservacionId, StoreError,
};
use crate::config::LinksConfig;
use crate::notificaciones::{Notificacion, NotificationSender, Warning};
use crate::registro::UserId;

static OBSERVACION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_observacion_id() -> ObservacionId {
    let id = OBSERVACION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ObservacionId(format!("obs-{id:06}"))
}

pub trait ObservacionStore: Send + Sync {
    fn insert(&self, observacion: Observacion) -> Result<Observacion, StoreError>;
    fn fetch(&self, id: &ObservacionId) -> Result<Option<Observacion>, StoreError>;
    fn update(&self, observacion: Observacion) -> Result<(), StoreError>;
    fn unresolved_for(&self, expediente: &Expediente) -> Result<Vec<Observacion>, StoreError>;
    fn for_expediente(&self, expediente: &Expediente) -> Result<Vec<Observacion>, StoreError>;
}

/// Two-phase result: the durable row plus what happened on the best-effort
/// notification side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub observacion: Observacion,
    pub notified: bool,
    pub warnings: Vec<Warning>,
}

pub struct ObservacionEngine {
    store: Arc<dyn ObservacionStore>,
    notifier: Arc<dyn NotificationSender>,
    links: LinksConfig,
}

impl ObservacionEngine {
    pub fn new(
        store: Arc<dyn ObservacionStore>,
        notifier: Arc<dyn NotificationSender>,
        links: LinksConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            links,
        }
    }

    /// Create (`observacion_id = None`) or edit an observation. `contacto`
    /// is the applicant's derived contact address; without one the notice is
    /// reported as undeliverable but the row still persists.
    pub fn record(
        &self,
        expediente: &Expediente,
        observacion_id: Option<&ObservacionId>,
        categoria: CategoriaObservacion,
        descripcion: &str,
        creada_por: &UserId,
        contacto: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, StoreError> {
        match observacion_id {
            None => {
                let observacion = self.store.insert(Observacion {
                    id: next_observacion_id(),
                    expediente: expediente.clone(),
                    categoria,
                    descripcion: descripcion.to_string(),
                    creada_por: creada_por.clone(),
                    fecha_creacion: now,
                    subsanada: false,
                })?;
                info!(
                    observacion = %observacion.id.0,
                    expediente = expediente.id_str(),
                    categoria = categoria.label(),
                    "observation recorded"
                );
                let (notified, warnings) = self.notify(&observacion, contacto);
                Ok(RecordOutcome {
                    observacion,
                    notified,
                    warnings,
                })
            }
            Some(id) => {
                let previa = self.store.fetch(id)?.ok_or(StoreError::NotFound)?;
                if previa.expediente != *expediente {
                    return Err(StoreError::NotFound);
                }

                let cambio =
                    previa.categoria != categoria || previa.descripcion != descripcion;
                let observacion = Observacion {
                    categoria,
                    descripcion: descripcion.to_string(),
                    ..previa
                };
                if cambio {
                    self.store.update(observacion.clone())?;
                }

                if cambio && !observacion.subsanada {
                    let (notified, warnings) = self.notify(&observacion, contacto);
                    Ok(RecordOutcome {
                        observacion,
                        notified,
                        warnings,
                    })
                } else {
                    Ok(RecordOutcome {
                        observacion,
                        notified: false,
                        warnings: Vec::new(),
                    })
                }
            }
        }
    }

    pub fn observacion(&self, id: &ObservacionId) -> Result<Option<Observacion>, StoreError> {
        self.store.fetch(id)
    }

    pub fn for_expediente(&self, expediente: &Expediente) -> Result<Vec<Observacion>, StoreError> {
        self.store.for_expediente(expediente)
    }

    pub fn has_unresolved(&self, expediente: &Expediente) -> Result<bool, StoreError> {
        Ok(!self.store.unresolved_for(expediente)?.is_empty())
    }

    /// Mark every unresolved observation of the expediente as corrected.
    /// Resolution is monotonic; rows already resolved are untouched.
    pub fn resolve_on_correction(&self, expediente: &Expediente) -> Result<usize, StoreError> {
        let pendientes = self.store.unresolved_for(expediente)?;
        let resueltas = pendientes.len();
        for mut observacion in pendientes {
            observacion.subsanada = true;
            self.store.update(observacion)?;
        }
        if resueltas > 0 {
            info!(
                expediente = expediente.id_str(),
                resueltas, "observations resolved by correction batch"
            );
        }
        Ok(resueltas)
    }

    fn correction_link(&self, expediente: &Expediente) -> String {
        match expediente {
            Expediente::Postulacion(id) => self.links.subsanacion_postulacion(&id.0),
            Expediente::Exencion(id) => self.links.subsanacion_exencion(&id.0),
        }
    }

    fn notify(&self, observacion: &Observacion, contacto: Option<&str>) -> (bool, Vec<Warning>) {
        let Some(to) = contacto else {
            return (
                false,
                vec![Warning::NotificationDeliveryFailed {
                    to: String::new(),
                    reason: "no contact address on file".to_string(),
                }],
            );
        };

        let link = self.correction_link(&observacion.expediente);
        let notice = Notificacion {
            to: to.to_string(),
            subject: "Documentación observada".to_string(),
            text_body: format!(
                "Tu trámite tiene documentación observada ({}): {}\n\n\
                 Ingresá para subsanarla: {}",
                observacion.categoria.label(),
                observacion.descripcion,
                link
            ),
            html_body: None,
            attachment: None,
        };

        match self.notifier.send(notice) {
            Ok(()) => (true, Vec::new()),
            Err(err) => {
                warn!(
                    expediente = observacion.expediente.id_str(),
                    error = %err,
                    "observation notice could not be delivered"
                );
                (false, vec![Warning::delivery_failed(to, &err)])
            }
        }
    }
}
