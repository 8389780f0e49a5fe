//! In-memory implementations of every storage and collaborator boundary.
//! They back the demo commands, the dev server, and the test suites; each
//! collection serializes behind its own mutex, which is what gives the
//! check-then-insert operations (quota, get-or-create) their atomicity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::notificaciones::{Notificacion, NotificationError, NotificationSender};
use crate::registro::{PersonaHumana, PersonaJuridica, RegistryReader, UserId};
use crate::workflows::convocatorias::domain::{Convocatoria, ConvocatoriaId, Inscripcion, Postulacion};
use crate::workflows::convocatorias::rendicion::{Rendicion, RendicionStore};
use crate::workflows::convocatorias::repository::{
    ConvocatoriaStore, InscripcionStore, PostulacionRepository,
};
use crate::workflows::exencion::certificado::{
    CertificadoContexto, CertificateRenderer, RenderError,
};
use crate::workflows::exencion::domain::Exencion;
use crate::workflows::exencion::repository::ExencionRepository;
use crate::workflows::expedientes::documentos::{
    BlobError, BlobStore, DocumentStore, InsertOutcome,
};
use crate::workflows::expedientes::domain::{
    BlobLocator, Documento, DocumentKind, DocumentoId, Expediente, ExencionId, GetOrCreate,
    Observacion, ObservacionId, PostulacionId, StoreError, SubmissionStatus,
};
use crate::workflows::expedientes::observaciones::ObservacionStore;

#[derive(Default)]
pub struct MemoriaRegistro {
    humanas: Mutex<HashMap<UserId, PersonaHumana>>,
    juridicas: Mutex<HashMap<UserId, PersonaJuridica>>,
    cuentas: Mutex<HashMap<UserId, String>>,
}

impl MemoriaRegistro {
    pub fn agregar_humana(&self, persona: PersonaHumana) {
        self.humanas
            .lock()
            .expect("registry mutex poisoned")
            .insert(persona.user.clone(), persona);
    }

    pub fn agregar_juridica(&self, persona: PersonaJuridica) {
        self.juridicas
            .lock()
            .expect("registry mutex poisoned")
            .insert(persona.user.clone(), persona);
    }

    pub fn set_account_email(&self, user: UserId, email: impl Into<String>) {
        self.cuentas
            .lock()
            .expect("registry mutex poisoned")
            .insert(user, email.into());
    }
}

impl RegistryReader for MemoriaRegistro {
    fn persona_humana(&self, user: &UserId) -> Option<PersonaHumana> {
        self.humanas
            .lock()
            .expect("registry mutex poisoned")
            .get(user)
            .cloned()
    }

    fn persona_juridica(&self, user: &UserId) -> Option<PersonaJuridica> {
        self.juridicas
            .lock()
            .expect("registry mutex poisoned")
            .get(user)
            .cloned()
    }

    fn account_email(&self, user: &UserId) -> Option<String> {
        self.cuentas
            .lock()
            .expect("registry mutex poisoned")
            .get(user)
            .cloned()
    }
}

#[derive(Default)]
pub struct MemoriaConvocatorias {
    rows: Mutex<HashMap<ConvocatoriaId, Convocatoria>>,
}

impl ConvocatoriaStore for MemoriaConvocatorias {
    fn insert(&self, convocatoria: Convocatoria) -> Result<Convocatoria, StoreError> {
        let mut guard = self.rows.lock().expect("convocatoria mutex poisoned");
        if guard.contains_key(&convocatoria.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(convocatoria.id.clone(), convocatoria.clone());
        Ok(convocatoria)
    }

    fn fetch(&self, id: &ConvocatoriaId) -> Result<Option<Convocatoria>, StoreError> {
        let guard = self.rows.lock().expect("convocatoria mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Convocatoria>, StoreError> {
        let guard = self.rows.lock().expect("convocatoria mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoriaPostulaciones {
    rows: Mutex<HashMap<PostulacionId, Postulacion>>,
}

impl PostulacionRepository for MemoriaPostulaciones {
    fn create_if_absent(
        &self,
        postulacion: Postulacion,
    ) -> Result<GetOrCreate<Postulacion>, StoreError> {
        let mut guard = self.rows.lock().expect("postulacion mutex poisoned");
        if let Some(existing) = guard
            .values()
            .find(|p| p.user == postulacion.user && p.convocatoria == postulacion.convocatoria)
        {
            return Ok(GetOrCreate::Existing(existing.clone()));
        }
        guard.insert(postulacion.id.clone(), postulacion.clone());
        Ok(GetOrCreate::Created(postulacion))
    }

    fn fetch(&self, id: &PostulacionId) -> Result<Option<Postulacion>, StoreError> {
        let guard = self.rows.lock().expect("postulacion mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, postulacion: Postulacion) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("postulacion mutex poisoned");
        if !guard.contains_key(&postulacion.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(postulacion.id.clone(), postulacion);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Postulacion>, StoreError> {
        let guard = self.rows.lock().expect("postulacion mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn find_by_user_and_convocatoria(
        &self,
        user: &UserId,
        convocatoria: &ConvocatoriaId,
    ) -> Result<Option<Postulacion>, StoreError> {
        let guard = self.rows.lock().expect("postulacion mutex poisoned");
        Ok(guard
            .values()
            .find(|p| p.user == *user && p.convocatoria == *convocatoria)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoriaInscripciones {
    rows: Mutex<Vec<Inscripcion>>,
}

impl InscripcionStore for MemoriaInscripciones {
    fn create_if_absent(
        &self,
        inscripcion: Inscripcion,
    ) -> Result<GetOrCreate<Inscripcion>, StoreError> {
        let mut guard = self.rows.lock().expect("inscripcion mutex poisoned");
        if let Some(existing) = guard
            .iter()
            .find(|i| i.user == inscripcion.user && i.convocatoria == inscripcion.convocatoria)
        {
            return Ok(GetOrCreate::Existing(existing.clone()));
        }
        guard.push(inscripcion.clone());
        Ok(GetOrCreate::Created(inscripcion))
    }

    fn list(&self) -> Result<Vec<Inscripcion>, StoreError> {
        let guard = self.rows.lock().expect("inscripcion mutex poisoned");
        Ok(guard.clone())
    }
}

#[derive(Default)]
pub struct MemoriaDocumentos {
    rows: Mutex<HashMap<DocumentoId, Documento>>,
}

impl MemoriaDocumentos {
    fn bucket_count(guard: &HashMap<DocumentoId, Documento>, expediente: &Expediente, kind: DocumentKind) -> usize {
        guard
            .values()
            .filter(|d| d.expediente == *expediente && d.kind.slug() == kind.slug())
            .count()
    }
}

impl DocumentStore for MemoriaDocumentos {
    fn insert_within_quota(
        &self,
        documento: Documento,
        max_active: usize,
    ) -> Result<InsertOutcome, StoreError> {
        let mut guard = self.rows.lock().expect("documento mutex poisoned");
        let active = Self::bucket_count(&guard, &documento.expediente, documento.kind);
        if active >= max_active {
            return Ok(InsertOutcome::QuotaExhausted {
                remaining: max_active.saturating_sub(active),
            });
        }
        guard.insert(documento.id.clone(), documento.clone());
        Ok(InsertOutcome::Inserted(documento))
    }

    fn fetch(&self, id: &DocumentoId) -> Result<Option<Documento>, StoreError> {
        let guard = self.rows.lock().expect("documento mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &DocumentoId) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("documento mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn active_count(
        &self,
        expediente: &Expediente,
        kind: DocumentKind,
    ) -> Result<usize, StoreError> {
        let guard = self.rows.lock().expect("documento mutex poisoned");
        Ok(Self::bucket_count(&guard, expediente, kind))
    }

    fn confirm_pending(
        &self,
        expediente: &Expediente,
        kind: DocumentKind,
        at: DateTime<Utc>,
    ) -> Result<Vec<Documento>, StoreError> {
        let mut guard = self.rows.lock().expect("documento mutex poisoned");
        let mut confirmados = Vec::new();
        for documento in guard.values_mut() {
            if documento.expediente == *expediente
                && documento.kind.slug() == kind.slug()
                && documento.estado == SubmissionStatus::Pendiente
            {
                documento.estado = SubmissionStatus::Enviado;
                documento.fecha_envio = Some(at);
                confirmados.push(documento.clone());
            }
        }
        Ok(confirmados)
    }

    fn for_expediente(&self, expediente: &Expediente) -> Result<Vec<Documento>, StoreError> {
        let guard = self.rows.lock().expect("documento mutex poisoned");
        Ok(guard
            .values()
            .filter(|d| d.expediente == *expediente)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoriaObservaciones {
    rows: Mutex<HashMap<ObservacionId, Observacion>>,
}

impl ObservacionStore for MemoriaObservaciones {
    fn insert(&self, observacion: Observacion) -> Result<Observacion, StoreError> {
        let mut guard = self.rows.lock().expect("observacion mutex poisoned");
        if guard.contains_key(&observacion.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(observacion.id.clone(), observacion.clone());
        Ok(observacion)
    }

    fn fetch(&self, id: &ObservacionId) -> Result<Option<Observacion>, StoreError> {
        let guard = self.rows.lock().expect("observacion mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, observacion: Observacion) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("observacion mutex poisoned");
        if !guard.contains_key(&observacion.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(observacion.id.clone(), observacion);
        Ok(())
    }

    fn unresolved_for(&self, expediente: &Expediente) -> Result<Vec<Observacion>, StoreError> {
        let guard = self.rows.lock().expect("observacion mutex poisoned");
        Ok(guard
            .values()
            .filter(|o| o.expediente == *expediente && !o.subsanada)
            .cloned()
            .collect())
    }

    fn for_expediente(&self, expediente: &Expediente) -> Result<Vec<Observacion>, StoreError> {
        let guard = self.rows.lock().expect("observacion mutex poisoned");
        Ok(guard
            .values()
            .filter(|o| o.expediente == *expediente)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoriaRendiciones {
    rows: Mutex<HashMap<PostulacionId, Rendicion>>,
}

impl RendicionStore for MemoriaRendiciones {
    fn create_if_absent(&self, rendicion: Rendicion) -> Result<GetOrCreate<Rendicion>, StoreError> {
        let mut guard = self.rows.lock().expect("rendicion mutex poisoned");
        if let Some(existing) = guard.get(&rendicion.postulacion) {
            return Ok(GetOrCreate::Existing(existing.clone()));
        }
        guard.insert(rendicion.postulacion.clone(), rendicion.clone());
        Ok(GetOrCreate::Created(rendicion))
    }

    fn fetch_by_postulacion(&self, id: &PostulacionId) -> Result<Option<Rendicion>, StoreError> {
        let guard = self.rows.lock().expect("rendicion mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, rendicion: Rendicion) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("rendicion mutex poisoned");
        if !guard.contains_key(&rendicion.postulacion) {
            return Err(StoreError::NotFound);
        }
        guard.insert(rendicion.postulacion.clone(), rendicion);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoriaExenciones {
    rows: Mutex<HashMap<ExencionId, Exencion>>,
}

impl ExencionRepository for MemoriaExenciones {
    fn create_if_absent(&self, exencion: Exencion) -> Result<GetOrCreate<Exencion>, StoreError> {
        let mut guard = self.rows.lock().expect("exencion mutex poisoned");
        if let Some(existing) = guard
            .values()
            .find(|e| e.user == exencion.user && e.convocatoria == exencion.convocatoria)
        {
            return Ok(GetOrCreate::Existing(existing.clone()));
        }
        guard.insert(exencion.id.clone(), exencion.clone());
        Ok(GetOrCreate::Created(exencion))
    }

    fn fetch(&self, id: &ExencionId) -> Result<Option<Exencion>, StoreError> {
        let guard = self.rows.lock().expect("exencion mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, exencion: Exencion) -> Result<(), StoreError> {
        let mut guard = self.rows.lock().expect("exencion mutex poisoned");
        if !guard.contains_key(&exencion.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(exencion.id.clone(), exencion);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Exencion>, StoreError> {
        let guard = self.rows.lock().expect("exencion mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoriaBlobs {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoriaBlobs {
    pub fn cantidad(&self) -> usize {
        self.blobs.lock().expect("blob mutex poisoned").len()
    }

    pub fn contiene(&self, name: &str) -> bool {
        self.blobs
            .lock()
            .expect("blob mutex poisoned")
            .contains_key(name)
    }
}

impl BlobStore for MemoriaBlobs {
    fn store(&self, bytes: &[u8], name: &str) -> Result<BlobLocator, BlobError> {
        self.blobs
            .lock()
            .expect("blob mutex poisoned")
            .insert(name.to_string(), bytes.to_vec());
        Ok(BlobLocator(name.to_string()))
    }

    fn fetch(&self, locator: &BlobLocator) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .expect("blob mutex poisoned")
            .get(&locator.0)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(locator.0.clone()))
    }
}

/// Notification buffer with a failure switch for exercising the warning
/// channel.
#[derive(Default)]
pub struct BuzonNotificaciones {
    enviadas: Mutex<Vec<Notificacion>>,
    fallar: AtomicBool,
}

impl BuzonNotificaciones {
    pub fn enviadas(&self) -> Vec<Notificacion> {
        self.enviadas.lock().expect("buzon mutex poisoned").clone()
    }

    pub fn fallar(&self, value: bool) {
        self.fallar.store(value, Ordering::SeqCst);
    }
}

impl NotificationSender for BuzonNotificaciones {
    fn send(&self, notice: Notificacion) -> Result<(), NotificationError> {
        if self.fallar.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport(
                "smtp relay unavailable".to_string(),
            ));
        }
        self.enviadas
            .lock()
            .expect("buzon mutex poisoned")
            .push(notice);
        Ok(())
    }
}

/// Plain-text stand-in for the PDF engine, with a one-shot failure counter
/// for exercising issuance retries.
#[derive(Default)]
pub struct RenderizadorConstancias {
    fallas_pendientes: AtomicUsize,
}

impl RenderizadorConstancias {
    pub fn fallar_una_vez(&self) {
        self.fallas_pendientes.fetch_add(1, Ordering::SeqCst);
    }
}

impl CertificateRenderer for RenderizadorConstancias {
    fn render(&self, contexto: &CertificadoContexto) -> Result<Vec<u8>, RenderError> {
        if self
            .fallas_pendientes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RenderError::Failed("renderer offline".to_string()));
        }
        let cuerpo = format!(
            "CONSTANCIA DE EXENCION {}\n{} — CUIT {}\n{} ({}) CP {}\nActividad: {}\nEmitida: {} — Vence: {}\n",
            contexto.numero,
            contexto.nombre_razon_social,
            contexto.cuit,
            contexto.domicilio_fiscal,
            contexto.localidad_fiscal,
            contexto.codigo_postal_fiscal,
            contexto.actividad_dgr,
            contexto.fecha_emision,
            contexto.fecha_vencimiento,
        );
        Ok(cuerpo.into_bytes())
    }
}
