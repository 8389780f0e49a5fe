//! Document submission sub-machine: upload → pending → confirmed-sent,
//! with the quota ledger enforced at insert time inside the store's
//! critical section so concurrent uploads cannot overshoot the limit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{
    BlobLocator, Documento, DocumentKind, DocumentoId, Expediente, StoreError, SubmissionStatus,
    UploadedFile,
};
use super::policy::DocumentPolicy;
use crate::registro::UserId;

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentoId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentoId(format!("doc-{id:06}"))
}

/// Blob storage boundary; payloads never live in the engine's own stores.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`, overwriting any prior blob of that name.
    fn store(&self, bytes: &[u8], name: &str) -> Result<BlobLocator, BlobError>;
    fn fetch(&self, locator: &BlobLocator) -> Result<Vec<u8>, BlobError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error("blob not found: {0}")]
    NotFound(String),
}

/// Result of a quota-guarded insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Documento),
    QuotaExhausted { remaining: usize },
}

/// Document persistence boundary.
///
/// Implementations must group rows by `kind.slug()` (correction targets
/// share one bucket) and must run `insert_within_quota` and
/// `confirm_pending` atomically with respect to other calls on the same
/// expediente.
pub trait DocumentStore: Send + Sync {
    /// Insert only if `count(pendiente) + count(enviado) < max_active` for
    /// the document's (expediente, kind) bucket.
    fn insert_within_quota(
        &self,
        documento: Documento,
        max_active: usize,
    ) -> Result<InsertOutcome, StoreError>;

    fn fetch(&self, id: &DocumentoId) -> Result<Option<Documento>, StoreError>;

    fn remove(&self, id: &DocumentoId) -> Result<(), StoreError>;

    fn active_count(&self, expediente: &Expediente, kind: DocumentKind)
        -> Result<usize, StoreError>;

    /// Flip every pending row of the bucket to sent, stamping `at`.
    /// All-or-nothing; returns the confirmed rows (possibly empty).
    fn confirm_pending(
        &self,
        expediente: &Expediente,
        kind: DocumentKind,
        at: DateTime<Utc>,
    ) -> Result<Vec<Documento>, StoreError>;

    fn for_expediente(&self, expediente: &Expediente) -> Result<Vec<Documento>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("file '{filename}' is not an accepted format")]
    InvalidFileFormat { filename: String },
    #[error("file is {size} bytes, above the {max_bytes} byte limit")]
    FileTooLarge { size: u64, max_bytes: u64 },
    #[error("quota reached for '{kind}' documents, remaining slots: {remaining}")]
    QuotaExceeded { kind: &'static str, remaining: usize },
    #[error("no pending '{kind}' documents to confirm")]
    NothingPending { kind: &'static str },
    #[error("document does not belong to the caller")]
    Forbidden,
    #[error("document was already confirmed and is immutable")]
    InvalidState,
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Façade over uploads, deletions, and batch confirmation, shared verbatim
/// by application documents and exemption documents.
pub struct SubmissionService {
    policy: DocumentPolicy,
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl SubmissionService {
    pub fn new(policy: DocumentPolicy, store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            policy,
            store,
            blobs,
        }
    }

    pub fn policy(&self) -> &DocumentPolicy {
        &self.policy
    }

    pub fn upload(
        &self,
        expediente: Expediente,
        user: &UserId,
        kind: DocumentKind,
        file: UploadedFile,
        es_subsanacion: bool,
        now: DateTime<Utc>,
    ) -> Result<Documento, DocumentError> {
        if file.bytes.is_empty() || !self.policy.allows_extension(&file.nombre) {
            return Err(DocumentError::InvalidFileFormat {
                filename: file.nombre,
            });
        }
        let size = file.bytes.len() as u64;
        if size > self.policy.max_bytes() {
            return Err(DocumentError::FileTooLarge {
                size,
                max_bytes: self.policy.max_bytes(),
            });
        }

        let blob_name = format!("{}/{}/{}", expediente.id_str(), kind.slug(), file.nombre);
        let archivo = self.blobs.store(&file.bytes, &blob_name)?;

        let documento = Documento {
            id: next_document_id(),
            expediente,
            user: user.clone(),
            kind,
            es_subsanacion,
            estado: SubmissionStatus::Pendiente,
            archivo,
            nombre_archivo: file.nombre,
            fecha_subida: now,
            fecha_envio: None,
        };

        match self
            .store
            .insert_within_quota(documento, self.policy.max_for(kind))?
        {
            InsertOutcome::Inserted(documento) => {
                info!(
                    documento = %documento.id.0,
                    expediente = documento.expediente.id_str(),
                    kind = kind.slug(),
                    "document uploaded"
                );
                Ok(documento)
            }
            InsertOutcome::QuotaExhausted { remaining } => Err(DocumentError::QuotaExceeded {
                kind: kind.slug(),
                remaining,
            }),
        }
    }

    /// Owner-only, and only while the document is still pending.
    pub fn delete(&self, id: &DocumentoId, by: &UserId) -> Result<(), DocumentError> {
        let documento = self.store.fetch(id)?.ok_or(StoreError::NotFound)?;
        if documento.user != *by {
            return Err(DocumentError::Forbidden);
        }
        if documento.estado != SubmissionStatus::Pendiente {
            return Err(DocumentError::InvalidState);
        }
        self.store.remove(id)?;
        Ok(())
    }

    /// The only path that advances documents to `enviado`. Fails with
    /// `NothingPending` when the bucket has no pending rows.
    pub fn confirm_batch(
        &self,
        expediente: &Expediente,
        kind: DocumentKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<Documento>, DocumentError> {
        let confirmados = self.store.confirm_pending(expediente, kind, now)?;
        if confirmados.is_empty() {
            return Err(DocumentError::NothingPending { kind: kind.slug() });
        }
        info!(
            expediente = expediente.id_str(),
            kind = kind.slug(),
            confirmados = confirmados.len(),
            "document batch confirmed"
        );
        Ok(confirmados)
    }

    /// Remaining quota slots for the (expediente, kind) bucket.
    pub fn remaining(
        &self,
        expediente: &Expediente,
        kind: DocumentKind,
    ) -> Result<usize, DocumentError> {
        let active = self.store.active_count(expediente, kind)?;
        Ok(self.policy.max_for(kind).saturating_sub(active))
    }

    /// Whether at least one document of the kind was confirmed as sent.
    pub fn has_confirmed(
        &self,
        expediente: &Expediente,
        kind: DocumentKind,
    ) -> Result<bool, DocumentError> {
        Ok(self
            .store
            .for_expediente(expediente)?
            .iter()
            .any(|d| d.kind.slug() == kind.slug() && d.estado == SubmissionStatus::Enviado))
    }

    pub fn documentos(&self, expediente: &Expediente) -> Result<Vec<Documento>, DocumentError> {
        Ok(self.store.for_expediente(expediente)?)
    }
}
