use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registro::UserId;

/// Identifier of an application (postulación).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostulacionId(pub String);

/// Identifier of a tax-exemption request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExencionId(pub String);

impl ExencionId {
    /// Numeric tail of the identifier, used by the certificate number.
    pub fn secuencia(&self) -> u64 {
        self.0
            .rsplit('-')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentoId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservacionId(pub String);

/// A correction-capable case file: either an application or an exemption.
/// Documents and observations hang off one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expediente {
    Postulacion(PostulacionId),
    Exencion(ExencionId),
}

impl Expediente {
    pub fn id_str(&self) -> &str {
        match self {
            Expediente::Postulacion(id) => &id.0,
            Expediente::Exencion(id) => &id.0,
        }
    }
}

/// Per-document submission state. `Enviado` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pendiente,
    Enviado,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::Enviado => "enviado",
        }
    }
}

/// What a correction document corrects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsanadoTarget {
    Proyecto,
    Admin,
}

/// Document categories. Quota accounting and batch confirmation group by
/// [`DocumentKind::slug`], so the two correction targets share one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Personal,
    Proyecto,
    Subsanado(SubsanadoTarget),
    Exencion,
}

impl DocumentKind {
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Proyecto => "proyecto",
            Self::Subsanado(_) => "subsanado",
            Self::Exencion => "exencion",
        }
    }
}

/// Opaque reference into the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocator(pub String);

/// Inbound file payload, validated before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub nombre: String,
    pub bytes: Vec<u8>,
}

/// A supporting document attached to an expediente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documento {
    pub id: DocumentoId,
    pub expediente: Expediente,
    pub user: UserId,
    pub kind: DocumentKind,
    pub es_subsanacion: bool,
    pub estado: SubmissionStatus,
    pub archivo: BlobLocator,
    pub nombre_archivo: String,
    pub fecha_subida: DateTime<Utc>,
    pub fecha_envio: Option<DateTime<Utc>>,
}

/// Documentation areas an administrator can flag for correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoriaObservacion {
    General,
    Fiscal,
    Identidad,
    Proyecto,
    Otro,
}

impl CategoriaObservacion {
    pub const fn label(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Fiscal => "fiscal",
            Self::Identidad => "identidad",
            Self::Proyecto => "proyecto",
            Self::Otro => "otro",
        }
    }
}

/// An administrative correction request. `subsanada` only moves false→true,
/// driven by a confirmed correction batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observacion {
    pub id: ObservacionId,
    pub expediente: Expediente,
    pub categoria: CategoriaObservacion,
    pub descripcion: String,
    pub creada_por: UserId,
    pub fecha_creacion: DateTime<Utc>,
    pub subsanada: bool,
}

/// Storage-layer failures shared by every repository trait in the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Illegal state-machine moves. Every transition method rejects rather than
/// coercing, naming source state and attempted target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("'{attempted}' is not a legal transition from '{from}'")]
    InvalidState {
        from: &'static str,
        attempted: &'static str,
    },
    #[error("project data required before leaving draft: {}", missing.join(", "))]
    ProjectDataMissing { missing: Vec<&'static str> },
}

/// Result of an idempotent get-or-create on a uniquely keyed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOrCreate<T> {
    Created(T),
    Existing(T),
}

impl<T> GetOrCreate<T> {
    pub fn into_inner(self) -> T {
        match self {
            GetOrCreate::Created(value) | GetOrCreate::Existing(value) => value,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, GetOrCreate::Created(_))
    }
}

/// Outcome summary for administrative bulk operations. Rows that do not
/// apply are reported, never turned into a batch-wide failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub already_in_state: Vec<String>,
    pub rejected: Vec<(String, String)>,
}

impl BulkOutcome {
    pub fn succeed(&mut self, id: impl Into<String>) {
        self.succeeded.push(id.into());
    }

    pub fn already(&mut self, id: impl Into<String>) {
        self.already_in_state.push(id.into());
    }

    pub fn reject(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.rejected.push((id.into(), reason.into()));
    }
}
