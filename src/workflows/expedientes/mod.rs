//! Machinery shared by the application and exemption sides: the document
//! submission sub-machine with its quota ledger, and the administrative
//! observation engine with its change-detecting notification rule.

pub mod documentos;
pub mod domain;
pub mod observaciones;
pub mod policy;

#[cfg(test)]
mod tests;

pub use documentos::{
    BlobError, BlobStore, DocumentError, DocumentStore, InsertOutcome, SubmissionService,
};
pub use domain::{
    BlobLocator, BulkOutcome, CategoriaObservacion, Documento, DocumentKind, DocumentoId,
    Expediente, ExencionId, GetOrCreate, Observacion, ObservacionId, PostulacionId, StoreError,
    SubmissionStatus, SubsanadoTarget, TransitionError, UploadedFile,
};
pub use observaciones::{ObservacionEngine, ObservacionStore, RecordOutcome};
pub use policy::DocumentPolicy;
