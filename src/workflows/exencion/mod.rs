//! Tax-exemption side of the engine: the request lifecycle mirroring the
//! application machine, plus the certificate issuance pipeline.

pub mod certificado;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use certificado::{
    CertificadoContexto, CertificatePipeline, CertificateRenderer, IssueError, RenderError,
};
pub use domain::{un_anio_despues, EstadoExencion, Exencion};
pub use repository::ExencionRepository;
pub use router::exencion_router;
pub use service::{ApprovalOutcome, ExencionService, ExencionServiceError, ResultadoAprobacion};
