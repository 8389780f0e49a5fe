//! Certificate issuance pipeline: render the constancia from the frozen
//! snapshot, persist it keyed to the exemption (overwriting any prior
//! artifact so a retry after partial failure converges), and hand the bytes
//! back for the notification attachment.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::Exencion;
use crate::workflows::expedientes::documentos::{BlobError, BlobStore};
use crate::workflows::expedientes::domain::BlobLocator;

/// Snapshot handed to the renderer. Built only from frozen exemption
/// fields; the pipeline never reaches back into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificadoContexto {
    pub numero: String,
    pub nombre_razon_social: String,
    pub cuit: String,
    pub domicilio_fiscal: String,
    pub localidad_fiscal: String,
    pub codigo_postal_fiscal: String,
    pub actividad_dgr: String,
    pub fecha_emision: NaiveDate,
    pub fecha_vencimiento: NaiveDate,
}

impl CertificadoContexto {
    /// `None` until the exemption carries emission/expiry dates.
    pub fn from_exencion(exencion: &Exencion) -> Option<Self> {
        Some(Self {
            numero: exencion.numero_constancia(),
            nombre_razon_social: exencion.nombre_razon_social.clone(),
            cuit: exencion.cuit.clone(),
            domicilio_fiscal: exencion.domicilio_fiscal.clone(),
            localidad_fiscal: exencion.localidad_fiscal.clone(),
            codigo_postal_fiscal: exencion.codigo_postal_fiscal.clone(),
            actividad_dgr: exencion.actividad_dgr.clone(),
            fecha_emision: exencion.fecha_emision?,
            fecha_vencimiento: exencion.fecha_vencimiento?,
        })
    }
}

/// Document renderer boundary (PDF engine in production).
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, contexto: &CertificadoContexto) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("certificate rendering failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueError {
    #[error("exemption carries no emission date yet")]
    MissingDates,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

pub struct CertificatePipeline {
    renderer: Arc<dyn CertificateRenderer>,
    blobs: Arc<dyn BlobStore>,
}

impl CertificatePipeline {
    pub fn new(renderer: Arc<dyn CertificateRenderer>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { renderer, blobs }
    }

    /// Re-invocable: the only side effect is replacing the artifact stored
    /// under the exemption's certificate key.
    pub fn issue(&self, exencion: &Exencion) -> Result<(BlobLocator, Vec<u8>), IssueError> {
        let contexto =
            CertificadoContexto::from_exencion(exencion).ok_or(IssueError::MissingDates)?;
        let bytes = self.renderer.render(&contexto)?;
        let nombre = format!("exencion/certificados/Constancia_{}.pdf", contexto.numero);
        let locator = self.blobs.store(&bytes, &nombre)?;
        Ok((locator, bytes))
    }
}
