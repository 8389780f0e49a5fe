//! Application side of the engine: funding calls, the application lifecycle
//! state machine, and the post-award expense report.

pub mod domain;
pub mod rendicion;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Convocatoria, ConvocatoriaId, DetallesProyecto, EstadoPostulacion, GeneroProyecto, Inscripcion,
    InscripcionId, Linea, Postulacion, TipoProyecto,
};
pub use rendicion::{
    EstadoDigital, EstadoFisico, Rendicion, RendicionEvento, RendicionId, RendicionStore,
};
pub use repository::{ConvocatoriaStore, InscripcionStore, PostulacionRepository};
pub use router::postulacion_router;
pub use service::{
    InscribirseOutcome, ObserveOutcome, PostulacionService, PostulacionServiceError,
    PostulacionView,
};
