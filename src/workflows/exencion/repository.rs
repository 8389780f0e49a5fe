use super::domain::Exencion;
use crate::workflows::expedientes::domain::{ExencionId, GetOrCreate, StoreError};

/// Exemptions are unique per (user, convocatoria); a request started twice
/// resolves to the existing row.
pub trait ExencionRepository: Send + Sync {
    fn create_if_absent(&self, exencion: Exencion) -> Result<GetOrCreate<Exencion>, StoreError>;
    fn fetch(&self, id: &ExencionId) -> Result<Option<Exencion>, StoreError>;
    fn update(&self, exencion: Exencion) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<Exencion>, StoreError>;
}
