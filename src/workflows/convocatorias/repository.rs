use super::domain::{Convocatoria, ConvocatoriaId, Inscripcion, Postulacion};
use crate::registro::UserId;
use crate::workflows::expedientes::domain::{GetOrCreate, PostulacionId, StoreError};

pub trait ConvocatoriaStore: Send + Sync {
    fn insert(&self, convocatoria: Convocatoria) -> Result<Convocatoria, StoreError>;
    fn fetch(&self, id: &ConvocatoriaId) -> Result<Option<Convocatoria>, StoreError>;
    fn list(&self) -> Result<Vec<Convocatoria>, StoreError>;
}

/// Applications are unique per (user, convocatoria); creation is
/// get-or-create against that key.
pub trait PostulacionRepository: Send + Sync {
    fn create_if_absent(
        &self,
        postulacion: Postulacion,
    ) -> Result<GetOrCreate<Postulacion>, StoreError>;

    fn fetch(&self, id: &PostulacionId) -> Result<Option<Postulacion>, StoreError>;

    fn update(&self, postulacion: Postulacion) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<Postulacion>, StoreError>;

    fn find_by_user_and_convocatoria(
        &self,
        user: &UserId,
        convocatoria: &ConvocatoriaId,
    ) -> Result<Option<Postulacion>, StoreError>;
}

/// Enrollments are unique per (user, convocatoria) as well.
pub trait InscripcionStore: Send + Sync {
    fn create_if_absent(
        &self,
        inscripcion: Inscripcion,
    ) -> Result<GetOrCreate<Inscripcion>, StoreError>;

    fn list(&self) -> Result<Vec<Inscripcion>, StoreError>;
}
