pub mod convocatorias;
pub mod exencion;
pub mod expedientes;
