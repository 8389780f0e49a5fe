//! Lifecycle engine for cultural funding calls: applications, supporting
//! documents, administrative corrections, expense reports, and tax-exemption
//! certificates.

pub mod config;
pub mod error;
pub mod memoria;
pub mod notificaciones;
pub mod registro;
pub mod telemetry;
pub mod workflows;
