use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::registro::UserId;
use crate::workflows::convocatorias::domain::ConvocatoriaId;
use crate::workflows::expedientes::domain::{BlobLocator, ExencionId, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoExencion {
    Enviada,
    Aprobada,
    Rechazada,
}

impl EstadoExencion {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Enviada => "enviada",
            Self::Aprobada => "aprobada",
            Self::Rechazada => "rechazada",
        }
    }
}

/// Emission date plus one calendar year. A Feb 29 emission clamps to
/// Feb 28 of the following (non-leap) year.
pub fn un_anio_despues(fecha: NaiveDate) -> NaiveDate {
    fecha.with_year(fecha.year() + 1).unwrap_or_else(|| {
        NaiveDate::from_ymd_opt(fecha.year() + 1, 2, 28)
            .unwrap_or(fecha)
    })
}

/// A tax-exemption request. The fiscal/identity fields are a snapshot taken
/// from the registry profile at creation and never re-synced afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exencion {
    pub id: ExencionId,
    pub user: UserId,
    pub convocatoria: Option<ConvocatoriaId>,
    pub nombre_razon_social: String,
    pub email: Option<String>,
    pub cuit: String,
    pub domicilio_fiscal: String,
    pub localidad_fiscal: String,
    pub codigo_postal_fiscal: String,
    pub actividad_dgr: String,
    pub estado: EstadoExencion,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_emision: Option<NaiveDate>,
    pub fecha_vencimiento: Option<NaiveDate>,
    pub certificado: Option<BlobLocator>,
}

impl Exencion {
    /// Stable certificate number derived from the identifier.
    pub fn numero_constancia(&self) -> String {
        format!("FRC-75-{:05}", self.id.secuencia())
    }

    /// Snapshot fields that must be non-empty before approval. The contact
    /// email is deliberately not here; delivery is conditional on it but
    /// approval is not.
    pub fn campos_snapshot_faltantes(&self) -> Vec<&'static str> {
        let campos: [(&'static str, &str); 6] = [
            ("nombre_razon_social", &self.nombre_razon_social),
            ("cuit", &self.cuit),
            ("domicilio_fiscal", &self.domicilio_fiscal),
            ("localidad_fiscal", &self.localidad_fiscal),
            ("codigo_postal_fiscal", &self.codigo_postal_fiscal),
            ("actividad_dgr", &self.actividad_dgr),
        ];
        campos
            .into_iter()
            .filter(|(_, valor)| valor.trim().is_empty())
            .map(|(nombre, _)| nombre)
            .collect()
    }

    /// `enviada → aprobada`, one-way. Emission date is set here and nowhere
    /// else; expiry is derived deterministically.
    pub fn aprobar(&mut self, hoy: NaiveDate) -> Result<(), TransitionError> {
        if self.estado != EstadoExencion::Enviada {
            return Err(TransitionError::InvalidState {
                from: self.estado.label(),
                attempted: "aprobada",
            });
        }
        self.estado = EstadoExencion::Aprobada;
        self.fecha_emision = Some(hoy);
        self.fecha_vencimiento = Some(un_anio_despues(hoy));
        Ok(())
    }

    /// `enviada → rechazada`, terminal.
    pub fn rechazar(&mut self) -> Result<(), TransitionError> {
        if self.estado != EstadoExencion::Enviada {
            return Err(TransitionError::InvalidState {
                from: self.estado.label(),
                attempted: "rechazada",
            });
        }
        self.estado = EstadoExencion::Rechazada;
        Ok(())
    }
}
