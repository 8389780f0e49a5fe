//! Post-award expense report. Created lazily, one per selected application,
//! with independent digital and physical-document tracks and an append-only
//! event log.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::registro::UserId;
use crate::workflows::expedientes::domain::{
    GetOrCreate, PostulacionId, StoreError, TransitionError,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RendicionId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoDigital {
    Borrador,
    Enviado,
    Observado,
    Subsanado,
    Aprobado,
    Rechazado,
}

impl EstadoDigital {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Borrador => "borrador",
            Self::Enviado => "enviado",
            Self::Observado => "observado",
            Self::Subsanado => "subsanado",
            Self::Aprobado => "aprobado",
            Self::Rechazado => "rechazado",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoFisico {
    Pendiente,
    Recibido,
    Observado,
    Aprobado,
}

impl EstadoFisico {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::Recibido => "recibido",
            Self::Observado => "observado",
            Self::Aprobado => "aprobado",
        }
    }
}

/// One entry of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendicionEvento {
    pub fecha: DateTime<Utc>,
    pub actor: UserId,
    pub accion: String,
    pub detalle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendicion {
    pub id: RendicionId,
    pub postulacion: PostulacionId,
    pub user: UserId,
    pub link_documentacion: Option<String>,
    pub observaciones_usuario: Option<String>,
    pub observaciones_admin: Option<String>,
    pub estado_digital: EstadoDigital,
    pub estado_fisico: EstadoFisico,
    pub fecha_recepcion_fisica: Option<NaiveDate>,
    pub eventos: Vec<RendicionEvento>,
}

impl Rendicion {
    pub fn new(
        id: RendicionId,
        postulacion: PostulacionId,
        user: UserId,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut rendicion = Self {
            id,
            postulacion,
            user,
            link_documentacion: None,
            observaciones_usuario: None,
            observaciones_admin: None,
            estado_digital: EstadoDigital::Borrador,
            estado_fisico: EstadoFisico::Pendiente,
            fecha_recepcion_fisica: None,
            eventos: Vec::new(),
        };
        rendicion.log_event(actor, "creacion", "expense report opened for selected application", now);
        rendicion
    }

    pub fn log_event(
        &mut self,
        actor: &UserId,
        accion: &str,
        detalle: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.eventos.push(RendicionEvento {
            fecha: now,
            actor: actor.clone(),
            accion: accion.to_string(),
            detalle: detalle.into(),
        });
    }

    fn expect_digital(
        &self,
        allowed: &[EstadoDigital],
        attempted: &'static str,
    ) -> Result<(), TransitionError> {
        if allowed.contains(&self.estado_digital) {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                from: self.estado_digital.label(),
                attempted,
            })
        }
    }

    fn expect_fisico(
        &self,
        allowed: &[EstadoFisico],
        attempted: &'static str,
    ) -> Result<(), TransitionError> {
        if allowed.contains(&self.estado_fisico) {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                from: self.estado_fisico.label(),
                attempted,
            })
        }
    }

    pub fn submit_digital(
        &mut self,
        link: Option<String>,
        remarks: Option<String>,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_digital(&[EstadoDigital::Borrador], "enviado")?;
        self.link_documentacion = link;
        self.observaciones_usuario = remarks;
        self.estado_digital = EstadoDigital::Enviado;
        self.log_event(actor, "envio_digital", "digital track submitted", now);
        Ok(())
    }

    pub fn observe_digital(
        &mut self,
        remarks: String,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_digital(&[EstadoDigital::Enviado, EstadoDigital::Subsanado], "observado")?;
        self.observaciones_admin = Some(remarks.clone());
        self.estado_digital = EstadoDigital::Observado;
        self.log_event(actor, "observacion_digital", remarks, now);
        Ok(())
    }

    pub fn subsanar_digital(
        &mut self,
        link: Option<String>,
        remarks: Option<String>,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_digital(&[EstadoDigital::Observado], "subsanado")?;
        if link.is_some() {
            self.link_documentacion = link;
        }
        if remarks.is_some() {
            self.observaciones_usuario = remarks;
        }
        self.estado_digital = EstadoDigital::Subsanado;
        self.log_event(actor, "subsanacion_digital", "digital track corrected", now);
        Ok(())
    }

    pub fn approve_digital(
        &mut self,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_digital(&[EstadoDigital::Enviado, EstadoDigital::Subsanado], "aprobado")?;
        self.estado_digital = EstadoDigital::Aprobado;
        self.log_event(actor, "aprobacion_digital", "digital track approved", now);
        Ok(())
    }

    pub fn reject_digital(
        &mut self,
        remarks: String,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_digital(&[EstadoDigital::Enviado, EstadoDigital::Subsanado], "rechazado")?;
        self.observaciones_admin = Some(remarks.clone());
        self.estado_digital = EstadoDigital::Rechazado;
        self.log_event(actor, "rechazo_digital", remarks, now);
        Ok(())
    }

    pub fn receive_physical(
        &mut self,
        fecha: NaiveDate,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_fisico(&[EstadoFisico::Pendiente], "recibido")?;
        self.estado_fisico = EstadoFisico::Recibido;
        self.fecha_recepcion_fisica = Some(fecha);
        self.log_event(actor, "recepcion_fisica", format!("received on {fecha}"), now);
        Ok(())
    }

    pub fn observe_physical(
        &mut self,
        remarks: String,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_fisico(&[EstadoFisico::Recibido], "observado")?;
        self.estado_fisico = EstadoFisico::Observado;
        self.log_event(actor, "observacion_fisica", remarks, now);
        Ok(())
    }

    pub fn approve_physical(
        &mut self,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_fisico(&[EstadoFisico::Recibido, EstadoFisico::Observado], "aprobado")?;
        self.estado_fisico = EstadoFisico::Aprobado;
        self.log_event(actor, "aprobacion_fisica", "physical track approved", now);
        Ok(())
    }
}

/// One-to-one persistence keyed by application. `create_if_absent` must be
/// atomic so the lazy creation stays idempotent under concurrency.
pub trait RendicionStore: Send + Sync {
    fn create_if_absent(&self, rendicion: Rendicion) -> Result<GetOrCreate<Rendicion>, StoreError>;
    fn fetch_by_postulacion(&self, id: &PostulacionId) -> Result<Option<Rendicion>, StoreError>;
    fn update(&self, rendicion: Rendicion) -> Result<(), StoreError>;
}
