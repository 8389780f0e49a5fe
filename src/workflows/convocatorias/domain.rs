use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::registro::UserId;
use crate::workflows::expedientes::domain::{PostulacionId, TransitionError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvocatoriaId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InscripcionId(pub String);

/// Funding lines a call can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linea {
    Fomento,
    Beneficio,
    Formacion,
    Incentivo,
    Libre,
}

impl Linea {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fomento => "fomento",
            Self::Beneficio => "beneficio",
            Self::Formacion => "formacion",
            Self::Incentivo => "incentivo",
            Self::Libre => "libre",
        }
    }

    /// The `libre` line accepts applications without project data; the
    /// `formacion` line never reaches the project form at all.
    pub const fn requires_project(self) -> bool {
        !matches!(self, Self::Libre | Self::Formacion)
    }

    /// Training calls take a simple enrollment instead of an application.
    pub const fn enrollment_only(self) -> bool {
        matches!(self, Self::Formacion)
    }
}

/// A published funding call. Immutable here; administrative edits happen
/// outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Convocatoria {
    pub id: ConvocatoriaId,
    pub titulo: String,
    pub linea: Linea,
    pub apertura: NaiveDate,
    pub cierre: NaiveDate,
}

impl Convocatoria {
    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.apertura <= today && today <= self.cierre
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipoProyecto {
    Corto,
    Largo,
    Videoclip,
    Transmedia,
    Serie,
    Videojuego,
    Animacion,
    Comunidad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneroProyecto {
    Ficcion,
    Documental,
    NoFiccion,
    Educativo,
    Deportivo,
    Ludico,
    Simulacion,
    Otro,
}

/// Project data set while the application is still a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetallesProyecto {
    pub nombre_proyecto: Option<String>,
    pub tipo_proyecto: Option<TipoProyecto>,
    pub genero: Option<GeneroProyecto>,
    pub duracion_minutos: Option<u32>,
    pub declaracion_jurada: bool,
}

/// Application lifecycle states. Transitions go through the named methods
/// on [`Postulacion`]; call sites never compare or assign raw states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoPostulacion {
    Borrador,
    Enviado,
    RevisionAdmin,
    Observado,
    Admitido,
    EvaluacionJurado,
    Seleccionado,
    NoSeleccionado,
    Finalizado,
}

impl EstadoPostulacion {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Borrador => "borrador",
            Self::Enviado => "enviado",
            Self::RevisionAdmin => "revision_admin",
            Self::Observado => "observado",
            Self::Admitido => "admitido",
            Self::EvaluacionJurado => "evaluacion_jurado",
            Self::Seleccionado => "seleccionado",
            Self::NoSeleccionado => "no_seleccionado",
            Self::Finalizado => "finalizado",
        }
    }
}

/// One applicant's submission against one call. Never hard-deleted; the row
/// is the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postulacion {
    pub id: PostulacionId,
    pub user: UserId,
    pub convocatoria: ConvocatoriaId,
    pub nombre_proyecto: Option<String>,
    pub tipo_proyecto: Option<TipoProyecto>,
    pub genero: Option<GeneroProyecto>,
    pub duracion_minutos: Option<u32>,
    pub declaracion_jurada: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_envio: Option<DateTime<Utc>>,
    pub estado: EstadoPostulacion,
}

impl Postulacion {
    pub fn new(
        id: PostulacionId,
        user: UserId,
        convocatoria: ConvocatoriaId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user,
            convocatoria,
            nombre_proyecto: None,
            tipo_proyecto: None,
            genero: None,
            duracion_minutos: None,
            declaracion_jurada: false,
            fecha_creacion: now,
            fecha_envio: None,
            estado: EstadoPostulacion::Borrador,
        }
    }

    pub fn campos_proyecto_faltantes(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self
            .nombre_proyecto
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            missing.push("nombre_proyecto");
        }
        if self.tipo_proyecto.is_none() {
            missing.push("tipo_proyecto");
        }
        if self.genero.is_none() {
            missing.push("genero");
        }
        missing
    }

    fn expect_state(
        &self,
        allowed: &[EstadoPostulacion],
        attempted: &'static str,
    ) -> Result<(), TransitionError> {
        if allowed.contains(&self.estado) {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                from: self.estado.label(),
                attempted,
            })
        }
    }

    /// `borrador → enviado`. Stamps `fecha_envio` exactly once; a value
    /// already present is never overwritten.
    pub fn submit(
        &mut self,
        requires_project: bool,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.expect_state(&[EstadoPostulacion::Borrador], "enviado")?;
        if requires_project {
            let missing = self.campos_proyecto_faltantes();
            if !missing.is_empty() {
                return Err(TransitionError::ProjectDataMissing { missing });
            }
        }
        self.estado = EstadoPostulacion::Enviado;
        if self.fecha_envio.is_none() {
            self.fecha_envio = Some(now);
        }
        Ok(())
    }

    /// `enviado → revision_admin` on administrative pickup.
    pub fn pick_up_for_review(&mut self) -> Result<(), TransitionError> {
        self.expect_state(&[EstadoPostulacion::Enviado], "revision_admin")?;
        self.estado = EstadoPostulacion::RevisionAdmin;
        Ok(())
    }

    /// `revision_admin → observado` when an unresolved observation lands.
    pub fn observe(&mut self) -> Result<(), TransitionError> {
        self.expect_state(&[EstadoPostulacion::RevisionAdmin], "observado")?;
        self.estado = EstadoPostulacion::Observado;
        Ok(())
    }

    /// `observado → revision_admin` after a confirmed correction batch.
    pub fn return_to_review(&mut self) -> Result<(), TransitionError> {
        self.expect_state(&[EstadoPostulacion::Observado], "revision_admin")?;
        self.estado = EstadoPostulacion::RevisionAdmin;
        Ok(())
    }

    /// `revision_admin → admitido` on administrative clearance.
    pub fn admit(&mut self) -> Result<(), TransitionError> {
        self.expect_state(&[EstadoPostulacion::RevisionAdmin], "admitido")?;
        self.estado = EstadoPostulacion::Admitido;
        Ok(())
    }

    /// `admitido → evaluacion_jurado`.
    pub fn hand_to_jury(&mut self) -> Result<(), TransitionError> {
        self.expect_state(&[EstadoPostulacion::Admitido], "evaluacion_jurado")?;
        self.estado = EstadoPostulacion::EvaluacionJurado;
        Ok(())
    }

    /// `evaluacion_jurado → seleccionado | no_seleccionado`.
    pub fn decide(&mut self, selected: bool) -> Result<(), TransitionError> {
        let attempted = if selected {
            "seleccionado"
        } else {
            "no_seleccionado"
        };
        self.expect_state(&[EstadoPostulacion::EvaluacionJurado], attempted)?;
        self.estado = if selected {
            EstadoPostulacion::Seleccionado
        } else {
            EstadoPostulacion::NoSeleccionado
        };
        Ok(())
    }

    /// `seleccionado → finalizado` on expense-report closure.
    pub fn finalize(&mut self) -> Result<(), TransitionError> {
        self.expect_state(&[EstadoPostulacion::Seleccionado], "finalizado")?;
        self.estado = EstadoPostulacion::Finalizado;
        Ok(())
    }
}

/// Simple enrollment for training-line calls; no documents, no review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inscripcion {
    pub id: InscripcionId,
    pub user: UserId,
    pub convocatoria: ConvocatoriaId,
    pub fecha_creacion: DateTime<Utc>,
}
