//! Read-only view over the public audiovisual registry.
//!
//! The engine never writes registry data; it only checks that the acting
//! party holds a complete profile before an application or exemption may
//! start, and derives frozen snapshot values from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a user account in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Fiscal fields shared by both profile kinds. Optional on individuals at
/// registration time, which is why completeness is checked separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatosFiscales {
    pub situacion_iva: Option<String>,
    pub actividad_dgr: Option<String>,
    pub domicilio_fiscal: Option<String>,
    pub localidad_fiscal: Option<String>,
    pub codigo_postal_fiscal: Option<String>,
}

/// Individual registry profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaHumana {
    pub user: UserId,
    pub nombre_completo: String,
    pub cuil_cuit: String,
    pub fecha_nacimiento: NaiveDate,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub fiscales: DatosFiscales,
}

/// Organization registry profile. Fiscal data is mandatory at registration,
/// but the completeness check still runs over it (legacy rows may predate
/// the requirement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaJuridica {
    pub user: UserId,
    pub razon_social: String,
    pub cuil_cuit: String,
    pub fecha_constitucion: NaiveDate,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub fiscales: DatosFiscales,
}

/// A resolved applicant identity: individual XOR organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Persona {
    Humana(PersonaHumana),
    Juridica(PersonaJuridica),
}

impl Persona {
    pub fn user(&self) -> &UserId {
        match self {
            Persona::Humana(p) => &p.user,
            Persona::Juridica(p) => &p.user,
        }
    }

    /// Display name: full name for individuals, razón social for orgs.
    pub fn nombre_razon_social(&self) -> &str {
        match self {
            Persona::Humana(p) => &p.nombre_completo,
            Persona::Juridica(p) => &p.razon_social,
        }
    }

    pub fn cuil_cuit(&self) -> &str {
        match self {
            Persona::Humana(p) => &p.cuil_cuit,
            Persona::Juridica(p) => &p.cuil_cuit,
        }
    }

    pub fn fiscales(&self) -> &DatosFiscales {
        match self {
            Persona::Humana(p) => &p.fiscales,
            Persona::Juridica(p) => &p.fiscales,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Persona::Humana(p) => p.email.as_deref(),
            Persona::Juridica(p) => p.email.as_deref(),
        }
    }
}

/// Registry reader boundary. The production implementation queries the
/// registry database; tests use an in-memory map.
pub trait RegistryReader: Send + Sync {
    fn persona_humana(&self, user: &UserId) -> Option<PersonaHumana>;
    fn persona_juridica(&self, user: &UserId) -> Option<PersonaJuridica>;
    /// Account-level contact address, used as the last link of the contact
    /// fallback chain.
    fn account_email(&self, user: &UserId) -> Option<String>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("user is not registered as an individual or organization")]
    NotRegistered,
    #[error("incomplete fiscal data, missing: {}", missing.join(", "))]
    IncompleteFiscalData { missing: Vec<&'static str> },
}

/// Resolve the acting party's profile, individual taking precedence when a
/// legacy account somehow holds both.
pub fn check_eligible<R: RegistryReader + ?Sized>(
    registry: &R,
    user: &UserId,
) -> Result<Persona, EligibilityError> {
    if let Some(humana) = registry.persona_humana(user) {
        return Ok(Persona::Humana(humana));
    }
    if let Some(juridica) = registry.persona_juridica(user) {
        return Ok(Persona::Juridica(juridica));
    }
    Err(EligibilityError::NotRegistered)
}

/// Placeholder values the registry UI historically stored for "no value".
const PLACEHOLDERS: [&str; 6] = ["ninguna", "ninguno", "-", "no corresponde", "n/a", "na"];

/// A value is present only if non-empty after trimming and not one of the
/// legacy placeholder strings, case-insensitive.
pub fn valor_presente(valor: Option<&str>) -> bool {
    match valor {
        None => false,
        Some(v) => {
            let v = v.trim().to_lowercase();
            !v.is_empty() && !PLACEHOLDERS.contains(&v.as_str())
        }
    }
}

/// Names of the required fiscal fields that are absent or placeholder-valued.
pub fn campos_fiscales_faltantes(fiscales: &DatosFiscales) -> Vec<&'static str> {
    let campos: [(&'static str, Option<&str>); 5] = [
        ("situacion_iva", fiscales.situacion_iva.as_deref()),
        ("actividad_dgr", fiscales.actividad_dgr.as_deref()),
        ("domicilio_fiscal", fiscales.domicilio_fiscal.as_deref()),
        ("localidad_fiscal", fiscales.localidad_fiscal.as_deref()),
        ("codigo_postal_fiscal", fiscales.codigo_postal_fiscal.as_deref()),
    ];

    campos
        .into_iter()
        .filter(|(_, valor)| !valor_presente(*valor))
        .map(|(nombre, _)| nombre)
        .collect()
}

/// Gate used by both lifecycle machines before an expediente may start.
pub fn check_fiscal_complete(persona: &Persona) -> Result<(), EligibilityError> {
    let missing = campos_fiscales_faltantes(persona.fiscales());
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EligibilityError::IncompleteFiscalData { missing })
    }
}

/// Ordered fallback chain over possibly-absent fields, evaluated once at the
/// point of use. Returns the first value that passes [`valor_presente`].
pub fn primer_valor_presente(candidatos: &[Option<&str>]) -> Option<String> {
    candidatos
        .iter()
        .find(|c| valor_presente(**c))
        .and_then(|c| c.map(|v| v.trim().to_string()))
}

/// Contact address for a persona: profile email, then account email.
pub fn email_de_contacto<R: RegistryReader + ?Sized>(
    registry: &R,
    persona: &Persona,
) -> Option<String> {
    let account = registry.account_email(persona.user());
    primer_valor_presente(&[persona.email(), account.as_deref()])
}
