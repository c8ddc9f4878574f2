use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: i64,
    #[serde(alias = "name", default)]
    pub nombre: String,
    pub email: String,
    #[serde(alias = "role", default)]
    pub rol: Option<String>,
    #[serde(alias = "active", default = "default_active")]
    pub activo: bool,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.rol
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case("admin") || r.eq_ignore_ascii_case("administrador"))
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        if self.nombre.is_empty() {
            &self.email
        } else {
            &self.nombre
        }
    }
}

/// Payload for creating or updating a user.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewUser {
    pub nombre: String,
    pub email: String,
    #[serde(rename = "contraseña", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Role {
    pub id: i64,
    #[serde(alias = "name")]
    pub nombre: String,
    #[serde(alias = "description", default)]
    pub descripcion: Option<String>,
    #[serde(alias = "permissions", default)]
    pub permisos: Vec<String>,
}
