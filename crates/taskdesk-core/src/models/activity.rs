use serde::{Deserialize, Serialize};

/// One audit log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ActivityEntry {
    pub id: i64,
    #[serde(alias = "action")]
    pub accion: String,
    #[serde(alias = "entity", default)]
    pub entidad: Option<String>,
    #[serde(rename = "entidadId", alias = "entityId", default)]
    pub entidad_id: Option<i64>,
    #[serde(rename = "usuarioId", alias = "userId", default)]
    pub usuario: Option<i64>,
    #[serde(alias = "description", default)]
    pub descripcion: Option<String>,
    #[serde(rename = "createdAt", alias = "fecha", default)]
    pub created_at: Option<String>,
}

impl ActivityEntry {
    /// e.g. "update project #4"
    pub fn summary(&self) -> String {
        match (&self.entidad, self.entidad_id) {
            (Some(entity), Some(id)) => format!("{} {} #{}", self.accion, entity, id),
            (Some(entity), None) => format!("{} {}", self.accion, entity),
            _ => self.accion.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let entry: ActivityEntry = serde_json::from_str(
            r#"{"id": 1, "accion": "update", "entidad": "project", "entidadId": 4}"#,
        )
        .unwrap();
        assert_eq!(entry.summary(), "update project #4");

        let bare: ActivityEntry = serde_json::from_str(r#"{"id": 2, "action": "login"}"#).unwrap();
        assert_eq!(bare.summary(), "login");
    }
}
