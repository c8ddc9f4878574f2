use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FileAttachment {
    pub id: i64,
    #[serde(rename = "nombreOriginal", alias = "originalName", alias = "filename")]
    pub nombre_original: String,
    #[serde(rename = "mimeType", alias = "mimetype", default)]
    pub mime_type: Option<String>,
    #[serde(alias = "size", default)]
    pub tamano: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "proyectoId", alias = "projectId", default)]
    pub proyecto_id: Option<i64>,
    #[serde(rename = "tareaId", alias = "taskId", default)]
    pub tarea_id: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl FileAttachment {
    pub fn size_display(&self) -> String {
        match self.tamano {
            Some(bytes) if bytes >= 1024 * 1024 => {
                format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
            }
            Some(bytes) if bytes >= 1024 => format!("{:.1} KB", bytes as f64 / 1024.0),
            Some(bytes) => format!("{} B", bytes),
            None => "Unknown".to_string(),
        }
    }
}
