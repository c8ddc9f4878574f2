use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Project {
    pub id: i64,
    #[serde(alias = "name")]
    pub nombre: String,
    #[serde(alias = "description", default)]
    pub descripcion: Option<String>,
    #[serde(alias = "status", default)]
    pub estado: Option<String>,
    #[serde(rename = "fechaInicio", alias = "startDate", default)]
    pub fecha_inicio: Option<String>,
    #[serde(rename = "fechaFin", alias = "endDate", default)]
    pub fecha_fin: Option<String>,
    #[serde(rename = "ownerId", alias = "creadoPor", default)]
    pub owner: Option<i64>,
}

/// Payload for creating or updating a project.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewProject {
    pub nombre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
    #[serde(rename = "fechaInicio", skip_serializing_if = "Option::is_none")]
    pub fecha_inicio: Option<String>,
    #[serde(rename = "fechaFin", skip_serializing_if = "Option::is_none")]
    pub fecha_fin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[serde(alias = "pending")]
    Pendiente,
    #[serde(alias = "in_progress")]
    EnProgreso,
    #[serde(alias = "completed", alias = "done")]
    Completada,
    #[serde(alias = "cancelled")]
    Cancelada,
    #[serde(other)]
    Desconocido,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pendiente => write!(f, "Pending"),
            TaskStatus::EnProgreso => write!(f, "In Progress"),
            TaskStatus::Completada => write!(f, "Completed"),
            TaskStatus::Cancelada => write!(f, "Cancelled"),
            TaskStatus::Desconocido => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Task {
    pub id: i64,
    #[serde(alias = "title")]
    pub titulo: String,
    #[serde(alias = "description", default)]
    pub descripcion: Option<String>,
    #[serde(alias = "status", default)]
    pub estado: Option<TaskStatus>,
    #[serde(alias = "priority", default)]
    pub prioridad: Option<String>,
    #[serde(rename = "proyectoId", alias = "projectId", default)]
    pub proyecto_id: Option<i64>,
    #[serde(rename = "asignadoA", alias = "assigneeId", default)]
    pub asignado_a: Option<i64>,
    #[serde(rename = "fechaLimite", alias = "dueDate", default)]
    pub fecha_limite: Option<String>,
}

impl Task {
    pub fn is_open(&self) -> bool {
        !matches!(
            self.estado,
            Some(TaskStatus::Completada) | Some(TaskStatus::Cancelada)
        )
    }
}

/// Payload for creating or updating a task.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewTask {
    pub titulo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioridad: Option<String>,
    #[serde(rename = "proyectoId", skip_serializing_if = "Option::is_none")]
    pub proyecto_id: Option<i64>,
    #[serde(rename = "asignadoA", skip_serializing_if = "Option::is_none")]
    pub asignado_a: Option<i64>,
    #[serde(rename = "fechaLimite", skip_serializing_if = "Option::is_none")]
    pub fecha_limite: Option<String>,
}
