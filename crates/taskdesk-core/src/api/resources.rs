//! Typed wrappers for the backend's REST resources.
//!
//! Every endpoint answers with the `{success, data, message}` envelope;
//! these helpers unwrap `data`.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::models::{
    ActivityEntry, ApiEnvelope, FileAttachment, NewProject, NewTask, NewUser, Project, Role, Task,
    TaskStatus, User,
};

use super::client::{FilePart, ProgressCallback, RequestOptions, UploadForm};
use super::{ApiClient, ApiError};

impl ApiClient {
    async fn get_data<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        let envelope: ApiEnvelope<T> = self.get(path, options).await?;
        envelope.into_result()
    }

    // ===== Projects =====

    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.get_data("/projects", RequestOptions::default()).await
    }

    pub async fn get_project(&self, id: i64) -> Result<Project, ApiError> {
        self.get_data(&format!("/projects/{}", id), RequestOptions::default())
            .await
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, ApiError> {
        let envelope: ApiEnvelope<Project> = self
            .post("/projects", project, RequestOptions::default())
            .await?;
        envelope.into_result()
    }

    pub async fn update_project(&self, id: i64, project: &NewProject) -> Result<Project, ApiError> {
        let envelope: ApiEnvelope<Project> = self
            .put(&format!("/projects/{}", id), project, RequestOptions::default())
            .await?;
        envelope.into_result()
    }

    pub async fn delete_project(&self, id: i64) -> Result<(), ApiError> {
        let _: Value = self
            .delete(&format!("/projects/{}", id), RequestOptions::default())
            .await?;
        Ok(())
    }

    // ===== Tasks =====

    pub async fn list_tasks(&self, project_id: Option<i64>) -> Result<Vec<Task>, ApiError> {
        let options = match project_id {
            Some(id) => RequestOptions::new().query("proyectoId", id),
            None => RequestOptions::default(),
        };
        self.get_data("/tasks", options).await
    }

    pub async fn get_task(&self, id: i64) -> Result<Task, ApiError> {
        self.get_data(&format!("/tasks/{}", id), RequestOptions::default())
            .await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let envelope: ApiEnvelope<Task> = self.post("/tasks", task, RequestOptions::default()).await?;
        envelope.into_result()
    }

    pub async fn update_task(&self, id: i64, task: &NewTask) -> Result<Task, ApiError> {
        let envelope: ApiEnvelope<Task> = self
            .put(&format!("/tasks/{}", id), task, RequestOptions::default())
            .await?;
        envelope.into_result()
    }

    pub async fn update_task_status(&self, id: i64, status: TaskStatus) -> Result<Task, ApiError> {
        let envelope: ApiEnvelope<Task> = self
            .patch(
                &format!("/tasks/{}/status", id),
                &json!({ "estado": status }),
                RequestOptions::default(),
            )
            .await?;
        envelope.into_result()
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        let _: Value = self
            .delete(&format!("/tasks/{}", id), RequestOptions::default())
            .await?;
        Ok(())
    }

    // ===== Users and roles =====

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get_data("/users", RequestOptions::default()).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User, ApiError> {
        self.get_data(&format!("/users/{}", id), RequestOptions::default())
            .await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let envelope: ApiEnvelope<User> = self.post("/users", user, RequestOptions::default()).await?;
        envelope.into_result()
    }

    pub async fn update_user(&self, id: i64, user: &NewUser) -> Result<User, ApiError> {
        let envelope: ApiEnvelope<User> = self
            .put(&format!("/users/{}", id), user, RequestOptions::default())
            .await?;
        envelope.into_result()
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        let _: Value = self
            .delete(&format!("/users/{}", id), RequestOptions::default())
            .await?;
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, ApiError> {
        self.get_data("/users/roles", RequestOptions::default()).await
    }

    pub async fn assign_role(&self, user_id: i64, role: &str) -> Result<User, ApiError> {
        let envelope: ApiEnvelope<User> = self
            .patch(
                &format!("/users/{}/role", user_id),
                &json!({ "rol": role }),
                RequestOptions::default(),
            )
            .await?;
        envelope.into_result()
    }

    // ===== Files =====

    pub async fn upload_attachment(
        &self,
        project_id: Option<i64>,
        task_id: Option<i64>,
        file: FilePart,
        on_progress: Option<ProgressCallback>,
    ) -> Result<FileAttachment, ApiError> {
        let mut form = UploadForm::new().file(file);
        if let Some(id) = project_id {
            form = form.text("proyectoId", id);
        }
        if let Some(id) = task_id {
            form = form.text("tareaId", id);
        }
        let envelope: ApiEnvelope<FileAttachment> =
            self.upload_file("/files/upload", form, on_progress).await?;
        envelope.into_result()
    }

    pub async fn list_files(&self, project_id: Option<i64>) -> Result<Vec<FileAttachment>, ApiError> {
        let options = match project_id {
            Some(id) => RequestOptions::new().query("proyectoId", id),
            None => RequestOptions::default(),
        };
        self.get_data("/files", options).await
    }

    pub async fn download_attachment(
        &self,
        file: &FileAttachment,
        dest_dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        self.download_file(
            &format!("/files/{}/download", file.id),
            &file.nombre_original,
            dest_dir,
        )
        .await
    }

    pub async fn delete_file(&self, id: i64) -> Result<(), ApiError> {
        let _: Value = self
            .delete(&format!("/files/{}", id), RequestOptions::default())
            .await?;
        Ok(())
    }

    // ===== Activity log =====

    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, ApiError> {
        self.get_data("/activity/recent", RequestOptions::new().query("limit", limit))
            .await
    }

    pub async fn project_activity(&self, project_id: i64) -> Result<Vec<ActivityEntry>, ApiError> {
        self.get_data(
            &format!("/activity/project/{}", project_id),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn user_activity(&self, user_id: i64) -> Result<Vec<ActivityEntry>, ApiError> {
        self.get_data(&format!("/activity/user/{}", user_id), RequestOptions::default())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, Session};
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> ApiClient {
        let session = Session::in_memory();
        session
            .save_credential(&Credential::new("token-1", Some("refresh-1".into())))
            .unwrap();
        ApiClient::new(&server.url(), session).unwrap()
    }

    #[tokio::test]
    async fn test_list_projects_unwraps_envelope() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects")
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body(r#"{"success": true, "data": [{"id": 1, "nombre": "Portal"}, {"id": 2, "nombre": "API"}]}"#)
            .create_async()
            .await;

        let projects = client_for(&server).list_projects().await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].nombre, "API");
    }

    #[tokio::test]
    async fn test_list_tasks_filters_by_project() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks")
            .match_query(Matcher::UrlEncoded("proyectoId".into(), "7".into()))
            .with_status(200)
            .with_body(r#"{"success": true, "data": [{"id": 3, "titulo": "Deploy", "proyectoId": 7}]}"#)
            .create_async()
            .await;

        let tasks = client_for(&server).list_tasks(Some(7)).await.unwrap();
        assert_eq!(tasks[0].proyecto_id, Some(7));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_task_status_sends_estado() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/tasks/3/status")
            .match_body(Matcher::Json(json!({"estado": "completada"})))
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"id": 3, "titulo": "Deploy", "estado": "completada"}}"#)
            .create_async()
            .await;

        let task = client_for(&server)
            .update_task_status(3, TaskStatus::Completada)
            .await
            .unwrap();
        assert!(!task.is_open());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_project_validation_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/projects")
            .with_status(422)
            .with_body(r#"{"message": "Validation failed", "errors": {"nombre": "required"}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .create_project(&NewProject::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 422);
        assert_eq!(err.field_error("nombre"), Some("required"));
    }

    #[tokio::test]
    async fn test_forbidden_role_assignment() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PATCH", "/users/9/role")
            .with_status(403)
            .with_body(r#"{"message": "Solo administradores"}"#)
            .create_async()
            .await;

        let err = client_for(&server).assign_role(9, "admin").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(err.message(), "Solo administradores");
    }

    #[tokio::test]
    async fn test_recent_activity_passes_limit() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/activity/recent")
            .match_query(Matcher::UrlEncoded("limit".into(), "20".into()))
            .with_status(200)
            .with_body(r#"{"success": true, "data": [{"id": 1, "accion": "create", "entidad": "task", "entidadId": 5}]}"#)
            .create_async()
            .await;

        let entries = client_for(&server).recent_activity(20).await.unwrap();
        assert_eq!(entries[0].summary(), "create task #5");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_attachment_includes_project_field() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/files/upload")
            .match_body(Matcher::Regex("name=\"proyectoId\"".into()))
            .with_status(201)
            .with_body(r#"{"success": true, "data": {"id": 11, "nombreOriginal": "notes.txt", "proyectoId": 2}}"#)
            .create_async()
            .await;

        let file = FilePart::new("archivo", "notes.txt", b"hello".to_vec());
        let attachment = client_for(&server)
            .upload_attachment(Some(2), None, file, None)
            .await
            .unwrap();
        assert_eq!(attachment.id, 11);
        assert_eq!(attachment.proyecto_id, Some(2));
        mock.assert_async().await;
    }
}
