//! Authenticated API client for the project/task administration backend.
//!
//! Every call runs through one pipeline:
//! attach credential -> send -> classify response -> (on 401) refresh and
//! replay once. Token refreshes are single-flight: concurrent 401s share
//! one exchange against `/auth/refresh-token`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{header, multipart, Body, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::auth::{Credential, Session};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Endpoint exchanging a refresh token for a new token pair.
pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// Chunk size for streamed uploads; progress is reported per chunk.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Fallback name for downloads whose suggested name is unusable.
const DEFAULT_DOWNLOAD_NAME: &str = "download";

/// Upload progress callback: `(bytes_sent, total_bytes)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

type SharedRefresh = Shared<BoxFuture<'static, Result<Credential, ApiError>>>;

// ============================================================================
// Request descriptors
// ============================================================================

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Treat a 401 as final instead of refreshing the token.
    pub skip_auth_refresh: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn skip_auth_refresh(mut self) -> Self {
        self.skip_auth_refresh = true;
        self
    }
}

/// One file in a multipart upload. Content is held in memory so the
/// request can be replayed after a token refresh.
#[derive(Debug, Clone)]
pub struct FilePart {
    field: String,
    file_name: String,
    content: Vec<u8>,
    mime: Option<String>,
}

impl FilePart {
    pub fn new(field: &str, file_name: &str, content: Vec<u8>) -> Self {
        Self {
            field: field.to_string(),
            file_name: file_name.to_string(),
            content,
            mime: None,
        }
    }

    pub async fn from_path(field: &str, path: &Path) -> Result<Self> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_DOWNLOAD_NAME);
        Ok(Self::new(field, file_name, content))
    }

    pub fn mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.to_string());
        self
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Multipart body: text fields plus files.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl ToString) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(FilePart::len).sum()
    }

    /// Build a fresh reqwest form. Each build restarts progress at zero.
    fn to_multipart(&self, progress: Option<&ProgressCallback>) -> Result<multipart::Form, ApiError> {
        let total = self.total_bytes();
        let sent = Arc::new(AtomicU64::new(0));
        let mut form = multipart::Form::new();

        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }

        for file in &self.files {
            let part = match progress {
                None => multipart::Part::bytes(file.content.clone()),
                Some(callback) => {
                    let callback = Arc::clone(callback);
                    let sent = Arc::clone(&sent);
                    let chunks: Vec<Vec<u8>> = file
                        .content
                        .chunks(UPLOAD_CHUNK_SIZE)
                        .map(<[u8]>::to_vec)
                        .collect();
                    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
                        let len = chunk.len() as u64;
                        let done = sent.fetch_add(len, Ordering::SeqCst) + len;
                        callback(done, total);
                        Ok::<_, std::io::Error>(chunk)
                    }));
                    multipart::Part::stream_with_length(Body::wrap_stream(stream), file.len())
                }
            };
            let mut part = part.file_name(file.file_name.clone());
            if let Some(ref mime) = file.mime {
                part = part
                    .mime_str(mime)
                    .map_err(|e| ApiError::InvalidRequest(format!("Invalid MIME type {}: {}", mime, e)))?;
            }
            form = form.part(file.field.clone(), part);
        }

        Ok(form)
    }
}

#[derive(Debug, Clone)]
enum RequestBody {
    Empty,
    Json(Value),
    Multipart(UploadForm),
}

/// An outbound call, kept whole so it can be replayed after a refresh.
#[derive(Clone)]
struct PendingRequest {
    method: Method,
    path: String,
    body: RequestBody,
    options: RequestOptions,
    progress: Option<ProgressCallback>,
}

impl PendingRequest {
    fn new(method: Method, path: &str, body: RequestBody, options: RequestOptions) -> Self {
        Self {
            method,
            path: path.to_string(),
            body,
            options,
            progress: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "token")]
    access_token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

struct ClientInner {
    http: Client,
    base_url: String,
    session: Session,
    refresh_in_flight: Mutex<Option<SharedRefresh>>,
}

/// API client for the administration backend.
/// Clone is cheap - clones share the connection pool, session and refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client with the default 10 second timeout
    pub fn new(base_url: &str, session: Session) -> Result<Self> {
        Self::with_timeout(base_url, session, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, session: Session, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http: client,
                base_url: base_url.trim_end_matches('/').to_string(),
                session,
                refresh_in_flight: Mutex::new(None),
            }),
        })
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    // ===== Request methods =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        let request = PendingRequest::new(Method::GET, path, RequestBody::Empty, options);
        decode(self.inner.execute(&request).await?).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send_json(Method::POST, path, body, options).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send_json(Method::PUT, path, body, options).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send_json(Method::PATCH, path, body, options).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        let request = PendingRequest::new(Method::DELETE, path, RequestBody::Empty, options);
        decode(self.inner.execute(&request).await?).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize request body: {}", e)))?;
        let request = PendingRequest::new(method, path, RequestBody::Json(body), options);
        decode(self.inner.execute(&request).await?).await
    }

    /// POST a multipart body. Auth handling is identical to other requests;
    /// a replay after refresh restarts progress reporting.
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        path: &str,
        form: UploadForm,
        on_progress: Option<ProgressCallback>,
    ) -> Result<T, ApiError> {
        let mut request = PendingRequest::new(
            Method::POST,
            path,
            RequestBody::Multipart(form),
            RequestOptions::default(),
        );
        request.progress = on_progress;
        decode(self.inner.execute(&request).await?).await
    }

    /// Fetch a binary body and save it as `dest_dir/suggested_filename`.
    pub async fn download_file(
        &self,
        path: &str,
        suggested_filename: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let request = PendingRequest::new(Method::GET, path, RequestBody::Empty, RequestOptions::default());
        let response = self.inner.execute(&request).await?;
        let bytes = response.bytes().await.map_err(read_error)?;

        let file_name = sanitize_filename(suggested_filename);
        let target = dest_dir.join(file_name);
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| ApiError::Io(format!("Failed to create {}: {}", dest_dir.display(), e)))?;
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| ApiError::Io(format!("Failed to write {}: {}", target.display(), e)))?;

        info!(path = path, file = %target.display(), bytes = bytes.len(), "Downloaded file");
        Ok(target)
    }

    /// Run the refresh protocol now, through the same single-flight gate
    /// that 401 recovery uses.
    pub async fn refresh_session(&self) -> Result<Credential, ApiError> {
        let current = self.inner.session.access_token();
        self.inner.refresh(current.as_deref()).await
    }
}

impl ClientInner {
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Full pipeline for one call, including the single 401 replay.
    async fn execute(self: &Arc<Self>, request: &PendingRequest) -> Result<Response, ApiError> {
        let token = self.session.access_token();

        let original = match self.dispatch(request, token.as_deref()).await {
            Err(ApiError::Authentication(body)) if !request.options.skip_auth_refresh => body,
            other => return other,
        };

        info!(method = %request.method, path = %request.path, "Access token rejected, refreshing");
        let credential = match self.refresh(token.as_deref()).await {
            Ok(credential) => credential,
            Err(e) => {
                // The session stays in place; the caller decides whether to log in again
                warn!(error = %e, "Token refresh failed");
                return Err(ApiError::Authentication(original));
            }
        };

        debug!(method = %request.method, path = %request.path, "Replaying request with refreshed token");
        self.dispatch(request, Some(&credential.access_token)).await
    }

    /// attach credential -> send -> classify
    async fn dispatch(&self, request: &PendingRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let builder = self.build(request)?;
        let builder = attach_credential(builder, token)?;

        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = token.is_some(),
            "Sending request"
        );

        let response = builder.send().await.map_err(|e| {
            let err = ApiError::from_transport(&e);
            error!(method = %request.method, path = %request.path, error = %err, "Request failed without response");
            err
        })?;

        classify(request, response).await
    }

    fn build(&self, request: &PendingRequest) -> Result<RequestBuilder, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .header(header::ACCEPT, "application/json");

        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        for (name, value) in &request.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        Ok(match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.multipart(form.to_multipart(request.progress.as_ref())?),
        })
    }

    /// Single-flight refresh. `stale` is the access token the failed request
    /// carried; if the store already holds a different one, another refresh
    /// finished in the meantime and that token is reused.
    async fn refresh(self: &Arc<Self>, stale: Option<&str>) -> Result<Credential, ApiError> {
        let pending = {
            let mut slot = self
                .refresh_in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.clone() {
                Some(pending) => {
                    debug!("Joining in-flight token refresh");
                    pending
                }
                None => {
                    if let Some(current) = self.session.credential() {
                        if Some(current.access_token.as_str()) != stale {
                            debug!("Token was already refreshed");
                            return Ok(current);
                        }
                    }

                    // Spawned so a cancelled caller cannot abort a refresh
                    // other requests are waiting on
                    let inner = Arc::clone(self);
                    let task = tokio::spawn(async move {
                        let result = inner.exchange_refresh_token().await;
                        inner
                            .refresh_in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        result
                    });
                    let pending = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(ApiError::Connection(format!("Token refresh task failed: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// POST the stored refresh token; persist the new pair on success.
    /// Storage is left untouched on failure.
    async fn exchange_refresh_token(&self) -> Result<Credential, ApiError> {
        let refresh_token = self.session.refresh_token().ok_or_else(|| {
            warn!("No refresh token stored");
            ApiError::missing_refresh_token()
        })?;

        info!("Refreshing access token");
        let request = PendingRequest::new(
            Method::POST,
            REFRESH_PATH,
            RequestBody::Json(json!({ "refreshToken": refresh_token })),
            RequestOptions::default().skip_auth_refresh(),
        );
        let response = self.dispatch(&request, None).await?;
        let value: Value = decode(response).await?;

        // Accept both a bare pair and one wrapped in `data`
        let payload = match value.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => value,
        };
        let parsed: RefreshResponse = serde_json::from_value(payload)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e)))?;

        let credential = Credential::new(
            parsed.access_token,
            Some(parsed.refresh_token.unwrap_or(refresh_token)),
        );
        self.session.save_credential(&credential)?;
        info!("Access token refreshed");
        Ok(credential)
    }
}

// ============================================================================
// Pipeline stages
// ============================================================================

fn attach_credential(builder: RequestBuilder, token: Option<&str>) -> Result<RequestBuilder, ApiError> {
    match token {
        Some(token) => {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("Stored access token is not a valid header value".into()))?;
            Ok(builder.header(header::AUTHORIZATION, value))
        }
        None => Ok(builder),
    }
}

/// Check if response is successful, returning a classified error with the
/// server's body if not.
async fn classify(request: &PendingRequest, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        debug!(method = %request.method, path = %request.path, status = status.as_u16(), "Response received");
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = ApiError::from_status(status, &body);
    if status.is_server_error() {
        error!(method = %request.method, path = %request.path, status = status.as_u16(), error = %err, "Server error");
    } else {
        warn!(method = %request.method, path = %request.path, status = status.as_u16(), error = %err, "Request rejected");
    }
    Err(err)
}

fn read_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::from_transport(&e)
    } else {
        ApiError::InvalidResponse(format!("Failed to read response body: {}", e))
    }
}

/// Decode a success body as JSON. An empty body decodes as `null`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(read_error)?;
    let slice: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &bytes
    };
    serde_json::from_slice(slice)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
}

fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .unwrap_or(DEFAULT_DOWNLOAD_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::sync::Mutex as StdMutex;

    fn session_with(access: &str, refresh: Option<&str>) -> Session {
        let session = Session::in_memory();
        session
            .save_credential(&Credential::new(access, refresh.map(String::from)))
            .unwrap();
        session
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(""), DEFAULT_DOWNLOAD_NAME);
        assert_eq!(sanitize_filename(".."), DEFAULT_DOWNLOAD_NAME);
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:3000/api/", Session::in_memory()).unwrap();
        assert_eq!(client.inner.url("/projects"), "http://localhost:3000/api/projects");
        assert_eq!(client.inner.url("tasks/1"), "http://localhost:3000/api/tasks/1");
        assert_eq!(client.inner.url("https://cdn.example.com/f"), "https://cdn.example.com/f");
    }

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::new()
            .query("limit", 10)
            .header("X-Trace", "1")
            .skip_auth_refresh();
        assert_eq!(options.query, vec![("limit".to_string(), "10".to_string())]);
        assert_eq!(options.headers.len(), 1);
        assert!(options.skip_auth_refresh);
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_authorization() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Session::in_memory()).unwrap();
        let body: Value = client.get("/health", RequestOptions::default()).await.unwrap();
        assert_eq!(body["ok"], true);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_and_extra_headers_are_sent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/activity/recent")
            .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
            .match_header("x-request-source", "cli")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Session::in_memory()).unwrap();
        let options = RequestOptions::new().query("limit", 5).header("X-Request-Source", "cli");
        let body: Vec<Value> = client.get("/activity/recent", options).await.unwrap();
        assert!(body.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_success_body_decodes_as_unit() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/projects/3")
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), session_with("t", None)).unwrap();
        let result: Result<(), ApiError> = client.delete("/projects/3", RequestOptions::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), Session::in_memory()).unwrap();
        let err = client
            .get::<Value>("/projects", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/projects")
            .with_status(503)
            .with_body(r#"{"message": "down"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), session_with("t", Some("r"))).unwrap();
        let err = client
            .get::<Value>("/projects", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Server(_)));
        assert_eq!(err.status(), 503);
        assert_eq!(err.message(), "down");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_skip_auth_refresh_returns_401_directly() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .expect(0)
            .create_async()
            .await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"message": "Credenciales inválidas"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), session_with("t", Some("r"))).unwrap();
        let err = client
            .post::<Value, _>("/auth/login", &json!({}), RequestOptions::new().skip_auth_refresh())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.message(), "Credenciales inválidas");
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_response_wrapped_in_data() {
        let mut server = Server::new_async().await;
        let _refresh = server
            .mock("POST", REFRESH_PATH)
            .match_body(Matcher::Json(json!({"refreshToken": "r1"})))
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"accessToken": "a2"}}"#)
            .create_async()
            .await;

        let session = session_with("a1", Some("r1"));
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();
        let credential = client.refresh_session().await.unwrap();
        assert_eq!(credential.access_token, "a2");
        // Old refresh token kept when the server does not rotate it
        assert_eq!(credential.refresh_token.as_deref(), Some("r1"));
        assert_eq!(session.access_token().as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn test_upload_reports_progress() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/files/upload")
            .match_header("content-type", Matcher::Regex("multipart/form-data".into()))
            .match_body(Matcher::Regex("notes.txt".into()))
            .with_status(201)
            .with_body(r#"{"success": true, "data": {"id": 1, "nombreOriginal": "notes.txt"}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), session_with("t", None)).unwrap();
        let seen: Arc<StdMutex<Vec<(u64, u64)>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |sent, total| {
            seen_cb.lock().unwrap().push((sent, total));
        });

        let content = vec![b'a'; UPLOAD_CHUNK_SIZE + 10];
        let form = UploadForm::new()
            .text("proyectoId", 4)
            .file(FilePart::new("file", "notes.txt", content).mime("text/plain"));
        let body: Value = client
            .upload_file("/files/upload", form, Some(callback))
            .await
            .unwrap();

        assert_eq!(body["data"]["id"], 1);
        let seen = seen.lock().unwrap();
        let total = (UPLOAD_CHUNK_SIZE + 10) as u64;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.last(), Some(&(total, total)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_mime_is_rejected_before_sending() {
        let client = ApiClient::new("http://127.0.0.1:9", Session::in_memory()).unwrap();
        let form = UploadForm::new().file(FilePart::new("file", "x.bin", vec![1]).mime("not a mime"));
        let err = client
            .upload_file::<Value>("/files/upload", form, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/5/download")
            .match_header("authorization", "Bearer t")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(vec![0u8, 1, 2, 3])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = ApiClient::new(&server.url(), session_with("t", None)).unwrap();
        let path = client
            .download_file("/files/5/download", "../plan.bin", dir.path())
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("plan.bin"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0u8, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_download_failure_propagates() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/6/download")
            .with_status(404)
            .with_body(r#"{"message": "Archivo no encontrado"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = ApiClient::new(&server.url(), session_with("t", None)).unwrap();
        let err = client
            .download_file("/files/6/download", "x.bin", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(!dir.path().join("x.bin").exists());
    }
}
