use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_LIMIT: u32 = 50;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
}

/// PUT body. Completion is only changed through PATCH.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct PatchTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_completed: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub is_completed: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: String,
}

/// Error body in the `{detail, error_code}` envelope.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    detail: &'static str,
    error_code: &'static str,
}

impl ApiFailure {
    fn new(status: StatusCode, detail: &'static str, error_code: &'static str) -> Self {
        Self {
            status,
            detail,
            error_code,
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not authenticated", "UNAUTHORIZED")
    }

    fn task_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Task not found", "TASK_NOT_FOUND")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({ "detail": self.detail, "error_code": self.error_code });
        (self.status, Json(body)).into_response()
    }
}

struct User {
    id: String,
    password: String,
}

#[derive(Default)]
pub struct Store {
    users: HashMap<String, User>,
    /// token -> user id
    sessions: HashMap<String, String>,
    /// task id -> (owner user id, task)
    tasks: BTreeMap<i64, (String, Task)>,
    next_id: i64,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/api/v1/auth/signup", post(sign_up))
        .route("/api/v1/auth/signin", post(sign_in))
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/v1/tasks/{id}",
            get(get_task)
                .put(update_task)
                .patch(patch_task)
                .delete(delete_task),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Unsigned JWT-shaped token whose payload carries `sub` and `email`.
fn issue_token(user_id: &str, email: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = json!({ "sub": user_id, "email": email });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signature = Uuid::new_v4().simple().to_string();
    format!("{header}.{payload}.{signature}")
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the caller's user id from the bearer token.
fn authenticate(store: &Store, headers: &HeaderMap) -> Result<String, ApiFailure> {
    bearer(headers)
        .and_then(|token| store.sessions.get(token).cloned())
        .ok_or_else(ApiFailure::unauthorized)
}

fn open_session(store: &mut Store, user_id: &str, email: &str) -> AuthResponse {
    let token = issue_token(user_id, email);
    store.sessions.insert(token.clone(), user_id.to_string());
    AuthResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user_id: user_id.to_string(),
    }
}

async fn sign_up(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<AuthResponse>, ApiFailure> {
    if input.email.is_empty() || input.password.is_empty() {
        return Err(ApiFailure::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Email and password are required",
            "VALIDATION_ERROR",
        ));
    }
    let mut store = db.write().await;
    if store.users.contains_key(&input.email) {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "Email already registered",
            "EMAIL_EXISTS",
        ));
    }
    let user_id = Uuid::new_v4().to_string();
    store.users.insert(
        input.email.clone(),
        User {
            id: user_id.clone(),
            password: input.password,
        },
    );
    info!(email = %input.email, "user signed up");
    Ok(Json(open_session(&mut store, &user_id, &input.email)))
}

async fn sign_in(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<AuthResponse>, ApiFailure> {
    let mut store = db.write().await;
    let user_id = match store.users.get(&input.email) {
        Some(user) if user.password == input.password => user.id.clone(),
        _ => {
            return Err(ApiFailure::new(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password",
                "INVALID_CREDENTIALS",
            ))
        }
    };
    Ok(Json(open_session(&mut store, &user_id, &input.email)))
}

async fn list_tasks(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<TaskPage>, ApiFailure> {
    let store = db.read().await;
    let owner = authenticate(&store, &headers)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let matching: Vec<&Task> = store
        .tasks
        .values()
        .filter(|(task_owner, _)| *task_owner == owner)
        .map(|(_, task)| task)
        .filter(|task| params.is_completed.map_or(true, |done| task.is_completed == done))
        .collect();

    Ok(Json(TaskPage {
        total: matching.len() as u64,
        items: matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect(),
        limit,
        offset,
    }))
}

async fn create_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), ApiFailure> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    if input.title.trim().is_empty() {
        return Err(ApiFailure::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Title must not be empty",
            "VALIDATION_ERROR",
        ));
    }
    store.next_id += 1;
    let task = Task {
        id: store.next_id,
        title: input.title,
        description: input.description,
        is_completed: false,
    };
    store.tasks.insert(task.id, (owner, task.clone()));
    Ok((StatusCode::CREATED, Json(task)))
}

/// The caller's task `id`, or 404 when it is missing or owned by someone else.
fn owned_task<'a>(store: &'a mut Store, owner: &str, id: i64) -> Result<&'a mut Task, ApiFailure> {
    match store.tasks.get_mut(&id) {
        Some((task_owner, task)) if task_owner.as_str() == owner => Ok(task),
        _ => Err(ApiFailure::task_not_found()),
    }
}

async fn get_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiFailure> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    owned_task(&mut store, &owner, id).map(|task| Json(task.clone()))
}

fn apply_fields(task: &mut Task, title: Option<String>, description: Option<String>) {
    if let Some(title) = title {
        task.title = title;
    }
    if let Some(description) = description {
        task.description = Some(description);
    }
}

async fn update_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTask>,
) -> Result<Json<Task>, ApiFailure> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    let task = owned_task(&mut store, &owner, id)?;
    apply_fields(task, input.title, input.description);
    Ok(Json(task.clone()))
}

async fn patch_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<PatchTask>,
) -> Result<Json<Task>, ApiFailure> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    let task = owned_task(&mut store, &owner, id)?;
    apply_fields(task, input.title, input.description);
    if let Some(is_completed) = input.is_completed {
        task.is_completed = is_completed;
    }
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    let mut store = db.write().await;
    let owner = authenticate(&store, &headers)?;
    owned_task(&mut store, &owner, id)?;
    store.tasks.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_serializes_to_json() {
        let task = Task {
            id: 1,
            title: "Test".to_string(),
            description: None,
            is_completed: false,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["title"], "Test");
        assert!(json["description"].is_null());
        assert_eq!(json["is_completed"], false);
    }

    #[test]
    fn create_task_description_is_optional() {
        let input: CreateTask = serde_json::from_str(r#"{"title":"No description"}"#).unwrap();
        assert_eq!(input.title, "No description");
        assert!(input.description.is_none());
    }

    #[test]
    fn create_task_rejects_missing_title() {
        let result: Result<CreateTask, _> = serde_json::from_str(r#"{"description":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn update_task_all_fields_optional() {
        let input: UpdateTask = serde_json::from_str(r#"{}"#).unwrap();
        assert!(input.title.is_none());
        assert!(input.description.is_none());
    }

    #[test]
    fn update_task_rejects_completion_flag() {
        let result: Result<UpdateTask, _> = serde_json::from_str(r#"{"is_completed":true}"#);
        assert!(result.is_err());

        let patch: PatchTask = serde_json::from_str(r#"{"is_completed":true}"#).unwrap();
        assert_eq!(patch.is_completed, Some(true));
    }

    #[test]
    fn issued_token_carries_claims() {
        let token = issue_token("user-1", "a@example.com");
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["email"], "a@example.com");
    }

    #[test]
    fn bearer_requires_scheme_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(bearer(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer(&headers), Some("abc"));
    }
}
