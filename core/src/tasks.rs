//! Request builders and response parsers for `/api/v1/tasks`.
//!
//! # Design
//! Like the rest of the core, `TaskClient` performs no I/O. Each operation
//! is a `build_*` method producing an `HttpRequest` and a `parse_*` method
//! consuming the matching `HttpResponse`; `ApiClient` joins the two with a
//! transport. Nothing is cached, so every call is a fresh round-trip.

use crate::error::Result;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::request::RequestCore;
use crate::types::{CreateTask, ListTasksQuery, Page, PatchTask, Task, UpdateTask};

pub const TASKS_PATH: &str = "/api/v1/tasks";

#[derive(Debug, Clone)]
pub struct TaskClient {
    core: RequestCore,
}

impl TaskClient {
    pub fn new(core: RequestCore) -> Self {
        Self { core }
    }

    fn task_path(id: i64) -> String {
        format!("{TASKS_PATH}/{id}")
    }

    pub fn build_list_tasks(&self, query: &ListTasksQuery) -> Result<HttpRequest> {
        let query = query.to_query_string();
        let endpoint = if query.is_empty() {
            TASKS_PATH.to_string()
        } else {
            format!("{TASKS_PATH}?{query}")
        };
        self.core.build(HttpMethod::Get, &endpoint, &[], None)
    }

    pub fn build_get_task(&self, id: i64) -> Result<HttpRequest> {
        self.core
            .build(HttpMethod::Get, &Self::task_path(id), &[], None)
    }

    pub fn build_create_task(&self, input: &CreateTask) -> Result<HttpRequest> {
        self.core.build_json(HttpMethod::Post, TASKS_PATH, input)
    }

    /// Full update (`PUT`): the server replaces the provided fields.
    pub fn build_update_task(&self, id: i64, input: &UpdateTask) -> Result<HttpRequest> {
        self.core
            .build_json(HttpMethod::Put, &Self::task_path(id), input)
    }

    /// Partial update (`PATCH`).
    pub fn build_patch_task(&self, id: i64, input: &PatchTask) -> Result<HttpRequest> {
        self.core
            .build_json(HttpMethod::Patch, &Self::task_path(id), input)
    }

    pub fn build_delete_task(&self, id: i64) -> Result<HttpRequest> {
        self.core
            .build(HttpMethod::Delete, &Self::task_path(id), &[], None)
    }

    pub fn parse_list_tasks(&self, response: HttpResponse) -> Result<Page<Task>> {
        self.core.parse_json(response)
    }

    pub fn parse_get_task(&self, response: HttpResponse) -> Result<Task> {
        self.core.parse_json(response)
    }

    pub fn parse_create_task(&self, response: HttpResponse) -> Result<Task> {
        self.core.parse_json(response)
    }

    pub fn parse_update_task(&self, response: HttpResponse) -> Result<Task> {
        self.core.parse_json(response)
    }

    pub fn parse_patch_task(&self, response: HttpResponse) -> Result<Task> {
        self.core.parse_json(response)
    }

    /// Success carries no value; an absent error means the task is gone.
    pub fn parse_delete_task(&self, response: HttpResponse) -> Result<()> {
        self.core.parse_empty(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ApiError;
    use crate::session::MemorySessionStore;

    fn client() -> TaskClient {
        TaskClient::new(RequestCore::new(
            "http://localhost:8000",
            Arc::new(MemorySessionStore::with_token("tok")),
        ))
    }

    fn body_json(req: &HttpRequest) -> serde_json::Value {
        serde_json::from_str(req.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn build_list_tasks_without_query() {
        let req = client().build_list_tasks(&ListTasksQuery::default()).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/api/v1/tasks");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_list_tasks_encodes_only_defined_parameters() {
        let query = ListTasksQuery {
            is_completed: Some(true),
            limit: Some(10),
            offset: None,
        };
        let req = client().build_list_tasks(&query).unwrap();
        assert_eq!(
            req.url,
            "http://localhost:8000/api/v1/tasks?is_completed=true&limit=10"
        );
        assert!(!req.url.contains("offset"));
    }

    #[test]
    fn build_get_task_produces_correct_request() {
        let req = client().build_get_task(42).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/api/v1/tasks/42");
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn build_create_task_produces_correct_request() {
        let req = client().build_create_task(&CreateTask::new("Buy milk")).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/api/v1/tasks");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(r#"{"title":"Buy milk"}"#));
    }

    #[test]
    fn build_update_task_produces_correct_request() {
        let input = UpdateTask {
            title: Some("Renamed".to_string()),
            description: Some("Details".to_string()),
        };
        let req = client().build_update_task(3, &input).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:8000/api/v1/tasks/3");
        let body = body_json(&req);
        assert_eq!(body["title"], "Renamed");
        assert_eq!(body["description"], "Details");
    }

    #[test]
    fn build_patch_task_sends_only_set_fields() {
        let input = PatchTask {
            is_completed: Some(true),
            ..Default::default()
        };
        let req = client().build_patch_task(3, &input).unwrap();
        assert_eq!(req.method, HttpMethod::Patch);
        let body = body_json(&req);
        assert_eq!(body, serde_json::json!({"is_completed": true}));
    }

    #[test]
    fn build_delete_task_produces_correct_request() {
        let req = client().build_delete_task(9).unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:8000/api/v1/tasks/9");
        assert!(req.body.is_none());
    }

    #[test]
    fn parse_list_tasks_success() {
        let response = HttpResponse::new(
            200,
            r#"{"items":[{"id":1,"title":"Test","description":null,"is_completed":false}],"total":1,"limit":50,"offset":0}"#,
        );
        let page = client().parse_list_tasks(response).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Test");
    }

    #[test]
    fn parse_get_task_not_found() {
        let response = HttpResponse::new(404, r#"{"detail":"Task not found"}"#);
        let err = client().parse_get_task(response).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "HTTP 404: Task not found");
    }

    #[test]
    fn parse_create_task_success() {
        let response = HttpResponse::new(
            201,
            r#"{"id":12,"title":"Buy milk","description":null,"is_completed":false}"#,
        );
        let task = client().parse_create_task(response).unwrap();
        assert_eq!(task.id, 12);
        assert_eq!(task.title, "Buy milk");
    }

    #[test]
    fn parse_patch_task_success() {
        let response =
            HttpResponse::new(200, r#"{"id":3,"title":"T","is_completed":true}"#);
        let task = client().parse_patch_task(response).unwrap();
        assert!(task.is_completed);
    }

    #[test]
    fn parse_update_task_unauthorized() {
        let response = HttpResponse::new(
            401,
            r#"{"detail":"Not authenticated","error_code":"UNAUTHORIZED"}"#,
        );
        let err = client().parse_update_task(response).unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.error_code(), Some("UNAUTHORIZED"));
    }

    #[test]
    fn parse_delete_task_ignores_body() {
        assert!(client().parse_delete_task(HttpResponse::new(204, "")).is_ok());
        assert!(client()
            .parse_delete_task(HttpResponse::new(200, r#"{"ok":true}"#))
            .is_ok());
    }

    #[test]
    fn parse_list_tasks_bad_json() {
        let err = client()
            .parse_list_tasks(HttpResponse::new(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
