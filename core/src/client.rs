//! `ApiClient`: the resource clients joined to a transport.
//!
//! Every method is `build_*`, one `Transport::execute`, then `parse_*`.
//! Calls are independent of each other; sequencing (sign in before an
//! authenticated call) is the caller's job.

use std::sync::Arc;

use crate::auth::AuthClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::request::RequestCore;
use crate::session::{SessionCookie, SessionStore};
use crate::tasks::TaskClient;
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    AuthResponse, CreateTask, Credentials, ListTasksQuery, Page, PatchTask, SessionState, Task,
    UpdateTask,
};

#[derive(Debug, Clone)]
pub struct ApiClient<T = UreqTransport> {
    tasks: TaskClient,
    auth: AuthClient,
    transport: T,
}

impl ApiClient<UreqTransport> {
    /// Client for `config.base_url` over a fresh `ureq` agent.
    pub fn connect(config: &ClientConfig, session: Arc<dyn SessionStore>) -> Self {
        Self::new(RequestCore::from_config(config, session), UreqTransport::new())
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(core: RequestCore, transport: T) -> Self {
        Self {
            tasks: TaskClient::new(core.clone()),
            auth: AuthClient::new(core),
            transport,
        }
    }

    /// The I/O-free task builders and parsers.
    pub fn tasks(&self) -> &TaskClient {
        &self.tasks
    }

    /// The I/O-free auth builders and parsers.
    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send(&self, request: Result<HttpRequest>) -> Result<HttpResponse> {
        self.transport.execute(&request?)
    }

    pub fn list_tasks(&self, query: &ListTasksQuery) -> Result<Page<Task>> {
        let response = self.send(self.tasks.build_list_tasks(query))?;
        self.tasks.parse_list_tasks(response)
    }

    pub fn get_task(&self, id: i64) -> Result<Task> {
        let response = self.send(self.tasks.build_get_task(id))?;
        self.tasks.parse_get_task(response)
    }

    pub fn create_task(&self, input: &CreateTask) -> Result<Task> {
        let response = self.send(self.tasks.build_create_task(input))?;
        self.tasks.parse_create_task(response)
    }

    pub fn update_task(&self, id: i64, input: &UpdateTask) -> Result<Task> {
        let response = self.send(self.tasks.build_update_task(id, input))?;
        self.tasks.parse_update_task(response)
    }

    pub fn patch_task(&self, id: i64, input: &PatchTask) -> Result<Task> {
        let response = self.send(self.tasks.build_patch_task(id, input))?;
        self.tasks.parse_patch_task(response)
    }

    pub fn delete_task(&self, id: i64) -> Result<()> {
        let response = self.send(self.tasks.build_delete_task(id))?;
        self.tasks.parse_delete_task(response)
    }

    pub fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let response = self.send(self.auth.build_sign_in(credentials))?;
        self.auth.parse_sign_in(response)
    }

    pub fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let response = self.send(self.auth.build_sign_up(credentials))?;
        self.auth.parse_sign_up(response)
    }

    pub fn sign_out(&self) -> Result<SessionCookie> {
        self.auth.sign_out()
    }

    pub fn check_session(&self) -> Result<SessionState> {
        self.auth.check_session()
    }
}
