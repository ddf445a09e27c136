//! JSON-over-HTTP surface for the service.
//!
//! The caller identity comes from the `x-caller-id` header. Requests
//! without it run as [`CallerId::anonymous`], which is never authorized
//! unless explicitly granted.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parley_proto::message::ChatMessage;
use parley_proto::task::{Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::auth::CallerId;
use crate::completion::GenerationBackend;
use crate::error::ServiceError;
use crate::service::Service;

/// Header carrying the caller identity.
pub const CALLER_HEADER: &str = "x-caller-id";

/// Body of `POST /messages`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageBody {
    /// Text typed by the caller.
    pub content: String,
}

/// Body of `POST /tasks`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskBody {
    /// Task description.
    pub description: String,
}

/// Body of `PUT /tasks/{id}/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusBody {
    /// New status.
    pub status: TaskStatus,
}

/// Body of `POST /authorized-users`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddUserBody {
    /// Identity to authorize.
    pub user: String,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Display text of the error.
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn caller_from(headers: &HeaderMap) -> CallerId {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(CallerId::anonymous, CallerId::new)
}

/// Builds the router for `service`.
pub fn router<B: GenerationBackend>(service: Arc<Service<B>>) -> Router {
    Router::new()
        .route("/messages", post(send_message::<B>).get(chat_history::<B>))
        .route("/tasks", post(create_task::<B>).get(all_tasks::<B>))
        .route("/tasks/{id}", get(get_task::<B>))
        .route("/tasks/{id}/status", put(update_task_status::<B>))
        .route("/authorized-users", post(add_authorized_user::<B>))
        .with_state(service)
}

/// Serves `service` on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<B, F>(
    listener: tokio::net::TcpListener,
    service: Arc<Service<B>>,
    shutdown: F,
) -> std::io::Result<()>
where
    B: GenerationBackend,
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Starts the server in the background.
///
/// Binding to port `0` picks a free port; the bound address is returned.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server<B: GenerationBackend>(
    addr: &str,
    service: Arc<Service<B>>,
) -> std::io::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;
    let app = router(service);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "http server error");
        }
    });

    Ok((bound_addr, handle))
}

async fn send_message<B: GenerationBackend>(
    State(service): State<Arc<Service<B>>>,
    headers: HeaderMap,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<ChatMessage>, ServiceError> {
    let caller = caller_from(&headers);
    service.send_message(&caller, body.content).await.map(Json)
}

async fn chat_history<B: GenerationBackend>(
    State(service): State<Arc<Service<B>>>,
) -> Json<Vec<ChatMessage>> {
    Json(service.chat_history().await)
}

async fn create_task<B: GenerationBackend>(
    State(service): State<Arc<Service<B>>>,
    headers: HeaderMap,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<Task>), ServiceError> {
    let caller = caller_from(&headers);
    let task = service.create_task(&caller, body.description).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn all_tasks<B: GenerationBackend>(
    State(service): State<Arc<Service<B>>>,
) -> Json<Vec<Task>> {
    Json(service.all_tasks().await)
}

async fn get_task<B: GenerationBackend>(
    State(service): State<Arc<Service<B>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Task>, ServiceError> {
    let caller = caller_from(&headers);
    service.get_task(&caller, &TaskId::from(id)).await.map(Json)
}

async fn update_task_status<B: GenerationBackend>(
    State(service): State<Arc<Service<B>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Task>, ServiceError> {
    let caller = caller_from(&headers);
    service
        .update_task_status(&caller, &TaskId::from(id), body.status)
        .await
        .map(Json)
}

async fn add_authorized_user<B: GenerationBackend>(
    State(service): State<Arc<Service<B>>>,
    headers: HeaderMap,
    Json(body): Json<AddUserBody>,
) -> Result<StatusCode, ServiceError> {
    let caller = caller_from(&headers);
    service
        .add_authorized_user(&caller, &CallerId::new(body.user))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
