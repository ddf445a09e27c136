//! Public operation surface.
//!
//! [`Service`] owns the stores, the identity gate and the completion
//! client. Every state-changing operation checks the gate first and
//! returns [`ServiceError::Unauthorized`] without touching any store when
//! the caller is not allowed. The two listing operations are open to all
//! callers.
//!
//! State crosses a restart through [`Service::snapshot`] and
//! [`Service::restore`]; nothing is persisted per call.

use std::sync::Arc;

use parley_proto::message::{ChatMessage, Role};
use parley_proto::snapshot::StateSnapshot;
use parley_proto::task::{Task, TaskId, TaskStatus};

use crate::auth::{CallerId, IdentityGate};
use crate::clock::{Clock, SystemClock};
use crate::completion::{CompletionClient, GenerationBackend};
use crate::error::ServiceError;
use crate::store::MessageStore;
use crate::tasks::TaskStore;

/// The chat and task service.
pub struct Service<B> {
    gate: IdentityGate,
    messages: Arc<MessageStore>,
    tasks: TaskStore,
    completion: Arc<CompletionClient<B>>,
    clock: Arc<dyn Clock>,
}

impl<B: GenerationBackend> Service<B> {
    /// Creates a service with empty state and the system clock.
    pub fn new(root: CallerId, completion: CompletionClient<B>) -> Self {
        Self::restore(StateSnapshot::default(), root, completion, Arc::new(SystemClock))
    }

    /// Rebuilds a service from a snapshot taken by [`Service::snapshot`].
    ///
    /// Consumes the snapshot; it has no further use once the live stores
    /// exist.
    pub fn restore(
        snapshot: StateSnapshot,
        root: CallerId,
        completion: CompletionClient<B>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let StateSnapshot {
            messages,
            tasks,
            next_task_id,
            authorized,
        } = snapshot;
        tracing::info!(
            messages = messages.len(),
            tasks = tasks.len(),
            next_task_id,
            authorized = authorized.len(),
            "restoring service state"
        );
        Self {
            gate: IdentityGate::restore(root, authorized),
            messages: Arc::new(MessageStore::restore(messages)),
            tasks: TaskStore::restore(tasks, next_task_id),
            completion: Arc::new(completion),
            clock,
        }
    }

    /// Flattens all persistent state for storage across a restart.
    pub async fn snapshot(&self) -> StateSnapshot {
        let (tasks, next_task_id) = self.tasks.snapshot().await;
        StateSnapshot {
            messages: self.messages.snapshot().await,
            tasks,
            next_task_id,
            authorized: self.gate.snapshot().await,
        }
    }

    /// Returns the identity gate.
    pub const fn gate(&self) -> &IdentityGate {
        &self.gate
    }

    async fn require_authorized(&self, caller: &CallerId) -> Result<(), ServiceError> {
        if self.gate.is_authorized(caller).await {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "unauthorized call rejected");
            Err(ServiceError::Unauthorized)
        }
    }

    /// Stores `content` as a user message, asks the backend for a reply and
    /// stores that reply as an assistant message.
    ///
    /// Backend failures do not surface here: the reply is then the fallback
    /// text. Once the user message is stored, the reply is stored too, even
    /// if this future is dropped before it resolves. Other calls may read or write the stores while the reply is
    /// pending; the user message is visible before the reply exists.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for callers without access, or
    /// [`ServiceError::Internal`] if the completion task itself dies. The
    /// user message stays stored in the latter case.
    pub async fn send_message(
        &self,
        caller: &CallerId,
        content: String,
    ) -> Result<ChatMessage, ServiceError> {
        self.require_authorized(caller).await?;

        let user_msg = self
            .messages
            .append(Role::User, content.clone(), self.clock.now_nanos())
            .await;
        tracing::info!(caller = %caller, key = %user_msg.timestamp, "user message stored");

        // The reply is generated and stored on its own task, so it lands in
        // the transcript even if the caller stops waiting.
        let completion = Arc::clone(&self.completion);
        let messages = Arc::clone(&self.messages);
        let clock = Arc::clone(&self.clock);
        let task_caller = caller.clone();
        let handle = tokio::spawn(async move {
            let reply = completion.generate(&content).await;
            if reply.is_fallback() {
                tracing::warn!(caller = %task_caller, "storing fallback reply");
            }
            messages
                .append(Role::Assistant, reply.into_text(), clock.now_nanos())
                .await
        });
        let assistant_msg = handle.await.map_err(|e| {
            tracing::error!(caller = %caller, error = %e, "completion task failed");
            ServiceError::Internal(e.to_string())
        })?;
        Ok(assistant_msg)
    }

    /// Creates a `Pending` task.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for callers without access.
    pub async fn create_task(
        &self,
        caller: &CallerId,
        description: String,
    ) -> Result<Task, ServiceError> {
        self.require_authorized(caller).await?;
        let task = self.tasks.create(description, self.clock.now_nanos()).await;
        tracing::info!(caller = %caller, task_id = %task.id, "task created");
        Ok(task)
    }

    /// Returns a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for callers without access, or
    /// [`ServiceError::NotFound`] for an unknown id.
    pub async fn get_task(&self, caller: &CallerId, id: &TaskId) -> Result<Task, ServiceError> {
        self.require_authorized(caller).await?;
        self.tasks.get(id).await
    }

    /// Sets a task's status. Any status may follow any other.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for callers without access, or
    /// [`ServiceError::NotFound`] for an unknown id.
    pub async fn update_task_status(
        &self,
        caller: &CallerId,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, ServiceError> {
        self.require_authorized(caller).await?;
        let task = self
            .tasks
            .update_status(id, status, self.clock.now_nanos())
            .await?;
        tracing::info!(caller = %caller, task_id = %id, status = %status, "task status updated");
        Ok(task)
    }

    /// Grants `user` access. Only the root identity may call this.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] if `caller` is not the root.
    pub async fn add_authorized_user(
        &self,
        caller: &CallerId,
        user: &CallerId,
    ) -> Result<(), ServiceError> {
        self.gate.add_authorized_user(caller, user).await
    }

    /// Returns the full transcript in key order. Open to all callers.
    pub async fn chat_history(&self) -> Vec<ChatMessage> {
        self.messages.list_all().await
    }

    /// Returns every task. Open to all callers.
    pub async fn all_tasks(&self) -> Vec<Task> {
        self.tasks.list_all().await
    }
}
