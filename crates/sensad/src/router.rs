//! Turn router - one user message in, one reply out.
//!
//! Drives the per-turn state machine:
//!
//! ```text
//! Start -> Model -> End
//!            \---> Dispatch -> End
//! ```
//!
//! Every turn opens with the system preamble followed by the user message.
//! New messages are buffered during the turn and committed to the store in a
//! single append, so a failed turn leaves the thread exactly as it was.
//! Turns on the same thread run one at a time; different threads run freely.

use crate::capabilities::CapabilityRegistry;
use crate::model::{ModelClient, ModelError, ModelReply};
use crate::store::{ConversationStore, StoreError};
use sensa_common::{CapabilityInvocationRequest, CapabilityResult, Message, Role};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Opens every turn
pub const SYSTEM_PREAMBLE: &str = "Present yourself as 'I am an IoT sensor agent', a \
     knowledgeable and friendly assistant. Focus on providing insights and guidance about sensor \
     data without returning code snippets. Maintain a professional and warm tone, adapting \
     responses to suit user needs.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Start,
    Model,
    Dispatch,
    End,
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: CapabilityResult,
    /// Messages this turn appended to the thread
    pub appended: Vec<Message>,
    /// States visited, in order
    pub states: Vec<TurnState>,
}

pub struct TurnRouter {
    model: Arc<dyn ModelClient>,
    registry: Arc<CapabilityRegistry>,
    store: Arc<dyn ConversationStore>,
    /// One lock per thread id, held for a whole turn
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnRouter {
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Arc<CapabilityRegistry>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            model,
            registry,
            store,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Run one turn for `thread_id`
    pub async fn route(&self, thread_id: &str, user_text: &str) -> Result<TurnOutcome, RouterError> {
        let lock = self
            .turn_locks
            .lock()
            .await
            .entry(thread_id.to_string())
            .or_default()
            .clone();
        let _turn = lock.lock().await;

        let mut history = Vec::new();
        let mut pending: Vec<Message> = Vec::new();
        let mut call: Option<CapabilityInvocationRequest> = None;
        let mut states = Vec::new();
        let mut state = TurnState::Start;

        while state != TurnState::End {
            states.push(state);
            state = match state {
                TurnState::Start => {
                    history = self.store.load(thread_id).await?;
                    pending.push(Message::system(SYSTEM_PREAMBLE));
                    pending.push(Message::user(user_text));
                    TurnState::Model
                }
                TurnState::Model => {
                    let context: Vec<Message> =
                        history.iter().chain(pending.iter()).cloned().collect();
                    match self.model.complete(&context, &self.registry.tools()).await? {
                        ModelReply::CapabilityCall(request) if !request.name.trim().is_empty() => {
                            debug!("[ROUTER] {} -> capability {}", thread_id, request.name);
                            pending.push(Message::capability_request(&request));
                            call = Some(request);
                            TurnState::Dispatch
                        }
                        ModelReply::CapabilityCall(_) => {
                            pending.push(Message::assistant(""));
                            TurnState::End
                        }
                        ModelReply::PlainReply(text) => {
                            pending.push(Message::assistant(text));
                            TurnState::End
                        }
                    }
                }
                TurnState::Dispatch => {
                    if let Some(request) = call.take() {
                        let result = self.registry.dispatch(&request).await;
                        pending.push(Message::tool(request.name.clone(), result.to_content()));
                    }
                    TurnState::End
                }
                TurnState::End => TurnState::End,
            };
        }
        states.push(TurnState::End);

        self.store.append(thread_id, pending.clone()).await?;

        let reply = extract_reply(&pending);
        info!(
            "[ROUTER] Thread {}: {} new messages, reply status {:?}",
            thread_id,
            pending.len(),
            reply.status
        );

        Ok(TurnOutcome {
            reply,
            appended: pending,
            states,
        })
    }
}

/// Pick the reply from a turn's messages: the last tool result if any,
/// otherwise the last assistant text.
pub fn extract_reply(turn: &[Message]) -> CapabilityResult {
    if let Some(tool) = turn.iter().rev().find(|m| m.role == Role::Tool) {
        return CapabilityResult::from_content(&tool.content);
    }

    let text = turn
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default();
    CapabilityResult::success(text, None)
}
