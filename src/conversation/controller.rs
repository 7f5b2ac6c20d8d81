//! Drives the [`ConversationStore`] against an [`AssistantBackend`].
//!
//! Backend calls run on spawned tasks and report back through an internal
//! channel. The owner of the controller pulls those events with
//! [`ConversationController::next_event`] and applies them with
//! [`ConversationController::handle`] on its own task, so every mutation of
//! the conversation happens in one place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::store::{BranchId, ConversationStore, Outcome, SendRejected, ThreadKey, ThreadTarget};
use crate::backend::{AssistantBackend, BackendError};

#[derive(Debug)]
pub enum ControllerEvent {
    Reply {
        key: ThreadKey,
        result: Result<String, BackendError>,
    },
    CloseElapsed(BranchId),
}

/// What changed after an event was applied, for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerUpdate {
    Resolved(ThreadTarget),
    Failed { target: ThreadTarget, error: String },
    Discarded,
    BranchClosed,
}

pub struct ConversationController {
    store: ConversationStore,
    backend: Arc<dyn AssistantBackend>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    close_grace: Duration,
}

impl ConversationController {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        store: ConversationStore,
        close_grace: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            backend,
            events_tx,
            events_rx,
            close_grace,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn backend_label(&self) -> String {
        self.backend.describe()
    }

    pub fn send_message(&mut self, target: ThreadTarget, text: &str) -> Result<(), SendRejected> {
        let exchange = self.store.begin_send(target, text)?;
        info!(thread = target.label(), "sending message");
        self.dispatch(exchange.key, exchange.messages);
        Ok(())
    }

    pub fn create_branch(&mut self, selected_text: &str) -> Result<(), SendRejected> {
        let exchange = self.store.open_branch(selected_text)?;
        self.dispatch(exchange.key, exchange.messages);
        Ok(())
    }

    /// Marks the branch as closing now and discards it after the grace window.
    pub fn close_branch(&mut self) -> bool {
        let Some(id) = self.store.begin_close() else {
            return false;
        };

        let tx = self.events_tx.clone();
        let grace = self.close_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(ControllerEvent::CloseElapsed(id));
        });
        true
    }

    pub fn new_conversation(&mut self) {
        self.store.reset();
    }

    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        self.events_rx.recv().await
    }

    pub fn handle(&mut self, event: ControllerEvent) -> ControllerUpdate {
        match event {
            ControllerEvent::Reply { key, result } => match self.store.complete(key, result) {
                Outcome::Resolved(target) => ControllerUpdate::Resolved(target),
                Outcome::RolledBack { target, error } => ControllerUpdate::Failed { target, error },
                Outcome::Stale => ControllerUpdate::Discarded,
            },
            ControllerEvent::CloseElapsed(id) => {
                if self.store.finish_close(id) {
                    ControllerUpdate::BranchClosed
                } else {
                    debug!(branch = %id, "close timer fired for a branch that is already gone");
                    ControllerUpdate::Discarded
                }
            }
        }
    }

    fn dispatch(&self, key: ThreadKey, messages: Vec<crate::conversation::Message>) {
        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.exchange(&messages).await;
            let _ = tx.send(ControllerEvent::Reply { key, result });
        });
    }
}
