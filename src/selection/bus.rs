use std::sync::Arc;

use tokio::sync::watch;

use super::SelectionContext;

/// Carries the single active selection context from the tracker to the
/// affordance. Receivers always observe the most recent gesture's result.
#[derive(Clone)]
pub struct SelectionBus {
    tx: Arc<watch::Sender<Option<SelectionContext>>>,
}

impl Default for SelectionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionBus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, context: SelectionContext) {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&context) {
                false
            } else {
                *current = Some(context);
                true
            }
        });
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|current| current.take().is_some());
    }

    pub fn current(&self) -> Option<SelectionContext> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SelectionContext>> {
        self.tx.subscribe()
    }
}
