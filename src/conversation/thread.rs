//! Append-only message sequence with an optional trailing placeholder.

use thiserror::Error;

use super::message::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error("a reply is still pending at the end of the thread")]
    PlaceholderPending,
    #[error("no pending reply at the end of the thread")]
    NoPlaceholder,
    #[error("a pending reply can only be resolved by an assistant message")]
    NotAssistant,
}

/// One ordered conversation. A placeholder, when present, is always last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageThread {
    messages: Vec<Message>,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            messages: messages
                .into_iter()
                .filter(|m| !m.is_placeholder())
                .collect(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_placeholder(&self) -> bool {
        self.messages.last().is_some_and(Message::is_placeholder)
    }

    /// Messages suitable for the backend: everything but the placeholder.
    pub fn history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !m.is_placeholder())
            .cloned()
            .collect()
    }

    pub fn append(&mut self, message: Message) -> Result<(), ThreadError> {
        if self.has_placeholder() {
            return Err(ThreadError::PlaceholderPending);
        }
        if message.is_placeholder() {
            return self.append_placeholder();
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn append_placeholder(&mut self) -> Result<(), ThreadError> {
        if self.has_placeholder() {
            return Err(ThreadError::PlaceholderPending);
        }
        self.messages.push(Message::placeholder());
        Ok(())
    }

    pub fn resolve_placeholder(&mut self, message: Message) -> Result<(), ThreadError> {
        if !self.has_placeholder() {
            return Err(ThreadError::NoPlaceholder);
        }
        if message.role != Role::Assistant || message.is_placeholder() {
            return Err(ThreadError::NotAssistant);
        }
        if let Some(last) = self.messages.last_mut() {
            *last = message;
        }
        Ok(())
    }

    pub fn drop_placeholder(&mut self) -> Result<(), ThreadError> {
        if !self.has_placeholder() {
            return Err(ThreadError::NoPlaceholder);
        }
        self.messages.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_with_pending() -> MessageThread {
        let mut thread = MessageThread::seeded([Message::assistant("Hello")]);
        thread.append(Message::user("ping")).unwrap();
        thread.append_placeholder().unwrap();
        thread
    }

    #[test]
    fn test_append_refused_behind_placeholder() {
        let mut thread = thread_with_pending();
        assert_eq!(
            thread.append(Message::user("again")),
            Err(ThreadError::PlaceholderPending)
        );
        assert_eq!(thread.append_placeholder(), Err(ThreadError::PlaceholderPending));
        assert_eq!(thread.len(), 3);
    }

    #[test]
    fn test_resolve_replaces_trailing_placeholder() {
        let mut thread = thread_with_pending();
        thread.resolve_placeholder(Message::assistant("pong")).unwrap();
        assert_eq!(
            thread.messages(),
            &[
                Message::assistant("Hello"),
                Message::user("ping"),
                Message::assistant("pong"),
            ]
        );
        assert!(!thread.has_placeholder());
    }

    #[test]
    fn test_resolve_requires_assistant_reply() {
        let mut thread = thread_with_pending();
        assert_eq!(
            thread.resolve_placeholder(Message::user("nope")),
            Err(ThreadError::NotAssistant)
        );
        assert!(thread.has_placeholder());
    }

    #[test]
    fn test_drop_restores_previous_sequence() {
        let mut thread = MessageThread::seeded([Message::assistant("Hello")]);
        thread.append(Message::user("ping")).unwrap();
        let before = thread.clone();
        thread.append_placeholder().unwrap();
        thread.drop_placeholder().unwrap();
        assert_eq!(thread, before);
    }

    #[test]
    fn test_operations_without_placeholder_are_errors() {
        let mut thread = MessageThread::new();
        assert_eq!(thread.drop_placeholder(), Err(ThreadError::NoPlaceholder));
        assert_eq!(
            thread.resolve_placeholder(Message::assistant("x")),
            Err(ThreadError::NoPlaceholder)
        );
        assert!(thread.is_empty());
    }

    #[test]
    fn test_history_never_contains_placeholder() {
        let thread = thread_with_pending();
        let history = thread.history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| !m.is_placeholder()));
    }
}
