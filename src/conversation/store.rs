//! The conversation set (main + optional branch) and every mutation on it.
//!
//! The store is synchronous. Callers that talk to a backend take the
//! [`Exchange`] returned by [`ConversationStore::begin_send`] or
//! [`ConversationStore::open_branch`], perform the request elsewhere, and hand
//! the result back through [`ConversationStore::complete`] together with the
//! exchange's [`ThreadKey`]. Keys that no longer name the current thread are
//! discarded, which is what keeps a late reply from touching a closed or
//! replaced branch.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::message::Message;
use super::thread::MessageThread;
use crate::backend::BackendError;

pub const GREETING: &str = "Hello! How can I assist you today?";

pub const BRANCH_PRIMER: &str = "You are starting a new conversation branch based on selected text from a previous conversation. Acknowledge the context and answer the user or ask for further information if needed.";

/// Seed message for a new branch. `{selection}` is replaced by the selected text.
pub const DEFAULT_BRANCH_TEMPLATE: &str =
    "Branch: \"{selection}\". Can we please explore this futher?.";

const SELECTION_SLOT: &str = "{selection}";

pub fn seed_from_template(template: &str, selected: &str) -> String {
    if template.contains(SELECTION_SLOT) {
        template.replace(SELECTION_SLOT, selected)
    } else {
        format!("{} \"{}\"", template.trim_end(), selected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(u64);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch-{}", self.0)
    }
}

/// Which of the two threads an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadTarget {
    Main,
    Branch,
}

impl ThreadTarget {
    pub fn label(&self) -> &'static str {
        match self {
            ThreadTarget::Main => "main",
            ThreadTarget::Branch => "branch",
        }
    }
}

/// Identity of a concrete thread instance, carried by every in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadKey {
    Main { epoch: u64 },
    Branch(BranchId),
}

impl ThreadKey {
    pub fn target(&self) -> ThreadTarget {
        match self {
            ThreadKey::Main { .. } => ThreadTarget::Main,
            ThreadKey::Branch(_) => ThreadTarget::Branch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchPhase {
    Open,
    /// Close was requested; the thread is kept only for the exit animation.
    Closing,
}

#[derive(Debug, Clone)]
pub struct Branch {
    id: BranchId,
    thread: MessageThread,
    phase: BranchPhase,
    loading: bool,
}

impl Branch {
    pub fn id(&self) -> BranchId {
        self.id
    }

    pub fn thread(&self) -> &MessageThread {
        &self.thread
    }

    pub fn is_closing(&self) -> bool {
        self.phase == BranchPhase::Closing
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSet {
    main: MessageThread,
    branch: Option<Branch>,
}

impl ConversationSet {
    fn greeting() -> Self {
        Self {
            main: MessageThread::seeded([Message::assistant(GREETING)]),
            branch: None,
        }
    }

    pub fn main(&self) -> &MessageThread {
        &self.main
    }

    pub fn branch(&self) -> Option<&Branch> {
        self.branch.as_ref()
    }

    pub fn thread(&self, target: ThreadTarget) -> Option<&MessageThread> {
        match target {
            ThreadTarget::Main => Some(&self.main),
            ThreadTarget::Branch => self.branch.as_ref().map(Branch::thread),
        }
    }
}

/// A request the caller must deliver to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub key: ThreadKey,
    pub messages: Vec<Message>,
}

/// Input refused before any state was touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendRejected {
    #[error("nothing to send")]
    EmptyInput,
    #[error("nothing selected to branch from")]
    EmptySelection,
    #[error("still waiting for the previous reply")]
    Busy,
    #[error("there is no branch open")]
    NoBranch,
    #[error("the branch is closing")]
    BranchClosing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(ThreadTarget),
    RolledBack { target: ThreadTarget, error: String },
    /// The reply belonged to a thread that is gone or no longer current.
    Stale,
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    set: ConversationSet,
    main_epoch: u64,
    main_loading: bool,
    next_branch: u64,
    branch_template: String,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_BRANCH_TEMPLATE)
    }
}

impl ConversationStore {
    pub fn new(branch_template: impl Into<String>) -> Self {
        Self {
            set: ConversationSet::greeting(),
            main_epoch: 0,
            main_loading: false,
            next_branch: 1,
            branch_template: branch_template.into(),
        }
    }

    pub fn conversation(&self) -> &ConversationSet {
        &self.set
    }

    pub fn is_loading(&self, target: ThreadTarget) -> bool {
        match target {
            ThreadTarget::Main => self.main_loading,
            ThreadTarget::Branch => self.set.branch.as_ref().is_some_and(Branch::is_loading),
        }
    }

    pub fn any_loading(&self) -> bool {
        self.is_loading(ThreadTarget::Main) || self.is_loading(ThreadTarget::Branch)
    }

    /// Optimistically appends `text` and a placeholder to `target`.
    pub fn begin_send(
        &mut self,
        target: ThreadTarget,
        text: &str,
    ) -> Result<Exchange, SendRejected> {
        if text.trim().is_empty() {
            return Err(SendRejected::EmptyInput);
        }

        let (key, thread, loading) = match target {
            ThreadTarget::Main => (
                ThreadKey::Main {
                    epoch: self.main_epoch,
                },
                &mut self.set.main,
                &mut self.main_loading,
            ),
            ThreadTarget::Branch => {
                let branch = self.set.branch.as_mut().ok_or(SendRejected::NoBranch)?;
                if branch.is_closing() {
                    return Err(SendRejected::BranchClosing);
                }
                (ThreadKey::Branch(branch.id), &mut branch.thread, &mut branch.loading)
            }
        };

        if *loading || thread.has_placeholder() {
            return Err(SendRejected::Busy);
        }

        let user = Message::user(text);
        let mut messages = thread.history();
        messages.push(user.clone());

        thread.append(user).map_err(|_| SendRejected::Busy)?;
        thread.append_placeholder().map_err(|_| SendRejected::Busy)?;
        *loading = true;

        debug!(thread = target.label(), outbound = messages.len(), "send started");
        Ok(Exchange { key, messages })
    }

    /// Replaces any branch with a fresh one seeded from `selected`.
    pub fn open_branch(&mut self, selected: &str) -> Result<Exchange, SendRejected> {
        let selected = selected.trim();
        if selected.is_empty() {
            return Err(SendRejected::EmptySelection);
        }

        let seed = Message::user(seed_from_template(&self.branch_template, selected));
        let mut thread = MessageThread::seeded([seed.clone()]);
        thread
            .append_placeholder()
            .map_err(|_| SendRejected::Busy)?;

        let id = BranchId(self.next_branch);
        self.next_branch += 1;

        if let Some(previous) = self.set.branch.take() {
            info!(replaced = %previous.id, branch = %id, "branch replaced");
        } else {
            info!(branch = %id, "branch opened");
        }

        self.set.branch = Some(Branch {
            id,
            thread,
            phase: BranchPhase::Open,
            loading: true,
        });

        Ok(Exchange {
            key: ThreadKey::Branch(id),
            messages: vec![Message::system(BRANCH_PRIMER), seed],
        })
    }

    /// Applies a backend result to the thread named by `key`.
    pub fn complete(&mut self, key: ThreadKey, result: Result<String, BackendError>) -> Outcome {
        let target = key.target();
        let (thread, loading) = match key {
            ThreadKey::Main { epoch } if epoch == self.main_epoch && self.main_loading => {
                (&mut self.set.main, &mut self.main_loading)
            }
            ThreadKey::Branch(id) => match self.set.branch.as_mut() {
                Some(branch) if branch.id == id && !branch.is_closing() && branch.loading => {
                    (&mut branch.thread, &mut branch.loading)
                }
                _ => {
                    debug!(branch = %id, "discarding reply for a branch that is no longer current");
                    return Outcome::Stale;
                }
            },
            ThreadKey::Main { epoch } => {
                debug!(epoch, current = self.main_epoch, "discarding reply for a reset main thread");
                return Outcome::Stale;
            }
        };

        *loading = false;
        match result {
            Ok(reply) => {
                if let Err(err) = thread.resolve_placeholder(Message::assistant(reply)) {
                    warn!(thread = target.label(), %err, "reply arrived without a pending slot");
                    return Outcome::Stale;
                }
                debug!(thread = target.label(), "reply resolved");
                Outcome::Resolved(target)
            }
            Err(err) => {
                if let Err(drop_err) = thread.drop_placeholder() {
                    warn!(thread = target.label(), err = %drop_err, "rollback found no pending slot");
                }
                warn!(thread = target.label(), %err, "send failed, placeholder dropped");
                Outcome::RolledBack {
                    target,
                    error: err.to_string(),
                }
            }
        }
    }

    /// First phase of closing. Returns the branch to discard once the grace
    /// window elapses, or `None` if there was nothing open to close.
    pub fn begin_close(&mut self) -> Option<BranchId> {
        let branch = self.set.branch.as_mut()?;
        if branch.is_closing() {
            return None;
        }
        branch.phase = BranchPhase::Closing;
        info!(branch = %branch.id, "branch closing");
        Some(branch.id)
    }

    /// Second phase of closing. Only removes the branch if it is still the one
    /// that was closed.
    pub fn finish_close(&mut self, id: BranchId) -> bool {
        match self.set.branch.as_ref() {
            Some(branch) if branch.id == id && branch.is_closing() => {
                self.set.branch = None;
                info!(branch = %id, "branch closed");
                true
            }
            _ => false,
        }
    }

    /// Back to the single greeting, with no branch and no grace window.
    pub fn reset(&mut self) {
        self.set = ConversationSet::greeting();
        self.main_epoch += 1;
        self.main_loading = false;
        info!(epoch = self.main_epoch, "new conversation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_error() -> BackendError {
        BackendError::Network("connection refused".to_string())
    }

    fn main_messages(store: &ConversationStore) -> Vec<Message> {
        store.conversation().main().messages().to_vec()
    }

    #[test]
    fn test_send_resolves_reply_on_main() {
        let mut store = ConversationStore::default();
        let exchange = store.begin_send(ThreadTarget::Main, "What is 2+2?").unwrap();
        assert_eq!(
            exchange.messages,
            vec![Message::assistant(GREETING), Message::user("What is 2+2?")]
        );
        assert!(store.is_loading(ThreadTarget::Main));
        assert!(store.conversation().main().has_placeholder());

        let outcome = store.complete(exchange.key, Ok("4".to_string()));
        assert_eq!(outcome, Outcome::Resolved(ThreadTarget::Main));
        assert_eq!(
            main_messages(&store),
            vec![
                Message::assistant(GREETING),
                Message::user("What is 2+2?"),
                Message::assistant("4"),
            ]
        );
        assert!(!store.is_loading(ThreadTarget::Main));
    }

    #[test]
    fn test_failed_send_keeps_user_message() {
        let mut store = ConversationStore::default();
        let exchange = store.begin_send(ThreadTarget::Main, "test").unwrap();
        let outcome = store.complete(exchange.key, Err(network_error()));

        assert!(matches!(outcome, Outcome::RolledBack { target: ThreadTarget::Main, .. }));
        assert_eq!(
            main_messages(&store),
            vec![Message::assistant(GREETING), Message::user("test")]
        );
        assert!(!store.is_loading(ThreadTarget::Main));
    }

    #[test]
    fn test_retry_after_failure_sends_prior_user_message_too() {
        let mut store = ConversationStore::default();
        let first = store.begin_send(ThreadTarget::Main, "test").unwrap();
        store.complete(first.key, Err(network_error()));

        let retry = store.begin_send(ThreadTarget::Main, "test").unwrap();
        assert_eq!(retry.messages.len(), 3);
        assert_eq!(retry.messages[1], Message::user("test"));
        assert_eq!(retry.messages[2], Message::user("test"));
    }

    #[test]
    fn test_whitespace_send_is_rejected_without_mutation() {
        let mut store = ConversationStore::default();
        assert_eq!(
            store.begin_send(ThreadTarget::Main, "  \n\t "),
            Err(SendRejected::EmptyInput)
        );
        assert_eq!(main_messages(&store), vec![Message::assistant(GREETING)]);
        assert!(!store.any_loading());
    }

    #[test]
    fn test_second_send_on_same_thread_is_rejected_while_loading() {
        let mut store = ConversationStore::default();
        store.begin_send(ThreadTarget::Main, "one").unwrap();
        assert_eq!(
            store.begin_send(ThreadTarget::Main, "two"),
            Err(SendRejected::Busy)
        );
        assert_eq!(store.conversation().main().len(), 3);
    }

    #[test]
    fn test_branch_seed_and_request_exclude_main_history() {
        let mut store = ConversationStore::default();
        let exchange = store.open_branch("4").unwrap();
        let seed = Message::user("Branch: \"4\". Can we please explore this futher?.");

        assert_eq!(
            exchange.messages,
            vec![Message::system(BRANCH_PRIMER), seed.clone()]
        );
        let branch = store.conversation().branch().unwrap();
        assert_eq!(branch.thread().messages(), &[seed.clone(), Message::placeholder()]);

        store.complete(exchange.key, Ok("Four is even.".to_string()));
        let branch = store.conversation().branch().unwrap();
        assert_eq!(
            branch.thread().messages(),
            &[seed, Message::assistant("Four is even.")]
        );
        assert_eq!(main_messages(&store), vec![Message::assistant(GREETING)]);
    }

    #[test]
    fn test_failed_branch_keeps_only_seed() {
        let mut store = ConversationStore::default();
        let exchange = store.open_branch("fragment").unwrap();
        store.complete(exchange.key, Err(network_error()));
        let branch = store.conversation().branch().unwrap();
        assert_eq!(branch.thread().len(), 1);
        assert!(!branch.is_loading());
    }

    #[test]
    fn test_branch_follow_up_sends_branch_history_without_primer() {
        let mut store = ConversationStore::default();
        let opened = store.open_branch("4").unwrap();
        store.complete(opened.key, Ok("n=2".to_string()));
        let main_before = main_messages(&store);

        let seed = Message::user("Branch: \"4\". Can we please explore this futher?.");
        let follow_up = store.begin_send(ThreadTarget::Branch, "more").unwrap();
        assert_eq!(follow_up.key, opened.key);
        assert_eq!(
            follow_up.messages,
            vec![seed.clone(), Message::assistant("n=2"), Message::user("more")]
        );
        assert!(store.is_loading(ThreadTarget::Branch));
        assert!(!store.is_loading(ThreadTarget::Main));

        let outcome = store.complete(follow_up.key, Ok("n=3".to_string()));
        assert_eq!(outcome, Outcome::Resolved(ThreadTarget::Branch));
        let branch = store.conversation().branch().unwrap().thread().messages().to_vec();
        assert_eq!(
            branch,
            vec![
                seed,
                Message::assistant("n=2"),
                Message::user("more"),
                Message::assistant("n=3"),
            ]
        );
        assert_eq!(main_messages(&store), main_before);
    }

    #[test]
    fn test_failed_branch_follow_up_rolls_back_only_the_branch() {
        let mut store = ConversationStore::default();
        let opened = store.open_branch("4").unwrap();
        store.complete(opened.key, Ok("n=2".to_string()));

        let follow_up = store.begin_send(ThreadTarget::Branch, "more").unwrap();
        let outcome = store.complete(follow_up.key, Err(network_error()));
        assert!(matches!(outcome, Outcome::RolledBack { target: ThreadTarget::Branch, .. }));

        let branch = store.conversation().branch().unwrap();
        assert!(!branch.is_closing());
        assert!(!branch.is_loading());
        assert_eq!(branch.thread().len(), 3);
        assert_eq!(branch.thread().messages().last(), Some(&Message::user("more")));
        assert_eq!(main_messages(&store), vec![Message::assistant(GREETING)]);
    }

    #[test]
    fn test_second_branch_replaces_first_and_stales_its_reply() {
        let mut store = ConversationStore::default();
        let first = store.open_branch("alpha").unwrap();
        let second = store.open_branch("beta").unwrap();

        assert_eq!(store.complete(first.key, Ok("late".to_string())), Outcome::Stale);
        let branch = store.conversation().branch().unwrap();
        assert!(branch.thread().messages()[0].content.contains("\"beta\""));
        assert!(branch.thread().has_placeholder());

        store.complete(second.key, Ok("fresh".to_string()));
        let branch = store.conversation().branch().unwrap();
        assert_eq!(branch.thread().messages()[1], Message::assistant("fresh"));
    }

    #[test]
    fn test_branch_and_main_loading_are_independent() {
        let mut store = ConversationStore::default();
        let main = store.begin_send(ThreadTarget::Main, "main question").unwrap();
        let branch = store.open_branch("quote").unwrap();
        assert!(store.is_loading(ThreadTarget::Main));
        assert!(store.is_loading(ThreadTarget::Branch));

        store.complete(branch.key, Ok("branch answer".to_string()));
        assert!(store.is_loading(ThreadTarget::Main));
        assert_eq!(store.conversation().main().len(), 3);

        store.complete(main.key, Ok("main answer".to_string()));
        assert_eq!(store.conversation().branch().unwrap().thread().len(), 2);
    }

    #[test]
    fn test_close_is_two_phase_and_blocks_sends() {
        let mut store = ConversationStore::default();
        let exchange = store.open_branch("quote").unwrap();
        store.complete(exchange.key, Ok("reply".to_string()));

        let id = store.begin_close().unwrap();
        assert!(store.conversation().branch().unwrap().is_closing());
        assert_eq!(
            store.begin_send(ThreadTarget::Branch, "more"),
            Err(SendRejected::BranchClosing)
        );
        assert_eq!(store.begin_close(), None);

        assert!(store.finish_close(id));
        assert!(store.conversation().branch().is_none());
        assert_eq!(
            store.begin_send(ThreadTarget::Branch, "more"),
            Err(SendRejected::NoBranch)
        );
    }

    #[test]
    fn test_reply_after_close_is_discarded() {
        let mut store = ConversationStore::default();
        let exchange = store.open_branch("quote").unwrap();
        let id = store.begin_close().unwrap();

        assert_eq!(store.complete(exchange.key, Ok("late".to_string())), Outcome::Stale);
        assert!(store.finish_close(id));
        assert_eq!(store.complete(exchange.key, Ok("later".to_string())), Outcome::Stale);
        assert!(store.conversation().branch().is_none());
    }

    #[test]
    fn test_finish_close_ignores_replacement_branch() {
        let mut store = ConversationStore::default();
        store.open_branch("old").unwrap();
        let old = store.begin_close().unwrap();
        store.open_branch("new").unwrap();

        assert!(!store.finish_close(old));
        assert!(store.conversation().branch().is_some());
    }

    #[test]
    fn test_reset_discards_branch_and_stales_main_reply() {
        let mut store = ConversationStore::default();
        let main = store.begin_send(ThreadTarget::Main, "hello").unwrap();
        store.open_branch("quote").unwrap();

        store.reset();
        assert!(store.conversation().branch().is_none());
        assert!(!store.any_loading());
        assert_eq!(store.complete(main.key, Ok("late".to_string())), Outcome::Stale);
        assert_eq!(main_messages(&store), vec![Message::assistant(GREETING)]);
    }

    #[test]
    fn test_empty_selection_does_not_open_branch() {
        let mut store = ConversationStore::default();
        assert_eq!(store.open_branch("   "), Err(SendRejected::EmptySelection));
        assert!(store.conversation().branch().is_none());
    }

    #[test]
    fn test_custom_template_without_slot_appends_selection() {
        assert_eq!(
            seed_from_template("Tell me more about", "gravity"),
            "Tell me more about \"gravity\""
        );
        assert_eq!(
            seed_from_template("Explain {selection} simply", "gravity"),
            "Explain gravity simply"
        );
    }
}
