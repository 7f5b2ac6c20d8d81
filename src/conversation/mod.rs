//! Conversation state: messages, threads, the main/branch set and the
//! controller that talks to the backend.

pub mod controller;
pub mod message;
pub mod store;
pub mod thread;

pub use controller::{ControllerEvent, ControllerUpdate, ConversationController};
pub use message::{Message, Role, PLACEHOLDER_CONTENT};
pub use store::{
    seed_from_template, Branch, BranchId, ConversationSet, ConversationStore,
    Exchange, Outcome, SendRejected, ThreadKey, ThreadTarget, BRANCH_PRIMER,
    DEFAULT_BRANCH_TEMPLATE, GREETING,
};
pub use thread::{MessageThread, ThreadError};
