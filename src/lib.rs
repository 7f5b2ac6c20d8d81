//! A terminal chat client where any span of an assistant reply can be
//! selected and forked into a side conversation.

pub mod app;
pub mod backend;
pub mod config;
pub mod conversation;
pub mod handler;
pub mod layout;
pub mod logging;
pub mod provider;
pub mod render;
pub mod selection;
pub mod tui;
pub mod ui;
