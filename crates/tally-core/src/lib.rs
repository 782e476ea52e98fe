//! Core of a small to-do application: an observable task table with live
//! queries, an observable preference store, a switch-to-latest query
//! pipeline and a command/event coordinator, wired together by [`session::Session`].
//!
//! The presentation layer stays outside this crate: it renders the snapshots
//! coming out of [`pipeline::TaskListStream`], drains [`event::Events`]
//! (one-shot, in order) and feeds user intents into
//! [`coordinator::Coordinator`].

pub mod coordinator;
pub mod event;
pub mod filter;
pub mod logging;
pub mod pipeline;
pub mod prefs;
pub mod session;
pub mod store;
pub mod task;
