//! Chatdesk is a terminal client for a session-based chat backend.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] is the authenticated request pipeline plus the backend's
//!   auth, chat, and model endpoints.
//! - [`core`] owns the credential store, durable storage, configuration,
//!   and the session manager that keeps the session list, the active
//!   session, and its message log consistent with the backend.
//! - [`cli`] parses arguments and runs one-shot commands or the
//!   interactive chat loop.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which builds a [`core::context::ClientContext`]
//! for the command being run.

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
