//! User-visible failure notices.
//!
//! The request pipeline reports every failed call here exactly once, then
//! hands the error back to its caller for operation-specific recovery.

use std::sync::{Arc, Mutex};

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Prints notices to stderr, the terminal client's notification channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("❌ {message}");
    }
}

/// Keeps every notice in order so callers can drain and display them later.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(message.to_string());
        }
    }
}
