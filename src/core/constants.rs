//! Shared constants used across the application

/// `ProjectDirs` triple for config and data locations.
pub const APP_QUALIFIER: &str = "org";
pub const APP_ORGANIZATION: &str = "chatdesk";
pub const APP_NAME: &str = "chatdesk";

pub const DEFAULT_MODEL: &str = "qwen3";

/// Overrides the configured backend base URL.
pub const BASE_URL_ENV: &str = "CHATDESK_BASE_URL";

/// `tracing` filter directives, e.g. `chatdesk=debug`.
pub const LOG_ENV: &str = "CHATDESK_LOG";
