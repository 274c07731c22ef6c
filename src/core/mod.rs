pub mod config;
pub mod constants;
pub mod context;
pub mod credentials;
pub mod keyring;
pub mod message;
pub mod notify;
pub mod session;
pub mod storage;
