use crate::api::client::{ApiClient, ApiError};
use crate::api::{AuthResponse, LoginRequest};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";

pub async fn login(
    client: &ApiClient,
    username: &str,
    password: &str,
) -> Result<AuthResponse, ApiError> {
    client
        .post(LOGIN_PATH, &LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
}

pub async fn register(
    client: &ApiClient,
    username: &str,
    password: &str,
) -> Result<AuthResponse, ApiError> {
    client
        .post(REGISTER_PATH, &LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
}
