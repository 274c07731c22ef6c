use std::collections::HashSet;

use crate::api::chat::chat_path;
use crate::api::client::{ApiClient, ApiError};

pub async fn fetch_models(client: &ApiClient) -> Result<Vec<String>, ApiError> {
    let models: Vec<String> = client.get(&chat_path("models")).await?;
    Ok(dedup_models(models))
}

/// Drop blank and repeated ids while keeping the backend's order, which is
/// the order models are offered in.
pub fn dedup_models(models: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    models
        .into_iter()
        .map(|model| model.trim().to_string())
        .filter(|model| !model.is_empty() && seen.insert(model.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let models = vec![
            "qwen3".to_string(),
            " llama3 ".to_string(),
            "".to_string(),
            "qwen3".to_string(),
            "mistral".to_string(),
        ];
        assert_eq!(dedup_models(models), vec!["qwen3", "llama3", "mistral"]);
    }
}
