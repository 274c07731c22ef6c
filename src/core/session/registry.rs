/// The models the backend offers, in the order it lists them, plus the
/// model new sessions start with.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<String>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            models: Vec::new(),
            default_model: default_model.into(),
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Whether `model` may be selected. Before the registry has been loaded
    /// any model is accepted and left for the backend to judge.
    pub fn accepts(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == model)
    }

    /// Replace the model list, keeping the default a member of it.
    pub fn replace(&mut self, models: Vec<String>) {
        self.models = models;
        if let Some(first) = self.models.first() {
            if !self.accepts(&self.default_model) {
                self.default_model = first.clone();
            }
        }
    }

    /// The model to use for `requested`, falling back to the default when
    /// the registry does not carry it.
    pub fn resolve(&self, requested: &str) -> String {
        if self.accepts(requested) {
            requested.to_string()
        } else {
            self.default_model.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(models: &[&str]) -> Vec<String> {
        models.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn empty_registry_accepts_anything() {
        let registry = ModelRegistry::new("qwen3");
        assert!(registry.accepts("whatever"));
        assert_eq!(registry.resolve("whatever"), "whatever");
    }

    #[test]
    fn replace_seeds_default_from_first_entry_when_missing() {
        let mut registry = ModelRegistry::new("qwen3");
        registry.replace(names(&["llama3", "mistral"]));
        assert_eq!(registry.default_model(), "llama3");
        assert!(!registry.accepts("qwen3"));
        assert_eq!(registry.resolve("qwen3"), "llama3");
    }

    #[test]
    fn replace_keeps_default_that_is_still_offered() {
        let mut registry = ModelRegistry::new("mistral");
        registry.replace(names(&["llama3", "mistral"]));
        assert_eq!(registry.default_model(), "mistral");
    }

    #[test]
    fn replacing_with_empty_list_keeps_default() {
        let mut registry = ModelRegistry::new("qwen3");
        registry.replace(Vec::new());
        assert!(registry.is_empty());
        assert_eq!(registry.default_model(), "qwen3");
    }
}
