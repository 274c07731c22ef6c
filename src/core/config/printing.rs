use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset, using {})", self.base_url()),
        }
        match self.timeout_secs {
            Some(secs) => println!("  timeout: {secs}s"),
            None => println!("  timeout: (unset, using {}s)", self.timeout().as_secs()),
        }
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset, using {})", self.default_model()),
        }
        match self.credential_store {
            Some(store) => println!("  credential-store: {store}"),
            None => println!(
                "  credential-store: (unset, using {})",
                self.credential_backend()
            ),
        }
    }
}
