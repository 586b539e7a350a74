use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.model {
            Some(model) => println!("  model: {model}"),
            None => println!("  model: {} (default)", self.model()),
        }
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: {} (default)", self.base_url()),
        }
        match self.temperature {
            Some(t) => println!("  temperature: {t}"),
            None => println!("  temperature: {} (default)", self.temperature()),
        }
        match self.default_persona {
            Some(persona) => println!("  default-persona: {persona}"),
            None => println!("  default-persona: {} (default)", self.default_persona()),
        }
        match (&self.data_dir, self.data_dir()) {
            (Some(dir), _) => println!("  data-dir: {}", path_display(dir)),
            (None, Ok(dir)) => println!("  data-dir: {} (default)", path_display(dir)),
            (None, Err(_)) => println!("  data-dir: (unavailable)"),
        }
    }
}
