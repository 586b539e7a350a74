//! Model listing functionality
//!
//! Lists the models the configured API key can use for chat.

use crate::api::models::{chat_capable, fetch_models, model_id};
use crate::auth::AuthManager;
use crate::core::config::Config;
use std::error::Error;

pub async fn list_models() -> Result<(), Box<dyn Error>> {
    let auth_manager = AuthManager::new();
    let config = Config::load()?;

    let Some((api_key, source)) = auth_manager.resolve_api_key()? else {
        return Err(
            "❌ No API key configured\n\nPlease either:\n1. Run 'vibecode auth' to store a key, or\n2. export GEMINI_API_KEY=\"your-api-key-here\""
                .into(),
        );
    };

    println!("🤖 Available Models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Endpoint: {}", config.base_url());
    println!("Key from: {source}");
    println!();

    let client = reqwest::Client::new();
    let models = chat_capable(fetch_models(&client, config.base_url(), &api_key).await?);

    if models.is_empty() {
        println!("No chat-capable models found.");
        return Ok(());
    }

    println!("Found {} models:", models.len());
    println!();
    let current = config.model();
    for model in &models {
        let id = model_id(model);
        let mark = if id == current { "*" } else { " " };
        println!("  {mark} {id}");
        if let Some(display_name) = &model.display_name {
            if !display_name.is_empty() && display_name != id {
                println!("      Name: {display_name}");
            }
        }
    }
    println!();
    println!("Current: {current}");
    Ok(())
}
