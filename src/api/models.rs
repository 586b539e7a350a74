use crate::api::{ModelInfo, ModelsResponse};
use crate::utils::url::construct_api_url;

const GENERATE_METHOD: &str = "streamGenerateContent";

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<ModelInfo>, Box<dyn std::error::Error>> {
    let models_url = construct_api_url(base_url, "models");
    let mut models = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client
            .get(&models_url)
            .header("x-goog-api-key", api_key)
            .query(&[("pageSize", "1000")]);
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("API request failed with status {status}: {error_text}").into());
        }

        let page: ModelsResponse = response.json().await?;
        models.extend(page.models);
        match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(models)
}

/// Keep only models that can stream chat replies, sorted by id.
pub fn chat_capable(models: Vec<ModelInfo>) -> Vec<ModelInfo> {
    let mut models: Vec<ModelInfo> = models
        .into_iter()
        .filter(|model| {
            model
                .supported_generation_methods
                .iter()
                .any(|method| method == GENERATE_METHOD || method == "generateContent")
        })
        .collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));
    models
}

/// Model id without the `models/` resource prefix.
pub fn model_id(model: &ModelInfo) -> &str {
    model.name.strip_prefix("models/").unwrap_or(&model.name)
}
