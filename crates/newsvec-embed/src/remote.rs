//! Remote feature-extraction client
//!
//! One POST per batch: the body is the JSON array of input strings, the
//! credential goes in a bearer header, and `wait_for_model=true` asks the
//! provider to block while a cold model loads instead of answering 503.

use reqwest::{Client, Url};

use crate::config::EmbedderConfig;
use crate::error::ProviderError;
use crate::shape::reduce_body;

pub struct RemoteProvider {
    client: Client,
    url: Url,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("url", &self.url.as_str())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl RemoteProvider {
    pub fn from_config(config: &EmbedderConfig) -> Result<Self, ProviderError> {
        let api_key = match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(ProviderError::NotConfigured("no API key")),
        };
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ProviderError::NotConfigured("no endpoint"));
        }

        let url = model_url(endpoint, &config.model)?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url,
            api_key,
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Embed `texts` in one request, one normalized vector per input.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, ProviderError> {
        let response = self
            .client
            .post(self.url.clone())
            .query(&[("wait_for_model", "true")])
            .bearer_auth(&self.api_key)
            .json(texts)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        reduce_body(&body, texts.len())
    }
}

/// `endpoint` with `model` appended as one percent-encoded path segment.
fn model_url(endpoint: &str, model: &str) -> Result<Url, ProviderError> {
    let invalid = |reason: String| ProviderError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("endpoint cannot be a base URL".into()))?
        .pop_if_empty()
        .push(model);
    Ok(url)
}
