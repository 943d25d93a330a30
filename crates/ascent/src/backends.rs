//! HTTP reasoning backends over OpenAI-compatible inference servers.
//!
//! Each configured endpoint becomes one [`HttpBackend`]. The wire contract
//! is chat completions with temperature 0; the model is asked to answer with
//! a single JSON object matching [`BackendReply`]. Replies that are not
//! valid JSON are demoted to narrative text rather than failing the stage,
//! so a chatty model degrades the report, not the pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use pipeline::error::is_transient_message;
use pipeline::{BackendMap, BackendReply, PipelineError, PipelineResult, ReasoningBackend, StageRequest};

use crate::config::{AscentConfig, EndpointConfig};

/// Protocol contract sent as the system message on every dispatch.
const PROTOCOL_PROMPT: &str = "You are a title-examination assistant for foreclosure auction \
review. The user message is a JSON object with an `instruction` and the relevant `facts`. \
Respond with exactly one JSON object of the form \
{\"fields\": {<fact_key>: <value>, ...}, \"narrative\": \"<short prose>\"}. \
Put machine-readable conclusions in `fields` using the fact keys named by the instruction; \
put everything else in `narrative`. No text outside the JSON object.";

pub struct HttpBackend {
    name: String,
    url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(endpoint: &EndpointConfig, api_key: &str, timeout: Duration) -> Self {
        Self {
            name: endpoint.name.clone(),
            url: endpoint.url.trim_end_matches('/').to_string(),
            model: endpoint.model.clone(),
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.url)
    }
}

#[async_trait]
impl ReasoningBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&self, request: &StageRequest) -> PipelineResult<BackendReply> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": PROTOCOL_PROMPT },
                { "role": "user", "content": serde_json::to_string_pretty(request)? },
            ],
        });

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(&self.name, err))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let transient = status.is_server_error() || status.as_u16() == 429;
            return Err(PipelineError::backend(
                &self.name,
                format!("endpoint returned {status}: {text}"),
                transient,
            ));
        }

        let value: serde_json::Value = response.json().await.map_err(|err| {
            PipelineError::backend(&self.name, format!("invalid response body: {err}"), false)
        })?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        Ok(parse_reply(&self.name, content))
    }
}

fn transport_error(backend: &str, err: reqwest::Error) -> PipelineError {
    let message = err.to_string();
    let transient = err.is_timeout() || err.is_connect() || is_transient_message(&message);
    PipelineError::backend(backend, message, transient)
}

/// Interpret model output as a [`BackendReply`]. Code fences are stripped;
/// anything that still fails to parse becomes a narrative-only reply.
fn parse_reply(backend: &str, content: &str) -> BackendReply {
    let stripped = strip_code_fence(content);
    match serde_json::from_str::<BackendReply>(stripped) {
        Ok(reply) => reply,
        Err(err) => {
            if !stripped.trim().is_empty() {
                warn!(backend, error = %err, "backend reply is not structured JSON, keeping as narrative");
            }
            BackendReply {
                fields: Default::default(),
                narrative: if content.trim().is_empty() {
                    None
                } else {
                    Some(content.trim().to_string())
                },
            }
        }
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag, then the closing fence.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Build the backend registry the router dispatches into.
pub fn build_map(config: &AscentConfig) -> BackendMap {
    let mut map: BackendMap = HashMap::new();
    for endpoint in &config.endpoints {
        let backend = HttpBackend::new(endpoint, &config.api_key, config.stage_timeout());
        map.insert(
            endpoint.name.clone(),
            Arc::new(backend) as Arc<dyn ReasoningBackend>,
        );
    }
    map
}

/// Check if an inference endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

/// Probe every configured endpoint, returning `(name, reachable)` pairs in
/// configured order.
pub async fn probe_endpoints(config: &AscentConfig) -> Vec<(String, bool)> {
    let mut results = Vec::with_capacity(config.endpoints.len());
    for endpoint in &config.endpoints {
        let reachable = check_endpoint(&endpoint.url).await;
        results.push((endpoint.name.clone(), reachable));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::facts::keys;

    #[test]
    fn test_parse_reply_structured() {
        let reply = parse_reply(
            "scout-local",
            r#"{"fields":{"plaintiff_class":"hoa","classification_confidence":0.8},"narrative":"HOA foreclosure"}"#,
        );
        assert!(reply.fields.contains(keys::PLAINTIFF_CLASS));
        assert_eq!(reply.narrative.as_deref(), Some("HOA foreclosure"));
    }

    #[test]
    fn test_parse_reply_strips_code_fence() {
        let content = "```json\n{\"fields\":{\"plaintiff_class\":\"lender\"}}\n```";
        let reply = parse_reply("scout-local", content);
        assert!(reply.fields.contains(keys::PLAINTIFF_CLASS));
    }

    #[test]
    fn test_parse_reply_demotes_prose_to_narrative() {
        let reply = parse_reply("scout-local", "The plaintiff appears to be a lender.");
        assert!(reply.fields.is_empty());
        assert_eq!(
            reply.narrative.as_deref(),
            Some("The plaintiff appears to be a lender.")
        );
    }

    #[test]
    fn test_parse_reply_empty_content() {
        let reply = parse_reply("scout-local", "   ");
        assert!(reply.fields.is_empty());
        assert!(reply.narrative.is_none());
    }

    #[test]
    fn test_build_map_registers_every_endpoint() {
        let config = AscentConfig::default();
        let map = build_map(&config);
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("scout-local"));
        assert!(map.contains_key("counsel-local"));
        assert_eq!(map["analyst-local"].name(), "analyst-local");
    }
}
