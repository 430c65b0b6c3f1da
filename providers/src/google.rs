//! Google generative-language provider (in-process model family). No
//! OpenAI-compatible wire format and no dedicated Rust SDK appears
//! anywhere in the retrieval pack, so this talks directly to the REST
//! `streamGenerateContent` endpoint over `reqwest`, the same crate the
//! teacher already depends on for non-OpenAI HTTP calls.

use async_trait::async_trait;
use common::error::EngineError;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::retry::retry_transient;
use crate::traits::{ChatRequest, ChatRole, LlmProvider, TextStream};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleProvider {
    api_key: String,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
        }
    }
}

fn to_contents(messages: &[crate::traits::ChatMessage]) -> (Option<Value>, Vec<Value>) {
    let mut system = None;
    let mut contents = Vec::with_capacity(messages.len());
    for m in messages {
        match m.role {
            ChatRole::System => {
                system = Some(json!({ "parts": [{"text": m.content}] }));
            }
            ChatRole::User => contents.push(json!({
                "role": "user",
                "parts": [{"text": m.content}],
            })),
            ChatRole::Assistant => contents.push(json!({
                "role": "model",
                "parts": [{"text": m.content}],
            })),
        }
    }
    (system, contents)
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_id(&self) -> &'static str {
        "google"
    }

    async fn acall(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TextStream, EngineError> {
        let (system_instruction, contents) = to_contents(&request.messages);
        let mut generation_config = serde_json::Map::new();
        if let Some(t) = request.params.temperature {
            generation_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(p) = request.params.top_p {
            generation_config.insert("topP".to_string(), json!(p));
        }
        if let Some(m) = request.params.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(m));
        }
        let mut body = json!({ "contents": contents });
        if let Some(system_instruction) = system_instruction {
            body["systemInstruction"] = system_instruction;
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }

        let url = format!(
            "{API_BASE}/models/{}:streamGenerateContent?alt=sse&key={}",
            request.model_id, self.api_key
        );
        let http = self.http.clone();
        let api_key_for_scrub = self.api_key.clone();
        let resp = retry_transient(|| {
            let http = http.clone();
            let url = url.clone();
            let body = body.clone();
            let api_key_for_scrub = api_key_for_scrub.clone();
            async move {
                let resp = http
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| EngineError::ProviderTransient(e.to_string()))?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    return Err(classify_google_error(status, scrub_key(&text, &api_key_for_scrub)));
                }
                Ok(resp)
            }
        })
        .await?;

        let byte_stream = resp.bytes_stream();
        let api_key = self.api_key.clone();
        let out = async_stream::stream! {
            tokio::pin!(byte_stream);
            let mut buf = String::new();
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                match byte_stream.next().await {
                    None => break,
                    Some(Err(e)) => {
                        yield Err(EngineError::ProviderTransient(scrub_key(&e.to_string(), &api_key)));
                        break;
                    }
                    Some(Ok(bytes)) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(pos) = buf.find("\n\n") {
                            let event = buf[..pos].to_string();
                            buf.drain(..pos + 2);
                            for line in event.lines() {
                                if let Some(data) = line.strip_prefix("data: ") {
                                    if let Ok(value) = serde_json::from_str::<Value>(data) {
                                        if let Some(text) = extract_text(&value) {
                                            yield Ok(text);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        };
        Ok(Box::pin(out))
    }
}

fn extract_text(value: &Value) -> Option<String> {
    value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// Google returns its query-string API key echoed back inside some error
/// bodies; scrub it before it reaches a log line or the caller (§7
/// "Credential tokens MUST never appear in any error message").
fn scrub_key(text: &str, key: &str) -> String {
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "***")
}

fn classify_google_error(status: reqwest::StatusCode, body: String) -> EngineError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        EngineError::ProviderAuth(format!("google auth rejected request: {body}"))
    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        EngineError::ProviderTransient(format!("google {status}: {body}"))
    } else {
        EngineError::from_provider_message(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_from_candidate_payload() {
        let payload = json!({
            "candidates": [{"content": {"parts": [{"text": "hi there"}]}}]
        });
        assert_eq!(extract_text(&payload).as_deref(), Some("hi there"));
    }

    #[test]
    fn scrub_key_redacts_api_key_from_error_body() {
        let body = "error calling key=SECRET123 rejected";
        assert_eq!(
            scrub_key(body, "SECRET123"),
            "error calling key=*** rejected"
        );
    }
}
