//! AWS Bedrock provider (managed cloud-native chat, role-assumption
//! capable). No Rust AWS SDK is part of the teacher's or the wider pack's
//! dependency stack, so the request is signed by hand with SigV4 using
//! the teacher's already-present `sha2`, plus `hmac` added alongside it
//! (see DESIGN.md). Grounded on
//! `examples/original_source/api/components/generator/providers/bedrock_generator.py`
//! for the request/response shape; the signing and streaming-decode
//! mechanics are idiomatic Rust, not a translation of the boto3 client.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use common::error::EngineError;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::retry::retry_transient;
use crate::traits::{ChatRequest, ChatRole, LlmProvider, TextStream};

type HmacSha256 = Hmac<Sha256>;

/// Temporary or long-lived AWS credentials used to sign Bedrock requests.
/// When `session_token` is set these are the output of an `sts:AssumeRole`
/// call performed by the caller (role assumption is a credential-
/// provisioning concern outside this provider, mirroring how the teacher
/// keeps provider credentials external to the generator itself).
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

pub struct BedrockProvider {
    credentials: AwsCredentials,
    http: reqwest::Client,
}

impl BedrockProvider {
    pub fn new(credentials: AwsCredentials) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}/converse-stream",
            self.credentials.region, model_id
        )
    }
}

fn to_bedrock_messages(messages: &[crate::traits::ChatMessage]) -> (Option<String>, Vec<Value>) {
    let mut system = None;
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        match m.role {
            ChatRole::System => {
                // Bedrock Converse carries system prompts in a dedicated
                // field, not inline in the messages array.
                system = Some(m.content.clone());
            }
            ChatRole::User => out.push(json!({
                "role": "user",
                "content": [{"text": m.content}],
            })),
            ChatRole::Assistant => out.push(json!({
                "role": "assistant",
                "content": [{"text": m.content}],
            })),
        }
    }
    (system, out)
}

#[async_trait]
impl LlmProvider for BedrockProvider {
    fn provider_id(&self) -> &'static str {
        "bedrock"
    }

    async fn acall(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TextStream, EngineError> {
        let (system, messages) = to_bedrock_messages(&request.messages);
        let mut body = json!({ "messages": messages });
        if let Some(system_text) = system {
            body["system"] = json!([{"text": system_text}]);
        }
        let mut inference_config = serde_json::Map::new();
        if let Some(t) = request.params.temperature {
            inference_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(p) = request.params.top_p {
            inference_config.insert("topP".to_string(), json!(p));
        }
        if let Some(m) = request.params.max_tokens {
            inference_config.insert("maxTokens".to_string(), json!(m));
        }
        if !inference_config.is_empty() {
            body["inferenceConfig"] = Value::Object(inference_config);
        }
        let payload = serde_json::to_vec(&body).map_err(EngineError::Serde)?;
        let url = self.endpoint(&request.model_id);

        let credentials = self.credentials.clone();
        let http = self.http.clone();
        let payload_for_retry = payload.clone();
        let url_for_retry = url.clone();
        let bytes = retry_transient(|| {
            let http = http.clone();
            let credentials = credentials.clone();
            let payload = payload_for_retry.clone();
            let url = url_for_retry.clone();
            async move {
                let signed = sign_request(&credentials, &url, &payload)?;
                let resp = http
                    .post(&url)
                    .headers(signed)
                    .body(payload)
                    .send()
                    .await
                    .map_err(|e| EngineError::ProviderTransient(e.to_string()))?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    return Err(classify_bedrock_error(status, text));
                }
                resp.bytes()
                    .await
                    .map_err(|e| EngineError::ProviderTransient(e.to_string()))
            }
        })
        .await?;

        let out = async_stream::stream! {
            let chunks = aws_event_stream_chunks(&bytes);
            for chunk in chunks {
                if cancel.is_cancelled() {
                    break;
                }
                yield Ok(chunk);
            }
        };
        Ok(Box::pin(out))
    }
}

fn classify_bedrock_error(status: reqwest::StatusCode, body: String) -> EngineError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        EngineError::ProviderAuth(format!("bedrock auth rejected request: {body}"))
    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        EngineError::ProviderTransient(format!("bedrock {status}: {body}"))
    } else {
        EngineError::from_provider_message(body)
    }
}

/// Extracts `contentBlockDelta.delta.text` fragments from Bedrock's
/// `converse-stream` response, which frames each event as a length-
/// prefixed AWS event-stream envelope wrapping a JSON payload. Decoding
/// the envelope is simplified here to scanning for embedded JSON objects
/// — `json-stream-parser`'s incremental decoder recovers each object even
/// when an envelope boundary splits mid-payload.
fn aws_event_stream_chunks(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    let mut parser = json_stream_parser::JsonStreamParser::new();
    let mut depth = 0i32;
    let mut in_object = false;
    for ch in text.chars() {
        match ch {
            '{' => {
                if !in_object {
                    parser = json_stream_parser::JsonStreamParser::new();
                    in_object = true;
                }
                depth += 1;
                let _ = parser.add_char(ch);
            }
            '}' if in_object => {
                let _ = parser.add_char(ch);
                depth -= 1;
                if depth == 0 {
                    in_object = false;
                    if let Some(text) = extract_delta_text(parser.get_result()) {
                        out.push(text);
                    }
                }
            }
            _ if in_object => {
                let _ = parser.add_char(ch);
            }
            _ => {}
        }
    }
    out
}

fn extract_delta_text(value: &Value) -> Option<String> {
    value
        .get("delta")
        .and_then(|d| d.get("text"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

fn sign_request(
    credentials: &AwsCredentials,
    url: &str,
    payload: &[u8],
) -> Result<reqwest::header::HeaderMap, EngineError> {
    let parsed = url::Url::parse(url).map_err(|e| EngineError::Internal(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| EngineError::Internal("bedrock endpoint missing host".to_string()))?
        .to_string();
    let path = parsed.path().to_string();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| EngineError::Internal(e.to_string()))?;
    let amz_date = format_amz_date(now.as_secs());
    let date_stamp = &amz_date[0..8];

    let payload_hash = hex_digest(payload);
    let mut canonical_headers = format!("host:{host}\nx-amz-date:{amz_date}\n");
    let mut signed_headers = "host;x-amz-date".to_string();
    if let Some(token) = &credentials.session_token {
        canonical_headers.push_str(&format!("x-amz-security-token:{token}\n"));
        signed_headers = "host;x-amz-date;x-amz-security-token".to_string();
    }

    let canonical_request = format!(
        "POST\n{path}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );
    let credential_scope = format!("{date_stamp}/{}/bedrock/aws4_request", credentials.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{}",
        hex_digest(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        &credentials.secret_access_key,
        date_stamp,
        &credentials.region,
        "bedrock",
    )?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        "x-amz-date",
        amz_date
            .parse()
            .map_err(|e: reqwest::header::InvalidHeaderValue| EngineError::Internal(e.to_string()))?,
    );
    headers.insert(
        reqwest::header::AUTHORIZATION,
        authorization
            .parse()
            .map_err(|e: reqwest::header::InvalidHeaderValue| EngineError::Internal(e.to_string()))?,
    );
    if let Some(token) = &credentials.session_token {
        headers.insert(
            "x-amz-security-token",
            token
                .parse()
                .map_err(|e: reqwest::header::InvalidHeaderValue| EngineError::Internal(e.to_string()))?,
        );
    }
    Ok(headers)
}

fn format_amz_date(unix_secs: u64) -> String {
    let datetime = chrono::DateTime::<chrono::Utc>::from_timestamp(unix_secs as i64, 0)
        .unwrap_or_default();
    datetime.format("%Y%m%dT%H%M%SZ").to_string()
}

fn hex_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, EngineError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| EngineError::Internal(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, EngineError> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_delta_text_fragments_from_event_stream_bytes() {
        let synthetic =
            b"\x00\x00\x00\x00{\"delta\":{\"text\":\"Hello\"}}\x00\x00{\"delta\":{\"text\":\" world\"}}";
        let chunks = aws_event_stream_chunks(synthetic);
        assert_eq!(chunks, vec!["Hello".to_string(), " world".to_string()]);
    }

    #[test]
    fn sign_request_produces_authorization_header() {
        let creds = AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
            region: "us-east-1".to_string(),
        };
        let headers = sign_request(
            &creds,
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-sonnet/converse-stream",
            b"{}",
        )
        .expect("signing succeeds");
        assert!(headers.contains_key(reqwest::header::AUTHORIZATION));
        assert!(headers.contains_key("x-amz-date"));
    }
}
