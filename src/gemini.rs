//! Minimal client for the Gemini `generateContent` REST endpoint.
//!
//! Only the request and response fields the bot uses are modelled: plain
//! text prompts, system instructions, JSON response schemas, the Google
//! Search tool, inline image data and search grounding metadata.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::{Error, Result};

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Tool {
    GoogleSearch {},
}

impl GenerateContentRequest {
    /// A single user turn holding `prompt`.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![TextPart {
                    text: prompt.into(),
                }],
            }],
            ..Default::default()
        }
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(Content {
            role: None,
            parts: vec![TextPart {
                text: instruction.into(),
            }],
        });
        self
    }

    pub fn generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePart {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebChunk {
    pub uri: Option<String>,
}

/// A decoded inline image from a model answer.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl GenerateContentResponse {
    fn parts(&self) -> &[CandidatePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text parts of the first candidate, `None` if there are none.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Inline data parts of the first candidate, base64 decoded. Parts that
    /// fail to decode are skipped.
    pub fn inline_images(&self) -> Vec<InlineImage> {
        self.parts()
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .filter(|d| !d.data.is_empty())
            .filter_map(|d| match BASE64.decode(&d.data) {
                Ok(bytes) => Some(InlineImage {
                    mime_type: d
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| "image/png".to_string()),
                    bytes,
                }),
                Err(e) => {
                    log::warn!("Skipping undecodable inline data: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Web URIs cited by search grounding on the first candidate, in order.
    pub fn grounding_uris(&self) -> Vec<&str> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| {
                m.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref()?.uri.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        log::info!("Created Gemini client for {}", config.base_url);
        Ok(GeminiClient {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            client,
        })
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        log::debug!("Sending request to {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(request)
            .send()
            .await
            .map_err(|e| {
                log::error!("Request to Gemini model {} failed: {}", model, e);
                Error::from_http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.map_err(Error::from_http)?;
            log::error!("Gemini returned {} for model {}: {}", status, model, message);
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await.map_err(Error::from_http)?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&body)?;
        if let Some(reason) = parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            log::debug!("Model {} finished with {}", model, reason);
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn request_uses_camel_case_wire_names() {
        let request = GenerateContentRequest::prompt("hi")
            .system_instruction("be brief")
            .generation_config(GenerationConfig {
                temperature: Some(1.0),
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(json!({"type": "OBJECT"})),
            })
            .tool(Tool::GoogleSearch {});

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "systemInstruction": {"parts": [{"text": "be brief"}]},
                "generationConfig": {
                    "temperature": 1.0,
                    "responseMimeType": "application/json",
                    "responseSchema": {"type": "OBJECT"}
                },
                "tools": [{"googleSearch": {}}]
            })
        );
    }

    #[test]
    fn bare_prompt_omits_optional_sections() {
        let value = serde_json::to_value(GenerateContentRequest::prompt("x")).unwrap();
        assert_eq!(
            value,
            json!({"contents": [{"role": "user", "parts": [{"text": "x"}]}]})
        );
    }

    #[test]
    fn text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}, "finishReason": "STOP"},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn text_is_none_without_candidates_or_content() {
        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.text(), None);

        let blocked: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert_eq!(blocked.text(), None);
    }

    #[test]
    fn inline_images_are_decoded() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here is your dish"},
                {"inlineData": {"mimeType": "image/jpeg", "data": "YWJj"}},
                {"inlineData": {"data": "ZGVm"}},
                {"inlineData": {"mimeType": "image/png", "data": "***"}}
            ]}}]
        }))
        .unwrap();

        let images = response.inline_images();
        assert_eq!(
            images,
            vec![
                InlineImage {
                    mime_type: "image/jpeg".to_string(),
                    bytes: b"abc".to_vec()
                },
                InlineImage {
                    mime_type: "image/png".to_string(),
                    bytes: b"def".to_vec()
                },
            ]
        );
    }

    #[test]
    fn grounding_uris_skip_chunks_without_web() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "found it"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"retrievedContext": {"uri": "gs://x"}},
                    {"web": {"title": "BBC Good Food"}},
                    {"web": {"uri": "https://www.bbcgoodfood.com/x", "title": "BBC"}},
                    {"web": {"uri": "https://www.youtube.com/watch?v=abcdefghijk"}}
                ]}
            }]
        }))
        .unwrap();
        assert_eq!(
            response.grounding_uris(),
            vec![
                "https://www.bbcgoodfood.com/x",
                "https://www.youtube.com/watch?v=abcdefghijk"
            ]
        );
    }

    /// Answers a single request with `status` and `body`, then yields the
    /// raw request it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_is_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, server)
    }

    fn request_is_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= head_end + 4 + content_length
    }

    fn local_client(base_url: &str) -> GeminiClient {
        let config = Config::from_lookup(|name| match name {
            "GEMINI_API_KEY" => Some("test-key".to_string()),
            "GEMINI_BASE_URL" => Some(base_url.to_string()),
            "GEMINI_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        GeminiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn error_status_becomes_an_api_error() {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        )
        .await;
        let client = local_client(&base_url);

        let result = client
            .generate_content("gemini-test", &GenerateContentRequest::prompt("hi"))
            .await;
        match result {
            Err(Error::Api { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("API key not valid."), "{}", message);
            }
            other => panic!("expected an API error, got {:?}", other),
        }

        let request = server.await.unwrap();
        assert!(
            request.starts_with("POST /v1beta/models/gemini-test:generateContent?key=test-key "),
            "{}",
            request
        );
        assert!(request.ends_with(r#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#));
    }

    #[tokio::test]
    async fn success_body_is_decoded() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]},"finishReason":"STOP"}]}"#,
        )
        .await;
        let client = local_client(&base_url);

        let response = client
            .generate_content("gemini-test", &GenerateContentRequest::prompt("hi"))
            .await
            .unwrap();
        assert_eq!(response.text().as_deref(), Some("hello"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_json_error() {
        let (base_url, server) = serve_once("200 OK", "<html>oops</html>").await;
        let client = local_client(&base_url);

        let result = client
            .generate_content("gemini-test", &GenerateContentRequest::prompt("hi"))
            .await;
        assert!(matches!(result, Err(Error::Json(_))), "{:?}", result);
        server.await.unwrap();
    }
}
