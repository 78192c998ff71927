//! Non-streaming completions against external LLM providers.
//!
//! OpenAI and Groq share the chat-completions format. Anthropic uses the
//! Messages API. Ollama uses `/api/generate` with `stream: false`.

use bugwhisper_core::{Error, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::{CompletionOptions, LLMProvider, ResolvedProvider};

/// Run one completion against the resolved provider.
pub async fn complete(
    client: &Client,
    target: &ResolvedProvider,
    prompt: &str,
    options: CompletionOptions,
) -> Result<String> {
    debug!(
        "Completing with {} model {} at {}",
        target.provider, target.model, target.endpoint
    );
    let api_key = target.api_key.as_deref().unwrap_or_default();
    match target.provider {
        LLMProvider::OpenAI | LLMProvider::Groq => {
            let body = json!({
                "model": target.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": options.temperature,
                "max_tokens": options.max_tokens,
                "stream": false,
            });
            let request = client
                .post(&target.endpoint)
                .header("Authorization", format!("Bearer {}", api_key));
            let value = send_json(request, &body).await?;
            parse_openai_compat(&value)
        }
        LLMProvider::Anthropic => {
            let body = json!({
                "model": target.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": options.temperature,
                "max_tokens": options.max_tokens,
            });
            let request = client
                .post(&target.endpoint)
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01");
            let value = send_json(request, &body).await?;
            parse_anthropic(&value)
        }
        LLMProvider::Ollama => {
            let body = json!({
                "model": target.model,
                "prompt": prompt,
                "stream": false,
                "options": {
                    "temperature": options.temperature,
                    "num_predict": options.max_tokens,
                },
            });
            let value = send_json(client.post(&target.endpoint), &body).await?;
            parse_ollama(&value)
        }
    }
}

async fn send_json(request: reqwest::RequestBuilder, body: &Value) -> Result<Value> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| Error::Http(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(Error::Explain(format!("API error {}: {}", status, text)));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| Error::Explain(format!("Malformed response body: {}", e)))
}

/// `choices[0].message.content`
pub fn parse_openai_compat(value: &Value) -> Result<String> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Explain("missing choices[0].message.content".into()))
}

/// Concatenated `text` blocks of `content`.
pub fn parse_anthropic(value: &Value) -> Result<String> {
    if value["type"].as_str() == Some("error") {
        let msg = value["error"]["message"].as_str().unwrap_or("Unknown error");
        return Err(Error::Explain(msg.to_string()));
    }
    let blocks = value["content"]
        .as_array()
        .ok_or_else(|| Error::Explain("missing content blocks".into()))?;
    let text: String = blocks
        .iter()
        .filter(|b| b["type"].as_str() == Some("text"))
        .filter_map(|b| b["text"].as_str())
        .collect();
    Ok(text.trim().to_string())
}

/// `response`
pub fn parse_ollama(value: &Value) -> Result<String> {
    value["response"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Explain("missing response field".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_openai_compat() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": " Cause: x\nFix: y \n"}}]});
        assert_eq!(parse_openai_compat(&v).unwrap(), "Cause: x\nFix: y");
        assert!(parse_openai_compat(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_parse_anthropic() {
        let v = json!({
            "type": "message",
            "content": [
                {"type": "text", "text": "Cause: a. "},
                {"type": "tool_use", "id": "t"},
                {"type": "text", "text": "Fix: b."}
            ]
        });
        assert_eq!(parse_anthropic(&v).unwrap(), "Cause: a. Fix: b.");

        let err = json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}});
        assert!(parse_anthropic(&err).unwrap_err().to_string().contains("Overloaded"));
    }

    #[test]
    fn test_parse_ollama() {
        assert_eq!(parse_ollama(&json!({"response": "Fix: z", "done": true})).unwrap(), "Fix: z");
        assert!(parse_ollama(&json!({"done": true})).is_err());
    }

    #[tokio::test]
    async fn test_openai_compat_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Cause: c\nFix: f"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let target = ResolvedProvider {
            provider: LLMProvider::Groq,
            model: "llama-3.1-8b-instant".into(),
            api_key: Some("sk-test".into()),
            endpoint: format!("{}/v1/chat/completions", server.uri()),
        };
        let out = complete(&Client::new(), &target, "prompt", CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "Cause: c\nFix: f");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let target = ResolvedProvider {
            provider: LLMProvider::Ollama,
            model: "llama3".into(),
            api_key: None,
            endpoint: format!("{}/api/generate", server.uri()),
        };
        let err = complete(&Client::new(), &target, "prompt", CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Explain(ref m) if m.contains("503")));
    }
}
