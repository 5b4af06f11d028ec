//! Translation services behind the [`Translator`] trait.
//!
//! A translator receives one batch of source strings and must return one
//! translation per string, in order. It does not retry, pace, or fall back;
//! the batch translator in [`crate::pipeline::batch`] owns those policies.

use crate::config::{TranslationConfig, TranslationService};
use crate::error::{BatchError, TranslateError};
use crate::pipeline::postprocess::{clean_translation, extract_json_array};
use crate::prompts::{translation_user_prompt, TRANSLATION_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable holding the Bhashini/Dhruva inference key.
pub const BHASHINI_API_KEY_ENV: &str = "BHASHINI_API_KEY";

const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// One external text-translation capability.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Translate `texts` from `source` to `target`.
    ///
    /// On success the result has exactly `texts.len()` items in input order.
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>, BatchError>;
}

// ── Bhashini ─────────────────────────────────────────────────────────────

/// Client for the Bhashini/Dhruva inference pipeline (`taskType: translation`).
pub struct BhashiniTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl BhashiniTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, TranslateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TranslateError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }
}

/// Request body for one translation batch.
pub fn bhashini_request(texts: &[String], source: &str, target: &str) -> Value {
    json!({
        "pipelineTasks": [{
            "taskType": "translation",
            "config": {
                "language": {
                    "sourceLanguage": source,
                    "targetLanguage": target,
                }
            }
        }],
        "inputData": {
            "input": texts.iter().map(|t| json!({ "source": t })).collect::<Vec<_>>(),
        }
    })
}

/// Pull `pipelineResponse[0].output[].target` out of a response body.
pub fn parse_bhashini_response(body: &Value, expected: usize) -> Result<Vec<String>, BatchError> {
    let output = body
        .pointer("/pipelineResponse/0/output")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            BatchError::MalformedResponse("missing pipelineResponse[0].output array".into())
        })?;

    if output.len() != expected {
        return Err(BatchError::LengthMismatch {
            expected,
            actual: output.len(),
        });
    }

    output
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.get("target")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| BatchError::MalformedResponse(format!("output[{i}] has no target")))
        })
        .collect()
}

#[async_trait]
impl Translator for BhashiniTranslator {
    fn name(&self) -> &str {
        "bhashini"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>, BatchError> {
        let map_send = |e: reqwest::Error| {
            if e.is_timeout() {
                BatchError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                BatchError::CallFailed(e.to_string())
            }
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(&bhashini_request(texts, source, target))
            .send()
            .await
            .map_err(map_send)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(BatchError::CallFailed(format!("HTTP {status}: {snippet}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BatchError::MalformedResponse(e.to_string()))?;
        parse_bhashini_response(&body, texts.len())
    }
}

// ── LLM ──────────────────────────────────────────────────────────────────

/// Chat-model translator: the batch goes out as a JSON array and must come
/// back as a JSON array of the same length.
pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    name: String,
    temperature: f32,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            temperature: 0.0,
        }
    }
}

/// Parse a model reply into exactly `expected` cleaned strings.
pub fn parse_llm_output(content: &str, expected: usize) -> Result<Vec<String>, BatchError> {
    let array = extract_json_array(content).ok_or_else(|| {
        let snippet: String = content.chars().take(80).collect();
        BatchError::MalformedResponse(format!("no JSON array in reply: {snippet:?}"))
    })?;
    let items: Vec<String> =
        serde_json::from_str(&array).map_err(|e| BatchError::MalformedResponse(e.to_string()))?;
    if items.len() != expected {
        return Err(BatchError::LengthMismatch {
            expected,
            actual: items.len(),
        });
    }
    Ok(items.iter().map(|s| clean_translation(s)).collect())
}

#[async_trait]
impl Translator for LlmTranslator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>, BatchError> {
        let items_json = serde_json::to_string(texts)
            .map_err(|e| BatchError::CallFailed(format!("encode batch: {e}")))?;
        let messages = vec![
            ChatMessage::system(TRANSLATION_SYSTEM_PROMPT),
            ChatMessage::user(translation_user_prompt(source, target, texts.len(), &items_json)),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| BatchError::CallFailed(e.to_string()))?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        parse_llm_output(&response.content, texts.len())
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Build the translator for a job.
///
/// A pre-built `config.translator` wins. Otherwise:
///
/// * **Bhashini** needs an API key from the config or `BHASHINI_API_KEY`.
/// * **Llm** resolves a provider from most to least specific: named
///   provider, `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`,
///   `OPENAI_API_KEY`, then full auto-detection.
pub async fn resolve_translator(
    config: &TranslationConfig,
) -> Result<Arc<dyn Translator>, TranslateError> {
    if let Some(ref t) = config.translator {
        return Ok(Arc::clone(t));
    }

    match &config.service {
        TranslationService::Bhashini { endpoint, api_key } => {
            let key = api_key
                .clone()
                .filter(|k| !k.is_empty())
                .or_else(|| std::env::var(BHASHINI_API_KEY_ENV).ok().filter(|k| !k.is_empty()))
                .ok_or_else(|| TranslateError::ProviderNotConfigured {
                    service: "bhashini".into(),
                    hint: format!(
                        "Set {BHASHINI_API_KEY_ENV} or pass --api-key, or choose --service llm."
                    ),
                })?;
            info!("Using Bhashini pipeline at {}", endpoint);
            Ok(Arc::new(BhashiniTranslator::new(
                endpoint.clone(),
                key,
                config.api_timeout_secs,
            )?))
        }
        TranslationService::Llm { provider, model } => {
            let (name, llm) = resolve_llm_provider(provider.as_deref(), model.as_deref())?;
            info!("Using LLM translator: {}", name);
            Ok(Arc::new(LlmTranslator::new(llm, name)))
        }
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, TranslateError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        TranslateError::ProviderNotConfigured {
            service: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn resolve_llm_provider(
    provider: Option<&str>,
    model: Option<&str>,
) -> Result<(String, Arc<dyn LLMProvider>), TranslateError> {
    if let Some(name) = provider {
        let model = model.unwrap_or(DEFAULT_LLM_MODEL);
        return Ok((format!("{name}/{model}"), create_provider(name, model)?));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return Ok((format!("{prov}/{env_model}"), create_provider(&prov, &env_model)?));
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = model.unwrap_or(DEFAULT_LLM_MODEL);
        return Ok((format!("openai/{model}"), create_provider("openai", model)?));
    }

    let (llm, _embedding) =
        ProviderFactory::from_env().map_err(|e| TranslateError::ProviderNotConfigured {
            service: "llm".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                 Error: {}",
                e
            ),
        })?;
    Ok(("llm/auto".to_string(), llm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn request_shape() {
        let body = bhashini_request(&strings(&["नमस्कार", "जग"]), "mr", "hi");
        assert_eq!(body["pipelineTasks"][0]["taskType"], "translation");
        assert_eq!(
            body["pipelineTasks"][0]["config"]["language"]["sourceLanguage"],
            "mr"
        );
        assert_eq!(
            body["pipelineTasks"][0]["config"]["language"]["targetLanguage"],
            "hi"
        );
        assert_eq!(body["inputData"]["input"][1]["source"], "जग");
    }

    #[test]
    fn response_parsing() {
        let body = json!({
            "pipelineResponse": [{ "output": [{ "target": "नमस्ते" }, { "target": "विश्व" }] }]
        });
        assert_eq!(
            parse_bhashini_response(&body, 2).unwrap(),
            strings(&["नमस्ते", "विश्व"])
        );
        assert_eq!(
            parse_bhashini_response(&body, 3).unwrap_err(),
            BatchError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert!(matches!(
            parse_bhashini_response(&json!({ "pipelineResponse": {} }), 1),
            Err(BatchError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_bhashini_response(&json!({ "pipelineResponse": [{ "output": [{}] }] }), 1),
            Err(BatchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn llm_output_parsing() {
        let reply = "```json\n[\"नमस्ते\", \" विश्व \"]\n```";
        assert_eq!(parse_llm_output(reply, 2).unwrap(), strings(&["नमस्ते", "विश्व"]));
        assert!(matches!(
            parse_llm_output("[\"only one\"]", 2),
            Err(BatchError::LengthMismatch { .. })
        ));
        assert!(matches!(
            parse_llm_output("I cannot help", 1),
            Err(BatchError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn missing_bhashini_key_is_a_config_error() {
        let config = TranslationConfig::builder()
            .service(TranslationService::Bhashini {
                endpoint: "http://127.0.0.1:9/".into(),
                api_key: Some(String::new()),
            })
            .build()
            .unwrap();
        if std::env::var(BHASHINI_API_KEY_ENV).is_ok() {
            return;
        }
        let err = resolve_translator(&config).await.err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/pipeline", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let len = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + len {
                        break;
                    }
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn bhashini_round_trip_over_http() {
        let body = json!({
            "pipelineResponse": [{ "output": [{ "target": "नमस्ते" }] }]
        })
        .to_string();
        let (url, server) = serve_once("200 OK", body).await;

        let t = BhashiniTranslator::new(url, "secret-key", 5).unwrap();
        let out = t.translate_batch(&strings(&["Hello"]), "en", "hi").await.unwrap();
        assert_eq!(out, strings(&["नमस्ते"]));

        let request = server.await.unwrap();
        assert!(request.to_ascii_lowercase().contains("authorization: secret-key"));
        assert!(request.contains("\"targetLanguage\":\"hi\""));
    }

    #[tokio::test]
    async fn bhashini_http_error_is_call_failure() {
        let (url, _server) = serve_once("503 Service Unavailable", "{\"detail\":\"busy\"}".into()).await;
        let t = BhashiniTranslator::new(url, "k", 5).unwrap();
        let err = t.translate_batch(&strings(&["a"]), "en", "hi").await.unwrap_err();
        match err {
            BatchError::CallFailed(msg) => assert!(msg.contains("503"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
