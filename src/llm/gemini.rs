//! Google Gemini client
//!
//! Talks to the Generative Language REST API with an API key, including
//! function calling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::core::{Config, Message, MutualsError, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: String,
}

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolGroup {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GeminiClient {
    /// Create a client from validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.agent.request_timeout_secs))
            .build()
            .map_err(|e| MutualsError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.agent.api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.trim_start_matches("models/");
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    /// Convert internal messages to Gemini contents plus a system instruction
    fn build_request(
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> GenerateRequest {
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let system_instruction = (!system_text.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: Some(system_text.join("\n\n")),
                function_call: None,
            }],
        });

        let contents = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                let mut parts = Vec::new();
                if !m.content.is_empty() {
                    parts.push(Part {
                        text: Some(m.content.clone()),
                        function_call: None,
                    });
                }
                for call in m.tool_calls.iter().flatten() {
                    parts.push(Part {
                        text: None,
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        }),
                    });
                }
                Content {
                    role: Some(role.to_string()),
                    parts,
                }
            })
            .collect();

        let tools = if tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolGroup {
                function_declarations: tools
                    .iter()
                    .map(|t| FunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    })
                    .collect(),
            }]
        };

        GenerateRequest {
            contents,
            system_instruction,
            tools,
            generation_config: options.map(|o| GenerationConfig {
                temperature: o.temperature,
                max_output_tokens: o.max_tokens,
            }),
        }
    }

    /// Convert a Gemini response to LLMResponse
    fn to_llm_response(response: GenerateResponse, model: &str) -> Result<LLMResponse> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| MutualsError::llm("Gemini returned no candidates"))?;

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.is_empty() {
            return Err(MutualsError::llm(format!(
                "Gemini returned an empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(text) = part.text {
                content.push_str(&text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall::new(call.name, call.args));
            }
        }

        let usage = response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(LLMResponse {
            content,
            tool_calls,
            usage,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
        })
    }

    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<LLMResponse> {
        trace!(request = %serde_json::to_string(request)?, "Gemini request");

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MutualsError::llm(format!("Gemini request timed out: {}", e))
                } else if e.is_connect() {
                    MutualsError::llm(format!("Cannot connect to {}: {}", self.api_base, e))
                } else {
                    MutualsError::from(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MutualsError::llm(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        let llm_response = Self::to_llm_response(parsed, model)?;
        debug!(
            model = %llm_response.model,
            tool_calls = llm_response.tool_calls.len(),
            tokens = llm_response.usage.as_ref().map(|u| u.total_tokens),
            "Gemini response"
        );
        Ok(llm_response)
    }
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = Self::build_request(messages, tools, options);
        self.generate(model, &request).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_request_maps_roles() {
        let messages = vec![
            Message::system("You drive a browser."),
            Message::user("Open the profile"),
            Message::assistant("Opening it"),
        ];
        let tools = vec![ToolDefinition::function(
            "navigate",
            "Open a URL",
            json!({"type": "object", "properties": {"url": {"type": "string"}}, "required": ["url"]}),
        )];

        let request = GeminiClient::build_request(
            &messages,
            &tools,
            Some(GenerateOptions {
                temperature: Some(0.1),
                max_tokens: None,
            }),
        );
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You drive a browser."
        );
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "navigate"
        );
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_parse_function_call_response() {
        let body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Clicking the mutual connections link."},
                        {"functionCall": {"name": "click", "args": {"ref": "e12"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 20, "totalTokenCount": 120},
            "modelVersion": "gemini-2.5-pro"
        });
        let parsed: GenerateResponse = serde_json::from_value(body).unwrap();
        let response = GeminiClient::to_llm_response(parsed, "gemini-2.5-pro").unwrap();

        assert_eq!(response.content, "Clicking the mutual connections link.");
        assert_eq!(
            response.tool_calls,
            vec![ToolCall::new("click", json!({"ref": "e12"}))]
        );
        assert_eq!(response.usage.unwrap().total_tokens, 120);
    }

    #[test]
    fn test_empty_candidates_is_error() {
        let parsed: GenerateResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(GeminiClient::to_llm_response(parsed, "m").is_err());

        let blocked: GenerateResponse = serde_json::from_value(
            json!({"candidates": [{"finishReason": "SAFETY"}]}),
        )
        .unwrap();
        let err = GeminiClient::to_llm_response(blocked, "m").unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_endpoint() {
        let mut config = Config::default();
        config.agent.api_key = Some("k".to_string());
        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(
            client.endpoint("models/gemini-2.5-pro"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }
}
