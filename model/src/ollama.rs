use crate::config::OllamaConfig;
use crate::provider::{ModelError, ModelProvider, ModelResult};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, Choice, FinishReason, FunctionCall, MessageRole,
    ModelInfo, ToolCall, ToolDefinition, Usage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

#[derive(Serialize)]
struct OllamaApiRequest {
    model: String,
    messages: Vec<OllamaApiMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaApiTool>,
    options: OllamaApiOptions,
}

#[derive(Serialize)]
struct OllamaApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaApiToolCall>,
}

#[derive(Serialize)]
struct OllamaApiTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: serde_json::Value,
}

#[derive(Serialize)]
struct OllamaApiOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaApiResponse {
    message: OllamaApiResponseMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaApiResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaApiToolCall>,
}

#[derive(Serialize, Deserialize, Clone)]
struct OllamaApiToolCall {
    function: OllamaApiToolCallFunction,
}

#[derive(Serialize, Deserialize, Clone)]
struct OllamaApiToolCallFunction {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Deserialize)]
struct OllamaTag {
    name: String,
    size: Option<u64>,
    digest: Option<String>,
    modified_at: Option<String>,
}

/// Chat provider speaking the native Ollama HTTP API.
pub struct OllamaProvider {
    http_client: reqwest::Client,
    base_url: String,
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> ModelResult<Self> {
        config
            .validate()
            .map_err(|message| ModelError::InvalidConfig { message })?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Unknown {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: config.normalized_base_url(),
            config,
        })
    }

    pub fn with_default_config() -> ModelResult<Self> {
        Self::new(OllamaConfig::default())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn convert_tool_def(tool: &ToolDefinition) -> OllamaApiTool {
        // The schema types already serialize to JSON-schema shape.
        OllamaApiTool {
            tool_type: "function",
            function: serde_json::json!({
                "name": tool.function.name,
                "description": tool.function.description,
                "parameters": tool.function.parameters,
            }),
        }
    }

    fn convert_message_to_api(msg: &ChatMessage) -> OllamaApiMessage {
        OllamaApiMessage {
            role: msg.role.as_str(),
            content: msg.text().to_string(),
            tool_calls: msg
                .requested_tools()
                .iter()
                .map(|tc| OllamaApiToolCall {
                    function: OllamaApiToolCallFunction {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect(),
        }
    }

    fn build_request_body(&self, request: &ChatRequest) -> OllamaApiRequest {
        OllamaApiRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(Self::convert_message_to_api)
                .collect(),
            stream: false,
            tools: request
                .tools
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .map(Self::convert_tool_def)
                .collect(),
            options: OllamaApiOptions {
                temperature: request
                    .temperature
                    .unwrap_or(self.config.defaults.temperature),
                num_predict: request.max_tokens.or(self.config.defaults.max_tokens),
            },
        }
    }

    fn parse_response(response: OllamaApiResponse) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = response
            .message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, tc)| ToolCall {
                id: format!("call_{}", i),
                function: FunctionCall {
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                },
            })
            .collect();

        let has_tool_calls = !tool_calls.is_empty();
        let content = Some(response.message.content).filter(|c| !c.is_empty());

        let message = ChatMessage {
            role: MessageRole::Assistant,
            content,
            tool_calls: has_tool_calls.then_some(tool_calls),
            tool_call_id: None,
        };

        let prompt_tokens = response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = response.eval_count.unwrap_or(0);

        ChatResponse {
            choices: vec![Choice {
                message,
                finish_reason: Some(if has_tool_calls {
                    FinishReason::ToolCalls
                } else {
                    FinishReason::Stop
                }),
            }],
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens.saturating_add(completion_tokens),
            }),
        }
    }

    fn handle_http_error(err: reqwest::Error) -> ModelError {
        if err.is_timeout() {
            ModelError::ServiceUnavailable {
                message: "Request timeout".to_string(),
            }
        } else if err.is_connect() {
            ModelError::ServiceUnavailable {
                message: "Cannot connect to Ollama service".to_string(),
            }
        } else {
            ModelError::Network(err)
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn chat(&self, request: ChatRequest) -> ModelResult<ChatResponse> {
        debug!("Starting chat request with model: {}", request.model);

        let body = self.build_request_body(&request);
        let url = format!("{}/api/chat", self.base_url);

        let http_response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::handle_http_error)?;

        let status = http_response.status();
        if status.as_u16() == 404 {
            return Err(ModelError::ModelNotFound {
                model: request.model,
            });
        }
        if !status.is_success() {
            let error_text = http_response.text().await.unwrap_or_default();
            return Err(ModelError::Unknown {
                message: format!("Ollama API returned {}: {}", status, error_text),
            });
        }

        let api_response: OllamaApiResponse =
            http_response.json().await.map_err(ModelError::Network)?;

        info!("Chat request to {} completed", request.model);
        Ok(Self::parse_response(api_response))
    }

    async fn list_models(&self) -> ModelResult<Vec<ModelInfo>> {
        debug!("Listing available models");

        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(Self::handle_http_error)?
            .error_for_status()
            .map_err(Self::handle_http_error)?;

        let tags: OllamaTagsResponse = response.json().await.map_err(ModelError::Network)?;
        let models: Vec<ModelInfo> = tags
            .models
            .into_iter()
            .map(|tag| ModelInfo {
                name: tag.name,
                size: tag.size,
                digest: tag.digest,
                modified_at: tag.modified_at,
            })
            .collect();

        info!("Retrieved {} models", models.len());
        Ok(models)
    }

    async fn health_check(&self) -> ModelResult<()> {
        match self.list_models().await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Health check failed: {}", e);
                Err(e)
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JsonSchema, PropertySchema};

    fn provider() -> OllamaProvider {
        OllamaProvider::with_default_config().unwrap()
    }

    #[test]
    fn test_tool_definition_to_ollama_json() {
        let def = ToolDefinition::new(
            "get_flaky_tests",
            "Tests with unstable outcomes",
            JsonSchema::object([("threshold", PropertySchema::number("Pass ratio cut-off"))]),
        );

        let api_tool = OllamaProvider::convert_tool_def(&def);
        let json = serde_json::to_value(&api_tool).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_flaky_tests");
        assert_eq!(
            json["function"]["parameters"]["properties"]["threshold"]["type"],
            "number"
        );
    }

    #[test]
    fn test_request_body_applies_defaults() {
        let provider = provider();
        let request = ChatRequest::new("llama3.1:8b", vec![ChatMessage::user("Summarize")]);

        let body = provider.build_request_body(&request);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(json.get("tools").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let raw = serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "get_mttr_by_severity", "arguments": {}}}
                ]
            },
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 3
        });
        let parsed: OllamaApiResponse = serde_json::from_value(raw).unwrap();
        let response = OllamaProvider::parse_response(parsed);

        let choice = &response.choices[0];
        assert_eq!(choice.finish_reason, Some(FinishReason::ToolCalls));
        assert!(choice.message.content.is_none());
        assert_eq!(choice.message.requested_tools()[0].id, "call_0");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_response_text_only() {
        let raw = serde_json::json!({
            "message": {"role": "assistant", "content": "Velocity declined."},
            "done": true
        });
        let parsed: OllamaApiResponse = serde_json::from_value(raw).unwrap();
        let response = OllamaProvider::parse_response(parsed);

        assert_eq!(response.first_message().unwrap().text(), "Velocity declined.");
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_provider_rejects_invalid_config() {
        let config = OllamaConfig::new().with_base_url("ftp://nowhere");
        assert!(matches!(
            OllamaProvider::new(config),
            Err(ModelError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_provider_normalizes_base_url() {
        let provider =
            OllamaProvider::new(OllamaConfig::new().with_base_url("http://localhost:11434/v1"))
                .unwrap();
        assert_eq!(provider.base_url(), "http://localhost:11434");
        assert_eq!(provider.provider_name(), "ollama");
    }
}
