//! Completion request action - sends one prompt to the Anthropic messages API.
//!
//! Input fields:
//! - `prompt` (string, required): User message
//! - `api_key` (string, optional): Falls back to `CLAUDE_API_KEY`
//! - `model` (string, optional): Default `claude-3-sonnet-20240229`
//! - `max_tokens` (integer, optional): Default 1000
//! - `temperature` (number, optional): Default 0.7
//! - `system_prompt` (string, optional): Sent as the `system` field
//! - `timeout` (integer, optional): Seconds, default 60
//!
//! `COMPLETION_API_BASE_URL` overrides the API host.
//! Failures exit 1 with `{success: false, message, error}` on stdout.

use std::io::Read;
use std::time::Duration;

use conduit_pipeline::Format;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const API_KEY_ENV: &str = "CLAUDE_API_KEY";
const BASE_URL_ENV: &str = "COMPLETION_API_BASE_URL";

const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const KNOWN_MODELS: [&str; 5] = [
    "claude-3-sonnet-20240229",
    "claude-3-opus-20240229",
    "claude-3-haiku-20240307",
    "claude-2.1",
    "claude-2.0",
];

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
struct Settings {
    base_url: String,
    env_api_key: Option<String>,
}

impl Settings {
    fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            env_api_key: std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionInput {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    max_tokens: u32,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    system_prompt: String,
    #[serde(default)]
    timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Default, Serialize)]
struct CompletionOutput {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CompletionOutput {
    fn failure(message: &str, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error: Some(detail.into()),
            ..Default::default()
        }
    }
}

// Wire types for the messages endpoint.

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Error detail for a non-200 reply, using the structured error body when present.
fn describe_error_status(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(parsed) => format!(
            "Status: {status}, Type: {}, Message: {}",
            parsed.error.kind, parsed.error.message
        ),
        Err(_) => format!("Status: {status}, Body: {body}"),
    }
}

/// Core processing logic, separated for testability.
///
/// Uses the blocking client, so it must not run on an async executor thread.
fn process(input: &str, format: Format, settings: &Settings) -> CompletionOutput {
    let input: CompletionInput = match format.parse_as(input) {
        Ok(input) => input,
        Err(e) => return CompletionOutput::failure(&format!("Failed to parse {format} input"), e),
    };

    if input.prompt.is_empty() {
        return CompletionOutput::failure("Missing required field", "prompt is required");
    }

    let api_key = if input.api_key.is_empty() {
        match settings.env_api_key.as_deref() {
            Some(key) => key.to_string(),
            None => {
                return CompletionOutput::failure(
                    "Missing API key",
                    format!(
                        "api_key must be provided in input or {API_KEY_ENV} environment variable must be set"
                    ),
                );
            }
        }
    } else {
        input.api_key.clone()
    };

    let model = if input.model.is_empty() {
        DEFAULT_MODEL
    } else {
        input.model.as_str()
    };
    if !KNOWN_MODELS.contains(&model) {
        warn!(model, "Unknown model, sending anyway");
    }

    let max_tokens = if input.max_tokens == 0 {
        DEFAULT_MAX_TOKENS
    } else {
        input.max_tokens
    };
    let timeout = if input.timeout == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        input.timeout
    };

    let request = ApiRequest {
        model,
        max_tokens,
        temperature: input.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        system: (!input.system_prompt.is_empty()).then_some(input.system_prompt.as_str()),
        messages: vec![ApiMessage {
            role: "user",
            content: &input.prompt,
        }],
    };

    let client = match Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
    {
        Ok(client) => client,
        Err(e) => return CompletionOutput::failure("Failed to create HTTP client", e.to_string()),
    };

    info!(model, max_tokens, "Sending completion request");

    let response = match client
        .post(settings.messages_url())
        .header(CONTENT_TYPE, "application/json")
        .header("x-api-key", &api_key)
        .header("anthropic-version", API_VERSION)
        .json(&request)
        .send()
    {
        Ok(response) => response,
        Err(e) => {
            return CompletionOutput::failure(
                "Failed to execute request to Claude API",
                e.to_string(),
            );
        }
    };

    let status = response.status().as_u16();
    let body = match response.text() {
        Ok(body) => body,
        Err(e) => return CompletionOutput::failure("Failed to read response body", e.to_string()),
    };

    if status != 200 {
        return CompletionOutput::failure("Claude API error", describe_error_status(status, &body));
    }

    let parsed: ApiResponse = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(e) => return CompletionOutput::failure("Failed to parse Claude response", e.to_string()),
    };

    let text = match parsed.content.first() {
        Some(block) if block.kind == "text" => block.text.clone(),
        _ => {
            return CompletionOutput::failure(
                "No text content in response",
                "response contained no text content block",
            );
        }
    };

    info!(
        input_tokens = parsed.usage.input_tokens,
        output_tokens = parsed.usage.output_tokens,
        "Completion received"
    );

    CompletionOutput {
        success: true,
        message: format!("Successfully generated response using {}", parsed.model),
        response: Some(text),
        model: Some(parsed.model),
        usage: Some(parsed.usage),
        error: None,
    }
}

fn emit(output: &CompletionOutput, format: Format) {
    match format.to_text(output) {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => warn!(error = %e, "Failed to encode output"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();

    let format = Format::build_default();
    let settings = Settings::from_env();

    let mut input = String::new();
    let output = match std::io::stdin().read_to_string(&mut input) {
        Ok(_) => process(&input, format, &settings),
        Err(e) => CompletionOutput::failure("Failed to read input", e.to_string()),
    };

    emit(&output, format);
    if !output.success {
        std::process::exit(1);
    }
}
