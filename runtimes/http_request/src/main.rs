//! HTTP request action - performs one HTTP request and returns the response.
//!
//! Input fields:
//! - `url` (string, required): Request URL
//! - `method` (string, optional): GET (default), POST, PUT, DELETE, PATCH,
//!   HEAD or OPTIONS; case-insensitive
//! - `headers` (map, optional): Request headers
//! - `body` (string, optional): Request body
//! - `timeout` (integer, optional): Seconds, default 30
//!
//! Any HTTP status counts as success; only transport failures fail the action.
//! Failures exit 1 with `{success: false, message, error}` on stdout.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use conduit_pipeline::Format;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const ALLOWED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

#[derive(Debug, Deserialize)]
struct RequestInput {
    #[serde(default)]
    url: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    timeout: u64,
}

#[derive(Debug, Default, Serialize)]
struct RequestOutput {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RequestOutput {
    fn failure(message: &str, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error: Some(detail.into()),
            ..Default::default()
        }
    }
}

/// Content type inferred for a body sent without one.
fn detect_content_type(body: &str) -> &'static str {
    match body.trim_start().chars().next() {
        Some('{') | Some('[') => "application/json",
        _ => "text/plain",
    }
}

/// First value of each response header; non-UTF-8 values are converted lossily.
fn first_header_values(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for name in headers.keys() {
        if let Some(value) = headers.get(name) {
            out.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
    }
    out
}

/// Core processing logic, separated for testability.
///
/// Uses the blocking client, so it must not run on an async executor thread.
fn process(input: &str, format: Format) -> RequestOutput {
    let input: RequestInput = match format.parse_as(input) {
        Ok(input) => input,
        Err(e) => return RequestOutput::failure(&format!("Failed to parse {format} input"), e),
    };

    if input.url.is_empty() {
        return RequestOutput::failure("Missing required field", "url is required");
    }

    let method_name = if input.method.is_empty() {
        "GET".to_string()
    } else {
        input.method.to_uppercase()
    };
    if !ALLOWED_METHODS.contains(&method_name.as_str()) {
        return RequestOutput::failure(
            "Invalid HTTP method",
            format!(
                "method must be one of: {}, got: {}",
                ALLOWED_METHODS.join(", "),
                input.method
            ),
        );
    }
    let method = match Method::from_bytes(method_name.as_bytes()) {
        Ok(method) => method,
        Err(e) => return RequestOutput::failure("Invalid HTTP method", e.to_string()),
    };

    let timeout = if input.timeout == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        input.timeout
    };
    let client = match Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
    {
        Ok(client) => client,
        Err(e) => return RequestOutput::failure("Failed to create HTTP client", e.to_string()),
    };

    let mut request = client.request(method, &input.url);
    for (name, value) in &input.headers {
        request = request.header(name, value);
    }
    if !input.body.is_empty() {
        let has_content_type = input
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        if !has_content_type {
            request = request.header(CONTENT_TYPE, detect_content_type(&input.body));
        }
        request = request.body(input.body.clone());
    }

    info!(method = %method_name, url = %input.url, "Making request");

    let response = match request.send() {
        Ok(response) => response,
        Err(e) => return RequestOutput::failure("Failed to execute HTTP request", e.to_string()),
    };

    let status = response.status().as_u16();
    let headers = first_header_values(response.headers());
    let body = match response.bytes() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => return RequestOutput::failure("Failed to read response body", e.to_string()),
    };

    info!(status, "Request completed");

    RequestOutput {
        success: true,
        message: format!(
            "HTTP {} request to {} completed successfully",
            method_name, input.url
        ),
        status_code: Some(status),
        headers: Some(headers),
        body: Some(body),
        error: None,
    }
}

fn emit(output: &RequestOutput, format: Format) {
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

    let mut input = String::new();
    let output = match std::io::stdin().read_to_string(&mut input) {
        Ok(_) => process(&input, format),
        Err(e) => RequestOutput::failure("Failed to read input", e.to_string()),
    };

    emit(&output, format);
    if !output.success {
        std::process::exit(1);
    }
}
