//! Echo action - returns the input message, optionally prefixed.
//!
//! Input fields:
//! - `message` (string, required): Text to echo
//! - `prefix` (string, optional): Prepended to the message
//!
//! Failures are reported through the `error` field and still exit 0.

use std::io::Read;

use conduit_pipeline::Format;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
struct EchoInput {
    #[serde(default)]
    message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    prefix: String,
}

#[derive(Debug, Serialize)]
struct EchoOutput {
    echoed_message: String,
    original_input: EchoInput,
}

#[derive(Debug, Serialize)]
struct ErrorOutput {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_request: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Response {
    Echoed(EchoOutput),
    Failed(ErrorOutput),
}

impl Response {
    fn failed(message: &str, original_request: Option<Value>) -> Self {
        Response::Failed(ErrorOutput {
            error: message.to_string(),
            original_request,
        })
    }
}

/// Core processing logic, separated for testability.
fn process(input: &str, format: Format) -> Response {
    let parsed: EchoInput = match format.parse_as(input) {
        Ok(parsed) => parsed,
        Err(_) => {
            return Response::failed(
                &format!("Invalid input {format} format"),
                Some(Value::String(input.to_string())),
            );
        }
    };

    if parsed.message.is_empty() {
        return Response::failed(
            "Missing required field: message",
            serde_json::to_value(&parsed).ok(),
        );
    }

    Response::Echoed(EchoOutput {
        echoed_message: format!("{}{}", parsed.prefix, parsed.message),
        original_input: parsed,
    })
}

fn emit(response: &Response, format: Format) {
    match format.to_text(response) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            print!(r#"{{"error":"Failed to serialize output: {}"}}"#, e.replace('"', "'"));
            std::process::exit(1);
        }
    }
}

fn main() {
    let format = Format::build_default();

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        emit(&Response::failed("Failed to read input from stdin", None), format);
        return;
    }

    emit(&process(&input, format), format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(input: Value) -> Value {
        let response = process(&input.to_string(), Format::Json);
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_echo_with_prefix() {
        let out = run(json!({"message": "hi", "prefix": "["}));
        assert_eq!(out["echoed_message"], "[hi");
        assert_eq!(out["original_input"], json!({"message": "hi", "prefix": "["}));
        assert!(out.get("error").is_none());
    }

    #[test]
    fn test_echo_without_prefix() {
        let out = run(json!({"message": "plain"}));
        assert_eq!(out["echoed_message"], "plain");
        assert_eq!(out["original_input"], json!({"message": "plain"}));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let out = run(json!({"message": "m", "volume": 11}));
        assert_eq!(out["echoed_message"], "m");
    }

    #[test]
    fn test_missing_message() {
        let out = run(json!({"prefix": ">"}));
        assert_eq!(out["error"], "Missing required field: message");
        assert_eq!(out["original_request"], json!({"message": "", "prefix": ">"}));
    }

    #[test]
    fn test_empty_message() {
        let out = run(json!({"message": ""}));
        assert_eq!(out["error"], "Missing required field: message");
    }

    #[test]
    fn test_invalid_input() {
        let response = process("{not json", Format::Json);
        let out = serde_json::to_value(response).unwrap();
        assert_eq!(out["error"], "Invalid input JSON format");
        assert_eq!(out["original_request"], "{not json");
    }

    #[test]
    fn test_wrong_message_type_is_invalid_input() {
        let out = run(json!({"message": 42}));
        assert_eq!(out["error"], "Invalid input JSON format");
    }

    #[test]
    fn test_yaml_io() {
        let response = process("message: hi\nprefix: '> '\n", Format::Yaml);
        let text = Format::Yaml.to_text(&response).unwrap();
        let out: Value = Format::Yaml.parse(&text).unwrap();
        assert_eq!(out["echoed_message"], "> hi");
    }
}
