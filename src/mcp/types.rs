//! Serializable response types for the gateway.
//!
//! All types implement `Serialize`, `Deserialize`, and `JsonSchema` for MCP
//! protocol compatibility.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, GatewayError};

/// Result of a shell execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Remote exit code, or -1 when the server closed the channel without one
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Human-readable rendering used in text responses.
    pub fn render(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str("--- stderr ---\n");
            text.push_str(&self.stderr);
        }
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!("--- exit code: {} ---", self.exit_code));
        text
    }
}

/// What a successful operation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutput {
    /// Shell-style result with both streams and the exit code.
    Command(CommandOutput),
    /// Textual payload: file content, listings, monitoring reports.
    Text(String),
    /// Operations without a payload (writes, transfers).
    Done(String),
}

/// Response envelope returned by the dispatcher for every call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperationResponse {
    /// Operation (or resource) name as requested
    pub operation: String,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Payload text, or the error message with its cause
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_output: Option<CommandOutput>,
}

impl OperationResponse {
    pub fn from_result(operation: &str, result: Result<OperationOutput, GatewayError>) -> Self {
        match result {
            Ok(OperationOutput::Command(output)) => Self {
                operation: operation.to_string(),
                is_error: false,
                error_kind: None,
                text: output.render(),
                command_output: Some(output),
            },
            Ok(OperationOutput::Text(text)) | Ok(OperationOutput::Done(text)) => Self {
                operation: operation.to_string(),
                is_error: false,
                error_kind: None,
                text,
                command_output: None,
            },
            Err(error) => Self {
                operation: operation.to_string(),
                is_error: true,
                error_kind: Some(error.kind()),
                text: error.to_string(),
                command_output: None,
            },
        }
    }
}

/// JSON body of a resource endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourcePayload {
    pub resource: String,
    pub command: String,
    pub output: String,
    /// When the command completed (RFC3339 format)
    pub timestamp: String,
}

#[cfg(test)]
mod response_serialization {
    use super::*;

    mod command_output {
        use super::*;

        #[test]
        fn test_serialize_and_deserialize() {
            let output = CommandOutput {
                stdout: "out".to_string(),
                stderr: "err".to_string(),
                exit_code: 127,
            };

            let json = serde_json::to_string(&output).unwrap();
            let deserialized: CommandOutput = serde_json::from_str(&json).unwrap();

            assert_eq!(deserialized, output);
            assert!(!deserialized.success());
        }

        #[test]
        fn test_render_includes_streams_and_exit_code() {
            let output = CommandOutput {
                stdout: "hello".to_string(),
                stderr: "warning".to_string(),
                exit_code: 1,
            };
            assert_eq!(
                output.render(),
                "hello\n--- stderr ---\nwarning\n--- exit code: 1 ---"
            );
        }

        #[test]
        fn test_render_stdout_only() {
            let output = CommandOutput {
                stdout: "a\n".to_string(),
                stderr: String::new(),
                exit_code: 0,
            };
            assert_eq!(output.render(), "a\n--- exit code: 0 ---");
        }
    }

    mod operation_response {
        use super::*;

        #[test]
        fn test_success_omits_error_fields() {
            let response = OperationResponse::from_result(
                "read_file",
                Ok(OperationOutput::Text("content".into())),
            );
            let json = serde_json::to_value(&response).unwrap();

            assert_eq!(json["operation"], "read_file");
            assert_eq!(json["is_error"], false);
            assert_eq!(json["text"], "content");
            assert!(json.get("error_kind").is_none());
            assert!(json.get("command_output").is_none());
        }

        #[test]
        fn test_error_carries_kind_and_cause() {
            let response = OperationResponse::from_result(
                "read_file",
                Err(GatewayError::FileAccess("No such file: /x".into())),
            );

            assert!(response.is_error);
            assert_eq!(response.error_kind, Some(ErrorKind::FileAccess));
            assert!(response.text.contains("No such file: /x"));

            let json = serde_json::to_value(&response).unwrap();
            assert_eq!(json["error_kind"], "file_access");
        }

        #[test]
        fn test_command_output_is_structured() {
            let output = CommandOutput {
                stdout: "x".into(),
                stderr: String::new(),
                exit_code: 0,
            };
            let response = OperationResponse::from_result(
                "execute_command",
                Ok(OperationOutput::Command(output.clone())),
            );
            assert_eq!(response.command_output, Some(output));
            assert!(response.text.starts_with('x'));
        }
    }
}
