//! shell_exec tool - run a shell command with a timeout

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::tools::error::{ErrorCode, ToolErrorDetails};
use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// Default command timeout
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Output kept per stream
const MAX_CAPTURE_BYTES: usize = 30_000;

/// Run a shell command inside the project
pub struct ShellExecTool;

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &'static str {
        "shell_exec"
    }

    fn description(&self) -> &'static str {
        "Run a shell command. Working directory defaults to the project root."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("command", SchemaNode::string("Command line to run")),
                ("cwd", SchemaNode::string("Working directory (default: project root)")),
                ("timeout_ms", SchemaNode::integer_min("Timeout in milliseconds", 1)),
            ],
            &["command"],
        )
    }

    fn read_only(&self) -> bool {
        false
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Shell
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(command) = input["command"].as_str() else {
            return ToolOutcome::execution_error("command is required");
        };

        let cwd = input["cwd"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| ctx.root.to_string_lossy().to_string());
        let timeout_ms = input["timeout_ms"].as_u64().unwrap_or(DEFAULT_TIMEOUT_MS);

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .output();

        let output = match tokio::time::timeout(Duration::from_millis(timeout_ms), child).await {
            Err(_) => {
                return ToolOutcome::failure(
                    ToolErrorDetails::new(
                        ErrorCode::ShellTimeout,
                        format!("Command timed out after {}ms", timeout_ms),
                    )
                    .with_hint("narrow the command or raise timeout_ms"),
                );
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return ToolOutcome::failure(ToolErrorDetails::new(
                    ErrorCode::CommandNotFound,
                    format!("Command not found: {}", command),
                ));
            }
            Ok(Err(e)) => return ToolOutcome::execution_error(format!("Failed to spawn: {}", e)),
            Ok(Ok(output)) => output,
        };

        let stdout = clip(&String::from_utf8_lossy(&output.stdout));
        let stderr = clip(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let body = if stderr.is_empty() { &stdout } else { &stderr };
            // The shell reports a missing binary as exit 127
            if code == 127 {
                return ToolOutcome::failure(ToolErrorDetails::new(
                    ErrorCode::CommandNotFound,
                    format!("Command not found: {}", command),
                ));
            }
            return ToolOutcome::failure(
                ToolErrorDetails::new(
                    ErrorCode::NonZeroExit,
                    format!("exit code {}: {}", code, body),
                )
                .with_hint("inspect the output and adjust the command"),
            );
        }

        if stdout.is_empty() && stderr.is_empty() {
            return ToolOutcome::success("(no output)");
        }
        ToolOutcome::success(if stderr.is_empty() {
            stdout
        } else {
            format!("{}\n--- stderr ---\n{}", stdout, stderr)
        })
    }
}

fn clip(s: &str) -> String {
    if s.len() > MAX_CAPTURE_BYTES {
        format!("{}...\n[output truncated]", &s[..MAX_CAPTURE_BYTES])
    } else {
        s.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn ctx(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf(), "s", "r")
    }

    #[tokio::test]
    async fn test_successful_command_captures_stdout() {
        let temp = tempdir().unwrap();
        let result = ShellExecTool
            .execute(json!({"command": "echo hello"}), &ctx(temp.path()))
            .await;
        assert!(result.success);
        assert_eq!(result.render(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_retryable() {
        let temp = tempdir().unwrap();
        let result = ShellExecTool
            .execute(json!({"command": "exit 3"}), &ctx(temp.path()))
            .await;
        assert!(!result.success);
        let details = result.error_details.unwrap();
        assert_eq!(details.code, ErrorCode::NonZeroExit);
        assert!(details.retryable);
        assert!(details.message.contains("exit code 3"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_not_found() {
        let temp = tempdir().unwrap();
        let result = ShellExecTool
            .execute(json!({"command": "definitely_not_a_real_binary_kb"}), &ctx(temp.path()))
            .await;
        assert_eq!(result.error_details.unwrap().code, ErrorCode::CommandNotFound);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_shell_timeout() {
        let temp = tempdir().unwrap();
        let result = ShellExecTool
            .execute(json!({"command": "sleep 5", "timeout_ms": 50}), &ctx(temp.path()))
            .await;
        let details = result.error_details.unwrap();
        assert_eq!(details.code, ErrorCode::ShellTimeout);
        assert!(details.retryable);
    }

    #[tokio::test]
    async fn test_runs_in_given_cwd() {
        let temp = tempdir().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/marker.txt"), "").unwrap();

        let cwd = temp.path().join("sub").to_string_lossy().to_string();
        let result = ShellExecTool
            .execute(json!({"command": "ls", "cwd": cwd}), &ctx(temp.path()))
            .await;
        assert!(result.render().contains("marker.txt"));
    }
}
