//! Guard pipeline - synchronous validation chains around tool execution
//!
//! Guards inspect and may transform the value presented to them; they have
//! no side effects on external state. Input guards run before the
//! executor; output guards run after it and may sanitize. Sanitization
//! composes: each guard sees the previous guard's value. The first hard
//! rejection wins.

use serde_json::Value;

/// Context visible to guards
#[derive(Debug, Clone)]
pub struct GuardContext {
    pub session_id: String,
    pub task: String,
}

/// Decision of one guard stage
#[derive(Debug, Clone)]
pub enum GuardDecision {
    Pass,
    Reject { reason: String },
    Sanitize { value: Value },
}

/// A guard stage; supply either hook or both
pub trait ToolGuard: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate_input(&self, _tool_name: &str, _input: &Value, _ctx: &GuardContext) -> GuardDecision {
        GuardDecision::Pass
    }

    fn validate_output(&self, _tool_name: &str, _output: &Value, _ctx: &GuardContext) -> GuardDecision {
        GuardDecision::Pass
    }
}

/// Result of folding a value through a guard chain
#[derive(Debug, Clone)]
pub enum ChainResult {
    /// Value passed; carries the (possibly sanitized) value
    Ok { value: Value, sanitized: bool },
    /// A guard rejected; carries the guard name and reason
    Rejected { guard: String, reason: String },
}

/// Fold an input value through every guard's `validate_input`
pub fn run_input_chain(guards: &[Box<dyn ToolGuard>], tool_name: &str, input: Value, ctx: &GuardContext) -> ChainResult {
    fold(guards, input, |guard, value| guard.validate_input(tool_name, value, ctx))
}

/// Fold an output value through every guard's `validate_output`
pub fn run_output_chain(
    guards: &[Box<dyn ToolGuard>],
    tool_name: &str,
    output: Value,
    ctx: &GuardContext,
) -> ChainResult {
    fold(guards, output, |guard, value| guard.validate_output(tool_name, value, ctx))
}

fn fold<F>(guards: &[Box<dyn ToolGuard>], initial: Value, mut check: F) -> ChainResult
where
    F: FnMut(&dyn ToolGuard, &Value) -> GuardDecision,
{
    let mut value = initial;
    let mut sanitized = false;

    for guard in guards {
        match check(guard.as_ref(), &value) {
            GuardDecision::Pass => {}
            GuardDecision::Reject { reason } => {
                return ChainResult::Rejected {
                    guard: guard.name().to_string(),
                    reason,
                };
            }
            GuardDecision::Sanitize { value: replacement } => {
                value = replacement;
                sanitized = true;
            }
        }
    }

    ChainResult::Ok { value, sanitized }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct RejectSecrets;
    impl ToolGuard for RejectSecrets {
        fn name(&self) -> &'static str {
            "reject-secrets"
        }

        fn validate_input(&self, _tool: &str, input: &Value, _ctx: &GuardContext) -> GuardDecision {
            if input.to_string().contains("secret") {
                GuardDecision::Reject {
                    reason: "input carries a secret".to_string(),
                }
            } else {
                GuardDecision::Pass
            }
        }
    }

    struct UppercaseOutput;
    impl ToolGuard for UppercaseOutput {
        fn name(&self) -> &'static str {
            "uppercase"
        }

        fn validate_output(&self, _tool: &str, output: &Value, _ctx: &GuardContext) -> GuardDecision {
            match output.as_str() {
                Some(s) => GuardDecision::Sanitize {
                    value: Value::String(s.to_uppercase()),
                },
                None => GuardDecision::Pass,
            }
        }
    }

    struct TruncateOutput;
    impl ToolGuard for TruncateOutput {
        fn name(&self) -> &'static str {
            "truncate"
        }

        fn validate_output(&self, _tool: &str, output: &Value, _ctx: &GuardContext) -> GuardDecision {
            match output.as_str() {
                Some(s) if s.len() > 5 => GuardDecision::Sanitize {
                    value: Value::String(s[..5].to_string()),
                },
                _ => GuardDecision::Pass,
            }
        }
    }

    fn ctx() -> GuardContext {
        GuardContext {
            session_id: "s".to_string(),
            task: "t".to_string(),
        }
    }

    #[test]
    fn test_input_chain_pass() {
        let guards: Vec<Box<dyn ToolGuard>> = vec![Box::new(RejectSecrets)];
        let result = run_input_chain(&guards, "fs_read", json!({"path": "a.rs"}), &ctx());
        assert!(matches!(result, ChainResult::Ok { sanitized: false, .. }));
    }

    #[test]
    fn test_input_chain_first_rejection_short_circuits() {
        let guards: Vec<Box<dyn ToolGuard>> = vec![Box::new(RejectSecrets)];
        let result = run_input_chain(&guards, "fs_read", json!({"path": "secret.pem"}), &ctx());
        match result {
            ChainResult::Rejected { guard, reason } => {
                assert_eq!(guard, "reject-secrets");
                assert!(reason.contains("secret"));
            }
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_output_sanitization_composes() {
        // uppercase runs first, truncate sees the uppercased value
        let guards: Vec<Box<dyn ToolGuard>> = vec![Box::new(UppercaseOutput), Box::new(TruncateOutput)];
        let result = run_output_chain(&guards, "fs_read", json!("hello world"), &ctx());
        match result {
            ChainResult::Ok { value, sanitized } => {
                assert!(sanitized);
                assert_eq!(value, json!("HELLO"));
            }
            _ => panic!("expected ok"),
        }
    }

    #[test]
    fn test_guard_default_hooks_pass() {
        struct Inert;
        impl ToolGuard for Inert {
            fn name(&self) -> &'static str {
                "inert"
            }
        }

        let guards: Vec<Box<dyn ToolGuard>> = vec![Box::new(Inert)];
        let result = run_output_chain(&guards, "any", json!(42), &ctx());
        assert!(matches!(result, ChainResult::Ok { sanitized: false, .. }));
    }
}
