//! Tool manager - pack registry, permissions, guard pipeline, execution
//!
//! Tools arrive in packs. A pack owns a namespace, a conflict policy for
//! short-name collisions, a priority, and optional permissions. After
//! `initialize_all` the registry is effectively immutable; execution never
//! raises - every failure becomes a structured error outcome.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::context::ToolContext;
use super::error::{ErrorCode, ToolErrorDetails};
use super::guard::{ChainResult, GuardContext, ToolGuard, run_input_chain, run_output_chain};
use super::traits::{Tool, ToolCapability, ToolOutcome};
use crate::llm::ToolDefinition;

/// How a pack resolves short-name collisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Raise at registration
    #[default]
    Error,
    /// Both tools stay, each only under `<namespace>.<name>`
    NamespacePrefix,
    /// Higher priority wins the short name; the loser stays qualified
    Override,
}

/// Sandboxing permissions attached to a pack
#[derive(Debug, Clone, Default)]
pub struct PackPermissions {
    /// Command substrings this pack refuses to run
    pub denied_commands: Vec<String>,
    /// Path prefixes (project-relative) the pack's tools may touch
    pub allowed_roots: Vec<String>,
    /// Whether executions are reported to the audit sink
    pub audit_trail: bool,
}

type EnabledPredicate = Box<dyn Fn() -> bool + Send + Sync>;
type LifecycleHook = Box<dyn Fn() + Send + Sync>;

/// A group of tools sharing a namespace and permissions
pub struct ToolPack {
    pub id: String,
    pub namespace: String,
    pub conflict_policy: ConflictPolicy,
    pub priority: i32,
    pub permissions: Option<PackPermissions>,
    enabled: Option<EnabledPredicate>,
    on_initialize: Option<LifecycleHook>,
    on_dispose: Option<LifecycleHook>,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolPack {
    pub fn new(id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            conflict_policy: ConflictPolicy::default(),
            priority: 0,
            permissions: None,
            enabled: None,
            on_initialize: None,
            on_dispose: None,
            tools: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_permissions(mut self, permissions: PackPermissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_enabled(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.enabled = Some(Box::new(predicate));
        self
    }

    pub fn on_initialize(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_initialize = Some(Box::new(hook));
        self
    }

    pub fn on_dispose(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }
}

/// Registration failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Pack already registered: {id}")]
    DuplicatePack { id: String },

    #[error("Tool name conflict on '{name}' (policy is error)")]
    NameConflict { name: String },

    #[error("Qualified name collision: {name}")]
    QualifiedCollision { name: String },
}

struct Binding {
    pack_id: String,
    priority: i32,
    tool: Arc<dyn Tool>,
}

struct PackEntry {
    id: String,
    permissions: Option<PackPermissions>,
    on_initialize: Option<LifecycleHook>,
    on_dispose: Option<LifecycleHook>,
}

type AuditSink = Box<dyn Fn(&str, &str, &Value) + Send + Sync>;

/// Filter for tool discovery
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub read_only: Option<bool>,
    pub capability: Option<ToolCapability>,
    pub namespace: Option<String>,
}

/// Registry of tool packs with guarded execution
pub struct ToolManager {
    packs: Vec<PackEntry>,
    bindings: HashMap<String, Binding>,
    namespaces: HashMap<String, String>,
    /// Short names withdrawn by a namespace-prefix conflict; once
    /// contested, a short name stays qualified-only forever
    withdrawn: std::collections::HashSet<String>,
    guards: Vec<Box<dyn ToolGuard>>,
    audit_sink: Option<AuditSink>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self {
            packs: Vec::new(),
            bindings: HashMap::new(),
            namespaces: HashMap::new(),
            withdrawn: std::collections::HashSet::new(),
            guards: Vec::new(),
            audit_sink: None,
        }
    }

    /// Install a guard at the end of the chain
    pub fn add_guard(&mut self, guard: Box<dyn ToolGuard>) {
        self.guards.push(guard);
    }

    /// Install the audit callback invoked for audited packs
    pub fn set_audit_sink(&mut self, sink: impl Fn(&str, &str, &Value) + Send + Sync + 'static) {
        self.audit_sink = Some(Box::new(sink));
    }

    /// Register a pack
    ///
    /// Duplicate pack ids are rejected. A pack whose `enabled` predicate
    /// returns false is silently skipped. Short-name conflicts resolve per
    /// the incoming pack's policy.
    pub fn register(&mut self, pack: ToolPack) -> Result<(), RegistryError> {
        if self.packs.iter().any(|p| p.id == pack.id) {
            return Err(RegistryError::DuplicatePack { id: pack.id });
        }

        if let Some(enabled) = &pack.enabled
            && !enabled()
        {
            debug!(pack_id = %pack.id, "register: pack disabled, skipping");
            return Ok(());
        }

        // Validate before mutating: conflicts under an error policy must
        // leave the registry untouched.
        for tool in &pack.tools {
            let qualified = format!("{}.{}", pack.namespace, tool.name());
            if self.bindings.contains_key(&qualified) {
                return Err(RegistryError::QualifiedCollision { name: qualified });
            }
            let contested = self.bindings.contains_key(tool.name()) || self.withdrawn.contains(tool.name());
            if pack.conflict_policy == ConflictPolicy::Error && contested {
                return Err(RegistryError::NameConflict {
                    name: tool.name().to_string(),
                });
            }
        }

        for tool in &pack.tools {
            let short = tool.name().to_string();
            let qualified = format!("{}.{}", pack.namespace, short);

            self.bindings.insert(
                qualified.clone(),
                Binding {
                    pack_id: pack.id.clone(),
                    priority: pack.priority,
                    tool: Arc::clone(tool),
                },
            );
            self.namespaces.insert(qualified, pack.namespace.clone());

            let existing_priority = self.bindings.get(&short).map(|b| b.priority);
            match existing_priority {
                None => {
                    if self.withdrawn.contains(&short) {
                        // A past namespace-prefix conflict keeps this name
                        // qualified-only
                        continue;
                    }
                    self.bindings.insert(
                        short.clone(),
                        Binding {
                            pack_id: pack.id.clone(),
                            priority: pack.priority,
                            tool: Arc::clone(tool),
                        },
                    );
                    self.namespaces.insert(short, pack.namespace.clone());
                }
                Some(existing_priority) => match pack.conflict_policy {
                    ConflictPolicy::Error => unreachable!("validated above"),
                    ConflictPolicy::NamespacePrefix => {
                        debug!(name = %short, "register: withdrawing short name, both packs go qualified");
                        self.bindings.remove(&short);
                        self.namespaces.remove(&short);
                        self.withdrawn.insert(short.clone());
                    }
                    ConflictPolicy::Override => {
                        if pack.priority > existing_priority {
                            debug!(name = %short, winner = %pack.id, "register: override takes short name");
                            self.bindings.insert(
                                short.clone(),
                                Binding {
                                    pack_id: pack.id.clone(),
                                    priority: pack.priority,
                                    tool: Arc::clone(tool),
                                },
                            );
                            self.namespaces.insert(short, pack.namespace.clone());
                        }
                    }
                },
            }
        }

        self.packs.push(PackEntry {
            id: pack.id,
            permissions: pack.permissions,
            on_initialize: pack.on_initialize,
            on_dispose: pack.on_dispose,
        });
        Ok(())
    }

    /// Whether a binding (short or qualified) exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Binding names matching a filter, sorted
    pub fn list(&self, filter: &ToolFilter) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, b)| filter.read_only.is_none_or(|ro| b.tool.read_only() == ro))
            .filter(|(_, b)| filter.capability.is_none_or(|c| b.tool.capability() == c))
            .filter(|(name, _)| {
                filter
                    .namespace
                    .as_deref()
                    .is_none_or(|ns| self.namespaces.get(name.as_str()).map(|n| n == ns).unwrap_or(false))
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Definitions for the LLM, sorted by binding name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let binding = &self.bindings[name];
                ToolDefinition::new(name.clone(), binding.tool.description(), binding.tool.schema().to_json())
            })
            .collect()
    }

    /// Run `initialize` hooks in registration order
    pub fn initialize_all(&self) {
        for pack in &self.packs {
            if let Some(hook) = &pack.on_initialize {
                debug!(pack_id = %pack.id, "initialize_all: running hook");
                hook();
            }
        }
    }

    /// Run `dispose` hooks in registration order
    pub fn dispose_all(&self) {
        for pack in &self.packs {
            if let Some(hook) = &pack.on_dispose {
                debug!(pack_id = %pack.id, "dispose_all: running hook");
                hook();
            }
        }
    }

    /// Execute a tool by binding name
    ///
    /// Missing tools, permission violations, guard rejections, and
    /// executor failures all come back as error outcomes - never panics,
    /// never `Err`.
    pub async fn execute(&self, name: &str, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(binding) = self.bindings.get(name) else {
            return ToolOutcome::failure(
                ToolErrorDetails::new(ErrorCode::ToolNotFound, format!("Unknown tool: {}", name))
                    .with_hint("use one of the declared tools"),
            );
        };

        let pack = self.packs.iter().find(|p| p.id == binding.pack_id);

        // Permission sandboxing before anything runs
        if let Some(permissions) = pack.and_then(|p| p.permissions.as_ref()) {
            if let Some(details) = check_permissions(permissions, &input) {
                return ToolOutcome::failure(details);
            }
        }

        // Declared schema gate
        if let Err(violations) = binding.tool.schema().validate(&input) {
            return ToolOutcome::failure(
                ToolErrorDetails::new(ErrorCode::SchemaValidationFailed, violations.join("; "))
                    .with_hint("match the declared parameter schema"),
            );
        }

        let guard_ctx = GuardContext {
            session_id: ctx.session_id.clone(),
            task: ctx.task.clone(),
        };

        // Input guards: first rejection short-circuits
        let input = match run_input_chain(&self.guards, name, input, &guard_ctx) {
            ChainResult::Ok { value, .. } => value,
            ChainResult::Rejected { guard, reason } => {
                return ToolOutcome::failure(
                    ToolErrorDetails::new(ErrorCode::InputRejected, format!("{} rejected input: {}", guard, reason))
                        .with_retryable(false),
                );
            }
        };

        let mut outcome = binding.tool.execute(input.clone(), ctx).await;

        // Output guards compose sanitization; first hard rejection wins
        if outcome.success {
            match run_output_chain(&self.guards, name, outcome.output.clone(), &guard_ctx) {
                ChainResult::Ok { value, sanitized } => {
                    outcome.output = value;
                    outcome.sanitized = outcome.sanitized || sanitized;
                }
                ChainResult::Rejected { guard, reason } => {
                    outcome = ToolOutcome::failure(ToolErrorDetails::new(
                        ErrorCode::OutputRejected,
                        format!("{} rejected output: {}", guard, reason),
                    ));
                }
            }
        }

        if let Some(pack) = pack
            && pack.permissions.as_ref().map(|p| p.audit_trail).unwrap_or(false)
        {
            match &self.audit_sink {
                Some(sink) => sink(name, &pack.id, &input),
                None => warn!(tool = name, pack_id = %pack.id, "execute: audit requested but no sink installed"),
            }
        }

        outcome
    }

    /// Execute several calls concurrently; results in submission order
    pub async fn execute_all(&self, calls: &[(String, Value)], ctx: &ToolContext) -> Vec<ToolOutcome> {
        futures::future::join_all(
            calls
                .iter()
                .map(|(name, input)| self.execute(name, input.clone(), ctx)),
        )
        .await
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

fn check_permissions(permissions: &PackPermissions, input: &Value) -> Option<ToolErrorDetails> {
    if let Some(command) = input.get("command").and_then(|c| c.as_str()) {
        for denied in &permissions.denied_commands {
            if command.contains(denied.as_str()) {
                return Some(
                    ToolErrorDetails::new(
                        ErrorCode::PermissionDenied,
                        format!("command contains denied token '{}'", denied),
                    )
                    .with_hint("use an allowed command"),
                );
            }
        }
    }

    if !permissions.allowed_roots.is_empty()
        && let Some(path) = input.get("path").and_then(|p| p.as_str())
        && !permissions.allowed_roots.iter().any(|root| path.starts_with(root.as_str()))
    {
        return Some(
            ToolErrorDetails::new(ErrorCode::PathDenied, format!("'{}' is outside the allowed roots", path))
                .with_hint(format!("stay under: {}", permissions.allowed_roots.join(", "))),
        );
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::guard::GuardDecision;
    use crate::tools::schema::SchemaNode;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "Echo the path back"
        }

        fn schema(&self) -> SchemaNode {
            SchemaNode::object(vec![("path", SchemaNode::string("A path"))], &["path"])
        }

        fn read_only(&self) -> bool {
            true
        }

        fn capability(&self) -> ToolCapability {
            ToolCapability::Filesystem
        }

        async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolOutcome {
            ToolOutcome::success(input["path"].as_str().unwrap_or_default())
        }
    }

    fn echo_pack(id: &str, ns: &str, policy: ConflictPolicy, priority: i32) -> ToolPack {
        ToolPack::new(id, ns)
            .with_policy(policy)
            .with_priority(priority)
            .with_tool(Arc::new(EchoTool { name: "read_file" }))
    }

    fn test_ctx() -> (tempfile::TempDir, ToolContext) {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "sess", "run");
        (temp, ctx)
    }

    #[test]
    fn test_duplicate_pack_rejected() {
        let mut manager = ToolManager::new();
        manager.register(echo_pack("p1", "a", ConflictPolicy::Error, 0)).unwrap();
        let err = manager.register(echo_pack("p1", "b", ConflictPolicy::Error, 0));
        assert!(matches!(err, Err(RegistryError::DuplicatePack { .. })));
    }

    #[test]
    fn test_disabled_pack_silently_skipped() {
        let mut manager = ToolManager::new();
        let pack = echo_pack("p1", "a", ConflictPolicy::Error, 0).with_enabled(|| false);
        manager.register(pack).unwrap();
        assert!(!manager.has_tool("read_file"));
        assert!(!manager.has_tool("a.read_file"));
    }

    #[test]
    fn test_conflict_policy_error_raises() {
        let mut manager = ToolManager::new();
        manager.register(echo_pack("p1", "a", ConflictPolicy::Error, 0)).unwrap();
        let err = manager.register(echo_pack("p2", "b", ConflictPolicy::Error, 0));
        assert!(matches!(err, Err(RegistryError::NameConflict { .. })));
    }

    #[test]
    fn test_conflict_policy_namespace_prefix() {
        let mut manager = ToolManager::new();
        manager
            .register(echo_pack("p1", "a", ConflictPolicy::NamespacePrefix, 0))
            .unwrap();
        manager
            .register(echo_pack("p2", "b", ConflictPolicy::NamespacePrefix, 0))
            .unwrap();

        assert!(manager.has_tool("a.read_file"));
        assert!(manager.has_tool("b.read_file"));
        assert!(!manager.has_tool("read_file"));
    }

    #[test]
    fn test_withdrawn_short_name_stays_qualified_only() {
        let mut manager = ToolManager::new();
        for (id, ns) in [("p1", "a"), ("p2", "b"), ("p3", "c")] {
            manager
                .register(echo_pack(id, ns, ConflictPolicy::NamespacePrefix, 0))
                .unwrap();
        }

        // The third pack does not quietly reclaim the contested short name
        assert!(!manager.has_tool("read_file"));
        assert!(manager.has_tool("c.read_file"));
    }

    #[test]
    fn test_conflict_policy_override_higher_priority_wins() {
        let mut manager = ToolManager::new();
        manager
            .register(echo_pack("pack-a", "a", ConflictPolicy::Override, 1))
            .unwrap();
        manager
            .register(echo_pack("pack-b", "b", ConflictPolicy::Override, 5))
            .unwrap();

        // B has the short name, A only its qualified form
        assert!(manager.has_tool("read_file"));
        assert!(manager.has_tool("a.read_file"));
        assert!(manager.has_tool("b.read_file"));
        let binding = manager.bindings.get("read_file").unwrap();
        assert_eq!(binding.pack_id, "pack-b");
    }

    #[test]
    fn test_conflict_policy_override_lower_priority_loses() {
        let mut manager = ToolManager::new();
        manager
            .register(echo_pack("pack-a", "a", ConflictPolicy::Override, 5))
            .unwrap();
        manager
            .register(echo_pack("pack-b", "b", ConflictPolicy::Override, 1))
            .unwrap();

        let binding = manager.bindings.get("read_file").unwrap();
        assert_eq!(binding.pack_id, "pack-a");
    }

    #[tokio::test]
    async fn test_missing_tool_is_error_result() {
        let manager = ToolManager::new();
        let (_temp, ctx) = test_ctx();
        let outcome = manager.execute("ghost", json!({}), &ctx).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_details.unwrap().code, ErrorCode::ToolNotFound);
    }

    #[tokio::test]
    async fn test_schema_violation_is_structured_error() {
        let mut manager = ToolManager::new();
        manager.register(echo_pack("p1", "a", ConflictPolicy::Error, 0)).unwrap();
        let (_temp, ctx) = test_ctx();

        let outcome = manager.execute("read_file", json!({}), &ctx).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_details.unwrap().code, ErrorCode::SchemaValidationFailed);
    }

    #[tokio::test]
    async fn test_denied_command_blocked() {
        let mut manager = ToolManager::new();
        let pack = echo_pack("p1", "a", ConflictPolicy::Error, 0).with_permissions(PackPermissions {
            denied_commands: vec!["rm -rf".to_string()],
            allowed_roots: vec![],
            audit_trail: false,
        });
        manager.register(pack).unwrap();
        let (_temp, ctx) = test_ctx();

        let outcome = manager
            .execute("read_file", json!({"path": "x", "command": "rm -rf /"}), &ctx)
            .await;
        assert_eq!(outcome.error_details.unwrap().code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_path_outside_allowed_roots_blocked() {
        let mut manager = ToolManager::new();
        let pack = echo_pack("p1", "a", ConflictPolicy::Error, 0).with_permissions(PackPermissions {
            denied_commands: vec![],
            allowed_roots: vec!["src/".to_string()],
            audit_trail: false,
        });
        manager.register(pack).unwrap();
        let (_temp, ctx) = test_ctx();

        let denied = manager.execute("read_file", json!({"path": "etc/passwd"}), &ctx).await;
        assert_eq!(denied.error_details.unwrap().code, ErrorCode::PathDenied);

        let allowed = manager.execute("read_file", json!({"path": "src/lib.rs"}), &ctx).await;
        assert!(allowed.success);
    }

    #[tokio::test]
    async fn test_guard_rejection_short_circuits() {
        struct NoEtc;
        impl ToolGuard for NoEtc {
            fn name(&self) -> &'static str {
                "no-etc"
            }
            fn validate_input(&self, _tool: &str, input: &Value, _ctx: &GuardContext) -> GuardDecision {
                if input["path"].as_str().unwrap_or("").starts_with("etc") {
                    GuardDecision::Reject {
                        reason: "etc is off limits".to_string(),
                    }
                } else {
                    GuardDecision::Pass
                }
            }
        }

        let mut manager = ToolManager::new();
        manager.register(echo_pack("p1", "a", ConflictPolicy::Error, 0)).unwrap();
        manager.add_guard(Box::new(NoEtc));
        let (_temp, ctx) = test_ctx();

        let outcome = manager.execute("read_file", json!({"path": "etc/hosts"}), &ctx).await;
        assert_eq!(outcome.error_details.unwrap().code, ErrorCode::InputRejected);
    }

    #[tokio::test]
    async fn test_output_sanitization_marks_outcome() {
        struct Shorten;
        impl ToolGuard for Shorten {
            fn name(&self) -> &'static str {
                "shorten"
            }
            fn validate_output(&self, _tool: &str, output: &Value, _ctx: &GuardContext) -> GuardDecision {
                GuardDecision::Sanitize {
                    value: Value::String(output.as_str().unwrap_or("").chars().take(3).collect()),
                }
            }
        }

        let mut manager = ToolManager::new();
        manager.register(echo_pack("p1", "a", ConflictPolicy::Error, 0)).unwrap();
        manager.add_guard(Box::new(Shorten));
        let (_temp, ctx) = test_ctx();

        let outcome = manager
            .execute("read_file", json!({"path": "abcdefgh"}), &ctx)
            .await;
        assert!(outcome.success);
        assert!(outcome.sanitized);
        assert_eq!(outcome.output, json!("abc"));
    }

    #[tokio::test]
    async fn test_audit_sink_called_for_audited_pack() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let mut manager = ToolManager::new();
        let pack = echo_pack("p1", "a", ConflictPolicy::Error, 0).with_permissions(PackPermissions {
            denied_commands: vec![],
            allowed_roots: vec![],
            audit_trail: true,
        });
        manager.register(pack).unwrap();
        manager.set_audit_sink(move |tool, pack_id, _input| {
            assert_eq!(tool, "read_file");
            assert_eq!(pack_id, "p1");
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        let (_temp, ctx) = test_ctx();

        manager.execute("read_file", json!({"path": "x"}), &ctx).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lifecycle_hooks_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut manager = ToolManager::new();
        for id in ["first", "second"] {
            let order_clone = Arc::clone(&order);
            let pack = ToolPack::new(id, id)
                .with_tool(Arc::new(EchoTool { name: "read_file" }))
                .with_policy(ConflictPolicy::NamespacePrefix)
                .on_initialize(move || order_clone.lock().unwrap().push(id));
            manager.register(pack).unwrap();
        }

        manager.initialize_all();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_list_is_sorted_and_filtered() {
        let mut manager = ToolManager::new();
        manager
            .register(echo_pack("p1", "zeta", ConflictPolicy::NamespacePrefix, 0))
            .unwrap();
        manager
            .register(echo_pack("p2", "alpha", ConflictPolicy::NamespacePrefix, 0))
            .unwrap();

        let all = manager.list(&ToolFilter::default());
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);

        let alpha_only = manager.list(&ToolFilter {
            namespace: Some("alpha".to_string()),
            ..Default::default()
        });
        assert_eq!(alpha_only, vec!["alpha.read_file".to_string()]);

        let writable = manager.list(&ToolFilter {
            read_only: Some(false),
            ..Default::default()
        });
        assert!(writable.is_empty());
    }

    #[tokio::test]
    async fn test_execute_all_preserves_submission_order() {
        let mut manager = ToolManager::new();
        manager.register(echo_pack("p1", "a", ConflictPolicy::Error, 0)).unwrap();
        let (_temp, ctx) = test_ctx();

        let calls = vec![
            ("read_file".to_string(), json!({"path": "one"})),
            ("read_file".to_string(), json!({"path": "two"})),
            ("read_file".to_string(), json!({"path": "three"})),
        ];
        let outcomes = manager.execute_all(&calls, &ctx).await;
        let rendered: Vec<String> = outcomes.iter().map(|o| o.render()).collect();
        assert_eq!(rendered, vec!["one", "two", "three"]);
    }
}
