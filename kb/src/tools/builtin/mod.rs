//! Builtin tool pack
//!
//! The core tools the engine ships with. They register as one pack under
//! the `core` namespace; embedders add their own packs beside it.

use std::sync::Arc;

mod code_stats;
mod find_definition;
mod fs_list;
mod fs_read;
mod fs_write;
mod glob_search;
mod grep_search;
mod memory;
mod report;
mod shell_exec;
mod todo;

pub use code_stats::CodeStatsTool;
pub use find_definition::FindDefinitionTool;
pub use fs_list::FsListTool;
pub use fs_read::FsReadTool;
pub use fs_write::{FsDeleteTool, FsPatchTool, FsWriteTool};
pub use glob_search::GlobSearchTool;
pub use grep_search::GrepSearchTool;
pub use memory::{MemorySaveTool, MemorySearchTool};
pub use report::ReportTool;
pub use shell_exec::ShellExecTool;
pub use todo::{TodoCreateTool, TodoListTool, TodoStore, TodoUpdateTool};

use super::manager::{ConflictPolicy, ToolPack};

/// The standard pack of core tools
pub fn core_pack() -> ToolPack {
    ToolPack::new("core", "core")
        .with_policy(ConflictPolicy::Error)
        .with_tool(Arc::new(FsReadTool))
        .with_tool(Arc::new(FsListTool))
        .with_tool(Arc::new(FsWriteTool))
        .with_tool(Arc::new(FsPatchTool))
        .with_tool(Arc::new(FsDeleteTool))
        .with_tool(Arc::new(GlobSearchTool))
        .with_tool(Arc::new(GrepSearchTool))
        .with_tool(Arc::new(FindDefinitionTool))
        .with_tool(Arc::new(CodeStatsTool))
        .with_tool(Arc::new(ShellExecTool))
        .with_tool(Arc::new(TodoCreateTool))
        .with_tool(Arc::new(TodoUpdateTool))
        .with_tool(Arc::new(TodoListTool))
        .with_tool(Arc::new(MemorySaveTool))
        .with_tool(Arc::new(MemorySearchTool))
        .with_tool(Arc::new(ReportTool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::manager::ToolManager;

    #[test]
    fn test_core_pack_registers_cleanly() {
        let mut manager = ToolManager::new();
        manager.register(core_pack()).unwrap();

        for name in [
            "fs_read",
            "fs_list",
            "fs_write",
            "fs_patch",
            "fs_delete",
            "glob_search",
            "grep_search",
            "find_definition",
            "code_stats",
            "shell_exec",
            "todo_create",
            "todo_update",
            "todo_list",
            "memory_save",
            "memory_search",
            "report",
        ] {
            assert!(manager.has_tool(name), "missing tool: {}", name);
            assert!(manager.has_tool(&format!("core.{}", name)));
        }
    }
}
