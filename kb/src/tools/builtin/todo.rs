//! Todo tools - lightweight progress tracking for multi-step tasks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::tools::error::{ErrorCode, ToolErrorDetails};
use crate::tools::schema::SchemaNode;
use crate::tools::{Tool, ToolCapability, ToolContext, ToolOutcome};

/// One todo item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u32,
    pub text: String,
    pub done: bool,
}

/// In-memory todo lists for one run
#[derive(Debug, Default)]
pub struct TodoStore {
    lists: HashMap<String, Vec<TodoItem>>,
    next_id: u32,
}

impl TodoStore {
    pub fn create(&mut self, list: &str, items: Vec<String>) -> usize {
        let entries = self.lists.entry(list.to_string()).or_default();
        for text in items {
            self.next_id += 1;
            entries.push(TodoItem {
                id: self.next_id,
                text,
                done: false,
            });
        }
        entries.len()
    }

    pub fn set_done(&mut self, list: &str, item_id: u32, done: bool) -> Result<(), ToolErrorDetails> {
        let Some(entries) = self.lists.get_mut(list) else {
            return Err(ToolErrorDetails::new(
                ErrorCode::TodoListNotFound,
                format!("No todo list named '{}'", list),
            )
            .with_hint("create the list with todo_create first"));
        };
        match entries.iter_mut().find(|i| i.id == item_id) {
            Some(item) => {
                item.done = done;
                Ok(())
            }
            None => Err(ToolErrorDetails::new(
                ErrorCode::TodoItemNotFound,
                format!("No item {} in list '{}'", item_id, list),
            )
            .with_hint("list the items with todo_list to see valid ids")),
        }
    }

    pub fn render(&self, list: &str) -> Result<String, ToolErrorDetails> {
        let Some(entries) = self.lists.get(list) else {
            return Err(ToolErrorDetails::new(
                ErrorCode::TodoListNotFound,
                format!("No todo list named '{}'", list),
            )
            .with_hint("create the list with todo_create first"));
        };
        if entries.is_empty() {
            return Ok(format!("{}: (empty)", list));
        }
        Ok(entries
            .iter()
            .map(|i| format!("[{}] #{} {}", if i.done { "x" } else { " " }, i.id, i.text))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Create a todo list (or append items to one)
pub struct TodoCreateTool;

#[async_trait]
impl Tool for TodoCreateTool {
    fn name(&self) -> &'static str {
        "todo_create"
    }

    fn description(&self) -> &'static str {
        "Create a todo list or append items to an existing one."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("list", SchemaNode::string("List name")),
                ("items", SchemaNode::array(SchemaNode::string("Item text"))),
            ],
            &["list", "items"],
        )
    }

    fn read_only(&self) -> bool {
        false
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Organization
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(list) = input["list"].as_str() else {
            return ToolOutcome::execution_error("list is required");
        };
        let items: Vec<String> = input["items"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default();

        let mut store = ctx.todos.lock().await;
        let total = store.create(list, items);
        ToolOutcome::success(format!("List '{}' now has {} item(s)", list, total))
    }
}

/// Mark a todo item done or not done
pub struct TodoUpdateTool;

#[async_trait]
impl Tool for TodoUpdateTool {
    fn name(&self) -> &'static str {
        "todo_update"
    }

    fn description(&self) -> &'static str {
        "Mark a todo item done (or back to open)."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(
            vec![
                ("list", SchemaNode::string("List name")),
                ("item_id", SchemaNode::integer_min("Item id", 1)),
                ("done", SchemaNode::boolean("Completion state (default: true)")),
            ],
            &["list", "item_id"],
        )
    }

    fn read_only(&self) -> bool {
        false
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Organization
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let (Some(list), Some(item_id)) = (input["list"].as_str(), input["item_id"].as_u64()) else {
            return ToolOutcome::execution_error("list and item_id are required");
        };
        let done = input["done"].as_bool().unwrap_or(true);

        let mut store = ctx.todos.lock().await;
        match store.set_done(list, item_id as u32, done) {
            Ok(()) => ToolOutcome::success(format!("Item {} marked {}", item_id, if done { "done" } else { "open" })),
            Err(details) => ToolOutcome::failure(details),
        }
    }
}

/// Show a todo list
pub struct TodoListTool;

#[async_trait]
impl Tool for TodoListTool {
    fn name(&self) -> &'static str {
        "todo_list"
    }

    fn description(&self) -> &'static str {
        "Show a todo list's items and their state."
    }

    fn schema(&self) -> SchemaNode {
        SchemaNode::object(vec![("list", SchemaNode::string("List name"))], &["list"])
    }

    fn read_only(&self) -> bool {
        true
    }

    fn capability(&self) -> ToolCapability {
        ToolCapability::Organization
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(list) = input["list"].as_str() else {
            return ToolOutcome::execution_error("list is required");
        };

        let store = ctx.todos.lock().await;
        match store.render(list) {
            Ok(text) => ToolOutcome::success(text),
            Err(details) => ToolOutcome::failure(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn ctx() -> (tempfile::TempDir, ToolContext) {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "s", "r");
        (temp, ctx)
    }

    #[tokio::test]
    async fn test_create_update_list_flow() {
        let (_temp, ctx) = ctx();

        let created = TodoCreateTool
            .execute(json!({"list": "plan", "items": ["read code", "write fix"]}), &ctx)
            .await;
        assert!(created.success);
        assert!(created.render().contains("2 item(s)"));

        let updated = TodoUpdateTool
            .execute(json!({"list": "plan", "item_id": 1}), &ctx)
            .await;
        assert!(updated.success);

        let listed = TodoListTool.execute(json!({"list": "plan"}), &ctx).await;
        let text = listed.render();
        assert!(text.contains("[x] #1 read code"));
        assert!(text.contains("[ ] #2 write fix"));
    }

    #[tokio::test]
    async fn test_unknown_list_is_stable_code() {
        let (_temp, ctx) = ctx();
        let result = TodoUpdateTool
            .execute(json!({"list": "ghost", "item_id": 1}), &ctx)
            .await;
        let details = result.error_details.unwrap();
        assert_eq!(details.code, ErrorCode::TodoListNotFound);
        assert!(details.retryable);
    }

    #[tokio::test]
    async fn test_unknown_item_is_stable_code() {
        let (_temp, ctx) = ctx();
        TodoCreateTool
            .execute(json!({"list": "plan", "items": ["only"]}), &ctx)
            .await;
        let result = TodoUpdateTool
            .execute(json!({"list": "plan", "item_id": 99}), &ctx)
            .await;
        assert_eq!(result.error_details.unwrap().code, ErrorCode::TodoItemNotFound);
    }
}
