//! Directory listing tool: sorted entries, directories suffixed with `/`.

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::{Tool, ToolResult};

#[derive(Debug, Default)]
pub struct ListDirectoryTool;

impl ListDirectoryTool {
    async fn list(path: &str) -> std::io::Result<Vec<String>> {
        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();
        Ok(entries)
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are shown with a trailing '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to list"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        match Self::list(path).await {
            Ok(entries) => Ok(ToolResult {
                data: Some(serde_json::json!({ "count": entries.len() })),
                ..ToolResult::ok(entries.join("\n"))
            }),
            Err(e) => Ok(ToolResult::failed(format!(
                "Failed to list directory '{path}': {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let tool = ListDirectoryTool;
        assert_eq!(tool.name(), "list_directory");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
    }

    #[tokio::test]
    async fn lists_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let result = ListDirectoryTool
            .execute(serde_json::json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "a.txt\nb.txt\nsrc/");
        assert_eq!(result.data.unwrap()["count"], 3);
    }

    #[tokio::test]
    async fn empty_directory_has_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let result = ListDirectoryTool
            .execute(serde_json::json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.is_empty());
    }

    #[tokio::test]
    async fn missing_directory_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = ListDirectoryTool
            .execute(serde_json::json!({ "path": missing.to_str().unwrap() }))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Failed to list directory"));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let result = ListDirectoryTool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
