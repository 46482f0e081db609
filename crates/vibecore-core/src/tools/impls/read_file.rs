//! `read_file`: cat -n formatted file reads, confined by [`PathValidator`].
//!
//! Grounded on `original_source/src/vibecore/tools/file/tools.py::read` and
//! `file/executor.py::read_file`: 1-based `offset`, default `limit` of 2000
//! lines, per-line truncation at 2000 characters, and the distinct
//! "file does not exist" / "beyond end of file" / "empty file" error
//! messages the prototype returns as plain strings rather than raised
//! exceptions.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::super::core::{Tool, ToolContext, ToolError, ToolSpec};
use super::super::path_validator::PathValidationError;

const DEFAULT_LIMIT: usize = 2000;
const MAX_LINE_LENGTH: usize = 2000;

pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
pub struct ReadFileInput {
    pub file_path: String,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[async_trait]
impl Tool for ReadFileTool {
    type Input = ReadFileInput;
    type Output = String;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "read_file",
            description: "Read a file from the local filesystem and return its contents in cat -n format",
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "offset": {"type": "integer", "description": "1-based line number to start from"},
                    "limit": {"type": "integer", "description": "maximum number of lines to read"},
                },
                "required": ["file_path"],
            }),
        }
    }

    async fn execute(&self, ctx: &mut ToolContext, input: Self::Input) -> Result<Self::Output, ToolError> {
        if input.offset.is_some_and(|o| o < 1) {
            return Ok("Error: Offset must be 1 or greater (line numbers start at 1)".to_string());
        }
        if input.limit.is_some_and(|l| l < 1) {
            return Ok("Error: Limit must be 1 or greater".to_string());
        }

        let resolved = match ctx.path_validator.validate_path(&input.file_path) {
            Ok(p) => p,
            Err(PathValidationError::Unresolvable(_, _)) => {
                return Ok(format!("Error: File does not exist: {}", input.file_path));
            }
            Err(e) => return Err(ToolError::from(e)),
        };

        if !resolved.is_file() {
            return Ok(format!("Error: Path is not a file: {}", input.file_path));
        }

        if resolved.extension().is_some_and(|e| e == "ipynb") {
            return Ok(
                "Error: For Jupyter notebooks (.ipynb files), please use the NotebookRead tool instead"
                    .to_string(),
            );
        }

        let offset = input.offset.unwrap_or(1);
        let limit = input.limit.unwrap_or(DEFAULT_LIMIT);

        let contents = match std::fs::read_to_string(&resolved) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(format!("Error: Permission denied reading file: {}", input.file_path));
            }
            Err(e) => return Ok(format!("Error reading file: {e}")),
        };

        let all_lines: Vec<&str> = contents.lines().collect();
        if offset - 1 >= all_lines.len() && !all_lines.is_empty() {
            return Ok(format!("Error: Offset {offset} is beyond the end of file"));
        }

        let selected: Vec<String> = all_lines
            .iter()
            .skip(offset - 1)
            .take(limit)
            .enumerate()
            .map(|(i, line)| format_line_with_number(offset + i, line))
            .collect();

        if selected.is_empty() {
            if offset == 1 {
                return Ok("<system-reminder>Warning: The file exists but has empty contents</system-reminder>"
                    .to_string());
            }
            return Ok(format!("Error: No content found starting from line {offset}"));
        }

        Ok(selected.join("\n"))
    }

    fn render(&self, output: &Self::Output) -> String {
        output.clone()
    }
}

fn format_line_with_number(line_num: usize, line: &str) -> String {
    let truncated = if line.len() > MAX_LINE_LENGTH {
        format!("{}... (truncated)", &line[..MAX_LINE_LENGTH])
    } else {
        line.to_string()
    };
    format!("{line_num:>6}\t{truncated}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc::unbounded_channel;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::agent::sub_agent::SubAgentSupervisor;
    use crate::tools::path_validator::PathValidator;
    use crate::types::AllowedDirectory;

    fn ctx_for(dir: &std::path::Path) -> ToolContext {
        let validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(dir).unwrap()]));
        let (tx, _rx) = unbounded_channel();
        ToolContext {
            path_validator: validator,
            supervisor: Arc::new(SubAgentSupervisor::new()),
            sink: tx,
            cancel: CancellationToken::new(),
            call_id: "call_test".to_string(),
            parent_call_id: None,
        }
    }

    #[tokio::test]
    async fn reads_a_small_file_in_cat_n_format() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello\nworld\n").unwrap();
        let mut ctx = ctx_for(dir.path());
        let out = ReadFileTool
            .execute(&mut ctx, ReadFileInput { file_path: file.display().to_string(), offset: None, limit: None })
            .await
            .unwrap();
        assert!(out.contains("1\thello"));
        assert!(out.contains("2\tworld"));
    }

    #[tokio::test]
    async fn reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_for(dir.path());
        let missing = dir.path().join("missing.txt");
        let out = ReadFileTool
            .execute(
                &mut ctx,
                ReadFileInput { file_path: missing.display().to_string(), offset: None, limit: None },
            )
            .await
            .unwrap();
        assert!(out.starts_with("Error: File does not exist"));
    }

    #[tokio::test]
    async fn reports_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.txt");
        std::fs::write(&file, "").unwrap();
        let mut ctx = ctx_for(dir.path());
        let out = ReadFileTool
            .execute(&mut ctx, ReadFileInput { file_path: file.display().to_string(), offset: None, limit: None })
            .await
            .unwrap();
        assert!(out.contains("empty contents"));
    }

    #[tokio::test]
    async fn respects_offset_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a\nb\nc\nd\n").unwrap();
        let mut ctx = ctx_for(dir.path());
        let out = ReadFileTool
            .execute(
                &mut ctx,
                ReadFileInput { file_path: file.display().to_string(), offset: Some(2), limit: Some(1) },
            )
            .await
            .unwrap();
        assert_eq!(out, format_line_with_number(2, "b"));
    }
}
