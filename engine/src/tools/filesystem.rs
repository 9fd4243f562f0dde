//! Filesystem tools
//!
//! `Read`, `Write`, `Edit`, `LS` and `Tree`. Every path is resolved through
//! `PathGuard` before any I/O, on every call.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{param_i64, param_i64_opt, param_str, param_str_list, param_str_opt, Parameters, ToolOutcome};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use super::{fail, Tool, ToolContext};

const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".vscode",
    ".idea",
    "dist",
    "build",
    "__pycache__",
];

pub struct ReadTool;

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &'static str {
        "Read"
    }

    fn description(&self) -> &'static str {
        "Read the entire content of a file."
    }

    fn parameters(&self) -> &'static str {
        r#"{"filePath": "path relative to the project root (required)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match read_file(params, ctx).await {
            Ok(content) => ToolOutcome::success(content),
            Err(e) => fail(self.name(), e),
        }
    }
}

async fn read_file(params: &Parameters, ctx: &ToolContext<'_>) -> Result<String, EngineError> {
    let file_path = param_str(params, "filePath")?;
    let path = ctx.guard().resolve(file_path)?;
    info!("Reading file: {}", path.display());

    let content = fs::read_to_string(&path)
        .await
        .map_err(|e| EngineError::from_io(e, file_path))?;

    debug!("Read {} bytes from {}", content.len(), path.display());
    Ok(content)
}

pub struct WriteTool;

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &'static str {
        "Write"
    }

    fn description(&self) -> &'static str {
        "Write content to a file. Creates the file and any missing parent directories; overwrites an existing file."
    }

    fn parameters(&self) -> &'static str {
        r#"{"filePath": "path relative to the project root (required)", "content": "full file content (required)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match write_file(params, ctx).await {
            Ok(message) => ToolOutcome::success(message),
            Err(e) => fail(self.name(), e),
        }
    }
}

async fn write_file(params: &Parameters, ctx: &ToolContext<'_>) -> Result<String, EngineError> {
    let file_path = param_str(params, "filePath")?;
    let content = param_str(params, "content")?;
    let path = ctx.guard().resolve(file_path)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| EngineError::from_io(e, file_path))?;
    }

    info!("Writing {} bytes to: {}", content.len(), path.display());
    fs::write(&path, content)
        .await
        .map_err(|e| EngineError::from_io(e, file_path))?;

    Ok(format!("File '{}' written successfully.", file_path))
}

pub struct EditTool;

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &'static str {
        "Edit"
    }

    fn description(&self) -> &'static str {
        "Replace an inclusive, 1-based range of lines in an existing file. Use endLine = startLine - 1 to insert before startLine without removing anything, and an empty newContent to delete lines."
    }

    fn parameters(&self) -> &'static str {
        r#"{"filePath": "path relative to the project root (required)", "startLine": "first line to replace (required)", "endLine": "last line to replace (required)", "newContent": "replacement text (required, may be empty)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match edit_file(params, ctx).await {
            Ok(message) => ToolOutcome::success(message),
            Err(e) => fail(self.name(), e),
        }
    }
}

async fn edit_file(params: &Parameters, ctx: &ToolContext<'_>) -> Result<String, EngineError> {
    let file_path = param_str(params, "filePath")?;
    let start = param_i64(params, "startLine")?;
    let end = param_i64(params, "endLine")?;
    let new_content = param_str(params, "newContent")?;
    let path = ctx.guard().resolve(file_path)?;

    let original = fs::read_to_string(&path)
        .await
        .map_err(|e| EngineError::from_io(e, file_path))?;

    let (updated, removed, inserted) = splice_lines(&original, start, end, new_content)?;

    info!(
        "Editing {}: lines {}-{} ({} removed, {} inserted)",
        path.display(),
        start,
        end,
        removed,
        inserted
    );
    fs::write(&path, updated)
        .await
        .map_err(|e| EngineError::from_io(e, file_path))?;

    Ok(format!(
        "File '{}' edited: {} line(s) removed, {} line(s) inserted at line {}.",
        file_path, removed, inserted, start
    ))
}

/// Replace lines `start..=end` (1-based) of `original` with `replacement`
fn splice_lines(
    original: &str,
    start: i64,
    end: i64,
    replacement: &str,
) -> Result<(String, usize, usize), EngineError> {
    let trailing_newline = original.is_empty() || original.ends_with('\n');
    let body = original.strip_suffix('\n').unwrap_or(original);
    let mut lines: Vec<&str> = if original.is_empty() {
        Vec::new()
    } else {
        body.split('\n').collect()
    };
    let total = lines.len() as i64;

    if start < 1 || start > total + 1 {
        return Err(EngineError::InvalidParameter {
            name: "startLine".to_string(),
            reason: format!("must be between 1 and {}", total + 1),
        });
    }
    if end < start - 1 || end > total {
        return Err(EngineError::InvalidParameter {
            name: "endLine".to_string(),
            reason: format!("must be between {} and {}", start - 1, total),
        });
    }

    let new_lines: Vec<&str> = if replacement.is_empty() {
        Vec::new()
    } else {
        replacement
            .strip_suffix('\n')
            .unwrap_or(replacement)
            .split('\n')
            .collect()
    };
    let inserted = new_lines.len();
    let removed = lines
        .splice((start - 1) as usize..end as usize, new_lines)
        .count();

    let mut updated = lines.join("\n");
    if trailing_newline && !updated.is_empty() {
        updated.push('\n');
    }
    Ok((updated, removed, inserted))
}

pub struct LsTool;

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &'static str {
        "LS"
    }

    fn description(&self) -> &'static str {
        "List the entries of a single directory (not recursive)."
    }

    fn parameters(&self) -> &'static str {
        r#"{"dirPath": "directory relative to the project root (optional, default \".\")"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match list_dir(params, ctx).await {
            Ok(entries) => ToolOutcome::success(entries),
            Err(e) => fail(self.name(), e),
        }
    }
}

async fn list_dir(
    params: &Parameters,
    ctx: &ToolContext<'_>,
) -> Result<serde_json::Value, EngineError> {
    let dir_path = param_str_opt(params, "dirPath").unwrap_or(".");
    let path = ctx.guard().resolve(dir_path)?;
    info!("Listing directory: {}", path.display());

    let mut entries = fs::read_dir(&path)
        .await
        .map_err(|e| EngineError::from_io(e, dir_path))?;

    let mut items = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| EngineError::from_io(e, dir_path))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        let kind = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => "directory",
            Ok(ft) if ft.is_file() => "file",
            _ => "other",
        };
        items.push((name, kind));
    }
    items.sort();

    Ok(items
        .into_iter()
        .map(|(name, kind)| json!({"name": name, "type": kind}))
        .collect())
}

pub struct TreeTool;

#[async_trait]
impl Tool for TreeTool {
    fn name(&self) -> &'static str {
        "Tree"
    }

    fn description(&self) -> &'static str {
        "Show a directory as a tree, directories first, with control over depth and ignored directory names."
    }

    fn parameters(&self) -> &'static str {
        r#"{"dirPath": "directory relative to the project root (optional, default \".\")", "maxDepth": "levels to descend, 1-10 (optional, default 3)", "ignoreDirs": "directory names to skip, merged with node_modules, .git, .vscode, .idea, dist, build, __pycache__ (optional)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match tree(params, ctx).await {
            Ok(text) => ToolOutcome::success(text),
            Err(e) => fail(self.name(), e),
        }
    }
}

async fn tree(params: &Parameters, ctx: &ToolContext<'_>) -> Result<String, EngineError> {
    let dir_path = param_str_opt(params, "dirPath").unwrap_or(".").to_string();
    let settings = ctx.settings();
    let max_depth = param_i64_opt(params, "maxDepth")?.unwrap_or(settings.tree_default_depth as i64);
    if max_depth < 1 || max_depth > settings.tree_max_depth as i64 {
        return Err(EngineError::InvalidParameter {
            name: "maxDepth".to_string(),
            reason: format!("must be between 1 and {}", settings.tree_max_depth),
        });
    }

    let mut ignore: BTreeSet<String> = DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect();
    ignore.extend(param_str_list(params, "ignoreDirs")?);

    let path = ctx.guard().resolve(&dir_path)?;
    let meta = fs::metadata(&path)
        .await
        .map_err(|e| EngineError::from_io(e, &dir_path))?;
    if !meta.is_dir() {
        return Err(EngineError::NotADirectory(dir_path));
    }

    let header = if path == ctx.guard().root() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        format!("{}/ (project root, depth {})", name, max_depth)
    } else {
        format!("{}/ (depth {})", dir_path.trim_end_matches('/'), max_depth)
    };

    let depth = max_depth as usize;
    let lines = tokio::task::spawn_blocking(move || {
        let mut lines = vec![header];
        render_tree(&path, "", 0, depth, &ignore, &mut lines);
        lines
    })
    .await
    .map_err(|e| EngineError::ToolError(format!("Tree task failed: {}", e)))?;

    Ok(lines.join("\n"))
}

/// Recursive descent bounded by `max_depth`
fn render_tree(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    ignore: &BTreeSet<String>,
    lines: &mut Vec<String>,
) {
    if depth >= max_depth {
        lines.push(format!("{}└── [Max depth reached]", prefix));
        return;
    }

    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            lines.push(format!("{}└── [Error reading directory: {}]", prefix, e));
            return;
        }
    };

    let mut entries: Vec<(bool, String)> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            (is_dir, entry.file_name().to_string_lossy().to_string())
        })
        .filter(|(is_dir, name)| !(*is_dir && ignore.contains(name)))
        .collect();
    // Directories first, then by name
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let count = entries.len();
    for (i, (is_dir, name)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        if is_dir {
            lines.push(format!("{}{}{}/", prefix, connector, name));
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_tree(&dir.join(&name), &child_prefix, depth + 1, max_depth, ignore, lines);
        } else {
            lines.push(format!("{}{}{}", prefix, connector, name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{call, registry};
    use sdk::types::ToolStatus;
    use serde_json::json;
    use std::fs;

    #[tokio::test]
    async fn test_read_existing_file() {
        let (temp, registry) = registry();
        fs::write(temp.path().join("a.txt"), "hello").unwrap();

        let outcome = registry.dispatch(&call("Read", json!({"filePath": "a.txt"}))).await;
        assert_eq!(outcome.status, ToolStatus::Success);
        assert_eq!(outcome.output, json!("hello"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Read", json!({"filePath": "missing.txt"})))
            .await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert_eq!(
            outcome.output,
            json!("Read error: File not found at 'missing.txt'")
        );
    }

    #[tokio::test]
    async fn test_read_directory() {
        let (temp, registry) = registry();
        fs::create_dir(temp.path().join("src")).unwrap();

        let outcome = registry.dispatch(&call("Read", json!({"filePath": "src"}))).await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome.output.as_str().unwrap().contains("is a directory"));
    }

    #[tokio::test]
    async fn test_read_requires_file_path() {
        let (_temp, registry) = registry();

        let outcome = registry.dispatch(&call("Read", json!({}))).await;
        assert_eq!(
            outcome.output,
            json!("Read error: \"filePath\" parameter is required")
        );
    }

    #[tokio::test]
    async fn test_read_outside_root() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Read", json!({"filePath": "../etc/passwd"})))
            .await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome
            .output
            .as_str()
            .unwrap()
            .starts_with("Read error: Path traversal detected"));
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_overwrites() {
        let (temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Write", json!({"filePath": "a/b/c.txt", "content": "one"})))
            .await;
        assert_eq!(
            outcome.output,
            json!("File 'a/b/c.txt' written successfully.")
        );

        registry
            .dispatch(&call("Write", json!({"filePath": "a/b/c.txt", "content": "two"})))
            .await;
        assert_eq!(fs::read_to_string(temp.path().join("a/b/c.txt")).unwrap(), "two");
    }

    #[tokio::test]
    async fn test_write_requires_content() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Write", json!({"filePath": "x.txt"})))
            .await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome.output.as_str().unwrap().contains("\"content\""));
    }

    #[tokio::test]
    async fn test_edit_replaces_range() {
        let (temp, registry) = registry();
        fs::write(temp.path().join("f.txt"), "one\ntwo\nthree\n").unwrap();

        let outcome = registry
            .dispatch(&call(
                "Edit",
                json!({"filePath": "f.txt", "startLine": 2, "endLine": 2, "newContent": "TWO\nTWO-B"}),
            ))
            .await;
        assert_eq!(outcome.status, ToolStatus::Success);
        assert_eq!(
            fs::read_to_string(temp.path().join("f.txt")).unwrap(),
            "one\nTWO\nTWO-B\nthree\n"
        );
    }

    #[test]
    fn test_splice_insert_and_delete() {
        let (out, removed, inserted) = super::splice_lines("a\nb\n", 3, 2, "c").unwrap();
        assert_eq!((out.as_str(), removed, inserted), ("a\nb\nc\n", 0, 1));

        let (out, removed, inserted) = super::splice_lines("a\nb\nc", 1, 2, "").unwrap();
        assert_eq!((out.as_str(), removed, inserted), ("c", 2, 0));

        assert!(super::splice_lines("a\n", 0, 0, "x").is_err());
        assert!(super::splice_lines("a\n", 1, 5, "x").is_err());
    }

    #[tokio::test]
    async fn test_ls_is_flat_and_sorted() {
        let (temp, registry) = registry();
        fs::write(temp.path().join("b.txt"), "").unwrap();
        fs::create_dir_all(temp.path().join("a/nested")).unwrap();

        let outcome = registry.dispatch(&call("LS", json!({}))).await;
        assert_eq!(
            outcome.output,
            json!([
                {"name": "a", "type": "directory"},
                {"name": "b.txt", "type": "file"}
            ])
        );
    }

    #[tokio::test]
    async fn test_ls_missing_directory() {
        let (_temp, registry) = registry();

        let outcome = registry.dispatch(&call("LS", json!({"dirPath": "nope"}))).await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome.output.as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_tree_orders_directories_first() {
        let (temp, registry) = registry();
        fs::write(temp.path().join("a.txt"), "").unwrap();
        fs::create_dir_all(temp.path().join("z_dir/inner")).unwrap();
        fs::write(temp.path().join("z_dir/file.rs"), "").unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();

        let outcome = registry.dispatch(&call("Tree", json!({"maxDepth": 2}))).await;
        assert_eq!(outcome.status, ToolStatus::Success);
        let text = outcome.output.as_str().unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].ends_with("/ (project root, depth 2)"));
        assert_eq!(lines[1], "├── z_dir/");
        assert_eq!(lines[2], "│   ├── inner/");
        assert_eq!(lines[3], "│   │   └── [Max depth reached]");
        assert_eq!(lines[4], "│   └── file.rs");
        assert_eq!(lines[5], "└── a.txt");
        assert!(!text.contains("node_modules"));
    }

    #[tokio::test]
    async fn test_tree_merges_ignore_dirs() {
        let (temp, registry) = registry();
        fs::create_dir_all(temp.path().join("target")).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();

        let outcome = registry
            .dispatch(&call("Tree", json!({"ignoreDirs": ["target"]})))
            .await;
        let text = outcome.output.as_str().unwrap();
        assert!(text.contains("src/"));
        assert!(!text.contains("target"));
        assert!(!text.contains(".git"));
    }

    #[tokio::test]
    async fn test_tree_rejects_depth_out_of_range() {
        let (_temp, registry) = registry();

        let outcome = registry.dispatch(&call("Tree", json!({"maxDepth": 11}))).await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome.output.as_str().unwrap().contains("maxDepth"));
    }

    #[tokio::test]
    async fn test_tree_on_file() {
        let (temp, registry) = registry();
        fs::write(temp.path().join("a.txt"), "").unwrap();

        let outcome = registry.dispatch(&call("Tree", json!({"dirPath": "a.txt"}))).await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome.output.as_str().unwrap().contains("is not a directory"));
    }
}
