//! Search tools: `Glob` for path patterns and `Grep` for regex matches inside files.

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use sdk::errors::EngineError;
use sdk::types::{param_str, param_str_list, param_str_opt, Parameters, ToolOutcome};
use serde_json::{json, Value};
use tokio::fs;
use tracing::{debug, info};

use super::{fail, Tool, ToolContext};

const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "node_modules/**",
    ".git/**",
    "dist/**",
    "build/**",
    "coverage/**",
    ".vscode/**",
    ".idea/**",
];

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &'static str {
        "Glob"
    }

    fn description(&self) -> &'static str {
        "Find files and directories matching a glob pattern inside the project. VCS, dependency and build directories are ignored by default."
    }

    fn parameters(&self) -> &'static str {
        r#"{"pattern": "glob such as \"src/**/*.rs\" (required)", "ignore": "extra glob patterns to exclude, merged with the defaults (optional)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match glob_paths(params, ctx).await {
            Ok(paths) => ToolOutcome::success(paths),
            Err(e) => fail(self.name(), e),
        }
    }
}

async fn glob_paths(params: &Parameters, ctx: &ToolContext<'_>) -> Result<Vec<String>, EngineError> {
    let pattern = param_str(params, "pattern")?;
    let resolved = ctx.guard().resolve(pattern)?;
    let relative = ctx.guard().relative_display(&resolved);

    let mut ignore = Vec::new();
    for raw in DEFAULT_IGNORE_PATTERNS
        .iter()
        .map(|s| s.to_string())
        .chain(param_str_list(params, "ignore")?)
    {
        let compiled = Pattern::new(&raw).map_err(|e| EngineError::InvalidParameter {
            name: "ignore".to_string(),
            reason: e.to_string(),
        })?;
        ignore.push((raw, compiled));
    }

    let root = ctx.guard().root().to_path_buf();
    let full = format!(
        "{}/{}",
        Pattern::escape(&root.to_string_lossy()),
        relative
    );
    info!("Glob search: {}", full);

    let guard = ctx.guard().clone();
    tokio::task::spawn_blocking(move || {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let entries = glob::glob_with(&full, options).map_err(|e| EngineError::InvalidParameter {
            name: "pattern".to_string(),
            reason: e.to_string(),
        })?;

        let mut matches: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|path| path.starts_with(guard.root()))
            .map(|path| guard.relative_display(&path))
            .filter(|rel| !is_ignored(rel, &ignore))
            .collect();
        matches.sort();
        matches.dedup();
        debug!("Glob matched {} paths", matches.len());
        Ok(matches)
    })
    .await
    .map_err(|e| EngineError::ToolError(format!("Glob task failed: {}", e)))?
}

fn is_ignored(rel: &str, ignore: &[(String, Pattern)]) -> bool {
    ignore.iter().any(|(raw, pattern)| {
        pattern.matches(rel)
            || raw
                .strip_suffix("/**")
                .is_some_and(|dir| rel == dir || rel.starts_with(&format!("{}/", dir)))
    })
}

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "Grep"
    }

    fn description(&self) -> &'static str {
        "Search file contents line by line with a regular expression. Returns every matching line with its full match and capture groups."
    }

    fn parameters(&self) -> &'static str {
        r#"{"regex": "pattern without delimiters (required)", "filePath": "single file relative to the project root", "paths": "array of files, used instead of filePath", "flags": "\"i\" for case-insensitive, \"g\" for every match on a line (optional)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match grep(params, ctx).await {
            Ok(result) => ToolOutcome::success(result),
            Err(e) => fail(self.name(), e),
        }
    }
}

struct GrepFlags {
    global: bool,
    regex: Regex,
}

fn compile(pattern: &str, flags: &str) -> Result<GrepFlags, EngineError> {
    let mut builder = RegexBuilder::new(pattern);
    let mut global = false;
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'g' => global = true,
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            other => {
                return Err(EngineError::InvalidParameter {
                    name: "flags".to_string(),
                    reason: format!("unsupported flag '{}'", other),
                })
            }
        }
    }
    let regex = builder.build().map_err(|e| EngineError::InvalidParameter {
        name: "regex".to_string(),
        reason: e.to_string(),
    })?;
    Ok(GrepFlags { global, regex })
}

async fn grep(params: &Parameters, ctx: &ToolContext<'_>) -> Result<Value, EngineError> {
    let pattern = param_str(params, "regex")?;
    let flags = compile(pattern, param_str_opt(params, "flags").unwrap_or(""))?;

    if let Some(file_path) = param_str_opt(params, "filePath") {
        return grep_file(file_path, &flags, ctx).await;
    }

    let paths = param_str_list(params, "paths")?;
    if paths.is_empty() {
        return Err(EngineError::MissingParameter("filePath".to_string()));
    }

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        match grep_file(&path, &flags, ctx).await {
            Ok(matches) => results.push(json!({"path": path, "matches": matches})),
            Err(e) => results.push(json!({"path": path, "error": e.to_string()})),
        }
    }
    Ok(Value::Array(results))
}

async fn grep_file(file_path: &str, flags: &GrepFlags, ctx: &ToolContext<'_>) -> Result<Value, EngineError> {
    let path = ctx.guard().resolve(file_path)?;
    info!("Grep {} in {}", flags.regex.as_str(), path.display());

    let content = fs::read_to_string(&path)
        .await
        .map_err(|e| EngineError::from_io(e, file_path))?;

    Ok(Value::Array(search_lines(&content, flags)))
}

fn search_lines(content: &str, flags: &GrepFlags) -> Vec<Value> {
    let mut results = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let mut line_matches = Vec::new();
        for caps in flags.regex.captures_iter(line) {
            let groups: Vec<Value> = caps
                .iter()
                .map(|m| m.map_or(Value::Null, |m| Value::String(m.as_str().to_string())))
                .collect();
            line_matches.push(Value::Array(groups));
            if !flags.global {
                break;
            }
        }

        if !line_matches.is_empty() {
            results.push(json!({
                "lineNumber": index + 1,
                "line": line,
                "matches": line_matches,
            }));
        }
    }
    results
}
