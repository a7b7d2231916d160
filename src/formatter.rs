//! Terraform code formatter: turns recovered code strings into readable HCL.
//!
//! The model frequently returns Terraform snippets mangled by transport:
//! JSON-escaped (`\n` as two characters), or collapsed onto a single line
//! with all structure intact but no line breaks. The formatter repairs both
//! with a fixed pass order:
//!
//! 1. Reverse JSON escaping when the string carries literal `\n` sequences
//!    and no real newline.
//! 2. Reflow single-line code past a length threshold: break after opening
//!    braces, around closing braces, and before block keywords and known
//!    block-scoped attributes.
//! 3. Re-indent with a brace-depth state machine, suspending inside
//!    heredoc blocks so their content stays byte-for-byte.
//! 4. Collapse runs of three or more blank lines to two.
//!
//! The reflow step is a heuristic, not an HCL parser: it may produce
//! imperfect line breaks on exotic input, but it never fails and its output
//! is always at least as readable as its input.
//!
//! `format` is pure, deterministic, and idempotent: formatting already
//! formatted code changes nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use proposal_pipeline::TerraformFormatter;
//!
//! let formatter = TerraformFormatter::new();
//! let one_liner = r#"resource "google_storage_bucket" "b" { location = "EU" }"#;
//! let formatted = formatter.format(one_liner);
//! assert!(formatted.contains("\n  location"));
//! ```

use crate::constants::{
    BLOCK_ATTRIBUTES, BLOCK_KEYWORDS, DEFAULT_INDENT_UNIT, DEFAULT_MAX_BLANK_LINES,
    DEFAULT_MIN_REFLOW_LEN,
};
use regex::Regex;
use tracing::debug;

// =============================================================================
// FORMATTER CONFIGURATION
// =============================================================================

/// Configuration for the Terraform formatter.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// String emitted once per indent level.
    pub indent_unit: String,
    /// Minimum length a newline-free string must reach before the
    /// single-line reflow heuristic runs.
    pub min_reflow_len: usize,
    /// Maximum number of consecutive blank lines kept in the output.
    pub max_blank_lines: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            indent_unit: DEFAULT_INDENT_UNIT.to_string(),
            min_reflow_len: DEFAULT_MIN_REFLOW_LEN,
            max_blank_lines: DEFAULT_MAX_BLANK_LINES,
        }
    }
}

impl FormatterConfig {
    /// Replace the indentation unit.
    pub fn with_indent_unit(mut self, unit: impl Into<String>) -> Self {
        self.indent_unit = unit.into();
        self
    }

    /// Replace the reflow length threshold.
    pub fn with_min_reflow_len(mut self, len: usize) -> Self {
        self.min_reflow_len = len;
        self
    }

    /// Replace the blank line cap.
    pub fn with_max_blank_lines(mut self, max: usize) -> Self {
        self.max_blank_lines = max;
        self
    }
}

// =============================================================================
// REFLOW PATTERNS
// =============================================================================

/// Compiled regex patterns for the reflow and heredoc heuristics.
#[derive(Debug, Clone)]
struct ReflowPatterns {
    /// Block keyword appearing mid-line, followed by a label or body.
    block_keyword: Regex,
    /// Block-scoped attribute appearing mid-line.
    block_attribute: Regex,
    /// Heredoc opener at end of line, capturing the marker token.
    heredoc_open: Regex,
}

impl Default for ReflowPatterns {
    fn default() -> Self {
        let keywords = BLOCK_KEYWORDS.join("|");
        let attributes = BLOCK_ATTRIBUTES.join("|");
        Self {
            block_keyword: Regex::new(&format!(r#"(\S)[ \t]+({keywords})\s+("|\{{)"#))
                .expect("Invalid regex"),
            block_attribute: Regex::new(&format!(r"(\S)[ \t]+({attributes})\s*(=|\{{)"))
                .expect("Invalid regex"),
            heredoc_open: Regex::new(r"<<-?([A-Za-z_][A-Za-z0-9_]*)\s*$").expect("Invalid regex"),
        }
    }
}

// =============================================================================
// TERRAFORM FORMATTER
// =============================================================================

/// Formats Terraform/HCL code strings recovered from AI responses.
#[derive(Debug, Clone, Default)]
pub struct TerraformFormatter {
    config: FormatterConfig,
    patterns: ReflowPatterns,
}

impl TerraformFormatter {
    /// Create a formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a formatter from a custom configuration.
    pub fn from_config(config: FormatterConfig) -> Self {
        Self {
            config,
            patterns: ReflowPatterns::default(),
        }
    }

    /// Format one code string.
    ///
    /// Total over all inputs: whatever the string contains, the result is
    /// a displayable string, and formatting it again is a no-op.
    pub fn format(&self, code: &str) -> String {
        let code = self.de_escape(code);
        let code = if !code.contains('\n') && code.len() >= self.config.min_reflow_len {
            debug!(len = code.len(), "reflowing single-line code");
            self.reflow(&code)
        } else {
            code
        };
        let code = self.reindent(&code);
        self.collapse_blank_lines(&code)
    }

    /// Reverse JSON escaping on strings that were serialized but never
    /// decoded: literal `\n` sequences present, real newlines absent.
    fn de_escape(&self, code: &str) -> String {
        if code.contains("\\n") && !code.contains('\n') {
            code.replace("\\n", "\n")
                .replace("\\t", "\t")
                .replace("\\\"", "\"")
        } else {
            code.to_string()
        }
    }

    /// Insert line breaks into a single-line snippet.
    ///
    /// The brace scan is string-aware: braces inside quoted values never
    /// trigger a break. The keyword and attribute passes are plain regex
    /// and intentionally best-effort.
    fn reflow(&self, code: &str) -> String {
        let mut out = String::with_capacity(code.len() + 64);
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in code.char_indices() {
            if in_string {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => {
                    in_string = true;
                    out.push(c);
                }
                '{' => {
                    out.push('{');
                    out.push('\n');
                }
                '}' => {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push('}');
                    // Keep separators attached (`},`), break otherwise.
                    let rest = code[i + c.len_utf8()..].trim_start();
                    if !rest.is_empty() && !rest.starts_with(',') {
                        out.push('\n');
                    }
                }
                _ => out.push(c),
            }
        }

        let out = self
            .patterns
            .block_keyword
            .replace_all(&out, "$1\n$2 $3")
            .to_string();
        self.patterns
            .block_attribute
            .replace_all(&out, "$1\n$2 $3")
            .to_string()
    }

    /// Re-indent line by line from brace depth.
    ///
    /// Heredoc interiors are emitted untouched, including their closing
    /// marker line, and contribute nothing to the depth counter.
    fn reindent(&self, code: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut level: usize = 0;
        let mut heredoc: Option<String> = None;

        for line in code.lines() {
            if let Some(marker) = &heredoc {
                let closing = line.trim() == marker;
                out.push(line.to_string());
                if closing {
                    heredoc = None;
                }
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                out.push(String::new());
                continue;
            }

            let delta = delimiter_delta(trimmed);
            let line_level = if starts_with_closer(trimmed) {
                level.saturating_sub(1)
            } else {
                level
            };
            out.push(format!(
                "{}{}",
                self.config.indent_unit.repeat(line_level),
                trimmed
            ));
            level = usize::try_from((level as i64) + delta).unwrap_or(0);

            if let Some(caps) = self.patterns.heredoc_open.captures(trimmed) {
                heredoc = Some(caps[1].to_string());
            }
        }

        out.join("\n")
    }

    /// Cap consecutive blank lines, leaving heredoc interiors alone.
    fn collapse_blank_lines(&self, code: &str) -> String {
        let mut out: Vec<&str> = Vec::new();
        let mut blank_run = 0usize;
        let mut heredoc: Option<String> = None;

        for line in code.lines() {
            if let Some(marker) = &heredoc {
                let closing = line.trim() == marker;
                out.push(line);
                if closing {
                    heredoc = None;
                }
                continue;
            }

            if line.trim().is_empty() {
                blank_run += 1;
                if blank_run <= self.config.max_blank_lines {
                    out.push(line);
                }
                continue;
            }
            blank_run = 0;
            out.push(line);

            if let Some(caps) = self.patterns.heredoc_open.captures(line.trim()) {
                heredoc = Some(caps[1].to_string());
            }
        }

        out.join("\n")
    }
}

/// Net brace/bracket/paren depth change of one line, ignoring delimiters
/// inside quoted strings and everything after a `#` comment.
fn delimiter_delta(line: &str) -> i64 {
    let mut delta = 0i64;
    let mut in_string = false;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => break,
            '{' | '[' | '(' if !in_string => delta += 1,
            '}' | ']' | ')' if !in_string => delta -= 1,
            _ => {}
        }
    }
    delta
}

fn starts_with_closer(line: &str) -> bool {
    matches!(line.chars().next(), Some('}' | ']' | ')'))
}

// =============================================================================
// TESTS
// =============================================================================
