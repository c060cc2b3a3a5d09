//! Whole-document template resolution for node inputs.
//!
//! A node's raw input is serialized to text in the interchange format, that
//! text is evaluated as a single template, and the result is parsed back.
//! Substitution is purely textual: a referenced string is inserted without
//! quotes or escaping, a number as a bare numeral. Whether the result is
//! well-formed depends on the quoting the surrounding document already
//! supplies, and existing workflows rely on exactly this behaviour.
//!
//! # Template Syntax
//!
//! - `{{.workflow_data.field}}`: caller-supplied initial data
//! - `{{.nodes.node_id.output}}`: full output of a completed node
//! - `{{.nodes.node_id.output.items[0].name}}`: nested fields and array indexes
//! - `{{.nodes.node_id.error}}`: always empty for completed nodes
//! - `{{- .path -}}`: trim surrounding whitespace
//! - `{{.}}`: the whole environment
//!
//! Referencing anything that does not exist is an error; nothing is ever
//! silently rendered as empty.

use std::fmt;

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ResolutionError;
use crate::format::Format;

/// Resolves template expressions in node inputs against an execution context.
#[derive(Debug, Clone, Copy)]
pub struct TemplateResolver {
    format: Format,
}

impl TemplateResolver {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Resolve every template expression in `inputs`.
    ///
    /// Serialize → evaluate as one template → parse back. The result needs no
    /// further resolution before dispatch.
    pub fn resolve(
        &self,
        inputs: &Value,
        context: &ExecutionContext,
    ) -> Result<Value, ResolutionError> {
        let source = self
            .format
            .to_text(inputs)
            .map_err(|message| ResolutionError::Serialize {
                format: self.format.name(),
                message,
            })?;

        let evaluated = self.render_text(&source, context)?;

        self.format
            .parse(&evaluated)
            .map_err(|message| ResolutionError::Reparse {
                format: self.format.name(),
                message,
                text: evaluated,
            })
    }

    /// Evaluate raw template text against the context, without the
    /// serialize/parse passes.
    pub fn render_text(
        &self,
        source: &str,
        context: &ExecutionContext,
    ) -> Result<String, ResolutionError> {
        let template = Template::parse(source)?;
        template.render(&context.template_environment())
    }
}

// ---------------------------------------------------------------------------
// Template parsing
// ---------------------------------------------------------------------------

/// A parsed template: literal text interleaved with actions.
#[derive(Debug)]
pub struct Template<'a> {
    pieces: Vec<Piece<'a>>,
}

#[derive(Debug)]
enum Piece<'a> {
    Text(&'a str),
    Action(Action),
}

/// A single `{{ ... }}` occurrence.
#[derive(Debug)]
struct Action {
    /// The trimmed inner expression, e.g. `.nodes.fetch.output.body`.
    expression: String,
    path: Vec<PathSegment>,
    trim_left: bool,
    trim_right: bool,
}

impl<'a> Template<'a> {
    /// Parse template source. Every action must be well-formed; the first
    /// malformed one is reported with its byte offset.
    pub fn parse(source: &'a str) -> Result<Self, ResolutionError> {
        let mut pieces = Vec::new();
        let mut pos = 0;

        while let Some(rel_start) = source[pos..].find("{{") {
            let start = pos + rel_start;
            pieces.push(Piece::Text(&source[pos..start]));

            let inner_start = start + 2;
            let Some(rel_end) = source[inner_start..].find("}}") else {
                return Err(ResolutionError::Syntax {
                    offset: start,
                    message: "unclosed action".into(),
                });
            };
            let inner_end = inner_start + rel_end;

            let mut inner = &source[inner_start..inner_end];
            let trim_left = has_left_trim_marker(inner);
            if trim_left {
                inner = &inner[1..];
            }
            let trim_right = has_right_trim_marker(inner);
            if trim_right {
                inner = &inner[..inner.len() - 1];
            }

            let expression = inner.trim();
            let path = parse_path(expression).map_err(|message| ResolutionError::Syntax {
                offset: start,
                message,
            })?;

            pieces.push(Piece::Action(Action {
                expression: expression.to_string(),
                path,
                trim_left,
                trim_right,
            }));
            pos = inner_end + 2;
        }
        pieces.push(Piece::Text(&source[pos..]));

        Ok(Self { pieces })
    }

    /// Evaluate against an environment value.
    pub fn render(&self, env: &Value) -> Result<String, ResolutionError> {
        let mut out = String::new();

        for (i, piece) in self.pieces.iter().enumerate() {
            match piece {
                Piece::Text(text) => {
                    let mut text = *text;
                    if i > 0 && matches!(&self.pieces[i - 1], Piece::Action(a) if a.trim_right) {
                        text = text.trim_start_matches(is_trim_space);
                    }
                    if matches!(self.pieces.get(i + 1), Some(Piece::Action(a)) if a.trim_left) {
                        text = text.trim_end_matches(is_trim_space);
                    }
                    out.push_str(text);
                }
                Piece::Action(action) => {
                    let value = lookup(env, &action.path).map_err(|reason| {
                        ResolutionError::Undefined {
                            expression: action.expression.clone(),
                            reason,
                        }
                    })?;
                    out.push_str(&render_value(value));
                }
            }
        }

        Ok(out)
    }
}

/// Trim markers only consume ASCII space, tab, CR and LF.
fn is_trim_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// `{{- ` trims preceding whitespace; the dash must be followed by whitespace.
fn has_left_trim_marker(inner: &str) -> bool {
    inner
        .strip_prefix('-')
        .and_then(|rest| rest.chars().next())
        .is_some_and(is_trim_space)
}

/// ` -}}` trims following whitespace; the dash must be preceded by whitespace.
fn has_right_trim_marker(inner: &str) -> bool {
    inner
        .strip_suffix('-')
        .and_then(|rest| rest.chars().next_back())
        .is_some_and(is_trim_space)
}

// ---------------------------------------------------------------------------
// Path parsing and navigation
// ---------------------------------------------------------------------------

/// A segment of a field path, with any trailing array indexes.
#[derive(Debug, Clone, PartialEq)]
struct PathSegment {
    name: String,
    indexes: Vec<usize>,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for i in &self.indexes {
            write!(f, "[{}]", i)?;
        }
        Ok(())
    }
}

/// Parse `.a.b[0].c` into segments. `.` alone is the empty path.
fn parse_path(expression: &str) -> Result<Vec<PathSegment>, String> {
    if expression.is_empty() {
        return Err("empty action".into());
    }
    if expression.chars().any(char::is_whitespace) {
        return Err(format!("unexpected whitespace in '{}'", expression));
    }
    let Some(rest) = expression.strip_prefix('.') else {
        return Err(format!(
            "expected a field path starting with '.', found '{}'",
            expression
        ));
    };
    if rest.is_empty() {
        return Ok(Vec::new());
    }

    rest.split('.').map(parse_segment).collect()
}

fn parse_segment(part: &str) -> Result<PathSegment, String> {
    let (name, mut brackets) = match part.find('[') {
        Some(i) => (&part[..i], &part[i..]),
        None => (part, ""),
    };
    if name.is_empty() {
        return Err(format!("empty path segment in '{}'", part));
    }
    if name.contains(']') {
        return Err(format!("unexpected ']' in '{}'", part));
    }

    let mut indexes = Vec::new();
    while !brackets.is_empty() {
        let close = brackets
            .find(']')
            .ok_or_else(|| format!("unclosed '[' in '{}'", part))?;
        let digits = &brackets[1..close];
        let index = digits
            .parse::<usize>()
            .map_err(|_| format!("invalid array index '{}' in '{}'", digits, part))?;
        indexes.push(index);
        brackets = &brackets[close + 1..];
        if !brackets.is_empty() && !brackets.starts_with('[') {
            return Err(format!("unexpected '{}' after index in '{}'", brackets, part));
        }
    }

    Ok(PathSegment {
        name: name.to_string(),
        indexes,
    })
}

/// Walk a path through the environment.
fn lookup<'v>(env: &'v Value, path: &[PathSegment]) -> Result<&'v Value, String> {
    let mut current = env;
    let mut walked = String::new();

    for (depth, segment) in path.iter().enumerate() {
        current = match current {
            Value::Object(map) => map.get(&segment.name).ok_or_else(|| match depth {
                0 => format!(
                    "unknown name '{}' (expected 'workflow_data' or 'nodes')",
                    segment.name
                ),
                1 if walked == ".nodes" => format!(
                    "node '{}' has no result (not executed yet, or no such node)",
                    segment.name
                ),
                _ => format!("no field '{}' in {}", segment.name, walked),
            })?,
            other => {
                return Err(format!(
                    "cannot access field '{}' on {} {}",
                    segment.name,
                    kind_of(other),
                    walked
                ));
            }
        };
        walked.push('.');
        walked.push_str(&segment.name);

        for &index in &segment.indexes {
            current = match current {
                Value::Array(items) => items.get(index).ok_or_else(|| {
                    format!(
                        "index {} out of range for {} (length {})",
                        index,
                        walked,
                        items.len()
                    )
                })?,
                other => {
                    return Err(format!("cannot index {} {}", kind_of(other), walked));
                }
            };
            walked.push_str(&format!("[{}]", index));
        }
    }

    Ok(current)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

/// Text inserted for a referenced value.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Mappings and sequences are inserted as compact JSON
        other => other.to_string(),
    }
}
