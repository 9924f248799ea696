//! Template engine - renders nunjucks and mustache strings against a context
//!
//! Rendering is done by minijinja. Context bindings are named `@input`,
//! `@element` and so on, which aren't legal template identifiers, so `@name`
//! heads are rewritten to `__at_name` inside tags before rendering. Mustache
//! templates are translated to the same syntax first.

use super::path::VarPath;
use super::RenderError;
use crate::core::brick_config::is_identifier;
use crate::core::context::ExecutionContext;
use minijinja::value::ValueKind as TemplateValueKind;
use minijinja::{escape_formatter, Environment, ErrorKind as TemplateErrorKind, Output, State, UndefinedBehavior};
use serde_json::{Map, Value};
use std::fmt::{self, Write};

/// Stands in for `@` in template identifiers
const BINDING_PREFIX: &str = "__at_";

/// Template dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Nunjucks,
    Mustache,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Nunjucks => f.write_str("nunjucks"),
            TemplateKind::Mustache => f.write_str("mustache"),
        }
    }
}

/// Renders template strings.
///
/// Injected into the resolver so hosts can swap in another engine.
pub trait TemplateEngine: Send + Sync {
    /// Render a template to text
    fn render(
        &self,
        kind: TemplateKind,
        template: &str,
        ctx: &ExecutionContext,
    ) -> Result<Value, RenderError>;

    /// Check template syntax without rendering
    fn validate(&self, kind: TemplateKind, template: &str) -> Result<(), RenderError>;
}

/// The path of a template that is exactly one unfiltered substitution of
/// an `@` binding, e.g. `{{ @input.items }}`
pub fn single_substitution(kind: TemplateKind, template: &str) -> Option<VarPath> {
    let inner = match kind {
        TemplateKind::Nunjucks => template.strip_prefix("{{")?.strip_suffix("}}")?,
        TemplateKind::Mustache => match template.strip_prefix("{{{") {
            Some(rest) => rest.strip_suffix("}}}")?,
            None => {
                let inner = template.strip_prefix("{{")?.strip_suffix("}}")?.trim_start();
                inner.strip_prefix('&').unwrap_or(inner)
            }
        },
    };
    if inner.contains("{{") || inner.contains("}}") || inner.contains('|') {
        return None;
    }
    let path = VarPath::parse(inner).ok()?;
    path.head().starts_with('@').then_some(path)
}

fn syntax(kind: TemplateKind, reason: impl Into<String>) -> RenderError {
    RenderError::Syntax {
        kind,
        reason: reason.into(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Template variables for a context. `@name` bindings are exposed as
/// `__at_name`, and as plain `name` unless a binding already uses it.
fn template_context(ctx: &ExecutionContext) -> Value {
    let mut names = Map::new();
    let mut bare = Vec::new();
    for key in ctx.keys() {
        let Some(value) = ctx.get(key) else { continue };
        match key.strip_prefix('@') {
            Some(rest) if is_identifier(rest) => {
                names.insert(format!("{}{}", BINDING_PREFIX, rest), value.clone());
                bare.push((rest.to_string(), value.clone()));
            }
            None if is_identifier(key) => {
                names.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    for (name, value) in bare {
        names.entry(name).or_insert(value);
    }
    Value::Object(names)
}

/// Rewrite `@name` heads in one tag's expression, leaving string literals alone
fn rewrite_expression(expression: &str) -> String {
    let mut rewritten = String::with_capacity(expression.len() + 8);
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    for c in expression.chars() {
        match quote {
            Some(q) => {
                if c == q && prev != Some('\\') {
                    quote = None;
                }
                rewritten.push(c);
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                rewritten.push(c);
            }
            None if c == '@' && !prev.is_some_and(is_name_char) => rewritten.push_str(BINDING_PREFIX),
            None => rewritten.push(c),
        }
        prev = Some(c);
    }
    rewritten
}

/// Find the close delimiter after an opening tag, or fail as unclosed
fn split_close<'t>(kind: TemplateKind, rest: &'t str, close: &str) -> Result<(&'t str, &'t str), RenderError> {
    let end = rest
        .find(close)
        .ok_or_else(|| syntax(kind, format!("unclosed tag, expected '{}'", close)))?;
    Ok((&rest[..end], &rest[end + close.len()..]))
}

/// Rewrite every `{{ }}` and `{% %}` tag of a nunjucks template
fn nunjucks_source(template: &str) -> Result<String, RenderError> {
    let mut source = String::with_capacity(template.len() + 16);
    let mut rest = template;
    loop {
        let Some(open) = ["{{", "{%", "{#"].iter().filter_map(|t| rest.find(*t)).min() else {
            source.push_str(rest);
            return Ok(source);
        };
        source.push_str(&rest[..open]);
        let tail = &rest[open..];
        let (opener, close) = match &tail[..2] {
            "{{" => ("{{", "}}"),
            "{%" => ("{%", "%}"),
            _ => ("{#", "#}"),
        };
        let (inner, after) = split_close(TemplateKind::Nunjucks, &tail[2..], close)?;
        source.push_str(opener);
        if opener == "{#" {
            source.push_str(inner);
        } else {
            source.push_str(&rewrite_expression(inner));
        }
        source.push_str(close);
        rest = after;
    }
}

/// Literal text, shielded from the engine's block and comment delimiters
fn push_text(source: &mut String, text: &str) {
    if text.contains("{%") || text.contains("{#") {
        source.push_str("{% raw %}");
        source.push_str(text);
        source.push_str("{% endraw %}");
    } else {
        source.push_str(text);
    }
}

fn mustache_variable(inner: &str) -> Result<String, RenderError> {
    let kind = TemplateKind::Mustache;
    let inner = inner.trim();
    if inner.is_empty() {
        return Err(syntax(kind, "empty tag"));
    }
    if inner.contains('|') {
        return Err(syntax(kind, "filters are not supported in mustache templates"));
    }
    let path = VarPath::parse(inner)?;
    Ok(format!("{{{{ {} }}}}", rewrite_expression(&path.to_string())))
}

/// Translate a mustache template. Variables, unescaped variables and
/// comments are supported; sections and partials are not.
fn mustache_source(template: &str) -> Result<String, RenderError> {
    let kind = TemplateKind::Mustache;
    let mut source = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        push_text(&mut source, &rest[..open]);
        let tail = &rest[open..];

        if let Some(triple) = tail.strip_prefix("{{{") {
            let (inner, after) = split_close(kind, triple, "}}}")?;
            source.push_str(&mustache_variable(inner)?);
            rest = after;
            continue;
        }

        let (inner, after) = split_close(kind, &tail[2..], "}}")?;
        let inner = inner.trim();
        match inner.chars().next() {
            Some('!') => {}
            Some('#' | '^' | '/') => return Err(syntax(kind, "sections are not supported")),
            Some('>') => return Err(syntax(kind, "partials are not supported")),
            Some('=') => return Err(syntax(kind, "delimiter changes are not supported")),
            Some('&') => source.push_str(&mustache_variable(&inner[1..])?),
            _ => source.push_str(&mustache_variable(inner)?),
        }
        rest = after;
    }

    push_text(&mut source, rest);
    Ok(source)
}

/// Null and undefined print as nothing, arrays and objects as JSON
fn format_value(
    out: &mut Output<'_>,
    state: &State<'_, '_>,
    value: &minijinja::Value,
) -> Result<(), minijinja::Error> {
    match value.kind() {
        TemplateValueKind::Undefined | TemplateValueKind::None => Ok(()),
        TemplateValueKind::Seq | TemplateValueKind::Map => {
            let text = dump(value.clone())?;
            out.write_str(&text).map_err(minijinja::Error::from)
        }
        _ => escape_formatter(out, state, value),
    }
}

/// `dump` filter: the value as compact JSON
fn dump(value: minijinja::Value) -> Result<String, minijinja::Error> {
    serde_json::to_string(&value)
        .map_err(|e| minijinja::Error::new(TemplateErrorKind::BadSerialization, e.to_string()))
}

fn render_error(kind: TemplateKind, err: minijinja::Error) -> RenderError {
    let reason = err
        .detail()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
        .replace(BINDING_PREFIX, "@");
    match err.kind() {
        TemplateErrorKind::SyntaxError | TemplateErrorKind::UnknownFilter | TemplateErrorKind::UnknownTest => {
            RenderError::Syntax { kind, reason }
        }
        TemplateErrorKind::UndefinedError => RenderError::Undefined(reason),
        _ => RenderError::Failed { kind, reason },
    }
}

/// Default engine, backed by minijinja
pub struct BuiltinTemplateEngine {
    env: Environment<'static>,
}

impl Default for BuiltinTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinTemplateEngine {
    /// Undefined variables render empty
    pub fn new() -> Self {
        Self::with_undefined(UndefinedBehavior::Chainable)
    }

    /// Fail on undefined variables instead of rendering them empty
    pub fn strict() -> Self {
        Self::with_undefined(UndefinedBehavior::Strict)
    }

    fn with_undefined(behavior: UndefinedBehavior) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(behavior);
        env.set_keep_trailing_newline(true);
        env.set_formatter(format_value);
        env.add_filter("dump", dump);
        Self { env }
    }

    fn source(&self, kind: TemplateKind, template: &str) -> Result<String, RenderError> {
        match kind {
            TemplateKind::Nunjucks => nunjucks_source(template),
            TemplateKind::Mustache => mustache_source(template),
        }
    }
}

impl TemplateEngine for BuiltinTemplateEngine {
    fn render(
        &self,
        kind: TemplateKind,
        template: &str,
        ctx: &ExecutionContext,
    ) -> Result<Value, RenderError> {
        let source = self.source(kind, template)?;
        self.env
            .render_str(&source, template_context(ctx))
            .map(Value::String)
            .map_err(|e| render_error(kind, e))
    }

    fn validate(&self, kind: TemplateKind, template: &str) -> Result<(), RenderError> {
        let source = self.source(kind, template)?;
        self.env
            .template_from_str(&source)
            .map(|_| ())
            .map_err(|e| render_error(kind, e))
    }
}
