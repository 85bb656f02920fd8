//! Canonical text rendering of a `Value` (spec §4.7).
//!
//! Grounded on `src/formatter.rs`'s trait-of-render-rules shape (a set of
//! small, dispatching render functions rather than one giant match), applied
//! here to spec §4.7's literal/array/block/macro/include rendering rules
//! instead of the teacher's NLP formatting rules.

use crate::macro_invocation::MacroInvocation;
use crate::value::{format_float, Value, ValueKind};

impl Value {
    /// Renders this value as RSD source text.
    ///
    /// `follow_includes` controls how an `include` node renders: as the
    /// literal `include "path";` statement (`false`), or with its loaded
    /// content spliced in as an ordinary block (`true`). `inline` chooses
    /// between a `Block`'s two forms: newline-and-indent, or single-line
    /// `{ k = v; k = v; }`. `indent` is the current nesting depth, in steps
    /// of four spaces.
    pub fn to_rsd_string(&self, follow_includes: bool, inline: bool, indent: usize) -> String {
        render_value(self, follow_includes, inline, indent)
    }
}

fn render_value(value: &Value, follow_includes: bool, inline: bool, indent: usize) -> String {
    let type_name = value.type_name();
    let mut out = String::new();
    if !type_name.is_empty() {
        out.push('@');
        out.push_str(&type_name.to_string());
        out.push(' ');
    }
    out.push_str(&render_payload(value, follow_includes, inline, indent));
    out
}

fn render_payload(value: &Value, follow_includes: bool, inline: bool, indent: usize) -> String {
    let data = value.0.borrow();
    match &data.kind {
        ValueKind::Invalid => "null".to_string(),
        ValueKind::Boolean(b) => b.to_string(),
        ValueKind::Integer(i) => i.to_string(),
        ValueKind::Float(f) => format_float(*f),
        ValueKind::String(s) => quote_string(s),
        ValueKind::Reference(r) => r.to_string(),
        ValueKind::Macro(m) => render_macro(m, follow_includes, inline, indent),
        ValueKind::Array(items) => render_array(items, follow_includes, inline, indent),
        ValueKind::Block(_) => {
            drop(data);
            render_block(value, follow_includes, inline, indent)
        }
    }
}

fn render_macro(m: &MacroInvocation, follow_includes: bool, inline: bool, indent: usize) -> String {
    let args: Vec<String> = m
        .args()
        .iter()
        .map(|(k, v)| format!("{k}: {}", render_value(v, follow_includes, inline, indent)))
        .collect();
    format!("{}({})", m.name(), args.join(", "))
}

fn render_array(items: &[Value], follow_includes: bool, inline: bool, indent: usize) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }
    let rendered: Vec<String> =
        items.iter().map(|v| render_value(v, follow_includes, inline, indent)).collect();
    format!("[ {} ]", rendered.join(", "))
}

fn render_block(value: &Value, follow_includes: bool, inline: bool, indent: usize) -> String {
    let mut out = String::new();
    if let Some(inherits) = value.inherits() {
        if let Some(r) = inherits.as_reference() {
            out.push_str(": ");
            out.push_str(&r.to_string());
            out.push(' ');
        }
    }
    let entries = value.block_entries().unwrap_or_default();
    if entries.is_empty() {
        out.push_str("{}");
        return out;
    }
    if inline {
        out.push_str("{ ");
        for (key, child) in &entries {
            render_inline_member(key, child, follow_includes, inline, indent, &mut out);
        }
        out.push('}');
    } else {
        out.push_str("{\n");
        for (key, child) in &entries {
            render_block_member(key, child, follow_includes, inline, indent + 1, &mut out);
        }
        push_indent(&mut out, indent);
        out.push('}');
    }
    out
}

/// One member of a multi-line `Block`: indented, newline-terminated.
fn render_block_member(
    key: &str,
    child: &Value,
    follow_includes: bool,
    inline: bool,
    indent: usize,
    out: &mut String,
) {
    push_indent(out, indent);
    render_member_body(key, child, follow_includes, inline, indent, out);
    out.push_str(";\n");
}

/// One member of an inline `Block`: no indentation, `"; "`-terminated.
fn render_inline_member(
    key: &str,
    child: &Value,
    follow_includes: bool,
    inline: bool,
    indent: usize,
    out: &mut String,
) {
    render_member_body(key, child, follow_includes, inline, indent, out);
    out.push_str("; ");
}

/// The `name = value` or `include "path"` body shared by both member forms.
fn render_member_body(
    key: &str,
    child: &Value,
    follow_includes: bool,
    inline: bool,
    indent: usize,
    out: &mut String,
) {
    if child.is_include() {
        if follow_includes {
            push_name(out, key);
            out.push_str(" = ");
            out.push_str(&render_payload(child, follow_includes, inline, indent));
        } else {
            out.push_str("include ");
            out.push_str(&quote_string(key));
        }
    } else {
        push_name(out, key);
        out.push_str(" = ");
        out.push_str(&render_value(child, follow_includes, inline, indent));
    }
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("    ");
    }
}

fn push_name(out: &mut String, name: &str) {
    if is_bare_identifier(name) {
        out.push_str(name);
    } else {
        out.push_str(&quote_string(name));
    }
}

/// A name renders unquoted only if it matches identifier syntax and isn't a
/// grammar keyword that would otherwise swallow it as a different token kind.
fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    starts_ok && rest_ok && !matches!(name, "include" | "true" | "false")
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
