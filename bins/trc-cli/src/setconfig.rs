//! Typed parsing of `setconfig` values.
//!
//! Known options have a fixed target type. Anything else is read as a
//! literal: integer, decimal, boolean, null, quoted string or a list of
//! quoted strings, falling back to the raw text.

use anyhow::{bail, Context, Result};
use serde::Serialize;

/// A normalized configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Str(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionKind {
    Integer,
    /// Credentials are stored exactly as typed.
    Verbatim,
    Boolean,
    StringList,
}

const KNOWN_OPTIONS: &[(&str, OptionKind)] = &[
    ("rpcport", OptionKind::Integer),
    ("rpcuser", OptionKind::Verbatim),
    ("rpcpassword", OptionKind::Verbatim),
    ("rpchost", OptionKind::Verbatim),
    ("url_rewrite", OptionKind::StringList),
    ("show_console_tab", OptionKind::Boolean),
    ("auto_connect", OptionKind::Boolean),
    ("oneserver", OptionKind::Boolean),
    ("use_change", OptionKind::Boolean),
    ("gap_limit", OptionKind::Integer),
];

fn option_kind(key: &str) -> Option<OptionKind> {
    KNOWN_OPTIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// Convert the raw command-line text for `key` into a typed value.
pub fn normalize_value(key: &str, raw: &str) -> Result<ConfigValue> {
    match option_kind(key) {
        Some(OptionKind::Verbatim) => Ok(ConfigValue::Str(raw.to_string())),
        Some(OptionKind::Boolean) => Ok(ConfigValue::Bool(eval_bool(raw))),
        Some(OptionKind::Integer) => match parse_literal(raw) {
            ConfigValue::Int(n) => Ok(ConfigValue::Int(n)),
            _ => bail!("{key} expects an integer, got {raw:?}"),
        },
        Some(OptionKind::StringList) => {
            let list = parse_list(raw.trim())
                .with_context(|| format!("{key} expects a list of quoted strings"))?;
            Ok(ConfigValue::List(list))
        }
        None => Ok(parse_literal(raw)),
    }
}

/// Loose boolean: `true`/`false` in either case convention, numbers by
/// non-zero, strings and lists by non-emptiness.
pub fn eval_bool(raw: &str) -> bool {
    match parse_literal(raw) {
        ConfigValue::Null => false,
        ConfigValue::Bool(b) => b,
        ConfigValue::Int(n) => n != 0,
        ConfigValue::Decimal(f) => f != 0.0,
        ConfigValue::Str(s) => !s.is_empty(),
        ConfigValue::List(l) => !l.is_empty(),
    }
}

fn parse_literal(raw: &str) -> ConfigValue {
    let t = raw.trim();
    match t {
        "true" | "True" => return ConfigValue::Bool(true),
        "false" | "False" => return ConfigValue::Bool(false),
        "null" | "None" => return ConfigValue::Null,
        _ => {}
    }
    if let Ok(n) = t.parse::<i64>() {
        return ConfigValue::Int(n);
    }
    if looks_numeric(t) {
        if let Ok(f) = t.parse::<f64>() {
            return ConfigValue::Decimal(f);
        }
    }
    if let Some(inner) = unquote(t) {
        return ConfigValue::Str(inner.to_string());
    }
    if t.starts_with('[') {
        if let Ok(list) = parse_list(t) {
            return ConfigValue::List(list);
        }
    }
    ConfigValue::Str(t.to_string())
}

/// Digits with an optional sign, point and exponent; rejects `inf`/`nan`.
fn looks_numeric(t: &str) -> bool {
    !t.is_empty()
        && t.chars().any(|c| c.is_ascii_digit())
        && t.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

fn unquote(t: &str) -> Option<&str> {
    let first = t.chars().next()?;
    if (first == '\'' || first == '"') && t.len() >= 2 && t.ends_with(first) {
        Some(&t[1..t.len() - 1])
    } else {
        None
    }
}

/// Parse `['a', "b"]`.
fn parse_list(t: &str) -> Result<Vec<String>> {
    let inner = t
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .context("list must be enclosed in brackets")?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(quote) = chars.next() else {
            return Ok(items);
        };
        if quote != '\'' && quote != '"' {
            bail!("list items must be quoted strings");
        }
        let mut item = String::new();
        loop {
            match chars.next() {
                Some(c) if c == quote => break,
                Some(c) => item.push(c),
                None => bail!("unterminated string in list"),
            }
        }
        items.push(item);
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => return Ok(items),
            Some(',') => {}
            Some(c) => bail!("unexpected {c:?} in list"),
        }
    }
}
