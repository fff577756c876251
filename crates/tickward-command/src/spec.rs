//! The parameter grammar.
//!
//! A spec is a space separated list of items. Each item is a kind letter
//! followed by an optional bracketed name:
//!
//! | item        | accepts                                         |
//! |-------------|-------------------------------------------------|
//! | `s[name]`   | one word, or a `"double quoted"` run of words   |
//! | `i[name]`   | an integer                                      |
//! | `f[name]`   | a float                                         |
//! | `r[name]`   | the rest of the line; must be the last item     |
//!
//! A `?` before an item makes it and every item after it optional.

use std::fmt;

use crate::args::{ArgValue, Args};
use crate::error::CommandError;

/// What a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Rest,
}

impl ParamKind {
    fn from_letter(c: char) -> Option<Self> {
        match c {
            's' => Some(ParamKind::Str),
            'i' => Some(ParamKind::Int),
            'f' => Some(ParamKind::Float),
            'r' => Some(ParamKind::Rest),
            _ => None,
        }
    }

    fn default_name(self) -> &'static str {
        match self {
            ParamKind::Str => "string",
            ParamKind::Int => "number",
            ParamKind::Float => "value",
            ParamKind::Rest => "text",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub kind: ParamKind,
    pub name: String,
    pub optional: bool,
}

/// A parsed parameter spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSpec {
    params: Vec<Param>,
}

impl ParamSpec {
    /// Parses a spec string. The empty string declares no parameters.
    pub fn parse(spec: &str) -> Result<Self, CommandError> {
        let invalid = |reason: String| CommandError::InvalidSpec {
            spec: spec.to_string(),
            reason,
        };

        let mut params: Vec<Param> = Vec::new();
        let mut optional = false;

        for item in spec.split_whitespace() {
            if params.last().is_some_and(|p| p.kind == ParamKind::Rest) {
                return Err(invalid("'r' must be the last parameter".into()));
            }

            let mut body = item;
            if let Some(rest) = body.strip_prefix('?') {
                optional = true;
                body = rest;
            }

            let mut chars = body.chars();
            let letter = chars
                .next()
                .ok_or_else(|| invalid(format!("'{item}' has no kind")))?;
            let kind = ParamKind::from_letter(letter)
                .ok_or_else(|| invalid(format!("unknown kind '{letter}' in '{item}'")))?;

            let tail = chars.as_str();
            let name = if tail.is_empty() {
                kind.default_name().to_string()
            } else {
                let inner = tail
                    .strip_prefix('[')
                    .and_then(|t| t.strip_suffix(']'))
                    .ok_or_else(|| invalid(format!("malformed name in '{item}'")))?;
                if inner.is_empty() || inner.contains(['[', ']']) {
                    return Err(invalid(format!("malformed name in '{item}'")));
                }
                inner.to_string()
            };

            params.push(Param {
                kind,
                name,
                optional,
            });
        }

        Ok(Self { params })
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `<name>` for required parameters, `[name]` for optional ones.
    pub fn usage(&self) -> String {
        self.params
            .iter()
            .map(|p| {
                if p.optional {
                    format!("[{}]", p.name)
                } else {
                    format!("<{}>", p.name)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parses `input` into typed arguments. `None` when a required
    /// parameter is missing or a value has the wrong type. Words past the
    /// last parameter are ignored.
    pub fn parse_args(&self, input: &str) -> Option<Args> {
        let mut cursor = Cursor::new(input);
        let mut args = Args::default();

        for param in &self.params {
            let value = match param.kind {
                ParamKind::Rest => {
                    let rest = cursor.rest();
                    if rest.is_empty() {
                        return param.optional.then_some(args);
                    }
                    ArgValue::Str(rest.to_string())
                }
                kind => {
                    let Some(word) = cursor.word() else {
                        return param.optional.then_some(args);
                    };
                    match kind {
                        ParamKind::Int => ArgValue::Int(word.parse().ok()?),
                        ParamKind::Float => ArgValue::Float(word.parse().ok()?),
                        _ => ArgValue::Str(word),
                    }
                }
            };
            args.push(value);
        }

        Some(args)
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.usage())
    }
}

// ---------------------------------------------------------------------------
// Input cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn rest(&mut self) -> &'a str {
        let rest = self.rest.trim();
        self.rest = "";
        rest
    }

    /// Next word. A leading `"` reads up to the closing quote, with `\"`
    /// as an escaped quote; an unterminated quote takes the rest of the line.
    fn word(&mut self) -> Option<String> {
        let input = self.rest.trim_start();
        if input.is_empty() {
            self.rest = input;
            return None;
        }

        if let Some(quoted) = input.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = quoted.char_indices();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' if quoted[i + 1..].starts_with('"') => {
                        out.push('"');
                        chars.next();
                    }
                    '"' => {
                        self.rest = &quoted[i + 1..];
                        return Some(out);
                    }
                    _ => out.push(c),
                }
            }
            self.rest = "";
            return Some(out);
        }

        let end = input.find(char::is_whitespace).unwrap_or(input.len());
        self.rest = &input[end..];
        Some(input[..end].to_string())
    }
}
