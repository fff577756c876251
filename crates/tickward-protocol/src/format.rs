//! Typed text templates.
//!
//! Chat and broadcast text is written with positional placeholders:
//!
//! | placeholder | argument      | rendering                  |
//! |-------------|---------------|----------------------------|
//! | `{STR}`     | [`Arg::Str`]  | as is                      |
//! | `{INT}`     | [`Arg::Int`]  | plain decimal              |
//! | `{VAL}`     | [`Arg::Int`]  | decimal with `,` grouping  |
//!
//! Placeholders are matched against arguments by position. A count or kind
//! mismatch is reported as a [`ProtocolError`] instead of producing garbled
//! text. Any other `{...}` sequence is copied through literally.
//!
//! ```
//! use tickward_protocol::{Template, targs};
//!
//! let text = Template::parse("{STR} paid {VAL} gold")
//!     .render(&targs!["Mira", 1_250_000])
//!     .unwrap();
//! assert_eq!(text, "Mira paid 1,250,000 gold");
//! ```

use crate::ProtocolError;

/// One argument for a [`Template`]. Usually built with [`targs!`](crate::targs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Str(String),
    Int(i64),
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Arg::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Builds a `Vec<Arg>` from mixed string and integer expressions.
#[macro_export]
macro_rules! targs {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($arg)),+]
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Str,
    Int,
    Val,
}

impl Placeholder {
    fn name(self) -> &'static str {
        match self {
            Placeholder::Str => "STR",
            Placeholder::Int => "INT",
            Placeholder::Val => "VAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Placeholder),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Splits `text` into literal runs and placeholders.
    pub fn parse(text: &str) -> Self {
        const TOKENS: [(&str, Placeholder); 3] = [
            ("{STR}", Placeholder::Str),
            ("{INT}", Placeholder::Int),
            ("{VAL}", Placeholder::Val),
        ];

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while !rest.is_empty() {
            let matched = TOKENS
                .iter()
                .find(|(token, _)| rest.starts_with(token))
                .copied();
            match matched {
                Some((token, placeholder)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(placeholder));
                    rest = &rest[token.len()..];
                }
                None => {
                    let mut chars = rest.chars();
                    if let Some(c) = chars.next() {
                        literal.push(c);
                    }
                    rest = chars.as_str();
                }
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }

        Self { segments }
    }

    /// Number of placeholders.
    pub fn arity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Slot(_)))
            .count()
    }

    /// Substitutes `args` into the placeholders, in order.
    pub fn render(&self, args: &[Arg]) -> Result<String, ProtocolError> {
        let expected = self.arity();
        if expected != args.len() {
            return Err(ProtocolError::ArityMismatch {
                expected,
                got: args.len(),
            });
        }

        let mut out = String::new();
        let mut next = args.iter().enumerate();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(placeholder) => {
                    let Some((index, arg)) = next.next() else {
                        // Unreachable after the arity check; kept total.
                        break;
                    };
                    match (placeholder, arg) {
                        (Placeholder::Str, Arg::Str(s)) => out.push_str(s),
                        (Placeholder::Int, Arg::Int(v)) => out.push_str(&v.to_string()),
                        (Placeholder::Val, Arg::Int(v)) => out.push_str(&group_thousands(*v)),
                        (p, _) => {
                            return Err(ProtocolError::PlaceholderKind {
                                index,
                                expected: p.name(),
                            });
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Template::parse(text)
    }
}

/// Formats `value` with `,` between groups of three digits.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targs;

    #[test]
    fn test_render_substitutes_in_order() {
        let t = Template::parse("{STR} has {INT} gold");
        assert_eq!(t.render(&targs!["Mira", 7]).unwrap(), "Mira has 7 gold");
    }

    #[test]
    fn test_render_val_groups_thousands() {
        let t = Template::parse("Price: {VAL}");
        assert_eq!(t.render(&targs![1_234_567i64]).unwrap(), "Price: 1,234,567");
    }

    #[test]
    fn test_render_arity_mismatch_errors() {
        let t = Template::parse("{STR} and {STR}");
        assert_eq!(
            t.render(&targs!["one"]),
            Err(ProtocolError::ArityMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_render_kind_mismatch_errors() {
        let t = Template::parse("Level {INT}");
        assert_eq!(
            t.render(&targs!["ten"]),
            Err(ProtocolError::PlaceholderKind {
                index: 0,
                expected: "INT"
            })
        );
    }

    #[test]
    fn test_render_unknown_braces_are_literal() {
        let t = Template::parse("{x} {STR} {");
        assert_eq!(t.arity(), 1);
        assert_eq!(t.render(&targs!["ok"]).unwrap(), "{x} ok {");
    }

    #[test]
    fn test_render_no_placeholders_no_args() {
        let t = Template::parse("Welcome ▰ back");
        assert_eq!(t.render(&targs![]).unwrap(), "Welcome ▰ back");
    }

    #[test]
    fn test_group_thousands_edges() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-12_345), "-12,345");
        assert_eq!(group_thousands(i64::MIN), "-9,223,372,036,854,775,808");
    }
}
