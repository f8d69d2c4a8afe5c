//! Typed format arguments
//!
//! Rules build `Argument`s with raw values. The formatter localizes them
//! into `FormatArgument`s, which keep the raw value next to its rendered
//! text so converters can choose either.

use super::util;
use crate::l10n::Localizer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentType {
    Url,
    StringLiteral,
    IntLiteral,
    Bytes,
    Duration,
    VerbatimString,
    Percentage,
    Hyperlink,
}

impl ArgumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgumentType::Url => "URL",
            ArgumentType::StringLiteral => "STRING_LITERAL",
            ArgumentType::IntLiteral => "INT_LITERAL",
            ArgumentType::Bytes => "BYTES",
            ArgumentType::Duration => "DURATION",
            ArgumentType::VerbatimString => "VERBATIM_STRING",
            ArgumentType::Percentage => "PERCENTAGE",
            ArgumentType::Hyperlink => "HYPERLINK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Int(i64),
    Text(String),
}

/// One typed value bound to a placeholder key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    arg_type: ArgumentType,
    key: String,
    value: Value,
}

impl Argument {
    fn int(arg_type: ArgumentType, key: &str, value: i64) -> Self {
        Self {
            arg_type,
            key: key.to_string(),
            value: Value::Int(value),
        }
    }

    fn text(arg_type: ArgumentType, key: &str, value: &str) -> Self {
        Self {
            arg_type,
            key: key.to_string(),
            value: Value::Text(value.to_string()),
        }
    }

    pub fn bytes(key: &str, bytes: i64) -> Self {
        Self::int(ArgumentType::Bytes, key, bytes)
    }

    pub fn integer(key: &str, value: i64) -> Self {
        Self::int(ArgumentType::IntLiteral, key, value)
    }

    pub fn duration(key: &str, milliseconds: i64) -> Self {
        Self::int(ArgumentType::Duration, key, milliseconds)
    }

    /// Stores `round(100 * min(n, d) / d)`; 0 when `d` is 0
    pub fn percentage(key: &str, numerator: i64, denominator: i64) -> Self {
        Self::int(ArgumentType::Percentage, key, util::percentage(numerator, denominator))
    }

    pub fn string(key: &str, value: &str) -> Self {
        Self::text(ArgumentType::StringLiteral, key, value)
    }

    /// Text emitted without escaping, e.g. a code snippet
    pub fn verbatim_string(key: &str, value: &str) -> Self {
        Self::text(ArgumentType::VerbatimString, key, value)
    }

    pub fn url(key: &str, url: &str) -> Self {
        Self::text(ArgumentType::Url, key, url)
    }

    /// Link target for the text between `BEGIN_<key>` and `END_<key>`
    pub fn hyperlink(key: &str, href: &str) -> Self {
        Self::text(ArgumentType::Hyperlink, key, href)
    }

    pub fn arg_type(&self) -> ArgumentType {
        self.arg_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn int_value(&self) -> Option<i64> {
        match self.value {
            Value::Int(v) => Some(v),
            Value::Text(_) => None,
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            Value::Text(s) => Some(s),
            Value::Int(_) => None,
        }
    }

    /// Placeholder keys this argument satisfies
    pub fn placeholder_keys(&self) -> Vec<String> {
        if self.arg_type == ArgumentType::Hyperlink {
            vec![format!("BEGIN_{}", self.key), format!("END_{}", self.key)]
        } else {
            vec![self.key.clone()]
        }
    }

    pub fn localize(&self, localizer: &dyn Localizer) -> FormatArgument {
        let localized_value = match (&self.value, self.arg_type) {
            (Value::Int(v), ArgumentType::Bytes) => localizer.localize_bytes(*v),
            (Value::Int(v), ArgumentType::Duration) => localizer.localize_time_duration(*v),
            (Value::Int(v), ArgumentType::Percentage) => localizer.localize_percentage(*v),
            (Value::Int(v), _) => localizer.localize_int(*v),
            (Value::Text(s), ArgumentType::Url) => localizer.localize_url(s),
            (Value::Text(s), _) => s.clone(),
        };
        FormatArgument {
            arg_type: self.arg_type,
            placeholder_key: self.key.clone(),
            localized_value,
            string_value: self.string_value().map(str::to_string),
            int_value: self.int_value(),
        }
    }
}

/// A localized argument as stored in the formatted tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatArgument {
    #[serde(rename = "type")]
    pub arg_type: ArgumentType,
    pub placeholder_key: String,
    pub localized_value: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub int_value: Option<i64>,
}

/// A piece of a format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Literal(&'a str),
    /// `%(KEY)s`
    Named(&'a str),
    /// `$1`..`$9`, zero-based
    Positional(usize),
    /// `%%` or `$$`
    Escaped(char),
}

/// Split a format string into literals and placeholders
///
/// Anything that does not form a complete placeholder is literal text.
pub fn tokenize(format: &str) -> Vec<Token<'_>> {
    let bytes = format.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let token = match bytes[i] {
            b'%' if bytes.get(i + 1) == Some(&b'%') => Some((Token::Escaped('%'), 2)),
            b'%' if bytes.get(i + 1) == Some(&b'(') => format[i + 2..]
                .find(")s")
                .map(|end| (Token::Named(&format[i + 2..i + 2 + end]), end + 4)),
            b'$' if bytes.get(i + 1) == Some(&b'$') => Some((Token::Escaped('$'), 2)),
            b'$' => match bytes.get(i + 1) {
                Some(d @ b'1'..=b'9') => Some((Token::Positional((d - b'1') as usize), 2)),
                _ => None,
            },
            _ => None,
        };
        match token {
            Some((token, len)) => {
                if literal_start < i {
                    tokens.push(Token::Literal(&format[literal_start..i]));
                }
                tokens.push(token);
                i += len;
                literal_start = i;
            }
            None => i += 1,
        }
    }
    if literal_start < bytes.len() {
        tokens.push(Token::Literal(&format[literal_start..]));
    }
    tokens
}

/// Check that placeholders and arguments match one to one
///
/// Returns a description of the first mismatch.
pub fn validate_placeholders(format: &str, args: &[Argument]) -> Result<(), String> {
    // (placeholder key, index of the argument providing it)
    let provided: Vec<(String, usize)> = args
        .iter()
        .enumerate()
        .flat_map(|(i, arg)| arg.placeholder_keys().into_iter().map(move |k| (k, i)))
        .collect();
    let mut used = vec![false; provided.len()];

    for token in tokenize(format) {
        match token {
            Token::Named(key) => match provided.iter().position(|(k, _)| k == key) {
                Some(index) => used[index] = true,
                None => return Err(format!("no argument for placeholder %({})s", key)),
            },
            Token::Positional(index) => {
                if index >= args.len() {
                    return Err(format!("no argument for placeholder ${}", index + 1));
                }
                for ((_, arg_index), flag) in provided.iter().zip(used.iter_mut()) {
                    if *arg_index == index {
                        *flag = true;
                    }
                }
            }
            Token::Literal(_) | Token::Escaped(_) => {}
        }
    }

    match used.iter().position(|u| !u) {
        Some(index) => Err(format!("argument {} is not used", provided[index].0)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l10n::BasicLocalizer;

    #[test]
    fn test_localize_values() {
        let l = BasicLocalizer;
        assert_eq!(Argument::bytes("SIZE", 1536).localize(&l).localized_value, "1.5KiB");
        assert_eq!(Argument::integer("N", 42).localize(&l).localized_value, "42");
        assert_eq!(Argument::percentage("P", 29, 35).localize(&l).localized_value, "83%");
        assert_eq!(Argument::duration("T", 1000).localize(&l).localized_value, "1 second");

        let url = Argument::url("URL", "http://a.com/").localize(&l);
        assert_eq!(url.localized_value, "http://a.com/");
        assert_eq!(url.string_value.as_deref(), Some("http://a.com/"));
        assert_eq!(url.int_value, None);
    }

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(Argument::percentage("P", 3, 0).int_value(), Some(0));
        assert_eq!(Argument::percentage("P", 9, 3).int_value(), Some(100));
        assert_eq!(Argument::percentage("P", 1, 3).int_value(), Some(33));
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Save %(SIZE)s at $1, 100%% $$x"),
            vec![
                Token::Literal("Save "),
                Token::Named("SIZE"),
                Token::Literal(" at "),
                Token::Positional(0),
                Token::Literal(", 100"),
                Token::Escaped('%'),
                Token::Literal(" "),
                Token::Escaped('$'),
                Token::Literal("x"),
            ]
        );
        // incomplete placeholders stay literal
        assert_eq!(tokenize("50% of %(X"), vec![Token::Literal("50% of %(X")]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_validate_placeholders() {
        let args = [Argument::url("URL", "http://a.com/"), Argument::bytes("SIZE", 10)];
        assert!(validate_placeholders("%(URL)s saves %(SIZE)s", &args).is_ok());
        assert!(validate_placeholders("$1 saves $2", &args).is_ok());
        assert!(validate_placeholders("%(URL)s", &args).is_err());
        assert!(validate_placeholders("%(URL)s %(SIZE)s %(MORE)s", &args).is_err());

        let link = [Argument::hyperlink("LINK", "http://docs/")];
        assert!(validate_placeholders("See %(BEGIN_LINK)sdocs%(END_LINK)s.", &link).is_ok());
        assert!(validate_placeholders("See %(BEGIN_LINK)sdocs.", &link).is_err());
    }
}
