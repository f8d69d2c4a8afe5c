//! JavaScript minifier
//!
//! The jsmin pass: comments are dropped, whitespace runs collapse to at
//! most one space or newline, and a newline survives only where removing
//! it could change how the statement parses. String and regular
//! expression literals are copied verbatim.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JsMinifyError {
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated regular expression literal")]
    UnterminatedRegex,
}

type Result<T> = std::result::Result<T, JsMinifyError>;

/// Letters, digits, `_`, `$`, `\` and anything non-ASCII
fn is_alphanum(c: Option<u8>) -> bool {
    matches!(c, Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'\\') || b > 126)
}

/// Bytes after which a `/` opens a regular expression, not a division
fn precedes_regex(c: Option<u8>) -> bool {
    matches!(
        c,
        Some(b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';' | b'\n')
    )
}

struct JsMin<'a> {
    input: &'a [u8],
    index: usize,
    // Some(None) is a looked-ahead end of input
    lookahead: Option<Option<u8>>,
    a: Option<u8>,
    b: Option<u8>,
    out: Vec<u8>,
}

impl<'a> JsMin<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            index: 0,
            lookahead: None,
            a: None,
            b: None,
            out: Vec::with_capacity(input.len()),
        }
    }

    /// Next byte with control characters folded to space or newline
    fn get(&mut self) -> Option<u8> {
        let c = match self.lookahead.take() {
            Some(c) => c,
            None => {
                let c = self.input.get(self.index).copied();
                self.index += 1;
                c
            }
        };
        match c {
            Some(b'\r') => Some(b'\n'),
            Some(b) if b >= b' ' || b == b'\n' => Some(b),
            Some(_) => Some(b' '),
            None => None,
        }
    }

    fn peek(&mut self) -> Option<u8> {
        let c = self.get();
        self.lookahead = Some(c);
        c
    }

    /// Next byte outside comments. A block comment reads as one space.
    fn next(&mut self) -> Result<Option<u8>> {
        let c = self.get();
        if c != Some(b'/') {
            return Ok(c);
        }
        match self.peek() {
            Some(b'/') => loop {
                let c = self.get();
                if c.map_or(true, |b| b <= b'\n') {
                    return Ok(c);
                }
            },
            Some(b'*') => {
                self.get();
                loop {
                    match self.get() {
                        Some(b'*') if self.peek() == Some(b'/') => {
                            self.get();
                            return Ok(Some(b' '));
                        }
                        None => return Err(JsMinifyError::UnterminatedComment),
                        _ => {}
                    }
                }
            }
            _ => Ok(c),
        }
    }

    fn emit(&mut self, c: Option<u8>) {
        if let Some(b) = c {
            self.out.push(b);
        }
    }

    /// Output A, then move on as in `drop_a`
    fn output_a(&mut self) -> Result<()> {
        self.emit(self.a);
        self.drop_a()
    }

    /// Replace A with B, copying a string literal through whole
    fn drop_a(&mut self) -> Result<()> {
        self.a = self.b;
        if matches!(self.a, Some(b'\'' | b'"')) {
            loop {
                self.emit(self.a);
                self.a = self.get();
                if self.a == self.b {
                    break;
                }
                if self.a == Some(b'\\') {
                    self.emit(self.a);
                    self.a = self.get();
                }
                if self.a.is_none() {
                    return Err(JsMinifyError::UnterminatedString);
                }
            }
        }
        self.drop_b()
    }

    /// Read the next B, copying a regular expression literal through whole
    fn drop_b(&mut self) -> Result<()> {
        self.b = self.next()?;
        if self.b == Some(b'/') && precedes_regex(self.a) {
            self.emit(self.a);
            self.emit(self.b);
            loop {
                self.a = self.get();
                if self.a == Some(b'/') {
                    break;
                }
                if self.a == Some(b'\\') {
                    self.emit(self.a);
                    self.a = self.get();
                }
                match self.a {
                    Some(c) => self.out.push(c),
                    None => return Err(JsMinifyError::UnterminatedRegex),
                }
            }
            self.b = self.next()?;
        }
        Ok(())
    }

    fn run(mut self) -> Result<Vec<u8>> {
        self.a = Some(b'\n');
        self.drop_b()?;
        while self.a.is_some() {
            match self.a {
                Some(b' ') => {
                    if is_alphanum(self.b) {
                        self.output_a()?
                    } else {
                        self.drop_a()?
                    }
                }
                Some(b'\n') => match self.b {
                    Some(b'{' | b'[' | b'(' | b'+' | b'-') => self.output_a()?,
                    Some(b' ') => self.drop_b()?,
                    _ if is_alphanum(self.b) => self.output_a()?,
                    _ => self.drop_a()?,
                },
                _ => match self.b {
                    Some(b' ') => {
                        if is_alphanum(self.a) {
                            self.output_a()?
                        } else {
                            self.drop_b()?
                        }
                    }
                    Some(b'\n') => match self.a {
                        Some(b'}' | b']' | b')' | b'+' | b'-' | b'"' | b'\'') => self.output_a()?,
                        _ if is_alphanum(self.a) => self.output_a()?,
                        _ => self.drop_b()?,
                    },
                    _ => self.output_a()?,
                },
            }
        }
        // the pass starts from a virtual newline
        if self.out.first() == Some(&b'\n') {
            self.out.remove(0);
        }
        Ok(self.out)
    }
}

/// Minify JavaScript source
pub fn minify_js(input: &[u8]) -> Result<Vec<u8>> {
    JsMin::new(input).run()
}
