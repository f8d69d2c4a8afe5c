//! CSS minifier
//!
//! A single pass over the bytes: comments go (except the `/**/` IE hack),
//! runs of whitespace shrink to one space or newline and vanish entirely
//! next to punctuation that can't run into a neighbouring token, string
//! literals are copied untouched. An unclosed comment is dropped.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Start,
    /// A comment kept in the output
    Comment,
    Str,
    Byte(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Whitespace {
    None,
    Space,
    Linebreak,
}

/// Where minified output goes
trait Sink {
    fn push(&mut self, byte: u8);
    fn extend(&mut self, bytes: &[u8]);
}

impl Sink for Vec<u8> {
    fn push(&mut self, byte: u8) {
        Vec::push(self, byte);
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Counts instead of storing
#[derive(Default)]
struct SizeSink(usize);

impl Sink for SizeSink {
    fn push(&mut self, _byte: u8) {
        self.0 += 1;
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }
}

/// Never needs whitespace to stay apart from its neighbours
fn unextendable(token: Token) -> bool {
    matches!(
        token,
        Token::Start | Token::Comment | Token::Byte(b'{' | b'}' | b'/' | b';' | b':')
    )
}

// Open brackets keep no space after them; close brackets none before.
fn extendable_on_right(token: Token) -> bool {
    !matches!(token, Token::Byte(b'(' | b'[')) && !unextendable(token)
}

fn extendable_on_left(token: Token) -> bool {
    !matches!(token, Token::Byte(b')' | b']')) && !unextendable(token)
}

struct Minifier<'a, S> {
    input: &'a [u8],
    index: usize,
    out: S,
    whitespace: Whitespace,
    prev: Token,
}

impl<'a, S: Sink> Minifier<'a, S> {
    fn new(input: &'a [u8], out: S) -> Self {
        Self {
            input,
            index: 0,
            out,
            whitespace: Whitespace::None,
            prev: Token::Start,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.index + 1).copied()
    }

    /// Emit whatever separator the pending whitespace still needs, then
    /// make `next` the previous token
    fn change_token(&mut self, next: Token) {
        if self.whitespace != Whitespace::None {
            if self.prev == Token::Byte(b'}') {
                self.out.push(b'\n');
            } else if extendable_on_right(self.prev) && extendable_on_left(next) {
                let sep = if self.whitespace == Whitespace::Linebreak { b'\n' } else { b' ' };
                self.out.push(sep);
            }
            self.whitespace = Whitespace::None;
        }
        self.prev = next;
    }

    fn consume_comment(&mut self) {
        let begin = self.index;
        self.index += 2;
        while self.index < self.input.len() {
            if self.input[self.index] == b'*' && self.peek() == Some(b'/') {
                self.index += 2;
                let comment = &self.input[begin..self.index];
                if comment == b"/**/" {
                    self.change_token(Token::Comment);
                    self.out.extend(comment);
                } else if self.whitespace == Whitespace::None {
                    self.whitespace = Whitespace::Space;
                }
                return;
            }
            self.index += 1;
        }
        // unclosed: drop the rest
    }

    fn consume_string(&mut self) {
        let begin = self.index;
        let quote = self.input[begin];
        self.index += 1;
        while self.index < self.input.len() {
            let byte = self.input[self.index];
            self.index += 1;
            if byte == b'\\' {
                self.index += 1;
            } else if byte == quote {
                break;
            }
        }
        let end = self.index.min(self.input.len());
        self.change_token(Token::Str);
        self.out.extend(&self.input[begin..end]);
    }

    fn run(mut self) -> S {
        while self.index < self.input.len() {
            match self.input[self.index] {
                b'\n' | b'\r' => {
                    self.whitespace = Whitespace::Linebreak;
                    self.index += 1;
                }
                b' ' | b'\t' => {
                    if self.whitespace == Whitespace::None {
                        self.whitespace = Whitespace::Space;
                    }
                    self.index += 1;
                }
                b'\'' | b'"' => self.consume_string(),
                b'/' if self.peek() == Some(b'*') => self.consume_comment(),
                byte => {
                    self.change_token(Token::Byte(byte));
                    self.out.push(byte);
                    self.index += 1;
                }
            }
        }
        self.out
    }
}

pub fn minify_css(input: &[u8]) -> Vec<u8> {
    Minifier::new(input, Vec::with_capacity(input.len())).run()
}

/// Size `minify_css` would produce, without building the output
pub fn minified_css_size(input: &[u8]) -> usize {
    Minifier::new(input, SizeSink::default()).run().0
}
