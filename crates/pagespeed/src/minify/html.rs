//! HTML compactor
//!
//! Collapses whitespace runs between tags, removes comments other than
//! IE conditional comments, and leaves the contents of `pre`, `textarea`
//! and `script` alone. `style` contents go through the CSS minifier.
//! Tags themselves are copied as written.

use super::css::minify_css;

/// Elements whose contents are not HTML text
const FOREIGN: [&str; 4] = ["pre", "textarea", "script", "style"];

pub fn compact_html(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if byte.is_ascii_whitespace() {
            let start = i;
            while i < input.len() && input[i].is_ascii_whitespace() {
                i += 1;
            }
            if !out.last().is_some_and(|b: &u8| b.is_ascii_whitespace()) {
                out.push(input[start]);
            }
            continue;
        }
        if byte != b'<' {
            out.push(byte);
            i += 1;
            continue;
        }

        if input[i..].starts_with(b"<!--") {
            i = comment(input, i, &mut out);
            continue;
        }

        match tag_end(input, i) {
            Some(end) => {
                let tag = &input[i..end];
                out.extend_from_slice(tag);
                i = end;
                if let Some(name) = foreign_start_tag(tag) {
                    i = foreign_content(input, i, name, &mut out);
                }
            }
            None => {
                out.push(byte);
                i += 1;
            }
        }
    }
    out
}

/// Copy or drop the comment starting at `start`; returns where to resume
fn comment(input: &[u8], start: usize, out: &mut Vec<u8>) -> usize {
    match find(&input[start + 4..], b"-->") {
        Some(offset) => {
            let end = start + 4 + offset + 3;
            if input[start..].starts_with(b"<!--[") {
                out.extend_from_slice(&input[start..end]);
            }
            end
        }
        None => {
            tracing::debug!("Unterminated HTML comment, keeping the rest as is");
            out.extend_from_slice(&input[start..]);
            input.len()
        }
    }
}

/// One past the `>` closing the tag at `start`, skipping quoted values
fn tag_end(input: &[u8], start: usize) -> Option<usize> {
    let next = *input.get(start + 1)?;
    if !(next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?')) {
        return None;
    }
    let mut quote: Option<u8> = None;
    for (offset, &byte) in input[start + 1..].iter().enumerate() {
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b'>' => return Some(start + 1 + offset + 1),
            None => {}
        }
    }
    None
}

/// The lower-cased name if `tag` opens a foreign element
fn foreign_start_tag(tag: &[u8]) -> Option<&'static str> {
    if tag.ends_with(b"/>") {
        return None;
    }
    let name: Vec<u8> = tag[1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric())
        .map(u8::to_ascii_lowercase)
        .collect();
    FOREIGN.iter().copied().find(|f| f.as_bytes() == name.as_slice())
}

/// Copy the element body up to its end tag; returns the end tag position
fn foreign_content(input: &[u8], start: usize, name: &str, out: &mut Vec<u8>) -> usize {
    let close = format!("</{}", name);
    let mut search = start;
    let end = loop {
        match find(&input[search..], b"</") {
            Some(offset) => {
                let at = search + offset;
                let candidate = &input[at..];
                let name_matches = candidate.len() >= close.len()
                    && candidate[..close.len()].eq_ignore_ascii_case(close.as_bytes());
                let boundary = candidate
                    .get(close.len())
                    .map_or(true, |b| !b.is_ascii_alphanumeric());
                if name_matches && boundary {
                    break at;
                }
                search = at + 2;
            }
            None => {
                tracing::info!("Cannot find </{}>, treating the rest as text", name);
                return start;
            }
        }
    };

    let body = &input[start..end];
    if name == "style" {
        out.extend_from_slice(&minify_css(body));
    } else {
        out.extend_from_slice(body);
    }
    end
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
