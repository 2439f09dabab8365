//! Lenient lexer and tree builder for the restricted tag grammar.
//!
//! The grammar knows three tag forms and nothing else:
//!
//! ```text
//! open   := '<'  name ws* '>'
//! close  := '</' name ws* '>'
//! empty  := '<'  name ws* '/>'
//! name   := [A-Za-z_] [A-Za-z0-9_.:-]*
//! ```
//!
//! There are no attributes, comments or CDATA sections.  A `<` that does not
//! start one of the forms above is ordinary text, so prose such as `a < b`
//! never derails the scanner.
//!
//! Both passes are single forward scans.  The tree builder keeps a count of
//! open elements per tag name, so deciding whether a close tag matches
//! anything on the stack is O(1).  Mismatched markup is repaired instead of
//! rejected:
//!
//! * a close tag with no open counterpart is ignored,
//! * a close tag for an element further up the stack implicitly closes every
//!   element opened after it,
//! * elements still open at the end of input are closed there.

use std::collections::HashMap;
use std::ops::Range;

/// Open elements nested deeper than this are treated as text.
pub const MAX_DEPTH: usize = 128;

// ─────────────────────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClose,
}

/// One tag occurrence with its byte span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub kind: TagKind,
    pub name: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Every well-formed tag of `text`, in source order.
pub fn lex(text: &str) -> Vec<Tag<'_>> {
    let mut tags = Vec::new();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('<') {
        let at = pos + offset;
        match scan_tag(text, at) {
            Some(tag) => {
                pos = tag.end;
                tags.push(tag);
            }
            None => pos = at + 1,
        }
    }
    tags
}

fn scan_tag(text: &str, at: usize) -> Option<Tag<'_>> {
    let bytes = text.as_bytes();
    let mut i = at + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    let name_start = i;
    match bytes.get(i) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => i += 1,
        _ => return None,
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':'))
    {
        i += 1;
    }
    let name = &text[name_start..i];
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    let (kind, end) = match (bytes.get(i), bytes.get(i + 1)) {
        (Some(b'>'), _) if closing => (TagKind::Close, i + 1),
        (Some(b'>'), _) => (TagKind::Open, i + 1),
        (Some(b'/'), Some(b'>')) if !closing => (TagKind::SelfClose, i + 2),
        _ => return None,
    };
    Some(Tag {
        kind,
        name,
        start: at,
        end,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed element.  Spans index into the text that was parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<'a> {
    pub name: &'a str,
    /// From the first byte of the open tag to the last byte of the close tag.
    pub outer: Range<usize>,
    /// Content between the open and the close tag.
    pub inner: Range<usize>,
    pub self_closing: bool,
    pub children: Vec<Element<'a>>,
}

impl<'a> Element<'a> {
    /// Raw (still escaped) content of the element.
    pub fn raw<'s>(&self, src: &'s str) -> &'s str {
        &src[self.inner.clone()]
    }

    /// First immediate child named `name`.
    pub fn child(&self, name: &str) -> Option<&Element<'a>> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Element<'a>> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

struct Frame<'a> {
    open: Tag<'a>,
    children: Vec<Element<'a>>,
}

/// Parse `text` into its top-level elements.
pub fn parse(text: &str) -> Vec<Element<'_>> {
    let mut stack: Vec<Frame<'_>> = Vec::new();
    let mut roots = Vec::new();
    let mut open_counts: HashMap<&str, usize> = HashMap::new();

    for tag in lex(text) {
        match tag.kind {
            TagKind::Open if stack.len() < MAX_DEPTH => {
                *open_counts.entry(tag.name).or_default() += 1;
                stack.push(Frame {
                    open: tag,
                    children: Vec::new(),
                });
            }
            TagKind::Open => {}
            TagKind::SelfClose => {
                let element = Element {
                    name: tag.name,
                    outer: tag.start..tag.end,
                    inner: tag.end..tag.end,
                    self_closing: true,
                    children: Vec::new(),
                };
                attach(&mut stack, &mut roots, element);
            }
            TagKind::Close => {
                if open_counts.get(tag.name).copied().unwrap_or(0) == 0 {
                    continue;
                }
                while let Some(frame) = stack.pop() {
                    if let Some(count) = open_counts.get_mut(frame.open.name) {
                        *count -= 1;
                    }
                    let matched = frame.open.name == tag.name;
                    let element = close(frame, tag.start, tag.end, matched);
                    attach(&mut stack, &mut roots, element);
                    if matched {
                        break;
                    }
                }
            }
        }
    }

    while let Some(frame) = stack.pop() {
        let element = close(frame, text.len(), text.len(), false);
        attach(&mut stack, &mut roots, element);
    }
    roots
}

/// Close `frame` at the close tag `[close_start, close_end)`.  An implicit
/// close ends the element where the enclosing close tag begins.
fn close<'a>(frame: Frame<'a>, close_start: usize, close_end: usize, matched: bool) -> Element<'a> {
    let end = if matched { close_end } else { close_start };
    Element {
        name: frame.open.name,
        outer: frame.open.start..end,
        inner: frame.open.end..close_start,
        self_closing: false,
        children: frame.children,
    }
}

fn attach<'a>(stack: &mut [Frame<'a>], roots: &mut Vec<Element<'a>>, element: Element<'a>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Balanced pairs of one tag name
// ─────────────────────────────────────────────────────────────────────────────

/// A matched occurrence of one tag name, found by counting only that name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub outer: Range<usize>,
    pub inner: Range<usize>,
    /// Number of same-name elements enclosing this one.
    pub depth: usize,
}

/// Every balanced `<name>…</name>` (or `<name/>`) pair in `tags`, in order of
/// completion.
///
/// Only tags called `name` are counted: each open increments the count, each
/// close decrements it, so an echoed copy of the tag nested inside an outer
/// occurrence does not end the outer match early.
pub fn pairs(tags: &[Tag<'_>], name: &str) -> Vec<Pair> {
    let mut open: Vec<&Tag<'_>> = Vec::new();
    let mut found = Vec::new();
    for tag in tags.iter().filter(|t| t.name == name) {
        match tag.kind {
            TagKind::Open => open.push(tag),
            TagKind::SelfClose => found.push(Pair {
                outer: tag.start..tag.end,
                inner: tag.end..tag.end,
                depth: open.len(),
            }),
            TagKind::Close => {
                if let Some(start) = open.pop() {
                    found.push(Pair {
                        outer: start.start..tag.end,
                        inner: start.end..tag.start,
                        depth: open.len(),
                    });
                }
            }
        }
    }
    found
}

/// The last of the outermost pairs: the last depth-0 match when one exists,
/// otherwise the last match at the shallowest depth seen (an unclosed stray
/// open tag earlier in the text pushes every later match one level down).
pub fn last_outermost(pairs: &[Pair]) -> Option<&Pair> {
    let shallowest = pairs.iter().map(|p| p.depth).min()?;
    pairs.iter().rev().find(|p| p.depth == shallowest)
}
