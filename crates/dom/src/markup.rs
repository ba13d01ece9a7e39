//! Lenient markup reader for fixtures and serialized pipeline output.
//!
//! This is not an HTML5 tree builder. It understands tags, attributes,
//! comments and entities; it never inserts implied elements and never drops
//! whitespace, so a tree can be written with [`crate::to_html`] and read
//! back unchanged.
//!
//! Known limitations:
//! - Tag and attribute names are restricted to ASCII `[A-Za-z0-9:_-]`.
//! - An end tag with no matching open element is ignored.
//! - Doctypes and processing instructions are skipped.
//!
//! Unterminated comments and tags are errors; unclosed elements are not.
use crate::persist::{PersistError, load_data_attribs};
use crate::{Document, NodeId};
use memchr::memchr;
use std::fmt;
use tools::entities::decode_entities;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

#[derive(Debug)]
pub enum MarkupError {
    UnterminatedComment { position: usize },
    UnterminatedTag { position: usize },
    Data(PersistError),
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupError::UnterminatedComment { position } => {
                write!(f, "comment opened at byte {position} is never closed")
            }
            MarkupError::UnterminatedTag { position } => {
                write!(f, "tag opened at byte {position} is never closed")
            }
            MarkupError::Data(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MarkupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarkupError::Data(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PersistError> for MarkupError {
    fn from(err: PersistError) -> Self {
        MarkupError::Data(err)
    }
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

/// Reads `input` into a fresh document. Data attributes stay attributes.
pub fn parse_fragment(input: &str) -> Result<Document, MarkupError> {
    let mut doc = Document::new();
    let root = doc.root();
    read_into(&mut doc, root, input)?;
    Ok(doc)
}

/// Reads `input` and moves inline `data-parsoid` / `data-mw` attributes into
/// the metadata store.
pub fn parse_document(input: &str) -> Result<Document, MarkupError> {
    let mut doc = parse_fragment(input)?;
    let root = doc.root();
    load_data_attribs(&mut doc, root)?;
    Ok(doc)
}

/// Appends the nodes described by `input` to `parent`.
pub fn read_into(doc: &mut Document, parent: NodeId, input: &str) -> Result<(), MarkupError> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut open: Vec<NodeId> = Vec::new();
    let mut i = 0;

    while i < len {
        if bytes[i] != b'<' {
            let end = memchr(b'<', &bytes[i..]).map_or(len, |rel| i + rel);
            let text = decode_entities(&input[i..end]);
            if !text.is_empty() {
                append_text(doc, open.last().copied().unwrap_or(parent), text);
            }
            i = end;
            continue;
        }

        if input[i..].starts_with(COMMENT_START) {
            let body_start = i + COMMENT_START.len();
            let rel = input[body_start..]
                .find(COMMENT_END)
                .ok_or(MarkupError::UnterminatedComment { position: i })?;
            let comment = doc.create_comment(&input[body_start..body_start + rel]);
            let _ = doc.append_child(open.last().copied().unwrap_or(parent), comment);
            i = body_start + rel + COMMENT_END.len();
            continue;
        }

        if i + 1 < len && (bytes[i + 1] == b'!' || bytes[i + 1] == b'?') {
            i = memchr(b'>', &bytes[i..]).map_or(len, |rel| i + rel + 1);
            continue;
        }

        if i + 1 < len && bytes[i + 1] == b'/' {
            let start = i + 2;
            let mut j = start;
            while j < len && is_name_char(bytes[j]) {
                j += 1;
            }
            let name = input[start..j].to_ascii_lowercase();
            i = memchr(b'>', &bytes[j..])
                .map(|rel| j + rel + 1)
                .ok_or(MarkupError::UnterminatedTag { position: start - 2 })?;
            if let Some(pos) = open.iter().rposition(|n| doc.node_name(*n) == Some(name.as_str())) {
                open.truncate(pos);
            }
            continue;
        }

        let start = i + 1;
        let mut j = start;
        while j < len && is_name_char(bytes[j]) {
            j += 1;
        }
        if j == start {
            // A stray `<` is text.
            append_text(doc, open.last().copied().unwrap_or(parent), "<".to_string());
            i += 1;
            continue;
        }
        let name = input[start..j].to_ascii_lowercase();
        let (attrs, self_closing, next) =
            read_attributes(input, j).ok_or(MarkupError::UnterminatedTag { position: i })?;
        let element = doc.create_element(&name);
        if let Some(el) = doc.element_mut(element) {
            el.attrs = attrs;
        }
        let _ = doc.append_child(open.last().copied().unwrap_or(parent), element);
        i = next;

        if self_closing || is_void_element(&name) {
            continue;
        }
        if name == "script" || name == "style" {
            let close = format!("</{name}");
            let rest = &input[i..];
            let end = find_ascii_case_insensitive(rest, &close).unwrap_or(rest.len());
            if end > 0 {
                let raw = doc.create_text(&rest[..end]);
                let _ = doc.append_child(element, raw);
            }
            i += end;
            i = memchr(b'>', &bytes[i..]).map_or(len, |rel| i + rel + 1);
            continue;
        }
        open.push(element);
    }
    Ok(())
}

fn append_text(doc: &mut Document, parent: NodeId, text: String) {
    if let Some(last) = doc.last_child(parent) {
        if doc.is_text(last) {
            let joined = format!("{}{text}", doc.text(last).unwrap_or_default());
            doc.set_text(last, joined);
            return;
        }
    }
    let node = doc.create_text(text);
    let _ = doc.append_child(parent, node);
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let n = needle.as_bytes();
    if hay.len() < n.len() {
        return None;
    }
    (0..=hay.len() - n.len()).find(|&at| hay[at..at + n.len()].eq_ignore_ascii_case(n))
}

/// Reads attributes up to and including the closing `>`; `None` when the
/// input ends first.
fn read_attributes(input: &str, mut k: usize) -> Option<(Vec<(String, String)>, bool, usize)> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    let skip_whitespace = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };

    loop {
        skip_whitespace(&mut k);
        if k >= len {
            return None;
        }
        if bytes[k] == b'>' {
            k += 1;
            break;
        }
        if bytes[k] == b'/' {
            if k + 1 < len && bytes[k + 1] == b'>' {
                self_closing = true;
                k += 2;
                break;
            }
            k += 1;
            continue;
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            k += 1;
            continue;
        }
        let name = input[name_start..k].to_ascii_lowercase();

        skip_whitespace(&mut k);
        let value = if k < len && bytes[k] == b'=' {
            k += 1;
            skip_whitespace(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                k += 1;
                let vstart = k;
                k = memchr(quote, &bytes[k..]).map_or(len, |rel| k + rel);
                let raw = &input[vstart..k];
                if k < len {
                    k += 1;
                }
                decode_entities(raw)
            } else {
                let vstart = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    if bytes[k] == b'/' && k + 1 < len && bytes[k + 1] == b'>' {
                        break;
                    }
                    k += 1;
                }
                decode_entities(&input[vstart..k])
            }
        } else {
            String::new()
        };
        // First occurrence wins.
        if !attrs.iter().any(|(n, _)| *n == name) {
            attrs.push((name, value));
        }
    }
    Some((attrs, self_closing, k))
}
