use crate::entities::decode_entities;

/// Maps a DOM-escaped comment body back to its wikitext-escaped form.
///
/// The entity-decoded value may contain `-->`, which cannot appear inside a
/// wikitext comment, so it is re-escaped as `--&gt;`.
pub fn decode_comment(body: &str) -> String {
    let value = decode_entities(body);
    let mut out = String::with_capacity(value.len());
    let mut rest = value.as_str();
    while let Some(pos) = rest.find("--") {
        out.push_str(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
        if let Some(tail) = rest.strip_prefix('>') {
            out.push_str("&gt;");
            rest = tail;
        } else if rest.starts_with('&') && amp_gt_len(rest).is_some() {
            out.push_str("&amp;");
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

// Matches `&(amp;)*gt;` at the start of `s`.
fn amp_gt_len(s: &str) -> Option<usize> {
    let mut rest = s.strip_prefix('&')?;
    let mut len = 1;
    while let Some(tail) = rest.strip_prefix("amp;") {
        rest = tail;
        len += 4;
    }
    rest.starts_with("gt;").then_some(len + 3)
}

/// Source width of a comment node, including the `<!--` and `-->` delimiters.
pub fn decoded_comment_length(body: &str) -> usize {
    decode_comment(body).len() + 7
}

/// True for a run of `<!-- ... -->` comments separated only by spaces and tabs.
pub fn is_comment_run(s: &str) -> bool {
    let mut rest = s;
    let mut seen = false;
    loop {
        if seen {
            rest = rest.trim_start_matches([' ', '\t']);
        }
        if rest.is_empty() {
            return seen;
        }
        let Some(body) = rest.strip_prefix("<!--") else {
            return false;
        };
        let Some(end) = body.find("-->") else {
            return false;
        };
        rest = &body[end + 3..];
        seen = true;
    }
}

/// Whitespace-only or a comment run: attribute text a renderer ignores.
pub fn is_ignorable_attr_text(s: &str) -> bool {
    s.chars().all(char::is_whitespace) || is_comment_run(s)
}
