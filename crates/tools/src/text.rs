/// HTML inter-element whitespace: space, tab, LF, CR and form feed.
pub fn is_inter_element_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c'))
}

/// Wikitext whitespace: space, tab, LF and CR. A form feed is content.
pub fn is_wikitext_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

pub fn has_newline(s: &str) -> bool {
    memchr::memchr(b'\n', s.as_bytes()).is_some()
}

/// Number of `\n` bytes at the end of `s`.
pub fn trailing_newline_count(s: &str) -> usize {
    s.bytes().rev().take_while(|b| *b == b'\n').count()
}

/// Splits `s` before its run of trailing newlines.
pub fn split_trailing_newlines(s: &str) -> (&str, &str) {
    s.split_at(s.len() - trailing_newline_count(s))
}

/// Splits `s` before its run of trailing inter-element whitespace.
pub fn split_trailing_whitespace(s: &str) -> (&str, &str) {
    let keep = s.trim_end_matches([' ', '\t', '\n', '\r', '\x0c']).len();
    s.split_at(keep)
}

/// Re-inserts the single leading space that indent-pre syntax consumed on
/// every line. The final newline of the last text child ends the block and
/// does not start a new line.
pub fn indent_pre_text(s: &str, is_last_child: bool) -> String {
    let keep_final = is_last_child && s.ends_with('\n');
    let body = if keep_final { &s[..s.len() - 1] } else { s };
    let mut out = body.replace('\n', "\n ");
    if keep_final {
        out.push('\n');
    }
    out
}
