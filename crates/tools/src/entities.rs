/// Decode the entity subset that shows up in serialized wiki DOM.
///
/// Named entities: `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;`.
/// Numeric entities must be well-formed and semicolon-terminated, and only
/// valid scalar values decode. Anything else passes through unchanged.
pub fn decode_entities(s: &str) -> String {
    const NAMED: [(&str, char); 6] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&apos;", '\''),
        ("&nbsp;", '\u{00A0}'),
    ];

    let Some(first) = memchr::memchr(b'&', s.as_bytes()) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut rest = &s[first..];

    while !rest.is_empty() {
        if !rest.starts_with('&') {
            let next = memchr::memchr(b'&', rest.as_bytes()).unwrap_or(rest.len());
            out.push_str(&rest[..next]);
            rest = &rest[next..];
            continue;
        }
        if let Some((name, ch)) = NAMED.iter().find(|(name, _)| rest.starts_with(name)) {
            out.push(*ch);
            rest = &rest[name.len()..];
            continue;
        }
        if let Some((ch, used)) = numeric_entity(rest) {
            out.push(ch);
            rest = &rest[used..];
            continue;
        }
        out.push('&');
        rest = &rest[1..];
    }
    out
}

// `&#123;` or `&#x7B;`; returns the char and the consumed byte length.
fn numeric_entity(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix("&#")?;
    let (digits, radix, prefix) = match body.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16, 3),
        None => (body, 10, 2),
    };
    let end = digits.find(';')?;
    let max = if radix == 16 { 6 } else { 7 };
    if end == 0 || end > max {
        return None;
    }
    let value = u32::from_str_radix(&digits[..end], radix).ok()?;
    let ch = char::from_u32(value)?;
    Some((ch, prefix + end + 1))
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
