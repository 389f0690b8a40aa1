/// Characters with a meaning in the standard Solr query parser.
const SPECIAL_CHARS: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/',
];

/// Escapes a user supplied term so it is matched literally.
pub fn escape(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if SPECIAL_CHARS.contains(&c) || c.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builds `field:(a OR b OR c)` for a filter query, escaping every value.
pub fn any_of<'a>(field: &str, values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let values: Vec<String> = values
        .into_iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(format!("{}:({})", field, values.join(" OR ")))
    }
}
