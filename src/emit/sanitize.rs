//! Symbol and string escaping for ZAP source text.

/// Turn an arbitrary name into a legal ZAP symbol.
///
/// The three punctuation words get fixed names. Every other character that
/// ZAP would not accept in a symbol becomes `$` followed by its code point in
/// four lowercase hex digits. `$` itself is kept so that sanitizing an
/// already sanitized name leaves it unchanged.
///
/// Names that another tool already escaped with `$` pass through unchanged.
pub fn sanitize_symbol(name: &str) -> String {
    match name {
        "." => return "PERIOD".to_string(),
        "," => return "COMMA".to_string(),
        "\"" => return "QUOTE".to_string(),
        _ => {}
    }

    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() || matches!(c, '?' | '#' | '-' | '$') {
            out.push(c);
        } else {
            out.push_str(&format!("${:04x}", c as u32));
        }
    }
    out
}

/// Quote a string literal, doubling embedded quotes.
pub fn quote_string(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}
