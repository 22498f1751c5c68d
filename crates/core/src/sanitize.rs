//! Rendering untrusted file content safely.
//!
//! Text files can contain anything, including markup. Content shown in a preview is escaped so
//! it is always displayed as text and never interpreted.

/// Escapes markup-significant characters so `content` renders as literal text.
pub fn sanitize_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
