//! The fixed escape set of the markup protocol.
//!
//! Only `&`, `<` and `>` are reserved.  Anything else, quotes included,
//! travels verbatim.

/// Escape the reserved characters of `text`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Undo [`escape`] in a single left-to-right pass.
///
/// Unknown entities are left as they are, so a generator writing a bare `&`
/// does not corrupt the text.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let (replacement, consumed) = if rest.starts_with("&amp;") {
            ('&', 5)
        } else if rest.starts_with("&lt;") {
            ('<', 4)
        } else if rest.starts_with("&gt;") {
            ('>', 4)
        } else {
            ('&', 1)
        };
        out.push(replacement);
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_characters_are_escaped() {
        assert_eq!(escape("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape("say \"hi\""), "say \"hi\"");
    }

    #[test]
    fn unescape_is_single_pass() {
        assert_eq!(unescape("&amp;lt;"), "&lt;");
        assert_eq!(unescape(&escape("<output>&amp;</output>")), "<output>&amp;</output>");
    }

    #[test]
    fn bare_ampersand_survives() {
        assert_eq!(unescape("R&D &copy; x&"), "R&D &copy; x&");
    }
}
