/// Utility functions for the DotCompleteLSP server.
///
/// This module contains helpers for position/offset conversion, typed
/// prefix extraction and the cheap checks that decide whether a
/// completion request is worth sending to the oracle at all.
use std::sync::LazyLock;

use regex::Regex;
use tower_lsp::lsp_types::{MessageType, Position};

use crate::Backend;
use crate::source_text::{Lexical, lexical_state_at_end};

impl Backend {
    /// Log a message to the client, if one is connected.
    pub(crate) async fn log(&self, typ: MessageType, message: String) {
        if let Some(client) = &self.client {
            client.log_message(typ, message).await;
        }
    }
}

/// An identifier, or a run of closing brackets, immediately followed by
/// the trailing dot.
static MEMBER_ACCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(([a-zA-Z_]+[0-9_]*)|([\)\]])+)(\.)$").expect("valid member access regex")
});

/// Convert an LSP Position (line, character) to a byte offset in content.
pub(crate) fn position_to_offset(content: &str, position: Position) -> usize {
    let mut offset = 0usize;
    for (i, line) in content.split_inclusive('\n').enumerate() {
        if i == position.line as usize {
            let text = line.trim_end_matches(['\n', '\r']);
            // Treat characters as code points; enough for identifiers and
            // punctuation around the caret.
            let byte_col = text
                .char_indices()
                .nth(position.character as usize)
                .map(|(idx, _)| idx)
                .unwrap_or(text.len());
            return offset + byte_col;
        }
        offset += line.len();
    }
    // Past the last line: end of content.
    content.len()
}

/// The identifier characters immediately before the end of `text`.
pub fn typed_prefix(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '$')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[start..]
}

/// Whether a just-typed `.` at the end of `line` starts a member access
/// (`foo.`, `call().`, `arr[0].`) rather than e.g. a number (`1.`).
pub fn is_member_access_trigger(line: &str) -> bool {
    MEMBER_ACCESS_RE.is_match(line)
}

/// Whether the end of `text` is in code, i.e. not inside a comment or a
/// string / char literal.
pub fn is_in_code(text: &str) -> bool {
    lexical_state_at_end(text) == Lexical::Code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_to_offset() {
        let content = "ab\ncdef\r\ng";
        assert_eq!(position_to_offset(content, Position::new(0, 1)), 1);
        assert_eq!(position_to_offset(content, Position::new(1, 2)), 5);
        assert_eq!(position_to_offset(content, Position::new(1, 99)), 7);
        assert_eq!(position_to_offset(content, Position::new(2, 1)), 10);
        assert_eq!(position_to_offset(content, Position::new(5, 0)), content.len());
    }

    #[test]
    fn test_typed_prefix() {
        assert_eq!(typed_prefix("    foo.subS"), "subS");
        assert_eq!(typed_prefix("    foo."), "");
        assert_eq!(typed_prefix("my_var"), "my_var");
        assert_eq!(typed_prefix(""), "");
    }

    #[test]
    fn test_member_access_trigger() {
        assert!(is_member_access_trigger("    foo."));
        assert!(is_member_access_trigger("x = bar()."));
        assert!(is_member_access_trigger("arr[0]."));
        assert!(is_member_access_trigger("v2."));
        assert!(!is_member_access_trigger("x = 1."));
        assert!(!is_member_access_trigger("foo"));
    }

    #[test]
    fn test_is_in_code() {
        assert!(is_in_code("int a = b."));
        assert!(!is_in_code("String s = \"a."));
        assert!(!is_in_code("// see foo."));
        assert!(!is_in_code("/** {@link Foo."));
    }
}
