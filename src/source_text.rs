/// Plain-text source scanning helpers.
///
/// These operate on raw source text without a parser and are used to work
/// out which class declarations enclose a position:
///
///   1. [`remove_preprocessing`] drops comments and `#` directive lines
///   2. [`collapse_brackets`] reduces every balanced `{ … }` to `{}`
///   3. [`remove_empty_classes`] deletes declarations whose body is `{}`
///
/// What is left of the text before a position then only contains the
/// headers of the still-open (enclosing) declarations.
use std::sync::LazyLock;

use regex::Regex;

static EMPTY_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|interface|enum)\s+[^{};]*\{\}").expect("valid empty class regex")
});

static CLASS_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|interface|enum)\s+([^\s{<]+)").expect("valid class header regex")
});

/// Scanner state shared by the comment/string aware walkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lexical {
    Code,
    LineComment,
    BlockComment,
    StringLiteral,
    CharLiteral,
}

/// Walk `text` and report the lexical state at its end.
pub(crate) fn lexical_state_at_end(text: &str) -> Lexical {
    let mut state = Lexical::Code;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        state = match (state, c) {
            (Lexical::Code, '/') if chars.peek() == Some(&'/') => {
                chars.next();
                Lexical::LineComment
            }
            (Lexical::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                Lexical::BlockComment
            }
            (Lexical::Code, '"') => Lexical::StringLiteral,
            (Lexical::Code, '\'') => Lexical::CharLiteral,
            (Lexical::LineComment, '\n') => Lexical::Code,
            (Lexical::BlockComment, '*') if chars.peek() == Some(&'/') => {
                chars.next();
                Lexical::Code
            }
            (Lexical::StringLiteral | Lexical::CharLiteral, '\\') => {
                chars.next();
                state
            }
            (Lexical::StringLiteral, '"') | (Lexical::CharLiteral, '\'') => Lexical::Code,
            (Lexical::StringLiteral | Lexical::CharLiteral, '\n') => Lexical::Code,
            (s, _) => s,
        };
    }
    state
}

/// Strip `//` and `/* */` comments and lines starting with `#`.
///
/// String and char literals are kept verbatim so comment markers inside
/// them are not mistaken for comments.  Newlines are preserved.
pub fn remove_preprocessing(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = Lexical::Code;
    let mut at_line_start = true;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Lexical::Code => {
                if at_line_start && c == '#' {
                    // Directive: skip to end of line.
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                match c {
                    '/' if chars.peek() == Some(&'/') => {
                        chars.next();
                        state = Lexical::LineComment;
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        state = Lexical::BlockComment;
                    }
                    '"' => {
                        state = Lexical::StringLiteral;
                        out.push(c);
                    }
                    '\'' => {
                        state = Lexical::CharLiteral;
                        out.push(c);
                    }
                    _ => out.push(c),
                }
            }
            Lexical::LineComment => {
                if c == '\n' {
                    state = Lexical::Code;
                    out.push(c);
                }
            }
            Lexical::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = Lexical::Code;
                    out.push(' ');
                } else if c == '\n' {
                    out.push(c);
                }
            }
            Lexical::StringLiteral | Lexical::CharLiteral => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if (state == Lexical::StringLiteral && c == '"')
                    || (state == Lexical::CharLiteral && c == '\'')
                    || c == '\n'
                {
                    state = Lexical::Code;
                }
            }
        }

        if c == '\n' {
            at_line_start = true;
        } else if !c.is_whitespace() {
            at_line_start = false;
        }
    }

    out
}

/// Replace the contents of every balanced `{ … }` pair with nothing,
/// leaving `{}`.  Unmatched braces are kept as they are.
pub fn collapse_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open: Vec<usize> = Vec::new();
    for c in text.chars() {
        match c {
            '{' => {
                open.push(out.len());
                out.push('{');
            }
            '}' => match open.pop() {
                Some(start) => {
                    out.truncate(start + 1);
                    out.push('}');
                }
                None => out.push('}'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Delete `class X … {}` (and interface / enum) declarations whose body
/// has been collapsed to `{}`.
pub fn remove_empty_classes(text: &str) -> String {
    EMPTY_CLASS_RE.replace_all(text, "").into_owned()
}

/// Names of the declarations still open at the end of `text`, outermost
/// first.
///
/// For `class Outer { class Done {} class Inner {` this is
/// `["Outer", "Inner"]`.
pub fn enclosing_classes(text: &str) -> Vec<String> {
    let stripped = remove_empty_classes(&collapse_brackets(&remove_preprocessing(text)));
    CLASS_HEADER_RE
        .captures_iter(&stripped)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
