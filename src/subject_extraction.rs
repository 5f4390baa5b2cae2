/// Member-access subject extraction.
///
/// This module finds the access chain that ends at the dot before the
/// caret, splits off its leading variable, and looks up the variable's
/// declared type in the text above.  The result is a [`TypeDefinition`]
/// that the completion session resolves to an absolute type.
///
/// # Subjects
///
/// | Line before caret            | `typename`       | `var`    | `tocomplete`       |
/// |------------------------------|------------------|----------|--------------------|
/// | `names.`                     | `List<String>`   | `names`  | `.`                |
/// | `names.get(a.b).trim().`     | `List<String>`   | `names`  | `.get(a.b).trim().`|
/// | `System.out.`                | none             | `System` | `.out.`            |
/// | `this.`                      | enclosing class  | `this`   | `.`                |
/// | `helper().`                  | enclosing class  | `this`   | `.helper().`       |
/// | `new StringBuilder().`       | `StringBuilder`  | `StringBuilder` | `.`         |
/// | `parts[0].`                  | `String[]`       | `parts`  | `.`                |
use regex::Regex;

use crate::source_text::enclosing_classes;
use crate::types::TypeDefinition;

/// Words that can precede an identifier the way a type does but are not
/// types (`return value;`, `case value:`).
const NON_TYPE_KEYWORDS: &[&str] = &[
    "return",
    "new",
    "throw",
    "case",
    "else",
    "package",
    "import",
    "instanceof",
    "assert",
    "yield",
    "class",
    "interface",
    "enum",
    "extends",
    "implements",
    "throws",
    "goto",
];

/// The parsing collaborator used by the completion session.
pub trait DefinitionParser {
    /// Parse the member access that `before` (the current line up to the
    /// caret, minus the typed prefix, ending in `.`) ends with.  `text` is
    /// the whole file up to the caret.
    fn type_definition(&self, text: &str, before: &str) -> Option<TypeDefinition>;
}

/// [`DefinitionParser`] working on plain source text.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceParser;

impl DefinitionParser for SourceParser {
    fn type_definition(&self, text: &str, before: &str) -> Option<TypeDefinition> {
        get_type_definition(text, before)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Skip backwards past a balanced group closed at `chars[pos - 1]`.
///
/// Returns the index of the matching opener, or `None` if unbalanced.
pub(crate) fn skip_balanced_back(chars: &[char], pos: usize) -> Option<usize> {
    let (open, close) = match chars.get(pos.checked_sub(1)?)? {
        ')' => ('(', ')'),
        ']' => ('[', ']'),
        _ => return None,
    };
    let mut depth: u32 = 0;
    let mut j = pos;
    while j > 0 {
        j -= 1;
        if chars[j] == close {
            depth += 1;
        } else if chars[j] == open {
            depth -= 1;
            if depth == 0 {
                return Some(j);
            }
        }
    }
    None
}

/// Skip forwards past a balanced group opened at `chars[pos]`.
///
/// Returns the index one past the matching closer.
fn skip_balanced_forward(chars: &[char], pos: usize) -> Option<usize> {
    let (open, close) = match chars.get(pos)? {
        '(' => ('(', ')'),
        '[' => ('[', ']'),
        _ => return None,
    };
    let mut depth: u32 = 0;
    for (j, &c) in chars.iter().enumerate().skip(pos) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(j + 1);
            }
        }
    }
    None
}

/// Index where the access chain ending at `end` (exclusive, one past the
/// trailing `.`) starts.
///
/// The chain is a run of identifiers joined by dots, each optionally
/// followed by balanced `( … )` / `[ … ]` groups.
pub(crate) fn chain_start(chars: &[char], end: usize) -> Option<usize> {
    if end == 0 || chars[end - 1] != '.' {
        return None;
    }
    let mut i = end - 1;
    loop {
        while i > 0 && matches!(chars[i - 1], ')' | ']') {
            i = skip_balanced_back(chars, i)?;
        }
        let ident_end = i;
        while i > 0 && is_ident_char(chars[i - 1]) {
            i -= 1;
        }
        if i == ident_end {
            return None;
        }
        if i > 0 && chars[i - 1] == '.' {
            i -= 1;
            continue;
        }
        return Some(i);
    }
}

/// Whether the `new` keyword (followed by whitespace) precedes `start`.
fn preceded_by_new(chars: &[char], start: usize) -> bool {
    let mut j = start;
    if j == 0 || !chars[j - 1].is_whitespace() {
        return false;
    }
    while j > 0 && chars[j - 1].is_whitespace() {
        j -= 1;
    }
    if j < 3 || chars[j - 3..j] != ['n', 'e', 'w'] {
        return false;
    }
    j == 3 || !is_ident_char(chars[j - 4])
}

/// Find the nearest declaration `Type var` above the caret.
///
/// Returns the declared type (with any generic / array decoration) and
/// its byte offset in `text`.
pub fn find_declaration(text: &str, var: &str) -> Option<(String, usize)> {
    let pattern = format!(
        r"(?m)(?:^|[\s(,;{{}}])((?:[A-Za-z_$][\w$]*\.)*[A-Za-z_$][\w$]*(?:\s*<[^;(){{}}=]*>)?(?:\s*\[\s*\])*)\s+{}\s*(?:[=;,:)\[]|$)",
        regex::escape(var)
    );
    let declaration = Regex::new(&pattern).ok()?;
    declaration
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter(|m| !NON_TYPE_KEYWORDS.contains(&m.as_str()))
        .last()
        .map(|m| (m.as_str().to_string(), m.start()))
}

/// 1-based line and column of byte offset `offset` in `text`.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

/// Parse the member access `before` ends with.
///
/// Returns `None` when `before` does not end in an access chain (e.g. a
/// string literal or a parenthesised cast before the dot).
pub fn get_type_definition(text: &str, before: &str) -> Option<TypeDefinition> {
    let chars: Vec<char> = before.chars().collect();
    let start = chain_start(&chars, chars.len())?;

    let mut var_end = start;
    while var_end < chars.len() && is_ident_char(chars[var_end]) {
        var_end += 1;
    }
    let var: String = chars[start..var_end].iter().collect();
    let rest = &chars[var_end..];

    let (current_line, _) = line_column(text, text.len());
    let access_column = start + 1;
    let innermost_class = || enclosing_classes(text).pop();

    // `new Foo(...).`
    if rest.first() == Some(&'(') && preceded_by_new(&chars, start) {
        let after_call = skip_balanced_forward(&chars, var_end)?;
        return Some(TypeDefinition {
            line: current_line,
            column: access_column,
            typename: Some(var.clone()),
            var,
            tocomplete: chars[after_call..].iter().collect(),
        });
    }

    // `helper().` is a call on the enclosing class.
    if rest.first() == Some(&'(') {
        let chain: String = chars[start..].iter().collect();
        return Some(TypeDefinition {
            line: current_line,
            column: access_column,
            typename: innermost_class(),
            var: "this".to_string(),
            tocomplete: format!(".{}", chain),
        });
    }

    if var == "this" {
        return Some(TypeDefinition {
            line: current_line,
            column: access_column,
            typename: innermost_class(),
            var,
            tocomplete: rest.iter().collect(),
        });
    }

    // `parts[0].`: the element type is the declared type minus `[]`.
    let mut after_index = var_end;
    while chars.get(after_index) == Some(&'[') {
        after_index = skip_balanced_forward(&chars, after_index)?;
    }
    let tocomplete: String = chars[after_index..].iter().collect();
    if !tocomplete.starts_with('.') {
        return None;
    }

    match find_declaration(text, &var) {
        Some((typename, offset)) => {
            let (line, column) = line_column(text, offset);
            Some(TypeDefinition {
                line,
                column,
                typename: Some(typename),
                var,
                tocomplete,
            })
        }
        None => Some(TypeDefinition {
            line: current_line,
            column: access_column,
            typename: None,
            var,
            tocomplete,
        }),
    }
}
