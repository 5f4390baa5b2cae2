//! Data types used throughout the DotCompleteLSP server.
//!
//! This module contains the "model" structs shared by the oracle protocol,
//! the type resolver, the chain resolver and the completion orchestrator:
//! wire sentinels, the ordered import search list, completion candidates,
//! chain segments and the parsed type definition of a member access.

/// A fully-qualified type name such as `java.util.Map$Entry`.
///
/// `.` separates packages, `$` separates nested classes.  An unresolved
/// type is represented by `None` at the API level, never by an empty
/// string.
pub type AbsoluteType = String;

/// Line that terminates every oracle response.  Also used as the field
/// separator inside completion candidate lines and as the terminator of a
/// `-findclass` payload.
pub const END_OF_RESPONSE: &str = ";;--;;";

/// Line pushed by the background reader after the oracle process exited.
/// Always preceded by [`END_OF_RESPONSE`].
pub const PROCESS_EXIT: &str = ";;--;;exit;;--;;";

/// Nested-class separator used in absolute type names.
pub const NESTED_SEPARATOR: char = '$';

/// One request line of the oracle wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleCommand {
    /// `-findclass <type_token>`, followed by an [`ImportSet`] payload.
    FindClass { type_token: String },
    /// `-complete <absolute_type> <prefix>`.
    Complete {
        absolute_type: AbsoluteType,
        prefix: String,
    },
    /// `-returntype <absolute_type> <segment>`.
    ReturnType {
        absolute_type: AbsoluteType,
        segment: String,
    },
    /// `-quit`.
    Quit,
}

impl OracleCommand {
    /// Render the command as the single line written to the oracle's stdin
    /// (without the trailing newline).
    pub fn to_line(&self) -> String {
        match self {
            OracleCommand::FindClass { type_token } => format!("-findclass {}", type_token),
            OracleCommand::Complete {
                absolute_type,
                prefix,
            } => format!("-complete {} {}", absolute_type, prefix),
            OracleCommand::ReturnType {
                absolute_type,
                segment,
            } => format!("-returntype {} {}", absolute_type, segment),
            OracleCommand::Quit => "-quit".to_string(),
        }
    }
}

/// Ordered list of package / type search roots handed to `-findclass`.
///
/// Built by the type resolver from the file's `import` statements plus the
/// implicit fallbacks.  The final entry is always [`END_OF_RESPONSE`] once
/// the set is [`terminated`](ImportSet::terminate).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    entries: Vec<String>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the lowest priority.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// Insert an entry at `index` (0 is the highest priority).
    pub fn insert(&mut self, index: usize, entry: impl Into<String>) {
        self.entries.insert(index, entry.into());
    }

    /// Append the request terminator sentinel.
    pub fn terminate(&mut self) {
        self.entries.push(END_OF_RESPONSE.to_string());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// The newline-joined payload written after a `-findclass` line.
    pub fn to_payload(&self) -> String {
        self.entries.join("\n")
    }
}

/// A single completion candidate returned by `-complete`.
///
/// The oracle emits one candidate per line as `label;;--;;insert_text`.
/// The label follows the `name\tdescription` convention; the insert text
/// may contain `${1:placeholder}` snippet markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    /// First field; the sort and de-duplication key.
    pub label: String,
    /// Second field.  Falls back to the bare name when the oracle sent a
    /// single field.
    pub insert_text: String,
}

impl CompletionCandidate {
    /// Parse one response line.  Fields beyond the second are ignored.
    pub fn from_line(line: &str) -> Self {
        let mut fields = line.split(END_OF_RESPONSE);
        let label = fields.next().unwrap_or_default().to_string();
        let insert_text = match fields.next() {
            Some(text) => text.to_string(),
            None => label.split('\t').next().unwrap_or_default().to_string(),
        };
        Self { label, insert_text }
    }

    /// The member name part of the label (before any `\t`).
    pub fn name(&self) -> &str {
        self.label.split('\t').next().unwrap_or(&self.label)
    }

    /// The description part of the label (after the first `\t`), if any.
    pub fn description(&self) -> Option<&str> {
        self.label.split_once('\t').map(|(_, d)| d)
    }

    /// Whether the insert text carries snippet placeholders.
    pub fn is_snippet(&self) -> bool {
        self.insert_text.contains("${")
    }
}

/// One dot-delimited unit of a member access chain, e.g. `get(a.b)` in
/// `list.get(a.b).size()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSegment {
    /// The member name with any call arguments stripped (`get`).
    pub name: String,
    /// The raw argument text between the outermost parentheses, if the
    /// segment is a call (`a.b`).
    pub arguments: Option<String>,
    /// The full source text of the segment (`get(a.b)`).
    pub text: String,
}

impl ChainSegment {
    pub fn is_call(&self) -> bool {
        self.arguments.is_some()
    }
}

/// Structured result of the type-definition parser for a member access.
///
/// For `    foo.bar().` where `foo` was declared as `List<String> foo`,
/// `typename` is `Some("List<String>")`, `var` is `"foo"` and `tocomplete`
/// is `".bar()."`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// 1-based line of the declaration, or of the access when the variable
    /// has no declaration.
    pub line: usize,
    /// 1-based column of the declaration.
    pub column: usize,
    /// Declared type of `var`, including generic / array decoration.
    /// `None` for static access on a bare type name (`System.`).
    pub typename: Option<String>,
    /// The leading identifier of the access chain.
    pub var: String,
    /// Everything after `var`, starting with its dot and ending with the
    /// trailing dot the caret follows.
    pub tocomplete: String,
}
