#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dotcomplete_lsp::oracle::parse_candidates;
use dotcomplete_lsp::{
    AbsoluteType, Backend, CompletionCandidate, ConfigLayer, ImportSet, Oracle, OracleError,
};
use parking_lot::Mutex;
use tower_lsp::LanguageServer;
use tower_lsp::lsp_types::*;

/// Marks the caret in test sources.
pub const CARET: &str = "<|>";

// ─── Scripted oracle ────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    classes: HashMap<String, AbsoluteType>,
    members: HashMap<AbsoluteType, Vec<String>>,
    returns: HashMap<(AbsoluteType, String), String>,
    calls: Vec<String>,
    import_sets: Vec<Vec<String>>,
    delay: Duration,
}

/// In-memory [`Oracle`] with canned answers.  Clones share the script, so
/// a test can keep one handle and give the other to a session.
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `-findclass token` answers `absolute`.
    pub fn with_class(self, token: &str, absolute: &str) -> Self {
        self.script
            .lock()
            .classes
            .insert(token.to_string(), absolute.to_string());
        self
    }

    /// Raw `-complete` lines for `absolute`, in the order the oracle
    /// would print them.
    pub fn with_members(self, absolute: &str, lines: &[&str]) -> Self {
        self.script.lock().members.insert(
            absolute.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Raw `-returntype absolute segment` answer.
    pub fn with_return(self, absolute: &str, segment: &str, raw: &str) -> Self {
        self.script.lock().returns.insert(
            (absolute.to_string(), segment.to_string()),
            raw.to_string(),
        );
        self
    }

    /// Sleep this long before answering `-findclass`, like a slow oracle.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.script.lock().delay = delay;
        self
    }

    /// Every request so far, as the command line the real oracle would see.
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().calls.clone()
    }

    /// The import set sent with the most recent `-findclass`.
    pub fn last_import_set(&self) -> Option<Vec<String>> {
        self.script.lock().import_sets.last().cloned()
    }
}

impl Oracle for ScriptedOracle {
    fn find_absolute_of_type(
        &mut self,
        packages: &ImportSet,
        type_token: &str,
    ) -> Result<Option<AbsoluteType>, OracleError> {
        let delay = self.script.lock().delay;
        std::thread::sleep(delay);
        let mut script = self.script.lock();
        script.calls.push(format!("-findclass {}", type_token));
        script.import_sets.push(packages.entries().to_vec());
        Ok(script.classes.get(type_token).cloned())
    }

    fn complete_class(
        &mut self,
        absolute_type: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionCandidate>, OracleError> {
        let mut script = self.script.lock();
        script
            .calls
            .push(format!("-complete {} {}", absolute_type, prefix));
        let lines: Vec<String> = script
            .members
            .get(absolute_type)
            .map(|lines| {
                lines
                    .iter()
                    .filter(|l| l.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(parse_candidates(&lines))
    }

    fn get_return_type(
        &mut self,
        absolute_type: &str,
        segment: &str,
    ) -> Result<Option<AbsoluteType>, OracleError> {
        let mut script = self.script.lock();
        script
            .calls
            .push(format!("-returntype {} {}", absolute_type, segment));
        let raw = script
            .returns
            .get(&(absolute_type.to_string(), segment.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(dotcomplete_lsp::oracle::parse_return_type(&raw))
    }
}

/// Oracle that fails every request, as a dead or missing process would.
pub struct FailingOracle;

impl Oracle for FailingOracle {
    fn find_absolute_of_type(
        &mut self,
        _: &ImportSet,
        _: &str,
    ) -> Result<Option<AbsoluteType>, OracleError> {
        Err(OracleError::NotRunning)
    }

    fn complete_class(&mut self, _: &str, _: &str) -> Result<Vec<CompletionCandidate>, OracleError> {
        Err(OracleError::NotRunning)
    }

    fn get_return_type(&mut self, _: &str, _: &str) -> Result<Option<AbsoluteType>, OracleError> {
        Err(OracleError::NotRunning)
    }
}

/// Split a source containing [`CARET`] into the text before the caret and
/// the full text without the marker.
pub fn at_caret(source: &str) -> (String, String) {
    let offset = source.find(CARET).expect("source has a caret marker");
    let full = source.replacen(CARET, "", 1);
    (full[..offset].to_string(), full)
}

// ─── Shell oracle ───────────────────────────────────────────────────────────

/// A small oracle speaking the real line protocol.  Knows `String`,
/// `StringBuilder` and `List`; every command line is appended to the log
/// file given as its first argument.
pub const FAKE_ORACLE: &str = r#"#!/bin/sh
log=$1
note() { [ -n "$log" ] && echo "$1" >> "$log"; }
note "start"

emit() {
    case "$1" in
        "$prefix"*) printf '%s\t%s;;--;;%s\n' "$1" "$2" "$3" ;;
    esac
}

while IFS= read -r line; do
    note "$line"
    case "$line" in
        -findclass\ *)
            token=${line#-findclass }
            while IFS= read -r entry; do
                note "$entry"
                [ "$entry" = ";;--;;" ] && break
            done
            case "$token" in
                String) echo "java.lang.String" ;;
                StringBuilder) echo "java.lang.StringBuilder" ;;
                List) echo "java.util.List" ;;
            esac
            echo ";;--;;"
            ;;
        -complete\ *)
            set -- ${line#-complete }
            type=$1
            prefix=$2
            case "$type" in
                java.lang.String)
                    emit "length()" "int" "length()"
                    emit "substring(int)" "String" 'substring(${1:int})'
                    emit "isEmpty()" "boolean" "isEmpty()"
                    emit "length()" "int" "length()"
                    ;;
                java.lang.StringBuilder)
                    emit "append(String)" "StringBuilder" 'append(${1:String})'
                    emit "reverse()" "StringBuilder" "reverse()"
                    ;;
            esac
            echo ";;--;;"
            ;;
        -returntype\ *)
            set -- ${line#-returntype }
            case "$1 $2" in
                "java.lang.String trim") echo "java.lang.String" ;;
                "java.lang.String split") echo "[Ljava.lang.String;" ;;
                "java.lang.StringBuilder append") echo "java.lang.StringBuilder" ;;
                "java.lang.StringBuilder toString") echo "java.lang.String" ;;
            esac
            echo ";;--;;"
            ;;
        -quit)
            exit 0
            ;;
    esac
done
"#;

/// Write `body` as an executable-by-`sh` script inside `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("failed to write oracle script");
    path
}

/// The launch command for `script`, logging to `log` when given.
pub fn launch_command(script: &Path, log: Option<&Path>) -> String {
    match log {
        Some(log) => format!("exec sh '{}' '{}'", script.display(), log.display()),
        None => format!("exec sh '{}'", script.display()),
    }
}

/// Lines the script logged so far.
pub fn read_log(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

// ─── LSP helpers ────────────────────────────────────────────────────────────

pub fn create_test_backend() -> Backend {
    Backend::new_test()
}

/// A backend whose session uses `oracle`.
pub fn create_scripted_backend(oracle: &ScriptedOracle) -> Backend {
    Backend::new_test_with_oracle(Box::new(oracle.clone()), ConfigLayer::default())
}

pub async fn open_document(backend: &Backend, uri: &Url, language_id: &str, text: &str) {
    let params = DidOpenTextDocumentParams {
        text_document: TextDocumentItem {
            uri: uri.clone(),
            language_id: language_id.to_string(),
            version: 1,
            text: text.to_string(),
        },
    };
    backend.did_open(params).await;
}

/// Request completion at `position`.  `trigger` is the character the
/// client reports as having triggered the request.
pub async fn complete_at(
    backend: &Backend,
    uri: &Url,
    position: Position,
    trigger: Option<&str>,
) -> Option<Vec<CompletionItem>> {
    let params = CompletionParams {
        text_document_position: TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position,
        },
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
        context: Some(CompletionContext {
            trigger_kind: if trigger.is_some() {
                CompletionTriggerKind::TRIGGER_CHARACTER
            } else {
                CompletionTriggerKind::INVOKED
            },
            trigger_character: trigger.map(str::to_string),
        }),
    };

    match backend.completion(params).await.unwrap() {
        Some(CompletionResponse::Array(items)) => Some(items),
        Some(CompletionResponse::List(list)) => Some(list.items),
        None => None,
    }
}

/// The LSP position of [`CARET`] in `source`.
pub fn caret_position(source: &str) -> Position {
    let offset = source.find(CARET).expect("source has a caret marker");
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32;
    let column = before
        .rfind('\n')
        .map(|nl| &before[nl + 1..])
        .unwrap_or(before)
        .chars()
        .count() as u32;
    Position::new(line, column)
}

/// Open `source` (with a caret marker) and complete at the caret.
pub async fn complete_source(
    backend: &Backend,
    uri: &Url,
    language_id: &str,
    source: &str,
    trigger: Option<&str>,
) -> Option<Vec<CompletionItem>> {
    let position = caret_position(source);
    let text = source.replacen(CARET, "", 1);
    open_document(backend, uri, language_id, &text).await;
    complete_at(backend, uri, position, trigger).await
}

pub fn labels(items: &[CompletionItem]) -> Vec<&str> {
    items.iter().map(|i| i.label.as_str()).collect()
}
