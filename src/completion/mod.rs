/// Completion-related modules.
///
/// This sub-module groups all completion logic:
/// - **session** (this file): the per-request orchestration that turns the
///   text before the caret into oracle candidates
/// - **builder**: Building LSP `CompletionItem`s from oracle candidates
/// - **handler**: The LSP entry point (`Backend::handle_completion`)
pub mod builder;
pub mod handler;

use std::time::Instant;

use tracing::{debug, warn};

use crate::chain::resolve_chain;
use crate::config::Config;
use crate::error::OracleError;
use crate::oracle::Oracle;
use crate::resolution::{resolve_absolute_type, strip_type_decoration};
use crate::subject_extraction::{DefinitionParser, SourceParser};
use crate::types::CompletionCandidate;

/// Everything one completion request needs from the editor.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// The document from its start up to the caret.
    pub text_before_caret: &'a str,
    /// The whole document.
    pub full_text: &'a str,
    /// Identifier characters typed immediately before the caret.
    pub prefix: &'a str,
}

impl<'a> CompletionRequest<'a> {
    /// The current line up to the caret.
    pub fn line(&self) -> &'a str {
        let text = self.text_before_caret;
        match text.rfind('\n') {
            Some(nl) => &text[nl + 1..],
            None => text,
        }
    }

    /// The current line up to the caret, without the typed prefix.
    pub fn before_prefix(&self) -> &'a str {
        let line = self.line();
        line.strip_suffix(self.prefix).unwrap_or(line)
    }
}

/// Owns the oracle and drives type resolution for completion requests.
///
/// Requests are handled one at a time (`&mut self`); callers sharing a
/// session must serialize access.
pub struct CompletionSession<O: Oracle> {
    oracle: O,
    parser: Box<dyn DefinitionParser + Send>,
    builtin_package: String,
}

impl<O: Oracle> CompletionSession<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            parser: Box::new(SourceParser),
            builtin_package: Config::default().resolution.builtin_package,
        }
    }

    /// Replace the type-definition parser.
    pub fn with_parser(mut self, parser: impl DefinitionParser + Send + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Apply a (re)loaded configuration.
    pub fn configure(&mut self, config: &Config) {
        self.builtin_package = config.resolution.builtin_package.clone();
        self.oracle.configure(&config.oracle);
    }

    /// Quit the oracle process, if one is running.
    pub fn shutdown(&mut self) {
        self.oracle.shutdown();
    }

    /// Produce member completion candidates for `request`.
    ///
    /// Only a line ending in `.` (after removing the typed prefix) asks
    /// for member completion.  Every failure, from an unparsable access to
    /// a dead oracle, yields an empty list.
    pub fn complete(&mut self, request: &CompletionRequest<'_>) -> Vec<CompletionCandidate> {
        let started = Instant::now();
        let result = self.complete_members(request);
        debug!(
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "completion request finished"
        );
        match result {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "member completion failed");
                Vec::new()
            }
        }
    }

    fn complete_members(
        &mut self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<CompletionCandidate>, OracleError> {
        let before = request.before_prefix();
        if before.ends_with([' ', '\t']) || !before.ends_with('.') {
            return Ok(Vec::new());
        }

        let Some(definition) = self
            .parser
            .type_definition(request.text_before_caret, before)
        else {
            debug!(line = before, "no member access found");
            return Ok(Vec::new());
        };

        // A bare name such as `System.` is a static access on a type.
        let typename = definition.typename.unwrap_or(definition.var);
        let typename = strip_type_decoration(&typename);

        let Some(absolute) = resolve_absolute_type(
            &mut self.oracle,
            &self.builtin_package,
            request.text_before_caret,
            request.full_text,
            &typename,
        )?
        else {
            debug!(typename = typename.as_str(), "type is unresolved");
            return Ok(Vec::new());
        };
        debug!(absolute = absolute.as_str(), "absolute type");

        let chain = definition
            .tocomplete
            .strip_prefix('.')
            .unwrap_or(&definition.tocomplete);
        let Some(target) = resolve_chain(&mut self.oracle, absolute, chain)? else {
            return Ok(Vec::new());
        };

        debug!("completing {}.{}", target, request.prefix);
        let started = Instant::now();
        let candidates = self.oracle.complete_class(&target, request.prefix)?;
        debug!(
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            candidates = candidates.len(),
            "class completion"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line_and_prefix() {
        let request = CompletionRequest {
            text_before_caret: "class A {\n    foo.ba",
            full_text: "class A {\n    foo.bar\n}",
            prefix: "ba",
        };
        assert_eq!(request.line(), "    foo.ba");
        assert_eq!(request.before_prefix(), "    foo.");
    }

    #[test]
    fn test_request_single_line() {
        let request = CompletionRequest {
            text_before_caret: "x.",
            full_text: "x.",
            prefix: "",
        };
        assert_eq!(request.line(), "x.");
        assert_eq!(request.before_prefix(), "x.");
    }
}
