/// Completion request handling.
///
/// This module contains the `handle_completion` method called by
/// `LanguageServer::completion`.  It gathers the editor-side inputs
/// (document text, caret offset, typed prefix), applies the cheap
/// applicability checks, and runs the blocking completion session on the
/// blocking thread pool.
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{debug, warn};

use crate::Backend;
use crate::completion::CompletionRequest;
use crate::completion::builder::build_completion_items;
use crate::util::{is_in_code, is_member_access_trigger, position_to_offset, typed_prefix};

impl Backend {
    /// Main completion handler.
    ///
    /// Returns `Ok(None)` whenever member completion does not apply, so
    /// the client falls back to its own word completion.
    pub(crate) async fn handle_completion(
        &self,
        params: CompletionParams,
    ) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri.to_string();
        let position = params.text_document_position.position;

        let Some(document) = self.open_files.lock().get(&uri).cloned() else {
            return Ok(None);
        };

        if !self.config.lock().supports_language(&document.language_id) {
            return Ok(None);
        }

        let offset = position_to_offset(&document.text, position);
        let text_before_caret = &document.text[..offset];

        // ── Suppress completion inside comments and literals ────────
        if !is_in_code(text_before_caret) {
            return Ok(None);
        }

        let prefix = typed_prefix(text_before_caret).to_string();

        // ── Typed `.` that does not follow a member access ──────────
        let typed_dot = params
            .context
            .as_ref()
            .and_then(|c| c.trigger_character.as_deref())
            == Some(".");
        if typed_dot {
            let line_start = text_before_caret.rfind('\n').map(|i| i + 1).unwrap_or(0);
            if !is_member_access_trigger(&text_before_caret[line_start..]) {
                return Ok(None);
            }
        }

        let session = self.session.clone();
        let sync_config = self.config_sync();
        let text = document.text.clone();
        let candidates = tokio::task::spawn_blocking(move || {
            let request = CompletionRequest {
                text_before_caret: &text[..offset],
                full_text: &text,
                prefix: &prefix,
            };
            let mut session = session.lock();
            sync_config(&mut *session);
            session.complete(&request)
        })
        .await;

        let candidates = match candidates {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "completion task failed");
                return Ok(None);
            }
        };

        debug!(uri = uri.as_str(), count = candidates.len(), "member completion");
        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(CompletionResponse::Array(build_completion_items(
            &candidates,
        ))))
    }
}
