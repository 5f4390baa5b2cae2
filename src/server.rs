/// LSP server trait implementation.
///
/// This module contains the `impl LanguageServer for Backend` block,
/// which handles all LSP protocol messages (initialize, didOpen, didChange,
/// didClose, didChangeConfiguration, completion).
use tower_lsp::LanguageServer;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

use crate::config::ConfigLayer;
use crate::{Backend, OpenDocument};

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .root_uri
            .as_ref()
            .and_then(|uri| uri.to_file_path().ok());
        if let Some(root) = workspace_root {
            *self.workspace_root.lock() = Some(root);
        }

        if let Some(layer) = params
            .initialization_options
            .as_ref()
            .and_then(ConfigLayer::from_json)
        {
            *self.client_layer.lock() = layer;
        }
        self.reload_config();

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![".".to_string()]),
                    ..CompletionOptions::default()
                }),
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: self.name.clone(),
                version: Some(self.version.clone()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let command = self.config.lock().oracle.command.clone();
        let message = match command {
            Some(command) => format!("{} initialized! Oracle command: {}", self.name, command),
            None => format!(
                "{} initialized without an oracle command; member completion is disabled",
                self.name
            ),
        };
        self.log(MessageType::INFO, message).await;
    }

    async fn shutdown(&self) -> Result<()> {
        let session = self.session.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || session.lock().shutdown()).await {
            tracing::warn!(error = %e, "oracle shutdown task failed");
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let uri = doc.uri.to_string();

        self.open_files.lock().insert(
            uri.clone(),
            OpenDocument {
                text: doc.text,
                language_id: doc.language_id,
            },
        );

        self.log(MessageType::INFO, format!("Opened file: {}", uri))
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.to_string();

        // Full sync: the last change carries the whole document.
        if let Some(change) = params.content_changes.into_iter().last()
            && let Some(doc) = self.open_files.lock().get_mut(&uri)
        {
            doc.text = change.text;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri.to_string();
        self.open_files.lock().remove(&uri);

        self.log(MessageType::INFO, format!("Closed file: {}", uri))
            .await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let Some(layer) = ConfigLayer::from_json(&params.settings) else {
            return;
        };
        *self.client_layer.lock() = layer;
        self.reload_config();

        self.log(MessageType::INFO, "Configuration reloaded".to_string())
            .await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        self.handle_completion(params).await
    }
}
