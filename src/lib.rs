//! DotCompleteLSP: type-aware member completion for package/import based
//! languages.
//!
//! Completing `a.b().c.` needs the absolute type of `a`, then the return
//! type of every segment of the chain.  Type knowledge lives in an
//! external *oracle* process that is driven over a line-based protocol on
//! its stdin/stdout; this crate does everything around it:
//!
//! - [`process`]: the persistent oracle process and its output queue
//! - [`oracle`]: typed `-findclass` / `-complete` / `-returntype` requests
//! - [`resolution`]: mapping a source type token to an absolute type
//! - [`chain`]: tokenizing and resolving member access chains
//! - [`completion`]: the per-request orchestration and the LSP handler
//! - [`subject_extraction`] / [`source_text`]: plain-text source scanning
//! - [`config`]: layered settings
//!
//! The [`Backend`] wires all of this into a `tower-lsp` language server.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tower_lsp::Client;

pub mod chain;
pub mod completion;
pub mod config;
pub mod error;
pub mod oracle;
pub mod process;
pub mod resolution;
mod server;
pub mod source_text;
pub mod subject_extraction;
pub mod types;
mod util;

pub use completion::{CompletionRequest, CompletionSession};
pub use config::{Config, ConfigLayer};
pub use error::OracleError;
pub use oracle::{Oracle, OracleClient};
pub use types::*;

/// The oracle type held by the server's session.
pub type DynOracle = Box<dyn Oracle + Send>;

/// An open document as last sent by the client.
#[derive(Debug, Clone)]
pub struct OpenDocument {
    pub text: String,
    pub language_id: String,
}

/// Sources of configuration that come from outside the workspace.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Overrides from command line flags, applied last.
    pub cli_layer: ConfigLayer,
    /// A config file named on the command line.
    pub config_path: Option<PathBuf>,
    /// Skip the user and workspace config files (tests).
    pub ignore_config_files: bool,
}

pub struct Backend {
    name: String,
    version: String,
    open_files: Arc<Mutex<HashMap<String, OpenDocument>>>,
    workspace_root: Arc<Mutex<Option<PathBuf>>>,
    /// Settings received from the client (`initializationOptions`,
    /// `didChangeConfiguration`).
    client_layer: Arc<Mutex<ConfigLayer>>,
    options: BackendOptions,
    config: Arc<Mutex<Config>>,
    /// Set when `config` changed and the session has not picked it up yet.
    config_pending: Arc<AtomicBool>,
    session: Arc<Mutex<CompletionSession<DynOracle>>>,
    client: Option<Client>,
}

impl Backend {
    pub fn new(client: Client, options: BackendOptions) -> Self {
        let mut backend = Self::with_oracle(
            Box::new(OracleClient::new(None, None)),
            options,
        );
        backend.client = Some(client);
        backend
    }

    /// A backend without a client connection and without config files,
    /// for tests.
    pub fn new_test() -> Self {
        Self::new_test_with_oracle(Box::new(OracleClient::new(None, None)), ConfigLayer::default())
    }

    /// A test backend using `oracle` and the settings in `layer`.
    pub fn new_test_with_oracle(oracle: DynOracle, layer: ConfigLayer) -> Self {
        Self::with_oracle(
            oracle,
            BackendOptions {
                cli_layer: layer,
                config_path: None,
                ignore_config_files: true,
            },
        )
    }

    fn with_oracle(oracle: DynOracle, options: BackendOptions) -> Self {
        let backend = Self {
            name: "DotCompleteLSP".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            open_files: Arc::new(Mutex::new(HashMap::new())),
            workspace_root: Arc::new(Mutex::new(None)),
            client_layer: Arc::new(Mutex::new(ConfigLayer::default())),
            options,
            config: Arc::new(Mutex::new(Config::default())),
            config_pending: Arc::new(AtomicBool::new(false)),
            session: Arc::new(Mutex::new(CompletionSession::new(oracle))),
            client: None,
        };
        backend.reload_config();
        backend
    }

    /// Rebuild the configuration from every layer.
    ///
    /// Never touches the session lock, which a running completion may hold
    /// for several oracle timeouts.  The session applies the new settings
    /// at the start of its next request (see [`Backend::config_sync`]).
    pub(crate) fn reload_config(&self) {
        let root = self.workspace_root.lock().clone();
        let mut config = if self.options.ignore_config_files {
            Config::default()
        } else {
            Config::load(root.as_deref(), self.options.config_path.as_deref())
        };
        config.apply(&self.client_layer.lock());
        config.apply(&self.options.cli_layer);
        if config.oracle.working_dir.is_none() {
            config.oracle.working_dir = root;
        }

        tracing::debug!(?config, "configuration loaded");
        *self.config.lock() = config;
        self.config_pending.store(true, Ordering::SeqCst);
    }

    /// Brings a locked session up to date with the latest configuration.
    /// Called on the blocking pool, right before a request is served.
    pub(crate) fn config_sync(
        &self,
    ) -> impl Fn(&mut CompletionSession<DynOracle>) + Send + 'static {
        let config = Arc::clone(&self.config);
        let pending = Arc::clone(&self.config_pending);
        move |session: &mut CompletionSession<DynOracle>| {
            if pending.swap(false, Ordering::SeqCst) {
                session.configure(&config.lock());
            }
        }
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> Config {
        self.config.lock().clone()
    }

    /// Public helper for tests: the stored text of an open document.
    pub fn document_text(&self, uri: &str) -> Option<String> {
        self.open_files.lock().get(uri).map(|d| d.text.clone())
    }
}
