/// Errors raised while talking to the completion oracle process.
///
/// None of these cross the completion boundary: the orchestrator logs them
/// and answers with an empty candidate list.
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// No launch command is configured, so there is nothing to spawn.
    #[error("no oracle command configured")]
    NoCommand,

    /// The oracle process could not be started.
    #[error("failed to spawn oracle `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The spawned process did not expose a piped stdin/stdout.
    #[error("oracle `{0}` has no {1} pipe")]
    MissingPipe(String, &'static str),

    /// Writing a request to the oracle's stdin failed.
    #[error("failed to write to oracle: {0}")]
    Write(#[from] io::Error),

    /// A request was issued while no process is active.
    #[error("oracle process is not running")]
    NotRunning,
}
