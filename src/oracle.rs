/// Typed request/response operations on top of the oracle process.
///
/// The [`Oracle`] trait is the seam between type resolution and the
/// external process: the resolvers and the completion session only ever
/// talk to an `Oracle`, and [`OracleClient`] is the implementation that
/// drives a [`ProcessChannel`].
///
/// # Wire protocol
///
/// | Request                              | Payload                        |
/// |--------------------------------------|--------------------------------|
/// | `-findclass <type>`                  | import set, last line `;;--;;` |
/// | `-complete <absolute_type> <prefix>` | none                           |
/// | `-returntype <absolute_type> <seg>`  | none                           |
/// | `-quit`                              | none                           |
///
/// Every response is a run of lines terminated by a line equal to
/// `;;--;;`.  A read that waits longer than the configured timeout ends
/// the response with whatever has arrived so far.
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::OracleSettings;
use crate::error::OracleError;
use crate::process::ProcessChannel;
use crate::types::{AbsoluteType, CompletionCandidate, END_OF_RESPONSE, ImportSet, OracleCommand};

/// Default per-line read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Optional JVM array marker, then everything up to the first `;`.
static RETURN_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\[L)?([^;]+)").expect("valid return type regex"));

/// The three questions the completion engine asks its type oracle.
pub trait Oracle {
    /// Resolve a bare or partially qualified type token to its absolute
    /// name, searching `packages` in order.
    fn find_absolute_of_type(
        &mut self,
        packages: &ImportSet,
        type_token: &str,
    ) -> Result<Option<AbsoluteType>, OracleError>;

    /// List the members of `absolute_type` starting with `prefix`,
    /// de-duplicated and sorted by label.
    fn complete_class(
        &mut self,
        absolute_type: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionCandidate>, OracleError>;

    /// The absolute type produced by accessing `segment` (a field name or
    /// a method name) on `absolute_type`.
    fn get_return_type(
        &mut self,
        absolute_type: &str,
        segment: &str,
    ) -> Result<Option<AbsoluteType>, OracleError>;

    /// Apply changed oracle settings.  Takes effect on the next request.
    fn configure(&mut self, _settings: &OracleSettings) {}

    /// Stop any backing process.
    fn shutdown(&mut self) {}
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn find_absolute_of_type(
        &mut self,
        packages: &ImportSet,
        type_token: &str,
    ) -> Result<Option<AbsoluteType>, OracleError> {
        (**self).find_absolute_of_type(packages, type_token)
    }

    fn complete_class(
        &mut self,
        absolute_type: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionCandidate>, OracleError> {
        (**self).complete_class(absolute_type, prefix)
    }

    fn get_return_type(
        &mut self,
        absolute_type: &str,
        segment: &str,
    ) -> Result<Option<AbsoluteType>, OracleError> {
        (**self).get_return_type(absolute_type, segment)
    }

    fn configure(&mut self, settings: &OracleSettings) {
        (**self).configure(settings)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// [`Oracle`] backed by a persistent external process.
pub struct OracleClient {
    channel: ProcessChannel,
    launch_command: Option<String>,
    timeout: Duration,
}

impl OracleClient {
    pub fn new(launch_command: Option<String>, working_dir: Option<PathBuf>) -> Self {
        Self {
            channel: ProcessChannel::new(working_dir),
            launch_command,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn channel(&self) -> &ProcessChannel {
        &self.channel
    }

    /// Send one command and collect its response lines.
    ///
    /// Stops at the end-of-response sentinel or at the first read that
    /// times out; in the latter case the partial response is returned.
    pub fn request(
        &mut self,
        command: &OracleCommand,
        payload: Option<&str>,
    ) -> Result<Vec<String>, OracleError> {
        let launch_command = self.launch_command.as_deref().ok_or(OracleError::NoCommand)?;
        self.channel.ensure_process(launch_command)?;

        let line = command.to_line();
        debug!(request = line.as_str(), "oracle request");
        self.channel.send(&line, payload)?;

        let mut response = Vec::new();
        loop {
            match self.channel.receive(self.timeout) {
                Some(read) if read == END_OF_RESPONSE => break,
                Some(read) => response.push(read),
                None => {
                    warn!(
                        request = line.as_str(),
                        lines = response.len(),
                        "oracle response timed out"
                    );
                    break;
                }
            }
        }
        Ok(response)
    }
}

impl Oracle for OracleClient {
    fn find_absolute_of_type(
        &mut self,
        packages: &ImportSet,
        type_token: &str,
    ) -> Result<Option<AbsoluteType>, OracleError> {
        let command = OracleCommand::FindClass {
            type_token: type_token.to_string(),
        };
        let response = self.request(&command, Some(&packages.to_payload()))?;
        let joined = response.join("\n");
        let absolute = joined.trim();
        Ok((!absolute.is_empty()).then(|| absolute.to_string()))
    }

    fn complete_class(
        &mut self,
        absolute_type: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionCandidate>, OracleError> {
        let command = OracleCommand::Complete {
            absolute_type: absolute_type.to_string(),
            prefix: prefix.to_string(),
        };
        let response = self.request(&command, None)?;
        Ok(parse_candidates(&response))
    }

    fn get_return_type(
        &mut self,
        absolute_type: &str,
        segment: &str,
    ) -> Result<Option<AbsoluteType>, OracleError> {
        let command = OracleCommand::ReturnType {
            absolute_type: absolute_type.to_string(),
            segment: segment.to_string(),
        };
        let response = self.request(&command, None)?;
        Ok(parse_return_type(&response.join("\n")))
    }

    fn configure(&mut self, settings: &OracleSettings) {
        self.launch_command = settings.command.clone();
        self.channel.set_working_dir(settings.working_dir.clone());
        self.timeout = settings.timeout;
    }

    fn shutdown(&mut self) {
        self.channel.shutdown();
    }
}

/// Turn `-complete` response lines into candidates.
///
/// The first occurrence of a label wins; the result is sorted ascending by
/// label, keeping oracle order between equal labels.
pub fn parse_candidates(lines: &[String]) -> Vec<CompletionCandidate> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<CompletionCandidate> = lines
        .iter()
        .map(|line| CompletionCandidate::from_line(line))
        .filter(|candidate| seen.insert(candidate.label.clone()))
        .collect();
    candidates.sort_by(|a, b| a.label.cmp(&b.label));
    candidates
}

/// Extract the type name from a `-returntype` response.
///
/// `[Ljava.lang.String;` (an object array) yields `java.lang.String`;
/// plain names pass through trimmed.  Blank output is unresolved.
pub fn parse_return_type(raw: &str) -> Option<AbsoluteType> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match RETURN_TYPE_RE.captures(raw).and_then(|c| c.get(2)) {
        Some(name) => Some(name.as_str().to_string()),
        None => Some(raw.to_string()),
    }
}
