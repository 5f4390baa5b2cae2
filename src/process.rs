/// Persistent oracle process management.
///
/// This module owns the external completion oracle: spawning it through
/// the platform shell, writing request lines to its stdin, and collecting
/// its stdout through a background reader thread that forwards every
/// non-empty line into a FIFO queue owned by that process's handle.
///
/// # Lifecycle
///
/// ```text
/// ensure_process(cmd)
///   ├── same cmd, reader alive  → reuse (stale lines discarded)
///   └── otherwise               → retire old (quit + drain to exit
///                                  sentinel), spawn new + reader thread
/// ```
///
/// When the reader observes end of output it pushes [`END_OF_RESPONSE`]
/// followed by [`PROCESS_EXIT`], exactly once, so a requester blocked on
/// the queue always wakes up.
///
/// Every process gets its own queue.  Once a handle is retired its
/// receiver is dropped, so output from a process that outlives its drain
/// can never reach the requester of the next one.
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::OracleError;
use crate::types::{END_OF_RESPONSE, OracleCommand, PROCESS_EXIT};

/// How long a retired process gets to answer `-quit` before it is killed.
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// The active oracle process plus the exact command used to launch it.
struct ProcessHandle {
    child: Child,
    stdin: ChildStdin,
    launch_command: String,
    /// Cleared by the reader thread once stdout reaches end of file.
    running: Arc<AtomicBool>,
    /// Set once the requester has popped this process's exit sentinel.
    exit_seen: bool,
    /// Lines forwarded by this process's reader thread.
    queue: Receiver<String>,
    reader: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    fn is_alive(&self) -> bool {
        !self.exit_seen && self.running.load(Ordering::SeqCst)
    }

    fn note_line(&mut self, line: &str) {
        if line == PROCESS_EXIT {
            self.exit_seen = true;
        }
    }
}

/// Line-oriented channel to a single oracle process at a time.
pub struct ProcessChannel {
    working_dir: Option<PathBuf>,
    active: Option<ProcessHandle>,
    drain_grace: Duration,
}

impl ProcessChannel {
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        Self {
            working_dir,
            active: None,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    /// Override how long a replaced process may take to exit after `-quit`.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Directory new processes are started in.  Does not affect a process
    /// that is already running.
    pub fn set_working_dir(&mut self, dir: Option<PathBuf>) {
        self.working_dir = dir;
    }

    /// The launch command of the active process, if any.
    pub fn launch_command(&self) -> Option<&str> {
        self.active.as_ref().map(|h| h.launch_command.as_str())
    }

    /// Whether a process is active and its output is still open.
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(ProcessHandle::is_alive)
    }

    /// Make sure a process launched with `launch_command` is running.
    ///
    /// A live process started with the same command is reused.  Otherwise
    /// the current process (if any) is sent `-quit` and its output drained
    /// up to the exit sentinel before the replacement is spawned.
    pub fn ensure_process(&mut self, launch_command: &str) -> Result<(), OracleError> {
        if launch_command.trim().is_empty() {
            return Err(OracleError::NoCommand);
        }

        if let Some(handle) = &self.active
            && handle.launch_command == launch_command
            && handle.is_alive()
        {
            self.discard_stale();
            if self.is_running() {
                return Ok(());
            }
        }

        if let Some(old) = self.active.take() {
            self.retire(old);
        }

        self.spawn(launch_command)
    }

    /// Write `command` and, when present, `payload` to the process, each
    /// followed by a newline.
    pub fn send(&mut self, command: &str, payload: Option<&str>) -> Result<(), OracleError> {
        let handle = self.active.as_mut().ok_or(OracleError::NotRunning)?;
        writeln!(handle.stdin, "{}", command)?;
        if let Some(payload) = payload {
            writeln!(handle.stdin, "{}", payload)?;
        }
        handle.stdin.flush()?;
        Ok(())
    }

    /// Pop one line from the active process's queue, waiting at most
    /// `timeout`.
    ///
    /// Returns `None` when nothing arrived in time or no process is active.
    pub fn receive(&mut self, timeout: Duration) -> Option<String> {
        let handle = self.active.as_mut()?;
        match handle.queue.recv_timeout(timeout) {
            Ok(line) => {
                handle.note_line(&line);
                Some(line)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Quit and drain the active process, if any.
    pub fn shutdown(&mut self) {
        if let Some(old) = self.active.take() {
            self.retire(old);
        }
    }

    /// Drop lines left behind by an earlier request that timed out.
    fn discard_stale(&mut self) {
        let Some(handle) = self.active.as_mut() else {
            return;
        };
        let mut discarded = 0usize;
        loop {
            match handle.queue.try_recv() {
                Ok(line) => {
                    handle.note_line(&line);
                    discarded += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if discarded > 0 {
            debug!(discarded, "discarded stale oracle output");
        }
    }

    fn spawn(&mut self, launch_command: &str) -> Result<(), OracleError> {
        let mut command = shell_command(launch_command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| OracleError::Spawn {
            command: launch_command.to_string(),
            source,
        })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            (stdin, _) => {
                let pipe = if stdin.is_none() { "stdin" } else { "stdout" };
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::MissingPipe(launch_command.to_string(), pipe));
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let (sender, queue) = mpsc::channel();
        let reader = match spawn_reader(stdout, sender, Arc::clone(&running)) {
            Ok(reader) => reader,
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::Spawn {
                    command: launch_command.to_string(),
                    source,
                });
            }
        };

        info!(command = launch_command, pid = child.id(), "started oracle process");

        self.active = Some(ProcessHandle {
            child,
            stdin,
            launch_command: launch_command.to_string(),
            running,
            exit_seen: false,
            queue,
            reader: Some(reader),
        });
        Ok(())
    }

    /// Send `-quit` to `old` and consume its queue until the exit sentinel.
    fn retire(&self, mut old: ProcessHandle) {
        if !old.exit_seen {
            if old.running.load(Ordering::SeqCst) {
                let _ = writeln!(old.stdin, "{}", OracleCommand::Quit.to_line());
                let _ = old.stdin.flush();
            }
            if !drain_until_exit(&old.queue, self.drain_grace) {
                warn!(
                    command = old.launch_command.as_str(),
                    "oracle did not exit after quit, killing it"
                );
                let _ = old.child.kill();
                if !drain_until_exit(&old.queue, self.drain_grace) {
                    warn!(
                        command = old.launch_command.as_str(),
                        "no exit sentinel from killed oracle"
                    );
                }
            }
        }

        drop(old.stdin);
        match old.child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                let _ = old.child.kill();
                let _ = old.child.wait();
            }
        }
        if let Some(reader) = old.reader.take() {
            if reader.is_finished() {
                let _ = reader.join();
            } else {
                debug!(
                    command = old.launch_command.as_str(),
                    "oracle output still open, detaching its reader thread"
                );
            }
        }
        info!(command = old.launch_command.as_str(), "stopped oracle process");
    }

}

/// Block on `queue` until the exit sentinel shows up or `grace` runs out.
/// Everything popped on the way is discarded.
fn drain_until_exit(queue: &Receiver<String>, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match queue.recv_timeout(remaining) {
            Ok(line) if line == PROCESS_EXIT => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if let Some(mut handle) = self.active.take() {
            let _ = writeln!(handle.stdin, "{}", OracleCommand::Quit.to_line());
            let _ = handle.stdin.flush();
            let _ = handle.child.kill();
            let _ = handle.child.wait();
        }
    }
}

/// Forward every non-empty, trimmed stdout line into the queue until the
/// stream closes, then push the two sentinels.  Stops early once the
/// receiving handle has been dropped.
fn spawn_reader(
    stdout: ChildStdout,
    sender: Sender<String>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("oracle-reader".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if sender.send(line.to_string()).is_err() {
                    break;
                }
            }
            running.store(false, Ordering::SeqCst);
            let _ = sender.send(END_OF_RESPONSE.to_string());
            let _ = sender.send(PROCESS_EXIT.to_string());
            debug!("oracle output closed");
        })
}

#[cfg(not(windows))]
fn shell_command(launch_command: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(launch_command);
    command
}

#[cfg(windows)]
fn shell_command(launch_command: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(launch_command);
    command
}
