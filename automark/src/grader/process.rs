//! Running external tools under a time limit.

use super::outcome::AdapterError;
use crate::input;
use log::{debug, info, warn};
use std::{
    io::{self, Read, Write},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver},
    thread,
    time::{Duration, Instant},
};
use wait_timeout::ChildExt;

/// Minimum time left to drain output once the program has exited.
const READER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// stdout followed by stderr, the way a terminal would have shown them.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !text.is_empty() && !text.ends_with('\n') && !self.stderr.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Locates `name`, or fails with [`AdapterError::ToolNotFound`].
pub fn find_tool(name: &str, search_paths: &[PathBuf]) -> Result<PathBuf, AdapterError> {
    input::find_executable(name, search_paths).ok_or_else(|| {
        warn!("❌ Tool '{name}' not found");
        AdapterError::ToolNotFound(name.to_string())
    })
}

/// Runs `cmd` to completion, feeding it `stdin` and capturing both output streams.
///
/// The child runs in its own process group. When `timeout` elapses the whole group is killed
/// and [`AdapterError::Timeout`] carries `timeout` itself. The group is also killed once the
/// child exits, so background processes it started never outlive the call.
pub fn run(
    mut cmd: Command,
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<CapturedOutput, AdapterError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!("Configuring command '{program}'");
    debug!("- Adding args: '{:?}'", cmd.get_args().collect::<Vec<_>>());
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    info!("🔄 Running '{program}'");
    let mut child = cmd.spawn().map_err(|err| {
        debug!("💥 Error: '{err:?}'");
        if err.kind() == io::ErrorKind::NotFound {
            AdapterError::ToolNotFound(program.clone())
        } else {
            AdapterError::Io(err)
        }
    })?;

    if let Some(content) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        debug!("📝 stdin: '{}'", content.replace('\n', "\\n"));
        let content = content.to_string();
        // A program that never reads its input closes the pipe; that is not an error.
        thread::spawn(move || pipe.write_all(content.as_bytes()));
    }

    let started = Instant::now();
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!("⏱️  '{program}' exceeded {timeout:?}, killing it");
            kill_group(&mut child);
            child.wait()?;
            // Readers are left detached: a grandchild may still hold the pipes open.
            return Err(AdapterError::Timeout(timeout));
        }
        Err(err) => {
            warn!("💥 Waiting for '{program}' failed: {err}");
            kill_group(&mut child);
            let _ = child.wait();
            return Err(AdapterError::Io(err));
        }
    };
    // Whatever the program left running in the background goes with it.
    signal_group(&child);

    let grace = timeout.saturating_sub(started.elapsed()).max(READER_GRACE);
    let deadline = Instant::now().checked_add(grace);
    let output = CapturedOutput {
        status,
        stdout: collect(stdout, deadline),
        stderr: collect(stderr, deadline),
    };
    if !output.stdout.is_empty() {
        debug!("- STDOUT: '{}'", output.stdout.replace('\n', "\\n"));
    }
    if !output.stderr.is_empty() {
        debug!("- STDERR: '{}'", output.stderr.replace('\n', "\\n"));
    }
    debug!("- STATUS: {status}");
    Ok(output)
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            let _ = sender.send(buffer);
        });
        receiver
    })
}

/// Waits for a reader until `deadline`; `None` means no deadline.
fn collect(receiver: Option<Receiver<Vec<u8>>>, deadline: Option<Instant>) -> String {
    let Some(receiver) = receiver else {
        return String::new();
    };
    let remaining = deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()));
    match receiver.recv_timeout(remaining) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            warn!("⚠️  Output not collected: {err}");
            String::new()
        }
    }
}

/// Sends `SIGKILL` to the child's process group.
fn signal_group(child: &Child) {
    #[cfg(unix)]
    {
        use nix::{
            sys::signal::{Signal, killpg},
            unistd::Pid,
        };
        if let Ok(id) = i32::try_from(child.id())
            && let Err(err) = killpg(Pid::from_raw(id), Signal::SIGKILL)
        {
            debug!("killpg failed: {err}");
        }
    }
    #[cfg(not(unix))]
    let _ = child;
}

fn kill_group(child: &mut Child) {
    signal_group(child);
    if let Err(err) = child.kill() {
        debug!("kill failed: {err}");
    }
}
