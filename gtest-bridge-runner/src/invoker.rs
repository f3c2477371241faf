// Copyright (c) The gtest-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the delegated binary for one case and captures what it did.
//!
//! Each invocation is a fresh OS process: the case id is passed as a single filter argument, stdin
//! is closed, and stdout and stderr are buffered in full by reader threads until the process exits.
//! The calling thread blocks until the process exits, the timeout elapses, or the run is canceled.
//! In the latter two cases the process (and on Unix, its whole process group) is killed and reaped
//! before returning.
//!
//! Processes the binary leaves behind can keep the output pipes open after it exits. The pipes are
//! given the leak timeout to close, after which the process group is killed and the remaining
//! readers are abandoned, so a case never blocks past its timeout plus the leak timeout.

use crate::{
    case_list::TestCaseId,
    errors::{DecodeError, InvokeError, LaunchError, TimeoutError},
    stopwatch::StopwatchStart,
    test_output::{DecodePolicy, InvocationResult, StreamKind},
};
use camino::Utf8Path;
use crossbeam_channel::{Receiver, RecvError, TryRecvError};
use std::{
    io::{self, Read},
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// The filter flag understood by GoogleTest binaries.
pub const DEFAULT_FILTER_ARG: &str = "--gtest_filter";

/// The default bound on how long a single case may run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The default time the output pipes may stay open after the binary exits.
pub const DEFAULT_LEAK_TIMEOUT: Duration = Duration::from_millis(100);

/// How long to wait for the pipes to close once the process group has been killed.
const KILL_GRACE: Duration = Duration::from_millis(100);

/// How often the wait loop checks on the child.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Launches the delegated binary, one process per case.
#[derive(Clone, Debug)]
pub struct ProcessInvoker {
    filter_arg: String,
    timeout: Option<Duration>,
    slow_timeout: Option<Duration>,
    leak_timeout: Duration,
    decode: DecodePolicy,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self {
            filter_arg: DEFAULT_FILTER_ARG.to_owned(),
            timeout: Some(DEFAULT_TIMEOUT),
            slow_timeout: None,
            leak_timeout: DEFAULT_LEAK_TIMEOUT,
            decode: DecodePolicy::default(),
        }
    }
}

impl ProcessInvoker {
    /// Creates an invoker with the default filter flag, a 60 second timeout, and lossy decoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag used to select a case. The case id is appended as `<flag>=<id>`.
    pub fn set_filter_arg(&mut self, filter_arg: impl Into<String>) -> &mut Self {
        self.filter_arg = filter_arg.into();
        self
    }

    /// Sets the timeout. `None` waits forever.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Sets the period after which a still-running case is reported as slow. `None` disables slow
    /// reporting.
    pub fn set_slow_timeout(&mut self, slow_timeout: Option<Duration>) -> &mut Self {
        self.slow_timeout = slow_timeout.filter(|d| !d.is_zero());
        self
    }

    /// Sets how long the output pipes may stay open after the binary exits, before the rest of its
    /// process group is killed.
    pub fn set_leak_timeout(&mut self, leak_timeout: Duration) -> &mut Self {
        self.leak_timeout = leak_timeout;
        self
    }

    /// Sets the decoding policy for captured output.
    pub fn set_decode(&mut self, decode: DecodePolicy) -> &mut Self {
        self.decode = decode;
        self
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the exact argument list the binary is given for `case_id`.
    pub fn args_for(&self, case_id: &TestCaseId) -> Vec<String> {
        vec![format!("{}={}", self.filter_arg, case_id)]
    }

    /// Runs `binary` restricted to `case_id` and waits for it.
    pub fn invoke(
        &self,
        binary: &Utf8Path,
        case_id: &TestCaseId,
    ) -> Result<InvocationResult, InvokeError> {
        self.invoke_with(binary, case_id, InvokeHooks::default())
    }

    /// Like [`invoke`](Self::invoke), but with cancellation and slow-case notifications.
    pub fn invoke_with(
        &self,
        binary: &Utf8Path,
        case_id: &TestCaseId,
        hooks: InvokeHooks<'_>,
    ) -> Result<InvocationResult, InvokeError> {
        let args = self.args_for(case_id);
        let command =
            shell_words::join(std::iter::once(binary.as_str()).chain(args.iter().map(String::as_str)));

        let mut cmd = Command::new(binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        set_process_group(&mut cmd);

        debug!(%case_id, %command, "launching delegated binary");
        let stopwatch = StopwatchStart::now();
        let mut child = cmd.spawn().map_err(|error| LaunchError::Spawn {
            command: command.clone(),
            error,
        })?;

        let mut stdout = PipeReader::spawn(child.stdout.take());
        let mut stderr = PipeReader::spawn(child.stderr.take());

        let outcome = match self.wait_for_exit(&mut child, case_id, &stopwatch, &hooks) {
            Ok(outcome) => outcome,
            Err(error) => {
                let _ = terminate(&mut child);
                return Err(LaunchError::Wait { command, error }.into());
            }
        };

        let outcome = match outcome {
            WaitOutcome::Exited(status) => {
                // Whichever comes first: the leak timeout or the end of the case's timeout.
                let (window, hits_timeout) = match self
                    .timeout
                    .map(|timeout| timeout.saturating_sub(stopwatch.elapsed()))
                {
                    Some(remaining) if remaining < self.leak_timeout => (remaining, true),
                    _ => (self.leak_timeout, false),
                };
                if drain_pipes(&mut stdout, &mut stderr, Instant::now() + window) {
                    WaitOutcome::Exited(status)
                } else {
                    warn!(
                        %case_id,
                        "output still open {:?} after the binary exited, killing leftover processes",
                        window
                    );
                    kill_process_group(&child);
                    drain_pipes(&mut stdout, &mut stderr, Instant::now() + KILL_GRACE);
                    if hits_timeout {
                        WaitOutcome::TimedOut(status)
                    } else {
                        WaitOutcome::Leaked(status)
                    }
                }
            }
            WaitOutcome::TimedOut(_) | WaitOutcome::Canceled(_) | WaitOutcome::Leaked(_) => {
                // The process group is already dead. Pipes still open after this belong to
                // processes that left the group, and their readers are abandoned.
                drain_pipes(&mut stdout, &mut stderr, Instant::now() + KILL_GRACE);
                outcome
            }
        };

        let stopwatch_end = stopwatch.end();
        let wait_error = |error| LaunchError::Wait {
            command: command.clone(),
            error,
        };
        let stdout = stdout.finish().map_err(wait_error)?;
        let stderr = stderr.finish().map_err(wait_error)?;

        let (WaitOutcome::Exited(status)
        | WaitOutcome::TimedOut(status)
        | WaitOutcome::Canceled(status)
        | WaitOutcome::Leaked(status)) = outcome;
        let (exit_code, signal) = exit_code_and_signal(status);

        let decode = match outcome {
            WaitOutcome::Exited(_) => self.decode,
            // Partial output is attached to an error anyway; don't turn it into a second one.
            WaitOutcome::TimedOut(_) | WaitOutcome::Canceled(_) | WaitOutcome::Leaked(_) => {
                DecodePolicy::Lossy
            }
        };
        let result = decode_output(
            decode,
            stdout,
            stderr,
            exit_code,
            signal,
            stopwatch_end.start_time,
            stopwatch_end.duration,
        )
        .map_err(|(stream, lossy, error)| {
            InvokeError::Decode(Box::new(DecodeError {
                command: command.clone(),
                stream,
                lossy,
                error,
            }))
        })?;

        match outcome {
            WaitOutcome::Exited(_) => {
                if is_not_runnable(&result) {
                    return Err(LaunchError::NotRunnable {
                        command,
                        exit_code: result.exit_code,
                        stderr: result.stderr,
                    }
                    .into());
                }
                debug!(
                    %case_id,
                    exit = %result.describe_exit(),
                    time_taken = ?result.time_taken,
                    "delegated binary exited"
                );
                Ok(result)
            }
            WaitOutcome::TimedOut(_) => Err(TimeoutError {
                command,
                // The timeout must have been set for the wait loop to time out.
                timeout: self.timeout.unwrap_or(result.time_taken),
                partial: result,
            }
            .into()),
            WaitOutcome::Canceled(_) => Err(InvokeError::Canceled {
                command,
                partial: result,
            }),
            WaitOutcome::Leaked(_) => Err(InvokeError::Leaked {
                command,
                leak_timeout: self.leak_timeout,
                partial: result,
            }),
        }
    }

    fn wait_for_exit(
        &self,
        child: &mut Child,
        case_id: &TestCaseId,
        stopwatch: &StopwatchStart,
        hooks: &InvokeHooks<'_>,
    ) -> io::Result<WaitOutcome> {
        let ticker = crossbeam_channel::tick(POLL_INTERVAL);
        let never = crossbeam_channel::never();
        let cancel_receiver = hooks.cancel_receiver.unwrap_or(&never);
        let mut next_slow = self.slow_timeout;

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(WaitOutcome::Exited(status));
            }

            let elapsed = stopwatch.elapsed();
            if let Some(timeout) = self.timeout
                && elapsed >= timeout
            {
                warn!(
                    %case_id,
                    "timed out after {}, terminating",
                    humantime::format_duration(timeout)
                );
                return terminate(child).map(WaitOutcome::TimedOut);
            }
            if let (Some(threshold), Some(period)) = (next_slow, self.slow_timeout)
                && elapsed >= threshold
            {
                warn!(%case_id, "still running after {:.3}s", elapsed.as_secs_f64());
                if let Some(on_slow) = hooks.on_slow {
                    on_slow(elapsed);
                }
                next_slow = Some(threshold + period);
            }

            crossbeam_channel::select! {
                recv(ticker) -> _ => {}
                recv(cancel_receiver) -> _ => {
                    // A message or a disconnect both mean the run is being canceled.
                    debug!(%case_id, "run canceled, terminating");
                    return terminate(child).map(WaitOutcome::Canceled);
                }
            }
        }
    }
}

/// Optional hooks into a single invocation.
#[derive(Clone, Copy, Default)]
pub struct InvokeHooks<'a> {
    cancel_receiver: Option<&'a Receiver<()>>,
    on_slow: Option<&'a (dyn Fn(Duration) + Sync)>,
}

impl<'a> InvokeHooks<'a> {
    /// Terminates the child once `receiver` yields a message or disconnects.
    pub fn with_cancel_receiver(mut self, receiver: &'a Receiver<()>) -> Self {
        self.cancel_receiver = Some(receiver);
        self
    }

    /// Calls `on_slow` with the elapsed time every time a slow-timeout period elapses.
    pub fn with_on_slow(mut self, on_slow: &'a (dyn Fn(Duration) + Sync)) -> Self {
        self.on_slow = Some(on_slow);
        self
    }
}

#[derive(Copy, Clone, Debug)]
enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut(ExitStatus),
    Canceled(ExitStatus),
    Leaked(ExitStatus),
}

/// Reads one output pipe on a detached thread, forwarding chunks as they arrive.
///
/// A pipe held open by a process the binary left behind only pins its reader thread, never the
/// invocation.
struct PipeReader {
    receiver: Receiver<io::Result<Vec<u8>>>,
    buf: Vec<u8>,
    error: Option<io::Error>,
    open: bool,
}

impl PipeReader {
    fn spawn(pipe: Option<impl Read + Send + 'static>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        if let Some(mut pipe) = pipe {
            std::thread::spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if sender.send(Ok(chunk[..n].to_vec())).is_err() {
                                // The invocation gave up on this pipe.
                                break;
                            }
                        }
                        Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                        Err(error) => {
                            let _ = sender.send(Err(error));
                            break;
                        }
                    }
                }
            });
        }
        Self {
            receiver,
            buf: Vec::new(),
            error: None,
            open: true,
        }
    }

    fn live_receiver(&self) -> Receiver<io::Result<Vec<u8>>> {
        if self.open {
            self.receiver.clone()
        } else {
            crossbeam_channel::never()
        }
    }

    fn accept(&mut self, message: Result<io::Result<Vec<u8>>, RecvError>) {
        match message {
            Ok(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
            Ok(Err(error)) => self.error = Some(error),
            Err(RecvError) => self.open = false,
        }
    }

    /// Takes whatever has already arrived without blocking.
    fn accept_ready(&mut self) {
        while self.open {
            match self.receiver.try_recv() {
                Ok(message) => self.accept(Ok(message)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.open = false,
            }
        }
    }

    fn finish(self) -> io::Result<Vec<u8>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.buf),
        }
    }
}

/// Collects output until both pipes close or `deadline` passes. Returns true if both closed.
fn drain_pipes(stdout: &mut PipeReader, stderr: &mut PipeReader, deadline: Instant) -> bool {
    let timeout = crossbeam_channel::at(deadline);
    while stdout.open || stderr.open {
        let stdout_receiver = stdout.live_receiver();
        let stderr_receiver = stderr.live_receiver();
        crossbeam_channel::select! {
            recv(stdout_receiver) -> message => stdout.accept(message),
            recv(stderr_receiver) -> message => stderr.accept(message),
            recv(timeout) -> _ => {
                stdout.accept_ready();
                stderr.accept_ready();
                return !(stdout.open || stderr.open);
            }
        }
    }
    true
}

fn decode_output(
    decode: DecodePolicy,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i32,
    signal: Option<i32>,
    start_time: std::time::SystemTime,
    time_taken: Duration,
) -> Result<InvocationResult, (StreamKind, InvocationResult, std::string::FromUtf8Error)> {
    let make = |stdout, stderr| InvocationResult {
        exit_code,
        signal,
        stdout,
        stderr,
        start_time,
        time_taken,
    };
    let lossy = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();

    let stdout = match decode.decode(stdout) {
        Ok(stdout) => stdout,
        Err(error) => {
            let partial = make(lossy(error.as_bytes()), lossy(&stderr));
            return Err((StreamKind::Stdout, partial, error));
        }
    };
    match decode.decode(stderr) {
        Ok(stderr) => Ok(make(stdout, stderr)),
        Err(error) => {
            let partial = make(stdout, lossy(error.as_bytes()));
            Err((StreamKind::Stderr, partial, error))
        }
    }
}

/// 126 and 127 are the shell's "not executable" and "not found" codes. With nothing on stdout,
/// the test framework never started.
fn is_not_runnable(result: &InvocationResult) -> bool {
    result.signal.is_none() && matches!(result.exit_code, 126 | 127) && result.stdout.is_empty()
}

pub(crate) fn exit_code_and_signal(status: ExitStatus) -> (i32, Option<i32>) {
    if let Some(code) = status.code() {
        return (code, None);
    }
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return (128 + signal, Some(signal));
            }
        }
    }
    (-1, None)
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn set_process_group(cmd: &mut Command) {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        /// Kills every process left in the child's process group. Works after the child itself has
        /// been reaped, as long as other members remain.
        fn kill_process_group(child: &Child) {
            // The child is the leader of its own process group, so its pid is the group id.
            let pgid = child.id() as libc::pid_t;
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }

        /// Kills the child's process group, then reaps the child.
        fn terminate(child: &mut Child) -> io::Result<ExitStatus> {
            kill_process_group(child);
            // In case the group kill raced with exit.
            let _ = child.kill();
            child.wait()
        }
    } else {
        fn set_process_group(_cmd: &mut Command) {}

        fn kill_process_group(_child: &Child) {}

        fn terminate(child: &mut Child) -> io::Result<ExitStatus> {
            let _ = child.kill();
            child.wait()
        }
    }
}
