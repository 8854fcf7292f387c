use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum SshError {
    #[error("failed to start ssh: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {}s waiting for the device", .waited.as_secs())]
    Timeout { waited: Duration, output: String },
    #[error("session closed")]
    Closed { output: String },
}

impl SshError {
    /// Whatever the device printed before the failure.
    pub fn output(&self) -> &str {
        match self {
            SshError::Timeout { output, .. } | SshError::Closed { output } => output,
            _ => "",
        }
    }
}

/// Accumulates terminal output from a reader thread until a matcher accepts it.
pub struct Expect {
    rx: Receiver<Vec<u8>>,
    buffer: String,
    // trailing bytes of a UTF-8 sequence split across reads
    pending: Vec<u8>,
}

impl Expect {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            buffer: String::new(),
            pending: Vec::new(),
        }
    }

    /// Waits until `done` accepts the buffered text, then drains and returns it.
    pub fn wait_for(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&str) -> bool,
    ) -> Result<String, SshError> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            if done(&self.buffer) {
                return Ok(std::mem::take(&mut self.buffer));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.flush_pending();
                return Err(SshError::Timeout {
                    waited: started.elapsed(),
                    output: std::mem::take(&mut self.buffer),
                });
            }
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => {
                    trace!(bytes = chunk.len(), "pty read");
                    self.push_bytes(&chunk);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush_pending();
                    if done(&self.buffer) {
                        return Ok(std::mem::take(&mut self.buffer));
                    }
                    return Err(SshError::Closed {
                        output: std::mem::take(&mut self.buffer),
                    });
                }
            }
        }
    }

    pub fn discard(&mut self) {
        while self.rx.try_recv().is_ok() {}
        self.buffer.clear();
        self.pending.clear();
    }

    /// Decodes what it can and holds back an incomplete trailing sequence.
    fn push_bytes(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        loop {
            let checked = std::str::from_utf8(&self.pending).map(|_| ());
            match checked {
                Ok(()) => {
                    self.flush_pending();
                    return;
                }
                Err(err) => {
                    let rest = self.pending.split_off(err.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
                    match err.error_len() {
                        None => {
                            self.pending = rest;
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending = rest[len..].to_vec();
                        }
                    }
                }
            }
        }
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}

fn spawn_reader(mut reader: Box<dyn Read + Send>, tx: Sender<Vec<u8>>) {
    std::thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(count) => {
                    if tx.send(buffer[..count].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// An `ssh` client process running on a pseudo terminal.
pub struct PtySession {
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    expect: Expect,
    _master: Box<dyn MasterPty + Send>,
}

impl PtySession {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SshError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 200,
                cols: 511,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| SshError::Spawn(err.to_string()))?;

        let mut builder = CommandBuilder::new(program);
        builder.args(args);
        builder.env("TERM", "dumb");

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|err| SshError::Spawn(err.to_string()))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| SshError::Spawn(err.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| SshError::Spawn(err.to_string()))?;

        let (tx, rx) = mpsc::channel();
        spawn_reader(reader, tx);
        debug!(program, "spawned pty session");

        Ok(Self {
            child,
            writer,
            expect: Expect::new(rx),
            _master: pair.master,
        })
    }

    pub fn send_line(&mut self, line: &str) -> Result<(), SshError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn wait_for(
        &mut self,
        timeout: Duration,
        done: impl FnMut(&str) -> bool,
    ) -> Result<String, SshError> {
        self.expect.wait_for(timeout, done)
    }

    pub fn discard_pending(&mut self) {
        self.expect.discard();
    }

    fn close(&mut self) {
        let _ = self.send_line("exit");
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.close();
    }
}
