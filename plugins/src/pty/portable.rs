use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use acctswap_core::api::{PtyController, PtyError};
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

const READ_CHUNK: usize = 4096;
const CHANNEL_DEPTH: usize = 256;

/// What to launch inside the pseudo-terminal.
#[derive(Debug, Clone)]
pub struct PtyCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra variables on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub rows: u16,
    pub cols: u16,
}

impl PtyCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            rows: 24,
            cols: 80,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows.max(1);
        self.cols = cols.max(1);
        self
    }
}

/// [`PtyController`] backed by the native pseudo-terminal via `portable-pty`.
///
/// A blocking reader thread pushes raw output into a channel; `read_output`
/// drains whatever arrived within `read_timeout`.
pub struct PortablePty {
    command: PtyCommand,
    read_timeout: Duration,
    rx: tokio::sync::Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    /// Trailing bytes of a UTF-8 sequence split across reads.
    partial: Mutex<Vec<u8>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    child: Mutex<Option<Box<dyn Child + Send + Sync>>>,
    killer: Mutex<Option<Box<dyn ChildKiller + Send + Sync>>>,
}

impl PortablePty {
    pub fn new(command: PtyCommand) -> Self {
        Self {
            command,
            read_timeout: Duration::from_millis(20),
            rx: tokio::sync::Mutex::new(None),
            partial: Mutex::new(Vec::new()),
            writer: Mutex::new(None),
            master: Mutex::new(None),
            child: Mutex::new(None),
            killer: Mutex::new(None),
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), PtyError> {
        let guard = lock(&self.master)?;
        let master = guard.as_ref().ok_or(PtyError::NotStarted)?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Other(e.to_string()))
    }

    fn spawn_error(&self, source: anyhow::Error) -> PtyError {
        PtyError::Spawn {
            program: self.command.program.clone(),
            source,
        }
    }

    fn decode(&self, mut bytes: Vec<u8>) -> Result<String, PtyError> {
        let mut partial = lock(&self.partial)?;
        if !partial.is_empty() {
            let mut joined = std::mem::take(&mut *partial);
            joined.append(&mut bytes);
            bytes = joined;
        }
        let keep = incomplete_tail(&bytes);
        let tail = bytes.split_off(bytes.len() - keep);
        *partial = tail;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl PtyController for PortablePty {
    async fn start(&self) -> Result<(), PtyError> {
        let cmd = &self.command;
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: cmd.rows,
                cols: cmd.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| self.spawn_error(e))?;

        let mut builder = CommandBuilder::new(&cmd.program);
        builder.args(&cmd.args);
        match &cmd.cwd {
            Some(dir) => builder.cwd(dir),
            None => {
                if let Ok(dir) = std::env::current_dir() {
                    builder.cwd(dir);
                }
            }
        }
        // CommandBuilder starts from an empty environment.
        for (key, value) in std::env::vars() {
            builder.env(key, value);
        }
        if std::env::var_os("TERM").is_none() {
            builder.env("TERM", "xterm-256color");
        }
        for (key, value) in &cmd.env {
            builder.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| self.spawn_error(e))?;
        // The slave end must close here or the reader never sees EOF.
        drop(pair.slave);

        let writer = pair.master.take_writer().map_err(|e| self.spawn_error(e))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| self.spawn_error(e))?;

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        tokio::task::spawn_blocking(move || read_loop(reader, tx));

        tracing::info!(
            target: "acctswap.pty",
            program = %cmd.program,
            pid = ?child.process_id(),
            "child spawned"
        );
        *lock(&self.killer)? = Some(child.clone_killer());
        *lock(&self.child)? = Some(child);
        *lock(&self.writer)? = Some(writer);
        *lock(&self.master)? = Some(pair.master);
        *self.rx.lock().await = Some(rx);
        Ok(())
    }

    async fn read_output(&self) -> Result<String, PtyError> {
        let mut guard = self.rx.lock().await;
        let rx = guard.as_mut().ok_or(PtyError::NotStarted)?;
        let mut bytes = match tokio::time::timeout(self.read_timeout, rx.recv()).await {
            Err(_) => return Ok(String::new()),
            Ok(None) => return Err(PtyError::Closed),
            Ok(Some(first)) => first,
        };
        while let Ok(more) = rx.try_recv() {
            bytes.extend_from_slice(&more);
        }
        drop(guard);
        self.decode(bytes)
    }

    async fn write_input(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut guard = lock(&self.writer)?;
        let writer = guard.as_mut().ok_or(PtyError::NotStarted)?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    async fn wait(&self) -> Result<i32, PtyError> {
        let mut child = lock(&self.child)?.take().ok_or(PtyError::NotStarted)?;
        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| PtyError::Other(e.to_string()))??;
        let code = status.exit_code() as i32;
        tracing::info!(target: "acctswap.pty", exit_code = code, "child exited");
        Ok(code)
    }

    async fn close(&self) -> Result<(), PtyError> {
        if let Some(mut killer) = lock(&self.killer)?.take() {
            // Already-exited children report an error here; nothing to do.
            if let Err(e) = killer.kill() {
                tracing::debug!(target: "acctswap.pty", error = %e, "kill skipped");
            }
        }
        lock(&self.writer)?.take();
        lock(&self.master)?.take();
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, PtyError> {
    m.lock()
        .map_err(|_| PtyError::Other("pseudo-terminal lock poisoned".into()))
}

fn read_loop(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // EIO is how Linux reports the slave side hanging up.
            Err(_) => break,
        }
    }
}

/// Length of an unfinished UTF-8 sequence at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => 0,
        Err(e) if e.error_len().is_none() => bytes.len() - e.valid_up_to(),
        Err(_) => {
            // Invalid bytes earlier on; only hold back a possible trailing sequence.
            let start = bytes.len().saturating_sub(3);
            (start..bytes.len())
                .find(|&i| {
                    let b = bytes[i];
                    b >= 0xC0 && std::str::from_utf8(&bytes[i..]).is_err_and(|e| e.error_len().is_none())
                })
                .map(|i| bytes.len() - i)
                .unwrap_or(0)
        }
    }
}
