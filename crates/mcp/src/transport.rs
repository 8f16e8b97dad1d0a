//! MCP transport layer.
//!
//! Defines the `McpTransport` trait for sending/receiving newline-delimited
//! JSON-RPC frames and three implementations: `StdioTransport` (a server
//! talking over its own stdin/stdout), `ProcessTransport` (a client driving
//! a child process through its pipes) and `ChannelTransport` (in-memory,
//! for tests).

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::McpError;

/// Default time a terminated server gets to exit before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Trait for MCP message transport.
///
/// Implementations handle the wire format (newline-delimited JSON) over
/// different channels.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Read the next non-blank line from the transport, without its newline.
    /// Returns `None` when the transport is closed.
    async fn receive(&mut self) -> Result<Option<String>, McpError>;

    /// Write one frame, appending the newline if it is missing. Returns once
    /// the bytes are flushed.
    async fn send(&mut self, message: &str) -> Result<(), McpError>;

    /// Release the underlying channel. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), McpError> {
        Ok(())
    }
}

async fn read_frame<R>(reader: &mut R) -> Result<Option<String>, McpError>
where
    R: AsyncBufRead + Unpin + Send,
{
    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Ok(None); // EOF
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

async fn write_frame<W>(writer: &mut W, message: &str) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin + Send,
{
    writer.write_all(message.as_bytes()).await?;
    if !message.ends_with('\n') {
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}

fn closed_pipe(what: &str) -> McpError {
    McpError::Transport(io::Error::new(io::ErrorKind::BrokenPipe, format!("{what} is closed")))
}

/// Stdio-based transport using newline-delimited JSON.
///
/// Reads from stdin, writes to stdout. Nothing else may write to stdout
/// while it is in use.
pub struct StdioTransport {
    reader: BufReader<tokio::io::Stdin>,
    writer: tokio::io::Stdout,
}

impl StdioTransport {
    /// Create a new stdio transport.
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        read_frame(&mut self.reader).await
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        write_frame(&mut self.writer, message).await
    }
}

/// A server subprocess whose stdin/stdout carry the protocol.
///
/// The child's stderr is inherited so its logs never mix with protocol
/// frames. The child is killed if this value is dropped while it runs.
#[derive(Debug)]
pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    program: String,
    grace_period: Duration,
    terminated: bool,
}

impl ProcessTransport {
    /// Launch `command[0]` with the remaining elements as arguments.
    pub fn spawn<S: AsRef<str>>(command: &[S]) -> Result<Self, McpError> {
        let rendered = command.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(" ");
        let Some((program, args)) = command.split_first() else {
            return Err(McpError::Spawn {
                command: rendered,
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };
        let program = program.as_ref();

        tracing::info!(program = %program, "Spawning MCP server process");

        let mut child = Command::new(program)
            .args(args.iter().map(|a| a.as_ref()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(McpError::Spawn {
                command: rendered,
                source: io::Error::other("failed to capture server stdio"),
            });
        };

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            program: program.to_string(),
            grace_period: DEFAULT_GRACE_PERIOD,
            terminated: false,
        })
    }

    /// Set how long `terminate` waits after the termination signal.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// OS process id, while the child has not been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), McpError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| closed_pipe("server stdin"))?;
        write_frame(stdin, line).await
    }

    /// Next line from the server, or `None` once its stdout has closed.
    pub async fn receive_line(&mut self) -> Result<Option<String>, McpError> {
        read_frame(&mut self.stdout).await
    }

    /// Stop the server: close its stdin, send SIGTERM, wait out the grace
    /// period, then kill. A no-op when already terminated or exited.
    pub async fn terminate(&mut self) -> Result<(), McpError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        self.stdin.take();

        if let Some(status) = self.child.try_wait()? {
            tracing::debug!(program = %self.program, status = %status, "server already exited");
            return Ok(());
        }

        self.signal_terminate().await;

        match tokio::time::timeout(self.grace_period, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::info!(program = %self.program, status = %status, "server exited");
            }
            Err(_) => {
                tracing::warn!(
                    program = %self.program,
                    grace_ms = self.grace_period.as_millis() as u64,
                    "graceful shutdown timed out, force killing"
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(program = %self.program, error = %e, "failed to kill server");
                }
            }
        }
        Ok(())
    }

    async fn signal_terminate(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SIGTERM via the kill command lets the server shut down cleanly.
                let pid_arg = pid.to_string();
                let _ = Command::new("kill")
                    .args(["-TERM", pid_arg.as_str()])
                    .output()
                    .await;
                tracing::debug!(program = %self.program, pid = pid, "sent SIGTERM");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
            tracing::debug!(program = %self.program, "sent kill signal");
        }
    }
}

#[async_trait]
impl McpTransport for ProcessTransport {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        self.receive_line().await
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        self.send_line(message).await
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.terminate().await
    }
}

/// In-memory transport for testing, backed by channel pairs.
pub struct ChannelTransport {
    rx: tokio::sync::mpsc::Receiver<String>,
    tx: Option<tokio::sync::mpsc::Sender<String>>,
}

impl ChannelTransport {
    /// Create a pair of connected transports for testing.
    ///
    /// Messages sent on one transport are received by the other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = tokio::sync::mpsc::channel(32);
        let (tx_b, rx_a) = tokio::sync::mpsc::channel(32);
        (
            Self { rx: rx_a, tx: Some(tx_a) },
            Self { rx: rx_b, tx: Some(tx_b) },
        )
    }
}

#[async_trait]
impl McpTransport for ChannelTransport {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        while let Some(msg) = self.rx.recv().await {
            let trimmed = msg.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
        Ok(None)
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        let tx = self.tx.as_ref().ok_or_else(|| closed_pipe("channel"))?;
        tx.send(message.to_string())
            .await
            .map_err(|e| McpError::Transport(io::Error::new(io::ErrorKind::BrokenPipe, e)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.tx.take();
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_transport_pair() {
        let (mut a, mut b) = ChannelTransport::pair();

        a.send("hello from a\n").await.unwrap();
        let msg = b.receive().await.unwrap();
        assert_eq!(msg, Some("hello from a".to_string()));

        b.send("hello from b").await.unwrap();
        let msg = a.receive().await.unwrap();
        assert_eq!(msg, Some("hello from b".to_string()));
    }

    #[tokio::test]
    async fn test_channel_transport_closed() {
        let (mut a, b) = ChannelTransport::pair();
        drop(b);
        let result = a.receive().await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_channel_transport_close_is_idempotent() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.close().await.unwrap();
        a.close().await.unwrap();
        assert!(a.send("late").await.is_err());
        assert_eq!(b.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_frame_skips_blank_lines() {
        let input: &[u8] = b"\n  \n{\"a\":1}\r\n\n{\"b\":2}";
        let mut reader = BufReader::new(input);
        assert_eq!(read_frame(&mut reader).await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(read_frame(&mut reader).await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_frame_terminates_once() {
        let mut out: Vec<u8> = Vec::new();
        write_frame(&mut out, "{}").await.unwrap();
        write_frame(&mut out, "[]\n").await.unwrap();
        assert_eq!(out, b"{}\n[]\n");
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let err = ProcessTransport::spawn(&["/definitely/not/a/real/binary"]).unwrap_err();
        assert!(matches!(err, McpError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_spawn_empty_command() {
        let empty: [&str; 0] = [];
        let err = ProcessTransport::spawn(&empty).unwrap_err();
        assert!(matches!(err, McpError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_round_trip_and_terminate() {
        let mut transport = ProcessTransport::spawn(&["cat"]).unwrap();
        transport.send_line("{\"ping\":1}").await.unwrap();
        assert_eq!(
            transport.receive_line().await.unwrap().as_deref(),
            Some("{\"ping\":1}")
        );

        transport.terminate().await.unwrap();
        transport.terminate().await.unwrap();
        assert_eq!(transport.receive_line().await.unwrap(), None);
        assert!(transport.send_line("{}").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_escalates_to_kill() {
        let mut transport = ProcessTransport::spawn(&["sh", "-c", "trap '' TERM; exec sleep 30"])
            .unwrap()
            .with_grace_period(Duration::from_millis(200));

        let started = std::time::Instant::now();
        transport.terminate().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(transport.receive_line().await.unwrap(), None);
    }
}
