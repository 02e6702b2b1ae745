//! Line-delimited transport for the MCP server.
//!
//! - Messages are UTF-8 encoded JSON-RPC; a line that is not UTF-8 is handed
//!   on as bytes and answered with a parse error
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - Every response is flushed before the next line is read
//!
//! In production the transport runs over stdin/stdout ([`StdioTransport`]);
//! stderr carries logs only. Any other `AsyncBufRead`/`AsyncWrite` pair works
//! too, e.g. one per accepted connection.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::mcp::protocol::JsonRpcResponse;

/// A transport over a buffered reader and a writer.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// The transport used by the binary.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over the process stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over the given streams.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next message line as raw bytes, without its line ending.
    ///
    /// Returns `None` once the input is closed (EOF). The bytes are not
    /// checked for UTF-8 here, so a garbled line still reaches the
    /// dispatcher and gets its own error response.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the underlying stream fails.
    pub async fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.ends_with(b"\n") {
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes a response as one line and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.write_raw(&json).await
    }

    async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Consumes the transport, returning the underlying streams.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}
