//! The transport loop.
//!
//! One [`McpServer`] drives one stream: it reads a line, dispatches it,
//! writes the response and flushes, then reads the next line. Requests never
//! overlap, so responses leave in exactly the order requests arrived.
//!
//! ```text
//!  Idle ──▶ Reading ──▶ Dispatching ──▶ Writing ──▶ Idle
//!    │         │
//!    └────┬────┘
//!         ▼
//!      Stopped   (EOF, cancellation or transport fault)
//! ```
//!
//! Cancellation is cooperative. It is checked before each read and raced
//! against the read itself, but never against a running handler: a request
//! that is already dispatching finishes and its response is written.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::watch;

use crate::error::ServeError;
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::transport::LineTransport;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Between messages.
    Idle,
    /// Waiting for the next line.
    Reading,
    /// Running a request through the dispatcher.
    Dispatching,
    /// Writing and flushing a response.
    Writing,
    /// The loop has exited.
    Stopped,
}

/// Triggers cancellation of one or more loops.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    /// Signals every associated [`Shutdown`].
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// The loop's view of the cancellation signal.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    /// Creates a linked trigger/signal pair.
    #[must_use]
    pub fn channel() -> (ShutdownTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger(Arc::new(tx)), Self(rx))
    }

    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self::channel().1
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested.
    ///
    /// If every trigger is dropped without firing, this never resolves.
    pub async fn triggered(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Serves one stream against a shared dispatcher.
pub struct McpServer<R, W> {
    dispatcher: Arc<Dispatcher>,
    transport: LineTransport<R, W>,
    state: ServerState,
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a server for one transport.
    #[must_use]
    pub const fn new(dispatcher: Arc<Dispatcher>, transport: LineTransport<R, W>) -> Self {
        Self {
            dispatcher,
            transport,
            state: ServerState::Idle,
        }
    }

    /// Returns the current loop state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Consumes the server, returning its transport.
    pub fn into_transport(self) -> LineTransport<R, W> {
        self.transport
    }

    /// Runs until the input closes or `shutdown` fires.
    ///
    /// # Errors
    ///
    /// - [`ServeError::Cancelled`] if the shutdown signal was observed.
    /// - [`ServeError::Transport`] if reading or writing failed.
    ///
    /// End of input is a normal completion and returns `Ok(())`.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<(), ServeError> {
        let result = self.serve(&mut shutdown).await;
        self.state = ServerState::Stopped;

        match &result {
            Ok(()) => tracing::info!("input closed, server stopped"),
            Err(ServeError::Cancelled) => tracing::info!("shutdown requested, server stopped"),
            Err(e) => tracing::error!(error = %e, "transport fault, server stopped"),
        }
        result
    }

    async fn serve(&mut self, shutdown: &mut Shutdown) -> Result<(), ServeError> {
        loop {
            self.state = ServerState::Idle;
            if shutdown.is_triggered() {
                return Err(ServeError::Cancelled);
            }

            self.state = ServerState::Reading;
            let line = tokio::select! {
                biased;
                () = shutdown.triggered() => return Err(ServeError::Cancelled),
                line = self.transport.read_line() => line?,
            };

            let Some(line) = line else {
                return Ok(());
            };

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            self.state = ServerState::Dispatching;
            let Some(response) = self.dispatcher.handle_bytes(&line).await else {
                continue;
            };

            self.state = ServerState::Writing;
            self.transport.write_response(&response).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::dispatcher::ServerInfo;
    use crate::mcp::resources::ResourceRegistry;
    use crate::mcp::tools::ToolRegistry;

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            ServerInfo::default(),
            ResourceRegistry::new(),
            ToolRegistry::new(),
        ))
    }

    fn output(server: McpServer<&[u8], Vec<u8>>) -> Vec<String> {
        let (_, written) = server.into_transport().into_inner();
        String::from_utf8(written)
            .unwrap()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    #[tokio::test]
    async fn eof_is_normal_completion() {
        let input: &[u8] = b"";
        let mut server = McpServer::new(dispatcher(), LineTransport::new(input, Vec::new()));
        assert_eq!(server.state(), ServerState::Idle);

        server.run(Shutdown::never()).await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(output(server).is_empty());
    }

    #[tokio::test]
    async fn blank_lines_and_notifications_are_silent() {
        let input: &[u8] =
            b"\n   \r\n{\"method\":\"notifications/initialized\"}\n{\"id\":1,\"method\":\"ping\"}\n";
        let mut server = McpServer::new(dispatcher(), LineTransport::new(input, Vec::new()));
        server.run(Shutdown::never()).await.unwrap();

        let lines = output(server);
        assert_eq!(lines, vec![r#"{"jsonrpc":"2.0","id":1,"result":{}}"#]);
    }

    #[tokio::test]
    async fn bad_line_does_not_stop_the_loop() {
        let input: &[u8] = b"garbage\n{\"id\":2,\"method\":\"ping\"}\n";
        let mut server = McpServer::new(dispatcher(), LineTransport::new(input, Vec::new()));
        server.run(Shutdown::never()).await.unwrap();

        let lines = output(server);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-32700"));
        assert!(lines[1].contains(r#""id":2"#));
    }

    #[tokio::test]
    async fn non_utf8_line_gets_parse_error_and_loop_continues() {
        let input: &[u8] = b"{\"id\":1,\"method\":\"ping\"}\n\xff\xfe\n{\"id\":2,\"method\":\"ping\"}\n";
        let mut server = McpServer::new(dispatcher(), LineTransport::new(input, Vec::new()));
        server.run(Shutdown::never()).await.unwrap();

        let lines = output(server);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);
        assert!(lines[1].contains(r#""id":null"#));
        assert!(lines[1].contains("-32700"));
        assert_eq!(lines[2], r#"{"jsonrpc":"2.0","id":2,"result":{}}"#);
    }

    #[tokio::test]
    async fn cancellation_before_read_skips_pending_line() {
        let input: &[u8] = b"{\"id\":1,\"method\":\"ping\"}\n";
        let mut server = McpServer::new(dispatcher(), LineTransport::new(input, Vec::new()));
        let (trigger, shutdown) = Shutdown::channel();
        trigger.trigger();

        let err = server.run(shutdown).await.unwrap_err();
        assert!(matches!(err, ServeError::Cancelled));
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(output(server).is_empty());
    }

    #[test]
    fn dropped_trigger_does_not_cancel() {
        let (trigger, shutdown) = Shutdown::channel();
        drop(trigger);
        assert!(!shutdown.is_triggered());
    }
}
