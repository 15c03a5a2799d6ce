//! Transfer request sources.
//!
//! The workflow pulls requests one at a time from a `TransferSource`. The
//! console source prompts on its writer and reads answers line by line.

use async_trait::async_trait;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use xfer_domain::{DomainError, TransferRequest};

use crate::error::DaemonResult;

/// Prompt for the account to debit.
pub const PROMPT_FROM: &str = "from account no.: ";
/// Prompt for the account to credit.
pub const PROMPT_TO: &str = "to account no.: ";
/// Prompt for the amount.
pub const PROMPT_AMOUNT: &str = "amount: ";

/// Outcome of asking a source for the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A well-formed request
    Request(TransferRequest),
    /// The user supplied fields that do not form a valid request
    Invalid(DomainError),
    /// No more requests
    End,
}

/// Supplies transfer requests one at a time.
#[async_trait]
pub trait TransferSource: Send {
    /// Next request, a validation failure, or end of input.
    async fn next_request(&mut self) -> DaemonResult<SourceEvent>;
}

/// Interactive source: prompts for each field and parses the answers.
///
/// An empty from-account or end of stream ends the input.
pub struct ConsoleSource<R, W> {
    reader: R,
    writer: W,
}

impl ConsoleSource<BufReader<io::Stdin>, io::Stdout> {
    /// Source bound to the process stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> ConsoleSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a source over any line reader and prompt writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Recover the reader and writer.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Write `label`, then read one trimmed line. `None` at end of stream.
    async fn prompt(&mut self, label: &str) -> DaemonResult<Option<String>> {
        self.writer.write_all(label.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim().to_string()))
    }
}

#[async_trait]
impl<R, W> TransferSource for ConsoleSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_request(&mut self) -> DaemonResult<SourceEvent> {
        let from = match self.prompt(PROMPT_FROM).await? {
            Some(from) if !from.is_empty() => from,
            _ => return Ok(SourceEvent::End),
        };

        let Some(to) = self.prompt(PROMPT_TO).await? else {
            warn!(from = %from, "Input ended before the to-account was entered");
            return Ok(SourceEvent::End);
        };

        let Some(amount) = self.prompt(PROMPT_AMOUNT).await? else {
            warn!(from = %from, to = %to, "Input ended before the amount was entered");
            return Ok(SourceEvent::End);
        };

        match TransferRequest::parse(&from, &to, &amount) {
            Ok(request) => {
                debug!(request_id = %request.id, "Request read from console");
                Ok(SourceEvent::Request(request))
            },
            Err(e) => Ok(SourceEvent::Invalid(e)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
