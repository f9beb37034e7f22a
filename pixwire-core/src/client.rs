//! Client side of the request protocol.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::command::Command;
use crate::error::PixwireError;
use crate::frame::{LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, read_frame, write_frame};
use crate::handler::DEFAULT_IO_TIMEOUT;

/// Sends one request per connection and waits for the processed image.
#[derive(Debug, Clone)]
pub struct ImageClient {
    addr: String,
    timeout: Duration,
    max_frame_size: usize,
}

impl ImageClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_IO_TIMEOUT,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Deadline for the whole exchange, connect included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Apply `command` to `image` (encoded PNG or JPEG bytes) remotely.
    pub async fn process(&self, command: &Command, image: &[u8]) -> Result<Vec<u8>, PixwireError> {
        command.validate()?;
        self.process_text(&command.to_string(), image).await
    }

    /// Like [`process`](Self::process) but sends `command_text` verbatim.
    pub async fn process_text(
        &self,
        command_text: &str,
        image: &[u8],
    ) -> Result<Vec<u8>, PixwireError> {
        tokio::time::timeout(self.timeout, self.exchange(command_text, image))
            .await
            .map_err(|_| PixwireError::Timeout(self.timeout))?
    }

    async fn exchange(&self, command_text: &str, image: &[u8]) -> Result<Vec<u8>, PixwireError> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        debug!(addr = %self.addr, command = command_text, bytes = image.len(), "sending request");

        write_frame(&mut stream, command_text.as_bytes()).await?;
        write_frame(&mut stream, image).await?;

        let reply = read_frame(&mut stream, self.max_frame_size).await?;
        if reply.is_empty() {
            return Err(PixwireError::ShortRead {
                expected: LENGTH_PREFIX_SIZE + 1,
                actual: LENGTH_PREFIX_SIZE,
            });
        }
        debug!(bytes = reply.len(), "response received");
        Ok(reply)
    }
}

/// `true` when the server hung up without sending a response frame,
/// which is how it reports every request-level failure.
pub fn is_rejection(err: &PixwireError) -> bool {
    matches!(
        err,
        PixwireError::ShortRead { .. } | PixwireError::Write(_)
    ) || matches!(err, PixwireError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionReset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_detection() {
        assert!(is_rejection(&PixwireError::ShortRead {
            expected: 4,
            actual: 0
        }));
        assert!(is_rejection(&PixwireError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset
        ))));
        assert!(!is_rejection(&PixwireError::Timeout(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn invalid_command_is_caught_locally() {
        let client = ImageClient::new("127.0.0.1:1");
        let err = client
            .process(&Command::Resize { width: 0, height: 4 }, b"")
            .await
            .unwrap_err();
        assert!(matches!(err, PixwireError::InvalidParameter(_)));
    }
}
