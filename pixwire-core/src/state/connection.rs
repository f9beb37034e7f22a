//! Per-connection request state machine.
//!
//! Provides a `ConnectionStage` enum that models the lifecycle of a
//! single request, with validated transitions that return `Result`
//! instead of panicking.

use std::fmt;

use crate::error::PixwireError;

// ── ConnectionStage ──────────────────────────────────────────────

/// Where a connection is in its one-request lifecycle.
///
/// ```text
///  AwaitCommand ──► AwaitImage ──► Process ──► Respond ──► Done
///       │               │             │           │          ▲
///       └───────────────┴─────────────┴───────────┴──────────┘
///                        (any failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStage {
    /// Waiting for the command frame.
    #[default]
    AwaitCommand,

    /// Command parsed; waiting for the image frame.
    AwaitImage,

    /// Image decoded; running the transform.
    Process,

    /// Transform finished; encoding and writing the response.
    Respond,

    /// Terminal. The connection is closed from here on.
    Done,
}

impl fmt::Display for ConnectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitCommand => write!(f, "AwaitCommand"),
            Self::AwaitImage => write!(f, "AwaitImage"),
            Self::Process => write!(f, "Process"),
            Self::Respond => write!(f, "Respond"),
            Self::Done => write!(f, "Done"),
        }
    }
}

impl ConnectionStage {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Move to the next stage in the request sequence.
    ///
    /// Valid from every stage except `Done`.
    pub fn advance(&mut self) -> Result<(), PixwireError> {
        *self = match self {
            Self::AwaitCommand => Self::AwaitImage,
            Self::AwaitImage => Self::Process,
            Self::Process => Self::Respond,
            Self::Respond => Self::Done,
            Self::Done => {
                return Err(PixwireError::ProtocolViolation(
                    "cannot advance: connection already done",
                ));
            }
        };
        Ok(())
    }

    /// Jump straight to `Done`, from any stage.
    pub fn finish(&mut self) {
        *self = Self::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_order() {
        let mut stage = ConnectionStage::default();
        let mut seen = vec![stage];
        while !stage.is_done() {
            stage.advance().unwrap();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                ConnectionStage::AwaitCommand,
                ConnectionStage::AwaitImage,
                ConnectionStage::Process,
                ConnectionStage::Respond,
                ConnectionStage::Done,
            ]
        );
    }

    #[test]
    fn done_is_terminal() {
        let mut stage = ConnectionStage::AwaitImage;
        stage.finish();
        assert!(stage.is_done());
        assert!(stage.advance().is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(ConnectionStage::Process.to_string(), "Process");
    }
}
