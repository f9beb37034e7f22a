//! # pixwire-client
//!
//! Loads an image from disk, sends it with a command to a pixwire
//! server, and writes the processed image next to the working
//! directory as `processed.<ext>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use pixwire_core::handler::DEFAULT_IO_TIMEOUT;
use pixwire_core::{Command, ImageClient, ImageFormat, PixwireError};

/// One client invocation.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub server_addr: String,
    pub command_text: String,
    pub image_path: PathBuf,
    /// Where to save the result. Defaults to `processed.<ext>`.
    pub output: Option<PathBuf>,
    pub timeout: Duration,
}

impl ClientRequest {
    pub fn new(
        server_addr: impl Into<String>,
        command_text: impl Into<String>,
        image_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            server_addr: server_addr.into(),
            command_text: command_text.into(),
            image_path: image_path.into(),
            output: None,
            timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Default output file for a response in `format`.
pub fn default_output_path(format: ImageFormat) -> PathBuf {
    PathBuf::from(format!("processed.{}", format.extension()))
}

/// Send `image_path` to `server_addr` with `command_text` and save the
/// reply as `processed.<ext>`.
pub async fn run_client(
    server_addr: &str,
    command_text: &str,
    image_path: &Path,
) -> Result<PathBuf, PixwireError> {
    send(&ClientRequest::new(server_addr, command_text, image_path)).await
}

/// Run one request end to end. Returns the path the result was written to.
pub async fn send(request: &ClientRequest) -> Result<PathBuf, PixwireError> {
    // Validate locally so obviously bad commands never reach the network.
    let command: Command = request.command_text.parse()?;
    command.validate()?;

    let image = tokio::fs::read(&request.image_path).await?;
    let format = ImageFormat::detect(&image)?;
    info!(
        path = %request.image_path.display(),
        %format,
        bytes = image.len(),
        "loaded image"
    );

    let client = ImageClient::new(request.server_addr.clone()).with_timeout(request.timeout);
    let reply = client.process(&command, &image).await?;

    let output = request
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(format));
    tokio::fs::write(&output, &reply).await?;
    info!(path = %output.display(), bytes = reply.len(), "saved result");
    Ok(output)
}

/// Human-readable explanation for a failed request.
pub fn describe_failure(err: &PixwireError) -> String {
    if pixwire_core::client::is_rejection(err) {
        format!("server closed the connection without a result ({err}); check the command and image")
    } else {
        err.to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pixwire_core::{
        ConnectionHandler, HandlerConfig, ImageBuffer, ImageCodec, RasterCodec, Server,
    };

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pixwire-client-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn output_path_follows_format() {
        assert_eq!(default_output_path(ImageFormat::Png), PathBuf::from("processed.png"));
        assert_eq!(default_output_path(ImageFormat::Jpeg), PathBuf::from("processed.jpeg"));
    }

    #[tokio::test]
    async fn bad_command_fails_before_connecting() {
        // Port 1 is never listening; a parse error must win.
        let err = run_client("127.0.0.1:1", "resize:0x10", Path::new("missing.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, PixwireError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn unsupported_input_is_refused() {
        let dir = scratch_dir("gif");
        let path = dir.join("input.gif");
        std::fs::write(&path, b"GIF89a\x01\x00\x01\x00").unwrap();

        let err = run_client("127.0.0.1:1", "blur:1", &path).await.unwrap_err();
        assert!(matches!(err, PixwireError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn round_trip_writes_output() {
        let handler = ConnectionHandler::new(Arc::new(RasterCodec::default()), HandlerConfig::default());
        let server = Server::bind("127.0.0.1:0", handler).await.unwrap();
        let addr = server.local_addr().unwrap();
        let stop = server.shutdown_token();
        let running = tokio::spawn(server.run());

        let dir = scratch_dir("roundtrip");
        let input = dir.join("input.png");
        let src = ImageBuffer::filled(4, 4, [10_000, 20_000, 30_000, 65_535]).unwrap();
        std::fs::write(&input, RasterCodec::default().encode(&src, ImageFormat::Png.into()).unwrap())
            .unwrap();

        let mut request = ClientRequest::new(addr.to_string(), "resize:2x3", &input);
        request.output = Some(dir.join("out.png"));
        let saved = send(&request).await.unwrap();

        let (out, encoding) = RasterCodec::default()
            .decode(&std::fs::read(&saved).unwrap())
            .unwrap();
        assert_eq!(encoding.format, ImageFormat::Png);
        assert_eq!(out.dimensions(), (2, 3));

        stop.cancel();
        running.await.unwrap().unwrap();
    }

    #[test]
    fn rejection_message_is_friendly() {
        let err = PixwireError::ShortRead {
            expected: 4,
            actual: 0,
        };
        assert!(describe_failure(&err).contains("closed the connection"));
    }
}
