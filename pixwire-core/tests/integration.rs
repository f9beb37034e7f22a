//! Integration tests: full request round-trips, worker-pool behavior
//! and error scenarios over real TCP connections on localhost.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pixwire_core::frame::{read_frame, write_frame};
use pixwire_core::transform::MID_GRAY;
use pixwire_core::{
    Command, ConnectionHandler, HandlerConfig, ImageBuffer, ImageClient, ImageCodec, ImageFormat,
    MAX_FRAME_SIZE, PixwireError, PoolStats, RasterCodec, Server, WORKER_COUNT,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ── Helpers ──────────────────────────────────────────────────────

struct TestServer {
    addr: SocketAddr,
    stats: Arc<PoolStats>,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), PixwireError>>,
}

impl TestServer {
    async fn stop(self) -> Arc<PoolStats> {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
        self.stats
    }
}

/// Start a server on an OS-assigned port.
async fn spawn_server(config: HandlerConfig) -> TestServer {
    let handler = ConnectionHandler::new(Arc::new(RasterCodec::default()), config);
    let server = Server::bind("127.0.0.1:0", handler).await.unwrap();
    let addr = server.local_addr().unwrap();
    let stats = server.stats();
    let shutdown = server.shutdown_token();
    let handle = tokio::spawn(server.run());
    TestServer {
        addr,
        stats,
        shutdown,
        handle,
    }
}

fn encode(buf: &ImageBuffer, format: ImageFormat) -> Vec<u8> {
    RasterCodec::default().encode(buf, format.into()).unwrap()
}

fn decode(bytes: &[u8]) -> (ImageBuffer, ImageFormat) {
    let (buf, encoding) = RasterCodec::default().decode(bytes).unwrap();
    (buf, encoding.format)
}

/// 8-bit RGB PNG as most tools write it.
fn rgb8_png(img: image::RgbImage) -> Vec<u8> {
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

// ── Round-trips ──────────────────────────────────────────────────

#[tokio::test]
async fn test_contrast_on_mid_gray_png_is_identity() {
    let server = spawn_server(HandlerConfig::default()).await;
    let client = ImageClient::new(server.addr.to_string());

    let gray = ImageBuffer::filled(2, 2, [MID_GRAY, MID_GRAY, MID_GRAY, 65_535]).unwrap();
    let command: Command = "contrast:1.5".parse().unwrap();
    let reply = client
        .process(&command, &encode(&gray, ImageFormat::Png))
        .await
        .unwrap();

    let (out, format) = decode(&reply);
    assert_eq!(format, ImageFormat::Png);
    assert_eq!(out, gray);

    let stats = server.stop().await;
    assert_eq!(stats.completed(), 1);
}

#[tokio::test]
async fn test_resize_round_trip() {
    let server = spawn_server(HandlerConfig::default()).await;
    let client = ImageClient::new(server.addr.to_string());

    let src = ImageBuffer::from_fn(10, 4, |x, y| [x as u16 * 6000, y as u16 * 16000, 0, 65_535])
        .unwrap();
    let reply = client
        .process_text("resize:3x7", &encode(&src, ImageFormat::Png))
        .await
        .unwrap();

    let (out, _) = decode(&reply);
    assert_eq!(out.dimensions(), (3, 7));
    server.stop().await;
}

#[tokio::test]
async fn test_jpeg_stays_jpeg() {
    let server = spawn_server(HandlerConfig::default()).await;
    let client = ImageClient::new(server.addr.to_string());

    let src = ImageBuffer::filled(16, 16, [50_000, 30_000, 10_000, 65_535]).unwrap();
    let reply = client
        .process(&Command::Blur { radius: 2 }, &encode(&src, ImageFormat::Jpeg))
        .await
        .unwrap();

    let (out, format) = decode(&reply);
    assert_eq!(format, ImageFormat::Jpeg);
    assert_eq!(out.dimensions(), (16, 16));
    server.stop().await;
}

#[tokio::test]
async fn test_eight_bit_png_comes_back_eight_bit() {
    let server = spawn_server(HandlerConfig::default()).await;
    let client = ImageClient::new(server.addr.to_string());

    let src = image::RgbImage::from_fn(2, 2, |x, _| {
        let v = if x == 0 { 0 } else { 255 };
        image::Rgb([v, 255 - v, v])
    });
    let reply = client
        .process_text("contrast:1.5", &rgb8_png(src.clone()))
        .await
        .unwrap();

    let back = image::load_from_memory(&reply).unwrap();
    assert_eq!(back.color(), image::ColorType::Rgb8);
    assert_eq!(back.to_rgb8(), src);
    server.stop().await;
}

#[tokio::test]
async fn test_identity_response_fits_when_request_did() {
    // Noise defeats compression, so any widening would show in the size.
    let mut seed = 0x2545_F491u32;
    let src = image::RgbImage::from_fn(128, 128, |_, _| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [a, b, c, _] = seed.to_le_bytes();
        image::Rgb([a, b, c])
    });
    let input = rgb8_png(src.clone());
    let server = spawn_server(HandlerConfig {
        max_frame_size: input.len() * 2,
        ..HandlerConfig::default()
    })
    .await;
    let client = ImageClient::new(server.addr.to_string());

    let reply = client.process_text("contrast:1.0", &input).await.unwrap();
    assert!(reply.len() <= input.len() * 2);
    let back = image::load_from_memory(&reply).unwrap();
    assert_eq!(back.color(), image::ColorType::Rgb8);
    assert_eq!(back.to_rgb8(), src);

    let stats = server.stop().await;
    assert_eq!(stats.completed(), 1);
}

#[tokio::test]
async fn test_huge_resize_is_refused() {
    let server = spawn_server(HandlerConfig::default()).await;
    let client = ImageClient::new(server.addr.to_string());
    let image = encode(&ImageBuffer::filled(1, 1, [0; 4]).unwrap(), ImageFormat::Png);

    // Parses, but 16384x16384 is far over the pixel budget.
    let err = client
        .process_text("resize:16384x16384", &image)
        .await
        .unwrap_err();
    assert!(pixwire_core::client::is_rejection(&err), "{err}");

    let stats = server.stop().await;
    assert_eq!(stats.failed(), 1);
}

// ── Worker pool ──────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hundred_concurrent_clients() {
    let server = spawn_server(HandlerConfig::default()).await;
    let image = encode(
        &ImageBuffer::filled(1, 1, [1, 2, 3, 4]).unwrap(),
        ImageFormat::Png,
    );

    let mut tasks = Vec::new();
    for i in 0..100u32 {
        let client = ImageClient::new(server.addr.to_string());
        let image = image.clone();
        let command = match i % 3 {
            0 => Command::Blur { radius: 1 },
            1 => Command::Resize { width: 1, height: 1 },
            _ => Command::Contrast { factor: 2.0 },
        };
        tasks.push(tokio::spawn(async move {
            client.process(&command, &image).await
        }));
    }

    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        let (out, format) = decode(&reply);
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(out.dimensions(), (1, 1));
    }

    let stats = server.stop().await;
    assert_eq!(stats.completed(), 100);
    assert_eq!(stats.failed(), 0);
    assert_eq!(stats.worker_count(), WORKER_COUNT);
    assert!(stats.max_peak() <= 1, "a worker ran two connections at once");
}

// ── Error scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn test_bad_requests_get_no_response_and_server_keeps_serving() {
    let server = spawn_server(HandlerConfig::default()).await;
    let client = ImageClient::new(server.addr.to_string());
    let image = encode(&ImageBuffer::filled(2, 2, [0; 4]).unwrap(), ImageFormat::Png);

    for bad in ["resize:0x10", "blur:-1", "contrast:notanumber", "rotate:90"] {
        let err = client.process_text(bad, &image).await.unwrap_err();
        assert!(pixwire_core::client::is_rejection(&err), "{bad}: {err}");
    }

    let err = client
        .process_text("blur:1", b"GIF89a not really")
        .await
        .unwrap_err();
    assert!(pixwire_core::client::is_rejection(&err));

    let reply = client
        .process(&Command::Blur { radius: 1 }, &image)
        .await
        .unwrap();
    assert_eq!(decode(&reply).0.dimensions(), (2, 2));

    let stats = server.stop().await;
    assert_eq!(stats.failed(), 5);
    assert_eq!(stats.completed(), 1);
}

#[tokio::test]
async fn test_garbage_stream_is_closed() {
    let server = spawn_server(HandlerConfig {
        max_frame_size: 1024,
        ..HandlerConfig::default()
    })
    .await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    // Declares a 4 GiB frame.
    tokio::io::AsyncWriteExt::write_all(&mut stream, &[0xFF; 8])
        .await
        .unwrap();

    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
    assert!(rest.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn test_silent_client_is_disconnected() {
    let server = spawn_server(HandlerConfig {
        read_timeout: Duration::from_millis(100),
        ..HandlerConfig::default()
    })
    .await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    write_frame(&mut stream, b"blur:1").await.unwrap();
    // Never send the image.

    let closed = tokio::time::timeout(Duration::from_secs(5), read_frame(&mut stream, MAX_FRAME_SIZE))
        .await
        .expect("server should hang up after its read deadline");
    assert!(matches!(closed, Err(PixwireError::ShortRead { actual: 0, .. })));

    let stats = server.stop().await;
    assert_eq!(stats.failed(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = spawn_server(HandlerConfig::default()).await;
    let addr = server.addr;
    server.stop().await;

    assert!(TcpStream::connect(addr).await.is_err());
}
