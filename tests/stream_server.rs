use anyhow::Result;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use people_counter::{
    CameraSource, CounterConfig, FrameSource, PeopleCounter, SourceConfig, StreamConfig,
    StreamHandle, StreamServer,
};

fn read_response(stream: &mut TcpStream) -> Result<(String, String)> {
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    Ok((headers, body))
}

struct TestStream {
    counter: Arc<Mutex<PeopleCounter>>,
    handle: Option<StreamHandle>,
}

impl TestStream {
    fn new() -> Result<Self> {
        let mut source = CameraSource::new(SourceConfig {
            url: "stub://stream-test".to_string(),
            ..SourceConfig::default()
        })?;
        source.connect()?;
        let counter = Arc::new(Mutex::new(PeopleCounter::new(
            CounterConfig::default(),
            Box::new(source),
        )?));
        let cfg = StreamConfig {
            addr: "127.0.0.1:0".to_string(),
            target_fps: 0,
        };
        let handle = StreamServer::new(cfg, counter.clone()).spawn()?;
        Ok(Self {
            counter,
            handle: Some(handle),
        })
    }

    fn handle(&self) -> &StreamHandle {
        self.handle
            .as_ref()
            .expect("test stream handle should be initialized")
    }

    fn get(&self, path: &str) -> Result<(String, String)> {
        let mut stream = TcpStream::connect(self.handle().addr)?;
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        stream.write_all(request.as_bytes())?;
        read_response(&mut stream)
    }
}

impl Drop for TestStream {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().expect("failed to stop stream server");
        }
    }
}

fn occurrences(data: &[u8], needle: &[u8]) -> usize {
    data.windows(needle.len()).filter(|w| *w == needle).count()
}

/// Read from `stream` until `needle` was seen `count` times, or give up at `limit` bytes.
fn read_until(
    stream: &mut TcpStream,
    data: &mut Vec<u8>,
    needle: &[u8],
    count: usize,
    limit: usize,
) -> Result<()> {
    let mut buf = [0u8; 4096];
    while occurrences(data, needle) < count {
        if data.len() > limit {
            anyhow::bail!("marker not found {} times in first {} bytes", count, limit);
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            anyhow::bail!("connection closed before marker");
        }
        data.extend_from_slice(&buf[..n]);
    }
    Ok(())
}

#[test]
fn health_reports_source_state() -> Result<()> {
    let server = TestStream::new()?;
    let (headers, body) = server.get("/health")?;
    assert!(headers.contains("200 OK"));
    assert!(headers.contains("application/json"));

    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["source_healthy"], true);
    Ok(())
}

#[test]
fn counts_start_at_zero() -> Result<()> {
    let server = TestStream::new()?;
    let (headers, body) = server.get("/counts")?;
    assert!(headers.contains("200 OK"));

    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["enter"], 0);
    assert_eq!(value["leave"], 0);
    assert_eq!(value["cycles"], 0);
    Ok(())
}

#[test]
fn index_page_embeds_the_feed() -> Result<()> {
    let server = TestStream::new()?;
    let (headers, body) = server.get("/")?;
    assert!(headers.contains("200 OK"));
    assert!(headers.contains("text/html"));
    assert!(body.contains(r#"src="/video_feed""#));
    Ok(())
}

#[test]
fn unknown_path_is_not_found() -> Result<()> {
    let server = TestStream::new()?;
    let (headers, body) = server.get("/events")?;
    assert!(headers.contains("404 Not Found"));
    assert!(body.contains(r#""error":"not_found""#));
    Ok(())
}

#[test]
fn non_get_method_is_rejected() -> Result<()> {
    let server = TestStream::new()?;
    let mut stream = TcpStream::connect(server.handle().addr)?;
    stream.write_all(
        b"POST /counts HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
    )?;
    let (headers, body) = read_response(&mut stream)?;
    assert!(headers.contains("405 Method Not Allowed"));
    assert!(body.contains(r#""error":"method_not_allowed""#));
    Ok(())
}

#[test]
fn video_feed_streams_multipart_jpeg_frames() -> Result<()> {
    let server = TestStream::new()?;
    let mut stream = TcpStream::connect(server.handle().addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    stream.write_all(b"GET /video_feed HTTP/1.1\r\nHost: localhost\r\n\r\n")?;

    let part_header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    let mut data = Vec::new();
    read_until(&mut stream, &mut data, part_header, 2, 16 * 1024 * 1024)?;
    drop(stream);

    let text = String::from_utf8_lossy(&data);
    assert!(text.starts_with("HTTP/1.1 200 OK"));
    assert!(text.contains("multipart/x-mixed-replace; boundary=frame"));

    let start = data
        .windows(part_header.len())
        .position(|w| w == part_header)
        .expect("first part header present");
    let jpeg = &data[start + part_header.len()..];
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let cycles = server
        .counter
        .lock()
        .map_err(|_| anyhow::anyhow!("counter lock poisoned"))?
        .cycles();
    assert!(cycles >= 2);
    Ok(())
}
