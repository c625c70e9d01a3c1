//! MJPEG stream server.
//!
//! A blocking HTTP/1.1 server on std sockets. The accept loop runs on its own thread
//! and hands every connection to a dedicated viewer thread. All viewers pull frames
//! from one shared `PeopleCounter`; the lock is held for a whole cycle so the overlay
//! of each emitted frame matches the counts reported by `/counts`.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::pipeline::PeopleCounter;

const MAX_REQUEST_BYTES: usize = 8192;
const BOUNDARY: &str = "frame";

const INDEX_HTML: &str = "<!doctype html>
<html>
  <head><title>People Counter</title></head>
  <body>
    <h1>People Counter</h1>
    <img src=\"/video_feed\" alt=\"live feed\">
  </body>
</html>
";

#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub addr: String,
    /// Maximum frames per second sent to each viewer; 0 sends as fast as cycles run.
    pub target_fps: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
            target_fps: 20,
        }
    }
}

impl StreamConfig {
    fn frame_interval(&self) -> Option<Duration> {
        match self.target_fps {
            0 => None,
            fps => Some(Duration::from_secs(1) / fps),
        }
    }
}

#[derive(Debug)]
pub struct StreamHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Signal shutdown and wait for the accept loop and all viewers to finish.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("stream server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct StreamServer {
    cfg: StreamConfig,
    counter: Arc<Mutex<PeopleCounter>>,
}

impl StreamServer {
    pub fn new(cfg: StreamConfig, counter: Arc<Mutex<PeopleCounter>>) -> Self {
        Self { cfg, counter }
    }

    pub fn spawn(self) -> Result<StreamHandle> {
        let configured_addr: SocketAddr = self
            .cfg
            .addr
            .parse()
            .map_err(|e| anyhow!("invalid stream address '{}': {}", self.cfg.addr, e))?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        log::info!("stream server listening on http://{}", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_accept_loop(listener, self.cfg, self.counter, shutdown_thread) {
                log::error!("stream server stopped: {}", err);
            }
        });

        Ok(StreamHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_accept_loop(
    listener: TcpListener,
    cfg: StreamConfig,
    counter: Arc<Mutex<PeopleCounter>>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let frame_interval = cfg.frame_interval();
    let mut viewers: Vec<JoinHandle<()>> = Vec::new();
    let result = loop {
        if shutdown.load(Ordering::SeqCst) {
            break Ok(());
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let counter = counter.clone();
                let shutdown = shutdown.clone();
                viewers.retain(|viewer| !viewer.is_finished());
                viewers.push(std::thread::spawn(move || {
                    if let Err(err) =
                        handle_connection(stream, &counter, frame_interval, &shutdown)
                    {
                        log::warn!("stream request from {} rejected: {}", peer, err);
                    }
                }));
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => break Err(err.into()),
        }
    };
    shutdown.store(true, Ordering::SeqCst);
    for viewer in viewers {
        let _ = viewer.join();
    }
    result
}

fn handle_connection(
    mut stream: TcpStream,
    counter: &Mutex<PeopleCounter>,
    frame_interval: Option<Duration>,
    shutdown: &AtomicBool,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    let request = read_request(&mut stream)?;
    if request.method != "GET" {
        write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
        return Ok(());
    }
    match request.path.as_str() {
        "/" => write_response(
            &mut stream,
            200,
            "text/html; charset=utf-8",
            INDEX_HTML.as_bytes(),
        ),
        "/health" => {
            let source_healthy = lock_counter(counter)?.source_healthy();
            let payload = serde_json::to_vec(&HealthBody {
                status: "ok",
                source_healthy,
            })?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        "/counts" => {
            let body = {
                let counter = lock_counter(counter)?;
                let counts = counter.counts();
                CountsBody {
                    enter: counts.enter,
                    leave: counts.leave,
                    cycles: counter.cycles(),
                }
            };
            let payload = serde_json::to_vec(&body)?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        "/video_feed" => stream_mjpeg(&mut stream, counter, frame_interval, shutdown),
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    source_healthy: bool,
}

#[derive(Serialize)]
struct CountsBody {
    enter: u64,
    leave: u64,
    cycles: u64,
}

fn stream_mjpeg(
    stream: &mut TcpStream,
    counter: &Mutex<PeopleCounter>,
    frame_interval: Option<Duration>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={BOUNDARY}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(header.as_bytes())?;

    let mut sent = 0u64;
    while !shutdown.load(Ordering::SeqCst) {
        let started = Instant::now();
        let (jpeg, content_type) = {
            let mut counter = lock_counter(counter)?;
            match counter.next_frame() {
                Ok(jpeg) => (jpeg, counter.content_type()),
                Err(err) => {
                    log::warn!("viewer stream ended after {} frames: {:#}", sent, err);
                    return Ok(());
                }
            }
        };
        if let Err(err) = write_part(stream, content_type, &jpeg) {
            log::debug!("viewer disconnected after {} frames: {}", sent, err);
            return Ok(());
        }
        sent += 1;

        if let Some(interval) = frame_interval {
            let elapsed = started.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }
    Ok(())
}

/// One multipart part: boundary, part header, body, blank line.
fn write_part(out: &mut impl Write, content_type: &str, body: &[u8]) -> std::io::Result<()> {
    out.write_all(format!("--{BOUNDARY}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes())?;
    out.write_all(body)?;
    out.write_all(b"\r\n\r\n")?;
    out.flush()
}

fn lock_counter(counter: &Mutex<PeopleCounter>) -> Result<MutexGuard<'_, PeopleCounter>> {
    counter
        .lock()
        .map_err(|_| anyhow!("people counter lock poisoned"))
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let request_line = text
        .split("\r\n")
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
}
