//! Shared test doubles: in-memory embedder/store and a scripted HTTP server.
#![allow(dead_code)]

use async_trait::async_trait;
use ragtrace::config::StoreConfig;
use ragtrace::rag::{Embedder, InputType, RetrievedChunk, Sleeper, VectorSearchRequest, VectorStore};
use ragtrace::{RagError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Embedder returning a fixed outcome
pub struct FakeEmbedder {
    outcome: std::result::Result<Vec<f32>, String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn ok(dimensions: usize) -> Self {
        Self {
            outcome: Ok(vec![0.1; dimensions]),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            outcome: Err(detail.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, _text: &str, input_type: InputType) -> Result<Vec<f32>> {
        assert_eq!(input_type, InputType::Query);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone().map_err(|detail| RagError::EmbeddingApi {
            status: 503,
            detail,
        })
    }
}

/// Store returning fixed chunks and recording requests
pub struct FakeStore {
    outcome: std::result::Result<Vec<RetrievedChunk>, String>,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<(String, VectorSearchRequest)>>,
}

impl FakeStore {
    pub fn ok(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            outcome: Ok(chunks),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn search(
        &self,
        connection_string: &str,
        request: &VectorSearchRequest,
    ) -> Result<Vec<RetrievedChunk>> {
        self.requests
            .lock()
            .unwrap()
            .push((connection_string.to_string(), request.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone().map_err(RagError::Store)
    }
}

/// Records requested backoff delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Store settings with a connection string present
pub fn connected_settings(top_k: usize) -> StoreConfig {
    StoreConfig {
        connection_string: Some("mongodb://localhost:27017/kb".to_string()),
        top_k,
        ..Default::default()
    }
}

pub fn scored_chunks(texts: &[(&str, f64)]) -> Vec<RetrievedChunk> {
    texts
        .iter()
        .map(|(text, score)| RetrievedChunk::new(*text, Some(*score)))
        .collect()
}

/// Scripted reply for one HTTP connection
#[derive(Debug, Clone)]
pub enum MockReply {
    Json { status: u16, body: String },
    /// Accept the request and never answer
    Hang,
}

impl MockReply {
    pub fn json(status: u16, body: &str) -> Self {
        MockReply::Json {
            status,
            body: body.to_string(),
        }
    }
}

/// Minimal HTTP/1.1 server answering each connection with the next reply.
/// The last reply repeats once the script runs out.
pub struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let reply = replies[served.min(replies.len() - 1)].clone();
                served += 1;
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    handle(stream, reply, recorded).await;
                });
            }
        });

        Self {
            url: format!("http://{}/v1/embeddings", addr),
            requests,
        }
    }

    /// Raw requests received so far (head and body)
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(mut stream: TcpStream, reply: MockReply, recorded: Arc<Mutex<Vec<String>>>) {
    let request = read_request(&mut stream).await;
    recorded.lock().unwrap().push(request);

    match reply {
        MockReply::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        MockReply::Json { status, body } => {
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason(status),
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&buf).to_string();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).to_string()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
