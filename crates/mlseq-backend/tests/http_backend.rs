//! Integration tests for the HTTP conversion client.
//!
//! Each test starts a minimal HTTP responder on a dynamic port and points the
//! client at it.
//!
//! ```bash
//! cargo test -p mlseq-backend --test http_backend
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use mlseq_backend::HttpBackend;
use mlseq_core::{
    BackendConfig, ConversionBackend, ConvertError, ConvertRequest, ModelFormat, OptionValue,
    Payload, SERVER_UNAVAILABLE_MESSAGE,
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const CATALOG: &str = r#"{
    "piano": { "format": "midi", "description": "Piano", "parameters": {} },
    "singer": {
        "format": "midi",
        "description": "Singing voice",
        "parameters": { "speaker": { "type": "enum", "values": ["a", "b"] } },
        "midi_parameters": ["lyrics"]
    }
}"#;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    body: String,
}

type Route = Arc<dyn Fn(&str) -> (u16, Vec<u8>) + Send + Sync>;

/// Serves every connection with `route(path)` and records the requests.
struct Responder {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Responder {
    async fn start(route: Route) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let route = Arc::clone(&route);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    serve(stream, route, log).await;
                });
            }
        });

        Self { url, requests }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve(mut stream: TcpStream, route: Route, log: Arc<Mutex<Vec<Recorded>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let lower = head.to_ascii_lowercase();
    let content_length = lower
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok());
    let chunked = lower.contains("transfer-encoding: chunked");

    loop {
        let body = &buf[header_end..];
        let complete = match content_length {
            Some(len) => body.len() >= len,
            None if chunked => body.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    let (status, payload) = route(&path);
    log.lock().unwrap().push(Recorded { method, path, body });

    let head = format!(
        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        status,
        payload.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(&payload).await;
    let _ = stream.shutdown().await;
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// A URL nothing listens on.
async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

fn backend(url: &str, backup: Option<&str>) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        url: url.to_string(),
        backup_url: backup.map(str::to_string),
        request_timeout_ms: Some(5_000),
    })
    .unwrap()
}

fn request(model: &str) -> ConvertRequest {
    let mut options = BTreeMap::new();
    options.insert("speaker".to_string(), OptionValue::Str("a".into()));
    ConvertRequest {
        model: model.to_string(),
        payload: Payload {
            format: ModelFormat::Midi,
            bytes: b"MThd-payload".to_vec(),
            mime: "application/octet-stream",
        },
        options,
        bpm: 96.0,
    }
}

fn catalog_route() -> Route {
    Arc::new(|path: &str| {
        if path == "/models" {
            (200, CATALOG.as_bytes().to_vec())
        } else {
            (200, b"RIFF-audio".to_vec())
        }
    })
}

#[tokio::test]
async fn convert_posts_multipart_and_returns_audio() {
    let server = Responder::start(catalog_route()).await;
    let client = backend(&server.url, None);

    let audio = client.convert(request("singer")).await.unwrap();
    assert_eq!(audio, b"RIFF-audio".to_vec());

    let recorded = server.requests();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, "POST");
    assert_eq!(recorded[0].path, "/convert/singer");

    let body = &recorded[0].body;
    assert!(body.contains(r#"name="midi""#));
    assert!(body.contains("MThd-payload"));
    assert!(body.contains(r#"name="options""#));
    assert!(body.contains(r#"{"speaker":"a"}"#));
    assert!(body.contains(r#"name="bpm""#));
    assert!(body.contains("96"));
}

#[tokio::test]
async fn non_success_status_fails_conversion() {
    let server = Responder::start(Arc::new(|_: &str| (503, b"busy".to_vec()))).await;
    let client = backend(&server.url, None);

    let err = client.convert(request("piano")).await.unwrap_err();
    assert_eq!(err, ConvertError::Status { status: 503 });
    assert!(!err.is_abort());
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let client = backend(&dead_url().await, None);

    let err = client.convert(request("piano")).await.unwrap_err();
    assert!(matches!(err, ConvertError::Transport(_)));
}

#[tokio::test]
async fn list_models_parses_catalog() {
    let server = Responder::start(catalog_route()).await;
    let client = backend(&server.url, None);

    let catalog = client.list_models().await.unwrap();
    assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["piano", "singer"]);
    assert!(catalog["singer"].has_midi_param("lyrics"));
    assert_eq!(server.requests()[0].method, "GET");
}

#[tokio::test]
async fn discovery_falls_back_to_backup_and_switches() {
    let primary = dead_url().await;
    let backup = Responder::start(catalog_route()).await;
    let client = backend(&primary, Some(&backup.url));

    let catalog = client.list_models().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(client.active_url(), backup.url);

    client.convert(request("piano")).await.unwrap();
    let paths: Vec<String> = backup.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/models".to_string(), "/convert/piano".to_string()]);
}

#[tokio::test]
async fn discovery_failure_is_reported_as_message() {
    let client = backend(&dead_url().await, Some(&dead_url().await));

    let err = client.list_models().await.unwrap_err();
    assert_eq!(err.user_message(), SERVER_UNAVAILABLE_MESSAGE);
}

#[tokio::test]
async fn bad_status_during_discovery_tries_backup() {
    let primary = Responder::start(Arc::new(|_: &str| (500, Vec::new()))).await;
    let backup = Responder::start(catalog_route()).await;
    let client = backend(&primary.url, Some(&backup.url));

    assert!(client.list_models().await.is_ok());
    assert_eq!(primary.requests().len(), 1);
    assert_eq!(client.active_url(), backup.url);
}
