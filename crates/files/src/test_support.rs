//! Raw-socket HTTP server shared by this crate's tests.

use std::sync::{Arc, Mutex};

use chunkferry_notify::SharedToasts;
use chunkferry_transport::{HttpTransport, StaticCredential, TransportConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut expected = None;
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if expected.is_none()
            && let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n")
        {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            expected = Some(end + 4 + length);
        }
        if expected.is_some_and(|total| buf.len() >= total) {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serves one raw HTTP response per connection, in order.
pub(crate) async fn serve(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        for resp in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut stream).await;
            log.lock().unwrap().push(request);
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (url, seen)
}

pub(crate) fn json(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Transport against `url` with credential `secret`.
pub(crate) fn transport(url: &str) -> (HttpTransport, SharedToasts) {
    let toasts = SharedToasts::new();
    let transport = HttpTransport::new(
        TransportConfig {
            base_url: url.to_string(),
            ..TransportConfig::default()
        },
        Arc::new(StaticCredential::new(Some("secret".into()))),
        Arc::new(toasts.clone()),
    )
    .unwrap();
    (transport, toasts)
}
