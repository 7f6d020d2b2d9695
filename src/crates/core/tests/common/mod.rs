use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct CapturedRequest {
    pub request_line: String,
    pub body: Value,
}

/// Serves one request, answering with `chunks` as separate HTTP chunks.
pub async fn serve_once(status: u16, chunks: Vec<Vec<u8>>) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local test server");
    let addr = listener.local_addr().expect("local addr");

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept connection");
        let captured = read_request(&mut socket).await;

        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            status,
            if status == 200 { "OK" } else { "Error" }
        );
        socket.write_all(head.as_bytes()).await.expect("write head");

        for chunk in chunks {
            socket
                .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                .await
                .expect("write chunk size");
            socket.write_all(&chunk).await.expect("write chunk");
            socket.write_all(b"\r\n").await.expect("write chunk end");
            socket.flush().await.expect("flush");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        socket.write_all(b"0\r\n\r\n").await.expect("write last chunk");
        captured
    });

    (format!("http://{}", addr), server)
}

async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut buf).await.expect("read request");
        assert!(n > 0, "client closed before sending headers");
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while raw.len() < header_end + content_length {
        let n = socket.read(&mut buf).await.expect("read body");
        assert!(n > 0, "client closed before sending body");
        raw.extend_from_slice(&buf[..n]);
    }

    let body = &raw[header_end..header_end + content_length];
    CapturedRequest {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: serde_json::from_slice(body).unwrap_or(Value::Null),
    }
}
