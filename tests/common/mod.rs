// tests/common/mod.rs

use std::collections::HashMap;
use std::io::{Cursor, Write};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zip::write::{ExtendedFileOptions, FileOptions};
use zip::CompressionMethod;

/// Minimal HTTP listener for fetch tests: serves fixed `(status, body)`
/// responses keyed by request path, 404 for anything else. Returns the base
/// URL of the listener.
pub async fn spawn_server(routes: HashMap<String, (u16, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let mut buf = vec![0u8; 8192];
            let n = sock.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

            let (status, body) = routes.get(&path).cloned().unwrap_or((404, Vec::new()));
            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                _ => "Internal Server Error",
            };
            let head = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            let _ = sock.write_all(head.as_bytes()).await;
            let _ = sock.write_all(&body).await;
            let _ = sock.shutdown().await;
        }
    });

    format!("http://{addr}/")
}

/// Build an in-memory zip with the given `(entry name, body)` pairs.
pub fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = FileOptions::<ExtendedFileOptions>::default()
            .compression_method(CompressionMethod::Stored);
        for (name, body) in entries {
            zip.start_file(*name, options.clone()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}
