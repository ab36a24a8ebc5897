//! Loopback servers shared by the integration tests

#![allow(dead_code)]

use openssl::pkey::PKey;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::X509;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// Self-signed certificate and key for CN=example.com
pub const EXAMPLE_COM_PEM: &str = include_str!("example_com.pem");

/// Read one request: the header block plus a `Content-Length` body
pub fn read_request<S: Read>(stream: &mut S) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 512];

    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "client closed before finishing the request");
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let length = head
        .lines()
        .find_map(|line| {
            let (label, value) = line.split_once(':')?;
            if label.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    while data.len() < head_end + length {
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "client closed before sending the body");
        data.extend_from_slice(&buf[..n]);
    }

    String::from_utf8_lossy(&data).into_owned()
}

/// Serve `connections` plain connections, one request each.
///
/// The handler gets the raw request and returns the raw response bytes; the
/// connection is closed after the response is written. The join handle yields
/// every request seen.
pub fn serve<F>(connections: usize, mut handler: F) -> (SocketAddr, JoinHandle<Vec<String>>)
where
    F: FnMut(&str) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = handler(&request);
            stream.write_all(&response).unwrap();
            seen.push(request);
        }
        seen
    });

    (addr, handle)
}

fn acceptor() -> SslAcceptor {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
    builder
        .set_certificate(&X509::from_pem(EXAMPLE_COM_PEM.as_bytes()).unwrap())
        .unwrap();
    builder
        .set_private_key(&PKey::private_key_from_pem(EXAMPLE_COM_PEM.as_bytes()).unwrap())
        .unwrap();
    builder.build()
}

/// Accept one connection and attempt a TLS handshake the client is expected
/// to abort; yields whether the handshake completed
pub fn tls_handshake_only() -> (SocketAddr, JoinHandle<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = acceptor();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        acceptor.accept(stream).is_ok()
    });

    (addr, handle)
}

/// Like `serve`, over TLS with the example.com certificate
pub fn serve_tls<F>(connections: usize, mut handler: F) -> (SocketAddr, JoinHandle<Vec<String>>)
where
    F: FnMut(&str) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = acceptor();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..connections {
            let (stream, _) = listener.accept().unwrap();
            let mut tls = acceptor.accept(stream).unwrap();
            let request = read_request(&mut tls);
            let response = handler(&request);
            tls.write_all(&response).unwrap();
            tls.shutdown().ok();
            seen.push(request);
        }
        seen
    });

    (addr, handle)
}

/// An address nothing listens on
pub fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A server that accepts and then stays silent for `hold`
pub fn silent(hold: std::time::Duration) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (stream, _): (TcpStream, _) = listener.accept().unwrap();
        thread::sleep(hold);
        drop(stream);
    });

    (addr, handle)
}

pub fn text_response(status_line: &str, body: &str) -> Vec<u8> {
    format!(
        "{}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
    .into_bytes()
}
