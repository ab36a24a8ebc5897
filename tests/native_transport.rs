//! Integration tests for the native transport
//!
//! Covers plain and TLS exchanges, content decoding and the single retry
//! without content encoding.

mod common;

use common::{closed_port, serve, serve_tls, text_response, tls_handshake_only};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use httpwire::http::transport::native::{COULDNT_CONNECT, RECV_ERROR, SSL_CONNECT_ERROR};
use httpwire::http::transport::{NativeOptions, NativeTransport};
use httpwire::http::{Error, HttpMessage, Method, Request, Status, Transport, Uri};
use std::io::Write;
use std::net::SocketAddr;

fn request(method: Method, url: &str, body: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(Uri::parse(url).unwrap())
        .header("Accept", "*/*")
        .body(body.to_string())
        .build()
        .unwrap()
}

fn url(scheme: &str, addr: SocketAddr, path: &str) -> String {
    format!("{}://{}{}", scheme, addr, path)
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn encoded_response(encoding: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: {}\r\nContent-Length: {}\r\n\r\n",
        encoding,
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

#[test]
fn test_native_get() {
    let (addr, server) = serve(1, |_| text_response("HTTP/1.1 200 OK", "plain"));

    let options = NativeOptions::default()
        .with_overrides([("useragent", "fetch/1.0")])
        .unwrap();
    let mut transport = NativeTransport::with_options(options);
    let response = transport
        .send(&request(Method::Get, &url("http", addr, "/index?q=1"), ""))
        .unwrap();

    assert_eq!(response.status(), Status::OK);
    assert_eq!(response.body(), b"plain");

    let seen = server.join().unwrap();
    let sent = &seen[0];
    assert!(sent.starts_with("GET /index?q=1 HTTP/1.1\r\n"));
    assert!(sent.contains(&format!("Host: {}\r\n", addr)));
    assert!(sent.contains("User-Agent: fetch/1.0\r\n"));
    assert!(sent.contains("Accept-Encoding: gzip, deflate\r\n"));
    assert!(sent.contains("Accept: */*\r\n"));
}

#[test]
fn test_native_post_and_put_carry_body() {
    let (addr, server) = serve(2, |request| {
        let body = request.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
        text_response("HTTP/1.1 200 OK", &body)
    });

    let mut transport = NativeTransport::new();
    let post = transport
        .send(&request(Method::Post, &url("http", addr, "/form"), "a=1&b=2"))
        .unwrap();
    assert_eq!(post.body(), b"a=1&b=2");

    let put = transport
        .send(&request(Method::Put, &url("http", addr, "/doc"), "{}"))
        .unwrap();
    assert_eq!(put.body(), b"{}");

    let seen = server.join().unwrap();
    assert!(seen[0].starts_with("POST /form HTTP/1.1\r\n"));
    assert!(seen[0].contains("Content-Length: 7\r\n"));
    assert!(seen[1].starts_with("PUT /doc HTTP/1.1\r\n"));
    assert!(seen[1].contains("Content-Length: 2\r\n"));
}

#[test]
fn test_native_get_sends_no_body() {
    let (addr, server) = serve(1, |_| text_response("HTTP/1.1 200 OK", "ok"));

    let mut transport = NativeTransport::new();
    transport
        .send(&request(Method::Get, &url("http", addr, "/"), "ignored"))
        .unwrap();

    let seen = server.join().unwrap();
    assert!(seen[0].ends_with("\r\n\r\n"));
    assert!(!seen[0].contains("ignored"));
}

#[test]
fn test_native_head_reads_no_body() {
    let (addr, server) = serve(1, |_| text_response("HTTP/1.1 200 OK", "should not be read"));

    let mut transport = NativeTransport::new();
    let response = transport
        .send(&request(Method::Head, &url("http", addr, "/"), ""))
        .unwrap();

    assert_eq!(response.status(), Status::OK);
    assert_eq!(response.body(), b"");
    assert_eq!(response.headers().get("Content-Length").unwrap(), "18");
    assert!(server.join().unwrap()[0].starts_with("HEAD / HTTP/1.1\r\n"));
}

#[test]
fn test_native_decodes_gzip_and_deflate() {
    let (addr, server) = serve(2, |request| {
        if request.starts_with("GET /gzip") {
            encoded_response("gzip", &gzip(b"zipped body"))
        } else {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(b"deflated body").unwrap();
            encoded_response("deflate", &encoder.finish().unwrap())
        }
    });

    let mut transport = NativeTransport::new();
    let zipped = transport
        .send(&request(Method::Get, &url("http", addr, "/gzip"), ""))
        .unwrap();
    assert_eq!(zipped.body(), b"zipped body");

    let deflated = transport
        .send(&request(Method::Get, &url("http", addr, "/deflate"), ""))
        .unwrap();
    assert_eq!(deflated.body(), b"deflated body");

    server.join().unwrap();
}

#[test]
fn test_native_retries_without_encoding() {
    // a broken gzip body first, plain text once encoding is turned off
    let (addr, server) = serve(2, |request| {
        if request.contains("Accept-Encoding") {
            encoded_response("gzip", b"\x1f\x8b broken")
        } else {
            text_response("HTTP/1.1 200 OK", "identity body")
        }
    });

    let mut transport = NativeTransport::new();
    let response = transport
        .send(&request(Method::Get, &url("http", addr, "/"), ""))
        .unwrap();
    assert_eq!(response.body(), b"identity body");

    let seen = server.join().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].contains("Accept-Encoding: gzip, deflate\r\n"));
    assert!(!seen[1].contains("Accept-Encoding"));
}

#[test]
fn test_native_retry_keeps_raw_body() {
    // the server ignores Accept-Encoding, so the retry sees the same bytes
    let (addr, server) = serve(2, |_| encoded_response("gzip", b"\x1f\x8b broken"));

    let mut transport = NativeTransport::new();
    let response = transport
        .send(&request(Method::Get, &url("http", addr, "/"), ""))
        .unwrap();

    assert_eq!(response.body(), b"\x1f\x8b broken");
    assert_eq!(response.headers().get("Content-Encoding").unwrap(), "gzip");
    assert_eq!(server.join().unwrap().len(), 2);
}

#[test]
fn test_native_retry_happens_once() {
    // the retry fails with a header block that is not text
    let (addr, server) = serve(2, |request| {
        if request.contains("Accept-Encoding") {
            encoded_response("gzip", b"\x1f\x8b broken")
        } else {
            b"HTTP/1.1 200 \xffK\r\n\r\n".to_vec()
        }
    });

    let mut transport = NativeTransport::new();
    match transport.send(&request(Method::Get, &url("http", addr, "/"), "")) {
        Err(Error::Transport { code, .. }) => assert_eq!(code, RECV_ERROR),
        other => panic!("expected a transport error, got {:?}", other),
    }
    assert_eq!(server.join().unwrap().len(), 2);
}

#[test]
fn test_native_binary_bodies() {
    let (addr, server) = serve(2, |request| {
        if request.starts_with("PUT") {
            b"HTTP/1.1 204 No Content\r\n\r\n".to_vec()
        } else {
            let mut response =
                b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 4\r\n\r\n".to_vec();
            response.extend_from_slice(b"\x89P\xff\x00");
            response
        }
    });

    let mut transport = NativeTransport::new();
    let png = transport
        .send(&request(Method::Get, &url("http", addr, "/logo.png"), ""))
        .unwrap();
    assert_eq!(png.headers().get("Content-Type").unwrap(), "image/png");
    assert_eq!(png.body(), b"\x89P\xff\x00");

    let upload = Request::builder()
        .method(Method::Put)
        .uri(Uri::parse(&url("http", addr, "/blob")).unwrap())
        .body(vec![0xfeu8, 0x00, 0xff])
        .build()
        .unwrap();
    let response = transport.send(&upload).unwrap();
    assert_eq!(response.status(), Status::NO_CONTENT);

    let seen = server.join().unwrap();
    assert!(seen[1].contains("Content-Length: 3\r\n"));
    assert!(seen[1].ends_with("\r\n\r\n\u{fffd}\u{0}\u{fffd}"));
}

#[test]
fn test_native_connect_failure() {
    let addr = closed_port();

    let mut transport = NativeTransport::new();
    match transport.send(&request(Method::Get, &url("http", addr, "/"), "")) {
        Err(Error::Transport { code, message }) => {
            assert_eq!(code, COULDNT_CONNECT);
            assert!(message.contains(&addr.port().to_string()));
        }
        other => panic!("expected a transport error, got {:?}", other),
    }
}

#[test]
fn test_native_https() {
    let (addr, server) = serve_tls(1, |_| text_response("HTTP/1.1 200 OK", "secret"));

    let mut transport = NativeTransport::new();
    let response = transport
        .send(&request(Method::Get, &url("https", addr, "/secure"), ""))
        .unwrap();

    assert_eq!(response.body(), b"secret");
    assert!(server.join().unwrap()[0].starts_with("GET /secure HTTP/1.1\r\n"));
}

#[test]
fn test_native_https_verify_peer() {
    let (addr, server) = tls_handshake_only();

    // the example.com certificate is self-signed
    let options = NativeOptions::default().verify_peer(true);
    let mut transport = NativeTransport::with_options(options);

    match transport.send(&request(Method::Get, &url("https", addr, "/"), "")) {
        Err(Error::Transport { code, .. }) => assert_eq!(code, SSL_CONNECT_ERROR),
        other => panic!("expected a TLS failure, got {:?}", other),
    }
    assert!(!server.join().unwrap());
}

#[test]
fn test_native_https_verify_host() {
    let (addr, server) = tls_handshake_only();

    let dir = tempfile::tempdir().unwrap();
    let ca_path = dir.path().join("ca.pem");
    std::fs::write(&ca_path, common::EXAMPLE_COM_PEM).unwrap();

    // trusted chain, but issued for example.com rather than 127.0.0.1
    let options = NativeOptions::default()
        .verify_peer(true)
        .verify_host(true)
        .ca_file(&ca_path);
    let mut transport = NativeTransport::with_options(options);

    match transport.send(&request(Method::Get, &url("https", addr, "/"), "")) {
        Err(Error::Transport { code, .. }) => assert_eq!(code, SSL_CONNECT_ERROR),
        other => panic!("expected a TLS failure, got {:?}", other),
    }
    assert!(!server.join().unwrap());
}

#[test]
fn test_native_https_trusted_ca_file() {
    let (addr, server) = serve_tls(1, |_| text_response("HTTP/1.1 200 OK", "trusted"));

    let dir = tempfile::tempdir().unwrap();
    let ca_path = dir.path().join("ca.pem");
    std::fs::write(&ca_path, common::EXAMPLE_COM_PEM).unwrap();

    let options = NativeOptions::default().verify_peer(true).ca_file(&ca_path);
    let mut transport = NativeTransport::with_options(options);

    let response = transport
        .send(&request(Method::Get, &url("https", addr, "/"), ""))
        .unwrap();
    assert_eq!(response.body(), b"trusted");
    server.join().unwrap();
}
