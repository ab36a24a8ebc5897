//! httpwire - HTTP/1.x messages and blocking transports
//!
//! This crate models HTTP/1.x requests and responses, converts between raw
//! wire text and structured messages, and sends requests over
//! interchangeable blocking transports.

pub mod http;
