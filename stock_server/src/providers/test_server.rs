//! Local HTTP/1.1 stub for exercising the adapters over a real socket.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use reqwest::blocking::Client;

/// Secret used by every adapter test; it must never show up in an error.
pub const API_KEY: &str = "secret-test-key";

/// Status and body to answer a request path (query included) with.
pub type Route = fn(&str) -> (u16, String);

pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// Paths of the requests served so far, query strings included.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serve `route` on a free loopback port until the test process exits.
pub fn serve(route: Route) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let seen = Arc::clone(&seen);
            thread::spawn(move || answer(stream, route, &seen));
        }
    });
    StubServer { base_url, requests }
}

fn answer(stream: TcpStream, route: Route, seen: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    // Drain the headers; GET requests carry no body.
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) if line == "\r\n" || line == "\n" => break,
            Ok(_) => {}
        }
    }
    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    seen.lock().unwrap().push(path.clone());

    let (status, body) = route(&path);
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Base URL of a loopback port nothing listens on.
pub fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn client() -> Client {
    super::http::build_client().unwrap()
}

/// Assert `err` comes from `provider`, mentions `needle` and keeps the key out.
pub fn assert_provider_failure(err: &stock_common::ProviderError, provider: &str, needle: &str) {
    assert_eq!(err.provider, provider);
    assert!(err.cause.contains(needle), "{:?} does not mention {:?}", err.cause, needle);
    assert!(!err.to_string().contains(API_KEY), "API key leaked: {}", err);
}

/// Answers every request with a server error.
pub fn server_error(_: &str) -> (u16, String) {
    (500, "boom".to_string())
}

/// Answers every request with a body that is not JSON.
pub fn not_json(_: &str) -> (u16, String) {
    (200, "<html>maintenance</html>".to_string())
}
