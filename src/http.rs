//! The HTTP admin surface: GET/DELETE only, one list endpoint
//! and one per-metric endpoint per metric type.
//!
//! Built on `tiny_http` (`Request`/`Response`/`Header`) and the
//! `thread.rs` mio-backed graceful-shutdown pattern. Response shapes
//! (JSON bodies, 404/405 behavior, the `Allow:` header) mirror a
//! reference statsd daemon's admin handlers.

use std::io::Cursor;
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use mio;
use serde_json::Value;
use tiny_http;

use aggregator::{CellView, Command};
use constants;
use error::Error;
use metric::MetricType;
use thread::{self, ThreadHandle};

/// HTTP response. Alias of `tiny_http::Response` over an in-memory body.
pub type Response = tiny_http::Response<Cursor<Vec<u8>>>;

const TYPES: [MetricType; 4] = [
    MetricType::Counter,
    MetricType::Gauge,
    MetricType::Timer,
    MetricType::Set,
];

/// Start the HTTP admin server on `host:port`, dispatching registry
/// reads and deletes to the aggregator via `commands`. Returns a
/// handle that can be gracefully `shutdown()`.
pub fn serve(host_port: String, commands: Sender<Command>) -> ThreadHandle {
    thread::spawn(move |poll| {
        let server = match tiny_http::Server::http(&host_port) {
            Ok(s) => s,
            Err(e) => {
                let err = Error::FatalInit(format!(
                    "failed to bind HTTP admin surface on {}: {}",
                    host_port, e
                ));
                error!("{}", err);
                return;
            }
        };
        info!("HTTP admin surface listening on {}", host_port);

        loop {
            // Non-blocking check for the shutdown signal between polls
            // of the HTTP socket, the same cooperative-shutdown
            // convention every mio-backed thread here uses.
            let mut events = mio::Events::with_capacity(8);
            if poll.poll(&mut events, Some(Duration::from_millis(0))).is_ok()
                && events.iter().any(|e| e.token() == constants::SYSTEM)
            {
                return;
            }

            match server.recv_timeout(Duration::from_millis(200)) {
                Ok(Some(request)) => handle(request, &commands),
                Ok(None) => continue,
                Err(e) => {
                    error!("HTTP recv failed: {}", e);
                    return;
                }
            }
        }
    })
}

fn handle(request: tiny_http::Request, commands: &Sender<Command>) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let mut segments = url.trim_start_matches('/').splitn(2, '/');
    let type_path = segments.next().unwrap_or("");
    let name = segments.next();

    let kind = TYPES.iter().find(|t| t.path_component() == type_path).copied();

    let kind = match kind {
        Some(k) => k,
        None => {
            let _ = request.respond(not_found());
            return;
        }
    };

    match name {
        None => handle_list(request, commands, kind, &method),
        Some(name) => handle_single(request, commands, kind, name, &method),
    }
}

fn handle_list(
    request: tiny_http::Request,
    commands: &Sender<Command>,
    kind: MetricType,
    method: &tiny_http::Method,
) {
    if *method != tiny_http::Method::Get {
        let _ = request.respond(method_not_allowed(&["GET"]));
        return;
    }
    let (reply_tx, reply_rx) = mpsc::channel();
    if commands
        .send(Command::HttpList {
            kind,
            reply: reply_tx,
        })
        .is_err()
    {
        let _ = request.respond(server_error());
        return;
    }
    let names = reply_rx.recv().unwrap_or_default();
    let body = serde_json::to_vec(&names).unwrap_or_else(|_| b"[]".to_vec());
    let _ = request.respond(json_response(body));
}

fn handle_single(
    request: tiny_http::Request,
    commands: &Sender<Command>,
    kind: MetricType,
    name: &str,
    method: &tiny_http::Method,
) {
    match *method {
        tiny_http::Method::Get => {
            let (reply_tx, reply_rx) = mpsc::channel();
            if commands
                .send(Command::HttpGet {
                    kind,
                    name: name.to_string(),
                    reply: reply_tx,
                })
                .is_err()
            {
                let _ = request.respond(server_error());
                return;
            }
            match reply_rx.recv().unwrap_or(None) {
                Some(view) => {
                    let body = render(name, &view);
                    let _ = request.respond(json_response(body));
                }
                None => {
                    let _ = request.respond(not_found());
                }
            }
        }
        tiny_http::Method::Delete => {
            let (reply_tx, reply_rx) = mpsc::channel();
            if commands
                .send(Command::HttpDelete {
                    kind,
                    name: name.to_string(),
                    reply: reply_tx,
                })
                .is_err()
            {
                let _ = request.respond(server_error());
                return;
            }
            if reply_rx.recv().unwrap_or(false) {
                let _ = request.respond(Response::empty(204));
            } else {
                let _ = request.respond(not_found());
            }
        }
        _ => {
            let _ = request.respond(method_not_allowed(&["GET", "DELETE"]));
        }
    }
}

fn render(name: &str, view: &CellView) -> Vec<u8> {
    let value: Value = match *view {
        CellView::Scalar { value, last_modified } => json!({
            "name": name,
            "value": value,
            "last_modified": last_modified,
        }),
        CellView::Timer { ref values, last_modified } => json!({
            "name": name,
            "last_modified": last_modified,
            "values": values,
        }),
        CellView::Set { ref values, last_modified } => json!({
            "name": name,
            "last_modified": last_modified,
            "values": values,
        }),
    };
    serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec())
}

fn json_response(body: Vec<u8>) -> Response {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header is valid");
    Response::from_data(body).with_header(header)
}

fn not_found() -> Response {
    Response::from_string("not found".to_string()).with_status_code(404)
}

fn server_error() -> Response {
    Response::from_string("internal error".to_string()).with_status_code(500)
}

fn method_not_allowed(allowed: &[&str]) -> Response {
    let header = tiny_http::Header::from_bytes(&b"Allow"[..], allowed.join(", ").as_bytes())
        .expect("static header is valid");
    Response::from_string("method not allowed".to_string())
        .with_status_code(405)
        .with_header(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::mpsc;
    use std::thread;

    use aggregator::Aggregator;
    use metric::{MetricType, Sample};

    /// Send a raw HTTP/1.1 request and return (status, body).
    fn request(addr: &str, verb_and_path: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).unwrap();
        let request = format!(
            "{} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            verb_and_path, addr
        );
        stream.write_all(request.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        let status = response
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let body = response
            .splitn(2, "\r\n\r\n")
            .nth(1)
            .unwrap_or("")
            .to_string();
        (status, body)
    }

    /// Scenario 6 (HTTP lifecycle): GET /counters lists a seeded
    /// counter, DELETE retires it with 204, and a subsequent GET 404s.
    #[test]
    fn http_lifecycle_list_get_delete_404() {
        let (tx, rx) = mpsc::channel();
        let aggregator_handle = thread::spawn(move || Aggregator::new().run(rx));

        tx.send(Command::Ingest {
            samples: vec![Sample {
                name: "gorets".to_string(),
                value: 1.0,
                raw_value: "1".to_string(),
                kind: MetricType::Counter,
                rate: None,
            }],
            len: 10,
        })
        .unwrap();

        let addr = "127.0.0.1:18126";
        let server = tiny_http::Server::http(addr).unwrap();
        let commands = tx.clone();
        let server_handle = thread::spawn(move || {
            for _ in 0..3 {
                if let Ok(req) = server.recv() {
                    handle(req, &commands);
                }
            }
        });

        let (status, body) = request(addr, "GET /counters");
        assert_eq!(status, 200);
        assert!(body.contains("gorets"));

        let (status, _) = request(addr, "DELETE /counters/gorets");
        assert_eq!(status, 204);

        let (status, _) = request(addr, "GET /counters/gorets");
        assert_eq!(status, 404);

        server_handle.join().unwrap();
        let _ = tx.send(Command::Shutdown);
        aggregator_handle.join().unwrap();
    }

    #[test]
    fn unknown_type_path_is_not_found() {
        let (tx, rx) = mpsc::channel();
        let aggregator_handle = thread::spawn(move || Aggregator::new().run(rx));

        let addr = "127.0.0.1:18127";
        let server = tiny_http::Server::http(addr).unwrap();
        let commands = tx.clone();
        let server_handle = thread::spawn(move || {
            if let Ok(req) = server.recv() {
                handle(req, &commands);
            }
        });

        let (status, _) = request(addr, "GET /bogus");
        assert_eq!(status, 404);

        server_handle.join().unwrap();
        let _ = tx.send(Command::Shutdown);
        aggregator_handle.join().unwrap();
    }

    #[test]
    fn post_to_list_endpoint_is_method_not_allowed() {
        let (tx, rx) = mpsc::channel();
        let aggregator_handle = thread::spawn(move || Aggregator::new().run(rx));

        let addr = "127.0.0.1:18128";
        let server = tiny_http::Server::http(addr).unwrap();
        let commands = tx.clone();
        let server_handle = thread::spawn(move || {
            if let Ok(req) = server.recv() {
                handle(req, &commands);
            }
        });

        let (status, _) = request(addr, "POST /counters");
        assert_eq!(status, 405);

        server_handle.join().unwrap();
        let _ = tx.send(Command::Shutdown);
        aggregator_handle.join().unwrap();
    }

    #[test]
    fn render_scalar_shape() {
        let view = CellView::Scalar {
            value: 42.0,
            last_modified: 1000,
        };
        let body = String::from_utf8(render("gorets", &view)).unwrap();
        assert!(body.contains("\"name\":\"gorets\""));
        assert!(body.contains("\"value\":42.0"));
        assert!(body.contains("\"last_modified\":1000"));
    }

    #[test]
    fn not_found_is_404() {
        assert_eq!(not_found().status_code().0, 404);
    }

    #[test]
    fn method_not_allowed_is_405() {
        assert_eq!(method_not_allowed(&["GET", "DELETE"]).status_code().0, 405);
    }
}
