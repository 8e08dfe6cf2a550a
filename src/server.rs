use serde::Serialize;
use std::net::SocketAddr;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{info, warn};

use crate::{
    error::{ExplorerError, Result},
    local::list_directory,
    types::{PathEntriesResponse, PathsResponse},
};

/// Status and JSON body of one API answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self {
                status: 500,
                body: serde_json::json!({ "error": e.to_string() }).to_string(),
            },
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &PathEntriesResponse::error(message))
    }
}

/// Answer one request
///
/// - `GET /paths` → `{ paths }`
/// - `GET /path-entries?path=P` → `{ entries }`, or `{ error }` with 400 when
///   the path doesn't exist
pub fn route(method: &Method, url: &str, roots: &[String]) -> ApiResponse {
    if *method != Method::Get {
        return ApiResponse::error(405, format!("Method {} is not allowed", method));
    }

    let (path, query) = url.split_once('?').unwrap_or((url, ""));

    match path {
        "/paths" => ApiResponse::json(
            200,
            &PathsResponse {
                paths: roots.to_vec(),
            },
        ),
        "/path-entries" => {
            let requested = url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "path")
                .map(|(_, value)| value.into_owned());

            match requested {
                Some(requested) if !requested.is_empty() => path_entries(&requested),
                _ => ApiResponse::error(400, "Missing `path` query parameter."),
            }
        }
        other => ApiResponse::error(404, format!("Not found: {}", other)),
    }
}

fn path_entries(path: &str) -> ApiResponse {
    match list_directory(path) {
        Ok(entries) => ApiResponse::json(200, &PathEntriesResponse::entries(entries)),
        Err(ExplorerError::NotFound { message }) => ApiResponse::error(400, message),
        Err(e) => {
            warn!(path, error = %e, "Listing failed");
            ApiResponse::error(500, e.to_string())
        }
    }
}

/// Blocking HTTP server exposing the root paths and the directory lister
pub struct ExplorerServer {
    server: Server,
    roots: Vec<String>,
}

impl ExplorerServer {
    pub fn bind(addr: SocketAddr, roots: Vec<String>) -> Result<Self> {
        let server = Server::http(addr).map_err(|e| ExplorerError::Server {
            message: format!("Failed to bind {}: {}", addr, e),
        })?;

        Ok(Self { server, roots })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Serve until [`ExplorerServer::shutdown`] is called
    pub fn run(&self) {
        for request in self.server.incoming_requests() {
            self.respond(request);
        }
    }

    /// Make `run` return
    pub fn shutdown(&self) {
        self.server.unblock();
    }

    fn respond(&self, request: Request) {
        let answer = route(request.method(), request.url(), &self.roots);
        info!(
            method = %request.method(),
            url = request.url(),
            status = answer.status,
            "Handled request"
        );

        let mut response = Response::from_string(answer.body).with_status_code(answer.status);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
            response.add_header(header);
        }

        if let Err(e) = request.respond(response) {
            warn!(error = %e, "Failed to send response");
        }
    }
}
