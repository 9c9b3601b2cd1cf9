use super::request::{parse_request, strip_prefix, ParsedRequest};
use super::response::write_rest_response;
use crate::dispatcher::{parse_query, Dispatcher, RestRequest, RestResponse};
use crate::error::ApiError;
use crate::path::split_path;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::debug;

/// HTTP front of the dispatcher.
///
/// Requests under the API prefix go to [`Dispatcher::serve`], except
/// `GET {prefix}/operations/{id}` which polls the operation registry. `GET /health` answers
/// outside the prefix.
#[derive(Clone)]
pub struct AppService {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Route a parsed request to the dispatcher and return the status and encoded body.
    #[must_use]
    pub fn handle(&self, parsed: ParsedRequest) -> (u16, Vec<u8>) {
        let response = self.respond(parsed);
        response.encode(self.dispatcher.codec())
    }

    fn respond(&self, parsed: ParsedRequest) -> RestResponse {
        let Some(path) = strip_prefix(&parsed.path, self.dispatcher.canonical_prefix()) else {
            debug!(request_id = %parsed.request_id, path = %parsed.path, "Path outside API prefix");
            return RestResponse::from_error(&ApiError::route_not_found(&parsed.path));
        };
        let Ok(method) = Method::from_bytes(parsed.method.as_bytes()) else {
            return RestResponse::from_error(&ApiError::route_not_found(&parsed.path));
        };

        let segments = split_path(path);
        if segments.first() == Some(&"operations") {
            return match segments.as_slice() {
                [_, id] if method == Method::GET => self.dispatcher.serve_operation(id),
                _ => RestResponse::from_error(&ApiError::route_not_found(path)),
            };
        }

        if let Some(err) = parsed.body_error {
            return RestResponse::from_error(&ApiError::Decode(err));
        }

        let request = RestRequest {
            request_id: parsed.request_id,
            method,
            path: path.to_string(),
            query_params: parse_query(&parsed.query),
            body: parsed.body,
        };
        self.dispatcher.serve(&request)
    }
}

/// Basic health check endpoint returning `{ "status": "ok" }`.
pub fn health_endpoint(res: &mut Response) -> io::Result<()> {
    write_rest_response(res, 200, br#"{"status":"ok"}"#.to_vec());
    Ok(())
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);
        if parsed.method == "GET" && parsed.path == "/health" {
            return health_endpoint(res);
        }
        let (status, body) = self.handle(parsed);
        write_rest_response(res, status, body);
        Ok(())
    }
}
