pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, strip_prefix, ParsedRequest};
pub use response::write_rest_response;
pub use service::{health_endpoint, AppService};
