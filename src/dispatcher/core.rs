//! Dispatcher core module - verb/arity routing and per-action orchestration.
//!
//! A request reaches [`Dispatcher::serve`] with its path already relative to the API
//! prefix. The dispatcher classifies it, looks up the storage registered for the resource,
//! discovers the capability the (verb, arity) pair needs and runs the action:
//!
//! - reads (list, get) answer synchronously; the returned object gets its self link before
//!   it leaves, and a failed rewrite fails the request
//! - mutations (create, update, delete) decode, pass admission and hand the backend's
//!   [`ResultSource`](crate::storage::ResultSource) to the operation registry, then wait at
//!   most the request's timeout for the result

use super::self_link::SelfLinkRewriter;
use crate::admission::{Action, AdmissionControl, AlwaysAdmit, Attributes};
use crate::classifier::{RequestDescriptor, RequestInfoResolver};
use crate::error::ApiError;
use crate::ids::RequestId;
use crate::operation::{OnComplete, Operation, Operations};
use crate::runtime::{Codec, JsonCodec, MetaSelfLinker, Object, SelfLinker};
use crate::runtime_config::{RuntimeConfig, DEFAULT_API_PREFIX, DEFAULT_TIMEOUT};
use crate::selector::Selector;
use crate::storage::{Context, RestResult, Storage};
use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Maximum inline query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated query parameter storage for the hot path
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// A request as the dispatcher sees it.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Path relative to the API prefix, without the query string.
    pub path: String,
    pub query_params: ParamVec,
    pub body: Vec<u8>,
}

impl RestRequest {
    /// Build a request from a method and a path that may carry a query string.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            query_params: parse_query(query),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Get a query parameter by name
    ///
    /// Uses "last write wins" semantics: if duplicate query parameter names exist
    /// (e.g., `?timeout=1s&timeout=5s`), returns the last occurrence.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a raw query string into stack-allocated pairs.
#[must_use]
pub fn parse_query(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// The final object and status code of a request.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub object: Arc<dyn Object>,
}

impl RestResponse {
    pub fn new(status: u16, object: Arc<dyn Object>) -> Self {
        Self { status, object }
    }

    #[must_use]
    pub fn from_error(err: &ApiError) -> Self {
        Self::new(err.code(), Arc::new(err.to_status()))
    }

    /// Serialize the object. An object that fails to encode is replaced by a `500` status.
    #[must_use]
    pub fn encode(&self, codec: &dyn Codec) -> (u16, Vec<u8>) {
        match codec.encode(self.object.as_ref()) {
            Ok(body) => (self.status, body),
            Err(e) => {
                error!(kind = %self.object.kind(), error = %e, "Failed to encode response object");
                let fallback = RestResponse::from_error(&e);
                let body = codec.encode(fallback.object.as_ref()).unwrap_or_default();
                (fallback.status, body)
            }
        }
    }
}

/// Parse the `timeout` query parameter. Absent means `default`; a malformed value is
/// logged and also falls back to `default`.
#[must_use]
pub fn parse_timeout(raw: Option<&str>, default: Duration) -> Duration {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => default,
        Some(value) => humantime::parse_duration(value).unwrap_or_else(|e| {
            warn!(timeout = %value, error = %e, default_ms = default.as_millis() as u64, "Invalid timeout, using default");
            default
        }),
    }
}

/// An update names its target in the path. A body without a name takes it; a body naming
/// another object is rejected.
fn bind_path_name(obj: &mut dyn Object, info: &RequestDescriptor) -> Result<(), ApiError> {
    let (Some(path_name), Some(meta)) = (info.name(), obj.meta_mut()) else {
        return Ok(());
    };
    if meta.name.is_empty() {
        meta.name = path_name.to_string();
    } else if meta.name != path_name {
        return Err(ApiError::invalid(
            &info.resource,
            meta.name.as_str(),
            format!("name does not match the request path ({path_name})"),
        ));
    }
    Ok(())
}

/// Routes classified requests onto capability-typed storages.
///
/// All state is shared and read-only once serving starts, so the dispatcher is cheap to
/// clone into every connection's service.
#[derive(Clone)]
pub struct Dispatcher {
    storage: HashMap<String, Arc<dyn Storage>>,
    codec: Arc<dyn Codec>,
    self_links: SelfLinkRewriter,
    ops: Arc<Operations>,
    admission: Arc<dyn AdmissionControl>,
    resolver: RequestInfoResolver,
    default_timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_API_PREFIX)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut resources: Vec<&String> = self.storage.keys().collect();
        resources.sort();
        f.debug_struct("Dispatcher")
            .field("resources", &resources)
            .field("self_links", &self.self_links)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// A dispatcher with the JSON codec, the metadata self linker, an admit-everything gate
    /// and a fresh operation registry. `canonical_prefix` is the prefix self links start with.
    #[must_use]
    pub fn new(canonical_prefix: &str) -> Self {
        Self {
            storage: HashMap::new(),
            codec: Arc::new(JsonCodec),
            self_links: SelfLinkRewriter::new(canonical_prefix, Arc::new(MetaSelfLinker)),
            ops: Arc::new(Operations::new()),
            admission: Arc::new(AlwaysAdmit),
            resolver: RequestInfoResolver,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A dispatcher configured from the runtime configuration.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(&config.api_prefix)
            .with_operations(Arc::new(Operations::with_config(
                config.operation_ttl,
                config.stack_size,
            )))
            .with_default_timeout(config.default_timeout)
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_self_linker(mut self, linker: Arc<dyn SelfLinker>) -> Self {
        let prefix = self.self_links.canonical_prefix().to_string();
        self.self_links = SelfLinkRewriter::new(prefix, linker);
        self
    }

    #[must_use]
    pub fn with_admission(mut self, admission: Arc<dyn AdmissionControl>) -> Self {
        self.admission = admission;
        self
    }

    #[must_use]
    pub fn with_operations(mut self, ops: Arc<Operations>) -> Self {
        self.ops = ops;
        self
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register the storage serving `resource`.
    ///
    /// **IMPORTANT**: registering a resource twice replaces the earlier storage.
    pub fn register_storage(&mut self, resource: &str, storage: Arc<dyn Storage>) {
        if self.storage.insert(resource.to_string(), storage).is_some() {
            warn!(resource = %resource, "Replaced existing storage");
        }
        info!(
            resource = %resource,
            total_resources = self.storage.len(),
            "Storage registered"
        );
    }

    #[must_use]
    pub fn with_storage(mut self, resource: &str, storage: Arc<dyn Storage>) -> Self {
        self.register_storage(resource, storage);
        self
    }

    #[must_use]
    pub fn resources(&self) -> Vec<String> {
        let mut resources: Vec<String> = self.storage.keys().cloned().collect();
        resources.sort();
        resources
    }

    #[must_use]
    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    #[must_use]
    pub fn operations(&self) -> &Arc<Operations> {
        &self.ops
    }

    #[must_use]
    pub fn canonical_prefix(&self) -> &str {
        self.self_links.canonical_prefix()
    }

    /// Classify and dispatch one request. Every outcome, including errors, is a response.
    pub fn serve(&self, req: &RestRequest) -> RestResponse {
        let start = Instant::now();
        let resolved = self
            .resolver
            .resolve(&req.method, &req.path, &req.query_params);
        let (resource, response) = match resolved {
            Ok(info) => {
                let response = self.dispatch(&info, req);
                (info.resource, response)
            }
            Err(e) => (String::new(), RestResponse::from_error(&e)),
        };

        info!(
            request_id = %req.request_id,
            verb = %req.method,
            path = %req.path,
            resource = %resource,
            status = response.status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request complete"
        );
        response
    }

    /// Run an already classified request.
    pub fn dispatch(&self, info: &RequestDescriptor, req: &RestRequest) -> RestResponse {
        let Some(storage) = self.storage.get(&info.resource) else {
            debug!(request_id = %req.request_id, resource = %info.resource, "No storage for resource");
            return RestResponse::from_error(&ApiError::route_not_found(&req.path));
        };
        match self.handle(info, req, storage.as_ref()) {
            Ok(response) => response,
            Err(e) => {
                debug!(
                    request_id = %req.request_id,
                    resource = %info.resource,
                    status = e.code(),
                    error = %e,
                    "Request failed"
                );
                RestResponse::from_error(&e)
            }
        }
    }

    fn handle(
        &self,
        info: &RequestDescriptor,
        req: &RestRequest,
        storage: &dyn Storage,
    ) -> Result<RestResponse, ApiError> {
        let ctx = Context::new(info.namespace.clone()).with_request_id(req.request_id);
        let timeout = parse_timeout(req.get_query_param("timeout"), self.default_timeout);
        let unsupported = |action: &str| ApiError::method_not_supported(&info.resource, action);

        match (info.verb.as_str(), info.parts.len()) {
            ("GET", 1) => {
                let label = Selector::parse(req.get_query_param("labels").unwrap_or_default())?;
                let field = Selector::parse(req.get_query_param("fields").unwrap_or_default())?;
                let lister = storage.as_lister().ok_or_else(|| unsupported("list"))?;
                let mut obj = lister.list(&ctx, &label, &field)?;
                self.self_links.set_self_link(obj.as_mut(), &req.path)?;
                Ok(RestResponse::new(200, Arc::from(obj)))
            }
            ("GET", 2) => {
                let getter = storage.as_getter().ok_or_else(|| unsupported("get"))?;
                let mut obj = getter.get(&ctx, info.name().unwrap_or_default())?;
                self.self_links.set_self_link(obj.as_mut(), &req.path)?;
                Ok(RestResponse::new(200, Arc::from(obj)))
            }
            ("POST", 1) => {
                let creater = storage.as_creater().ok_or_else(|| unsupported("create"))?;
                let mut obj = storage.new_object();
                self.codec.decode_into(&req.body, obj.as_mut())?;
                self.admit(info, Some(obj.as_ref()), Action::Create)?;
                let source = creater.create(&ctx, obj)?;
                let op = self
                    .ops
                    .new_operation(source, Some(self.link_callback(req, true)));
                Ok(self.finish_req(&op, timeout, req.request_id))
            }
            ("PUT", 2) => {
                let updater = storage.as_updater().ok_or_else(|| unsupported("update"))?;
                let mut obj = storage.new_object();
                self.codec.decode_into(&req.body, obj.as_mut())?;
                bind_path_name(obj.as_mut(), info)?;
                self.admit(info, Some(obj.as_ref()), Action::Update)?;
                let source = updater.update(&ctx, obj)?;
                let op = self
                    .ops
                    .new_operation(source, Some(self.link_callback(req, false)));
                Ok(self.finish_req(&op, timeout, req.request_id))
            }
            ("DELETE", 2) => {
                let deleter = storage.as_deleter().ok_or_else(|| unsupported("delete"))?;
                self.admit(info, None, Action::Delete)?;
                let source = deleter.delete(&ctx, info.name().unwrap_or_default())?;
                let op = self.ops.new_operation(source, None);
                Ok(self.finish_req(&op, timeout, req.request_id))
            }
            _ => Err(ApiError::route_not_found(&req.path)),
        }
    }

    fn admit(
        &self,
        info: &RequestDescriptor,
        obj: Option<&dyn Object>,
        action: Action,
    ) -> Result<(), ApiError> {
        self.admission
            .admit(&Attributes::new(obj, &info.namespace, &info.resource, action))
    }

    /// Completion callback that rewrites the result's self link. Failures are logged and
    /// leave the object without a link.
    fn link_callback(&self, req: &RestRequest, add_name: bool) -> OnComplete {
        let rewriter = self.self_links.clone();
        let path = req.path.clone();
        let request_id = req.request_id;
        Box::new(move |result: &mut RestResult| {
            let outcome = if add_name {
                rewriter.set_self_link_add_name(result.object.as_mut(), &path)
            } else {
                rewriter.set_self_link(result.object.as_mut(), &path)
            };
            if let Err(e) = outcome {
                error!(
                    request_id = %request_id,
                    path = %path,
                    kind = %result.object.kind(),
                    error = %e,
                    "Failed to set self link on operation result"
                );
            }
        })
    }

    /// Wait for the operation and map its state to a response.
    fn finish_req(&self, op: &Operation, timeout: Duration, request_id: RequestId) -> RestResponse {
        op.wait_for(timeout);
        let (result, complete) = op.status_or_result();
        if !complete {
            debug!(
                request_id = %request_id,
                operation_id = %op.id(),
                timeout_ms = timeout.as_millis() as u64,
                "Operation still running, answering 202"
            );
            return RestResponse::new(202, result.object);
        }
        let mut status = if result.created { 201 } else { 200 };
        if let Some(code) = result.object.status_code() {
            status = code;
        }
        RestResponse::new(status, result.object)
    }

    /// Poll an operation by id: `200` (or its embedded code) once complete, `202` while
    /// pending, `404` for unknown or expired ids.
    #[must_use]
    pub fn serve_operation(&self, id: &str) -> RestResponse {
        let Some(op) = self.ops.get(id) else {
            return RestResponse::from_error(&ApiError::not_found("operation", id));
        };
        let (result, complete) = op.status_or_result();
        if !complete {
            return RestResponse::new(202, result.object);
        }
        let status = result.object.status_code().unwrap_or(200);
        RestResponse::new(status, result.object)
    }
}
