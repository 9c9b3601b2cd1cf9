//! # Storage Module
//!
//! Capability-typed backend contracts.
//!
//! A backend serves one resource kind and implements only the capabilities it supports:
//! [`Lister`], [`Getter`], [`Creater`], [`Updater`] and [`Deleter`]. The dispatcher discovers
//! them per request through the `as_*` accessors on [`Storage`], so a backend never has to
//! stub out actions it does not offer:
//!
//! ```rust,ignore
//! impl Storage for MinionStorage {
//!     fn new_object(&self) -> Box<dyn Object> { Box::new(Minion::default()) }
//!     fn as_lister(&self) -> Option<&dyn Lister> { Some(self) }
//!     fn as_getter(&self) -> Option<&dyn Getter> { Some(self) }
//! }
//! ```
//!
//! Reads answer directly. Mutations answer with a [`ResultSource`]: a one-shot channel the
//! backend resolves either immediately ([`ResultSource::ready`]) or later from another
//! coroutine or thread through the paired [`ResultSender`].

pub mod memory;

use crate::error::ApiError;
use crate::ids::RequestId;
use crate::runtime::Object;
use crate::selector::Selector;
use may::sync::mpsc;

pub use memory::{Capability, MemoryStorage};

/// Per-request context handed to every backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    namespace: String,
    request_id: RequestId,
}

impl Context {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            request_id: RequestId::new(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Namespace of the request; empty means "all namespaces".
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// The single outcome of a backend action.
#[derive(Debug)]
pub struct RestResult {
    pub object: Box<dyn Object>,
    /// True only for a successful create.
    pub created: bool,
}

impl RestResult {
    pub fn new(object: Box<dyn Object>) -> Self {
        Self {
            object,
            created: false,
        }
    }

    pub fn created(object: Box<dyn Object>) -> Self {
        Self {
            object,
            created: true,
        }
    }

    /// Report a failure discovered after the backend accepted the request. The error's
    /// status code is embedded in the result and becomes the response status.
    #[must_use]
    pub fn from_error(err: &ApiError) -> Self {
        Self::new(Box::new(err.to_status()))
    }
}

pub type ResultSender = mpsc::Sender<RestResult>;

/// Pending result of a mutating backend call.
pub struct ResultSource(mpsc::Receiver<RestResult>);

impl ResultSource {
    /// A source and the sender that resolves it.
    #[must_use]
    pub fn channel() -> (ResultSender, ResultSource) {
        let (tx, rx) = mpsc::channel();
        (tx, ResultSource(rx))
    }

    /// A source that is already resolved.
    #[must_use]
    pub fn ready(result: RestResult) -> Self {
        let (tx, source) = Self::channel();
        // The receiver is alive, so the send cannot fail.
        let _ = tx.send(result);
        source
    }

    /// Block until the backend delivers. `None` when the sender was dropped without a value.
    pub(crate) fn recv(self) -> Option<RestResult> {
        self.0.recv().ok()
    }
}

impl std::fmt::Debug for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResultSource")
    }
}

pub trait Lister: Send + Sync {
    fn list(
        &self,
        ctx: &Context,
        label: &Selector,
        field: &Selector,
    ) -> Result<Box<dyn Object>, ApiError>;
}

pub trait Getter: Send + Sync {
    fn get(&self, ctx: &Context, name: &str) -> Result<Box<dyn Object>, ApiError>;
}

pub trait Creater: Send + Sync {
    fn create(&self, ctx: &Context, obj: Box<dyn Object>) -> Result<ResultSource, ApiError>;
}

pub trait Updater: Send + Sync {
    fn update(&self, ctx: &Context, obj: Box<dyn Object>) -> Result<ResultSource, ApiError>;
}

pub trait Deleter: Send + Sync {
    fn delete(&self, ctx: &Context, name: &str) -> Result<ResultSource, ApiError>;
}

/// A backend for one resource kind.
pub trait Storage: Send + Sync {
    /// An empty instance of the kind, used as the decode target for create and update.
    fn new_object(&self) -> Box<dyn Object>;

    fn as_lister(&self) -> Option<&dyn Lister> {
        None
    }

    fn as_getter(&self) -> Option<&dyn Getter> {
        None
    }

    fn as_creater(&self) -> Option<&dyn Creater> {
        None
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        None
    }

    fn as_deleter(&self) -> Option<&dyn Deleter> {
        None
    }
}
