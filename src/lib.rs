//! # brrtrest
//!
//! **brrtrest** is the request-dispatch core of a resource-oriented API server, running on the
//! `may` coroutine runtime and served over `may_minihttp`.
//!
//! ## Overview
//!
//! A request is classified into a verb, a resource kind, a namespace and the path parts
//! below the resource. It is then routed by (verb, path arity) onto the storage registered
//! for the resource. Each storage implements only the capabilities it supports (list, get,
//! create, update, delete). Mutations pass an admission gate and complete through an
//! operation handle: the request waits at most its `timeout` and otherwise answers
//! `202 Accepted` with a pollable placeholder. Every returned object carries a canonical
//! self link.
//!
//! ## Architecture
//!
//! - **[`classifier`]** - Turns method, path and query into a [`classifier::RequestDescriptor`]
//! - **[`dispatcher`]** - Verb/arity routing, per-action orchestration and self-link rewriting
//! - **[`storage`]** - Capability traits and the in-memory backend
//! - **[`admission`]** - Pre-mutation policy gate
//! - **[`operation`]** - Operation handles with bounded waits and a pollable registry
//! - **[`runtime`]** - Object model, `Status`, the JSON codec and the self linker
//! - **[`selector`]** - Label and field selectors for list requests
//! - **[`server`]** - HTTP surface built on `may_minihttp`
//! - **[`logging`]** / **[`runtime_config`]** - Ambient configuration from `BRRTR_*` variables
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as AppService<br/>(may_minihttp)
//!     participant Dispatcher
//!     participant Admission
//!     participant Storage
//!     participant Operation as Operation<br/>(coroutine)
//!
//!     Client->>Server: POST /api/v1beta1/widgets?timeout=5s
//!     Server->>Dispatcher: serve(RestRequest /widgets)
//!     Dispatcher->>Dispatcher: classify, lookup storage, as_creater()
//!     Dispatcher->>Dispatcher: decode body into new_object()
//!     Dispatcher->>Admission: admit(object, namespace, "widgets", CREATE)
//!     Dispatcher->>Storage: create(ctx, object)
//!     Storage-->>Dispatcher: ResultSource
//!     Dispatcher->>Operation: new_operation(source, set self link + name)
//!     Operation->>Operation: recv result, rewrite self link
//!     alt finished within timeout
//!         Dispatcher-->>Client: 201 Created (or embedded status code)
//!     else still running
//!         Dispatcher-->>Client: 202 Accepted, Status Working {id}
//!         Client->>Server: GET /api/v1beta1/operations/{id}
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brrtrest::dispatcher::Dispatcher;
//! use brrtrest::runtime::{ObjectMeta, Resource};
//! use brrtrest::server::{AppService, HttpServer};
//! use brrtrest::storage::MemoryStorage;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Widget {
//!     #[serde(default)]
//!     metadata: ObjectMeta,
//! }
//!
//! impl Resource for Widget {
//!     const KIND: &'static str = "Widget";
//!     fn metadata(&self) -> &ObjectMeta { &self.metadata }
//!     fn metadata_mut(&mut self) -> &mut ObjectMeta { &mut self.metadata }
//! }
//!
//! let dispatcher = Dispatcher::new("/api/v1beta1")
//!     .with_storage("widgets", Arc::new(MemoryStorage::<Widget>::new()));
//! let handle = HttpServer(AppService::new(Arc::new(dispatcher)))
//!     .start("0.0.0.0:8080")
//!     .unwrap();
//! handle.join().unwrap();
//! ```

pub mod admission;
pub mod classifier;
pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod operation;
pub mod path;
pub mod runtime;
pub mod runtime_config;
pub mod selector;
pub mod server;
pub mod storage;

pub use dispatcher::{Dispatcher, RestRequest, RestResponse};
pub use error::ApiError;
