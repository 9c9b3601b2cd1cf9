//! # Dispatcher Module
//!
//! Verb/arity routing onto capability-typed storages.
//!
//! | method | arity | action | capability |
//! |---|---|---|---|
//! | GET | 1 | list, filtered by `labels` and `fields` | [`Lister`](crate::storage::Lister) |
//! | GET | 2 | get | [`Getter`](crate::storage::Getter) |
//! | POST | 1 | create | [`Creater`](crate::storage::Creater) |
//! | PUT | 2 | update | [`Updater`](crate::storage::Updater) |
//! | DELETE | 2 | delete | [`Deleter`](crate::storage::Deleter) |
//!
//! Anything else is `404 Not Found`; a storage lacking the capability answers
//! `405 Method Not Allowed` without being called.
//!
//! ## Status Mapping
//!
//! Reads answer `200`. Mutations answer with the state of their operation after waiting at
//! most the `timeout` query parameter (default 30s):
//!
//! - complete: `201` for a create, `200` otherwise, unless the result embeds a non-zero
//!   status code, which wins
//! - pending: `202` with a `Working` status naming the operation
//!
//! ## Self Links
//!
//! Returned objects carry `selfLink = prefix + request path [+ name]`, with
//! `?namespace=` appended for namespaced objects addressed outside `/ns/{namespace}`. A
//! rewrite failure fails a read with `400`; on a create or update it is only logged.

mod core;
mod self_link;

pub use self::core::{
    parse_query, parse_timeout, Dispatcher, ParamVec, RestRequest, RestResponse,
    MAX_INLINE_PARAMS,
};
pub use self_link::SelfLinkRewriter;
