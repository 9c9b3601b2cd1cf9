//! # Classifier Module
//!
//! Turns a raw request (method, path below the API prefix, query) into a
//! [`RequestDescriptor`]: the verb, the resource kind, the namespace and the path parts
//! starting at the resource.
//!
//! Two path shapes are understood:
//!
//! | path | namespace | parts |
//! |---|---|---|
//! | `/ns/{ns}/{resource}[/{name}]` | `{ns}` | `[resource, name?]` |
//! | `/{resource}[/{name}]` | `namespace` query param, else a default | `[resource, name?]` |
//!
//! Without an explicit namespace, named requests and creates land in `default` while
//! collection reads span all namespaces (empty namespace).

use crate::error::ApiError;
use crate::path::split_path;
use http::Method;
use std::sync::Arc;

pub const DEFAULT_NAMESPACE: &str = "default";

/// What a request is about. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub verb: Method,
    pub resource: String,
    pub namespace: String,
    /// Never empty. One part addresses a collection, two a named member.
    pub parts: Vec<String>,
}

impl RequestDescriptor {
    /// Name of the addressed member, for arity-2 requests.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parts.get(1).map(String::as_str)
    }
}

/// Resolves request descriptors from raw request data.
#[derive(Debug, Clone, Default)]
pub struct RequestInfoResolver;

impl RequestInfoResolver {
    pub fn resolve(
        &self,
        method: &Method,
        path: &str,
        query: &[(Arc<str>, String)],
    ) -> Result<RequestDescriptor, ApiError> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Err(ApiError::NotResolvable {
                path: path.to_string(),
                reason: "no resource in path".to_string(),
            });
        }

        let (namespace, parts) = if segments[0] == "ns" {
            if segments.len() < 3 {
                return Err(ApiError::NotResolvable {
                    path: path.to_string(),
                    reason: "expected /ns/{namespace}/{resource}".to_string(),
                });
            }
            (segments[1].to_string(), &segments[2..])
        } else {
            let explicit = query
                .iter()
                .rfind(|(k, _)| k.as_ref() == "namespace")
                .map(|(_, v)| v.clone());
            let namespace = match explicit {
                Some(ns) => ns,
                None if segments.len() > 1 || *method == Method::POST => {
                    DEFAULT_NAMESPACE.to_string()
                }
                None => String::new(),
            };
            (namespace, &segments[..])
        };

        let parts: Vec<String> = parts.iter().map(|s| (*s).to_string()).collect();
        Ok(RequestDescriptor {
            verb: method.clone(),
            resource: parts[0].clone(),
            namespace,
            parts,
        })
    }
}
