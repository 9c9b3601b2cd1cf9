//! # Admission Module
//!
//! The admission gate is a synchronous policy check invoked by the dispatcher before every
//! mutating action (create, update, delete) and never for reads. It runs after the request
//! body was decoded and before the storage is called, so a rejected request never reaches a
//! backend. The gate's error is surfaced to the caller verbatim.

use crate::error::ApiError;
use crate::runtime::Object;
use std::fmt;

/// Mutating action being admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an admission plugin gets to see about a request.
#[derive(Debug, Clone, Copy)]
pub struct Attributes<'a> {
    object: Option<&'a dyn Object>,
    namespace: &'a str,
    resource: &'a str,
    action: Action,
}

impl<'a> Attributes<'a> {
    #[must_use]
    pub fn new(
        object: Option<&'a dyn Object>,
        namespace: &'a str,
        resource: &'a str,
        action: Action,
    ) -> Self {
        Self {
            object,
            namespace,
            resource,
            action,
        }
    }

    /// The decoded candidate object; `None` for deletes.
    #[must_use]
    pub fn object(&self) -> Option<&'a dyn Object> {
        self.object
    }

    #[must_use]
    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    #[must_use]
    pub fn resource(&self) -> &'a str {
        self.resource
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }
}

pub trait AdmissionControl: Send + Sync {
    fn admit(&self, attributes: &Attributes<'_>) -> Result<(), ApiError>;
}

/// Admits every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAdmit;

impl AdmissionControl for AlwaysAdmit {
    fn admit(&self, _attributes: &Attributes<'_>) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Rejects every request with `403 Forbidden`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDeny;

impl AdmissionControl for AlwaysDeny {
    fn admit(&self, attributes: &Attributes<'_>) -> Result<(), ApiError> {
        Err(ApiError::Forbidden(format!(
            "admission control is denying all modifications: {} {} in namespace {:?}",
            attributes.action(),
            attributes.resource(),
            attributes.namespace()
        )))
    }
}
