use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// A backend-defined payload travelling through the dispatcher.
///
/// The dispatch core never looks inside an object. It only needs to downcast it (for the
/// identity accessor), serialize it (for the codec) and read an embedded status code.
pub trait Object: Any + Send + Sync + fmt::Debug {
    /// Kind name used in diagnostics.
    fn kind(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Object metadata, if the object carries any.
    fn meta(&self) -> Option<&ObjectMeta> {
        None
    }

    fn meta_mut(&mut self) -> Option<&mut ObjectMeta> {
        None
    }

    fn to_value(&self) -> serde_json::Result<Value>;

    /// Replace the object's contents with a decoded value.
    fn merge_value(&mut self, value: Value) -> serde_json::Result<()>;

    /// A non-zero status code embedded in the object. When present on a completed
    /// operation result it overrides the created/ok mapping.
    fn status_code(&self) -> Option<u16> {
        None
    }
}

impl dyn Object {
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Object>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Standard metadata carried by every named resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }
}

/// A serde-backed resource type with [`ObjectMeta`].
///
/// Every `Resource` is an [`Object`] through a blanket implementation, so backends only
/// declare their kind and where the metadata lives:
///
/// ```rust
/// use brrtrest::runtime::{ObjectMeta, Resource};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Widget {
///     #[serde(default)]
///     metadata: ObjectMeta,
///     #[serde(default)]
///     color: String,
/// }
///
/// impl Resource for Widget {
///     const KIND: &'static str = "Widget";
///     fn metadata(&self) -> &ObjectMeta { &self.metadata }
///     fn metadata_mut(&mut self) -> &mut ObjectMeta { &mut self.metadata }
/// }
/// ```
pub trait Resource: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;
}

impl<T: Resource> Object for T {
    fn kind(&self) -> &str {
        T::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn meta(&self) -> Option<&ObjectMeta> {
        Some(self.metadata())
    }

    fn meta_mut(&mut self) -> Option<&mut ObjectMeta> {
        Some(self.metadata_mut())
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn merge_value(&mut self, value: Value) -> serde_json::Result<()> {
        *self = serde_json::from_value(value)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
}

/// A collection of objects returned by list calls.
#[derive(Debug, Default)]
pub struct List {
    pub metadata: ListMeta,
    pub items: Vec<Box<dyn Object>>,
}

impl List {
    pub fn new(items: Vec<Box<dyn Object>>) -> Self {
        Self {
            metadata: ListMeta::default(),
            items,
        }
    }
}

impl Object for List {
    fn kind(&self) -> &str {
        "List"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        let items = self
            .items
            .iter()
            .map(|item| item.to_value())
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(serde_json::json!({
            "kind": "List",
            "metadata": serde_json::to_value(&self.metadata)?,
            "items": items,
        }))
    }

    fn merge_value(&mut self, _value: Value) -> serde_json::Result<()> {
        Err(<serde_json::Error as serde::de::Error>::custom(
            "lists cannot be decoded from a request body",
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusPhase {
    Success,
    Failure,
    Working,
}

/// Machine-readable reason attached to a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusReason {
    #[default]
    #[serde(rename = "")]
    Unknown,
    Working,
    NotFound,
    AlreadyExists,
    Conflict,
    Invalid,
    BadRequest,
    Forbidden,
    MethodNotAllowed,
    InternalError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    /// Operation id, set on `Working` placeholders.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Outcome object for errors, deletions and pending operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub status: StatusPhase,
    /// Suggested HTTP status; `0` means "not set".
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub reason: StatusReason,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
}

impl Status {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: StatusPhase::Success,
            code: 0,
            reason: StatusReason::Unknown,
            message: String::new(),
            details: None,
        }
    }

    /// Placeholder returned while an operation is still running.
    #[must_use]
    pub fn working(operation_id: &str) -> Self {
        Self {
            status: StatusPhase::Working,
            code: 0,
            reason: StatusReason::Working,
            message: String::new(),
            details: Some(StatusDetails {
                id: operation_id.to_string(),
                kind: "operation".to_string(),
                name: String::new(),
            }),
        }
    }
}

impl Object for Status {
    fn kind(&self) -> &str {
        "Status"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("kind".to_string(), Value::String("Status".to_string()));
        }
        Ok(value)
    }

    fn merge_value(&mut self, value: Value) -> serde_json::Result<()> {
        *self = serde_json::from_value(value)?;
        Ok(())
    }

    fn status_code(&self) -> Option<u16> {
        (self.code != 0).then_some(self.code)
    }
}
