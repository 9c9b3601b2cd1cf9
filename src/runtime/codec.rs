use super::Object;
use crate::error::ApiError;
use serde_json::Value;

/// Converts request bodies into objects and objects into response bodies.
pub trait Codec: Send + Sync {
    /// Decode `data` into an empty instance produced by the target storage.
    fn decode_into(&self, data: &[u8], obj: &mut dyn Object) -> Result<(), ApiError>;

    fn encode(&self, obj: &dyn Object) -> Result<Vec<u8>, ApiError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode_into(&self, data: &[u8], obj: &mut dyn Object) -> Result<(), ApiError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::Decode("request body is empty".to_string()));
        }
        let value: Value =
            serde_json::from_slice(data).map_err(|e| ApiError::Decode(e.to_string()))?;
        if let Some(kind) = value.get("kind").and_then(Value::as_str) {
            if kind != obj.kind() {
                return Err(ApiError::Decode(format!(
                    "expected kind {:?}, got {:?}",
                    obj.kind(),
                    kind
                )));
            }
        }
        obj.merge_value(value)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn encode(&self, obj: &dyn Object) -> Result<Vec<u8>, ApiError> {
        let value = obj.to_value().map_err(|e| ApiError::Encode(e.to_string()))?;
        serde_json::to_vec(&value).map_err(|e| ApiError::Encode(e.to_string()))
    }
}
