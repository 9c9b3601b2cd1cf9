use super::{List, Object};
use crate::error::ApiError;

/// Identity accessor used by the self-link rewriter.
///
/// Implementations know where an object's namespace, name and self link live and how to
/// take the members out of (and put them back into) a collection.
pub trait SelfLinker: Send + Sync {
    fn namespace(&self, obj: &dyn Object) -> Result<String, ApiError>;

    fn name(&self, obj: &dyn Object) -> Result<String, ApiError>;

    fn set_self_link(&self, obj: &mut dyn Object, link: &str) -> Result<(), ApiError>;

    fn is_list(&self, obj: &dyn Object) -> bool;

    /// Take the members out of a collection, preserving order.
    fn extract_list(&self, obj: &mut dyn Object) -> Result<Vec<Box<dyn Object>>, ApiError>;

    fn set_list(&self, obj: &mut dyn Object, items: Vec<Box<dyn Object>>)
        -> Result<(), ApiError>;
}

/// [`SelfLinker`] over [`ObjectMeta`](super::ObjectMeta) and [`List`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaSelfLinker;

fn no_metadata(obj: &dyn Object) -> ApiError {
    ApiError::SelfLink(format!("object of kind {} has no metadata", obj.kind()))
}

fn not_a_list(obj: &dyn Object) -> ApiError {
    ApiError::SelfLink(format!("object of kind {} is not a list", obj.kind()))
}

impl SelfLinker for MetaSelfLinker {
    fn namespace(&self, obj: &dyn Object) -> Result<String, ApiError> {
        if obj.is::<List>() {
            return Ok(String::new());
        }
        obj.meta()
            .map(|meta| meta.namespace.clone())
            .ok_or_else(|| no_metadata(obj))
    }

    fn name(&self, obj: &dyn Object) -> Result<String, ApiError> {
        obj.meta()
            .map(|meta| meta.name.clone())
            .ok_or_else(|| no_metadata(obj))
    }

    fn set_self_link(&self, obj: &mut dyn Object, link: &str) -> Result<(), ApiError> {
        if let Some(list) = obj.downcast_mut::<List>() {
            list.metadata.self_link = link.to_string();
            return Ok(());
        }
        match obj.meta_mut() {
            Some(meta) => {
                meta.self_link = link.to_string();
                Ok(())
            }
            None => Err(no_metadata(obj)),
        }
    }

    fn is_list(&self, obj: &dyn Object) -> bool {
        obj.is::<List>()
    }

    fn extract_list(&self, obj: &mut dyn Object) -> Result<Vec<Box<dyn Object>>, ApiError> {
        match obj.downcast_mut::<List>() {
            Some(list) => Ok(std::mem::take(&mut list.items)),
            None => Err(not_a_list(obj)),
        }
    }

    fn set_list(
        &self,
        obj: &mut dyn Object,
        items: Vec<Box<dyn Object>>,
    ) -> Result<(), ApiError> {
        match obj.downcast_mut::<List>() {
            Some(list) => {
                list.items = items;
                Ok(())
            }
            None => Err(not_a_list(obj)),
        }
    }
}
