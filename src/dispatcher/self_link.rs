use crate::error::ApiError;
use crate::path::{join_paths, split_path};
use crate::runtime::{Object, SelfLinker};
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

/// Computes and injects canonical self links.
///
/// The link of an object is the canonical prefix joined with the request path (plus the
/// object's name for the "add name" variant). Objects living in a namespace get a
/// `?namespace=` query parameter unless the request path already addresses the namespace
/// with `/ns/{namespace}`.
#[derive(Clone)]
pub struct SelfLinkRewriter {
    canonical_prefix: String,
    linker: Arc<dyn SelfLinker>,
}

impl std::fmt::Debug for SelfLinkRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfLinkRewriter")
            .field("canonical_prefix", &self.canonical_prefix)
            .finish_non_exhaustive()
    }
}

fn as_self_link_error(err: ApiError) -> ApiError {
    match err {
        ApiError::SelfLink(_) => err,
        other => ApiError::SelfLink(other.to_string()),
    }
}

impl SelfLinkRewriter {
    pub fn new(canonical_prefix: impl Into<String>, linker: Arc<dyn SelfLinker>) -> Self {
        Self {
            canonical_prefix: canonical_prefix.into(),
            linker,
        }
    }

    #[must_use]
    pub fn canonical_prefix(&self) -> &str {
        &self.canonical_prefix
    }

    /// The link for `req_path` (plus `name`, when non-empty) in `namespace`.
    #[must_use]
    pub fn link_for(&self, req_path: &str, name: &str, namespace: &str) -> String {
        let mut link = join_paths(&[&self.canonical_prefix, req_path, name]);
        let addressed_by_path = split_path(req_path).first() == Some(&"ns");
        if !namespace.is_empty() && !addressed_by_path {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("namespace", namespace)
                .finish();
            link.push('?');
            link.push_str(&query);
        }
        link
    }

    /// Set the link of `obj` to the request path itself. For a collection, every member also
    /// gets its own link with its name appended.
    pub fn set_self_link(&self, obj: &mut dyn Object, req_path: &str) -> Result<(), ApiError> {
        let namespace = self.linker.namespace(obj).map_err(as_self_link_error)?;
        let link = self.link_for(req_path, "", &namespace);
        self.linker
            .set_self_link(obj, &link)
            .map_err(as_self_link_error)?;

        if !self.linker.is_list(obj) {
            return Ok(());
        }
        let mut items = self.linker.extract_list(obj).map_err(as_self_link_error)?;
        let rewritten = items
            .iter_mut()
            .try_for_each(|item| self.set_self_link_add_name(item.as_mut(), req_path));
        let count = items.len();
        // Members go back even when one of them failed.
        self.linker
            .set_list(obj, items)
            .map_err(as_self_link_error)?;
        rewritten?;
        debug!(link = %link, members = count, "Rewrote collection self links");
        Ok(())
    }

    /// Set the link of `obj` to the request path joined with the object's name.
    pub fn set_self_link_add_name(
        &self,
        obj: &mut dyn Object,
        req_path: &str,
    ) -> Result<(), ApiError> {
        let name = self.linker.name(obj).map_err(as_self_link_error)?;
        let namespace = self.linker.namespace(obj).map_err(as_self_link_error)?;
        let link = self.link_for(req_path, &name, &namespace);
        self.linker
            .set_self_link(obj, &link)
            .map_err(as_self_link_error)
    }
}
