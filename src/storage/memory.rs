//! In-memory storage backend.
//!
//! `MemoryStorage` keeps objects of one [`Resource`] kind keyed by namespace and name. It
//! is the backend the CLI serves and the reference implementation the tests run against.
//! Mutations are applied as soon as the call is made; with a completion delay configured the
//! result is delivered later from a coroutine, which exercises the dispatcher's `202 Accepted`
//! path.

use super::{Context, Creater, Deleter, Getter, Lister, RestResult, ResultSource, Storage, Updater};
use crate::error::ApiError;
use crate::runtime::{List, Object, Resource, Status};
use crate::selector::Selector;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

/// One of the five actions a backend can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::List,
        Capability::Get,
        Capability::Create,
        Capability::Update,
        Capability::Delete,
    ];

    /// Parse a lowercase capability name as used on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "list" => Some(Self::List),
            "get" => Some(Self::Get),
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

type Key = (String, String);

pub struct MemoryStorage<T> {
    items: RwLock<BTreeMap<Key, T>>,
    capabilities: HashSet<Capability>,
    completion_delay: Option<Duration>,
    next_uid: AtomicU64,
    resource_version: AtomicU64,
}

impl<T> Default for MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    /// A storage advertising every capability.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            capabilities: Capability::ALL.into_iter().collect(),
            completion_delay: None,
            next_uid: AtomicU64::new(1),
            resource_version: AtomicU64::new(1),
        }
    }

    /// Restrict the advertised capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.iter().copied().collect();
        self
    }

    /// Deliver mutation results after `delay` instead of immediately.
    #[must_use]
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = Some(delay);
        self
    }

    /// Seed an object directly, bypassing the create path.
    pub fn insert(&self, obj: T) {
        let key = key_of(&obj);
        self.write_items().insert(key, obj);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_items().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn read_items(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<Key, T>> {
        self.items
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_items(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<Key, T>> {
        self.items
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_version(&self) -> String {
        self.resource_version
            .fetch_add(1, Ordering::Relaxed)
            .to_string()
    }

    fn respond(&self, result: RestResult) -> ResultSource {
        let Some(delay) = self.completion_delay else {
            return ResultSource::ready(result);
        };
        let (tx, source) = ResultSource::channel();
        // SAFETY: may::coroutine::spawn() is marked unsafe by the may runtime. The closure
        // owns everything it touches and only sleeps and sends on a channel.
        unsafe {
            may::coroutine::spawn(move || {
                may::coroutine::sleep(delay);
                if tx.send(result).is_err() {
                    warn!(kind = T::KIND, "Result source dropped before delayed completion");
                }
            });
        }
        source
    }

    fn downcast(obj: Box<dyn Object>) -> Result<T, ApiError> {
        let kind = obj.kind().to_string();
        match obj.as_any().downcast_ref::<T>() {
            Some(typed) => Ok(typed.clone()),
            None => Err(ApiError::Internal(format!(
                "storage for {} received an object of kind {}",
                T::KIND,
                kind
            ))),
        }
    }
}

fn key_of<T: Resource>(obj: &T) -> Key {
    let meta = obj.metadata();
    (meta.namespace.clone(), meta.name.clone())
}

/// Fields a field selector can match on.
fn fields_of<T: Resource>(obj: &T) -> BTreeMap<String, String> {
    let meta = obj.metadata();
    BTreeMap::from([
        ("name".to_string(), meta.name.clone()),
        ("namespace".to_string(), meta.namespace.clone()),
    ])
}

/// Fill the object's namespace from the context, rejecting a conflicting one.
fn bind_namespace<T: Resource>(ctx: &Context, obj: &mut T) -> Result<(), ApiError> {
    let meta = obj.metadata_mut();
    if meta.namespace.is_empty() {
        meta.namespace = ctx.namespace().to_string();
    } else if !ctx.namespace().is_empty() && meta.namespace != ctx.namespace() {
        return Err(ApiError::invalid(
            T::KIND,
            meta.name.clone(),
            format!(
                "namespace {:?} does not match the request namespace {:?}",
                meta.namespace,
                ctx.namespace()
            ),
        ));
    }
    Ok(())
}

impl<T> Lister for MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    fn list(
        &self,
        ctx: &Context,
        label: &Selector,
        field: &Selector,
    ) -> Result<Box<dyn Object>, ApiError> {
        let items = self.read_items();
        let candidates: Box<dyn Iterator<Item = &T> + '_> =
            match field.requires_exact_match("name") {
                // A pinned name inside one namespace is a single key lookup.
                Some(name) if !ctx.namespace().is_empty() => Box::new(
                    items
                        .get(&(ctx.namespace().to_string(), name.to_string()))
                        .into_iter(),
                ),
                _ => Box::new(
                    items
                        .iter()
                        .filter(|((namespace, _), _)| {
                            ctx.namespace().is_empty() || namespace == ctx.namespace()
                        })
                        .map(|(_, obj)| obj),
                ),
            };
        let items: Vec<Box<dyn Object>> = candidates
            .filter(|obj| label.matches(&obj.metadata().labels))
            .filter(|obj| field.matches(&fields_of(*obj)))
            .map(|obj| Box::new(obj.clone()) as Box<dyn Object>)
            .collect();
        debug!(
            kind = T::KIND,
            namespace = %ctx.namespace(),
            label = %label,
            field = %field,
            count = items.len(),
            "Listed objects"
        );
        Ok(Box::new(List::new(items)))
    }
}

impl<T> Getter for MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    fn get(&self, ctx: &Context, name: &str) -> Result<Box<dyn Object>, ApiError> {
        let key = (ctx.namespace().to_string(), name.to_string());
        self.read_items()
            .get(&key)
            .map(|obj| Box::new(obj.clone()) as Box<dyn Object>)
            .ok_or_else(|| ApiError::not_found(T::KIND, name))
    }
}

impl<T> Creater for MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    fn create(&self, ctx: &Context, obj: Box<dyn Object>) -> Result<ResultSource, ApiError> {
        let mut obj = Self::downcast(obj)?;
        bind_namespace(ctx, &mut obj)?;
        if obj.metadata().name.is_empty() {
            return Err(ApiError::invalid(T::KIND, "", "metadata.name is required"));
        }
        let key = key_of(&obj);
        {
            let mut items = self.write_items();
            if items.contains_key(&key) {
                return Err(ApiError::already_exists(T::KIND, key.1));
            }
            let meta = obj.metadata_mut();
            meta.uid = format!(
                "{}-{}",
                T::KIND.to_ascii_lowercase(),
                self.next_uid.fetch_add(1, Ordering::Relaxed)
            );
            meta.resource_version = self.next_version();
            items.insert(key, obj.clone());
        }
        Ok(self.respond(RestResult::created(Box::new(obj))))
    }
}

impl<T> Updater for MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    fn update(&self, ctx: &Context, obj: Box<dyn Object>) -> Result<ResultSource, ApiError> {
        let mut obj = Self::downcast(obj)?;
        bind_namespace(ctx, &mut obj)?;
        let key = key_of(&obj);
        {
            let mut items = self.write_items();
            let Some(existing) = items.get(&key) else {
                return Err(ApiError::not_found(T::KIND, key.1));
            };
            let current = existing.metadata().resource_version.clone();
            let requested = &obj.metadata().resource_version;
            if !requested.is_empty() && *requested != current {
                return Err(ApiError::Conflict {
                    kind: T::KIND.to_string(),
                    name: key.1,
                    message: format!("resource version {requested} is stale, current is {current}"),
                });
            }
            let uid = existing.metadata().uid.clone();
            let meta = obj.metadata_mut();
            meta.uid = uid;
            meta.resource_version = self.next_version();
            items.insert(key, obj.clone());
        }
        Ok(self.respond(RestResult::new(Box::new(obj))))
    }
}

impl<T> Deleter for MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    fn delete(&self, ctx: &Context, name: &str) -> Result<ResultSource, ApiError> {
        let key = (ctx.namespace().to_string(), name.to_string());
        if self.write_items().remove(&key).is_none() {
            return Err(ApiError::not_found(T::KIND, name));
        }
        Ok(self.respond(RestResult::new(Box::new(Status::success()))))
    }
}

impl<T> Storage for MemoryStorage<T>
where
    T: Resource + Clone + Default,
{
    fn new_object(&self) -> Box<dyn Object> {
        Box::new(T::default())
    }

    fn as_lister(&self) -> Option<&dyn Lister> {
        self.supports(Capability::List).then_some(self as &dyn Lister)
    }

    fn as_getter(&self) -> Option<&dyn Getter> {
        self.supports(Capability::Get).then_some(self as &dyn Getter)
    }

    fn as_creater(&self) -> Option<&dyn Creater> {
        self.supports(Capability::Create).then_some(self as &dyn Creater)
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        self.supports(Capability::Update).then_some(self as &dyn Updater)
    }

    fn as_deleter(&self) -> Option<&dyn Deleter> {
        self.supports(Capability::Delete).then_some(self as &dyn Deleter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ObjectMeta;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Pod {
        #[serde(default)]
        metadata: ObjectMeta,
    }

    impl Resource for Pod {
        const KIND: &'static str = "Pod";
        fn metadata(&self) -> &ObjectMeta {
            &self.metadata
        }
        fn metadata_mut(&mut self) -> &mut ObjectMeta {
            &mut self.metadata
        }
    }

    fn pod(namespace: &str, name: &str, labels: &[(&str, &str)]) -> Pod {
        let mut metadata = ObjectMeta::named(namespace, name);
        metadata.labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Pod { metadata }
    }

    #[test]
    fn test_capabilities_restrict_accessors() {
        let storage = MemoryStorage::<Pod>::new().with_capabilities(&[Capability::Get]);
        assert!(storage.as_getter().is_some());
        assert!(storage.as_lister().is_none());
        assert!(storage.as_creater().is_none());
        assert!(storage.as_updater().is_none());
        assert!(storage.as_deleter().is_none());
    }

    #[test]
    fn test_list_filters_namespace_labels_and_fields() {
        let storage = MemoryStorage::<Pod>::new();
        storage.insert(pod("ns1", "a", &[("app", "web")]));
        storage.insert(pod("ns1", "b", &[("app", "db")]));
        storage.insert(pod("ns2", "c", &[("app", "web")]));

        let everything = Selector::everything();
        let all = storage.list(&Context::new(""), &everything, &everything).unwrap();
        assert_eq!(all.downcast_ref::<List>().unwrap().items.len(), 3);

        let web = Selector::parse("app=web").unwrap();
        let ns1_web = storage.list(&Context::new("ns1"), &web, &everything).unwrap();
        assert_eq!(ns1_web.downcast_ref::<List>().unwrap().items.len(), 1);

        let named = Selector::parse("name=c").unwrap();
        let by_field = storage.list(&Context::new(""), &everything, &named).unwrap();
        assert_eq!(by_field.downcast_ref::<List>().unwrap().items.len(), 1);
    }

    #[test]
    fn test_pinned_name_lists_one_namespace_member() {
        let storage = MemoryStorage::<Pod>::new();
        storage.insert(pod("ns1", "a", &[("app", "web")]));
        storage.insert(pod("ns2", "a", &[("app", "web")]));

        let everything = Selector::everything();
        let named = Selector::parse("name=a").unwrap();
        let found = storage.list(&Context::new("ns2"), &everything, &named).unwrap();
        let items = &found.downcast_ref::<List>().unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].meta().unwrap().namespace, "ns2");

        // The remaining requirements still apply to the looked-up member.
        let db = Selector::parse("app=db").unwrap();
        let filtered = storage.list(&Context::new("ns2"), &db, &named).unwrap();
        assert!(filtered.downcast_ref::<List>().unwrap().items.is_empty());
        let missing = Selector::parse("name=zz").unwrap();
        let none = storage.list(&Context::new("ns1"), &everything, &missing).unwrap();
        assert!(none.downcast_ref::<List>().unwrap().items.is_empty());

        // Across namespaces every match is returned.
        let all = storage.list(&Context::new(""), &everything, &named).unwrap();
        assert_eq!(all.downcast_ref::<List>().unwrap().items.len(), 2);
    }

    #[test]
    fn test_create_assigns_identity_and_rejects_duplicates() {
        let storage = MemoryStorage::<Pod>::new();
        let ctx = Context::new("ns1");
        let result = storage
            .create(&ctx, Box::new(pod("", "a", &[])))
            .unwrap()
            .recv()
            .unwrap();
        assert!(result.created);
        let created = result.object.downcast_ref::<Pod>().unwrap();
        assert_eq!(created.metadata.namespace, "ns1");
        assert!(!created.metadata.uid.is_empty());

        let err = storage.create(&ctx, Box::new(pod("", "a", &[]))).unwrap_err();
        assert_eq!(err.code(), 409);
    }

    #[test]
    fn test_update_and_delete_require_existing_object() {
        let storage = MemoryStorage::<Pod>::new();
        let ctx = Context::new("ns1");
        assert_eq!(
            storage.update(&ctx, Box::new(pod("", "missing", &[]))).unwrap_err().code(),
            404
        );
        assert_eq!(storage.delete(&ctx, "missing").unwrap_err().code(), 404);

        storage.insert(pod("ns1", "a", &[]));
        let updated = storage
            .update(&ctx, Box::new(pod("", "a", &[("v", "2")])))
            .unwrap()
            .recv()
            .unwrap();
        assert!(!updated.created);
        let deleted = storage.delete(&ctx, "a").unwrap().recv().unwrap();
        assert!(deleted.object.is::<Status>());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_namespace_mismatch_is_invalid() {
        let storage = MemoryStorage::<Pod>::new();
        let err = storage
            .create(&Context::new("ns1"), Box::new(pod("ns2", "a", &[])))
            .unwrap_err();
        assert_eq!(err.code(), 422);
    }
}
