#![allow(dead_code)]

//! Shared fixtures for integration tests: a recording storage with configurable capabilities
//! and completion, a recording admission gate and a self linker that can be told to fail.

use brrtrest::admission::{AdmissionControl, Attributes};
use brrtrest::dispatcher::Dispatcher;
use brrtrest::runtime::{
    List, MetaSelfLinker, Object, ObjectMeta, Resource, SelfLinker, Status,
};
use brrtrest::selector::Selector;
use brrtrest::storage::{
    Capability, Context, Creater, Deleter, Getter, Lister, RestResult, ResultSender,
    ResultSource, Storage, Updater,
};
use brrtrest::ApiError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

pub const PREFIX: &str = "/api/v1beta1";

/// Ensures May coroutines are configured only once
static MAY_INIT: Once = Once::new();

pub fn setup_may_runtime() {
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
    });
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Minion {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_ip: String,
}

impl Resource for Minion {
    const KIND: &'static str = "Minion";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

pub fn minion(namespace: &str, name: &str) -> Minion {
    Minion {
        metadata: ObjectMeta::named(namespace, name),
        host_ip: String::new(),
    }
}

/// Ordered record of backend and admission calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// How mutation results reach the dispatcher.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Resolved before the backend call returns.
    Immediate,
    /// Resolved from another thread after the delay.
    Delayed(Duration),
    /// Held until [`RecordingStorage::release`] is called.
    Held,
    /// Resolved with the error embedded as a `Status`.
    Embedded(ApiError),
    /// The sender is dropped without a value.
    Dropped,
}

pub struct RecordingStorage {
    log: CallLog,
    capabilities: Vec<Capability>,
    items: Vec<Minion>,
    completion: Completion,
    held: Mutex<Vec<(ResultSender, RestResult)>>,
}

impl RecordingStorage {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            capabilities: Capability::ALL.to_vec(),
            items: Vec::new(),
            completion: Completion::Immediate,
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    pub fn with_items(mut self, items: Vec<Minion>) -> Self {
        self.items = items;
        self
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    /// Deliver every held result.
    pub fn release(&self) {
        for (tx, result) in self.held.lock().drain(..) {
            let _ = tx.send(result);
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }

    fn respond(&self, result: RestResult) -> ResultSource {
        match &self.completion {
            Completion::Immediate => ResultSource::ready(result),
            Completion::Delayed(delay) => {
                let delay = *delay;
                let (tx, source) = ResultSource::channel();
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    let _ = tx.send(result);
                });
                source
            }
            Completion::Held => {
                let (tx, source) = ResultSource::channel();
                self.held.lock().push((tx, result));
                source
            }
            Completion::Embedded(err) => ResultSource::ready(RestResult::from_error(err)),
            Completion::Dropped => ResultSource::channel().1,
        }
    }

    fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

fn into_minion(obj: Box<dyn Object>) -> Result<Minion, ApiError> {
    obj.downcast_ref::<Minion>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("expected a Minion".to_string()))
}

impl Lister for RecordingStorage {
    fn list(
        &self,
        _ctx: &Context,
        label: &Selector,
        field: &Selector,
    ) -> Result<Box<dyn Object>, ApiError> {
        self.record(format!("list:{label}:{field}"));
        let items = self
            .items
            .iter()
            .map(|m| Box::new(m.clone()) as Box<dyn Object>)
            .collect();
        Ok(Box::new(List::new(items)))
    }
}

impl Getter for RecordingStorage {
    fn get(&self, _ctx: &Context, name: &str) -> Result<Box<dyn Object>, ApiError> {
        self.record(format!("get:{name}"));
        self.items
            .iter()
            .find(|m| m.metadata.name == name)
            .map(|m| Box::new(m.clone()) as Box<dyn Object>)
            .ok_or_else(|| ApiError::not_found("minions", name))
    }
}

impl Creater for RecordingStorage {
    fn create(&self, _ctx: &Context, obj: Box<dyn Object>) -> Result<ResultSource, ApiError> {
        self.record("create".to_string());
        let minion = into_minion(obj)?;
        Ok(self.respond(RestResult::created(Box::new(minion))))
    }
}

impl Updater for RecordingStorage {
    fn update(&self, _ctx: &Context, obj: Box<dyn Object>) -> Result<ResultSource, ApiError> {
        self.record("update".to_string());
        let minion = into_minion(obj)?;
        Ok(self.respond(RestResult::new(Box::new(minion))))
    }
}

impl Deleter for RecordingStorage {
    fn delete(&self, _ctx: &Context, name: &str) -> Result<ResultSource, ApiError> {
        self.record(format!("delete:{name}"));
        Ok(self.respond(RestResult::new(Box::new(Status::success()))))
    }
}

impl Storage for RecordingStorage {
    fn new_object(&self) -> Box<dyn Object> {
        Box::new(Minion::default())
    }

    fn as_lister(&self) -> Option<&dyn Lister> {
        self.has(Capability::List).then_some(self as &dyn Lister)
    }

    fn as_getter(&self) -> Option<&dyn Getter> {
        self.has(Capability::Get).then_some(self as &dyn Getter)
    }

    fn as_creater(&self) -> Option<&dyn Creater> {
        self.has(Capability::Create).then_some(self as &dyn Creater)
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        self.has(Capability::Update).then_some(self as &dyn Updater)
    }

    fn as_deleter(&self) -> Option<&dyn Deleter> {
        self.has(Capability::Delete).then_some(self as &dyn Deleter)
    }
}

/// Admission gate recording `admit:{action}:{resource}:{namespace}:{object|none}`.
pub struct RecordingAdmission {
    log: CallLog,
    deny: bool,
}

impl RecordingAdmission {
    pub fn admit_all(log: CallLog) -> Self {
        Self { log, deny: false }
    }

    pub fn deny_all(log: CallLog) -> Self {
        Self { log, deny: true }
    }
}

impl AdmissionControl for RecordingAdmission {
    fn admit(&self, attributes: &Attributes<'_>) -> Result<(), ApiError> {
        self.log.lock().push(format!(
            "admit:{}:{}:{}:{}",
            attributes.action(),
            attributes.resource(),
            attributes.namespace(),
            if attributes.object().is_some() {
                "object"
            } else {
                "none"
            }
        ));
        if self.deny {
            return Err(ApiError::Forbidden("denied by test gate".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailure {
    /// The name lookup fails, so only links with an appended name break.
    Name,
    /// Writing any link fails.
    SetSelfLink,
    /// The namespace lookup fails, so every link breaks before it is written.
    Namespace,
}

/// [`MetaSelfLinker`] counting successful link writes, optionally failing.
#[derive(Default)]
pub struct TestLinker {
    failure: Option<LinkFailure>,
    set_calls: AtomicUsize,
}

impl TestLinker {
    pub fn failing(failure: LinkFailure) -> Self {
        Self {
            failure: Some(failure),
            set_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

impl SelfLinker for TestLinker {
    fn namespace(&self, obj: &dyn Object) -> Result<String, ApiError> {
        if self.failure == Some(LinkFailure::Namespace) {
            return Err(ApiError::SelfLink("namespace unavailable".to_string()));
        }
        MetaSelfLinker.namespace(obj)
    }

    fn name(&self, obj: &dyn Object) -> Result<String, ApiError> {
        if self.failure == Some(LinkFailure::Name) {
            return Err(ApiError::SelfLink("name unavailable".to_string()));
        }
        MetaSelfLinker.name(obj)
    }

    fn set_self_link(&self, obj: &mut dyn Object, link: &str) -> Result<(), ApiError> {
        if self.failure == Some(LinkFailure::SetSelfLink) {
            return Err(ApiError::SelfLink("link rejected".to_string()));
        }
        MetaSelfLinker.set_self_link(obj, link)?;
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_list(&self, obj: &dyn Object) -> bool {
        MetaSelfLinker.is_list(obj)
    }

    fn extract_list(&self, obj: &mut dyn Object) -> Result<Vec<Box<dyn Object>>, ApiError> {
        MetaSelfLinker.extract_list(obj)
    }

    fn set_list(&self, obj: &mut dyn Object, items: Vec<Box<dyn Object>>) -> Result<(), ApiError> {
        MetaSelfLinker.set_list(obj, items)
    }
}

/// Dispatcher serving `minions` from `storage`.
pub fn dispatcher_for(storage: Arc<RecordingStorage>) -> Dispatcher {
    setup_may_runtime();
    Dispatcher::new(PREFIX).with_storage("minions", storage)
}
