//! Consumer binding against the registry's feature service map
//!
//! Resolves a consumer's merged dependency map to live bindings, tracks the
//! consumer's UID in the active set, and hands back an idempotency-guarded
//! unbind handle with isolated per-binding teardown.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::hub::registry::{lock_state, RegistryState};
use crate::hub::types::{
    consumer_uid, ConsumerDefinition, FeatureServiceBinding, FeatureServices, HubError, TeardownFn,
};
use crate::hub::version::VersionReq;

/// One resolved capability binding held by a consumer
pub(crate) struct BindingRecord {
    capability: String,
    teardown: Option<TeardownFn>,
}

/// State of a consumer binding handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Bound,
    Unbound,
}

/// Result of binding a consumer, before it is wrapped in a handle
pub(crate) struct BoundConsumer {
    pub uid: String,
    pub feature_services: FeatureServices,
    pub records: Vec<BindingRecord>,
}

/// Live consumer binding: the assembled capability mapping plus teardown
///
/// `unbind` may be called exactly once; a second call is fatal. Dropping the
/// handle without unbinding leaves the consumer UID active for the registry's
/// lifetime, which is the intended behavior for process-lifetime consumers
/// such as providers.
pub struct ConsumerBinding {
    uid: String,
    state: BindingState,
    feature_services: FeatureServices,
    records: Vec<BindingRecord>,
    registry: Arc<Mutex<RegistryState>>,
}

impl std::fmt::Debug for ConsumerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerBinding")
            .field("uid", &self.uid)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ConsumerBinding {
    pub(crate) fn new(bound: BoundConsumer, registry: Arc<Mutex<RegistryState>>) -> Self {
        Self {
            uid: bound.uid,
            state: BindingState::Bound,
            feature_services: bound.feature_services,
            records: bound.records,
            registry,
        }
    }

    pub fn consumer_uid(&self) -> &str {
        &self.uid
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    /// Capability mapping assembled at bind time
    pub fn feature_services(&self) -> &FeatureServices {
        &self.feature_services
    }

    /// Detach this consumer.
    ///
    /// Removes the consumer UID from the active set, then runs each recorded
    /// teardown in binding order. A failing teardown is logged and does not
    /// prevent the remaining teardowns from running. Callers must not bind or
    /// register from within a teardown triggered by this call.
    pub fn unbind(&mut self) -> Result<(), HubError> {
        if self.state == BindingState::Unbound {
            return Err(HubError::AlreadyUnbound(self.uid.clone()));
        }
        self.state = BindingState::Unbound;

        lock_state(&self.registry).active_consumers.remove(&self.uid);
        info!("Consumer {} unbound", self.uid);

        for record in self.records.drain(..) {
            if let Some(teardown) = record.teardown {
                if let Err(e) = teardown() {
                    error!(
                        "Teardown of {} for consumer {} failed: {}",
                        record.capability, self.uid, e
                    );
                }
            }
        }

        Ok(())
    }
}

/// Bind a consumer against the current registry state.
///
/// The caller holds the registry lock; the returned bindings have already
/// been obtained from their providers' binders.
pub(crate) fn bind_consumer(
    state: &mut RegistryState,
    definition: &ConsumerDefinition,
    specifier: Option<&str>,
) -> Result<BoundConsumer, HubError> {
    let uid = consumer_uid(&definition.id, specifier);
    if state.active_consumers.contains(&uid) {
        return Err(HubError::DuplicateBind(uid));
    }

    // Merge dependency maps; required entries win key collisions. Sorted
    // iteration keeps binding order and diagnostics deterministic.
    let mut requested: BTreeMap<&str, (&str, bool)> = BTreeMap::new();
    for (capability, range) in &definition.optional_dependencies {
        requested.insert(capability, (range, false));
    }
    for (capability, range) in &definition.dependencies {
        requested.insert(capability, (range, true));
    }

    let mut feature_services = FeatureServices::default();
    let mut records = Vec::new();

    for (capability, (range, required)) in requested {
        if let Some((version, binding)) = resolve_one(state, &uid, capability, range, required)? {
            info!(
                "Bound feature service {}@{} for consumer {}",
                capability, version, uid
            );
            feature_services.insert(capability.to_string(), binding.instance);
            records.push(BindingRecord {
                capability: capability.to_string(),
                teardown: binding.unbind,
            });
        }
    }

    state.active_consumers.insert(uid.clone());
    info!("Consumer {} bound ({} feature services)", uid, records.len());

    Ok(BoundConsumer {
        uid,
        feature_services,
        records,
    })
}

/// Resolve a single requested capability.
///
/// `Ok(None)` is an advisory skip (optional dependency); every failure of a
/// required dependency is fatal.
fn resolve_one(
    state: &RegistryState,
    uid: &str,
    capability: &str,
    range: &str,
    required: bool,
) -> Result<Option<(String, FeatureServiceBinding)>, HubError> {
    if range.trim().is_empty() {
        if required {
            return Err(HubError::MissingVersionRange {
                consumer: uid.to_string(),
                capability: capability.to_string(),
            });
        }
        info!(
            "Optional dependency {} of consumer {} has no version range, skipping",
            capability, uid
        );
        return Ok(None);
    }

    let Some(service) = state.services.get(capability) else {
        if required {
            return Err(HubError::MissingProvider {
                consumer: uid.to_string(),
                capability: capability.to_string(),
            });
        }
        info!(
            "Optional feature service {} for consumer {} is not registered, skipping",
            capability, uid
        );
        return Ok(None);
    };

    let req = match VersionReq::parse(range) {
        Ok(req) => req,
        Err(e) if required => return Err(e),
        Err(e) => {
            warn!(
                "Invalid version range for optional dependency {} of consumer {}, skipping: {}",
                capability, uid, e
            );
            return Ok(None);
        }
    };

    let Some(entry) = service.versions.iter().find(|e| req.matches(&e.parsed)) else {
        if required {
            let exposed: Vec<&str> = service.versions.iter().map(|e| e.version.as_str()).collect();
            return Err(HubError::VersionMismatch {
                consumer: uid.to_string(),
                capability: capability.to_string(),
                requested: range.to_string(),
                exposed: exposed.join(", "),
            });
        }
        info!(
            "No version of optional feature service {} satisfies {} for consumer {}, skipping",
            capability, range, uid
        );
        return Ok(None);
    };

    let binding = (entry.binder)(uid);
    Ok(Some((entry.version.clone(), binding)))
}
