//! Feature service registry
//!
//! Owns the provider map and the active consumer set. Registration is
//! dependency-ordered and append-only: a provider id is registered at most
//! once for the registry's lifetime and never replaced or removed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::hub::binder::{bind_consumer, ConsumerBinding};
use crate::hub::dependencies::ServiceDependencies;
use crate::hub::types::{
    ConsumerDefinition, FeatureServiceBinder, FeatureServiceEnv, HubError, ProviderDefinition,
};
use crate::hub::version::SemanticVersion;

/// One exposed version of a registered service, validated at registration
pub(crate) struct VersionEntry {
    pub version: String,
    pub parsed: SemanticVersion,
    pub binder: FeatureServiceBinder,
}

/// Committed shared service, versions in declaration order
pub(crate) struct RegisteredService {
    pub versions: Vec<VersionEntry>,
}

/// Registry state, mutated only by the registry and binder
#[derive(Default)]
pub(crate) struct RegistryState {
    pub services: HashMap<String, RegisteredService>,
    pub active_consumers: HashSet<String>,
}

pub(crate) fn lock_state(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    // State stays consistent across a panic elsewhere; recover the guard
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process, single-writer feature service registry
///
/// Callers hold and pass a registry value explicitly; there is no ambient
/// singleton. Cloning via `Arc` is the intended sharing mechanism.
pub struct ServiceRegistry {
    state: Arc<Mutex<RegistryState>>,
    configs: HashMap<String, serde_json::Value>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::with_config(HashMap::new())
    }

    /// Registry with an integrator-supplied per-provider configuration table.
    ///
    /// A provider id absent from the table receives `None` as its config,
    /// which is not an error.
    pub fn with_config(configs: HashMap<String, serde_json::Value>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            configs,
        }
    }

    /// Register a batch of providers in dependency order.
    ///
    /// Order is resolved over the union of required and optional edges among
    /// the given definitions. For each provider in order: an id that is
    /// already registered is skipped with a warning; otherwise the provider's
    /// own dependencies are bound against the current registry state (the
    /// provider's id is its consumer UID), its `create` factory runs, every
    /// exposed version string is validated as semver-coercible, and the
    /// result is committed.
    ///
    /// Registration is not atomic across the batch: a failure partway leaves
    /// earlier providers of the same batch committed.
    ///
    /// Factories run with the registry lock held and must not call back into
    /// the registry; their dependencies are already bound in the env.
    pub fn register_feature_services(
        &self,
        definitions: Vec<ProviderDefinition>,
        consumer_id: &str,
    ) -> Result<(), HubError> {
        let mut by_id: HashMap<String, ProviderDefinition> = HashMap::new();
        let mut edges: Vec<(String, Vec<String>)> = Vec::new();

        for definition in definitions {
            if by_id.contains_key(&definition.id) {
                warn!(
                    "Provider {} declared more than once in batch from {}, keeping the first",
                    definition.id, consumer_id
                );
                continue;
            }
            let deps: BTreeSet<String> = definition
                .dependencies
                .keys()
                .chain(definition.optional_dependencies.keys())
                .cloned()
                .collect();
            edges.push((definition.id.clone(), deps.into_iter().collect()));
            by_id.insert(definition.id.clone(), definition);
        }

        let order = ServiceDependencies::resolve(&edges)?;

        let mut state = lock_state(&self.state);
        for id in order {
            let Some(definition) = by_id.remove(&id) else {
                continue;
            };

            if state.services.contains_key(&id) {
                warn!(
                    "Feature service {} is already registered, ignoring redeclaration by {}",
                    id, consumer_id
                );
                continue;
            }

            // The provider is itself a consumer of the current registry
            // state. Its bindings live for the registry's lifetime, so the
            // teardown handles are not retained.
            let consumer_definition = definition.consumer_definition();
            let bound = bind_consumer(&mut state, &consumer_definition, None)?;

            let env = FeatureServiceEnv {
                config: self.configs.get(&id).cloned(),
                feature_services: bound.feature_services,
            };
            let shared = (definition.create)(env)?;

            let mut versions = Vec::new();
            for (version, binder) in shared.into_versions() {
                let Some(parsed) = SemanticVersion::coerce(&version) else {
                    return Err(HubError::InvalidVersion {
                        provider: id.clone(),
                        version,
                        registered_by: consumer_id.to_string(),
                    });
                };
                versions.push(VersionEntry {
                    version,
                    parsed,
                    binder,
                });
            }

            state.services.insert(id.clone(), RegisteredService { versions });
            info!("Feature service {} registered by {}", id, consumer_id);
        }

        Ok(())
    }

    /// Bind a consumer against the current provider map.
    ///
    /// Binding is not atomic: when a later required dependency fails, the
    /// bindings already obtained in the same call are dropped without their
    /// teardowns running.
    pub fn bind_feature_services(
        &self,
        definition: &ConsumerDefinition,
        specifier: Option<&str>,
    ) -> Result<ConsumerBinding, HubError> {
        let bound = {
            let mut state = lock_state(&self.state);
            bind_consumer(&mut state, definition, specifier)?
        };
        Ok(ConsumerBinding::new(bound, Arc::clone(&self.state)))
    }

    /// Registered provider ids, sorted
    pub fn registered_ids(&self) -> Vec<String> {
        let state = lock_state(&self.state);
        let mut ids: Vec<String> = state.services.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_registered(&self, id: &str) -> bool {
        lock_state(&self.state).services.contains_key(id)
    }

    /// Currently bound consumer UIDs, sorted
    pub fn active_consumers(&self) -> Vec<String> {
        let state = lock_state(&self.state);
        let mut uids: Vec<String> = state.active_consumers.iter().cloned().collect();
        uids.sort_unstable();
        uids
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
