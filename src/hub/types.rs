//! Core types for the feature service hub
//!
//! Defines the definitions providers and consumers hand to the registry, the
//! shared-service shape providers expose, and the hub-wide error enum.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Dynamic capability payload handed to consumers.
///
/// The registry does not know payload shapes; consumers downcast at the call
/// site via [`FeatureServices::get`].
pub type FeatureServiceInstance = Arc<dyn Any + Send + Sync>;

/// Cleanup callback invoked when a consumer detaches from a binding.
pub type TeardownFn = Box<dyn FnOnce() -> Result<(), HubError> + Send>;

/// Produces a [`FeatureServiceBinding`] for the given consumer UID.
///
/// Binders run with the registry lock held and must not call back into the
/// registry.
pub type FeatureServiceBinder = Box<dyn Fn(&str) -> FeatureServiceBinding + Send + Sync>;

/// Factory invoked once at registration to create a provider's shared service.
pub type CreateFeatureService =
    Box<dyn Fn(FeatureServiceEnv) -> Result<SharedService, HubError> + Send + Sync>;

/// Live handle a binder produces for one consumer
pub struct FeatureServiceBinding {
    /// Capability object handed to the consumer
    pub instance: FeatureServiceInstance,
    /// Optional cleanup, invoked when the consumer detaches
    pub unbind: Option<TeardownFn>,
}

impl FeatureServiceBinding {
    /// Binding without teardown
    pub fn new(instance: FeatureServiceInstance) -> Self {
        Self {
            instance,
            unbind: None,
        }
    }

    /// Binding with a teardown callback
    pub fn with_teardown(
        instance: FeatureServiceInstance,
        teardown: impl FnOnce() -> Result<(), HubError> + Send + 'static,
    ) -> Self {
        Self {
            instance,
            unbind: Some(Box::new(teardown)),
        }
    }
}

/// Ordered mapping from exposed version string to binder
///
/// Declaration order is semantically significant: consumers are matched
/// against versions in this order, first match wins. Every version string
/// must be coercible to a semantic version by registration time.
#[derive(Default)]
pub struct SharedService {
    versions: Vec<(String, FeatureServiceBinder)>,
}

impl SharedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `binder` under `version`, appending in declaration order.
    ///
    /// Re-adding an existing version replaces its binder in place, keeping
    /// the original declaration position.
    pub fn add_version(
        mut self,
        version: impl Into<String>,
        binder: impl Fn(&str) -> FeatureServiceBinding + Send + Sync + 'static,
    ) -> Self {
        let version = version.into();
        let binder: FeatureServiceBinder = Box::new(binder);
        match self.versions.iter_mut().find(|(v, _)| *v == version) {
            Some(entry) => entry.1 = binder,
            None => self.versions.push((version, binder)),
        }
        self
    }

    /// Exposed version strings in declaration order
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(|(v, _)| v.as_str())
    }

    pub(crate) fn into_versions(self) -> Vec<(String, FeatureServiceBinder)> {
        self.versions
    }
}

impl fmt::Debug for SharedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedService")
            .field("versions", &self.versions().collect::<Vec<_>>())
            .finish()
    }
}

/// Capability mapping assembled for one consumer
#[derive(Clone, Default)]
pub struct FeatureServices {
    services: HashMap<String, FeatureServiceInstance>,
}

impl FeatureServices {
    pub(crate) fn insert(&mut self, id: String, instance: FeatureServiceInstance) {
        self.services.insert(id, instance);
    }

    /// Raw instance for a capability id, if bound
    pub fn instance(&self, id: &str) -> Option<&FeatureServiceInstance> {
        self.services.get(id)
    }

    /// Typed access to a bound capability.
    ///
    /// Returns `None` when the capability is absent or the payload is not a
    /// `T`; shape validation is owned by the consumer, not the registry.
    pub fn get<T: Any + Send + Sync>(&self, id: &str) -> Option<Arc<T>> {
        self.services
            .get(id)
            .and_then(|instance| Arc::clone(instance).downcast::<T>().ok())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    /// Bound capability ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.services.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for FeatureServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureServices")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Environment passed to a provider's create factory
pub struct FeatureServiceEnv {
    /// Integrator-supplied configuration for this provider id, if any
    pub config: Option<serde_json::Value>,
    /// The provider's own bound dependencies
    pub feature_services: FeatureServices,
}

/// Declaration a consumer hands to the binder
///
/// Dependency maps go from capability id to a version range expression. An
/// empty range string declares the dependency without a version range, which
/// is fatal for required entries and an advisory skip for optional ones.
#[derive(Debug, Clone, Default)]
pub struct ConsumerDefinition {
    pub id: String,
    pub dependencies: HashMap<String, String>,
    pub optional_dependencies: HashMap<String, String>,
}

impl ConsumerDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_dependency(mut self, id: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.insert(id.into(), range.into());
        self
    }

    pub fn with_optional_dependency(
        mut self,
        id: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        self.optional_dependencies.insert(id.into(), range.into());
        self
    }
}

/// Definition of a feature service provider
///
/// Immutable once passed to registration. Providers are themselves consumers:
/// their dependency maps are bound against the registry before `create` runs.
pub struct ProviderDefinition {
    pub id: String,
    pub dependencies: HashMap<String, String>,
    pub optional_dependencies: HashMap<String, String>,
    pub create: CreateFeatureService,
}

impl ProviderDefinition {
    pub fn new(
        id: impl Into<String>,
        create: impl Fn(FeatureServiceEnv) -> Result<SharedService, HubError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            dependencies: HashMap::new(),
            optional_dependencies: HashMap::new(),
            create: Box::new(create),
        }
    }

    pub fn with_dependency(mut self, id: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.insert(id.into(), range.into());
        self
    }

    pub fn with_optional_dependency(
        mut self,
        id: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        self.optional_dependencies.insert(id.into(), range.into());
        self
    }

    pub(crate) fn consumer_definition(&self) -> ConsumerDefinition {
        ConsumerDefinition {
            id: self.id.clone(),
            dependencies: self.dependencies.clone(),
            optional_dependencies: self.optional_dependencies.clone(),
        }
    }
}

impl fmt::Debug for ProviderDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDefinition")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("optional_dependencies", &self.optional_dependencies)
            .finish()
    }
}

/// Unique runtime identity of a bound consumer instance.
///
/// Distinct consumer instances of the same definition must supply distinct
/// specifiers.
pub fn consumer_uid(id: &str, specifier: Option<&str>) -> String {
    match specifier {
        Some(specifier) => format!("{}:{}", id, specifier),
        None => id.to_string(),
    }
}

/// Feature service hub errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("dependency cycle detected among feature services: {0}")]
    DependencyCycle(String),

    #[error("required feature service {capability} for consumer {consumer} is not registered")]
    MissingProvider { consumer: String, capability: String },

    #[error("consumer {consumer} declared dependency {capability} without a version range")]
    MissingVersionRange { consumer: String, capability: String },

    #[error(
        "no version of feature service {capability} satisfies {requested} \
         for consumer {consumer} (exposed: {exposed})"
    )]
    VersionMismatch {
        consumer: String,
        capability: String,
        requested: String,
        exposed: String,
    },

    #[error("feature service {provider} exposes invalid version {version} (registered by {registered_by})")]
    InvalidVersion {
        provider: String,
        version: String,
        registered_by: String,
    },

    #[error("invalid version range {range}: {reason}")]
    InvalidVersionRange { range: String, reason: String },

    #[error("consumer {0} is already bound")]
    DuplicateBind(String),

    #[error("consumer {0} is already unbound")]
    AlreadyUnbound(String),

    #[error("feature service creation failed: {0}")]
    CreationFailed(String),

    #[error("teardown failed: {0}")]
    TeardownFailed(String),

    #[error("invalid hub configuration: {0}")]
    InvalidConfig(String),

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("render did not complete within {0:?}")]
    RenderTimeout(Duration),

    #[error("a render operation is already in progress")]
    RenderInProgress,
}

impl From<anyhow::Error> for HubError {
    fn from(e: anyhow::Error) -> Self {
        HubError::CreationFailed(e.to_string())
    }
}
