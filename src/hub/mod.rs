//! Feature service hub
//!
//! Composes independently-deployed consumers over shared, versioned
//! capability providers.
//!
//! ## Architecture
//!
//! - **Dependency resolution**: providers register in dependency order,
//!   resolved deterministically per batch with cycle detection
//! - **Version matching**: providers expose multiple semver-compatible
//!   versions simultaneously; consumers get the first declared match for
//!   their requested range, never the numerically highest
//! - **Binding lifecycle**: each bound consumer holds a unique UID and an
//!   idempotency-guarded unbind handle with isolated per-capability teardown
//! - **Failure isolation**: unsatisfiable optional dependencies and teardown
//!   failures are logged, never fatal to the caller

pub mod binder;
pub mod dependencies;
pub mod registry;
pub mod types;
pub mod version;

pub use binder::{BindingState, ConsumerBinding};
pub use dependencies::ServiceDependencies;
pub use registry::ServiceRegistry;
pub use types::{
    consumer_uid, ConsumerDefinition, CreateFeatureService, FeatureServiceBinder,
    FeatureServiceBinding, FeatureServiceEnv, FeatureServiceInstance, FeatureServices, HubError,
    ProviderDefinition, SharedService, TeardownFn,
};
pub use version::{first_satisfying, SemanticVersion, VersionReq};
