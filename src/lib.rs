//! caphub - In-process runtime for versioned, shared feature services
//!
//! This crate composes independently-deployed software modules ("consumers")
//! over shared, versioned capability providers ("feature services"), plus an
//! orchestration loop that drives repeated, asynchronously-settling render
//! passes until output stabilizes.
//!
//! ## Subsystems
//!
//! 1. [`hub`] - the dependency-resolving service registry: registers
//!    providers in dependency order, exposes multiple semver-compatible
//!    versions of a capability simultaneously, and binds/unbinds consumers
//!    with per-binding lifecycle and failure isolation
//! 2. [`render`] - the render-until-stable orchestrator: a fixed-point
//!    iteration that re-invokes a render function as long as any participant
//!    signals pending asynchronous work, bounded by a timeout race
//! 3. [`config`] - the integrator-supplied configuration boundary
//!
//! ## Design principles
//!
//! 1. **First-match version semantics**: when several exposed versions
//!    satisfy a requested range, the one declared earliest wins - provider
//!    authors express preference through declaration order
//! 2. **Append-only registry**: a provider id is registered at most once for
//!    the registry's lifetime; redeclaration is a logged no-op
//! 3. **Failure isolation**: optional-dependency misses and teardown errors
//!    are logged, never fatal to the caller
//! 4. **No ambient state**: callers explicitly hold and pass a registry
//!    instance; the registry is in-process and single-writer

pub mod config;
pub mod hub;
pub mod render;

pub use config::{HubConfig, RenderConfig};
pub use hub::{
    BindingState, ConsumerBinding, ConsumerDefinition, FeatureServiceBinding, FeatureServiceEnv,
    FeatureServiceInstance, FeatureServices, HubError, ProviderDefinition, ServiceRegistry,
    SharedService,
};
pub use render::RenderOrchestrator;
