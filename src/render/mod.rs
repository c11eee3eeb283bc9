//! Render orchestration
//!
//! The orchestrator is structurally independent of the hub but consumes the
//! same capability-binding contract: a capability instance obtained through a
//! binding is typically what calls back into the orchestrator to request a
//! rerender.

pub mod orchestrator;

pub use orchestrator::RenderOrchestrator;
