//! Dependency resolution for feature service registration
//!
//! Turns a batch of provider -> dependency edges into a deterministic
//! registration order, detecting cycles.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::hub::types::HubError;

/// Dependency resolver for a registration batch
pub struct ServiceDependencies;

impl ServiceDependencies {
    /// Resolve the registration order for a batch of providers.
    ///
    /// `nodes` is a list of `(provider id, dependency ids)` pairs with unique
    /// provider ids and deduplicated dependency lists. Required and optional
    /// edges are not distinguished here; either affects ordering when the
    /// target is part of the same batch. Edges to ids outside the batch are
    /// ignored: those are either already registered or resolved lazily later.
    ///
    /// The output contains every input node exactly once, each after all of
    /// its in-batch dependencies, and is deterministic for a given input
    /// (ties are broken by input order).
    pub fn resolve(nodes: &[(String, Vec<String>)]) -> Result<Vec<String>, HubError> {
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.as_str(), i))
            .collect();

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut in_degree = vec![0usize; nodes.len()];

        for (i, (_, deps)) in nodes.iter().enumerate() {
            for dep in deps {
                // A self-edge never drains and is reported as a cycle
                if let Some(&target) = index.get(dep.as_str()) {
                    dependents[target].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        // Kahn's algorithm, seeded and drained in input order
        let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());

        while let Some(i) = queue.pop_front() {
            order.push(nodes[i].0.clone());
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != nodes.len() {
            let stuck: Vec<&str> = nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, (id, _))| id.as_str())
                .collect();
            return Err(HubError::DependencyCycle(stuck.join(", ")));
        }

        debug!("Registration order resolved: {:?}", order);
        Ok(order)
    }
}
