//! Dependency ordering for block lifecycle phases
//!
//! Computes the order in which blocks are visited during a phase: providers
//! before consumers on startup, consumers before providers on shutdown.

use std::collections::HashSet;

use crate::error::{ContainerError, ContainerResult};
use crate::metadata::ComponentDescriptor;
use crate::state::Phase;

/// Depth-first walker over the dependency edges declared by a set of blocks.
pub struct DependencyGraph;

impl DependencyGraph {
    /// Returns the names of all `blocks` in visitation order for `phase`.
    ///
    /// Traversal starts from each block in input order and visits every
    /// block exactly once, so independent subgraphs keep their relative
    /// input order and the result is deterministic.
    ///
    /// The graph must be acyclic. A cycle does not loop forever (visited
    /// nodes are marked before recursing) but yields an order that violates
    /// the provider/consumer guarantee; the assembly verifier rejects cycles
    /// before any phase runs.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::UnknownProvider`] if a dependency names a
    /// block that is not part of `blocks`.
    pub fn walk(phase: Phase, blocks: &[ComponentDescriptor]) -> ContainerResult<Vec<String>> {
        Self::check_providers(blocks)?;

        let mut done = HashSet::with_capacity(blocks.len());
        let mut order = Vec::with_capacity(blocks.len());

        for block in blocks {
            match phase {
                Phase::Startup => Self::visit_providers(block, blocks, &mut done, &mut order),
                Phase::Shutdown => Self::visit_consumers(block, blocks, &mut done, &mut order),
            }
        }

        Ok(order)
    }

    /// Returns the blocks that `name` directly depends on, in declaration order.
    pub fn providers<'a>(
        name: &str,
        blocks: &'a [ComponentDescriptor],
    ) -> ContainerResult<Vec<&'a ComponentDescriptor>> {
        let block = Self::find(name, blocks)
            .ok_or_else(|| ContainerError::UnknownBlock(name.to_string()))?;

        block
            .dependencies()
            .iter()
            .map(|dep| {
                Self::find(dep.provider(), blocks).ok_or_else(|| ContainerError::UnknownProvider {
                    consumer: name.to_string(),
                    role: dep.role().to_string(),
                    provider: dep.provider().to_string(),
                })
            })
            .collect()
    }

    /// Returns the blocks that directly depend on `name`, in input order.
    pub fn consumers<'a>(
        name: &str,
        blocks: &'a [ComponentDescriptor],
    ) -> Vec<&'a ComponentDescriptor> {
        blocks.iter().filter(|b| b.depends_on(name)).collect()
    }

    fn find<'a>(name: &str, blocks: &'a [ComponentDescriptor]) -> Option<&'a ComponentDescriptor> {
        blocks.iter().find(|b| b.name() == name)
    }

    fn check_providers(blocks: &[ComponentDescriptor]) -> ContainerResult<()> {
        for block in blocks {
            for dep in block.dependencies() {
                if Self::find(dep.provider(), blocks).is_none() {
                    return Err(ContainerError::UnknownProvider {
                        consumer: block.name().to_string(),
                        role: dep.role().to_string(),
                        provider: dep.provider().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn visit_providers<'a>(
        block: &'a ComponentDescriptor,
        blocks: &'a [ComponentDescriptor],
        done: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) {
        if !done.insert(block.name()) {
            return;
        }

        for dep in block.dependencies() {
            // providers were checked up front
            if let Some(provider) = Self::find(dep.provider(), blocks) {
                Self::visit_providers(provider, blocks, done, order);
            }
        }

        order.push(block.name().to_string());
    }

    fn visit_consumers<'a>(
        block: &'a ComponentDescriptor,
        blocks: &'a [ComponentDescriptor],
        done: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) {
        if !done.insert(block.name()) {
            return;
        }

        for other in blocks {
            if other.name() != block.name() && other.depends_on(block.name()) {
                Self::visit_consumers(other, blocks, done, order);
            }
        }

        order.push(block.name().to_string());
    }
}
