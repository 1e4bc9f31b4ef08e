//! Assembly verification
//!
//! Checks an application's metadata against the factory registry before any
//! block is created, so that the lifecycle engine only ever sees a well-formed,
//! acyclic assembly.

use std::collections::{HashMap, HashSet};

use crate::error::{ContainerError, ContainerResult};
use crate::metadata::{ApplicationMetaData, ComponentDescriptor};
use crate::registry::BlockFactoryRegistry;

/// Validates assembly metadata.
pub struct AssemblyVerifier;

impl AssemblyVerifier {
    /// Runs every check and returns the first problem found.
    ///
    /// Checks, in order: names, uniqueness, implementations, exported
    /// services, dependency targets, role aliases and cycles.
    pub fn verify(
        metadata: &ApplicationMetaData,
        registry: &BlockFactoryRegistry,
    ) -> ContainerResult<()> {
        let components = || metadata.blocks().iter().chain(metadata.listeners());

        for component in components() {
            Self::verify_name(component.name())?;
        }
        Self::verify_unique(components())?;

        for component in components() {
            Self::verify_implementation(component, registry)?;
        }

        for block in metadata.blocks() {
            Self::verify_dependencies(block, metadata.blocks(), registry)?;
            Self::verify_roles(block)?;
        }

        Self::verify_acyclic(metadata.blocks())?;

        tracing::debug!(
            "Verified assembly '{}': {} block(s), {} listener(s)",
            metadata.name(),
            metadata.blocks().len(),
            metadata.listeners().len()
        );
        Ok(())
    }

    /// A valid name is non-empty and made only of ASCII letters, digits and `-`.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    }

    fn verify_name(name: &str) -> ContainerResult<()> {
        if Self::is_valid_name(name) {
            Ok(())
        } else {
            Err(ContainerError::InvalidName(name.to_string()))
        }
    }

    fn verify_unique<'a>(
        components: impl Iterator<Item = &'a ComponentDescriptor>,
    ) -> ContainerResult<()> {
        let mut seen = HashSet::new();
        for component in components {
            if !seen.insert(component.name()) {
                return Err(ContainerError::DuplicateName(component.name().to_string()));
            }
        }
        Ok(())
    }

    fn verify_implementation(
        component: &ComponentDescriptor,
        registry: &BlockFactoryRegistry,
    ) -> ContainerResult<()> {
        let factory = registry.get(component.implementation())?;
        for service in component.services() {
            if factory.export(service).is_none() {
                return Err(ContainerError::ServiceNotExported {
                    implementation: component.implementation().to_string(),
                    service: service.clone(),
                });
            }
        }
        Ok(())
    }

    fn verify_dependencies(
        block: &ComponentDescriptor,
        blocks: &[ComponentDescriptor],
        registry: &BlockFactoryRegistry,
    ) -> ContainerResult<()> {
        for dep in block.dependencies() {
            let provider = blocks
                .iter()
                .find(|b| b.name() == dep.provider())
                .ok_or_else(|| ContainerError::UnknownProvider {
                    consumer: block.name().to_string(),
                    role: dep.role().to_string(),
                    provider: dep.provider().to_string(),
                })?;

            let offered = provider.declares_service(dep.service())
                || (provider.disable_proxy()
                    && registry
                        .get(provider.implementation())?
                        .export(dep.service())
                        .is_some());

            if !offered {
                return Err(ContainerError::MissingService {
                    consumer: block.name().to_string(),
                    provider: provider.name().to_string(),
                    service: dep.service().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Dependencies sharing a role must be told apart by alias.
    fn verify_roles(block: &ComponentDescriptor) -> ContainerResult<()> {
        let mut seen = HashSet::new();
        for dep in block.dependencies() {
            if !seen.insert((dep.role(), dep.alias())) {
                return Err(ContainerError::DuplicateRole {
                    block: block.name().to_string(),
                    role: dep.role().to_string(),
                });
            }
        }
        Ok(())
    }

    fn verify_acyclic(blocks: &[ComponentDescriptor]) -> ContainerResult<()> {
        let graph: HashMap<&str, Vec<&str>> = blocks
            .iter()
            .map(|b| {
                let providers = b.dependencies().iter().map(|d| d.provider()).collect();
                (b.name(), providers)
            })
            .collect();

        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        // walk in declaration order so the reported cycle is deterministic
        for block in blocks {
            if !visited.contains(block.name()) {
                if let Some(cycle) = detect_cycle(block.name(), &graph, &mut visited, &mut stack) {
                    return Err(ContainerError::CircularDependency(cycle));
                }
            }
        }
        Ok(())
    }
}

/// DFS-based cycle detection
///
/// Returns the cycle as a path whose first and last elements are equal.
fn detect_cycle<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    stack.push(node);

    if let Some(providers) = graph.get(node) {
        for &provider in providers {
            if let Some(start) = stack.iter().position(|n| *n == provider) {
                let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(provider.to_string());
                return Some(cycle);
            }
            if !visited.contains(provider) {
                if let Some(cycle) = detect_cycle(provider, graph, visited, stack) {
                    return Some(cycle);
                }
            }
        }
    }

    stack.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Block;
    use crate::metadata::DependencyDescriptor;
    use crate::registry::BlockFactory;
    use crate::service_export;

    trait Store: Send + Sync {}

    #[derive(Default)]
    struct Memory;

    impl Block for Memory {}
    impl Store for Memory {}

    fn registry() -> BlockFactoryRegistry {
        BlockFactoryRegistry::new()
            .with_factory(
                BlockFactory::of::<Memory>("memory")
                    .with_export(service_export!(Memory as dyn Store, "store")),
            )
            .unwrap()
    }

    fn block(name: &str) -> ComponentDescriptor {
        ComponentDescriptor::new(name, "memory").with_service("store")
    }

    fn depends(name: &str, providers: &[&str]) -> ComponentDescriptor {
        providers.iter().fold(block(name), |d, p| {
            d.with_dependency(DependencyDescriptor::new("store", *p).with_alias(*p))
        })
    }

    fn verify(metadata: ApplicationMetaData) -> ContainerResult<()> {
        AssemblyVerifier::verify(&metadata, &registry())
    }

    #[test]
    fn test_valid_assembly() {
        let metadata = ApplicationMetaData::new("app")
            .with_block(block("config"))
            .with_block(depends("database", &["config"]))
            .with_block(depends("user-service", &["database", "config"]));
        assert!(verify(metadata).is_ok());
    }

    #[test]
    fn test_name_rules() {
        assert!(AssemblyVerifier::is_valid_name("block-1"));
        assert!(!AssemblyVerifier::is_valid_name(""));
        assert!(!AssemblyVerifier::is_valid_name("my block"));
        assert!(!AssemblyVerifier::is_valid_name("a.b"));

        let metadata = ApplicationMetaData::new("app").with_block(block("bad_name"));
        assert!(matches!(verify(metadata), Err(ContainerError::InvalidName(_))));
    }

    #[test]
    fn test_duplicate_names_across_blocks_and_listeners() {
        let metadata = ApplicationMetaData::new("app")
            .with_block(block("shared"))
            .with_listener(ComponentDescriptor::new("shared", "memory"));
        assert!(matches!(
            verify(metadata),
            Err(ContainerError::DuplicateName(name)) if name == "shared"
        ));
    }

    #[test]
    fn test_unknown_implementation_and_unexported_service() {
        let metadata =
            ApplicationMetaData::new("app").with_block(ComponentDescriptor::new("x", "missing"));
        assert!(matches!(verify(metadata), Err(ContainerError::UnknownImplementation(_))));

        let metadata = ApplicationMetaData::new("app")
            .with_block(ComponentDescriptor::new("x", "memory").with_service("cache"));
        assert!(matches!(verify(metadata), Err(ContainerError::ServiceNotExported { .. })));
    }

    #[test]
    fn test_missing_provider_and_service() {
        let metadata = ApplicationMetaData::new("app").with_block(depends("a", &["ghost"]));
        assert!(matches!(verify(metadata), Err(ContainerError::UnknownProvider { .. })));

        let metadata = ApplicationMetaData::new("app")
            .with_block(ComponentDescriptor::new("plain", "memory"))
            .with_block(depends("a", &["plain"]));
        assert!(matches!(verify(metadata), Err(ContainerError::MissingService { .. })));

        // disable-proxy 的提供者暴露全部导出
        let metadata = ApplicationMetaData::new("app")
            .with_block(ComponentDescriptor::new("open", "memory").with_disable_proxy(true))
            .with_block(depends("a", &["open"]));
        assert!(verify(metadata).is_ok());
    }

    #[test]
    fn test_shared_role_needs_distinct_aliases() {
        let metadata = ApplicationMetaData::new("app")
            .with_block(block("east"))
            .with_block(block("west"))
            .with_block(
                block("router")
                    .with_dependency(DependencyDescriptor::new("store", "east").with_alias("peer"))
                    .with_dependency(DependencyDescriptor::new("store", "west").with_alias("peer")),
            );
        assert!(matches!(verify(metadata), Err(ContainerError::DuplicateRole { .. })));
    }

    #[test]
    fn test_cycle_reported_as_path() {
        let metadata = ApplicationMetaData::new("app")
            .with_block(depends("a", &["b"]))
            .with_block(depends("b", &["c"]))
            .with_block(depends("c", &["a"]));

        match verify(metadata) {
            Err(ContainerError::CircularDependency(cycle)) => {
                assert_eq!(cycle, vec!["a", "b", "c", "a"]);
            }
            other => panic!("Expected CircularDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency() {
        let metadata = ApplicationMetaData::new("app").with_block(depends("solo", &["solo"]));
        match verify(metadata) {
            Err(ContainerError::CircularDependency(cycle)) => assert_eq!(cycle.len(), 2),
            other => panic!("Expected CircularDependency, got {:?}", other),
        }
    }
}
