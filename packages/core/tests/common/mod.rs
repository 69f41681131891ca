//! Shared helpers for the integration tests

#![allow(dead_code)]

use anyhow::Result;
use arbor_core::{CreateNodeParams, Node, NodeId, NodeService, TreeConfig, TreeShape};
use std::collections::{HashMap, HashSet};
use tempfile::TempDir;

/// Service over a fresh libsql database inside a temp dir
pub async fn libsql_service(config: TreeConfig) -> Result<(NodeService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = NodeService::open(temp_dir.path().join("test.db"), config).await?;
    Ok((service, temp_dir))
}

/// Both backends, so every scenario runs against each
pub async fn all_services(
    config: TreeConfig,
) -> Result<Vec<(&'static str, NodeService, Option<TempDir>)>> {
    let (libsql, temp_dir) = libsql_service(config.clone()).await?;
    Ok(vec![
        ("memory", NodeService::in_memory(config), None),
        ("libsql", libsql, Some(temp_dir)),
    ])
}

pub async fn create(service: &NodeService, parent_id: NodeId, title: &str) -> Result<Node> {
    Ok(service
        .create_node(CreateNodeParams::new(parent_id, title))
        .await?)
}

pub async fn node(service: &NodeService, id: NodeId) -> Result<Node> {
    Ok(service.get_node(id).await?.node)
}

/// Check every structural invariant of the stored tree
///
/// - exactly one parentless node, the configured root
/// - every parent exists and the parent relation is acyclic
/// - `depth == parent.depth + 1`
/// - sibling orderings are `1..=N` (general) or a subset of `{1, 2}` (binary)
pub async fn assert_invariants(service: &NodeService) -> Result<()> {
    let nodes = service.list_nodes().await?.nodes;
    let config = service.config();
    let by_id: HashMap<NodeId, &Node> = nodes.iter().map(|n| (n.id, n)).collect();

    let roots: Vec<&Node> = nodes.iter().filter(|n| n.parent_id.is_none()).collect();
    assert_eq!(roots.len(), 1, "expected exactly one root, got {:?}", roots);
    assert_eq!(roots[0].id, config.root_id);
    assert_eq!(roots[0].depth, 0);

    let mut siblings: HashMap<NodeId, Vec<i64>> = HashMap::new();
    for node in &nodes {
        let Some(parent_id) = node.parent_id else {
            continue;
        };
        let parent = by_id
            .get(&parent_id)
            .unwrap_or_else(|| panic!("node {} has missing parent {}", node.id, parent_id));
        assert_eq!(
            node.depth,
            parent.depth + 1,
            "depth of node {} is inconsistent with parent {}",
            node.id,
            parent_id
        );
        siblings.entry(parent_id).or_default().push(node.ordering);

        // Walk up to the root without revisiting anything
        let mut seen = HashSet::from([node.id]);
        let mut current = node.parent_id;
        while let Some(id) = current {
            assert!(seen.insert(id), "cycle through node {}", id);
            current = by_id[&id].parent_id;
        }
    }

    for (parent_id, mut orderings) in siblings {
        orderings.sort_unstable();
        match config.shape {
            TreeShape::General => {
                let expected: Vec<i64> = (1..=orderings.len() as i64).collect();
                assert_eq!(orderings, expected, "children of {} are not dense", parent_id);
            }
            TreeShape::Binary => {
                assert!(orderings.len() <= 2, "node {} has more than two children", parent_id);
                let mut unique = orderings.clone();
                unique.dedup();
                assert_eq!(unique, orderings, "children of {} share a slot", parent_id);
                assert!(orderings.iter().all(|o| *o == 1 || *o == 2));
            }
        }
    }

    Ok(())
}
