//! Parses a mutation-info document into a nested node description,
//! decoupled from the serialisation format, ready for
//! [`crate::mutation_tree::MutationTree`] to consume.

use serde::Deserialize;

use crate::error::DriverError;
use crate::model::MutationId;

#[derive(Debug, Deserialize)]
pub struct MutationInfoDocument {
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub mutation_tree_root: JsonNode,
}

#[derive(Debug, Deserialize)]
pub struct JsonNode {
    #[serde(default)]
    pub children: Vec<JsonNode>,
    #[serde(default)]
    pub mutation_groups: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Instance {
    mutation_id: MutationId,
}

#[derive(Debug, Deserialize)]
struct SingleInstanceGroup {
    mutation_id: MutationId,
}

#[derive(Debug, Deserialize)]
struct InstancesGroup {
    instances: Vec<Instance>,
}

/// A node description independent of the wire format: this file's own
/// mutation ids plus a list of child node descriptions in document order.
pub struct NodeDesc {
    pub own_mutation_ids: Vec<MutationId>,
    pub children: Vec<NodeDesc>,
}

/// Extracts the flat list of `mutation_id`s from a single mutation group:
/// replacement-style groups contribute one id per instance,
/// `remove-statement` contributes its single id.
fn mutation_ids_for_group(group: &serde_json::Value) -> Result<Vec<MutationId>, DriverError> {
    let obj = group.as_object().ok_or_else(|| {
        DriverError::InvalidMutationInfo("mutation group is not a JSON object".to_string())
    })?;

    const INSTANCE_KINDS: [&str; 3] = [
        "replace-expression",
        "replace-binary-operator",
        "replace-unary-operator",
    ];

    for kind in INSTANCE_KINDS {
        if let Some(value) = obj.get(kind) {
            let group: InstancesGroup = serde_json::from_value(value.clone()).map_err(|e| {
                DriverError::InvalidMutationInfo(format!("malformed '{kind}' group: {e}"))
            })?;
            return Ok(group.instances.into_iter().map(|i| i.mutation_id).collect());
        }
    }

    if let Some(value) = obj.get("remove-statement") {
        let group: SingleInstanceGroup = serde_json::from_value(value.clone())
            .map_err(|e| DriverError::InvalidMutationInfo(format!("malformed 'remove-statement' group: {e}")))?;
        return Ok(vec![group.mutation_id]);
    }

    Err(DriverError::InvalidMutationInfo(format!(
        "mutation group matches none of the known kinds: {:?}",
        obj.keys().collect::<Vec<_>>()
    )))
}

fn node_ids(node: &JsonNode) -> Result<Vec<MutationId>, DriverError> {
    let mut ids = Vec::new();
    for group in &node.mutation_groups {
        ids.extend(mutation_ids_for_group(group)?);
    }
    Ok(ids)
}

fn convert_node(node: &JsonNode) -> Result<NodeDesc, DriverError> {
    let own_mutation_ids = node_ids(node)?;
    let children = node
        .children
        .iter()
        .map(convert_node)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NodeDesc {
        own_mutation_ids,
        children,
    })
}

/// Decodes a parsed mutation-info document into one root [`NodeDesc`] per
/// file, preserving document order.
pub fn decode(document: &MutationInfoDocument) -> Result<Vec<NodeDesc>, DriverError> {
    document
        .files
        .iter()
        .map(|file| convert_node(&file.mutation_tree_root))
        .collect()
}

/// Reads and decodes a mutation-info document from disk.
pub fn load(path: &std::path::Path) -> Result<Vec<NodeDesc>, DriverError> {
    let content = std::fs::read_to_string(path)?;
    let document: MutationInfoDocument = serde_json::from_str(&content)
        .map_err(|e| DriverError::InvalidMutationInfo(format!("{}: {e}", path.display())))?;
    decode(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> MutationInfoDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn decodes_all_four_group_kinds() {
        let document = doc(
            r#"{
                "files": [{
                    "filename": "a.c",
                    "mutation_tree_root": {
                        "children": [],
                        "mutation_groups": [
                            {"replace-expression": {"instances": [{"mutation_id": 0}, {"mutation_id": 1}]}},
                            {"replace-binary-operator": {"instances": [{"mutation_id": 2}]}},
                            {"replace-unary-operator": {"instances": [{"mutation_id": 3}]}},
                            {"remove-statement": {"mutation_id": 4}}
                        ]
                    }
                }]
            }"#,
        );
        let roots = decode(&document).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].own_mutation_ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn nested_children_preserve_order() {
        let document = doc(
            r#"{
                "files": [{
                    "filename": "a.c",
                    "mutation_tree_root": {
                        "mutation_groups": [{"remove-statement": {"mutation_id": 0}}],
                        "children": [
                            {"mutation_groups": [{"remove-statement": {"mutation_id": 1}}], "children": []},
                            {"mutation_groups": [{"remove-statement": {"mutation_id": 2}}], "children": []}
                        ]
                    }
                }]
            }"#,
        );
        let roots = decode(&document).unwrap();
        assert_eq!(roots[0].own_mutation_ids, vec![0]);
        assert_eq!(roots[0].children[0].own_mutation_ids, vec![1]);
        assert_eq!(roots[0].children[1].own_mutation_ids, vec![2]);
    }

    #[test]
    fn unknown_group_kind_is_rejected() {
        let document = doc(
            r#"{
                "files": [{
                    "filename": "a.c",
                    "mutation_tree_root": {
                        "mutation_groups": [{"bogus-kind": {}}],
                        "children": []
                    }
                }]
            }"#,
        );
        assert!(decode(&document).is_err());
    }

    #[test]
    fn round_trips_mutation_id_multiset() {
        // Decoding then re-flattening yields the same multiset of ids that
        // a direct walk of the JSON would.
        let document = doc(
            r#"{
                "files": [{
                    "filename": "a.c",
                    "mutation_tree_root": {
                        "mutation_groups": [{"replace-expression": {"instances": [{"mutation_id": 5}]}}],
                        "children": [
                            {"mutation_groups": [{"remove-statement": {"mutation_id": 6}}], "children": []}
                        ]
                    }
                }]
            }"#,
        );
        let roots = decode(&document).unwrap();
        fn flatten(node: &NodeDesc, out: &mut Vec<MutationId>) {
            out.extend(node.own_mutation_ids.iter().copied());
            for child in &node.children {
                flatten(child, out);
            }
        }
        let mut ids = Vec::new();
        flatten(&roots[0], &mut ids);
        ids.sort_unstable();
        assert_eq!(ids, vec![5, 6]);
    }
}
