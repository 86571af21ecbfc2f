//! Whole-plan documents: `{"PLAN_NODES": [...]}` in pre-order.
//!
//! Nodes reference their inputs by id, so decoding is two passes: every
//! entry is loaded on its own, then the tree is linked from the first entry
//! (the root) downward. Linking consumes each entry exactly once, which is
//! what rejects shared children, cycles, and unreachable entries.

use std::collections::{HashMap, HashSet};

use serde_json::Value as Json;
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use crate::config::CodecOptions;
use crate::error::{PlanError, Result};
use crate::query::catalog::Database;
use crate::query::json::{self, JsonObject};
use crate::query::plan::{DecodedNode, PlanNode, PlanNodeId};

/// Top-level key holding the node list.
pub const PLAN_NODES: &str = "PLAN_NODES";

const CONTEXT: &str = "plan document";

/// Encodes the tree rooted at `root` as a plan document.
pub fn encode_plan(root: &PlanNode) -> Result<Json> {
    root.resolve_column_references()?;
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    encode_into(root, &mut seen, &mut nodes)?;
    debug!(nodes = nodes.len(), root = %root.id, "encoded plan document");
    let mut doc = JsonObject::new();
    doc.insert(PLAN_NODES.into(), Json::Array(nodes));
    Ok(Json::Object(doc))
}

fn encode_into(
    node: &PlanNode,
    seen: &mut HashSet<PlanNodeId>,
    out: &mut Vec<Json>,
) -> Result<()> {
    if !seen.insert(node.id) {
        return Err(PlanError::DuplicateNodeId(node.id));
    }
    out.push(Json::Object(node.to_json()?));
    for child in &node.children {
        encode_into(child, seen, out)?;
    }
    Ok(())
}

/// Rebuilds a plan tree from a document, validating its shape.
pub fn decode_plan(doc: &Json, db: &Database, options: &CodecOptions) -> Result<PlanNode> {
    let obj = doc
        .as_object()
        .ok_or_else(|| PlanError::invalid(CONTEXT, PLAN_NODES, "inside a JSON object"))?;
    let entries = json::required_array(obj, CONTEXT, PLAN_NODES)?;
    if entries.is_empty() {
        return Err(PlanError::EmptyPlan);
    }
    if entries.len() > options.max_nodes {
        return Err(PlanError::TooManyNodes {
            count: entries.len(),
            max: options.max_nodes,
        });
    }

    let mut order = Vec::with_capacity(entries.len());
    let mut pending: HashMap<PlanNodeId, DecodedNode> = HashMap::with_capacity(entries.len());
    for entry in entries {
        let decoded = PlanNode::from_json(json::element_object(entry, CONTEXT, PLAN_NODES)?, db)?;
        let id = decoded.node.id;
        if pending.insert(id, decoded).is_some() {
            return Err(PlanError::DuplicateNodeId(id));
        }
        order.push(id);
    }

    let mut linker = Linker {
        pending,
        linked: HashSet::with_capacity(order.len()),
        max_depth: options.max_depth,
    };
    let root = linker.take_root(order[0])?;
    let root = linker.build(root, 1)?;
    if let Some(orphan) = order.iter().find(|id| linker.pending.contains_key(id)) {
        return Err(PlanError::OrphanNode(*orphan));
    }
    debug!(nodes = order.len(), root = %root.id, "decoded plan document");
    Ok(root)
}

struct Linker {
    pending: HashMap<PlanNodeId, DecodedNode>,
    linked: HashSet<PlanNodeId>,
    max_depth: usize,
}

impl Linker {
    fn take_root(&mut self, id: PlanNodeId) -> Result<DecodedNode> {
        self.linked.insert(id);
        self.pending.remove(&id).ok_or(PlanError::EmptyPlan)
    }

    fn take_child(&mut self, parent: PlanNodeId, child: PlanNodeId) -> Result<DecodedNode> {
        if let Some(decoded) = self.pending.remove(&child) {
            self.linked.insert(child);
            return Ok(decoded);
        }
        if self.linked.contains(&child) {
            Err(PlanError::SharedNode(child))
        } else {
            Err(PlanError::UnknownChild { parent, child })
        }
    }

    fn build(&mut self, decoded: DecodedNode, depth: usize) -> Result<PlanNode> {
        if depth > self.max_depth {
            return Err(PlanError::PlanTooDeep {
                max: self.max_depth,
            });
        }
        let DecodedNode {
            mut node,
            children_ids,
        } = decoded;
        for child_id in children_ids {
            let child = self.take_child(node.id, child_id)?;
            node.children.push(self.build(child, depth + 1)?);
        }
        Ok(node)
    }
}

/// Encodes `root` to JSON text, indented when `options.pretty` is set.
pub fn to_json_string(root: &PlanNode, options: &CodecOptions) -> Result<String> {
    let doc = encode_plan(root)?;
    let text = if options.pretty {
        serde_json::to_string_pretty(&doc)?
    } else {
        serde_json::to_string(&doc)?
    };
    Ok(text)
}

/// Parses JSON text and decodes it with [`decode_plan`].
pub fn from_json_str(text: &str, db: &Database, options: &CodecOptions) -> Result<PlanNode> {
    let doc: Json = serde_json::from_str(text)?;
    decode_plan(&doc, db, options)
}

/// Stable hash of the compact encoding of `root`.
pub fn plan_hash(root: &PlanNode) -> Result<u64> {
    let text = serde_json::to_vec(&encode_plan(root)?)?;
    Ok(xxh64(&text, 0))
}
