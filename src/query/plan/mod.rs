//! Plan node envelope and the closed set of node kinds.
//!
//! Every node serializes as one flat object: the shared envelope
//! (`ID`, `PLAN_NODE_TYPE`, `CHILDREN_IDS`, and the estimate pair once the
//! node has been costed) followed by the fields of its kind. Loading reverses
//! the order: the envelope is read first, then `PLAN_NODE_TYPE` selects the
//! kind's loader.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{ChildArity, PlanError, Result};
use crate::query::catalog::{Database, DatabaseEstimates};
use crate::query::expr::Expression;
use crate::query::json::{self, JsonObject};

pub mod cost;
pub mod document;
pub mod explain;
pub mod materialized;
pub mod nodes;

use cost::{CostContext, CostEstimate};
use explain::{ExplainNode, ExplainProp};
use materialized::MaterializedScanNode;
use nodes::{NestLoopIndexNode, ProjectionNode, SeqScanNode};

/// Envelope keys shared by every node kind.
pub mod keys {
    /// Node identifier.
    pub const ID: &str = "ID";
    /// Node kind tag.
    pub const PLAN_NODE_TYPE: &str = "PLAN_NODE_TYPE";
    /// Child identifiers in input order.
    pub const CHILDREN_IDS: &str = "CHILDREN_IDS";
    /// Tuples processed estimate.
    pub const ESTIMATED_PROCESSED_TUPLE_COUNT: &str = "ESTIMATED_PROCESSED_TUPLE_COUNT";
    /// Tuples emitted estimate.
    pub const ESTIMATED_OUTPUT_TUPLE_COUNT: &str = "ESTIMATED_OUTPUT_TUPLE_COUNT";
}

/// Identifier of a node within one plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId(pub u32);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire tag of a node kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanNodeType {
    /// Constant `IN`-list row source.
    MaterializedScan,
    /// Full table scan.
    SeqScan,
    /// Nested-loop index join.
    NestLoopIndex,
    /// Column computation.
    Projection,
    /// Result delivery to the caller.
    Send,
}

impl PlanNodeType {
    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            PlanNodeType::MaterializedScan => "MATERIALIZEDSCAN",
            PlanNodeType::SeqScan => "SEQSCAN",
            PlanNodeType::NestLoopIndex => "NESTLOOPINDEX",
            PlanNodeType::Projection => "PROJECTION",
            PlanNodeType::Send => "SEND",
        }
    }

    /// Number of children the kind accepts.
    pub fn child_arity(self) -> ChildArity {
        match self {
            PlanNodeType::MaterializedScan | PlanNodeType::SeqScan => ChildArity::None,
            PlanNodeType::NestLoopIndex | PlanNodeType::Projection | PlanNodeType::Send => {
                ChildArity::One
            }
        }
    }

    fn check_arity(self, id: PlanNodeId, found: usize) -> Result<()> {
        let expected = self.child_arity();
        if expected.count() != found {
            return Err(PlanError::ChildArity {
                id,
                node_type: self,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn parse(raw: &str) -> Result<Self> {
        serde_json::from_value(Json::String(raw.to_owned()))
            .map_err(|_| PlanError::UnknownPlanNodeType(raw.to_owned()))
    }
}

impl fmt::Display for PlanNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a plan node.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanNodeKind {
    /// Constant `IN`-list row source.
    MaterializedScan(MaterializedScanNode),
    /// Full table scan.
    SeqScan(SeqScanNode),
    /// Nested-loop index join.
    NestLoopIndex(NestLoopIndexNode),
    /// Column computation.
    Projection(ProjectionNode),
    /// Result delivery to the caller.
    Send,
}

impl PlanNodeKind {
    /// Wire tag of the kind.
    pub fn plan_node_type(&self) -> PlanNodeType {
        match self {
            PlanNodeKind::MaterializedScan(node) => node.plan_node_type(),
            PlanNodeKind::SeqScan(_) => PlanNodeType::SeqScan,
            PlanNodeKind::NestLoopIndex(_) => PlanNodeType::NestLoopIndex,
            PlanNodeKind::Projection(_) => PlanNodeType::Projection,
            PlanNodeKind::Send => PlanNodeType::Send,
        }
    }

    fn compute_cost_estimate(&self, ctx: &CostContext<'_>) -> Result<CostEstimate> {
        Ok(match self {
            PlanNodeKind::MaterializedScan(node) => node.compute_cost_estimate(ctx),
            PlanNodeKind::SeqScan(node) => node.compute_cost_estimate(ctx),
            PlanNodeKind::NestLoopIndex(node) => node.compute_cost_estimate(ctx)?,
            PlanNodeKind::Projection(_) | PlanNodeKind::Send => {
                CostEstimate::pass_through(ctx.child_output)
            }
        })
    }

    fn explain(&self, indent: &str) -> String {
        match self {
            PlanNodeKind::MaterializedScan(node) => node.explain(indent),
            PlanNodeKind::SeqScan(node) => node.explain(indent),
            PlanNodeKind::NestLoopIndex(node) => node.explain(indent),
            PlanNodeKind::Projection(_) => "PROJECTION".to_string(),
            PlanNodeKind::Send => "RETURN RESULTS".to_string(),
        }
    }

    fn explain_props(&self) -> Vec<ExplainProp> {
        match self {
            PlanNodeKind::MaterializedScan(node) => {
                let values: Vec<String> = node.table_data().iter().map(|e| e.to_string()).collect();
                vec![
                    ExplainProp::plain("rows", node.len().to_string()),
                    ExplainProp::literal("values", format!("[{}]", values.join(", "))),
                ]
            }
            PlanNodeKind::SeqScan(node) => {
                let mut props = vec![ExplainProp::plain("table", node.target_table.clone())];
                if let Some(pred) = &node.predicate {
                    props.push(ExplainProp::literal("predicate", pred.to_string()));
                }
                props
            }
            PlanNodeKind::NestLoopIndex(node) => {
                let keys: Vec<String> = node.search_keys.iter().map(|e| e.to_string()).collect();
                let mut props = vec![
                    ExplainProp::plain("table", node.target_table.clone()),
                    ExplainProp::plain("index", node.index_name.clone()),
                    ExplainProp::literal("search_keys", format!("[{}]", keys.join(", "))),
                ];
                if let Some(pred) = &node.predicate {
                    props.push(ExplainProp::literal("predicate", pred.to_string()));
                }
                props
            }
            PlanNodeKind::Projection(node) => node
                .columns
                .iter()
                .map(|col| ExplainProp::literal(col.alias.clone(), col.expression.to_string()))
                .collect(),
            PlanNodeKind::Send => Vec::new(),
        }
    }

    fn write_fields(&self, obj: &mut JsonObject) -> Result<()> {
        match self {
            PlanNodeKind::MaterializedScan(node) => node.write_fields(obj),
            PlanNodeKind::SeqScan(node) => node.write_fields(obj),
            PlanNodeKind::NestLoopIndex(node) => node.write_fields(obj),
            PlanNodeKind::Projection(node) => node.write_fields(obj),
            PlanNodeKind::Send => Ok(()),
        }
    }

    fn load(node_type: PlanNodeType, obj: &JsonObject, db: &Database) -> Result<Self> {
        Ok(match node_type {
            PlanNodeType::MaterializedScan => {
                PlanNodeKind::MaterializedScan(MaterializedScanNode::load_fields(obj, db)?)
            }
            PlanNodeType::SeqScan => PlanNodeKind::SeqScan(SeqScanNode::load_fields(obj, db)?),
            PlanNodeType::NestLoopIndex => {
                PlanNodeKind::NestLoopIndex(NestLoopIndexNode::load_fields(obj, db)?)
            }
            PlanNodeType::Projection => {
                PlanNodeKind::Projection(ProjectionNode::load_fields(obj, db)?)
            }
            PlanNodeType::Send => PlanNodeKind::Send,
        })
    }
}

/// Fields common to every serialized node.
#[derive(Clone, Debug, PartialEq)]
struct NodeEnvelope {
    id: PlanNodeId,
    node_type: PlanNodeType,
    children_ids: Vec<PlanNodeId>,
    estimates: Option<CostEstimate>,
}

impl NodeEnvelope {
    fn write(&self, obj: &mut JsonObject) {
        obj.insert(keys::ID.into(), Json::from(self.id.0));
        obj.insert(keys::PLAN_NODE_TYPE.into(), self.node_type.as_str().into());
        obj.insert(
            keys::CHILDREN_IDS.into(),
            Json::Array(self.children_ids.iter().map(|id| Json::from(id.0)).collect()),
        );
        if let Some(est) = self.estimates {
            obj.insert(
                keys::ESTIMATED_PROCESSED_TUPLE_COUNT.into(),
                Json::from(est.processed),
            );
            obj.insert(
                keys::ESTIMATED_OUTPUT_TUPLE_COUNT.into(),
                Json::from(est.output),
            );
        }
    }

    fn load(obj: &JsonObject) -> Result<Self> {
        const CONTEXT: &str = "plan node";
        let id = PlanNodeId(
            u32::try_from(json::required_u64(obj, CONTEXT, keys::ID)?)
                .map_err(|_| PlanError::invalid(CONTEXT, keys::ID, "a 32-bit id"))?,
        );
        let node_type =
            PlanNodeType::parse(json::required_str(obj, CONTEXT, keys::PLAN_NODE_TYPE)?)?;
        let children_ids = json::required_array(obj, CONTEXT, keys::CHILDREN_IDS)?
            .iter()
            .map(|raw| {
                raw.as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .map(PlanNodeId)
                    .ok_or_else(|| {
                        PlanError::invalid(CONTEXT, keys::CHILDREN_IDS, "an array of node ids")
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let processed = json::optional(obj, keys::ESTIMATED_PROCESSED_TUPLE_COUNT);
        let output = json::optional(obj, keys::ESTIMATED_OUTPUT_TUPLE_COUNT);
        let estimates = match (processed, output) {
            (None, None) => None,
            (Some(_), Some(_)) => Some(CostEstimate::new(
                json::required_u64(obj, CONTEXT, keys::ESTIMATED_PROCESSED_TUPLE_COUNT)?,
                json::required_u64(obj, CONTEXT, keys::ESTIMATED_OUTPUT_TUPLE_COUNT)?,
            )),
            _ => return Err(PlanError::PartialEstimate(id)),
        };
        Ok(Self {
            id,
            node_type,
            children_ids,
            estimates,
        })
    }
}

/// Node within a plan tree.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanNode {
    /// Identifier unique within the plan.
    pub id: PlanNodeId,
    /// Kind-specific payload.
    pub kind: PlanNodeKind,
    /// Input nodes.
    pub children: Vec<PlanNode>,
    estimates: Option<CostEstimate>,
}

/// Result of loading a single serialized node.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedNode {
    /// The node, without children attached.
    pub node: PlanNode,
    /// Child ids declared by the envelope, in input order.
    pub children_ids: Vec<PlanNodeId>,
}

impl PlanNode {
    /// Creates a node with no inputs.
    pub fn new(id: PlanNodeId, kind: PlanNodeKind) -> Self {
        Self {
            id,
            kind,
            children: Vec::new(),
            estimates: None,
        }
    }

    /// Creates a node with the given inputs. Arity is not checked here; see
    /// [`PlanNode::resolve_column_references`].
    pub fn with_children(id: PlanNodeId, kind: PlanNodeKind, children: Vec<PlanNode>) -> Self {
        Self {
            id,
            kind,
            children,
            estimates: None,
        }
    }

    /// Materialized scan over `rows`, copied in order.
    pub fn materialized_scan(id: PlanNodeId, rows: &[Expression]) -> Self {
        let mut scan = MaterializedScanNode::new();
        scan.set_table_data(rows);
        Self::new(id, PlanNodeKind::MaterializedScan(scan))
    }

    /// Wire tag of the node.
    pub fn plan_node_type(&self) -> PlanNodeType {
        self.kind.plan_node_type()
    }

    /// Estimates from the last costing pass, `None` until costed.
    pub fn estimates(&self) -> Option<CostEstimate> {
        self.estimates
    }

    /// Whether every node in the subtree has been costed.
    pub fn is_planned(&self) -> bool {
        self.estimates.is_some() && self.children.iter().all(PlanNode::is_planned)
    }

    /// Whether replaying the subtree against the same state yields the same
    /// rows in the same order.
    pub fn is_order_deterministic(&self) -> bool {
        match &self.kind {
            PlanNodeKind::MaterializedScan(node) => node.is_order_deterministic(),
            PlanNodeKind::SeqScan(_) => false,
            PlanNodeKind::NestLoopIndex(_) | PlanNodeKind::Projection(_) | PlanNodeKind::Send => {
                self.children.iter().all(PlanNode::is_order_deterministic)
            }
        }
    }

    /// Validates the child arity of every node in the subtree.
    ///
    /// None of the supported kinds expose positional columns, so this pass
    /// only enforces tree shape; a childless kind with inputs fails here.
    pub fn resolve_column_references(&self) -> Result<()> {
        self.plan_node_type().check_arity(self.id, self.children.len())?;
        for child in &self.children {
            child.resolve_column_references()?;
        }
        Ok(())
    }

    /// Costs the subtree bottom-up and returns the root estimate.
    ///
    /// Each node sees its child's output estimate; estimates are recomputed
    /// on every call.
    pub fn compute_cost_estimates(
        &mut self,
        estimates: &DatabaseEstimates,
        db: &Database,
    ) -> Result<CostEstimate> {
        let mut child_output = 0;
        for child in &mut self.children {
            child_output = child.compute_cost_estimates(estimates, db)?.output;
        }
        let ctx = CostContext::leaf(estimates, db).with_child_output(child_output);
        let est = self.kind.compute_cost_estimate(&ctx)?;
        tracing::trace!(
            id = %self.id,
            node_type = %self.plan_node_type(),
            processed = est.processed,
            output = est.output,
            "estimated plan node"
        );
        self.estimates = Some(est);
        Ok(est)
    }

    /// One-line (or inline-annotated) description of this node alone.
    pub fn explain_for_node(&self, indent: &str) -> String {
        self.kind.explain(indent)
    }

    /// Indented text description of the whole subtree.
    pub fn explain_plan(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, "");
        out
    }

    fn explain_into(&self, out: &mut String, indent: &str) {
        out.push_str(indent);
        out.push_str(&self.explain_for_node(indent));
        out.push('\n');
        let nested = format!("{indent} ");
        for child in &self.children {
            child.explain_into(out, &nested);
        }
    }

    /// Structured explain tree of the subtree.
    pub fn explain_tree(&self) -> ExplainNode {
        let mut node = ExplainNode::new(self.plan_node_type().as_str());
        node.props.push(ExplainProp::plain("id", self.id.to_string()));
        node.props.extend(self.kind.explain_props());
        if let Some(est) = self.estimates {
            node.props
                .push(ExplainProp::plain("est_processed", est.processed.to_string()));
            node.props
                .push(ExplainProp::plain("est_output", est.output.to_string()));
        }
        node.inputs = self.children.iter().map(PlanNode::explain_tree).collect();
        node
    }

    /// Serializes this node alone: envelope first, then kind fields.
    pub fn to_json(&self) -> Result<JsonObject> {
        let envelope = NodeEnvelope {
            id: self.id,
            node_type: self.plan_node_type(),
            children_ids: self.children.iter().map(|c| c.id).collect(),
            estimates: self.estimates,
        };
        let mut obj = JsonObject::new();
        envelope.write(&mut obj);
        self.kind.write_fields(&mut obj)?;
        Ok(obj)
    }

    /// Loads a single node; children are returned as ids for the caller to
    /// link. A declared child count that the kind does not allow is rejected.
    pub fn from_json(obj: &JsonObject, db: &Database) -> Result<DecodedNode> {
        let envelope = NodeEnvelope::load(obj)?;
        envelope.node_type.check_arity(envelope.id, envelope.children_ids.len())?;
        let kind = PlanNodeKind::load(envelope.node_type, obj, db)?;
        let node = PlanNode {
            id: envelope.id,
            kind,
            children: Vec::new(),
            estimates: envelope.estimates,
        };
        Ok(DecodedNode {
            node,
            children_ids: envelope.children_ids,
        })
    }

    /// Number of nodes in the subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PlanNode::node_count).sum::<usize>()
    }
}
