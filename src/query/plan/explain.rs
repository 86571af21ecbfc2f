//! Structured explain tree for tooling and plan inspection.

use serde::Serialize;

/// Explain node representing an operator with optional metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExplainNode {
    /// Operator name
    pub op: String,
    /// Additional properties describing the operator
    pub props: Vec<ExplainProp>,
    /// Input operators
    pub inputs: Vec<ExplainNode>,
}

impl ExplainNode {
    /// Creates a new explain node with the given operator name.
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            props: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Looks up a property value by key.
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Copy of the tree with literal-bearing properties masked.
    pub fn redacted(&self) -> Self {
        Self {
            op: self.op.clone(),
            props: self
                .props
                .iter()
                .map(|p| {
                    if p.redactable {
                        ExplainProp {
                            key: p.key.clone(),
                            value: "<redacted>".to_string(),
                            redactable: true,
                        }
                    } else {
                        p.clone()
                    }
                })
                .collect(),
            inputs: self.inputs.iter().map(ExplainNode::redacted).collect(),
        }
    }
}

/// Single property associated with an [`ExplainNode`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExplainProp {
    /// Property key.
    pub key: String,
    /// Property value serialized for display.
    pub value: String,
    /// Whether this property contains literal data that may be redacted.
    pub redactable: bool,
}

impl ExplainProp {
    pub(crate) fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            redactable: false,
        }
    }

    pub(crate) fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            redactable: true,
        }
    }
}
