use serde::{Deserialize, Serialize};

/// A leaf value the collector could encode deterministically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// The absence of a value (`None`/`nil`/`unit` in the source program).
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl ScalarValue {
    /// Human-readable type name for diagnostics and stand-ins.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// Index of a node within a [`ValueGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One node of a captured value.
///
/// Composite nodes reference their children by [`NodeId`], which lets the
/// collector describe shared substructure and cycles without the core ever
/// touching a live object graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ValueNode {
    Scalar(ScalarValue),
    /// Ordered children (list/tuple in the source program).
    Sequence(Vec<NodeId>),
    /// Name → child pairs (dict in the source program).
    Mapping(Vec<(String, NodeId)>),
    /// An instance of a custom type, captured generically as named fields.
    Record {
        type_name: String,
        fields: Vec<(String, NodeId)>,
    },
    /// A value the collector could not encode faithfully.
    Opaque { type_name: String, reason: String },
}

/// The collector-facing descriptor of one captured value.
///
/// A `ValueGraph` is an arena of [`ValueNode`]s with a designated root.
/// Children are node indices, so the same node may be referenced from
/// several parents (sharing) or from its own subtree (cycles).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueGraph {
    nodes: Vec<ValueNode>,
    root: Option<NodeId>,
}

impl ValueGraph {
    /// Create an empty graph. Push nodes and set a root before storing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-scalar graph with the scalar as root.
    pub fn scalar(value: ScalarValue) -> Self {
        let mut graph = Self::new();
        let id = graph.push(ValueNode::Scalar(value));
        graph.set_root(id);
        graph
    }

    /// Single-integer graph.
    pub fn int(value: i64) -> Self {
        Self::scalar(ScalarValue::Int(value))
    }

    /// Single-string graph.
    pub fn text(value: impl Into<String>) -> Self {
        Self::scalar(ScalarValue::Str(value.into()))
    }

    /// Graph holding a flat sequence of scalars.
    pub fn scalar_sequence(values: impl IntoIterator<Item = ScalarValue>) -> Self {
        let mut graph = Self::new();
        let children: Vec<NodeId> = values
            .into_iter()
            .map(|v| graph.push(ValueNode::Scalar(v)))
            .collect();
        let root = graph.push(ValueNode::Sequence(children));
        graph.set_root(root);
        graph
    }

    /// Graph holding a flat sequence of integers.
    pub fn int_sequence(values: impl IntoIterator<Item = i64>) -> Self {
        Self::scalar_sequence(values.into_iter().map(ScalarValue::Int))
    }

    /// Append a node and return its id.
    pub fn push(&mut self, node: ValueNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Designate the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// The root node, if set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&ValueNode> {
        self.nodes.get(id.0)
    }

    /// Mutable access to a node, used to close cycles after allocation.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ValueNode> {
        self.nodes.get_mut(id.0)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_graph_has_root() {
        let graph = ValueGraph::int(42);
        let root = graph.root().unwrap();
        assert_eq!(
            graph.node(root),
            Some(&ValueNode::Scalar(ScalarValue::Int(42)))
        );
    }

    #[test]
    fn int_sequence_builds_children() {
        let graph = ValueGraph::int_sequence([1, 2, 3]);
        let root = graph.root().unwrap();
        match graph.node(root).unwrap() {
            ValueNode::Sequence(children) => assert_eq!(children.len(), 3),
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn cycle_can_be_closed_after_allocation() {
        let mut graph = ValueGraph::new();
        let seq = graph.push(ValueNode::Sequence(vec![]));
        match graph.node_mut(seq).unwrap() {
            ValueNode::Sequence(children) => children.push(seq),
            _ => unreachable!(),
        }
        graph.set_root(seq);

        match graph.node(seq).unwrap() {
            ValueNode::Sequence(children) => assert_eq!(children, &vec![seq]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_node_is_none() {
        let graph = ValueGraph::int(1);
        assert!(graph.node(NodeId(99)).is_none());
    }

    #[test]
    fn scalar_type_names() {
        assert_eq!(ScalarValue::Unit.type_name(), "unit");
        assert_eq!(ScalarValue::Int(0).type_name(), "int");
        assert_eq!(ScalarValue::Str(String::new()).type_name(), "str");
    }
}
