//! Scalar reverse-mode autodiff on an arena-backed computational graph.
//!
//! Every operation appends a node to the [`Graph`] arena and returns a
//! [`Value`] handle to it. Operand indices always point at earlier nodes,
//! so the graph is acyclic by construction.

use std::cell::RefCell;

/// Index of a node inside its [`Graph`] arena.
pub type NodeId = usize;

pub type Scalar = f64;

/// Operation that produced a node, with the operand handles the backward
/// pass needs to push gradient through it.
#[derive(Clone, Copy, Debug)]
enum Op {
    Leaf,
    Add(NodeId, NodeId),
    Mul(NodeId, NodeId),
    Pow(NodeId, Scalar),
    Relu(NodeId),
    Tanh(NodeId),
    Exp(NodeId),
}

impl Op {
    fn operands(&self) -> [Option<NodeId>; 2] {
        match *self {
            Op::Leaf => [None, None],
            Op::Add(a, b) | Op::Mul(a, b) => [Some(a), Some(b)],
            Op::Pow(a, _) | Op::Relu(a) | Op::Tanh(a) | Op::Exp(a) => [Some(a), None],
        }
    }

    fn symbol(&self) -> Option<&'static str> {
        match self {
            Op::Leaf => None,
            Op::Add(..) => Some("+"),
            Op::Mul(..) => Some("*"),
            Op::Pow(..) => Some("^"),
            Op::Relu(..) => Some("ReLU"),
            Op::Tanh(..) => Some("tanh"),
            Op::Exp(..) => Some("exp"),
        }
    }
}

#[derive(Clone, Debug)]
struct Node {
    data: Scalar,
    grad: Scalar,
    op: Op,
}

/// Append-only arena owning every node of one computational graph.
///
/// Parameters and intermediates live in the same pool; [`Graph::reclaim`]
/// drops the intermediates between training steps while earlier nodes keep
/// their indices.
#[derive(Default, Debug)]
pub struct Graph {
    nodes: RefCell<Vec<Node>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a raw number as a leaf node (an input or a parameter).
    pub fn value(&self, data: Scalar) -> Value<'_> {
        self.push(data, Op::Leaf)
    }

    /// Number of nodes currently in the arena. Usable as a watermark for
    /// [`Graph::reclaim`].
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Drops every node past `mark`, invalidating any handle created after
    /// the watermark was taken. Nodes at or below `mark` keep their indices.
    pub fn reclaim(&self, mark: usize) {
        let mut nodes = self.nodes.borrow_mut();
        assert!(
            mark <= nodes.len(),
            "watermark {mark} past arena length {}",
            nodes.len()
        );
        log::debug!("reclaiming {} transient nodes", nodes.len() - mark);
        nodes.truncate(mark);
    }

    fn push(&self, data: Scalar, op: Op) -> Value<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let idx = nodes.len();
        // Operands precede the node they feed; the arena can never cycle.
        debug_assert!(op.operands().iter().flatten().all(|&p| p < idx));
        nodes.push(Node {
            data,
            grad: 0.0,
            op,
        });
        Value { graph: self, idx }
    }

    /// Post-order over the nodes reachable from `root`: every node appears
    /// after all of its operands.
    fn topo_order(&self, root: NodeId) -> Vec<NodeId> {
        fn visit(nodes: &[Node], id: NodeId, visited: &mut [bool], order: &mut Vec<NodeId>) {
            if visited[id] {
                return;
            }
            visited[id] = true;
            for operand in nodes[id].op.operands().into_iter().flatten() {
                visit(nodes, operand, visited, order);
            }
            order.push(id);
        }

        let nodes = self.nodes.borrow();
        let mut visited = vec![false; nodes.len()];
        let mut order = Vec::new();
        visit(&nodes, root, &mut visited, &mut order);
        order
    }
}

/// Copyable handle to one node of a [`Graph`].
#[derive(Clone, Copy)]
pub struct Value<'a> {
    graph: &'a Graph,
    idx: NodeId,
}

impl<'a> Value<'a> {
    pub fn id(&self) -> NodeId {
        self.idx
    }

    pub fn data(&self) -> Scalar {
        self.graph.nodes.borrow()[self.idx].data
    }

    pub fn grad(&self) -> Scalar {
        self.graph.nodes.borrow()[self.idx].grad
    }

    /// Reassigns a leaf's value, e.g. a gradient-descent parameter update.
    pub fn set_data(&self, data: Scalar) {
        let mut nodes = self.graph.nodes.borrow_mut();
        debug_assert!(
            matches!(nodes[self.idx].op, Op::Leaf),
            "only leaf nodes may be reassigned"
        );
        nodes[self.idx].data = data;
    }

    pub fn reset_grad(&self) {
        self.graph.nodes.borrow_mut()[self.idx].grad = 0.0;
    }

    pub fn add(self, rhs: Value<'a>) -> Value<'a> {
        self.check_same_graph(rhs);
        self.graph
            .push(self.data() + rhs.data(), Op::Add(self.idx, rhs.idx))
    }

    pub fn mul(self, rhs: Value<'a>) -> Value<'a> {
        self.check_same_graph(rhs);
        self.graph
            .push(self.data() * rhs.data(), Op::Mul(self.idx, rhs.idx))
    }

    pub fn neg(self) -> Value<'a> {
        self.mul(self.graph.value(-1.0))
    }

    pub fn sub(self, rhs: Value<'a>) -> Value<'a> {
        self.add(rhs.neg())
    }

    /// Division is `self * rhs^-1`. A zero divisor propagates IEEE Inf/NaN
    /// through both the forward value and the gradients; nothing raises.
    pub fn div(self, rhs: Value<'a>) -> Value<'a> {
        self.mul(rhs.pow(-1.0))
    }

    /// Raises to a constant exponent. Zero raised to a negative exponent
    /// follows IEEE semantics (Inf), as with [`Value::div`].
    pub fn pow(self, exp: Scalar) -> Value<'a> {
        self.graph.push(self.data().powf(exp), Op::Pow(self.idx, exp))
    }

    pub fn relu(self) -> Value<'a> {
        self.graph.push(self.data().max(0.0), Op::Relu(self.idx))
    }

    pub fn tanh(self) -> Value<'a> {
        self.graph.push(self.data().tanh(), Op::Tanh(self.idx))
    }

    pub fn exp(self) -> Value<'a> {
        self.graph.push(self.data().exp(), Op::Exp(self.idx))
    }

    /// Reverse-mode gradient propagation from this node.
    ///
    /// Resets the gradient of every reachable node, seeds this node's
    /// gradient with 1, then walks the reachable set in reverse topological
    /// order accumulating each node's contribution into its operands.
    /// A node is processed only after every successor has deposited into
    /// it; under fan-out the contributions sum instead of overwriting.
    pub fn backward(&self) {
        let order = self.graph.topo_order(self.idx);
        let mut nodes = self.graph.nodes.borrow_mut();

        for &id in &order {
            nodes[id].grad = 0.0;
        }
        nodes[self.idx].grad = 1.0;

        for &id in order.iter().rev() {
            let grad = nodes[id].grad;
            let data = nodes[id].data;
            let op = nodes[id].op;
            match op {
                Op::Leaf => {}
                Op::Add(a, b) => {
                    nodes[a].grad += grad;
                    nodes[b].grad += grad;
                }
                Op::Mul(a, b) => {
                    let (da, db) = (nodes[b].data, nodes[a].data);
                    nodes[a].grad += da * grad;
                    nodes[b].grad += db * grad;
                }
                Op::Pow(a, exp) => {
                    let base = nodes[a].data;
                    nodes[a].grad += exp * base.powf(exp - 1.0) * grad;
                }
                Op::Relu(a) => {
                    if data > 0.0 {
                        nodes[a].grad += grad;
                    }
                }
                Op::Tanh(a) => {
                    nodes[a].grad += (1.0 - data * data) * grad;
                }
                Op::Exp(a) => {
                    nodes[a].grad += data * grad;
                }
            }
        }
    }

    fn check_same_graph(&self, other: Value<'_>) {
        debug_assert!(
            std::ptr::eq(self.graph, other.graph),
            "values belong to different graphs"
        );
    }
}

impl std::fmt::Display for Value<'_> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let nodes = self.graph.nodes.borrow();
        let node = &nodes[self.idx];
        match (node.op.symbol(), node.op.operands()) {
            (None, _) => {
                fmt.write_fmt(format_args!(
                    "Value({:.06}, grad={:.06})",
                    node.data, node.grad
                ))?;
            }
            (Some(symbol), [Some(a), None]) => {
                fmt.write_fmt(format_args!(
                    "{} [Value({:.06}, grad={:.06})]",
                    symbol, nodes[a].data, nodes[a].grad,
                ))?;
            }
            (Some(symbol), [Some(a), Some(b)]) => {
                fmt.write_fmt(format_args!(
                    "[Value({:.06}, grad={:.06})] {} [Value({:.06}, grad={:.06})]",
                    nodes[a].data, nodes[a].grad, symbol, nodes[b].data, nodes[b].grad,
                ))?;
            }
            _ => unreachable!(),
        }
        Ok(())
    }
}

pub mod viz {
    use super::*;

    /// Renders the subgraph reachable from `root` as Graphviz dot: one
    /// record node per value showing data and gradient, one pseudo node per
    /// operation, edges along the predecessor relation. Output order follows
    /// the arena, so the rendering is deterministic.
    pub fn render_dot(root: Value) -> String {
        let order = root.graph.topo_order(root.idx);
        let nodes = root.graph.nodes.borrow();

        let mut nodes_str = String::new();
        let mut edges_str = String::new();
        for &id in &order {
            let node = &nodes[id];
            let id_str = format!("{:08}", id);
            nodes_str += &format!(
                "    \"{}\" [label=\"{{ data {:.06} | grad {:.06} }}\" shape=record]\n",
                id_str, node.data, node.grad,
            );
            if let Some(op) = node.op.symbol() {
                nodes_str += &format!("    \"{}{}\" [label=\"{}\"]\n", id_str, op, op);
                edges_str += &format!("    \"{}{}\" -> \"{}\"\n", id_str, op, id_str);
                for operand in node.op.operands().into_iter().flatten() {
                    edges_str += &format!("    \"{:08}\" -> \"{}{}\"\n", operand, id_str, op);
                }
            }
        }

        format!(
            "strict digraph {{\n    graph [rankdir=LR]\n\n{}{}}}",
            nodes_str, edges_str
        )
    }
}
