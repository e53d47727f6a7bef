//! Small expression graph, backpropagated and rendered as Graphviz dot.

use scalargrad::engine::{viz, Graph};

fn main() {
    let graph = Graph::new();
    let x = graph.value(-4.0);
    let z = graph.value(2.0).mul(x).add(graph.value(2.0)).add(x);
    let q = z.relu().add(z.mul(x));
    let h = z.mul(z).relu();
    let y = h.add(q).add(q.mul(x));
    y.backward();

    let dot = viz::render_dot(y);
    println!("{dot}");
}
