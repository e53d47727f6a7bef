//! Builds a small expression graph, backpropagates through it, and prints
//! a Graphviz dot rendering. Pipe into `dot -Tsvg` to view.

use scalargrad::engine::{viz, Graph};

fn main() {
    let graph = Graph::new();
    let a = graph.value(-4.0);
    let b = graph.value(2.0);
    let mut c = a.add(b);
    let mut d = a.mul(b).add(b.pow(3.0));
    c = c.add(c.add(graph.value(1.0)));
    c = c.add(graph.value(1.0).add(c).add(a.neg()));
    d = d.add(d.mul(graph.value(2.0)).add(b.add(a).relu()));
    d = d.add(graph.value(3.0).mul(d).add(b.sub(a).relu()));
    let e = c.sub(d);
    let f = e.pow(2.0);
    let mut g = f.div(graph.value(2.0));
    g = g.add(graph.value(10.0).div(f));
    g.backward();

    let dot = viz::render_dot(g);
    println!("{dot}");
}
