extern crate scalargrad;

use rand::prelude::*;
use rand::rngs::StdRng;
use scalargrad::config::TrainConfig;
use scalargrad::engine::{Graph, Scalar, Value};
use scalargrad::error::ScalargradError;
use scalargrad::nn::{Module, MLP};
use std::iter::zip;

const INPUTS: [[Scalar; 3]; 4] = [
    [2.0, 3.0, -1.0],
    [3.0, -1.0, 0.5],
    [0.5, 1.0, 1.0],
    [1.0, 1.0, -1.0],
];
const TARGETS: [Scalar; 4] = [1.0, -1.0, -1.0, 1.0];

fn squared_error_loss<'a>(
    graph: &'a Graph,
    model: &MLP<'a>,
) -> Result<Value<'a>, ScalargradError> {
    let mut loss = graph.value(0.0);
    for (x, y) in zip(&INPUTS, &TARGETS) {
        let inputs = x.iter().map(|&v| graph.value(v)).collect::<Vec<_>>();
        let output = model.forward(&inputs)?;
        let residual = output[0].sub(graph.value(*y));
        loss = loss.add(residual.pow(2.0));
    }
    Ok(loss)
}

#[test]
fn training_reduces_loss() {
    let mut config = TrainConfig::default();
    config.learning_rate = 0.1;
    config.steps = 60;
    config.validate().unwrap();

    let graph = Graph::new();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = MLP::new(&graph, &mut rng, config.inputs, &config.layers);
    let mark = graph.len();

    let initial = squared_error_loss(&graph, &model).unwrap().data();
    graph.reclaim(mark);

    for _ in 0..config.steps {
        let loss = squared_error_loss(&graph, &model).unwrap();
        loss.backward();

        for p in model.parameters() {
            p.set_data(p.data() - config.learning_rate * p.grad());
        }
        model.zero_grad();
        graph.reclaim(mark);
    }

    let final_loss = squared_error_loss(&graph, &model).unwrap().data();

    assert!(
        final_loss < initial,
        "loss did not improve: {initial} -> {final_loss}"
    );
    assert!(final_loss.is_finite());
}
