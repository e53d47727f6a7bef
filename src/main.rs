use color_eyre::Result;
use itertools::Itertools;
use rand::prelude::*;
use rand::rngs::StdRng;
use scalargrad::config::TrainConfig;
use scalargrad::engine::{viz, Graph, Scalar, Value};
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

fn main() -> Result<()> {
    color_eyre::install()?;

    let config = TrainConfig::from_env()?;
    if config.layers.last().is_some_and(|spec| spec.width != 1) {
        return Err(ScalargradError::Configuration(
            "the bundled dataset has scalar targets; the last layer must have width 1".to_string(),
        )
        .into());
    }
    let graph = Graph::new();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = MLP::new(&graph, &mut rng, config.inputs, &config.layers);
    println!("{model}");

    // Parameters sit below this mark; forward-pass nodes built above it are
    // reclaimed after every step.
    let mark = graph.len();

    let (loss, predictions) = run_pass(&graph, &model)?;
    println!("initial predictions: [{}]", format_predictions(&predictions));
    println!("initial loss: {:.6}", loss.data());
    println!("targets:             [{}]", format_predictions(&TARGETS));
    graph.reclaim(mark);

    let log_every = (config.steps / 10).max(1);
    println!("training for {} steps at rate {}", config.steps, config.learning_rate);
    for step in 0..config.steps {
        let (loss, _) = run_pass(&graph, &model)?;
        loss.backward();
        let loss_data = loss.data();

        for p in model.parameters() {
            p.set_data(p.data() - config.learning_rate * p.grad());
        }
        model.zero_grad();
        graph.reclaim(mark);

        if step % log_every == 0 {
            println!("step {step:4}: loss {loss_data:.6}");
        }
    }

    let (loss, predictions) = run_pass(&graph, &model)?;
    println!("final predictions:   [{}]", format_predictions(&predictions));
    println!("final loss: {:.6}", loss.data());

    if let Some(path) = &config.dot_output {
        loss.backward();
        std::fs::write(path, viz::render_dot(loss))?;
        println!("wrote loss graph to {}", path.display());
    }

    Ok(())
}

/// Forward pass over the whole dataset: per-example squared errors summed
/// into one loss node, predictions captured for reporting.
fn run_pass<'a>(
    graph: &'a Graph,
    model: &MLP<'a>,
) -> Result<(Value<'a>, Vec<Scalar>), ScalargradError> {
    let mut loss = graph.value(0.0);
    let mut predictions = Vec::with_capacity(INPUTS.len());

    for (x, y) in zip(&INPUTS, &TARGETS) {
        let inputs = x.iter().map(|&v| graph.value(v)).collect::<Vec<_>>();
        let output = model.forward(&inputs)?;
        let prediction = output[0];
        predictions.push(prediction.data());

        let residual = prediction.sub(graph.value(*y));
        loss = loss.add(residual.pow(2.0));
    }

    Ok((loss, predictions))
}

fn format_predictions(values: &[Scalar]) -> String {
    values.iter().map(|v| format!("{v:.4}")).join(", ")
}
