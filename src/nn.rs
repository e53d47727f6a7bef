use crate::engine::{Graph, Value};
use crate::error::ScalargradError;
use itertools::Itertools;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::iter::zip;

/// Nonlinearity applied to a neuron's weighted sum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Tanh,
    Identity,
}

impl Activation {
    fn apply<'a>(&self, v: Value<'a>) -> Value<'a> {
        match self {
            Activation::Relu => v.relu(),
            Activation::Tanh => v.tanh(),
            Activation::Identity => v,
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Activation::Relu => "ReLU",
            Activation::Tanh => "Tanh",
            Activation::Identity => "Linear",
        };
        f.write_str(name)
    }
}

/// Width and activation of one layer in an [`MLP`].
#[derive(Clone, Copy, Debug)]
pub struct LayerSpec {
    pub width: usize,
    pub activation: Activation,
}

pub trait Module<'a> {
    fn zero_grad(&self) {
        self.parameters().iter().for_each(|v| v.reset_grad())
    }

    fn parameters(&self) -> Vec<Value<'a>>;
}

pub struct Neuron<'a> {
    w: Vec<Value<'a>>,
    b: Value<'a>,
    activation: Activation,
}

impl<'a> Neuron<'a> {
    pub fn new(graph: &'a Graph, rng: &mut StdRng, nin: usize, activation: Activation) -> Self {
        let w = (0..nin)
            .map(|_| graph.value(rng.gen_range(-1.0..1.0)))
            .collect();
        Self {
            w,
            b: graph.value(0.0),
            activation,
        }
    }

    pub fn forward(&self, x: &[Value<'a>]) -> Result<Value<'a>, ScalargradError> {
        if x.len() != self.w.len() {
            return Err(ScalargradError::ShapeMismatch {
                expected: self.w.len(),
                actual: x.len(),
            });
        }

        let sum = zip(&self.w, x).fold(self.b, |acc, (wi, xi)| acc.add(wi.mul(*xi)));

        Ok(self.activation.apply(sum))
    }
}

impl<'a> Module<'a> for Neuron<'a> {
    fn parameters(&self) -> Vec<Value<'a>> {
        let mut params = self.w.clone();
        params.push(self.b);

        params
    }
}

impl std::fmt::Display for Neuron<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}Neuron({})", self.activation, self.w.len()))?;

        Ok(())
    }
}

pub struct Layer<'a> {
    neurons: Vec<Neuron<'a>>,
}

impl<'a> Layer<'a> {
    pub fn new(
        graph: &'a Graph,
        rng: &mut StdRng,
        nin: usize,
        nout: usize,
        activation: Activation,
    ) -> Self {
        let neurons = (0..nout)
            .map(|_| Neuron::new(graph, rng, nin, activation))
            .collect();

        Self { neurons }
    }

    pub fn forward(&self, x: &[Value<'a>]) -> Result<Vec<Value<'a>>, ScalargradError> {
        self.neurons.iter().map(|n| n.forward(x)).collect()
    }
}

impl<'a> Module<'a> for Layer<'a> {
    fn parameters(&self) -> Vec<Value<'a>> {
        self.neurons.iter().flat_map(|n| n.parameters()).collect()
    }
}

impl std::fmt::Display for Layer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let desc = self.neurons.iter().map(|n| n.to_string()).join(", ");

        f.write_fmt(format_args!("Layer of [{}]", desc))?;

        Ok(())
    }
}

pub struct MLP<'a> {
    layers: Vec<Layer<'a>>,
}

impl<'a> MLP<'a> {
    pub fn new(graph: &'a Graph, rng: &mut StdRng, nin: usize, specs: &[LayerSpec]) -> Self {
        let mut layers = Vec::with_capacity(specs.len());
        let mut nin = nin;
        for spec in specs {
            layers.push(Layer::new(graph, rng, nin, spec.width, spec.activation));
            nin = spec.width;
        }

        let mlp = Self { layers };
        log::debug!("initialized {mlp}");
        mlp
    }

    /// Threads the input through every layer in order.
    pub fn forward(&self, x: &[Value<'a>]) -> Result<Vec<Value<'a>>, ScalargradError> {
        let mut x = x.to_vec();
        for layer in &self.layers {
            x = layer.forward(&x)?;
        }

        Ok(x)
    }
}

impl<'a> Module<'a> for MLP<'a> {
    fn parameters(&self) -> Vec<Value<'a>> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }
}

impl std::fmt::Display for MLP<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let desc = self.layers.iter().map(|l| l.to_string()).join(", ");

        f.write_fmt(format_args!("MLP of [{}]", desc))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn neuron_identity_matches_manual_sum() {
        let graph = Graph::new();
        let neuron = Neuron::new(&graph, &mut rng(), 2, Activation::Identity);
        let params = neuron.parameters();
        params[0].set_data(1.0);
        params[1].set_data(-2.0);
        params[2].set_data(0.0);

        let x = [graph.value(3.0), graph.value(4.0)];
        let out = neuron.forward(&x).unwrap();
        out.backward();

        assert_float_eq!(out.data(), -5.0, abs <= 1e-10);
        assert_float_eq!(params[0].grad(), 3.0, abs <= 1e-10);
        assert_float_eq!(params[1].grad(), 4.0, abs <= 1e-10);
        assert_float_eq!(params[2].grad(), 1.0, abs <= 1e-10);
        assert_float_eq!(x[0].grad(), 1.0, abs <= 1e-10);
        assert_float_eq!(x[1].grad(), -2.0, abs <= 1e-10);
    }

    #[test]
    fn neuron_rejects_mismatched_input() {
        let graph = Graph::new();
        let neuron = Neuron::new(&graph, &mut rng(), 2, Activation::Relu);

        let x = [graph.value(1.0), graph.value(2.0), graph.value(3.0)];
        let err = neuron.forward(&x).unwrap_err();

        assert_eq!(
            err,
            ScalargradError::ShapeMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn neuron_applies_activation() {
        let graph = Graph::new();
        let neuron = Neuron::new(&graph, &mut rng(), 1, Activation::Relu);
        let params = neuron.parameters();
        params[0].set_data(1.0);
        params[1].set_data(0.0);

        let out = neuron.forward(&[graph.value(-3.0)]).unwrap();
        assert_float_eq!(out.data(), 0.0, abs <= 1e-10);

        let neuron = Neuron::new(&graph, &mut rng(), 1, Activation::Tanh);
        let params = neuron.parameters();
        params[0].set_data(1.0);
        params[1].set_data(0.0);

        let out = neuron.forward(&[graph.value(0.5)]).unwrap();
        assert_float_eq!(out.data(), (0.5f64).tanh(), abs <= 1e-10);
    }

    #[test]
    fn layer_fans_out() {
        let graph = Graph::new();
        let layer = Layer::new(&graph, &mut rng(), 2, 3, Activation::Tanh);

        let x = [graph.value(0.5), graph.value(-0.5)];
        let out = layer.forward(&x).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(layer.parameters().len(), 3 * (2 + 1));
    }

    #[test]
    fn layer_propagates_shape_errors() {
        let graph = Graph::new();
        let layer = Layer::new(&graph, &mut rng(), 2, 3, Activation::Tanh);

        let x = [graph.value(0.5)];
        assert!(layer.forward(&x).is_err());
    }

    #[test]
    fn mlp_threads_layers_and_collects_parameters() {
        let graph = Graph::new();
        let specs = [
            LayerSpec {
                width: 4,
                activation: Activation::Tanh,
            },
            LayerSpec {
                width: 4,
                activation: Activation::Tanh,
            },
            LayerSpec {
                width: 1,
                activation: Activation::Tanh,
            },
        ];
        let mlp = MLP::new(&graph, &mut rng(), 3, &specs);

        let x = [graph.value(2.0), graph.value(3.0), graph.value(-1.0)];
        let out = mlp.forward(&x).unwrap();

        assert_eq!(out.len(), 1);
        // 4*(3+1) + 4*(4+1) + 1*(4+1)
        assert_eq!(mlp.parameters().len(), 41);
        assert!(out[0].data().abs() <= 1.0);
    }

    #[test]
    fn zero_grad_resets_every_parameter() {
        let graph = Graph::new();
        let specs = [LayerSpec {
            width: 2,
            activation: Activation::Identity,
        }];
        let mlp = MLP::new(&graph, &mut rng(), 2, &specs);

        let x = [graph.value(1.0), graph.value(-1.0)];
        let out = mlp.forward(&x).unwrap();
        let loss = out[0].add(out[1]);
        loss.backward();

        assert!(mlp.parameters().iter().any(|p| p.grad() != 0.0));

        mlp.zero_grad();
        assert!(mlp.parameters().iter().all(|p| p.grad() == 0.0));
    }

    #[test]
    fn display_describes_architecture() {
        let graph = Graph::new();
        let specs = [
            LayerSpec {
                width: 2,
                activation: Activation::Relu,
            },
            LayerSpec {
                width: 1,
                activation: Activation::Identity,
            },
        ];
        let mlp = MLP::new(&graph, &mut rng(), 2, &specs);

        assert_eq!(
            mlp.to_string(),
            "MLP of [Layer of [ReLUNeuron(2), ReLUNeuron(2)], Layer of [LinearNeuron(2)]]"
        );
    }
}
