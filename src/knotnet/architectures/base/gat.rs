//! Graph attention network over knot diagram graphs.
//!
//! One graph per forward pass: `[n, in_channels]` node features and a
//! `[2, e]` edge-index tensor (row 0 sources, row 1 destinations). Each
//! [`GatConv`] projects nodes once, scores every edge with per-head
//! attention vectors, normalizes scores per destination node with a
//! segment softmax, and aggregates neighbor messages by index-add. Heads
//! are concatenated. The model mean-pools node embeddings into a single
//! graph embedding and projects to the task's output width.

use burn::config::Config;
use burn::module::{Ignored, Module, Param};
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::{activation, Int};
use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;

use super::config::{ConfigError, Task};
use super::schedule::{LrSchedule, EXPONENTIAL_GAMMA};
use super::train::InvariantModel;

const LEAKY_RELU_SLOPE: f64 = 0.2;

/// One graph's worth of input: node features plus an edge list.
#[derive(Debug, Clone)]
pub struct GraphSample<B: Backend> {
    /// `[n, in_channels]` node features.
    pub node_features: Tensor<B, 2>,
    /// `[2, e]` edge indices; row 0 sources, row 1 destinations.
    pub edge_index: Tensor<B, 2, Int>,
}

impl<B: Backend> GraphSample<B> {
    /// Build a sample from an undirected petgraph, materializing each edge
    /// in both directions. Node weights become one-dimensional features.
    pub fn from_graph(graph: &UnGraph<f32, ()>, device: &B::Device) -> Self {
        let features: Vec<f32> = graph.node_weights().copied().collect();
        let n = features.len();
        let node_features =
            Tensor::<B, 1>::from_floats(features.as_slice(), device).reshape([n, 1]);

        let mut sources = Vec::with_capacity(graph.edge_count() * 2);
        let mut targets = Vec::with_capacity(graph.edge_count() * 2);
        for edge in graph.edge_references() {
            let (a, b) = (edge.source().index() as i64, edge.target().index() as i64);
            sources.push(a);
            targets.push(b);
            sources.push(b);
            targets.push(a);
        }
        let e = sources.len();
        let mut flat = sources;
        flat.extend_from_slice(&targets);
        let edge_index =
            Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([2, e]);

        Self {
            node_features,
            edge_index,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.node_features.dims()[0]
    }
}

/// Multi-head graph attention convolution with self-loops, concatenating
/// head outputs.
#[derive(Module, Debug)]
pub struct GatConv<B: Backend> {
    lin: Linear<B>,
    /// `[1, heads, out_channels]` attention vector applied to source nodes.
    att_src: Param<Tensor<B, 3>>,
    /// `[1, heads, out_channels]` attention vector applied to destinations.
    att_dst: Param<Tensor<B, 3>>,
    heads: usize,
    out_channels: usize,
}

impl<B: Backend> GatConv<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        heads: usize,
        device: &B::Device,
    ) -> Self {
        let initializer = Initializer::XavierUniform { gain: 1.0 };
        Self {
            lin: LinearConfig::new(in_channels, heads * out_channels)
                .with_bias(false)
                .init(device),
            att_src: initializer.init_with(
                [1, heads, out_channels],
                Some(heads),
                Some(out_channels),
                device,
            ),
            att_dst: initializer.init_with(
                [1, heads, out_channels],
                Some(heads),
                Some(out_channels),
                device,
            ),
            heads,
            out_channels,
        }
    }

    /// `[n, in_channels]` + `[2, e]` -> `[n, heads * out_channels]`.
    pub fn forward(&self, x: Tensor<B, 2>, edge_index: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let n = x.dims()[0];
        let e = edge_index.dims()[1];
        let device = x.device();

        // Every node attends to itself as well as its neighbors.
        let loops = Tensor::<B, 1, Int>::arange(0..n as i64, &device);
        let src = edge_index
            .clone()
            .slice([0..1, 0..e])
            .reshape([e]);
        let dst = edge_index.slice([1..2, 0..e]).reshape([e]);
        let src = Tensor::cat(vec![src, loops.clone()], 0);
        let dst = Tensor::cat(vec![dst, loops], 0);

        let h = self
            .lin
            .forward(x)
            .reshape([n, self.heads, self.out_channels]);

        // Per-edge attention logits from the per-head score vectors.
        let score_src = (h.clone() * self.att_src.val()).sum_dim(2).squeeze::<2>(2);
        let score_dst = (h.clone() * self.att_dst.val()).sum_dim(2).squeeze::<2>(2);
        let logits = activation::leaky_relu(
            score_src.select(0, src.clone()) + score_dst.select(0, dst.clone()),
            LEAKY_RELU_SLOPE,
        );

        // Segment softmax over each destination's incoming edges. A global
        // max keeps the exponentials bounded.
        let max = logits.clone().max().reshape([1, 1]);
        let weights = (logits - max).exp();
        let denom = Tensor::<B, 2>::zeros([n, self.heads], &device)
            .select_assign(0, dst.clone(), weights.clone())
            .select(0, dst.clone())
            .add_scalar(1e-16);
        let alpha = weights / denom;

        // Weighted neighbor aggregation by index-add into destinations.
        let messages = h.select(0, src) * alpha.unsqueeze_dim::<3>(2);
        Tensor::<B, 3>::zeros([n, self.heads, self.out_channels], &device)
            .select_assign(0, dst, messages)
            .reshape([n, self.heads * self.out_channels])
    }
}

#[derive(Config, Debug)]
pub struct GatConfig {
    /// Hidden width per attention head.
    pub hidden_channels: usize,
    #[config(default = 2)]
    pub num_heads: usize,
    /// Two or three attention layers.
    #[config(default = 2)]
    pub num_layers: usize,
    #[config(default = 0.3)]
    pub dropout: f64,
    #[config(default = 1)]
    pub num_invariants: usize,
    #[config(default = false)]
    pub classification: bool,
    #[config(default = 41)]
    pub num_classes: usize,
}

/// Two (optionally three) GAT convolutions with ReLU and dropout between
/// layers, global mean pooling, and a linear head.
#[derive(Module, Debug)]
pub struct Gat<B: Backend> {
    gat1: GatConv<B>,
    gat2: GatConv<B>,
    gat3: Option<GatConv<B>>,
    fc: Linear<B>,
    dropout: Dropout,
    relu: Relu,
    task: Ignored<Task>,
}

impl GatConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Gat<B>, ConfigError> {
        if self.hidden_channels == 0 {
            return Err(ConfigError::ZeroDim {
                name: "hidden_channels",
            });
        }
        if self.num_heads == 0 {
            return Err(ConfigError::ZeroDim { name: "num_heads" });
        }
        if self.num_layers != 2 && self.num_layers != 3 {
            return Err(ConfigError::BadLayerCount {
                num_layers: self.num_layers,
            });
        }
        let task = Task::from_flags(self.classification, self.num_classes, self.num_invariants)?;

        let width = self.hidden_channels * self.num_heads;
        Ok(Gat {
            gat1: GatConv::new(1, self.hidden_channels, self.num_heads, device),
            gat2: GatConv::new(width, self.hidden_channels, self.num_heads, device),
            gat3: (self.num_layers == 3)
                .then(|| GatConv::new(width, self.hidden_channels, self.num_heads, device)),
            fc: LinearConfig::new(width, task.output_width()).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            relu: Relu::new(),
            task: Ignored(task),
        })
    }
}

impl<B: Backend> Gat<B> {
    /// One graph -> `[1, output_width]`.
    pub fn forward(&self, sample: GraphSample<B>) -> Tensor<B, 2> {
        let GraphSample {
            node_features,
            edge_index,
        } = sample;

        let x = self.gat1.forward(node_features, edge_index.clone());
        let x = self.relu.forward(x);
        let x = self.dropout.forward(x);

        let x = self.gat2.forward(x, edge_index.clone());
        let x = self.relu.forward(x);

        let x = match &self.gat3 {
            Some(gat3) => {
                let x = self.dropout.forward(x);
                self.relu.forward(gat3.forward(x, edge_index))
            }
            None => x,
        };

        // Global mean pool over nodes: [n, width] -> [1, width].
        let pooled = x.mean_dim(0);
        self.fc.forward(pooled)
    }
}

impl<B: Backend> InvariantModel<B> for Gat<B> {
    type Input = GraphSample<B>;

    fn forward(&self, input: Self::Input) -> Tensor<B, 2> {
        Gat::forward(self, input)
    }

    fn task(&self) -> &Task {
        &self.task.0
    }

    fn lr_schedule(&self) -> LrSchedule {
        LrSchedule::Exponential {
            gamma: EXPONENTIAL_GAMMA,
        }
    }
}
