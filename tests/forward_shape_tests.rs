//! Output-shape contract: every variant produces `[batch, num_classes]` in
//! classification mode and `[batch, num_invariants]` in regression mode.

use burn_ndarray::NdArray;
use petgraph::graph::UnGraph;

use knotnet::knotnet::architectures::base::{
    cnn::CnnConfig,
    gat::{GatConfig, GraphSample},
    mlp::MlpConfig,
    reformer::ReformerConfig,
    transformer::TransformerConfig,
};
use knotnet::test_utils::{tensor_from_f32_vec, tensor_from_i64_vec};

type TestBackend = NdArray<f32>;

const NUM_CLASSES: usize = 41;

#[test]
fn mlp_shapes() {
    let device = Default::default();
    let batch = 4;
    let input = tensor_from_f32_vec::<TestBackend, 2>(&vec![0.5; batch * 49], &[batch, 49], &device);

    let regression = MlpConfig::new(7, 32, 0.0).init::<TestBackend>(&device).unwrap();
    assert_eq!(regression.forward(input.clone()).dims(), [batch, 1]);

    let classification = MlpConfig::new(7, 32, 0.0)
        .with_classification(true)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(classification.forward(input).dims(), [batch, NUM_CLASSES]);
}

#[test]
fn cnn_shapes_kernel_three_keeps_spatial_size() {
    let device = Default::default();
    let batch = 2;
    let side = 9;
    let input = tensor_from_f32_vec::<TestBackend, 4>(
        &vec![0.1; batch * side * side],
        &[batch, 1, side, side],
        &device,
    );

    let regression = CnnConfig::new(side, 3)
        .with_layer_norm(true)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(regression.forward(input.clone()).dims(), [batch, 1]);

    let classification = CnnConfig::new(side, 3)
        .with_classification(true)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(classification.forward(input).dims(), [batch, NUM_CLASSES]);
}

#[test]
fn cnn_shapes_kernel_two_shrinks_spatial_size() {
    let device = Default::default();
    let side = 8;
    let input = tensor_from_f32_vec::<TestBackend, 4>(
        &vec![0.1; side * side],
        &[1, 1, side, side],
        &device,
    );
    let model = CnnConfig::new(side, 2).init::<TestBackend>(&device).unwrap();
    assert_eq!(model.forward(input).dims(), [1, 1]);
}

#[test]
fn transformer_shapes() {
    let device = Default::default();
    let batch = 3;
    let seq = 10;
    let tokens = tensor_from_i64_vec::<TestBackend, 2>(
        &vec![1i64; batch * seq],
        &[batch, seq],
        &device,
    );

    let regression = TransformerConfig::new(12, 16, 4, 1, 32, 24, 100)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(regression.forward(tokens.clone()).dims(), [batch, 1]);

    let classification = TransformerConfig::new(12, 16, 4, 1, 32, 24, 100)
        .with_classification(true)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(classification.forward(tokens).dims(), [batch, NUM_CLASSES]);
}

#[test]
fn reformer_shapes_with_partial_final_chunk() {
    let device = Default::default();
    let batch = 2;
    // Sequence length deliberately not a multiple of the chunk size.
    let seq = 10;
    let tokens = tensor_from_i64_vec::<TestBackend, 2>(
        &vec![2i64; batch * seq],
        &[batch, seq],
        &device,
    );

    let regression = ReformerConfig::new(12, 16, 4, 1, 16, 100)
        .with_chunk_size(4)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(regression.forward(tokens.clone()).dims(), [batch, 1]);

    let classification = ReformerConfig::new(12, 16, 4, 1, 16, 100)
        .with_chunk_size(4)
        .with_classification(true)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(classification.forward(tokens).dims(), [batch, NUM_CLASSES]);
}

fn triangle_graph() -> UnGraph<f32, ()> {
    let mut graph = UnGraph::new_undirected();
    let a = graph.add_node(1.0);
    let b = graph.add_node(-1.0);
    let c = graph.add_node(0.5);
    graph.add_edge(a, b, ());
    graph.add_edge(b, c, ());
    graph.add_edge(c, a, ());
    graph
}

#[test]
fn gat_shapes() {
    let device = Default::default();
    let sample = GraphSample::<TestBackend>::from_graph(&triangle_graph(), &device);
    assert_eq!(sample.num_nodes(), 3);
    assert_eq!(sample.edge_index.dims(), [2, 6]);

    let regression = GatConfig::new(8).init::<TestBackend>(&device).unwrap();
    assert_eq!(regression.forward(sample.clone()).dims(), [1, 1]);

    let classification = GatConfig::new(8)
        .with_classification(true)
        .with_num_layers(3)
        .init::<TestBackend>(&device)
        .unwrap();
    assert_eq!(classification.forward(sample).dims(), [1, NUM_CLASSES]);
}

#[test]
fn misconfiguration_fails_at_construction() {
    use knotnet::knotnet::architectures::base::config::ConfigError;
    let device = Default::default();

    // Even class count.
    assert!(matches!(
        MlpConfig::new(7, 32, 0.0)
            .with_classification(true)
            .with_num_classes(40)
            .init::<TestBackend>(&device),
        Err(ConfigError::EvenClassCount { .. })
    ));

    // Heads not dividing the embedding width.
    assert!(matches!(
        TransformerConfig::new(12, 10, 3, 1, 32, 24, 100).init::<TestBackend>(&device),
        Err(ConfigError::HeadsMismatch { .. })
    ));

    // Missing warm-up on both transformer variants.
    assert!(matches!(
        TransformerConfig::new(12, 16, 4, 1, 32, 24, 0).init::<TestBackend>(&device),
        Err(ConfigError::InvalidWarmupSteps { .. })
    ));
    assert!(matches!(
        ReformerConfig::new(12, 16, 4, 1, 16, 0).init::<TestBackend>(&device),
        Err(ConfigError::InvalidWarmupSteps { .. })
    ));

    // Prime sequence length has no axial grid.
    assert!(matches!(
        ReformerConfig::new(12, 16, 4, 1, 13, 100).init::<TestBackend>(&device),
        Err(ConfigError::AxialFactorization { .. })
    ));

    // GAT layer count outside {2, 3}.
    assert!(matches!(
        GatConfig::new(8).with_num_layers(4).init::<TestBackend>(&device),
        Err(ConfigError::BadLayerCount { .. })
    ));
}
