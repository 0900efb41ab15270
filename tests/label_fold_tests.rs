//! Signed-value folding across class counts and tensor ranks.

use burn_ndarray::NdArray;

use knotnet::knotnet::architectures::base::config::ConfigError;
use knotnet::knotnet::architectures::base::labels::SignedClassMap;
use knotnet::test_utils::tensor_from_f32_vec;

type TestBackend = NdArray<f32>;

#[test]
fn fold_matches_definition_for_every_index() {
    for num_classes in [1usize, 5, 21, 41] {
        let map = SignedClassMap::new(num_classes).unwrap();
        let m = (num_classes - 1) / 2;
        for i in 0..num_classes {
            let expected = if i <= m {
                i as i64
            } else {
                -((i - m) as i64)
            };
            assert_eq!(
                map.fold_index(i),
                expected,
                "num_classes {} index {}",
                num_classes,
                i
            );
        }
    }
}

#[test]
fn even_class_counts_are_rejected() {
    for num_classes in [2usize, 10, 40] {
        assert_eq!(
            SignedClassMap::new(num_classes).unwrap_err(),
            ConfigError::EvenClassCount { num_classes }
        );
    }
}

#[test]
fn tensor_fold_preserves_shape_and_values() {
    let device = Default::default();
    let map = SignedClassMap::new(41).unwrap();
    // Batch-shaped [3, 2] tensor mixing pass-through and folded indices.
    let values = tensor_from_f32_vec::<TestBackend, 2>(
        &[0.0, 20.0, 21.0, 40.0, 5.0, 30.0],
        &[3, 2],
        &device,
    );
    let folded = map.fold(values);
    assert_eq!(folded.dims(), [3, 2]);
    let data = folded.to_data();
    let data = data.as_slice::<f32>().unwrap();
    assert_eq!(data, &[0.0, 20.0, -1.0, -20.0, 5.0, -10.0]);
}

#[test]
fn fold_is_identity_below_the_midpoint() {
    let device = Default::default();
    let map = SignedClassMap::new(21).unwrap();
    let values: Vec<f32> = (0..=10).map(|i| i as f32).collect();
    let tensor = tensor_from_f32_vec::<TestBackend, 1>(&values, &[11], &device);
    let folded = map.fold(tensor).to_data();
    assert_eq!(folded.as_slice::<f32>().unwrap(), values.as_slice());
}
