// Backend-agnostic tensor constructors for tests and demos. Data goes
// through a flat rank-1 tensor and a reshape so the same helper serves
// any target rank.

use burn::tensor::{backend::Backend, Int, Shape, Tensor};

/// Build a float tensor of rank `D` from flat data and a shape.
pub fn tensor_from_f32_vec<B: Backend, const D: usize>(
    data: &[f32],
    shape: &[usize],
    device: &B::Device,
) -> Tensor<B, D> {
    let expected_size: usize = shape.iter().product();
    assert_eq!(
        data.len(),
        expected_size,
        "Data length {} doesn't match shape {:?} (expected {})",
        data.len(),
        shape,
        expected_size
    );

    let data_vec: Vec<f32> = data.to_vec();
    let flat_tensor = Tensor::<B, 1>::from_floats(data_vec.as_slice(), device);
    flat_tensor.reshape(Shape::from(shape))
}

/// Build an integer tensor of rank `D` from flat data and a shape.
pub fn tensor_from_i64_vec<B: Backend, const D: usize>(
    data: &[i64],
    shape: &[usize],
    device: &B::Device,
) -> Tensor<B, D, Int> {
    let expected_size: usize = shape.iter().product();
    assert_eq!(
        data.len(),
        expected_size,
        "Data length {} doesn't match shape {:?} (expected {})",
        data.len(),
        shape,
        expected_size
    );

    let data_vec: Vec<i64> = data.to_vec();
    let flat_tensor = Tensor::<B, 1, Int>::from_ints(data_vec.as_slice(), device);
    flat_tensor.reshape(Shape::from(shape))
}
