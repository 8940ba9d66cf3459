//! Torch utilities.
use tch::{Device, Kind, Tensor};

/// Copy a 2D integer tensor into nested vectors of rows.
///
/// # Panics
/// If `tensor` is not 2D.
pub fn to_i64_rows(tensor: &Tensor) -> Vec<Vec<i64>> {
    let size = tensor.size();
    assert_eq!(size.len(), 2, "expected a 2D tensor, got shape {:?}", size);
    let cpu = tensor.to_device(Device::Cpu).to_kind(Kind::Int64);
    (0..size[0])
        .map(|i| (0..size[1]).map(|j| cpu.int64_value(&[i, j])).collect())
        .collect()
}

/// Copy a 1D integer tensor into a vector.
///
/// # Panics
/// If `tensor` is not 1D.
pub fn to_i64_vec(tensor: &Tensor) -> Vec<i64> {
    let size = tensor.size();
    assert_eq!(size.len(), 1, "expected a 1D tensor, got shape {:?}", size);
    let cpu = tensor.to_device(Device::Cpu).to_kind(Kind::Int64);
    (0..size[0]).map(|i| cpu.int64_value(&[i])).collect()
}

/// Create a 2D i64 tensor from equal-length rows.
///
/// # Panics
/// If the rows have different lengths.
pub fn from_i64_rows<R: AsRef<[i64]>>(rows: &[R], device: Device) -> Tensor {
    let num_cols = rows.first().map_or(0, |row| row.as_ref().len());
    let data: Vec<i64> = rows
        .iter()
        .flat_map(|row| {
            assert_eq!(row.as_ref().len(), num_cols, "rows must have equal length");
            row.as_ref().iter().copied()
        })
        .collect();
    Tensor::of_slice(&data)
        .reshape(&[rows.len() as i64, num_cols as i64])
        .to_device(device)
}
