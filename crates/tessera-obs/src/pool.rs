//! Sliding-window pooling over N-dimensional row-major buffers.
//!
//! A window covers `kernel_size` points on every axis and steps by
//! `stride`. Only elements with mask 1 contribute; Max and Min also skip
//! NaN. A window with nothing to contribute emits 0 with mask 0.

use crate::spec::{PoolConfig, PoolKernel};
use tessera_core::ObsError;

/// Shape after pooling `shape` with `config`.
///
/// An axis shorter than the window has no output positions.
pub fn pooled_shape(shape: &[usize], config: &PoolConfig) -> Vec<usize> {
    shape
        .iter()
        .map(|&d| {
            if d >= config.kernel_size {
                (d - config.kernel_size) / config.stride + 1
            } else {
                0
            }
        })
        .collect()
}

/// Check window parameters against an input shape.
pub fn check(shape: &[usize], config: &PoolConfig) -> Result<Vec<usize>, ObsError> {
    if config.kernel_size == 0 || config.stride == 0 {
        return Err(ObsError::InvalidObsSpec {
            reason: format!(
                "pool kernel_size and stride must be positive, got {} and {}",
                config.kernel_size, config.stride
            ),
        });
    }
    let out = pooled_shape(shape, config);
    if out.iter().product::<usize>() == 0 {
        return Err(ObsError::InvalidObsSpec {
            reason: format!(
                "pool window {} does not fit region shape {shape:?}",
                config.kernel_size
            ),
        });
    }
    Ok(out)
}

/// Pool `input` (shape `shape`) into `output`, which must hold exactly
/// `pooled_shape(shape, config)` elements.
pub fn pool_into(
    input: &[f32],
    input_mask: &[u8],
    shape: &[usize],
    config: &PoolConfig,
    output: &mut [f32],
    output_mask: &mut [u8],
) {
    let out_shape = pooled_shape(shape, config);
    let ndim = shape.len();
    // Row-major strides of the input.
    let mut strides = vec![1usize; ndim];
    for axis in (0..ndim.saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    let window = config.kernel_size.pow(ndim as u32);

    let mut out_pos = vec![0usize; ndim];
    for (o, m) in output.iter_mut().zip(output_mask.iter_mut()) {
        let base: usize = out_pos
            .iter()
            .zip(&strides)
            .map(|(&p, &s)| p * config.stride * s)
            .sum();

        let mut count = 0u32;
        let mut acc = match config.kernel {
            PoolKernel::Max => f32::NEG_INFINITY,
            PoolKernel::Min => f32::INFINITY,
            PoolKernel::Mean | PoolKernel::Sum => 0.0,
        };
        let mut k = vec![0usize; ndim];
        for _ in 0..window {
            let idx = base + k.iter().zip(&strides).map(|(&a, &s)| a * s).sum::<usize>();
            let v = input[idx];
            let skip = input_mask[idx] == 0
                || (matches!(config.kernel, PoolKernel::Max | PoolKernel::Min) && v.is_nan());
            if !skip {
                count += 1;
                acc = match config.kernel {
                    PoolKernel::Mean | PoolKernel::Sum => acc + v,
                    PoolKernel::Max => acc.max(v),
                    PoolKernel::Min => acc.min(v),
                };
            }
            advance(&mut k, |_| config.kernel_size);
        }

        if count == 0 {
            *o = 0.0;
            *m = 0;
        } else {
            *o = match config.kernel {
                PoolKernel::Mean => acc / count as f32,
                _ => acc,
            };
            *m = 1;
        }
        advance(&mut out_pos, |axis| out_shape[axis]);
    }
}

/// Odometer step, last axis fastest.
fn advance(pos: &mut [usize], extent: impl Fn(usize) -> usize) {
    for axis in (0..pos.len()).rev() {
        pos[axis] += 1;
        if pos[axis] < extent(axis) {
            return;
        }
        pos[axis] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(kernel: PoolKernel, kernel_size: usize, stride: usize) -> PoolConfig {
        PoolConfig {
            kernel,
            kernel_size,
            stride,
        }
    }

    fn run(input: &[f32], mask: &[u8], shape: &[usize], c: &PoolConfig) -> (Vec<f32>, Vec<u8>) {
        let n: usize = pooled_shape(shape, c).iter().product();
        let mut out = vec![f32::NAN; n];
        let mut out_mask = vec![9u8; n];
        pool_into(input, mask, shape, c, &mut out, &mut out_mask);
        (out, out_mask)
    }

    #[test]
    fn mean_2x2_on_4x4() {
        let input: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let (out, mask) = run(&input, &[1; 16], &[4, 4], &cfg(PoolKernel::Mean, 2, 2));
        assert_eq!(out, vec![2.5, 4.5, 10.5, 12.5]);
        assert_eq!(mask, vec![1; 4]);
    }

    #[test]
    fn max_skips_masked_and_nan() {
        let input = [1.0, f32::NAN, 100.0, 3.0];
        let mask = [1, 1, 0, 1];
        let (out, _) = run(&input, &mask, &[4], &cfg(PoolKernel::Max, 4, 1));
        assert_eq!(out, vec![3.0]);
    }

    #[test]
    fn empty_window_emits_zero_with_mask_zero() {
        let (out, mask) = run(&[5.0, 6.0], &[0, 0], &[2], &cfg(PoolKernel::Sum, 2, 1));
        assert_eq!(out, vec![0.0]);
        assert_eq!(mask, vec![0]);
    }

    #[test]
    fn three_dimensional_sum() {
        let input = vec![1.0; 27];
        let (out, _) = run(&input, &[1; 27], &[3, 3, 3], &cfg(PoolKernel::Sum, 2, 1));
        assert_eq!(out, vec![8.0; 8]);
    }

    #[test]
    fn check_rejects_degenerate_windows() {
        assert!(check(&[4, 4], &cfg(PoolKernel::Mean, 0, 1)).is_err());
        assert!(check(&[4, 4], &cfg(PoolKernel::Mean, 2, 0)).is_err());
        assert!(check(&[4, 1], &cfg(PoolKernel::Mean, 2, 1)).is_err());
        assert_eq!(check(&[5, 5], &cfg(PoolKernel::Min, 3, 2)).unwrap(), vec![2, 2]);
    }
}
