//! Transfer-function texture generation.
//!
//! Walks every cell of a 1-3 dimensional grid, evaluates the transfer
//! function at the cell's normalized coordinates and packs the results into a
//! flat RGBA8 buffer laid out for direct GPU upload (first axis varying
//! fastest). Rows along the first axis are independent, so the grid is split
//! into disjoint row slices and filled in parallel.

use rayon::prelude::*;

use crate::tf::transfer_function::{TransferFunction, TransferFunctionKind};
use crate::tf::TfError;

/// Upper grid rank; matches the texture dimensionalities the GPU can bind.
pub const MAX_GRID_RANK: usize = 3;

/// Generates the RGBA8 lookup buffer for `tf` over a `tex_size` grid.
/// The result has exactly `4 * Π(tex_size[i])` bytes.
pub fn generate(tex_size: &[u32], tf: &TransferFunctionKind) -> Result<Vec<u8>, TfError> {
    let rank = tex_size.len();
    if rank == 0 || rank > MAX_GRID_RANK {
        return Err(TfError::UnsupportedGridRank(rank));
    }
    if rank != tf.dimension() {
        return Err(TfError::GridRankMismatch {
            grid: rank,
            tf: tf.dimension(),
        });
    }
    if tex_size.iter().any(|&s| s == 0) {
        return Err(TfError::EmptyGridAxis);
    }

    let width = tex_size[0] as usize;
    let row_count: usize = tex_size[1..].iter().map(|&s| s as usize).product();
    let row_bytes = width * 4;

    let mut out = vec![0u8; row_bytes * row_count];
    let inv: Vec<f32> = tex_size.iter().map(|&s| 1.0 / s as f32).collect();

    out.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, chunk)| {
            let mut index = [0.0f32; MAX_GRID_RANK];
            // Decode the flat row number into the higher-axis coordinates.
            let mut rest = row;
            for axis in 1..rank {
                let len = tex_size[axis] as usize;
                index[axis] = (rest % len) as f32 * inv[axis];
                rest /= len;
            }
            for (x, texel) in chunk.chunks_exact_mut(4).enumerate() {
                index[0] = x as f32 * inv[0];
                let rgba = tf.compute_rgba(&index[..rank]);
                texel.copy_from_slice(&rgba.to_bytes());
            }
        });

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tf::color_space::ColorMode;
    use crate::tf::transfer_function::{DirectTransfer, GaussianTransfer};

    fn direct() -> TransferFunctionKind {
        DirectTransfer::new(ColorMode::Grayscale).into()
    }

    #[test]
    fn buffer_sizes_match_grid_volume() {
        assert_eq!(generate(&[16], &direct()).unwrap().len(), 4 * 16);

        let tf2: TransferFunctionKind =
            GaussianTransfer::uniform(ColorMode::Grayscale, 2, 1.0, 1.0)
                .unwrap()
                .into();
        assert_eq!(generate(&[8, 4], &tf2).unwrap().len(), 4 * 8 * 4);

        let tf3: TransferFunctionKind =
            GaussianTransfer::uniform(ColorMode::Grayscale, 3, 1.0, 1.0)
                .unwrap()
                .into();
        assert_eq!(generate(&[4, 4, 4], &tf3).unwrap().len(), 4 * 64);
    }

    #[test]
    fn first_axis_varies_fastest() {
        let buf = generate(&[4], &direct()).unwrap();
        // Grayscale ramp along x: values 0, 1/4, 2/4, 3/4.
        assert_eq!(buf[0], 0);
        assert_eq!(buf[4], 64);
        assert_eq!(buf[8], 128);
        assert_eq!(buf[12], 191);
        // Direct model is fully opaque.
        assert!(buf.iter().skip(3).step_by(4).all(|&a| a == 255));
    }

    #[test]
    fn higher_axes_decode_row_major() {
        let tf: TransferFunctionKind = GaussianTransfer::new(
            ColorMode::Grayscale,
            vec![true, true],
            vec![0.0, 4.0],
            vec![0.0, 0.0],
            1.0,
        )
        .unwrap()
        .into();
        let buf = generate(&[2, 4], &tf).unwrap();
        // Alpha depends only on the y axis here, so both texels of a row agree
        // and alpha decays with y.
        let alpha_at = |x: usize, y: usize| buf[(y * 2 + x) * 4 + 3];
        for y in 0..4 {
            assert_eq!(alpha_at(0, y), alpha_at(1, y));
        }
        assert!(alpha_at(0, 0) > alpha_at(0, 1));
        assert!(alpha_at(0, 1) > alpha_at(0, 3));
    }

    #[test]
    fn rank_mismatch_is_rejected() {
        assert!(matches!(
            generate(&[4, 4], &direct()),
            Err(TfError::GridRankMismatch { grid: 2, tf: 1 })
        ));
        assert!(matches!(
            generate(&[], &direct()),
            Err(TfError::UnsupportedGridRank(0))
        ));
        assert!(matches!(
            generate(&[4, 0], &direct()),
            Err(TfError::GridRankMismatch { .. }) | Err(TfError::EmptyGridAxis)
        ));
    }
}
