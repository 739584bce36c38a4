//! Transfer-function evaluators: normalized index vector → RGBA.
//!
//! All evaluators are cheap, immutable and `Send + Sync`; the texture
//! generator and the recompute worker call them from parallel loops.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::structs::Color;
use crate::tf::color_space::{ColorMode, compute_color};
use crate::tf::TfError;

/// Common contract of every evaluator. `index` must carry exactly
/// [`dimension`](TransferFunction::dimension) components, each normalized to
/// [0, 1]; shorter slices read as zero.
#[enum_dispatch]
pub trait TransferFunction {
    fn dimension(&self) -> usize;
    fn color_mode(&self) -> ColorMode;
    /// RGB part of the mapped color. Alpha handling lives in `compute_alpha`.
    fn compute_color(&self, index: &[f32]) -> Color;
    fn compute_alpha(&self, index: &[f32]) -> u8;

    fn compute_rgba(&self, index: &[f32]) -> Color {
        self.compute_color(index).with_alpha(self.compute_alpha(index))
    }
}

#[enum_dispatch(TransferFunction)]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum TransferFunctionKind {
    Direct(DirectTransfer),
    Gaussian(GaussianTransfer),
    TriangularGaussian(TriangularGaussianTransfer),
}

impl TransferFunctionKind {
    /// Switch the color model in place, keeping every other parameter.
    pub fn set_color_mode(&mut self, mode: ColorMode) {
        match self {
            TransferFunctionKind::Direct(d) => d.mode = mode,
            TransferFunctionKind::Gaussian(g) => g.mode = mode,
            TransferFunctionKind::TriangularGaussian(t) => t.base_mut().mode = mode,
        }
    }
}

/// Single-axis color lookup: color from the first index component, alpha
/// always fully opaque.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DirectTransfer {
    pub mode: ColorMode,
}

impl DirectTransfer {
    pub fn new(mode: ColorMode) -> Self {
        Self { mode }
    }
}

impl TransferFunction for DirectTransfer {
    fn dimension(&self) -> usize {
        1
    }

    fn color_mode(&self) -> ColorMode {
        self.mode
    }

    fn compute_color(&self, index: &[f32]) -> Color {
        compute_color(self.mode, index.first().copied().unwrap_or(0.0))
    }

    fn compute_alpha(&self, _index: &[f32]) -> u8 {
        255
    }
}

/// Gaussian-falloff alpha around a per-axis center, color from the first
/// index component. Disabled axes drop out of the falloff sum.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GaussianTransfer {
    pub mode: ColorMode,
    dims: usize,
    enabled: Vec<bool>,
    scale: Vec<f32>,
    center: Vec<f32>,
    pub alpha_max: f32,
}

impl GaussianTransfer {
    pub fn new(
        mode: ColorMode,
        enabled: Vec<bool>,
        scale: Vec<f32>,
        center: Vec<f32>,
        alpha_max: f32,
    ) -> Result<Self, TfError> {
        let dims = enabled.len();
        if dims == 0 {
            return Err(TfError::ZeroDimension);
        }
        if scale.len() != dims || center.len() != dims {
            return Err(TfError::DimensionMismatch {
                expected: dims,
                got: scale.len().min(center.len()),
            });
        }
        Ok(Self {
            mode,
            dims,
            enabled,
            scale,
            center,
            alpha_max,
        })
    }

    /// Symmetric helper: every axis enabled, shared scale, centers at 0.5.
    pub fn uniform(mode: ColorMode, dims: usize, scale: f32, alpha_max: f32) -> Result<Self, TfError> {
        Self::new(
            mode,
            vec![true; dims],
            vec![scale; dims],
            vec![0.5; dims],
            alpha_max,
        )
    }

    pub fn set_center(&mut self, axis: usize, center: f32) {
        if let Some(c) = self.center.get_mut(axis) {
            *c = center;
        }
    }

    pub fn set_scale(&mut self, axis: usize, scale: f32) {
        if let Some(s) = self.scale.get_mut(axis) {
            *s = scale;
        }
    }

    pub fn set_enabled(&mut self, axis: usize, enabled: bool) {
        if let Some(e) = self.enabled.get_mut(axis) {
            *e = enabled;
        }
    }

    fn axis(&self, index: &[f32], i: usize) -> Option<f32> {
        if !self.enabled[i] {
            return None;
        }
        Some(index.get(i).copied().unwrap_or(0.0))
    }

    fn falloff_sum(&self, index: &[f32], radius_scale: f32, axes: usize) -> f32 {
        let mut sum = 0.0;
        for i in 0..axes {
            if let Some(v) = self.axis(index, i) {
                let d = radius_scale * self.scale[i] * (v - self.center[i]);
                sum += d * d;
            }
        }
        sum
    }

    fn quantize_alpha(&self, weight: f32) -> u8 {
        (self.alpha_max * weight * 255.0).clamp(0.0, 255.0) as u8
    }
}

impl TransferFunction for GaussianTransfer {
    fn dimension(&self) -> usize {
        self.dims
    }

    fn color_mode(&self) -> ColorMode {
        self.mode
    }

    fn compute_color(&self, index: &[f32]) -> Color {
        compute_color(self.mode, self.axis(index, 0).unwrap_or(0.0))
    }

    fn compute_alpha(&self, index: &[f32]) -> u8 {
        let sum = self.falloff_sum(index, 1.0, self.dims);
        self.quantize_alpha((-sum).exp())
    }
}

/// Gradient-aware Gaussian: the last index component is the gradient
/// magnitude. Zero gradient maps to full transparency; otherwise the falloff
/// radius shrinks with 1/gradient so alpha concentrates on iso-boundaries.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TriangularGaussianTransfer {
    base: GaussianTransfer,
}

impl TriangularGaussianTransfer {
    pub fn new(base: GaussianTransfer) -> Result<Self, TfError> {
        if base.dims < 2 {
            return Err(TfError::GradientAxisMissing { dims: base.dims });
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &GaussianTransfer {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut GaussianTransfer {
        &mut self.base
    }
}

impl TransferFunction for TriangularGaussianTransfer {
    fn dimension(&self) -> usize {
        self.base.dims
    }

    fn color_mode(&self) -> ColorMode {
        self.base.mode
    }

    fn compute_color(&self, index: &[f32]) -> Color {
        self.base.compute_color(index)
    }

    fn compute_alpha(&self, index: &[f32]) -> u8 {
        let gradient = index.get(self.base.dims - 1).copied().unwrap_or(0.0);
        if gradient == 0.0 {
            return 0;
        }
        let r0 = 1.0 / gradient;
        let sum = self.base.falloff_sum(index, r0, self.base.dims - 1);
        self.base.quantize_alpha((-sum).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_grayscale_midpoint() {
        let tf = TransferFunctionKind::from(DirectTransfer::new(ColorMode::Grayscale));
        let c = tf.compute_color(&[0.5]);
        assert_eq!((c.r, c.g, c.b), (128, 128, 128));
        assert_eq!(tf.compute_alpha(&[0.5]), 255);
        assert_eq!(tf.dimension(), 1);
    }

    #[test]
    fn gaussian_alpha_peaks_at_center() {
        let tf = GaussianTransfer::uniform(ColorMode::Grayscale, 2, 4.0, 1.0).unwrap();
        let at_center = tf.compute_alpha(&[0.5, 0.5]);
        let off_center = tf.compute_alpha(&[0.9, 0.9]);
        assert_eq!(at_center, 255);
        assert!(off_center < at_center);
    }

    #[test]
    fn gaussian_alpha_stays_in_bounds() {
        // alpha_max > 1 must clamp at 255 instead of wrapping, and a steep
        // falloff must reach exactly 0 away from the center.
        let tf = GaussianTransfer::uniform(ColorMode::Grayscale, 3, 10.0, 4.0).unwrap();
        assert_eq!(tf.compute_alpha(&[0.5, 0.5, 0.5]), 255);
        assert_eq!(tf.compute_alpha(&[0.0, 1.0, 0.0]), 0);
    }

    #[test]
    fn disabled_axis_drops_out_of_falloff() {
        let mut tf = GaussianTransfer::uniform(ColorMode::Grayscale, 2, 8.0, 1.0).unwrap();
        tf.set_enabled(1, false);
        // Axis 1 far from center would normally kill alpha.
        assert_eq!(tf.compute_alpha(&[0.5, 1.0]), 255);
    }

    #[test]
    fn triangular_zero_gradient_is_fully_transparent() {
        let base = GaussianTransfer::uniform(ColorMode::Grayscale, 2, 1.0, 1.0).unwrap();
        let tf = TriangularGaussianTransfer::new(base).unwrap();
        assert_eq!(tf.compute_alpha(&[0.5, 0.0]), 0);
        assert!(tf.compute_alpha(&[0.5, 1.0]) > 0);
    }

    #[test]
    fn triangular_requires_gradient_axis() {
        let base = GaussianTransfer::uniform(ColorMode::Grayscale, 1, 1.0, 1.0).unwrap();
        assert!(matches!(
            TriangularGaussianTransfer::new(base),
            Err(TfError::GradientAxisMissing { dims: 1 })
        ));
    }

    #[test]
    fn constructor_rejects_mismatched_axis_vectors() {
        let err = GaussianTransfer::new(
            ColorMode::Grayscale,
            vec![true, true],
            vec![1.0],
            vec![0.5, 0.5],
            1.0,
        );
        assert!(matches!(err, Err(TfError::DimensionMismatch { .. })));
    }

    #[test]
    fn weak_gradient_tightens_triangular_falloff() {
        let base = GaussianTransfer::uniform(ColorMode::Grayscale, 2, 2.0, 1.0).unwrap();
        let tf = TriangularGaussianTransfer::new(base).unwrap();
        let soft = tf.compute_alpha(&[0.7, 1.0]);
        let sharp = tf.compute_alpha(&[0.7, 0.1]);
        assert!(sharp < soft, "small gradient must fall off faster: {sharp} vs {soft}");
    }
}
