//! SciVis facade: the per-visualization object the host bridge talks to.
//!
//! Owns the bound transfer function, the shared dataset and the recompute
//! worker. Change events (`on_tf_changed`, `set_color_range`) schedule a
//! background recompute of the per-element color buffer; the render thread
//! drains the result once per frame via `sync_colors` and uploads it into the
//! point geometry's color attribute. LUT textures for transfer-function
//! materials regenerate synchronously (they are small), the per-element
//! buffer never blocks the draw thread.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::dataset::{Dataset, normalize};
use crate::ids::{MeshID, TextureID};
use crate::rendering::GraphicsContext;
use crate::tf::color_space::ColorMode;
use crate::tf::transfer_function::{TransferFunction, TransferFunctionKind};
use crate::tf::{self, TfError};
use crate::worker::{ColorBuffer, ColorRecomputeWorker};

/// Upper bound of the per-element index vector; scalar + vector components
/// + gradient magnitude never exceed this in practice.
const MAX_TF_DIMENSIONS: usize = 8;

/// Serialized form of a tuned transfer function, for saving and restoring
/// user presets.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TfPreset {
    pub tf: TransferFunctionKind,
    pub color_range: Option<(f32, f32)>,
}

pub struct SciVis {
    dataset: Arc<Dataset>,
    tf: TransferFunctionKind,
    worker: ColorRecomputeWorker,
    /// Display-range override for the primary channel; channel ranges apply
    /// when unset.
    color_range: Option<(f32, f32)>,
    /// Point geometry receiving recomputed per-element colors.
    geometry: Option<MeshID>,
    /// GPU LUT for transfer-function materials.
    lut: Option<(TextureID, Vec<u32>)>,
}

impl SciVis {
    pub fn new(dataset: Arc<Dataset>, tf: TransferFunctionKind) -> Self {
        Self {
            dataset,
            tf,
            worker: ColorRecomputeWorker::new(),
            color_range: None,
            geometry: None,
            lut: None,
        }
    }

    pub fn transfer_function(&self) -> &TransferFunctionKind {
        &self.tf
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn color_range(&self) -> Option<(f32, f32)> {
        self.color_range
    }

    /// Point geometry whose color attribute `sync_colors` feeds.
    pub fn bind_geometry(&mut self, mesh: MeshID) {
        self.geometry = Some(mesh);
    }

    /// Swap the dataset (e.g. after a reload) and recompute.
    pub fn set_dataset(&mut self, dataset: Arc<Dataset>) {
        self.dataset = dataset;
        self.schedule_recompute();
    }

    /// Replace the bound transfer function and recompute.
    pub fn set_transfer_function(&mut self, tf: TransferFunctionKind) {
        self.tf = tf;
        self.schedule_recompute();
    }

    /// Re-clamp the displayed value range and switch the color model, then
    /// recompute. Exposed across the host bridge.
    pub fn set_color_range(&mut self, min: f32, max: f32, mode: ColorMode) {
        self.color_range = Some((min, max));
        self.tf.set_color_mode(mode);
        self.schedule_recompute();
    }

    /// The bound transfer function's parameters changed in place. Exposed
    /// across the host bridge.
    pub fn on_tf_changed(&mut self) {
        self.schedule_recompute();
    }

    fn schedule_recompute(&self) {
        if !self.dataset.are_values_loaded() {
            log::warn!("recompute requested before dataset values loaded, skipping");
            return;
        }
        let dataset = Arc::clone(&self.dataset);
        let tf = self.tf.clone();
        let range = self.color_range;
        self.worker
            .request(move || compute_element_colors(&dataset, &tf, range));
    }

    /// Render-thread step, once per frame: take the latest finished buffer
    /// and upload it into the bound point geometry. Returns true when an
    /// upload happened.
    pub fn sync_colors(&mut self, gfx: &GraphicsContext) -> bool {
        let Some(buffer) = self.worker.take_result() else {
            return false;
        };
        let Some(mesh) = self.geometry else {
            log::warn!("recomputed colors arrived with no geometry bound, discarding");
            return false;
        };
        gfx.meshes.update_point_colors(&gfx.queue, mesh, &buffer.data)
    }

    /// Take the latest recomputed buffer without touching the GPU. Host
    /// bridges use this to hand pixel data out of process.
    pub fn take_colors(&mut self) -> Option<ColorBuffer> {
        self.worker.take_result()
    }

    #[cfg(test)]
    pub(crate) fn wait_recompute(&self) {
        self.worker.wait_idle();
    }

    /// Regenerate the LUT texture for the current transfer function and
    /// upload it, reusing the existing handle when possible. Runs on the
    /// render thread; LUT grids are small enough to generate synchronously.
    /// Failures are logged and yield `None`, and the caller skips binding the
    /// LUT this frame.
    pub fn regenerate_lut(&mut self, gfx: &mut GraphicsContext, sizes: &[u32]) -> Option<TextureID> {
        let data = match tf::texture_gen::generate(sizes, &self.tf) {
            Ok(data) => data,
            Err(e @ TfError::GridRankMismatch { .. }) => {
                log::error!("LUT grid does not fit the bound transfer function: {e}");
                return None;
            }
            Err(e) => {
                log::error!("LUT generation failed: {e}");
                return None;
            }
        };
        let uploaded = match self.lut.take() {
            Some((id, _)) => gfx.update_tf_texture(id, sizes, &data).map(|_| id),
            None => gfx.create_tf_texture(sizes, &data),
        };
        match uploaded {
            Ok(id) => {
                self.lut = Some((id, sizes.to_vec()));
                Some(id)
            }
            Err(e) => {
                log::error!("LUT upload failed: {e}");
                None
            }
        }
    }

    pub fn lut_texture(&self) -> Option<TextureID> {
        self.lut.as_ref().map(|(id, _)| *id)
    }

    // ---------------- presets ----------------

    pub fn save_preset(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let preset = TfPreset {
            tf: self.tf.clone(),
            color_range: self.color_range,
        };
        let json = serde_json::to_string_pretty(&preset)?;
        std::fs::write(path, json)
    }

    pub fn load_preset(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let json = std::fs::read_to_string(path)?;
        let preset: TfPreset = serde_json::from_str(&json)?;
        self.tf = preset.tf;
        self.color_range = preset.color_range;
        self.schedule_recompute();
        Ok(())
    }
}

/// Map every dataset element through the transfer function. Runs on the
/// worker thread; rayon splits the output into disjoint per-element slices.
/// Returns `None` (after logging) on configuration mismatch so the frame
/// keeps its previous colors.
pub fn compute_element_colors(
    dataset: &Dataset,
    tf: &TransferFunctionKind,
    color_range: Option<(f32, f32)>,
) -> Option<ColorBuffer> {
    if !dataset.are_values_loaded() {
        log::warn!("dataset values not loaded, skipping color recompute");
        return None;
    }
    let dims = tf.dimension();
    if dims > dataset.channel_count() || dims > MAX_TF_DIMENSIONS {
        log::error!(
            "transfer function needs {dims} channels, dataset has {}; skipping recompute",
            dataset.channel_count()
        );
        return None;
    }

    let elements = dataset.element_count();
    let mut data = vec![0u8; elements * 4];
    data.par_chunks_mut(4).enumerate().for_each(|(e, texel)| {
        let mut index = [0.0f32; MAX_TF_DIMENSIONS];
        for (c, slot) in index.iter_mut().enumerate().take(dims) {
            let channel = dataset.channel(c).expect("checked channel count");
            *slot = match (c, color_range) {
                (0, Some((min, max))) => {
                    let v = channel.values.get(e).copied().unwrap_or(0.0);
                    normalize(v, min, max)
                }
                _ => channel.normalized(e),
            };
        }
        let rgba = tf.compute_rgba(&index[..dims]);
        texel.copy_from_slice(&rgba.to_bytes());
    });

    Some(ColorBuffer::new(data))
}
