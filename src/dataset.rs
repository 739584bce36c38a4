//! Read-only view of an already-parsed dataset: named scalar channels with
//! known ranges. File parsing lives outside the engine; this module only
//! normalizes values for transfer-function lookups.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Normalizes `v` into [0, 1] over `[min, max]`. A degenerate range
/// (`min == max`, a constant field) maps to the palette midpoint 0.5 so the
/// field renders in a single well-defined color instead of propagating NaN.
pub fn normalize(v: f32, min: f32, max: f32) -> f32 {
    if min == max {
        return 0.5;
    }
    ((v - min) / (max - min)).clamp(0.0, 1.0)
}

/// One scalar channel of a dataset. Values are shared with the recompute
/// worker, so they sit behind an `Arc` and stay valid for the worker's
/// lifetime.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FieldChannel {
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub values: Arc<Vec<f32>>,
}

impl FieldChannel {
    pub fn new(name: impl Into<String>, values: Vec<f32>) -> Self {
        let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
        for &v in &values {
            min = min.min(v);
            max = max.max(v);
        }
        if values.is_empty() {
            min = 0.0;
            max = 0.0;
        }
        Self {
            name: name.into(),
            min,
            max,
            values: Arc::new(values),
        }
    }

    pub fn with_range(name: impl Into<String>, values: Vec<f32>, min: f32, max: f32) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            values: Arc::new(values),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalized sample at `element`, against the channel's own range.
    pub fn normalized(&self, element: usize) -> f32 {
        self.values
            .get(element)
            .map(|&v| normalize(v, self.min, self.max))
            .unwrap_or(0.0)
    }
}

/// A set of equally-sized channels over the same elements. The last channel
/// may be a gradient-magnitude channel feeding gradient-aware transfer
/// functions.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Dataset {
    channels: Vec<FieldChannel>,
    element_count: usize,
    values_loaded: bool,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel. The first channel fixes the element count; later
    /// channels must match it or are rejected with a log line.
    pub fn push_channel(&mut self, channel: FieldChannel) {
        if self.channels.is_empty() {
            self.element_count = channel.len();
        } else if channel.len() != self.element_count {
            log::error!(
                "dataset channel '{}' has {} elements, expected {}; dropped",
                channel.name,
                channel.len(),
                self.element_count
            );
            return;
        }
        self.channels.push(channel);
        self.values_loaded = !self.channels.is_empty();
    }

    pub fn channels(&self) -> &[FieldChannel] {
        &self.channels
    }

    pub fn channel(&self, i: usize) -> Option<&FieldChannel> {
        self.channels.get(i)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Gates every recompute: without loaded values there is nothing to map.
    pub fn are_values_loaded(&self) -> bool {
        self.values_loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_spans_unit_interval() {
        assert_eq!(normalize(0.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize(10.0, 0.0, 10.0), 1.0);
        assert_eq!(normalize(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalize(-3.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn degenerate_range_maps_to_midpoint() {
        assert_eq!(normalize(7.0, 7.0, 7.0), 0.5);
        assert_eq!(normalize(0.0, 7.0, 7.0), 0.5);
    }

    #[test]
    fn channel_derives_its_range() {
        let c = FieldChannel::new("density", vec![2.0, 4.0, 8.0]);
        assert_eq!(c.min, 2.0);
        assert_eq!(c.max, 8.0);
        assert_eq!(c.normalized(0), 0.0);
        assert_eq!(c.normalized(2), 1.0);
    }

    #[test]
    fn mismatched_channel_is_dropped() {
        let mut ds = Dataset::new();
        ds.push_channel(FieldChannel::new("a", vec![1.0, 2.0]));
        ds.push_channel(FieldChannel::new("b", vec![1.0]));
        assert_eq!(ds.channel_count(), 1);
        assert!(ds.are_values_loaded());
    }

    #[test]
    fn empty_dataset_gates_recompute() {
        assert!(!Dataset::new().are_values_loaded());
    }
}
