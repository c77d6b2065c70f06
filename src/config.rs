//! Preprocessing and output configuration.
//!
//! [`PreprocConfig`] declares how recordings are turned into epochs and
//! [`SaveConfig`] declares how the resulting dataset is written.  Both are
//! plain structs with `pub` fields and defaults, so you can use
//! struct-update syntax:
//!
//! ```
//! use bciprep::PreprocConfig;
//!
//! let cfg = PreprocConfig {
//!     tmin: 0.5,
//!     tmax: 2.5,
//!     baseline: Some((None, Some(1.0))),
//!     resample_hz: None,
//!     ..PreprocConfig::default()
//! };
//! assert!(cfg.validate().is_ok());
//! ```
//!
//! Both structs also deserialize from JSON; missing keys take their default.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Configuration of the per-recording preprocessing stages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocConfig {
    /// Name of the electrode-position montage attached to every recording.
    ///
    /// Default: `"standard_1020"`.
    pub montage: String,

    /// Lower band-pass edge in Hz.
    ///
    /// Declared for the external filtering toolchain; not applied here
    /// (see [`PreprocConfig::deferred_stages`]).
    ///
    /// Default: `0.5` Hz.
    pub l_freq: f64,

    /// Upper band-pass edge in Hz.  Not applied here.
    ///
    /// Default: `40.0` Hz.
    pub h_freq: f64,

    /// Power-line notch frequency in Hz, `None` to skip.  Not applied here.
    ///
    /// Default: `Some(50.0)`.
    pub notch: Option<f64>,

    /// Target sampling rate in Hz, `None` to keep the source rate.
    ///
    /// Default: `Some(250)`, which is a no-op for IV-2a recordings.
    pub resample_hz: Option<u32>,

    /// Epoch start relative to the event, in seconds.
    ///
    /// Default: `-0.2` s.
    pub tmin: f64,

    /// Epoch end relative to the event, in seconds (inclusive).
    ///
    /// Default: `0.8` s.
    pub tmax: f64,

    /// Baseline window `(start, end)` in seconds; a `None` edge means the
    /// corresponding edge of the epoch.  `None` disables baseline correction.
    ///
    /// Default: `Some((None, Some(0.0)))`, i.e. from `tmin` to the event.
    pub baseline: Option<(Option<f64>, Option<f64>)>,

    /// Event label → event code selection, e.g.
    /// `{"left": 7, "right": 8, "foot": 9, "tongue": 10}`.
    ///
    /// `None` keeps every event with the mapping derived from annotations.
    pub event_id_map: Option<BTreeMap<String, i32>>,

    /// Channel names to keep in the epochs.  `None` = all EEG channels.
    pub picks: Option<Vec<String>>,

    /// Drop epochs that overlap an annotation whose description starts
    /// with `BAD`.
    ///
    /// Default: `true`.
    pub reject_by_annotation: bool,

    /// ICA component count, `None` to skip.  Not applied here.
    pub ica_n_components: Option<usize>,

    /// ICA iteration cap.  Not applied here.
    ///
    /// Default: `512`.
    pub ica_max_iter: usize,
}

impl Default for PreprocConfig {
    fn default() -> Self {
        Self {
            montage: "standard_1020".into(),
            l_freq: 0.5,
            h_freq: 40.0,
            notch: Some(50.0),
            resample_hz: Some(250),
            tmin: -0.2,
            tmax: 0.8,
            baseline: Some((None, Some(0.0))),
            event_id_map: None,
            picks: None,
            reject_by_annotation: true,
            ica_n_components: None,
            ica_max_iter: 512,
        }
    }
}

impl PreprocConfig {
    /// Load a configuration from a JSON file.  Keys that are absent keep
    /// their default value.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject parameter combinations that cannot describe a valid pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.tmin >= self.tmax {
            bail!("tmin ({}) must be smaller than tmax ({})", self.tmin, self.tmax);
        }
        if self.l_freq <= 0.0 || self.h_freq <= 0.0 {
            bail!("band edges must be positive (l_freq={}, h_freq={})", self.l_freq, self.h_freq);
        }
        if self.l_freq >= self.h_freq {
            bail!("l_freq ({}) must be below h_freq ({})", self.l_freq, self.h_freq);
        }
        if let Some(f) = self.notch {
            if f <= 0.0 {
                bail!("notch frequency must be positive, got {f}");
            }
        }
        if self.resample_hz == Some(0) {
            bail!("resample_hz must be positive");
        }
        if let Some((start, end)) = self.baseline {
            let start = start.unwrap_or(self.tmin);
            let end = end.unwrap_or(self.tmax);
            if start < self.tmin || end > self.tmax || start > end {
                bail!(
                    "baseline ({start}, {end}) must lie inside the epoch ({}, {})",
                    self.tmin, self.tmax
                );
            }
        }
        if self.ica_n_components == Some(0) {
            bail!("ica_n_components must be positive when set");
        }
        Ok(())
    }

    /// Declared stages that this crate leaves to an external toolchain.
    ///
    /// The pipeline logs these once per run so a caller never assumes the
    /// data was filtered or cleaned when it was not.
    pub fn deferred_stages(&self) -> Vec<String> {
        let mut stages = vec![format!("band-pass {}-{} Hz", self.l_freq, self.h_freq)];
        if let Some(f) = self.notch {
            stages.push(format!("notch {f} Hz"));
        }
        if let Some(n) = self.ica_n_components {
            stages.push(format!("ICA ({n} components, max_iter={})", self.ica_max_iter));
        }
        stages
    }

    /// Epoch length in samples at `sfreq`: both window ends are included.
    pub fn epoch_samples(&self, sfreq: f64) -> usize {
        let first = (self.tmin * sfreq).round() as i64;
        let last = (self.tmax * sfreq).round() as i64;
        (last - first + 1) as usize
    }
}

// ── Output configuration ───────────────────────────────────────────────────

/// On-disk container for the prepared dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    /// NumPy `.npz` archive (one `.npy` member per array).
    Npz,
    /// Safetensors container.
    Safetensors,
}

impl SaveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Npz => "npz",
            SaveFormat::Safetensors => "safetensors",
        }
    }
}

/// Normalisation the consumer of the dataset is expected to apply.
///
/// Stored in the output metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeStrategy {
    None,
    PerChannelZ,
    PerEpochZ,
}

impl NormalizeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            NormalizeStrategy::None => "none",
            NormalizeStrategy::PerChannelZ => "per_channel_z",
            NormalizeStrategy::PerEpochZ => "per_epoch_z",
        }
    }
}

/// Floating-point precision of the stored signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Float32,
    Float64,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Float32 => "float32",
            Precision::Float64 => "float64",
        }
    }
}

/// Where and how the prepared dataset is written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveConfig {
    pub out_dir: PathBuf,
    #[serde(default = "default_format")]
    pub format: SaveFormat,
    #[serde(default = "default_normalize")]
    pub normalize: NormalizeStrategy,
    #[serde(default = "default_dtype")]
    pub dtype: Precision,
    /// Store labels as a `[N, K]` one-hot matrix instead of `[N]` codes.
    #[serde(default)]
    pub one_hot: bool,
}

fn default_format() -> SaveFormat {
    SaveFormat::Npz
}

fn default_normalize() -> NormalizeStrategy {
    NormalizeStrategy::PerChannelZ
}

fn default_dtype() -> Precision {
    Precision::Float32
}

impl SaveConfig {
    /// Defaults for everything but the output directory.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            format: default_format(),
            normalize: default_normalize(),
            dtype: default_dtype(),
            one_hot: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PreprocConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.montage, "standard_1020");
        assert_eq!(cfg.resample_hz, Some(250));
        assert_eq!(cfg.baseline, Some((None, Some(0.0))));
    }

    #[test]
    fn epoch_samples_includes_both_ends() {
        let cfg = PreprocConfig::default();
        // -0.2 s .. 0.8 s at 250 Hz → samples -50..=200
        assert_eq!(cfg.epoch_samples(250.0), 251);
    }

    #[test]
    fn rejects_inverted_window() {
        let cfg = PreprocConfig { tmin: 1.0, tmax: 0.5, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_baseline_outside_epoch() {
        let cfg = PreprocConfig {
            baseline: Some((Some(-1.0), Some(0.0))),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn post_cue_window_needs_its_own_baseline() {
        // Default baseline ends at 0 s, before a window starting at 0.5 s.
        let cfg = PreprocConfig { tmin: 0.5, tmax: 2.5, ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = PreprocConfig { baseline: Some((None, Some(1.0))), ..cfg };
        assert!(cfg.validate().is_ok());
        let cfg = PreprocConfig { baseline: None, ..cfg };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deferred_stages_lists_declared_filters() {
        let cfg = PreprocConfig { ica_n_components: Some(20), ..Default::default() };
        let stages = cfg.deferred_stages();
        assert_eq!(stages.len(), 3);
        assert!(stages[0].starts_with("band-pass"));
        assert!(stages[2].starts_with("ICA"));

        let cfg = PreprocConfig { notch: None, ..Default::default() };
        assert_eq!(cfg.deferred_stages().len(), 1);
    }

    #[test]
    fn json_overrides_defaults() {
        let cfg: PreprocConfig = serde_json::from_str(
            r#"{"tmin": 0.5, "tmax": 2.5, "event_id_map": {"left": 7, "right": 8}}"#,
        )
        .unwrap();
        assert_eq!(cfg.tmin, 0.5);
        assert_eq!(cfg.l_freq, 0.5);
        assert_eq!(cfg.event_id_map.unwrap()["right"], 8);
    }

    #[test]
    fn save_config_from_json() {
        let cfg: SaveConfig = serde_json::from_str(
            r#"{"out_dir": "out", "format": "safetensors", "normalize": "per_epoch_z", "one_hot": true}"#,
        )
        .unwrap();
        assert_eq!(cfg.format, SaveFormat::Safetensors);
        assert_eq!(cfg.normalize, NormalizeStrategy::PerEpochZ);
        assert_eq!(cfg.dtype, Precision::Float32);
        assert!(cfg.one_hot);
    }
}
