//! The batch pipeline.
//!
//! ```text
//! data_root/*.gdf
//!   │
//!   ├─ discover::find_files      glob, empty when the directory is missing
//!   ├─ split::classify           'E' in file name → eval
//!   ├─ loader::load_batch        one LoadOutcome per file, sequential
//!   ├─ ChannelNormalizer         rename → EOG types → montage, all recordings
//!   └─ Recording::resample       when resample_hz differs from the source rate
//!        │
//!        └─→ Dataset ──export()──→ epochs per split → save::save_dataset
//! ```
//!
//! Nothing runs until [`Pipeline::run`] is called.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::channels::ChannelNormalizer;
use crate::config::{PreprocConfig, SaveConfig};
use crate::discover::{find_files, DEFAULT_PATTERN};
use crate::epoch::Epochs;
use crate::events::events_from_annotations;
use crate::loader::{load_batch, LoadError, LoadedRecording, RecordingReader};
use crate::save::save_dataset;
use crate::split::{classify, Split, SplitLabels};

/// Configured but not yet executed batch run over one data root.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PreprocConfig,
    data_root: PathBuf,
    pattern: String,
    strict: bool,
}

impl Pipeline {
    pub fn new(config: PreprocConfig, data_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            data_root: data_root.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            strict: false,
        }
    }

    /// Glob pattern relative to the data root (default `*.gdf`).
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Abort on the first file that fails to load, discarding every
    /// recording, instead of continuing with the files that did load.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn config(&self) -> &PreprocConfig {
        &self.config
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Discover, classify, load and normalise every recording.
    pub fn run<R: RecordingReader + ?Sized>(&self, reader: &R) -> Result<Dataset> {
        self.config.validate()?;
        let normalizer = ChannelNormalizer::bci_iv_2a(&self.config.montage)?;

        let files = find_files(&self.data_root, &self.pattern)?;
        if files.is_empty() {
            warn!(
                "no files match '{}' under {}",
                self.pattern,
                self.data_root.display()
            );
        }
        debug!("files: {files:?}");

        let labels = classify(&files);
        info!(
            "split: train={} eval={}",
            labels.counts.train, labels.counts.eval
        );

        let report = load_batch(reader, &files, &labels);
        let (mut recordings, failures) = if self.strict {
            (report.into_strict().context("strict load aborted the batch")?, Vec::new())
        } else {
            let mut ok = Vec::new();
            let mut failed = Vec::new();
            for outcome in report.outcomes {
                match outcome.result {
                    Ok(rec) => ok.push(rec),
                    Err(e) => failed.push((outcome.path, e)),
                }
            }
            (ok, failed)
        };

        normalizer.apply_all(&mut recordings)?;

        if let Some(hz) = self.config.resample_hz {
            for rec in &mut recordings {
                rec.raw
                    .resample(hz as f64)
                    .with_context(|| format!("resampling {}", rec.path.display()))?;
                // Same annotations, so the label → code mapping is unchanged.
                let (events, _) =
                    events_from_annotations(&rec.raw.annotations, rec.raw.sfreq, rec.raw.first_samp);
                rec.events = events;
            }
        }

        for stage in self.config.deferred_stages() {
            warn!("declared stage not applied here: {stage}");
        }

        Ok(Dataset { config: self.config.clone(), files, labels, recordings, failures })
    }
}

/// Everything a run produced.
///
/// `files` and `labels` cover every discovered file; each file ends up in
/// exactly one of `recordings` (in file order) or `failures`.
#[derive(Debug)]
pub struct Dataset {
    pub config: PreprocConfig,
    pub files: Vec<PathBuf>,
    pub labels: SplitLabels,
    pub recordings: Vec<LoadedRecording>,
    pub failures: Vec<(PathBuf, LoadError)>,
}

impl Dataset {
    /// Loaded recordings of one split, in file order.
    pub fn split(&self, split: Split) -> impl Iterator<Item = &LoadedRecording> {
        self.recordings.iter().filter(move |r| r.split == split)
    }

    /// Epochs of every recording in `split`, stacked.  `None` when the split
    /// has no recordings.
    pub fn epochs(&self, split: Split) -> Result<Option<Epochs>> {
        let parts = self
            .split(split)
            .map(|rec| Epochs::from_loaded(rec, &self.config))
            .collect::<Result<Vec<_>>>()?;
        if parts.is_empty() {
            return Ok(None);
        }
        Epochs::concatenate(&parts).map(Some)
    }

    /// Epoch and write each non-empty split.  Returns the written files.
    pub fn export(&self, save: &SaveConfig) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for split in [Split::Train, Split::Eval] {
            match self.epochs(split)? {
                Some(epochs) => written.push(save_dataset(&epochs, split, save)?),
                None => debug!("{split}: no recordings, nothing written"),
            }
        }
        Ok(written)
    }
}
