//! # bciprep — data preparation for BCI Competition IV-2a recordings
//!
//! `bciprep` turns a directory of motor-imagery recordings into a
//! train/eval dataset of event-locked epochs with standard 10-20 channel
//! names and electrode positions.
//!
//! ## Pipeline overview
//!
//! ```text
//! data/BCICIV_2a_gdf/A01T.gdf, A01E.gdf, …
//!   │
//!   ├─ discover::find_files()        glob *.gdf (missing dir → empty)
//!   ├─ split::classify()             'E' in file name → eval, else train
//!   ├─ loader::load_batch()          RecordingReader per file → LoadReport
//!   │                                 + events_from_annotations()
//!   ├─ ChannelNormalizer::apply_all  EEG-0… → FC3…, EOG types, standard_1020
//!   ├─ Recording::resample()         FFT resampler → resample_hz
//!   ├─ Epochs::from_loaded()         [tmin, tmax] around cues, baseline,
//!   │                                 picks, BAD-annotation rejection
//!   └─ save::save_dataset()          train.npz / eval.npz (or .safetensors)
//! ```
//!
//! Band-pass and notch filtering, ICA and z-score normalisation are
//! declared in [`PreprocConfig`] / [`SaveConfig`] for the external
//! toolchain but are not applied here; [`PreprocConfig::deferred_stages`]
//! lists them and the pipeline logs them on every run.
//!
//! ## Quick start
//!
//! ```no_run
//! use bciprep::{ExportReader, Pipeline, PreprocConfig, SaveConfig};
//!
//! let dataset = Pipeline::new(PreprocConfig::default(), "data/BCICIV_2a_gdf")
//!     .run(&ExportReader)
//!     .unwrap();
//!
//! println!(
//!     "train={} eval={} failed={}",
//!     dataset.labels.counts.train,
//!     dataset.labels.counts.eval,
//!     dataset.failures.len(),
//! );
//! dataset.export(&SaveConfig::new("out")).unwrap();
//! ```
//!
//! ## Loading
//!
//! GDF decoding lives behind the [`RecordingReader`] trait.  The shipped
//! [`ExportReader`] reads the safetensors export written next to each
//! recording (see [`loader`] for the tensor layout); any other reader can
//! be passed to [`Pipeline::run`].
pub mod channels;
pub mod config;
pub mod discover;
pub mod epoch;
pub mod events;
pub mod io;
pub mod loader;
pub mod montage;
pub mod pipeline;
pub mod recording;
pub mod resample;
pub mod save;
pub mod split;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{NormalizeStrategy, Precision, PreprocConfig, SaveConfig, SaveFormat};

// discovery + split
pub use discover::{find_files, DEFAULT_PATTERN};
pub use split::{classify, Split, SplitCounts, SplitLabels, EVAL_MARKER};

// recordings, events, loading
pub use events::{events_from_annotations, Annotation, Event, EventId};
pub use loader::{
    load_batch, load_recording, ExportReader, LoadError, LoadOutcome, LoadReport,
    LoadedRecording, RecordingReader,
};
pub use recording::{Channel, ChannelKind, Recording};

// channel normalisation
pub use channels::{ChannelNormalizer, EOG_CHANNELS};
pub use montage::{Montage, OnMissing};

// epoching + output
pub use epoch::{DropReason, Epochs};
pub use io::{SafeTensors, StWriter};
pub use save::{save_dataset, NpzWriter};

// pipeline
pub use pipeline::{Dataset, Pipeline};
