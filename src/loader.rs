//! Recording loading.
//!
//! Parsing the GDF binary format is delegated to an external exporter:
//! [`RecordingReader`] is the seam, and [`ExportReader`] reads the
//! safetensors export that sits next to each recording
//! (`A01T.gdf` → `A01T.safetensors`).
//!
//! Export tensors:
//!
//! ```text
//! data               [C, T]  F32|F64   signal in volts
//! sfreq              [1]     F32|F64   sampling rate (Hz)
//! ch_names           [n]     U8        newline-joined channel names
//! first_samp         [1]     I32|I64   optional, default 0
//! annot_onset        [N]     F32|F64   optional, seconds
//! annot_duration     [N]     F32|F64   optional, seconds
//! annot_description  [n]     U8        optional, newline-joined
//! ```
//!
//! [`load_batch`] attempts every file and records one [`LoadOutcome`] per
//! file, so a single corrupt recording does not discard the others.
//! [`LoadReport::into_strict`] restores all-or-nothing behaviour.
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::Array2;
use thiserror::Error;

use crate::events::{events_from_annotations, Annotation, Event, EventId};
use crate::io::SafeTensors;
use crate::recording::{Channel, Recording};
use crate::split::{Split, SplitLabels};

/// Why a recording could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("recording not found: {0}")]
    Missing(PathBuf),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed recording {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("inconsistent recording {path}: {reason}")]
    Shape { path: PathBuf, reason: String },
}

impl LoadError {
    fn format(path: &Path, err: impl std::fmt::Display) -> Self {
        LoadError::Format { path: path.to_path_buf(), reason: format!("{err:#}") }
    }

    fn shape(path: &Path, reason: impl Into<String>) -> Self {
        LoadError::Shape { path: path.to_path_buf(), reason: reason.into() }
    }
}

/// The signal-format parser capability: file → fully loaded recording.
pub trait RecordingReader {
    fn read(&self, path: &Path) -> Result<Recording, LoadError>;
}

/// Reads the safetensors export written next to each recording.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportReader;

impl ExportReader {
    /// File actually read for `path`: the path itself when it is already a
    /// safetensors file, otherwise the sibling with that extension.
    pub fn export_path(path: &Path) -> PathBuf {
        match path.extension() {
            Some(ext) if ext == "safetensors" => path.to_path_buf(),
            _ => path.with_extension("safetensors"),
        }
    }
}

impl RecordingReader for ExportReader {
    fn read(&self, path: &Path) -> Result<Recording, LoadError> {
        let export = Self::export_path(path);
        let bytes = std::fs::read(&export).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::Missing(export.clone())
            } else {
                LoadError::Io { path: export.clone(), source }
            }
        })?;
        let st = SafeTensors::from_bytes(bytes).map_err(|e| LoadError::format(&export, e))?;
        decode_export(&st).map_err(|e| match e {
            DecodeError::Format(err) => LoadError::format(&export, err),
            DecodeError::Shape(reason) => LoadError::shape(&export, reason),
        })
    }
}

enum DecodeError {
    Format(anyhow::Error),
    Shape(String),
}

impl From<anyhow::Error> for DecodeError {
    fn from(e: anyhow::Error) -> Self {
        DecodeError::Format(e)
    }
}

fn decode_export(st: &SafeTensors) -> Result<Recording, DecodeError> {
    let (values, shape) = st.f64_values("data")?;
    if shape.len() != 2 {
        return Err(DecodeError::Shape(format!("'data' must be 2-D, got shape {shape:?}")));
    }
    let data = Array2::from_shape_vec((shape[0], shape[1]), values)
        .map_err(|e| DecodeError::Shape(e.to_string()))?;

    let sfreq = st
        .f64_values("sfreq")?
        .0
        .first()
        .copied()
        .ok_or_else(|| DecodeError::Shape("'sfreq' is empty".into()))?;

    let names = st.text_lines("ch_names")?;
    if names.len() != data.nrows() {
        return Err(DecodeError::Shape(format!(
            "{} channel names for {} signal rows",
            names.len(),
            data.nrows()
        )));
    }
    let channels = names.into_iter().map(Channel::eeg).collect();
    let mut raw = Recording::new(data, sfreq, channels).map_err(DecodeError::Format)?;

    if st.contains("first_samp") {
        raw.first_samp = st.i64_values("first_samp")?.0.first().copied().unwrap_or(0);
    }
    if st.contains("annot_onset") {
        raw.annotations = decode_annotations(st)?;
    }
    Ok(raw)
}

fn decode_annotations(st: &SafeTensors) -> Result<Vec<Annotation>, DecodeError> {
    let onsets = st.f64_values("annot_onset")?.0;
    let durations = if st.contains("annot_duration") {
        st.f64_values("annot_duration")?.0
    } else {
        vec![0.0; onsets.len()]
    };
    let descriptions = st.text_lines("annot_description")?;
    if durations.len() != onsets.len() || descriptions.len() != onsets.len() {
        return Err(DecodeError::Shape(format!(
            "annotation arrays disagree: {} onsets, {} durations, {} descriptions",
            onsets.len(),
            durations.len(),
            descriptions.len()
        )));
    }
    Ok(onsets
        .into_iter()
        .zip(durations)
        .zip(descriptions)
        .map(|((onset, duration), description)| Annotation { onset, duration, description })
        .collect())
}

// ── Loaded recordings ─────────────────────────────────────────────────────────

/// One recording with the events derived from its annotations.
#[derive(Debug, Clone)]
pub struct LoadedRecording {
    pub path: PathBuf,
    pub split: Split,
    pub raw: Recording,
    pub events: Vec<Event>,
    pub event_id: EventId,
}

/// Read one file and derive its events.
pub fn load_recording<R: RecordingReader + ?Sized>(
    reader: &R,
    path: &Path,
    split: Split,
) -> Result<LoadedRecording, LoadError> {
    let raw = reader.read(path)?;
    let (events, event_id) = events_from_annotations(&raw.annotations, raw.sfreq, raw.first_samp);
    debug!(
        "{}: {} ch x {} samples @ {} Hz, {} events",
        path.display(),
        raw.n_channels(),
        raw.n_times(),
        raw.sfreq,
        events.len()
    );
    Ok(LoadedRecording { path: path.to_path_buf(), split, raw, events, event_id })
}

/// Result of loading one file of the batch.
#[derive(Debug)]
pub struct LoadOutcome {
    pub path: PathBuf,
    pub result: Result<LoadedRecording, LoadError>,
}

/// Per-file results of a batch load, in file-set order.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub outcomes: Vec<LoadOutcome>,
}

impl LoadReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Failed files with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &LoadError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.path.as_path(), e)))
    }

    /// Successful recordings in file-set order; failures are dropped.
    pub fn into_recordings(self) -> Vec<LoadedRecording> {
        self.outcomes.into_iter().filter_map(|o| o.result.ok()).collect()
    }

    /// All recordings, or the first failure if any file failed.
    pub fn into_strict(self) -> Result<Vec<LoadedRecording>, LoadError> {
        self.outcomes.into_iter().map(|o| o.result).collect()
    }
}

/// Load every file in order, one at a time.
///
/// `labels` must be the classification of `files`.
///
/// # Panics
///
/// Panics if `labels` does not have one entry per file.
pub fn load_batch<R: RecordingReader + ?Sized>(
    reader: &R,
    files: &[PathBuf],
    labels: &SplitLabels,
) -> LoadReport {
    assert_eq!(files.len(), labels.len(), "split labels must parallel the file set");

    let outcomes: Vec<LoadOutcome> = files
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let result = load_recording(reader, path, labels.split(i));
            if let Err(e) = &result {
                warn!("{e}");
            }
            LoadOutcome { path: path.clone(), result }
        })
        .collect();

    let report = LoadReport { outcomes };
    info!("loaded {}/{} recording(s)", report.succeeded(), report.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::StWriter;
    use crate::split::classify;

    fn write_export(path: &Path, n_ch: usize, n_t: usize) {
        let mut w = StWriter::new();
        let data: Vec<f32> = (0..n_ch * n_t).map(|i| i as f32 * 1e-6).collect();
        w.add_f32("data", &data, &[n_ch, n_t]);
        w.add_f64("sfreq", &[250.0], &[1]);
        let names: Vec<String> = (0..n_ch).map(|i| format!("EEG-{i}")).collect();
        w.add_text("ch_names", &names);
        w.add_f64("annot_onset", &[0.5, 1.0], &[2]);
        w.add_f64("annot_duration", &[0.0, 0.0], &[2]);
        w.add_text("annot_description", &["770", "769"]);
        w.write(path).unwrap();
    }

    #[test]
    fn export_path_resolution() {
        assert_eq!(
            ExportReader::export_path(Path::new("d/A01T.gdf")),
            PathBuf::from("d/A01T.safetensors")
        );
        assert_eq!(
            ExportReader::export_path(Path::new("d/A01T.safetensors")),
            PathBuf::from("d/A01T.safetensors")
        );
    }

    #[test]
    fn reads_export_and_derives_events() {
        let tmp = tempfile::tempdir().unwrap();
        let gdf = tmp.path().join("A01T.gdf");
        write_export(&gdf.with_extension("safetensors"), 3, 500);

        let rec = load_recording(&ExportReader, &gdf, Split::Train).unwrap();
        assert_eq!(rec.raw.n_channels(), 3);
        assert_eq!(rec.raw.n_times(), 500);
        assert_eq!(rec.raw.ch_names(), vec!["EEG-0", "EEG-1", "EEG-2"]);
        assert_eq!(rec.event_id["769"], 1);
        assert_eq!(rec.event_id["770"], 2);
        assert_eq!(
            rec.events,
            vec![Event { sample: 125, code: 2 }, Event { sample: 250, code: 1 }]
        );
    }

    #[test]
    fn missing_export_is_reported() {
        let err = ExportReader.read(Path::new("/nonexistent_dir_4217/A01T.gdf")).unwrap_err();
        assert!(matches!(err, LoadError::Missing(_)));
    }

    #[test]
    fn row_mismatch_is_shape_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.safetensors");
        let mut w = StWriter::new();
        w.add_f64("data", &[0.0; 4], &[2, 2]);
        w.add_f64("sfreq", &[250.0], &[1]);
        w.add_text("ch_names", &["Cz"]);
        w.write(&path).unwrap();
        assert!(matches!(ExportReader.read(&path), Err(LoadError::Shape { .. })));
    }

    #[test]
    fn batch_keeps_going_after_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("A01T.gdf");
        let corrupt = tmp.path().join("A01E.gdf");
        write_export(&good.with_extension("safetensors"), 2, 100);
        std::fs::write(corrupt.with_extension("safetensors"), b"garbage").unwrap();

        let files = vec![corrupt, good];
        let labels = classify(&files);
        let report = load_batch(&ExportReader, &files, &labels);
        assert_eq!(report.len(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures().count(), 1);

        let recs = report.into_recordings();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].split, Split::Train);
    }

    #[test]
    fn overflowing_offsets_fail_one_file_only() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("A01T.gdf");
        let bad = tmp.path().join("A02T.gdf");
        write_export(&good.with_extension("safetensors"), 2, 100);
        let header =
            br#"{"data":{"dtype":"F32","shape":[1,1],"data_offsets":[0,18446744073709551615]}}"#;
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header);
        bytes.extend_from_slice(&[0; 4]);
        std::fs::write(bad.with_extension("safetensors"), bytes).unwrap();

        let files = vec![good, bad];
        let labels = classify(&files);
        let report = load_batch(&ExportReader, &files, &labels);
        assert_eq!(report.failed(), 1);
        let (path, err) = report.failures().next().unwrap();
        assert!(path.ends_with("A02T.gdf"));
        assert!(matches!(err, LoadError::Format { .. }));
    }

    #[test]
    #[should_panic(expected = "split labels must parallel the file set")]
    fn labels_must_match_files() {
        let files = vec![PathBuf::from("A01T.gdf"), PathBuf::from("A02T.gdf")];
        let labels = classify(&files[..1]);
        load_batch(&ExportReader, &files, &labels);
    }

    #[test]
    fn strict_mode_is_all_or_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("A01T.gdf");
        write_export(&good.with_extension("safetensors"), 2, 100);
        let files = vec![good, tmp.path().join("A02T.gdf")];
        let labels = classify(&files);
        let report = load_batch(&ExportReader, &files, &labels);
        assert!(report.into_strict().is_err());
    }
}
