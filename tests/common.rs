//! Shared helpers: synthetic IV-2a exports written into temp directories.
use std::path::{Path, PathBuf};

use bciprep::StWriter;

/// IV-2a channel names as stored in the GDF files.
pub const IV2A_CHANNELS: [&str; 25] = [
    "EEG-Fz", "EEG-0", "EEG-1", "EEG-2", "EEG-3", "EEG-4", "EEG-5", "EEG-C3", "EEG-6",
    "EEG-Cz", "EEG-7", "EEG-C4", "EEG-8", "EEG-9", "EEG-10", "EEG-11", "EEG-12", "EEG-13",
    "EEG-14", "EEG-Pz", "EEG-15", "EEG-16", "EOG-left", "EOG-central", "EOG-right",
];

pub const SFREQ: f64 = 250.0;

#[allow(unused)]
/// Write `<dir>/<name>.gdf` (empty placeholder) and its safetensors export:
/// 25 channels, `secs` seconds, one cue every 2 s alternating 769/770, each
/// preceded by a 768 trial-start marker.
pub fn write_recording(dir: &Path, name: &str, secs: usize) -> PathBuf {
    let gdf = dir.join(format!("{name}.gdf"));
    std::fs::write(&gdf, b"").unwrap();

    let n_t = secs * SFREQ as usize;
    let data: Vec<f32> = (0..IV2A_CHANNELS.len() * n_t)
        .map(|i| {
            let (c, t) = (i / n_t, i % n_t);
            ((t as f32 * 0.05 + c as f32).sin() * 20e-6) + c as f32 * 1e-6
        })
        .collect();

    let mut onsets = Vec::new();
    let mut descriptions = Vec::new();
    let mut cue = 0;
    let mut t = 1.0;
    while t + 1.0 < secs as f64 {
        onsets.push(t - 0.5);
        descriptions.push("768".to_string());
        onsets.push(t);
        descriptions.push(if cue % 2 == 0 { "769" } else { "770" }.to_string());
        cue += 1;
        t += 2.0;
    }

    let mut w = StWriter::new();
    w.add_f32("data", &data, &[IV2A_CHANNELS.len(), n_t]);
    w.add_f64("sfreq", &[SFREQ], &[1]);
    w.add_text("ch_names", &IV2A_CHANNELS);
    w.add_f64("annot_onset", &onsets, &[onsets.len()]);
    w.add_f64("annot_duration", &vec![0.0; onsets.len()], &[onsets.len()]);
    w.add_text("annot_description", &descriptions);
    w.write(&gdf.with_extension("safetensors")).unwrap();
    gdf
}

#[allow(unused)]
/// A `.gdf` whose export is not a valid safetensors file.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let gdf = dir.join(format!("{name}.gdf"));
    std::fs::write(&gdf, b"").unwrap();
    std::fs::write(gdf.with_extension("safetensors"), b"\x10\x00\x00\x00\x00\x00\x00\x00{not json").unwrap();
    gdf
}
