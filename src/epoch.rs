//! Event-locked epoching.
//!
//! For every selected event a window `[tmin, tmax]` (both ends included) is
//! cut from the continuous signal.  Windows that leave the recording are
//! dropped, as are windows overlapping a `BAD` annotation when
//! `reject_by_annotation` is set.  The per-channel mean of the baseline
//! window is then subtracted from each epoch.
use std::collections::BTreeSet;

use anyhow::{bail, Result};
use log::{debug, warn};
use ndarray::{s, Array3, Axis};

use crate::config::PreprocConfig;
use crate::events::{Event, EventId};
use crate::loader::LoadedRecording;
use crate::recording::ChannelKind;

/// Why an event produced no epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    OutOfBounds,
    BadAnnotation,
}

/// Epochs cut from one or more recordings.
#[derive(Debug, Clone)]
pub struct Epochs {
    /// `[E, C, T]`, volts.
    pub data: Array3<f64>,
    /// One event per epoch.
    pub events: Vec<Event>,
    pub event_id: EventId,
    pub ch_names: Vec<String>,
    pub sfreq: f64,
    /// Time of the first sample of each epoch relative to its event.
    pub tmin: f64,
    /// Events that produced no epoch.
    pub dropped: Vec<(Event, DropReason)>,
}

impl Epochs {
    /// Cut epochs from a loaded recording according to `cfg`.
    pub fn from_loaded(rec: &LoadedRecording, cfg: &PreprocConfig) -> Result<Self> {
        let raw = &rec.raw;
        let sfreq = raw.sfreq;

        let (event_id, selected) = select_events(rec, cfg);

        let picks: Vec<usize> = match &cfg.picks {
            Some(names) => {
                let mut idx = Vec::with_capacity(names.len());
                for name in names {
                    match raw.channel_index(name) {
                        Some(i) => idx.push(i),
                        None => bail!("pick '{name}' not found in {}", rec.path.display()),
                    }
                }
                idx
            }
            None => raw.indices_of_kind(ChannelKind::Eeg),
        };
        if picks.is_empty() {
            bail!("no channels picked from {}", rec.path.display());
        }

        let offset = (cfg.tmin * sfreq).round() as i64;
        let n_t = cfg.epoch_samples(sfreq);
        let bad: Vec<_> = raw.annotations.iter().filter(|a| a.is_bad()).collect();

        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        for ev in selected {
            let start = ev.sample - raw.first_samp + offset;
            if start < 0 || start as usize + n_t > raw.n_times() {
                dropped.push((ev, DropReason::OutOfBounds));
                continue;
            }
            let t0 = start as f64 / sfreq;
            let t1 = (start as usize + n_t - 1) as f64 / sfreq;
            if cfg.reject_by_annotation && bad.iter().any(|a| a.overlaps(t0, t1)) {
                dropped.push((ev, DropReason::BadAnnotation));
                continue;
            }
            kept.push((ev, start as usize));
        }

        let mut data = Array3::<f64>::zeros((kept.len(), picks.len(), n_t));
        for (e, &(_, start)) in kept.iter().enumerate() {
            for (c, &ch) in picks.iter().enumerate() {
                data.slice_mut(s![e, c, ..])
                    .assign(&raw.data.slice(s![ch, start..start + n_t]));
            }
        }

        if let Some(range) = baseline_range(cfg, sfreq, n_t) {
            baseline_correct_inplace(&mut data, range);
        }

        debug!(
            "{}: {} epoch(s), {} dropped",
            rec.path.display(),
            kept.len(),
            dropped.len()
        );
        Ok(Self {
            data,
            events: kept.into_iter().map(|(ev, _)| ev).collect(),
            event_id,
            ch_names: picks.iter().map(|&i| raw.channels[i].name.clone()).collect(),
            sfreq,
            tmin: offset as f64 / sfreq,
            dropped,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.shape()[2]
    }

    /// Event code of each epoch.
    pub fn labels(&self) -> Vec<i32> {
        self.events.iter().map(|e| e.code).collect()
    }

    /// Distinct codes of `event_id`, ascending.
    pub fn classes(&self) -> Vec<i32> {
        self.event_id.values().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// Stack epochs from several recordings.
    ///
    /// All parts must share channel names, sampling rate and epoch length.
    /// The label mappings are merged; a label bound to two different codes
    /// is an error.
    pub fn concatenate(parts: &[Epochs]) -> Result<Epochs> {
        let Some(first) = parts.first() else {
            bail!("nothing to concatenate");
        };
        let mut event_id = first.event_id.clone();
        for p in &parts[1..] {
            if p.ch_names != first.ch_names {
                bail!("channel mismatch: {:?} vs {:?}", p.ch_names, first.ch_names);
            }
            if (p.sfreq - first.sfreq).abs() > 1e-9 || p.n_times() != first.n_times() {
                bail!(
                    "epoch layout mismatch: {} samples @ {} Hz vs {} samples @ {} Hz",
                    p.n_times(),
                    p.sfreq,
                    first.n_times(),
                    first.sfreq
                );
            }
            for (label, &code) in &p.event_id {
                match event_id.get(label) {
                    Some(&existing) if existing != code => {
                        bail!("label '{label}' maps to both {existing} and {code}")
                    }
                    Some(_) => {}
                    None => {
                        event_id.insert(label.clone(), code);
                    }
                }
            }
        }

        let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
        let data = ndarray::concatenate(Axis(0), &views)?;
        Ok(Epochs {
            data,
            events: parts.iter().flat_map(|p| p.events.iter().copied()).collect(),
            event_id,
            ch_names: first.ch_names.clone(),
            sfreq: first.sfreq,
            tmin: first.tmin,
            dropped: parts.iter().flat_map(|p| p.dropped.iter().copied()).collect(),
        })
    }
}

fn select_events(rec: &LoadedRecording, cfg: &PreprocConfig) -> (EventId, Vec<Event>) {
    let Some(map) = &cfg.event_id_map else {
        return (rec.event_id.clone(), rec.events.clone());
    };
    let codes: BTreeSet<i32> = map.values().copied().collect();
    let present: BTreeSet<i32> = rec.events.iter().map(|e| e.code).collect();
    for (label, code) in map {
        if !present.contains(code) {
            warn!("{}: no events for '{label}' (code {code})", rec.path.display());
        }
    }
    let selected = rec.events.iter().copied().filter(|e| codes.contains(&e.code)).collect();
    (map.clone(), selected)
}

/// Inclusive sample range of the baseline window within an epoch.
fn baseline_range(cfg: &PreprocConfig, sfreq: f64, n_t: usize) -> Option<(usize, usize)> {
    let (start, end) = cfg.baseline?;
    let offset = (cfg.tmin * sfreq).round() as i64;
    let to_idx = |t: f64| -> usize {
        ((t * sfreq).round() as i64 - offset).clamp(0, n_t as i64 - 1) as usize
    };
    let i0 = start.map_or(0, to_idx);
    let i1 = end.map_or(n_t - 1, to_idx);
    Some((i0, i1))
}

/// Subtract, per epoch and channel, the mean over samples `range.0..=range.1`.
pub fn baseline_correct_inplace(epochs: &mut Array3<f64>, range: (usize, usize)) {
    let (i0, i1) = range;
    for mut epoch in epochs.outer_iter_mut() {
        for mut row in epoch.outer_iter_mut() {
            let m = row.slice(s![i0..=i1]).mean().unwrap_or(0.0);
            row.mapv_inplace(|v| v - m);
        }
    }
}
