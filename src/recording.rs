//! In-memory continuous recording.
//!
//! A [`Recording`] is fully materialised: the whole `[C, T]` signal is
//! resident, in volts.  Channel edits (rename, retype, positions) mutate the
//! recording in place.
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use anyhow::{bail, Result};
use log::debug;
use ndarray::Array2;

use crate::events::Annotation;
use crate::montage::{Montage, OnMissing};
use crate::resample;

/// Signal type of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Eeg,
    Eog,
    Stim,
    Misc,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Eeg => "eeg",
            ChannelKind::Eog => "eog",
            ChannelKind::Stim => "stim",
            ChannelKind::Misc => "misc",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-channel metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub kind: ChannelKind,
    /// Electrode position in head coordinates (metres), once a montage is set.
    pub pos: Option<[f64; 3]>,
}

impl Channel {
    /// A channel of the default type (EEG) with no position.
    pub fn eeg(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ChannelKind::Eeg, pos: None }
    }
}

/// A loaded continuous recording.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Signal, shape `[C, T]`, volts.
    pub data: Array2<f64>,
    /// Sampling rate in Hz.
    pub sfreq: f64,
    /// Index of the first sample in acquisition time.
    pub first_samp: i64,
    /// One entry per row of `data`.
    pub channels: Vec<Channel>,
    pub annotations: Vec<Annotation>,
    /// Name of the attached montage, if any.
    pub montage: Option<String>,
}

impl Recording {
    /// Build a recording, checking that `channels` matches the rows of `data`.
    pub fn new(data: Array2<f64>, sfreq: f64, channels: Vec<Channel>) -> Result<Self> {
        if channels.len() != data.nrows() {
            bail!(
                "{} channel names for {} signal rows",
                channels.len(),
                data.nrows()
            );
        }
        if !(sfreq > 0.0) {
            bail!("sampling rate must be positive, got {sfreq}");
        }
        Ok(Self {
            data,
            sfreq,
            first_samp: 0,
            channels,
            annotations: Vec::new(),
            montage: None,
        })
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    pub fn ch_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// Indices of channels of `kind`, in channel order.
    pub fn indices_of_kind(&self, kind: ChannelKind) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    /// Rename channels through `mapping`; names not in the mapping are kept.
    ///
    /// Fails without modifying anything if the result would contain
    /// duplicate names.
    pub fn rename_channels(&mut self, mapping: &BTreeMap<String, String>) -> Result<()> {
        let renamed: Vec<String> = self
            .channels
            .iter()
            .map(|c| mapping.get(&c.name).cloned().unwrap_or_else(|| c.name.clone()))
            .collect();

        let mut seen = HashSet::new();
        for name in &renamed {
            if !seen.insert(name.as_str()) {
                bail!("renaming would create duplicate channel '{name}'");
            }
        }
        for (ch, name) in self.channels.iter_mut().zip(renamed) {
            ch.name = name;
        }
        Ok(())
    }

    /// Set the signal type of named channels.  Every name must exist.
    pub fn set_channel_types(&mut self, types: &BTreeMap<String, ChannelKind>) -> Result<()> {
        let missing: Vec<&str> = types
            .keys()
            .filter(|name| self.channel_index(name).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            bail!("cannot set channel types, channels not found: {}", missing.join(", "));
        }
        for (name, &kind) in types {
            if let Some(idx) = self.channel_index(name) {
                self.channels[idx].kind = kind;
            }
        }
        Ok(())
    }

    /// Attach electrode positions from `montage` to the EEG channels.
    ///
    /// Non-EEG channels never receive a position.  EEG channels the montage
    /// does not know are handled according to `on_missing`.
    pub fn set_montage(&mut self, montage: &Montage, on_missing: OnMissing) -> Result<()> {
        let mut missing = Vec::new();
        let mut positions = Vec::with_capacity(self.channels.len());
        for ch in &self.channels {
            if ch.kind != ChannelKind::Eeg {
                positions.push(None);
                continue;
            }
            let pos = montage.position(&ch.name);
            if pos.is_none() {
                missing.push(ch.name.clone());
            }
            positions.push(pos);
        }
        on_missing.handle(montage.name(), &missing)?;

        for (ch, pos) in self.channels.iter_mut().zip(positions) {
            ch.pos = pos;
        }
        self.montage = Some(montage.name().to_string());
        Ok(())
    }

    /// Resample to `target_hz` in place.
    ///
    /// Annotation onsets are in seconds and need no change; `first_samp`
    /// is rescaled to the new rate.
    pub fn resample(&mut self, target_hz: f64) -> Result<()> {
        if (self.sfreq - target_hz).abs() < 1e-6 {
            return Ok(());
        }
        debug!("resampling {} Hz -> {} Hz", self.sfreq, target_hz);
        self.data = resample::resample(&self.data, self.sfreq, target_hz)?;
        self.first_samp = (self.first_samp as f64 * target_hz / self.sfreq).round() as i64;
        self.sfreq = target_hz;
        Ok(())
    }
}
