//! Channel normalisation for BCI Competition IV-2a recordings.
//!
//! The GDF files name their 22 EEG electrodes `EEG-Fz`, `EEG-0` … `EEG-16`
//! and their three ocular channels `EOG-left`, `EOG-central`, `EOG-right`.
//! [`ChannelNormalizer::bci_iv_2a`] maps them onto 10-20 names, marks the
//! ocular channels as EOG and attaches the `standard_1020` montage.
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::debug;

use crate::loader::LoadedRecording;
use crate::montage::{Montage, OnMissing};
use crate::recording::{ChannelKind, Recording};

/// IV-2a source name → 10-20 name.
const BCI_IV_2A_RENAME: &[(&str, &str)] = &[
    ("EEG-Fz", "Fz"),
    ("EEG-0", "FC3"),
    ("EEG-1", "FC1"),
    ("EEG-2", "FCz"),
    ("EEG-3", "FC2"),
    ("EEG-4", "FC4"),
    ("EEG-5", "C5"),
    ("EEG-C3", "C3"),
    ("EEG-6", "C1"),
    ("EEG-Cz", "Cz"),
    ("EEG-7", "C2"),
    ("EEG-C4", "C4"),
    ("EEG-8", "C6"),
    ("EEG-9", "CP3"),
    ("EEG-10", "CP1"),
    ("EEG-11", "CPz"),
    ("EEG-12", "CP2"),
    ("EEG-13", "CP4"),
    ("EEG-14", "P1"),
    ("EEG-Pz", "Pz"),
    ("EEG-15", "P2"),
    ("EEG-16", "POz"),
];

/// Ocular channels, named identically before and after renaming.
pub const EOG_CHANNELS: [&str; 3] = ["EOG-left", "EOG-central", "EOG-right"];

/// Fixed rename table, type table and montage applied to every recording.
#[derive(Debug, Clone)]
pub struct ChannelNormalizer {
    pub rename: BTreeMap<String, String>,
    pub types: BTreeMap<String, ChannelKind>,
    pub montage: Montage,
}

impl ChannelNormalizer {
    /// Tables for BCI Competition IV-2a with the given montage name.
    pub fn bci_iv_2a(montage: &str) -> Result<Self> {
        let rename = BCI_IV_2A_RENAME
            .iter()
            .map(|&(from, to)| (from.to_string(), to.to_string()))
            .collect();
        let types = EOG_CHANNELS
            .iter()
            .map(|&name| (name.to_string(), ChannelKind::Eog))
            .collect();
        Ok(Self { rename, types, montage: Montage::by_name(montage)? })
    }

    /// Rename, retype and position the channels of one recording in place.
    ///
    /// A channel named in the type table but absent from the recording is an
    /// error; channels the montage does not know are skipped.
    pub fn apply(&self, raw: &mut Recording) -> Result<()> {
        raw.rename_channels(&self.rename)?;
        raw.set_channel_types(&self.types)?;
        raw.set_montage(&self.montage, OnMissing::Ignore)?;
        Ok(())
    }

    /// Normalise every loaded recording, in order.
    pub fn apply_all(&self, recordings: &mut [LoadedRecording]) -> Result<()> {
        for rec in recordings.iter_mut() {
            self.apply(&mut rec.raw)
                .with_context(|| format!("normalising channels of {}", rec.path.display()))?;
        }
        debug!("normalised channels of {} recording(s)", recordings.len());
        Ok(())
    }
}
