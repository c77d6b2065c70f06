//! Named electrode-position montages.
//!
//! `standard_1020` places the 10-20 / 10-10 electrodes on an idealised
//! spherical head of radius [`HEAD_RADIUS`] in head coordinates
//! (x → right ear, y → nasion, z → vertex):
//!
//! ```text
//! row angle a   Fp 90  AF 67.5  F 45  FC/FT 22.5  C/T 0  CP/TP −22.5  P −45  PO −67.5  O −90
//! col angle l   z 0    k → 22.5·⌈k/2⌉, negative for odd k (left hemisphere)
//!
//! θ = min(hypot(a, l), 90°)     (inclination from Cz)
//! φ = atan2(a, l)               (azimuth from the right ear)
//! pos = r · (sin θ cos φ, sin θ sin φ, cos θ)
//! ```
//!
//! The outer ring (Fpz, F7, T7, P7, Oz, …) therefore lies on the equator.
//! Lookup is case-insensitive and the legacy names T3/T4/T5/T6 resolve to
//! T7/T8/P7/P8.
use std::collections::HashMap;

use anyhow::{bail, Result};
use log::warn;

/// Head radius used for the spherical positions, in metres.
pub const HEAD_RADIUS: f64 = 0.095;

/// Row prefix → anterior/posterior angle in degrees.
const ROWS: &[(&str, f64)] = &[
    ("Fp", 90.0),
    ("AF", 67.5),
    ("F", 45.0),
    ("FC", 22.5),
    ("FT", 22.5),
    ("C", 0.0),
    ("T", 0.0),
    ("CP", -22.5),
    ("TP", -22.5),
    ("P", -45.0),
    ("PO", -67.5),
    ("O", -90.0),
];

const STANDARD_1020: &[&str] = &[
    "Fpz", "Fp1", "Fp2",
    "AFz", "AF3", "AF4", "AF7", "AF8",
    "Fz", "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8",
    "FCz", "FC1", "FC2", "FC3", "FC4", "FC5", "FC6", "FT7", "FT8",
    "Cz", "C1", "C2", "C3", "C4", "C5", "C6", "T7", "T8",
    "CPz", "CP1", "CP2", "CP3", "CP4", "CP5", "CP6", "TP7", "TP8",
    "Pz", "P1", "P2", "P3", "P4", "P5", "P6", "P7", "P8",
    "POz", "PO3", "PO4", "PO7", "PO8",
    "Oz", "O1", "O2",
];

const LEGACY_ALIASES: &[(&str, &str)] = &[("T3", "T7"), ("T4", "T8"), ("T5", "P7"), ("T6", "P8")];

/// What to do with channels a montage has no position for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    Raise,
    Warn,
    Ignore,
}

impl OnMissing {
    pub(crate) fn handle(self, montage: &str, missing: &[String]) -> Result<()> {
        if missing.is_empty() {
            return Ok(());
        }
        match self {
            OnMissing::Raise => bail!(
                "montage '{montage}' has no position for: {}",
                missing.join(", ")
            ),
            OnMissing::Warn => {
                warn!("montage '{montage}' has no position for: {}", missing.join(", "));
                Ok(())
            }
            OnMissing::Ignore => Ok(()),
        }
    }
}

/// A named set of electrode positions.
#[derive(Debug, Clone)]
pub struct Montage {
    name: String,
    ch_names: Vec<String>,
    /// Lower-cased name → position.
    positions: HashMap<String, [f64; 3]>,
}

impl Montage {
    /// Look up a built-in montage by name (case-insensitive).
    pub fn by_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "standard_1020" => Ok(Self::standard_1020()),
            other => bail!("unknown montage '{other}' (available: standard_1020)"),
        }
    }

    /// Idealised spherical 10-20 / 10-10 positions.
    pub fn standard_1020() -> Self {
        let mut positions = HashMap::new();
        let mut ch_names = Vec::with_capacity(STANDARD_1020.len());
        for &label in STANDARD_1020 {
            if let Some(pos) = grid_position(label) {
                positions.insert(label.to_ascii_lowercase(), pos);
                ch_names.push(label.to_string());
            }
        }
        for &(legacy, modern) in LEGACY_ALIASES {
            if let Some(&pos) = positions.get(&modern.to_ascii_lowercase()) {
                positions.insert(legacy.to_ascii_lowercase(), pos);
            }
        }
        Self { name: "standard_1020".into(), ch_names, positions }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical electrode names, without legacy aliases.
    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    /// Position of `ch_name` in metres, matching case-insensitively.
    pub fn position(&self, ch_name: &str) -> Option<[f64; 3]> {
        self.positions.get(&ch_name.to_ascii_lowercase()).copied()
    }
}

/// Split `"FC3"` into `("FC", Some(3))` and `"Cz"` into `("C", None)`.
fn split_label(label: &str) -> Option<(&str, Option<u32>)> {
    if let Some(row) = label.strip_suffix('z') {
        return Some((row, None));
    }
    let idx = label.find(|c: char| c.is_ascii_digit())?;
    let col = label[idx..].parse().ok()?;
    Some((&label[..idx], Some(col)))
}

fn grid_position(label: &str) -> Option<[f64; 3]> {
    let (row, col) = split_label(label)?;
    let a = ROWS.iter().find(|(r, _)| *r == row)?.1;
    let l = match col {
        None => 0.0,
        Some(k) => {
            let mag = 22.5 * k.div_ceil(2) as f64;
            if k % 2 == 1 { -mag } else { mag }
        }
    };

    let theta = a.hypot(l).min(90.0).to_radians();
    let phi = a.atan2(l);
    Some([
        HEAD_RADIUS * theta.sin() * phi.cos(),
        HEAD_RADIUS * theta.sin() * phi.sin(),
        HEAD_RADIUS * theta.cos(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cz_is_vertex() {
        let m = Montage::standard_1020();
        let cz = m.position("Cz").unwrap();
        assert_abs_diff_eq!(cz[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cz[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cz[2], HEAD_RADIUS, epsilon = 1e-12);
    }

    #[test]
    fn hemispheres_and_direction() {
        let m = Montage::standard_1020();
        assert!(m.position("C3").unwrap()[0] < 0.0);
        assert!(m.position("C4").unwrap()[0] > 0.0);
        assert!(m.position("Fz").unwrap()[1] > 0.0);
        assert!(m.position("POz").unwrap()[1] < 0.0);
        let t7 = m.position("T7").unwrap();
        assert_abs_diff_eq!(t7[0], -HEAD_RADIUS, epsilon = 1e-12);
        assert_abs_diff_eq!(t7[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn all_positions_on_sphere() {
        let m = Montage::standard_1020();
        assert_eq!(m.ch_names().len(), STANDARD_1020.len());
        for name in m.ch_names() {
            let p = m.position(name).unwrap();
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert_abs_diff_eq!(r, HEAD_RADIUS, epsilon = 1e-12);
            assert!(p[2] >= -1e-12, "{name} below the equator");
        }
    }

    #[test]
    fn case_insensitive_and_legacy_names() {
        let m = Montage::by_name("Standard_1020").unwrap();
        assert_eq!(m.position("fcz"), m.position("FCz"));
        assert_eq!(m.position("T3"), m.position("T7"));
        assert!(m.position("EOG-left").is_none());
    }

    #[test]
    fn unknown_montage() {
        assert!(Montage::by_name("biosemi64").is_err());
    }

    #[test]
    fn on_missing_policies() {
        let missing = vec!["X1".to_string()];
        assert!(OnMissing::Raise.handle("m", &missing).is_err());
        assert!(OnMissing::Warn.handle("m", &missing).is_ok());
        assert!(OnMissing::Ignore.handle("m", &missing).is_ok());
        assert!(OnMissing::Raise.handle("m", &[]).is_ok());
    }
}
