//! Dataset output.
//!
//! Each split is written to `<out_dir>/<split>.<ext>` with the arrays
//!
//! ```text
//! X          [N, C, T]        float32 | float64
//! y          [N] int32        event codes, or
//!            [N, K] float     one-hot over `classes`
//! classes    [K] int32        ascending event codes
//! ch_names   [C]              channel names
//! sfreq      scalar float64
//! ```
//!
//! plus the normalisation strategy and precision tags.  The signal is
//! stored as epoched; the normalisation tag tells the consumer which
//! normalisation to apply.
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use ndarray::Array2;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::config::{Precision, SaveConfig, SaveFormat};
use crate::epoch::Epochs;
use crate::io::StWriter;
use crate::split::Split;

/// Write `epochs` as the `split` part of the dataset.  Returns the file path.
pub fn save_dataset(epochs: &Epochs, split: Split, cfg: &SaveConfig) -> Result<PathBuf> {
    std::fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("creating {}", cfg.out_dir.display()))?;
    let path = cfg.out_dir.join(format!("{split}.{}", cfg.format.extension()));

    let classes = epochs.classes();
    let labels = epochs.labels();
    let x: Vec<f64> = epochs.data.iter().copied().collect();
    let x_shape = epochs.data.shape().to_vec();

    match cfg.format {
        SaveFormat::Safetensors => {
            let mut w = StWriter::new();
            match cfg.dtype {
                Precision::Float32 => w.add_f32("X", &to_f32(&x), &x_shape),
                Precision::Float64 => w.add_f64("X", &x, &x_shape),
            }
            if cfg.one_hot {
                let y = one_hot(&labels, &classes);
                let y_flat: Vec<f64> = y.iter().copied().collect();
                match cfg.dtype {
                    Precision::Float32 => w.add_f32("y", &to_f32(&y_flat), y.shape()),
                    Precision::Float64 => w.add_f64("y", &y_flat, y.shape()),
                }
            } else {
                w.add_i32("y", &labels, &[labels.len()]);
            }
            w.add_i32("classes", &classes, &[classes.len()]);
            w.add_text("ch_names", &epochs.ch_names);
            w.add_f64("sfreq", &[epochs.sfreq], &[1]);
            w.set_metadata("split", split.as_str());
            w.set_metadata("normalize", cfg.normalize.as_str());
            w.set_metadata("dtype", cfg.dtype.as_str());
            w.write(&path)?;
        }
        SaveFormat::Npz => {
            let mut w = NpzWriter::create(&path)?;
            match cfg.dtype {
                Precision::Float32 => w.add_f32("X", &to_f32(&x), &x_shape)?,
                Precision::Float64 => w.add_f64("X", &x, &x_shape)?,
            }
            if cfg.one_hot {
                let y = one_hot(&labels, &classes);
                let y_flat: Vec<f64> = y.iter().copied().collect();
                match cfg.dtype {
                    Precision::Float32 => w.add_f32("y", &to_f32(&y_flat), y.shape())?,
                    Precision::Float64 => w.add_f64("y", &y_flat, y.shape())?,
                }
            } else {
                w.add_i32("y", &labels, &[labels.len()])?;
            }
            w.add_i32("classes", &classes, &[classes.len()])?;
            w.add_strings("ch_names", &epochs.ch_names)?;
            w.add_f64("sfreq", &[epochs.sfreq], &[])?;
            w.add_string("split", split.as_str())?;
            w.add_string("normalize", cfg.normalize.as_str())?;
            w.add_string("dtype", cfg.dtype.as_str())?;
            w.finish()?;
        }
    }

    info!("{split}: wrote {} epoch(s) to {}", epochs.len(), path.display());
    Ok(path)
}

fn to_f32(v: &[f64]) -> Vec<f32> {
    v.iter().map(|&x| x as f32).collect()
}

/// `[N, K]` one-hot matrix; labels absent from `classes` get an all-zero row.
pub fn one_hot(labels: &[i32], classes: &[i32]) -> Array2<f64> {
    let mut out = Array2::zeros((labels.len(), classes.len()));
    for (i, label) in labels.iter().enumerate() {
        if let Some(k) = classes.iter().position(|c| c == label) {
            out[[i, k]] = 1.0;
        }
    }
    out
}

// ── NumPy .npz ────────────────────────────────────────────────────────────────

/// Writes an uncompressed `.npz` archive: one NPY v1.0 member per array.
pub struct NpzWriter {
    zip: ZipWriter<File>,
    options: SimpleFileOptions,
}

impl NpzWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self {
            zip: ZipWriter::new(file),
            options: SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored),
        })
    }

    fn add_raw(&mut self, name: &str, descr: &str, shape: &[usize], data: &[u8]) -> Result<()> {
        self.zip
            .start_file(format!("{name}.npy"), self.options)
            .with_context(|| format!("starting npz member '{name}'"))?;
        self.zip.write_all(&npy_header(descr, shape))?;
        self.zip.write_all(data)?;
        Ok(())
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) -> Result<()> {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_raw(name, "<f4", shape, &bytes)
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) -> Result<()> {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_raw(name, "<f8", shape, &bytes)
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) -> Result<()> {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_raw(name, "<i4", shape, &bytes)
    }

    /// 1-D fixed-width unicode array (`<U{n}`, UTF-32 little-endian).
    pub fn add_strings<S: AsRef<str>>(&mut self, name: &str, values: &[S]) -> Result<()> {
        let width = values
            .iter()
            .map(|s| s.as_ref().chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        let mut bytes = Vec::with_capacity(values.len() * width * 4);
        for s in values {
            let mut n = 0;
            for ch in s.as_ref().chars() {
                bytes.extend_from_slice(&(ch as u32).to_le_bytes());
                n += 1;
            }
            bytes.resize(bytes.len() + (width - n) * 4, 0);
        }
        self.add_raw(name, &format!("<U{width}"), &[values.len()], &bytes)
    }

    /// 0-d unicode scalar.
    pub fn add_string(&mut self, name: &str, value: &str) -> Result<()> {
        let width = value.chars().count().max(1);
        let mut bytes: Vec<u8> = value.chars().flat_map(|c| (c as u32).to_le_bytes()).collect();
        bytes.resize(width * 4, 0);
        self.add_raw(name, &format!("<U{width}"), &[], &bytes)
    }

    pub fn finish(self) -> Result<()> {
        self.zip.finish().context("finalising npz archive")?;
        Ok(())
    }
}

/// NPY v1.0 header; magic + version + length + dict is padded to 64 bytes.
fn npy_header(descr: &str, shape: &[usize]) -> Vec<u8> {
    let shape_str = match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut dict = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape_str}, }}");
    let unpadded = 10 + dict.len() + 1;
    dict.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    dict.push('\n');

    let mut out = Vec::with_capacity(10 + dict.len());
    out.extend_from_slice(b"\x93NUMPY");
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npy_header_alignment_and_shape() {
        for shape in [&[][..], &[5][..], &[3, 22, 251][..]] {
            let h = npy_header("<f4", shape);
            assert_eq!(h.len() % 64, 0);
            assert_eq!(&h[..6], b"\x93NUMPY");
            assert_eq!(*h.last().unwrap(), b'\n');
        }
        let h = String::from_utf8_lossy(&npy_header("<i4", &[7])).to_string();
        assert!(h.contains("'shape': (7,)"));
        let h = String::from_utf8_lossy(&npy_header("<f8", &[2, 3])).to_string();
        assert!(h.contains("'shape': (2, 3)"));
    }

    #[test]
    fn one_hot_rows() {
        let y = one_hot(&[7, 9, 8, 7], &[7, 8, 9]);
        assert_eq!(y.dim(), (4, 3));
        assert_eq!(y.row(1).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(y.sum(), 4.0);
        assert_eq!(one_hot(&[1], &[2]).sum(), 0.0);
    }
}
