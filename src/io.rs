//! Safetensors container I/O.
//!
//! Layout: `u64` little-endian header length, a JSON header mapping tensor
//! names to `{dtype, shape, data_offsets}` (plus an optional
//! `__metadata__` string map), then the raw little-endian tensor bytes.
//!
//! [`SafeTensors`] reads a file into memory and decodes tensors on demand;
//! [`StWriter`] builds one.  Text lists are stored as `U8` tensors holding
//! newline-joined UTF-8.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

// ── Reader ────────────────────────────────────────────────────────────────────

/// An in-memory safetensors file.
pub struct SafeTensors {
    bytes: Vec<u8>,
    header: serde_json::Map<String, Value>,
    data_start: usize,
}

/// Header entry of one tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub dtype: String,
    pub shape: Vec<usize>,
    pub start: usize,
    pub end: usize,
}

impl SafeTensors {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 8 {
            bail!("safetensors file too small ({} bytes)", bytes.len());
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len) as usize;
        let header_end = 8usize
            .checked_add(n)
            .filter(|&end| end <= bytes.len())
            .with_context(|| format!("header length {n} exceeds file size {}", bytes.len()))?;
        let header: serde_json::Map<String, Value> =
            serde_json::from_slice(&bytes[8..header_end]).context("failed to parse safetensors header")?;
        Ok(Self { bytes, header, data_start: header_end })
    }

    /// Tensor names, excluding `__metadata__`.
    pub fn names(&self) -> Vec<&str> {
        self.header
            .keys()
            .filter(|k| k.as_str() != "__metadata__")
            .map(String::as_str)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        name != "__metadata__" && self.header.contains_key(name)
    }

    /// String metadata stored under `__metadata__`.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.header
            .get("__metadata__")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn info(&self, name: &str) -> Result<TensorInfo> {
        let entry = self
            .header
            .get(name)
            .filter(|_| name != "__metadata__")
            .with_context(|| format!("missing '{name}' tensor"))?;
        let dtype = entry["dtype"]
            .as_str()
            .with_context(|| format!("'{name}': missing dtype"))?
            .to_string();
        let shape = entry["shape"]
            .as_array()
            .with_context(|| format!("'{name}': missing shape"))?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize))
            .collect::<Option<Vec<_>>>()
            .with_context(|| format!("'{name}': non-integer shape"))?;
        let offsets = entry["data_offsets"]
            .as_array()
            .filter(|o| o.len() == 2)
            .with_context(|| format!("'{name}': missing data_offsets"))?;
        let start = offsets[0].as_u64().with_context(|| format!("'{name}': bad offset"))? as usize;
        let end = offsets[1].as_u64().with_context(|| format!("'{name}': bad offset"))? as usize;
        let in_bounds = self
            .data_start
            .checked_add(end)
            .is_some_and(|e| e <= self.bytes.len());
        if start > end || !in_bounds {
            bail!("'{name}': data_offsets [{start}, {end}] out of bounds");
        }
        Ok(TensorInfo { dtype, shape, start, end })
    }

    fn raw(&self, info: &TensorInfo) -> &[u8] {
        &self.bytes[self.data_start + info.start..self.data_start + info.end]
    }

    /// Decode a floating-point tensor (F32 or F64) to `f64`, with its shape.
    pub fn f64_values(&self, name: &str) -> Result<(Vec<f64>, Vec<usize>)> {
        let info = self.info(name)?;
        let raw = self.raw(&info);
        let values: Vec<f64> = match info.dtype.as_str() {
            "F32" => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "F64" => raw
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            other => bail!("'{name}': expected F32 or F64, found {other}"),
        };
        check_len(name, &info.shape, values.len())?;
        Ok((values, info.shape))
    }

    /// Decode an integer tensor (I32 or I64) to `i64`.
    pub fn i64_values(&self, name: &str) -> Result<(Vec<i64>, Vec<usize>)> {
        let info = self.info(name)?;
        let raw = self.raw(&info);
        let values: Vec<i64> = match info.dtype.as_str() {
            "I32" => raw
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
                .collect(),
            "I64" => raw
                .chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            other => bail!("'{name}': expected I32 or I64, found {other}"),
        };
        check_len(name, &info.shape, values.len())?;
        Ok((values, info.shape))
    }

    /// Decode a `U8` tensor holding newline-joined UTF-8 lines.
    pub fn text_lines(&self, name: &str) -> Result<Vec<String>> {
        let info = self.info(name)?;
        if info.dtype != "U8" {
            bail!("'{name}': expected U8 text, found {}", info.dtype);
        }
        let text = std::str::from_utf8(self.raw(&info))
            .with_context(|| format!("'{name}': not UTF-8"))?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }
}

fn check_len(name: &str, shape: &[usize], n: usize) -> Result<()> {
    let expected: usize = shape.iter().product();
    if expected != n {
        bail!("'{name}': shape {shape:?} needs {expected} values, found {n}");
    }
    Ok(())
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Safetensors writer for F32, F64, I32, I64 and text tensors.
///
/// ```rust,no_run
/// use bciprep::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("data", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_text("ch_names", &["Cz"]);
/// w.write(Path::new("/tmp/rec.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: BTreeMap<String, String>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I64", shape.to_vec()));
    }

    /// Store `lines` newline-joined as a `U8` tensor.
    pub fn add_text<S: AsRef<str>>(&mut self, name: &str, lines: &[S]) {
        let joined = lines.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join("\n");
        let bytes = joined.into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::to_value(&self.metadata)?);
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;

        let mut out = Vec::with_capacity(8 + hdr_bytes.len() + pad + offset);
        out.extend_from_slice(&((hdr_bytes.len() + pad) as u64).to_le_bytes());
        out.extend_from_slice(&hdr_bytes);
        out.extend(std::iter::repeat(b' ').take(pad));
        for (_, data, _, _) in &self.entries {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_tensors_and_metadata() {
        let mut w = StWriter::new();
        w.add_f32("a", &[1.5, -2.0], &[2]);
        w.add_i64("n", &[7], &[1]);
        w.add_text("names", &["Fz", "Cz"]);
        w.set_metadata("normalize", "none");
        let st = SafeTensors::from_bytes(w.to_bytes().unwrap()).unwrap();

        let (a, shape) = st.f64_values("a").unwrap();
        assert_eq!(a, vec![1.5, -2.0]);
        assert_eq!(shape, vec![2]);
        assert_eq!(st.i64_values("n").unwrap().0, vec![7]);
        assert_eq!(st.text_lines("names").unwrap(), vec!["Fz", "Cz"]);
        assert_eq!(st.metadata()["normalize"], "none");
        assert!(!st.contains("__metadata__"));
        assert_eq!(st.names().len(), 3);
    }

    #[test]
    fn header_is_eight_byte_aligned() {
        let mut w = StWriter::new();
        w.add_f64("x", &[0.0], &[1]);
        let bytes = w.to_bytes().unwrap();
        let n = u64::from_le_bytes(bytes[..8].try_into().unwrap());
        assert_eq!(n % 8, 0);
    }

    #[test]
    fn wrong_dtype_is_error() {
        let mut w = StWriter::new();
        w.add_i32("x", &[1], &[1]);
        let st = SafeTensors::from_bytes(w.to_bytes().unwrap()).unwrap();
        assert!(st.f64_values("x").is_err());
        assert!(st.f64_values("missing").is_err());
    }

    #[test]
    fn truncated_file_is_error() {
        assert!(SafeTensors::from_bytes(vec![1, 2, 3]).is_err());
        let mut bytes = 1000u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(SafeTensors::from_bytes(bytes).is_err());
    }

    #[test]
    fn huge_data_offsets_are_error() {
        let header = br#"{"x":{"dtype":"F32","shape":[1],"data_offsets":[0,18446744073709551615]}}"#;
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header);
        bytes.extend_from_slice(&[0; 4]);
        let st = SafeTensors::from_bytes(bytes).unwrap();
        assert!(st.info("x").is_err());
        assert!(st.f64_values("x").is_err());
    }
}
