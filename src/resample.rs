//! FFT resampling, following MNE's `resample(..., method='fft')`.
//!
//! Per channel:
//!   1. Reflect-limited padding up to the next power of two ([`auto_npad`]).
//!   2. Forward FFT of the padded signal, keep the half-spectrum.
//!   3. Nyquist bin ×2 when downsampling, ×0.5 when upsampling (even lengths).
//!   4. Scale by `new_len / old_len`, truncate or zero-pad the spectrum.
//!   5. Inverse FFT and strip the resampled padding.
//!
//! Output length is `round(n · dst / src)`.
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Padding added on each side, as MNE's `npad='auto'`.
///
/// ```text
/// min_add = min(n // 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// ```
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let total = (n + min_add).next_power_of_two() - n;
    (total / 2, total - total / 2)
}

/// Output length after resampling `n` samples by `ratio = dst / src`.
pub fn final_length(n: usize, ratio: f64) -> usize {
    (ratio * n as f64).round() as usize
}

/// Resample `data` (`[C, T]`) from `src_sfreq` to `dst_sfreq`.
pub fn resample(data: &Array2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array2<f64>> {
    if !(src_sfreq > 0.0 && dst_sfreq > 0.0) {
        bail!("sampling rates must be positive ({src_sfreq} -> {dst_sfreq})");
    }
    if (src_sfreq - dst_sfreq).abs() < 1e-9 {
        return Ok(data.clone());
    }
    let ratio = dst_sfreq / src_sfreq;
    let (n_ch, n_in) = data.dim();
    let (npad_l, npad_r) = auto_npad(n_in);

    let mut planner = FftPlanner::<f64>::new();
    let mut out = Array2::<f64>::zeros((n_ch, final_length(n_in, ratio)));
    for ch in 0..n_ch {
        let row = data.row(ch).to_vec();
        let resampled = resample_1d(&mut planner, &row, ratio, npad_l, npad_r);
        out.row_mut(ch).assign(&ArrayView1::from(&resampled));
    }
    Ok(out)
}

/// Resample one signal by `ratio` with explicit (possibly asymmetric) padding.
pub fn resample_1d(
    planner: &mut FftPlanner<f64>,
    x: &[f64],
    ratio: f64,
    npad_l: usize,
    npad_r: usize,
) -> Vec<f64> {
    let n_in = x.len();
    if n_in == 0 {
        return vec![];
    }
    let final_len = final_length(n_in, ratio);

    // Padding beyond n_in - 1 is clamped rather than zero-filled.
    let pad_l = npad_l.min(n_in - 1);
    let pad_r = npad_r.min(n_in - 1);
    let old_len = n_in + pad_l + pad_r;

    let first = x[0];
    let last = x[n_in - 1];
    let mut buf: Vec<Complex<f64>> = Vec::with_capacity(old_len);
    buf.extend((1..=pad_l).rev().map(|i| Complex::new(2.0 * first - x[i], 0.0)));
    buf.extend(x.iter().map(|&v| Complex::new(v, 0.0)));
    buf.extend((1..=pad_r).map(|i| Complex::new(2.0 * last - x[n_in - 1 - i], 0.0)));

    planner.plan_fft_forward(old_len).process(&mut buf);

    let new_len = final_length(old_len, ratio).max(1);
    let shorter = new_len < old_len;
    let use_len = if shorter { new_len } else { old_len };

    let mut half: Vec<Complex<f64>> = buf[..old_len / 2 + 1].to_vec();
    if use_len % 2 == 0 {
        let nyq = use_len / 2;
        if nyq < half.len() {
            half[nyq] *= if shorter { 2.0 } else { 0.5 };
        }
    }
    let scale = new_len as f64 / old_len as f64;

    // Rebuild a full Hermitian spectrum of length new_len.
    let new_half = new_len / 2 + 1;
    let mut spec = vec![Complex::<f64>::default(); new_len];
    let n_copy = half.len().min(new_half);
    for (dst, src) in spec[..n_copy].iter_mut().zip(&half[..n_copy]) {
        *dst = src * scale;
    }
    for i in 1..new_half {
        let mirror = new_len - i;
        if mirror >= new_half {
            spec[mirror] = spec[i].conj();
        }
    }

    planner.plan_fft_inverse(new_len).process(&mut spec);
    let inv = 1.0 / new_len as f64;

    let strip_l = final_length(npad_l.min(n_in - 1), ratio).min(new_len);
    let mut result: Vec<f64> = spec[strip_l..]
        .iter()
        .take(final_len)
        .map(|c| c.re * inv)
        .collect();
    result.resize(final_len, 0.0);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn same_rate_is_passthrough() {
        let data = Array2::from_shape_fn((2, 512), |(_, t)| t as f64 / 512.0);
        let out = resample(&data, 250.0, 250.0).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn halving_rate_halves_length() {
        let data = Array2::zeros((1, 1000));
        let out = resample(&data, 500.0, 250.0).unwrap();
        assert_eq!(out.ncols(), 500);
    }

    #[test]
    fn non_integer_ratio_length() {
        let data = Array2::zeros((3, 1000));
        let out = resample(&data, 250.0, 128.0).unwrap();
        assert_eq!(out.dim(), (3, 512));
    }

    #[test]
    fn preserves_dc() {
        let data = Array2::from_elem((1, 1024), 3.25);
        for dst in [128.0, 512.0] {
            let out = resample(&data, 256.0, dst).unwrap();
            for &v in out.iter() {
                assert_abs_diff_eq!(v, 3.25, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn preserves_low_frequency_sine() {
        let src = 500.0;
        let data = Array2::from_shape_fn((1, 2000), |(_, t)| {
            (2.0 * std::f64::consts::PI * 5.0 * t as f64 / src).sin()
        });
        let out = resample(&data, src, 250.0).unwrap();
        for (t, &v) in out.iter().enumerate().skip(50).take(900) {
            let expected = (2.0 * std::f64::consts::PI * 5.0 * t as f64 / 250.0).sin();
            assert_abs_diff_eq!(v, expected, epsilon = 5e-3);
        }
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(resample(&Array2::zeros((1, 10)), 0.0, 250.0).is_err());
    }

    #[test]
    fn auto_npad_powers_of_two() {
        // 15360 + 200 → 16384
        assert_eq!(auto_npad(15360), (512, 512));
        assert_eq!(auto_npad(30720), (1024, 1024));
        // 1000 + 200 → 2048
        assert_eq!(auto_npad(1000), (524, 524));
    }
}
