//! # Fast Fourier Transform (FFT) Module
//!
//! Turns time-domain audio frames into the magnitude snapshots consumed by
//! the pitch sampler. Each frame goes through DC offset removal, a Hann
//! window and a forward FFT; only the bins up to Nyquist are kept.

use crate::error::{RangeError, Result};
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// A planned forward FFT of fixed size with its window precomputed.
///
/// Planning is the expensive part, so the session worker builds one of
/// these and reuses it for every frame.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    frame_size: usize,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

impl SpectrumAnalyzer {
    /// Plans a transform for frames of `frame_size` samples.
    ///
    /// # Errors
    /// * `RangeError::InvalidFrame` if the size is zero or not a power of two
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size == 0 || !frame_size.is_power_of_two() {
            return Err(RangeError::InvalidFrame(format!(
                "frame size {} is not a power of two",
                frame_size
            )));
        }
        let mut planner = FftPlanner::new();
        Ok(Self {
            fft: planner.plan_fft_forward(frame_size),
            window: hann_window(frame_size),
            frame_size,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of magnitude bins produced per frame.
    pub fn bin_count(&self) -> usize {
        self.frame_size / 2
    }

    /// Computes the magnitude snapshot of one frame.
    ///
    /// # Errors
    /// * `RangeError::InvalidFrame` if `signal.len()` differs from the planned size
    pub fn magnitudes(&self, signal: &[f32]) -> Result<Vec<f32>> {
        if signal.len() != self.frame_size {
            return Err(RangeError::InvalidFrame(format!(
                "expected {} samples, got {}",
                self.frame_size,
                signal.len()
            )));
        }

        let mut processed_signal = signal.to_vec();
        remove_dc_offset(&mut processed_signal);

        let mut buffer: Vec<Complex<f32>> = processed_signal
            .into_iter()
            .zip(&self.window)
            .map(|(sample, w)| Complex { re: sample * w, im: 0.0 })
            .collect();

        self.fft.process(&mut buffer);

        Ok(buffer
            .iter()
            .take(self.bin_count())
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect())
    }
}

/// One-shot helper: plans a transform for `signal.len()` and returns its
/// magnitude snapshot.
pub fn magnitude_spectrum(signal: &[f32]) -> Result<Vec<f32>> {
    SpectrumAnalyzer::new(signal.len())?.magnitudes(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::dominant_frequency;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn produces_half_as_many_bins() {
        let spectrum = magnitude_spectrum(&vec![0.0; 2048]).unwrap();
        assert_eq!(spectrum.len(), 1024);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn rejects_bad_frame_sizes() {
        assert!(matches!(SpectrumAnalyzer::new(0), Err(RangeError::InvalidFrame(_))));
        assert!(matches!(SpectrumAnalyzer::new(1000), Err(RangeError::InvalidFrame(_))));
        let analyzer = SpectrumAnalyzer::new(1024).unwrap();
        assert!(matches!(analyzer.magnitudes(&[0.0; 512]), Err(RangeError::InvalidFrame(_))));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        // 20 Hz per bin at 40960 Hz with 2048-sample frames.
        let signal = sine(440.0, 40960, 2048);
        let spectrum = magnitude_spectrum(&signal).unwrap();
        assert_eq!(dominant_frequency(&spectrum, 40960), 440.0);
    }

    #[test]
    fn dc_offset_does_not_dominate() {
        let signal: Vec<f32> = sine(300.0, 40960, 2048).iter().map(|s| s + 0.5).collect();
        let spectrum = magnitude_spectrum(&signal).unwrap();
        assert_eq!(dominant_frequency(&spectrum, 40960), 300.0);
    }
}
