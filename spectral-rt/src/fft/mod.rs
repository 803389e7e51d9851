//! Radix-2 transform kernels with a naive DFT fallback.
//!
//! The transform is written as out-of-place data-parallel passes: one
//! bit-reversal pass, then `log2 N` butterfly stages that ping-pong between
//! two buffers. All butterflies of a stage are independent, so the same
//! passes run unchanged over a batch of `nseg` contiguous segments, which is
//! what the STFT pipeline feeds them.

use num_complex::Complex64;
use num_traits::Zero;

use core::f64::consts::PI;

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Time domain to frequency domain, twiddles `exp(-2*pi*i*j/m)`.
    Forward,
    /// Frequency domain to time domain, twiddles `exp(+2*pi*i*j/m)` and a
    /// final `1/N` scale.
    Inverse,
}

impl Direction {
    fn angle_sign(self) -> f64 {
        match self {
            Direction::Forward => -1.0,
            Direction::Inverse => 1.0,
        }
    }
}

/// Whether `n` is a positive power of two.
pub fn is_pow2(n: usize) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

/// Smallest power of two that is `>= n` (and `>= 1`).
pub fn next_pow2(n: usize) -> usize {
    let mut p = 1usize;
    while p < n {
        p <<= 1;
    }
    p
}

/// Exponent of the smallest power of two `>= n`.
pub fn ilog2_ceil(n: usize) -> u32 {
    let mut bits = 0u32;
    while (1usize << bits) < n {
        bits += 1;
    }
    bits
}

fn bit_reverse_index(mut x: usize, bits: u32) -> usize {
    let mut y = 0usize;
    for _ in 0..bits {
        y = (y << 1) | (x & 1);
        x >>= 1;
    }
    y
}

/// Bit-reversal permutation pass over `input.len() / n` segments of length `n`.
pub fn bit_reverse_batch(input: &[Complex64], out: &mut [Complex64], n: usize, bits: u32) {
    let nseg = input.len() / n;
    for seg in 0..nseg {
        let base = seg * n;
        for i in 0..n {
            out[base + bit_reverse_index(i, bits)] = input[base + i];
        }
    }
}

/// One butterfly stage of span `m` across every segment of length `n`.
pub fn butterfly_stage_batch(
    input: &[Complex64],
    out: &mut [Complex64],
    n: usize,
    m: usize,
    direction: Direction,
) {
    let half = m >> 1;
    let nseg = input.len() / n;
    let sign = direction.angle_sign();
    for seg in 0..nseg {
        let base = seg * n;
        for block in (0..n).step_by(m) {
            for j in 0..half {
                let k = base + block + j;
                let angle = sign * 2.0 * PI * j as f64 / m as f64;
                let w = Complex64::from_polar(1.0, angle);
                let a = input[k];
                let t = input[k + half] * w;
                out[k] = a + t;
                out[k + half] = a - t;
            }
        }
    }
}

/// Multiply every element by `factor`.
pub fn scale(data: &mut [Complex64], factor: f64) {
    for v in data.iter_mut() {
        *v *= factor;
    }
}

/// Naive O(N^2) transform for lengths the radix-2 pipeline cannot take.
///
/// The inverse direction folds the `1/N` divide into the pass, matching the
/// batched pipeline's final scale.
pub fn dft(input: &[Complex64], out: &mut [Complex64], direction: Direction) {
    let n = input.len();
    let sign = direction.angle_sign();
    for (k, out_k) in out.iter_mut().enumerate().take(n) {
        let mut sum = Complex64::zero();
        for (i, v) in input.iter().enumerate() {
            let angle = sign * 2.0 * PI * (k as f64) * (i as f64) / n as f64;
            sum += v * Complex64::from_polar(1.0, angle);
        }
        if direction == Direction::Inverse {
            sum /= n as f64;
        }
        *out_k = sum;
    }
}

/// In-place radix-2 transform over `data.len() / n` segments of length `n`.
///
/// `n` must be a power of two and must divide `data.len()`; the caller
/// guarantees both (the spectral operators round with [`next_pow2`] before
/// allocating).
pub fn fft_batch(data: &mut [Complex64], n: usize, direction: Direction) {
    debug_assert!(is_pow2(n));
    debug_assert!(data.len() % n == 0);
    let bits = ilog2_ceil(n);
    let mut scratch = vec![Complex64::zero(); data.len()];
    bit_reverse_batch(data, &mut scratch, n, bits);

    // Result alternates between scratch and data across the stages.
    let mut in_scratch = true;
    let mut m = 2usize;
    while m <= n {
        if in_scratch {
            butterfly_stage_batch(&scratch, data, n, m, direction);
        } else {
            butterfly_stage_batch(data, &mut scratch, n, m, direction);
        }
        in_scratch = !in_scratch;
        m <<= 1;
    }
    if in_scratch {
        data.copy_from_slice(&scratch);
    }

    if direction == Direction::Inverse {
        scale(data, 1.0 / n as f64);
    }
}

/// In-place scalar transform: radix-2 when the length is a power of two,
/// naive DFT otherwise.
pub fn fft(data: &mut [Complex64], direction: Direction) {
    let n = data.len();
    if n == 0 {
        return;
    }
    if is_pow2(n) {
        fft_batch(data, n, direction);
    } else {
        let mut out = vec![Complex64::zero(); n];
        dft(data, &mut out, direction);
        data.copy_from_slice(&out);
    }
}
