//! Flat C surface over one process-wide engine.
//!
//! Every entry point follows the host convention: return `1` on success and
//! `0` on invalid arguments, missing data, or after shutdown; no errno
//! semantics. Failed lookups never touch the caller's output memory. The
//! engine (and its backend) is created on first use behind a [`OnceLock`],
//! which doubles as the initialisation lock.

// The exported symbols keep the host-facing PascalCase table.
#![allow(non_snake_case)]

use std::ffi::{c_char, CStr};
use std::ptr;
use std::slice;
use std::sync::OnceLock;

use crate::engine::{Engine, Job, RESULT_FIELDS};
use crate::kernel::KernelLifecycle;
use crate::signal::segment::DetrendMode;
use crate::signal::spectral::{
    PeriodogramConfig, PeriodogramKernel, Scaling, StftConfig, StftKernel,
};
use crate::signal::traits::SpectrumEstimate1D;
use crate::signal::windows::WindowSpec;

static ENGINE: OnceLock<Engine> = OnceLock::new();

fn engine() -> &'static Engine {
    ENGINE.get_or_init(Engine::new)
}

/// Decode an optional C string, falling back to `default`.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn name_or<'a>(ptr: *const c_char, default: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        return std::borrow::Cow::Borrowed(default);
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy()
}

/// Enqueue a price/wave job for `key`. Returns 1 on acceptance.
///
/// # Safety
/// `price` and `wave` must point to `price_len`/`wave_len` readable doubles.
#[no_mangle]
pub unsafe extern "C" fn SpectralSubmit(
    key: i64,
    bar_time: i64,
    price: *const f64,
    price_len: i32,
    wave: *const f64,
    wave_len: i32,
    window_min: i32,
    window_max: i32,
    nfft: i32,
    detrend: i32,
    min_period: f64,
    max_period: f64,
    flags: i32,
) -> i32 {
    if price.is_null() || wave.is_null() || price_len <= 0 || wave_len <= 0 {
        return 0;
    }
    let price = unsafe { slice::from_raw_parts(price, price_len as usize) }.to_vec();
    let wave = unsafe { slice::from_raw_parts(wave, wave_len as usize) }.to_vec();
    let job = Job {
        key,
        bar_time,
        price,
        wave,
        window_min: window_min.max(0) as usize,
        window_max: window_max.max(0) as usize,
        nfft: nfft.max(0) as usize,
        detrend: DetrendMode::from_code(detrend),
        min_period,
        max_period,
        flags,
    };
    engine().submit(job) as i32
}

/// Copy the most recent result for `key` into `out` (>= 12 doubles).
///
/// # Safety
/// `out` must point to `out_len` writable doubles; `out_time`/`out_seq` must
/// be null or valid.
#[no_mangle]
pub unsafe extern "C" fn SpectralTryGetLatest(
    key: i64,
    out: *mut f64,
    out_len: i32,
    out_time: *mut i64,
    out_seq: *mut i64,
) -> i32 {
    if out.is_null() || out_len < RESULT_FIELDS as i32 {
        return 0;
    }
    let Some(entry) = engine().latest(key) else {
        return 0;
    };
    unsafe {
        ptr::copy_nonoverlapping(entry.fields.as_ptr(), out, RESULT_FIELDS);
        if !out_time.is_null() {
            *out_time = entry.bar_time;
        }
        if !out_seq.is_null() {
            *out_seq = entry.seq;
        }
    }
    1
}

/// Copy the first result whose time matches `bar_time` exactly.
///
/// # Safety
/// `out` must point to `out_len` writable doubles; `out_seq` null or valid.
#[no_mangle]
pub unsafe extern "C" fn SpectralTryGetByTime(
    key: i64,
    bar_time: i64,
    out: *mut f64,
    out_len: i32,
    out_seq: *mut i64,
) -> i32 {
    if out.is_null() || out_len < RESULT_FIELDS as i32 {
        return 0;
    }
    let Some(entry) = engine().by_time(key, bar_time) else {
        return 0;
    };
    unsafe {
        ptr::copy_nonoverlapping(entry.fields.as_ptr(), out, RESULT_FIELDS);
        if !out_seq.is_null() {
            *out_seq = entry.seq;
        }
    }
    1
}

/// Copy the result at ring position `idx` (0 is the most recent).
///
/// # Safety
/// `out` must point to `out_len` writable doubles; `out_time`/`out_seq` must
/// be null or valid.
#[no_mangle]
pub unsafe extern "C" fn SpectralTryGetAtIndex(
    key: i64,
    idx: i32,
    out: *mut f64,
    out_len: i32,
    out_time: *mut i64,
    out_seq: *mut i64,
) -> i32 {
    if out.is_null() || out_len < RESULT_FIELDS as i32 || idx < 0 {
        return 0;
    }
    let Some(entry) = engine().at_index(key, idx as usize) else {
        return 0;
    };
    unsafe {
        ptr::copy_nonoverlapping(entry.fields.as_ptr(), out, RESULT_FIELDS);
        if !out_time.is_null() {
            *out_time = entry.bar_time;
        }
        if !out_seq.is_null() {
            *out_seq = entry.seq;
        }
    }
    1
}

/// Copy `(jobs_ok, jobs_drop, last_ms, ring_len)` into `out` (>= 4 doubles).
///
/// # Safety
/// `out` must point to `out_len` writable doubles.
#[no_mangle]
pub unsafe extern "C" fn SpectralGetStats(key: i64, out: *mut f64, out_len: i32) -> i32 {
    if out.is_null() || out_len < 4 {
        return 0;
    }
    let Some(stats) = engine().stats(key) else {
        return 0;
    };
    let fields = [
        stats.jobs_ok as f64,
        stats.jobs_drop as f64,
        stats.last_ms,
        stats.ring_len as f64,
    ];
    unsafe {
        ptr::copy_nonoverlapping(fields.as_ptr(), out, fields.len());
    }
    1
}

/// Bind `key` to a chart id. Always succeeds.
#[no_mangle]
pub extern "C" fn SpectralSetChart(key: i64, chart_id: i64) -> i32 {
    engine().set_chart(key, chart_id);
    1
}

/// Read the chart binding and its config sequence for `key`.
///
/// # Safety
/// `chart_id` and `seq` must point to writable 64-bit integers.
#[no_mangle]
pub unsafe extern "C" fn SpectralTryGetChart(key: i64, chart_id: *mut i64, seq: *mut i64) -> i32 {
    if chart_id.is_null() || seq.is_null() {
        return 0;
    }
    let Some((id, sequence)) = engine().chart(key) else {
        return 0;
    };
    unsafe {
        *chart_id = id;
        *seq = sequence;
    }
    1
}

/// Stop the worker and drop all queued jobs and results.
#[no_mangle]
pub extern "C" fn SpectralShutdown() -> i32 {
    if let Some(engine) = ENGINE.get() {
        engine.shutdown();
    }
    1
}

/// One-shot periodogram into caller buffers.
///
/// Returns 0 when the requested configuration is invalid or either output
/// buffer is smaller than the produced grids.
///
/// # Safety
/// `x` must point to `x_len` readable doubles; `freqs`/`pxx` must point to
/// `freqs_len`/`pxx_len` writable doubles; the name pointers must be null or
/// NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn SpectralPeriodogram(
    x: *const f64,
    x_len: i32,
    fs: f64,
    window: *const c_char,
    nfft: i32,
    detrend: i32,
    return_onesided: i32,
    scaling: *const c_char,
    freqs: *mut f64,
    freqs_len: i32,
    pxx: *mut f64,
    pxx_len: i32,
) -> i32 {
    if x.is_null() || x_len <= 0 || freqs.is_null() || pxx.is_null() {
        return 0;
    }
    let input = unsafe { slice::from_raw_parts(x, x_len as usize) };
    let window = WindowSpec::from_name(&unsafe { name_or(window, "hann") });
    let scaling = Scaling::from_name(&unsafe { name_or(scaling, "density") });

    let Ok(kernel) = PeriodogramKernel::try_new(PeriodogramConfig {
        fs,
        window,
        nfft: nfft.max(0) as usize,
        detrend: DetrendMode::from_code(detrend),
        onesided: return_onesided != 0,
        scaling,
    }) else {
        return 0;
    };
    let Ok(output) = kernel.run(input, engine().backend().as_ref()) else {
        return 0;
    };
    if output.frequencies.len() > freqs_len.max(0) as usize
        || output.power.len() > pxx_len.max(0) as usize
    {
        return 0;
    }
    unsafe {
        ptr::copy_nonoverlapping(output.frequencies.as_ptr(), freqs, output.frequencies.len());
        ptr::copy_nonoverlapping(output.power.as_ptr(), pxx, output.power.len());
    }
    1
}

/// Batched STFT into caller buffers (`zre`/`zim` in `[freq][segment]`
/// layout).
///
/// # Safety
/// `x` must point to `x_len` readable doubles; every output pointer must
/// reference its stated number of writable doubles; the name pointers must
/// be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn SpectralStft(
    x: *const f64,
    x_len: i32,
    fs: f64,
    window: *const c_char,
    nperseg: i32,
    noverlap: i32,
    nfft: i32,
    detrend: i32,
    return_onesided: i32,
    scaling: *const c_char,
    freqs: *mut f64,
    freqs_len: i32,
    t: *mut f64,
    t_len: i32,
    zre: *mut f64,
    zre_len: i32,
    zim: *mut f64,
    zim_len: i32,
) -> i32 {
    if x.is_null() || x_len <= 0 || freqs.is_null() || t.is_null() || zre.is_null() || zim.is_null()
    {
        return 0;
    }
    let input = unsafe { slice::from_raw_parts(x, x_len as usize) };
    let window = WindowSpec::from_name(&unsafe { name_or(window, "hann") });
    let scaling = Scaling::from_name(&unsafe { name_or(scaling, "density") });

    let Ok(kernel) = StftKernel::try_new(StftConfig {
        fs,
        window,
        nperseg: nperseg.max(0) as usize,
        noverlap: (noverlap >= 0).then_some(noverlap as usize),
        nfft: nfft.max(0) as usize,
        detrend: DetrendMode::from_code(detrend),
        onesided: return_onesided != 0,
        scaling,
    }) else {
        return 0;
    };
    let Ok(output) = kernel.run(input, engine().backend().as_ref()) else {
        return 0;
    };
    if output.frequencies.len() > freqs_len.max(0) as usize
        || output.times.len() > t_len.max(0) as usize
        || output.real.len() > zre_len.max(0) as usize
        || output.imag.len() > zim_len.max(0) as usize
    {
        return 0;
    }
    unsafe {
        ptr::copy_nonoverlapping(output.frequencies.as_ptr(), freqs, output.frequencies.len());
        ptr::copy_nonoverlapping(output.times.as_ptr(), t, output.times.len());
        ptr::copy_nonoverlapping(output.real.as_ptr(), zre, output.real.len());
        ptr::copy_nonoverlapping(output.imag.as_ptr(), zim, output.imag.len());
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    // The process-wide engine is shared by every test in this module, so
    // each test uses its own key space and nothing calls SpectralShutdown.

    #[test]
    fn submit_rejects_null_and_empty_inputs() {
        let data = [1.0f64; 8];
        unsafe {
            assert_eq!(
                SpectralSubmit(
                    1000,
                    1,
                    ptr::null(),
                    8,
                    data.as_ptr(),
                    8,
                    2,
                    8,
                    0,
                    0,
                    2.0,
                    50.0,
                    0
                ),
                0
            );
            assert_eq!(
                SpectralSubmit(
                    1000,
                    1,
                    data.as_ptr(),
                    0,
                    data.as_ptr(),
                    8,
                    2,
                    8,
                    0,
                    0,
                    2.0,
                    50.0,
                    0
                ),
                0
            );
        }
    }

    #[test]
    fn lookups_on_unknown_keys_leave_outputs_untouched() {
        let mut out = [7.0f64; RESULT_FIELDS];
        let mut time = -1i64;
        let mut seq = -1i64;
        unsafe {
            assert_eq!(
                SpectralTryGetLatest(2000, out.as_mut_ptr(), out.len() as i32, &mut time, &mut seq),
                0
            );
            assert_eq!(
                SpectralTryGetByTime(2000, 5, out.as_mut_ptr(), out.len() as i32, &mut seq),
                0
            );
            assert_eq!(
                SpectralTryGetAtIndex(
                    2000,
                    0,
                    out.as_mut_ptr(),
                    out.len() as i32,
                    &mut time,
                    &mut seq
                ),
                0
            );
            assert_eq!(SpectralGetStats(2000, out.as_mut_ptr(), out.len() as i32), 0);
        }
        assert!(out.iter().all(|v| *v == 7.0));
        assert_eq!(time, -1);
        assert_eq!(seq, -1);
    }

    #[test]
    fn undersized_output_buffers_are_rejected() {
        let mut out = [0.0f64; 4];
        unsafe {
            assert_eq!(
                SpectralTryGetLatest(
                    3000,
                    out.as_mut_ptr(),
                    out.len() as i32,
                    ptr::null_mut(),
                    ptr::null_mut()
                ),
                0
            );
            assert_eq!(SpectralGetStats(3000, out.as_mut_ptr(), 3), 0);
        }
    }

    #[test]
    fn chart_side_channel_round_trips() {
        assert_eq!(SpectralSetChart(4000, 77), 1);
        let mut chart_id = 0i64;
        let mut seq = 0i64;
        unsafe {
            assert_eq!(SpectralTryGetChart(4000, &mut chart_id, &mut seq), 1);
            assert_eq!(SpectralTryGetChart(4001, &mut chart_id, &mut seq), 0);
            assert_eq!(SpectralTryGetChart(4000, ptr::null_mut(), &mut seq), 0);
        }
        assert_eq!(chart_id, 77);
        assert_eq!(seq, 1);
    }

    #[test]
    fn periodogram_entry_point_fills_caller_buffers() {
        let x = [1.0f64, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let mut freqs = [0.0f64; 8];
        let mut pxx = [0.0f64; 8];
        let window = std::ffi::CString::new("boxcar").expect("cstring");
        let scaling = std::ffi::CString::new("none").expect("cstring");
        let status = unsafe {
            SpectralPeriodogram(
                x.as_ptr(),
                x.len() as i32,
                1.0,
                window.as_ptr(),
                0,
                0,
                1,
                scaling.as_ptr(),
                freqs.as_mut_ptr(),
                freqs.len() as i32,
                pxx.as_mut_ptr(),
                pxx.len() as i32,
            )
        };
        assert_eq!(status, 1);
        assert_eq!(freqs[1], 0.125);
        assert_eq!(pxx[0], 1.0);

        // Undersized buffer fails without writing.
        let status = unsafe {
            SpectralPeriodogram(
                x.as_ptr(),
                x.len() as i32,
                1.0,
                window.as_ptr(),
                0,
                0,
                1,
                scaling.as_ptr(),
                freqs.as_mut_ptr(),
                2,
                pxx.as_mut_ptr(),
                2,
            )
        };
        assert_eq!(status, 0);
    }

    #[test]
    fn stft_entry_point_fills_caller_buffers() {
        let x = [1.0f64; 32];
        let mut freqs = [0.0f64; 5];
        let mut t = [0.0f64; 7];
        let mut zre = [0.0f64; 5 * 7];
        let mut zim = [0.0f64; 5 * 7];
        let scaling = std::ffi::CString::new("none").expect("cstring");
        let status = unsafe {
            SpectralStft(
                x.as_ptr(),
                x.len() as i32,
                1.0,
                ptr::null(),
                8,
                4,
                8,
                0,
                1,
                scaling.as_ptr(),
                freqs.as_mut_ptr(),
                freqs.len() as i32,
                t.as_mut_ptr(),
                t.len() as i32,
                zre.as_mut_ptr(),
                zre.len() as i32,
                zim.as_mut_ptr(),
                zim.len() as i32,
            )
        };
        assert_eq!(status, 1);
        assert_eq!(t[0], 4.0);
        assert_eq!(t[6], 28.0);
    }
}
