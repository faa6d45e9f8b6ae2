//! Zero-phase convolution along the frequency axis
//!
//! Magnitude spectra are finite vectors, not streams, so there is no delay
//! line here: each output bin is the kernel centred on that bin, with the
//! first and last bins replicated past the ends.

/// Correlate `input` with a centred odd-length kernel
///
/// output[k] = Σ_j taps[j] · input[clamp(k + j - c)], c = taps.len() / 2
///
/// # Arguments
/// * `input` - Magnitude vector
/// * `taps` - Kernel coefficients (odd length)
/// * `output` - Result, same length as `input`
pub fn convolve_centered(input: &[f64], taps: &[f64], output: &mut [f64]) {
    let len = input.len().min(output.len());
    if len == 0 {
        return;
    }
    if taps.is_empty() {
        output[..len].copy_from_slice(&input[..len]);
        return;
    }

    let center = (taps.len() / 2) as isize;
    let last = (len - 1) as isize;

    for (k, out) in output[..len].iter_mut().enumerate() {
        let mut acc = 0.0;
        for (j, &tap) in taps.iter().enumerate() {
            let idx = (k as isize + j as isize - center).clamp(0, last) as usize;
            acc += tap * input[idx];
        }
        *out = acc;
    }
}

/// Linear-interpolation resampling of `input` onto `output.len()` points
///
/// Endpoints map onto endpoints; a single-point output takes input[0].
pub fn resample_linear(input: &[f64], output: &mut [f64]) {
    if output.is_empty() {
        return;
    }
    match input.len() {
        0 => {
            output.fill(0.0);
            return;
        }
        1 => {
            output.fill(input[0]);
            return;
        }
        _ => {}
    }
    if output.len() == 1 {
        output[0] = input[0];
        return;
    }

    let last_in = input.len() - 1;
    let step = last_in as f64 / (output.len() - 1) as f64;

    for (i, out) in output.iter_mut().enumerate() {
        let pos = i as f64 * step;
        let idx = (pos.floor() as usize).min(last_in);
        let frac = pos - idx as f64;
        *out = if idx >= last_in {
            input[last_in]
        } else {
            input[idx] * (1.0 - frac) + input[idx + 1] * frac
        };
    }
}
