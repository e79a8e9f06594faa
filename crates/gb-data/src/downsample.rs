use gb_types::{DataError, GbResult};

/// Mean-pool `signal` from `source_hz` down to `target_hz`.
///
/// With ratio `r = source_hz / target_hz`, output sample `i` is the mean of
/// source samples `[floor(i * r), floor((i + 1) * r))` and the output holds
/// `floor(len / r)` samples; a partial trailing bin is dropped.
pub fn downsample(signal: &[f64], source_hz: f64, target_hz: f64) -> GbResult<Vec<f64>> {
    if !(source_hz > 0.0 && source_hz.is_finite()) || !(target_hz > 0.0 && target_hz.is_finite()) {
        return Err(DataError::InvalidFormat {
            message: format!("sampling rates must be positive, got {source_hz}Hz -> {target_hz}Hz"),
        }
        .into());
    }
    if target_hz > source_hz {
        return Err(DataError::InvalidFormat {
            message: format!("cannot upsample from {source_hz}Hz to {target_hz}Hz"),
        }
        .into());
    }
    if target_hz == source_hz {
        return Ok(signal.to_vec());
    }

    let ratio = source_hz / target_hz;
    let n_out = (signal.len() as f64 / ratio).floor() as usize;
    let mut out = Vec::with_capacity(n_out);
    for i in 0..n_out {
        let start = (i as f64 * ratio).floor() as usize;
        let end = (((i + 1) as f64 * ratio).floor() as usize).min(signal.len());
        // ratio > 1 keeps every bin non-empty
        let bin = &signal[start..end];
        out.push(bin.iter().sum::<f64>() / bin.len() as f64);
    }
    Ok(out)
}
