use crate::audio::{AudioBuffer, AudioError, Result};

/// Converts a decoded audio track into the canonical mono stream the
/// classifier expects.
///
/// Downmix policy: multi-channel input collapses to the FIRST channel.
/// The capture paths feeding this pipeline record mono, so averaging
/// channels would never be exercised; taking channel zero keeps the output
/// bit-identical to the common case.
#[derive(Clone, Copy, Debug)]
pub struct SignalResampler {
    target_rate: u32,
}

impl SignalResampler {
    pub fn new(target_rate: u32) -> Result<Self> {
        if target_rate == 0 {
            return Err(AudioError::FormatUnsupported(
                "target sample rate must be > 0 Hz".into(),
            ));
        }
        Ok(Self { target_rate })
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Produce a new mono buffer at the target rate. The input buffer is
    /// never modified.
    pub fn resample(&self, source: &AudioBuffer) -> Result<AudioBuffer> {
        // A converter for this pair cannot be built at all; distinct from a
        // failure during conversion.
        if source.sample_rate == 0 {
            return Err(AudioError::FormatUnsupported(
                "source sample rate must be > 0 Hz".into(),
            ));
        }
        if source.channels == 0 {
            return Err(AudioError::FormatUnsupported(
                "source channel count must be > 0".into(),
            ));
        }

        let mono = first_channel(&source.samples, source.channels);

        if source.sample_rate == self.target_rate {
            return Ok(AudioBuffer::new(mono, self.target_rate, 1));
        }

        let out = resample_linear(&mono, source.sample_rate, self.target_rate)?;
        Ok(AudioBuffer::new(out, self.target_rate, 1))
    }
}

fn first_channel(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .iter()
        .step_by(usize::from(channels))
        .copied()
        .collect()
}

/// Linear-interpolation rate conversion producing
/// `ceil(len * to_rate / from_rate)` samples.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let out_len = (samples.len() as u64 * u64::from(to_rate)).div_ceil(u64::from(from_rate));
    let out_len = usize::try_from(out_len).map_err(|_| {
        AudioError::ConversionFailure(format!("output length {out_len} exceeds addressable size"))
    })?;
    let step = f64::from(from_rate) / f64::from(to_rate);

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        if idx + 1 >= samples.len() {
            out.push(samples[samples.len() - 1]);
            continue;
        }
        let frac = (pos - idx as f64) as f32;
        out.push(samples[idx] * (1.0 - frac) + samples[idx + 1] * frac);
    }
    Ok(out)
}
