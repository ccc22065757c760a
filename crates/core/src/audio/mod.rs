mod resample;
pub mod window;

pub use resample::SignalResampler;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Interleaved f32 samples tagged with their rate and channel layout.
/// Each pipeline stage produces a fresh buffer; none mutates its input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Frame count (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::from_secs(0);
        }
        let micros =
            (self.frames() as u128 * 1_000_000u128) / u128::from(self.sample_rate);
        Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("media contains no audio track")]
    NoAudioTrack,

    #[error("failed to read audio samples: {0}")]
    ReadFailure(String),

    #[error("unsupported audio format: {0}")]
    FormatUnsupported(String),

    #[error("sample rate conversion failed: {0}")]
    ConversionFailure(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Decode the audio track of a recorded take into an interleaved
/// [`AudioBuffer`] at the track's native rate and channel count.
///
/// The container is probed with symphonia; the first non-null audio track
/// wins. Video and data tracks are skipped by track id.
pub fn decode_media(media: Bytes, extension_hint: Option<&str>) -> Result<AudioBuffer> {
    let cursor = Cursor::new(media.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        let _ = hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::FormatUnsupported(format!("probe failed: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoAudioTrack)?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::FormatUnsupported("track reports no sample rate".into()))?;
    let channels = codec_params.channels.map_or(1, |c| c.count());
    let channels =
        u16::try_from(channels).map_err(|_| {
            AudioError::FormatUnsupported(format!("channel count {channels} out of range"))
        })?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::FormatUnsupported(format!("codec init failed: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AudioError::ReadFailure(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| AudioError::ReadFailure(format!("decode: {e}")))?;

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(AudioError::ReadFailure("no audio samples decoded".into()));
    }

    Ok(AudioBuffer::new(samples, sample_rate, channels))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_duration_mono_16k() {
        let buf = AudioBuffer::new(vec![0.0; 16_000], 16_000, 1);
        assert_eq!(buf.duration().as_secs(), 1);
    }

    #[test]
    fn buffer_frames_split_across_channels() {
        let buf = AudioBuffer::new(vec![0.0; 960], 48_000, 2);
        assert_eq!(buf.frames(), 480);
    }

    #[test]
    fn decode_rejects_non_media_bytes() {
        let err = decode_media(Bytes::from_static(b"not a media file"), Some("wav")).unwrap_err();
        assert!(matches!(err, AudioError::FormatUnsupported(_)));
    }

    #[test]
    fn decode_rejects_empty_input() {
        assert!(decode_media(Bytes::new(), None).is_err());
    }

    #[test]
    fn decode_wav_mono_native_rate() {
        let wav = test_wav::generate(16_000, 1, 1600);
        let buf = decode_media(Bytes::from(wav), Some("wav")).expect("decodable wav");
        assert_eq!(buf.sample_rate, 16_000);
        assert_eq!(buf.channels, 1);
        assert_eq!(buf.frames(), 1600);
        assert!(buf.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn decode_wav_preserves_stereo_layout() {
        let wav = test_wav::generate(44_100, 2, 4410);
        let buf = decode_media(Bytes::from(wav), Some("wav")).expect("decodable wav");
        assert_eq!(buf.sample_rate, 44_100);
        assert_eq!(buf.channels, 2);
        assert_eq!(buf.frames(), 4410);
    }
}
