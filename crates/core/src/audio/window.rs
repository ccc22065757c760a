use crate::audio::AudioBuffer;
use crate::config::WindowParams;

/// Lazy iterator over fixed-length, overlapping windows of a mono buffer.
///
/// Emits `[offset, offset + window_len)` while the whole window fits, then
/// stops. The tail shorter than a window is dropped, never zero-padded. A
/// buffer shorter than one window yields nothing, which callers treat as
/// "insufficient audio for analysis".
#[derive(Clone, Debug)]
pub struct Windows<'a> {
    samples: &'a [f32],
    params: WindowParams,
    offset: usize,
}

impl<'a> Windows<'a> {
    pub fn new(buffer: &'a AudioBuffer, params: WindowParams) -> Self {
        Self {
            samples: &buffer.samples,
            params,
            offset: 0,
        }
    }

    fn remaining(&self) -> usize {
        let len = self.samples.len();
        let w = self.params.window_len();
        if self.offset + w > len {
            return 0;
        }
        (len - self.offset - w) / self.params.hop_len() + 1
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = &'a [f32];

    fn next(&mut self) -> Option<Self::Item> {
        let w = self.params.window_len();
        if self.offset + w > self.samples.len() {
            return None;
        }
        let window = &self.samples[self.offset..self.offset + w];
        self.offset += self.params.hop_len();
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Windows<'_> {}
