use crate::dial::DialSymbol;
use crate::oscillator::DualToneOscillator;
use tonewatch_dtmf::{key_position, DTMF_TONES, GROUP_LEN};

pub const DEFAULT_TONE_MS: f32 = 200.0;
/// Long enough to span two 1024-sample blocks at 8 kHz, so a listener sees
/// at least one silent block and releases before a repeated key.
pub const DEFAULT_GAP_MS: f32 = 300.0;
pub const DEFAULT_PAUSE_MS: f32 = 500.0;

/// Renders dial symbols as DTMF audio.
pub struct DtmfModulator {
    sample_rate_hz: f32,
    tone_samples: usize,
    gap_samples: usize,
    pause_samples: usize,
    level: f32,
}

fn ms_to_samples(ms: f32, sample_rate_hz: f32) -> usize {
    (sample_rate_hz * (ms / 1000.0)).round() as usize
}

impl DtmfModulator {
    /// Create a modulator with default timing at the given sample rate and level.
    pub fn new(sample_rate_hz: f32, level: f32) -> Self {
        Self {
            sample_rate_hz,
            tone_samples: ms_to_samples(DEFAULT_TONE_MS, sample_rate_hz).max(1),
            gap_samples: ms_to_samples(DEFAULT_GAP_MS, sample_rate_hz),
            pause_samples: ms_to_samples(DEFAULT_PAUSE_MS, sample_rate_hz),
            level: level.clamp(0.0, 1.0),
        }
    }

    /// Set the duration of each key tone.
    pub fn tone_ms(mut self, ms: f32) -> Self {
        self.tone_samples = ms_to_samples(ms, self.sample_rate_hz).max(1);
        self
    }

    /// Set the silence after each key tone.
    pub fn gap_ms(mut self, ms: f32) -> Self {
        self.gap_samples = ms_to_samples(ms, self.sample_rate_hz);
        self
    }

    /// Set the silence produced by a pause symbol.
    pub fn pause_ms(mut self, ms: f32) -> Self {
        self.pause_samples = ms_to_samples(ms, self.sample_rate_hz);
        self
    }

    /// Stretch tones, gaps and pauses to whole multiples of `block_len`,
    /// with at least two blocks per tone and per gap.
    ///
    /// Audio rendered this way and cut into blocks from sample zero gives
    /// every block either one clean key or silence, and a repeated key is
    /// always separated by a fully silent block.
    pub fn align_to_blocks(mut self, block_len: usize) -> Self {
        if block_len == 0 {
            return self;
        }
        let whole = |samples: usize| samples.div_ceil(block_len) * block_len;
        self.tone_samples = whole(self.tone_samples.max(2 * block_len));
        self.gap_samples = whole(self.gap_samples.max(2 * block_len));
        self.pause_samples = whole(self.pause_samples);
        self
    }

    /// Render a dial sequence: each key is a tone followed by a gap.
    pub fn modulate(&self, symbols: &[DialSymbol]) -> Vec<f32> {
        let mut out = Vec::new();
        for symbol in symbols {
            match *symbol {
                DialSymbol::Key { row, col, .. } => {
                    self.push_tone(row, col, self.tone_samples, &mut out);
                    out.resize(out.len() + self.gap_samples, 0.0);
                }
                DialSymbol::Pause => out.resize(out.len() + self.pause_samples, 0.0),
            }
        }
        out
    }

    /// A single key tone of exactly `len` samples.
    pub fn key_tone(&self, key: char, len: usize) -> Option<Vec<f32>> {
        let (row, col) = key_position(key)?;
        let mut out = Vec::with_capacity(len);
        self.push_tone(row, col, len, &mut out);
        Some(out)
    }

    fn push_tone(&self, row: usize, col: usize, len: usize, out: &mut Vec<f32>) {
        let mut osc = DualToneOscillator::new(
            self.sample_rate_hz,
            DTMF_TONES[row].freq_hz,
            DTMF_TONES[GROUP_LEN + col].freq_hz,
        );
        out.extend((0..len).map(|_| osc.next() * self.level));
    }
}

/// Convert [-1, 1] samples to signed 16-bit PCM.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dial::encode_dial;
    use tonewatch_dtmf::detect::{DEFAULT_BLOCK_LEN, DEFAULT_SAMPLE_RATE_HZ};
    use tonewatch_dtmf::DtmfListener;

    fn detect(samples: &[f32]) -> String {
        let mut listener = DtmfListener::builder(DEFAULT_SAMPLE_RATE_HZ)
            .build()
            .expect("listener");
        to_i16(samples)
            .chunks_exact(listener.block_len())
            .filter_map(|block| listener.process_block(block).expect("block").event)
            .map(|ev| ev.key)
            .collect()
    }

    #[test]
    fn sequence_length_follows_timing() {
        let modem = DtmfModulator::new(8000.0, 0.5)
            .tone_ms(100.0)
            .gap_ms(50.0)
            .pause_ms(250.0);
        let symbols = encode_dial("12,3").expect("encode");
        let out = modem.modulate(&symbols);
        assert_eq!(out.len(), 3 * (800 + 400) + 2000);
    }

    #[test]
    fn gaps_are_silent() {
        let modem = DtmfModulator::new(8000.0, 0.5).tone_ms(100.0).gap_ms(50.0);
        let out = modem.modulate(&encode_dial("9").expect("encode"));
        assert!(out[800..].iter().all(|&s| s == 0.0));
        assert!(out[..800].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn unknown_key_tone_is_none() {
        let modem = DtmfModulator::new(8000.0, 0.5);
        assert!(modem.key_tone('x', 100).is_none());
    }

    #[test]
    fn to_i16_clamps() {
        assert_eq!(to_i16(&[0.0, 1.0, -1.0, 2.0]), vec![0, 32767, -32767, 32767]);
    }

    #[test]
    fn rendered_dial_string_is_detected() {
        let modem = DtmfModulator::new(8000.0, 0.5).tone_ms(256.0).gap_ms(256.0);
        let samples = modem.modulate(&encode_dial("159#").expect("encode"));
        assert_eq!(detect(&samples), "159#");
    }

    #[test]
    fn default_gap_covers_two_blocks() {
        let modem = DtmfModulator::new(DEFAULT_SAMPLE_RATE_HZ as f32, 0.5);
        assert!(modem.gap_samples >= 2 * DEFAULT_BLOCK_LEN);
    }

    #[test]
    fn aligned_timing_rounds_up_to_whole_blocks() {
        let modem = DtmfModulator::new(8000.0, 0.5)
            .tone_ms(100.0)
            .pause_ms(200.0)
            .align_to_blocks(1024);
        assert_eq!(modem.tone_samples, 2048);
        assert_eq!(modem.gap_samples, 3072);
        assert_eq!(modem.pause_samples, 2048);
    }

    #[test]
    fn repeated_keys_are_heard_at_default_timing() {
        let modem = DtmfModulator::new(DEFAULT_SAMPLE_RATE_HZ as f32, 0.5)
            .align_to_blocks(DEFAULT_BLOCK_LEN);
        for dial in ["55", "1155", "0000", "5,5", "123#"] {
            let samples = modem.modulate(&encode_dial(dial).expect("encode"));
            let expected: String = dial.chars().filter(|&c| c != ',').collect();
            assert_eq!(detect(&samples), expected, "dial {:?}", dial);
        }
    }
}
