//! Verbose per-cycle diagnostics, raw sample dumps and input level statistics.

use std::fmt::Write;
use std::time::{Duration, Instant};

use tonewatch_dtmf::{Cycle, TargetFrequency, TOTAL_BINS};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);
/// Audio level that bypasses the report interval.
const LOUD_LEVEL: f32 = 1000.0;
pub const DUMP_SAMPLES: usize = 20;

/// Prints a magnitude table at most once per interval, or at once when loud.
pub struct DebugReporter {
    enabled: bool,
    last: Option<Instant>,
}

impl DebugReporter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last: None,
        }
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn should_report(&self, now: Instant, audio_level: f32) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last {
            None => true,
            Some(last) => now.duration_since(last) >= REPORT_INTERVAL || audio_level > LOUD_LEVEL,
        }
    }

    pub fn report(&mut self, cycle: &Cycle, threshold: f32, tones: &[TargetFrequency; TOTAL_BINS]) {
        let now = Instant::now();
        if !self.should_report(now, cycle.audio_level) {
            return;
        }
        eprintln!("\n{}", format_report(cycle, threshold, tones));
        self.last = Some(now);
    }
}

pub fn format_report(cycle: &Cycle, threshold: f32, tones: &[TargetFrequency; TOTAL_BINS]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "========== DEBUG INFO ==========");
    let _ = writeln!(out, "Audio Level: {:.1}", cycle.audio_level);
    let _ = writeln!(
        out,
        "Row max: {:.1}, Col max: {:.1}",
        cycle.result.max_row, cycle.result.max_col
    );
    let _ = writeln!(out, "Threshold: {:.0}", threshold);
    let _ = writeln!(out, "Frequency Magnitudes:");
    for (tone, mag) in tones.iter().zip(&cycle.magnitudes) {
        let _ = writeln!(out, "  {}: {:.1}", tone.label, mag);
    }
    if cycle.audio_level == 0.0 {
        let _ = writeln!(out, "NO AUDIO - check the input device");
    }
    out.trim_end().to_string()
}

pub fn format_samples(block: &[i16]) -> String {
    if block.is_empty() {
        return "no block captured yet".to_string();
    }
    let mut out = String::from("======= RAW SAMPLES =======\n");
    for (i, s) in block.iter().take(DUMP_SAMPLES).enumerate() {
        let _ = writeln!(out, "Sample[{}]: {}", i, s);
    }
    out.push_str("===========================");
    out
}

/// Per-block input statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockLevel {
    pub level: f32,
    /// Sample with the largest magnitude, sign kept.
    pub peak: i16,
    pub nonzero: usize,
}

impl BlockLevel {
    pub fn measure(block: &[i16]) -> Self {
        let peak = block
            .iter()
            .copied()
            .max_by_key(|s| s.unsigned_abs())
            .unwrap_or(0);
        Self {
            level: tonewatch_dtmf::audio_level(block),
            peak,
            nonzero: block.iter().filter(|&&s| s != 0).count(),
        }
    }
}

/// Running maxima over a microphone test.
#[derive(Debug, Clone, Default)]
pub struct LevelStats {
    pub max_level: f32,
    pub max_peak: i16,
    pub total_nonzero: u64,
    pub blocks: u64,
}

impl LevelStats {
    pub fn observe(&mut self, level: &BlockLevel) {
        self.max_level = self.max_level.max(level.level);
        if level.peak.unsigned_abs() > self.max_peak.unsigned_abs() {
            self.max_peak = level.peak;
        }
        self.total_nonzero += level.nonzero as u64;
        self.blocks += 1;
    }

    pub fn heard_audio(&self) -> bool {
        self.max_level > 0.0
    }

    pub fn summary(&self, block_len: usize) -> String {
        let avg_nonzero = self.total_nonzero.checked_div(self.blocks).unwrap_or(0);
        let mut out = String::from("TEST RESULTS:\n");
        let _ = writeln!(out, "  Max audio level: {:.1}", self.max_level);
        let _ = writeln!(out, "  Max sample value: {}", self.max_peak);
        let _ = writeln!(out, "  Avg non-zero samples: {}/{}", avg_nonzero, block_len);
        if self.heard_audio() {
            let _ = write!(out, "Audio detected! Level: {:.1}", self.max_level);
        } else {
            let _ = write!(out, "NO AUDIO DETECTED! Check the input device");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonewatch_dtmf::{DetectionResult, DTMF_TONES};

    fn cycle(level: f32) -> Cycle {
        Cycle {
            magnitudes: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            result: DetectionResult {
                max_row: 4.0,
                max_col: 8.0,
                row: Some(3),
                col: Some(3),
                key: Some('D'),
            },
            audio_level: level,
            event: None,
        }
    }

    #[test]
    fn report_lists_every_tone() {
        let text = format_report(&cycle(12.0), 1000.0, &DTMF_TONES);
        assert!(text.contains("Audio Level: 12.0"));
        assert!(text.contains("  1633Hz: 8.0"));
        assert!(!text.contains("NO AUDIO"));
        assert!(format_report(&cycle(0.0), 1000.0, &DTMF_TONES).contains("NO AUDIO"));
    }

    #[test]
    fn reporter_rate_limits_unless_loud() {
        let mut reporter = DebugReporter::new(true);
        let start = Instant::now();
        assert!(reporter.should_report(start, 0.0));
        reporter.last = Some(start);
        assert!(!reporter.should_report(start, 500.0));
        assert!(reporter.should_report(start, 1500.0));
        assert!(reporter.should_report(start + Duration::from_secs(1), 0.0));
    }

    #[test]
    fn disabled_reporter_is_silent() {
        let mut reporter = DebugReporter::new(true);
        assert!(!reporter.toggle());
        assert!(!reporter.should_report(Instant::now(), 5000.0));
    }

    #[test]
    fn dump_shows_first_twenty() {
        let block: Vec<i16> = (0..100).collect();
        let text = format_samples(&block);
        assert!(text.contains("Sample[19]: 19"));
        assert!(!text.contains("Sample[20]"));
        assert_eq!(format_samples(&[]), "no block captured yet");
    }

    #[test]
    fn level_stats_track_extremes() {
        let mut stats = LevelStats::default();
        stats.observe(&BlockLevel::measure(&[0, 10, -300, 0]));
        stats.observe(&BlockLevel::measure(&[200, 0, 0, 0]));
        assert_eq!(stats.max_peak, -300);
        assert_eq!(stats.max_level, 77.5);
        assert_eq!(stats.blocks, 2);
        assert!(stats.summary(4).contains("Avg non-zero samples: 1/4"));
        assert!(stats.heard_audio());
    }

    #[test]
    fn silent_test_warns() {
        let mut stats = LevelStats::default();
        stats.observe(&BlockLevel::measure(&[0; 8]));
        assert!(stats.summary(8).contains("NO AUDIO DETECTED"));
    }
}
