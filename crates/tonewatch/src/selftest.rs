//! Loopback self-test: synthesise every key and run it through a fresh listener.

use std::fmt;

use tonewatch_dtmf::{ConfigError, DtmfListener, DTMF_KEYS};
use tonewatch_tone::{to_i16, DtmfModulator};

const TEST_LEVEL: f32 = 0.5;
/// Blocks of tone per key, followed by one silent block.
const TONE_BLOCKS: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct SelfTestConfig {
    pub sample_rate_hz: u32,
    pub block_len: usize,
    pub threshold: f32,
    pub release_ratio: f32,
}

/// What the listener reported for each synthesised key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub results: Vec<(char, String)>,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.results
            .iter()
            .all(|(key, heard)| heard.len() == 1 && heard.starts_with(*key))
    }
}

impl fmt::Display for SelfTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, heard) in &self.results {
            let verdict = if heard.len() == 1 && heard.starts_with(*key) {
                "ok".to_string()
            } else if heard.is_empty() {
                "missed".to_string()
            } else {
                format!("heard {:?}", heard)
            };
            writeln!(f, "  {}: {}", key, verdict)?;
        }
        write!(f, "self-test {}", if self.passed() { "PASSED" } else { "FAILED" })
    }
}

pub fn run(config: &SelfTestConfig) -> Result<SelfTestReport, ConfigError> {
    let modem = DtmfModulator::new(config.sample_rate_hz as f32, TEST_LEVEL);
    let mut results = Vec::with_capacity(16);

    for &key in DTMF_KEYS.iter().flatten() {
        let mut listener = DtmfListener::builder(config.sample_rate_hz)
            .block_len(config.block_len)
            .threshold(config.threshold)
            .release_ratio(config.release_ratio)
            .build()?;

        let mut samples = modem
            .key_tone(key, TONE_BLOCKS * config.block_len)
            .map(|tone| to_i16(&tone))
            .unwrap_or_default();
        samples.resize(samples.len() + config.block_len, 0);

        let mut heard = String::new();
        for block in samples.chunks_exact(config.block_len) {
            // Blocks are cut to the configured length, so this cannot fail.
            if let Ok(cycle) = listener.process_block(block) {
                heard.extend(cycle.event.map(|ev| ev.key));
            }
        }
        results.push((key, heard));
    }

    Ok(SelfTestReport { results })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SelfTestConfig {
        SelfTestConfig {
            sample_rate_hz: 8000,
            block_len: 1024,
            threshold: 1000.0,
            release_ratio: 0.5,
        }
    }

    #[test]
    fn defaults_pass() {
        let report = run(&config()).expect("config");
        assert_eq!(report.results.len(), 16);
        assert!(report.passed(), "{}", report);
    }

    #[test]
    fn passes_at_other_rates() {
        let report = run(&SelfTestConfig {
            sample_rate_hz: 16_000,
            block_len: 512,
            ..config()
        })
        .expect("config");
        assert!(report.passed(), "{}", report);
    }

    #[test]
    fn unreachable_threshold_misses_everything() {
        let report = run(&SelfTestConfig {
            threshold: 1.0e12,
            ..config()
        })
        .expect("config");
        assert!(!report.passed());
        assert!(report.to_string().contains("1: missed"));
    }

    #[test]
    fn invalid_config_is_reported() {
        assert!(run(&SelfTestConfig {
            block_len: 0,
            ..config()
        })
        .is_err());
    }
}
