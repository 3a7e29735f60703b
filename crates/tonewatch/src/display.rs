//! Rate-limited status line on stdout.

use std::io::Write;
use std::time::{Duration, Instant};

use tonewatch_dtmf::{DetectionEvent, Telemetry, TelemetrySink};

/// Confidence above which a weak signal is shown as activity.
const SIGNAL_CONFIDENCE: f32 = 50.0;

pub struct TerminalDisplay {
    interval: Duration,
    last_render: Option<Instant>,
    enabled: bool,
}

impl TerminalDisplay {
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self {
            interval,
            last_render: None,
            enabled,
        }
    }

    /// Move past the status line so later output starts on a fresh line.
    pub fn finish(&mut self) {
        if self.enabled && self.last_render.is_some() {
            println!();
        }
    }
}

impl TelemetrySink for TerminalDisplay {
    fn publish(&mut self, telemetry: &Telemetry, event: Option<&DetectionEvent>) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        // Detections always render so the new key is never skipped.
        if event.is_none() {
            if let Some(last) = self.last_render {
                if now.duration_since(last) < self.interval {
                    return;
                }
            }
        }
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{}\x1b[K", render_status(telemetry));
        let _ = out.flush();
        self.last_render = Some(now);
    }
}

pub fn status_text(telemetry: &Telemetry) -> &'static str {
    if telemetry.result.is_strong(telemetry.threshold) {
        "DETECTED!"
    } else if telemetry.result.confidence() > SIGNAL_CONFIDENCE {
        "Signal..."
    } else {
        "Listening"
    }
}

pub fn render_status(telemetry: &Telemetry) -> String {
    let key = match telemetry.result.key {
        Some(key) if telemetry.result.is_strong(telemetry.threshold) => key,
        _ => '-',
    };
    let history: String = telemetry.history.iter().collect();
    format!(
        "DTMF Live :{} | {} | R:{:.0} C:{:.0} T:{:.0} | {} | Last: {}",
        telemetry.count,
        key,
        telemetry.result.max_row,
        telemetry.result.max_col,
        telemetry.threshold,
        status_text(telemetry),
        history
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonewatch_dtmf::DetectionResult;

    fn telemetry(max_row: f32, max_col: f32, key: Option<char>) -> Telemetry {
        Telemetry {
            result: DetectionResult {
                max_row,
                max_col,
                row: key.map(|_| 0),
                col: key.map(|_| 1),
                key,
            },
            threshold: 1000.0,
            count: 3,
            last_key: key,
            history: vec!['1', '2'],
        }
    }

    #[test]
    fn strong_signal_shows_key() {
        let t = telemetry(1500.0, 1800.0, Some('2'));
        assert_eq!(status_text(&t), "DETECTED!");
        assert_eq!(
            render_status(&t),
            "DTMF Live :3 | 2 | R:1500 C:1800 T:1000 | DETECTED! | Last: 12"
        );
    }

    #[test]
    fn weak_signal_hides_key() {
        let t = telemetry(900.0, 1800.0, Some('2'));
        assert_eq!(status_text(&t), "Signal...");
        assert!(render_status(&t).contains("| - |"));
    }

    #[test]
    fn quiet_is_listening() {
        let t = telemetry(20.0, 30.0, Some('2'));
        assert_eq!(status_text(&t), "Listening");
        let t = telemetry(0.0, 0.0, None);
        assert_eq!(status_text(&t), "Listening");
    }
}
