use super::dsp::DetectionResult;
use crate::history::KeyHistory;

/// A newly detected key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionEvent {
    pub key: char,
    /// Detection counter after this event (first event is 1).
    pub count: u64,
    pub row: usize,
    pub col: usize,
    pub row_magnitude: f32,
    pub col_magnitude: f32,
}

/// Edge-triggered key detector with release hysteresis.
///
/// A key is reported once when both dominant magnitudes rise above the
/// threshold, or when a different key takes over while the signal stays
/// strong. The latch is released only after both magnitudes drop below
/// `threshold * release_ratio`.
#[derive(Debug, Clone)]
pub struct Detector {
    threshold: f32,
    release_ratio: f32,
    last_key: Option<char>,
    count: u64,
    history: KeyHistory,
}

impl Detector {
    /// Thresholds are expected to be validated by the caller.
    pub fn new(threshold: f32, release_ratio: f32, history_len: usize) -> Self {
        Self {
            threshold,
            release_ratio,
            last_key: None,
            count: 0,
            history: KeyHistory::new(history_len),
        }
    }

    /// Apply one block's classification and report a new key, if any.
    pub fn update(&mut self, result: &DetectionResult) -> Option<DetectionEvent> {
        if result.is_strong(self.threshold) {
            let (key, row, col) = match (result.key, result.row, result.col) {
                (Some(key), Some(row), Some(col)) => (key, row, col),
                _ => return None,
            };
            if self.last_key == Some(key) {
                return None;
            }
            self.last_key = Some(key);
            self.count += 1;
            self.history.push(key);
            return Some(DetectionEvent {
                key,
                count: self.count,
                row,
                col,
                row_magnitude: result.max_row,
                col_magnitude: result.max_col,
            });
        }

        let release = self.release_level();
        if self.last_key.is_some() && result.max_row < release && result.max_col < release {
            self.last_key = None;
        }
        None
    }

    /// Forget the latched key, the counter and the history.
    pub fn reset(&mut self) {
        self.last_key = None;
        self.count = 0;
        self.history.clear();
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub(crate) fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn release_ratio(&self) -> f32 {
        self.release_ratio
    }

    /// Level both magnitudes must fall below to release a latched key.
    pub fn release_level(&self) -> f32 {
        self.threshold * self.release_ratio
    }

    /// The latched key; `None` while quiet.
    pub fn last_key(&self) -> Option<char> {
        self.last_key
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn history(&self) -> &KeyHistory {
        &self.history
    }
}
