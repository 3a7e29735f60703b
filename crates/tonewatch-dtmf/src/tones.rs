//! Fixed DTMF tone set and keypad layout.

/// Number of target frequencies in the filter bank.
pub const TOTAL_BINS: usize = 8;

/// Number of tones in each of the low (row) and high (column) groups.
pub const GROUP_LEN: usize = 4;

/// Maps (row index, column index) to a key symbol.
pub type KeyMatrix = [[char; GROUP_LEN]; GROUP_LEN];

/// Standard DTMF keypad.
pub const DTMF_KEYS: KeyMatrix = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// A single tone the filter bank listens for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetFrequency {
    pub label: &'static str,
    pub freq_hz: f32,
}

impl TargetFrequency {
    pub const fn new(label: &'static str, freq_hz: f32) -> Self {
        Self { label, freq_hz }
    }
}

/// Indices 0..4 are the row group, 4..8 the column group. The order must
/// stay in step with [`DTMF_KEYS`].
pub const DTMF_TONES: [TargetFrequency; TOTAL_BINS] = [
    TargetFrequency::new("697Hz", 697.0),
    TargetFrequency::new("770Hz", 770.0),
    TargetFrequency::new("852Hz", 852.0),
    TargetFrequency::new("941Hz", 941.0),
    TargetFrequency::new("1209Hz", 1209.0),
    TargetFrequency::new("1336Hz", 1336.0),
    TargetFrequency::new("1477Hz", 1477.0),
    TargetFrequency::new("1633Hz", 1633.0),
];

/// Find the (row, column) position of a key on the keypad.
pub fn key_position(key: char) -> Option<(usize, usize)> {
    let key = key.to_ascii_uppercase();
    DTMF_KEYS.iter().enumerate().find_map(|(row, keys)| {
        keys.iter()
            .position(|&k| k == key)
            .map(|col| (row, col))
    })
}

/// Row and column frequencies for a key.
pub fn key_frequencies(key: char) -> Option<(f32, f32)> {
    let (row, col) = key_position(key)?;
    Some((DTMF_TONES[row].freq_hz, DTMF_TONES[GROUP_LEN + col].freq_hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_has_a_position() {
        for (row, keys) in DTMF_KEYS.iter().enumerate() {
            for (col, &key) in keys.iter().enumerate() {
                assert_eq!(key_position(key), Some((row, col)));
            }
        }
    }

    #[test]
    fn lowercase_letters_resolve() {
        assert_eq!(key_position('d'), Some((3, 3)));
        assert_eq!(key_frequencies('b'), Some((770.0, 1633.0)));
    }

    #[test]
    fn unknown_key_has_no_position() {
        assert_eq!(key_position('E'), None);
        assert_eq!(key_frequencies(' '), None);
    }

    #[test]
    fn row_group_is_below_column_group() {
        let max_row = DTMF_TONES[..GROUP_LEN]
            .iter()
            .map(|t| t.freq_hz)
            .fold(0.0, f32::max);
        assert!(DTMF_TONES[GROUP_LEN..].iter().all(|t| t.freq_hz > max_row));
    }
}
