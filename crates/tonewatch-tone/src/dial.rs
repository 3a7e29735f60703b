use phf::phf_map;
use thiserror::Error;

/// Keypad (row, column) for each dialable symbol.
static KEYPAD: phf::Map<char, (usize, usize)> = phf_map! {
    '1' => (0, 0),
    '2' => (0, 1),
    '3' => (0, 2),
    'A' => (0, 3),
    '4' => (1, 0),
    '5' => (1, 1),
    '6' => (1, 2),
    'B' => (1, 3),
    '7' => (2, 0),
    '8' => (2, 1),
    '9' => (2, 2),
    'C' => (2, 3),
    '*' => (3, 0),
    '0' => (3, 1),
    '#' => (3, 2),
    'D' => (3, 3),
};

/// One step of a dial sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialSymbol {
    /// A key tone at the given keypad position.
    Key { key: char, row: usize, col: usize },
    /// Silence lasting one pause unit.
    Pause,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("unknown dial symbol {symbol:?} at byte {pos}")]
    UnknownSymbol { symbol: char, pos: usize },
}

/// Parse a dial string such as `"555-0123#"` into symbols.
///
/// `,` inserts a pause; whitespace, `-`, `(`, `)` and `.` are separators.
pub fn encode_dial(text: &str) -> Result<Vec<DialSymbol>, EncodeError> {
    let mut symbols = Vec::with_capacity(text.len());
    for (pos, ch) in text.char_indices() {
        if ch == ',' {
            symbols.push(DialSymbol::Pause);
            continue;
        }
        if ch.is_whitespace() || matches!(ch, '-' | '(' | ')' | '.') {
            continue;
        }
        let key = ch.to_ascii_uppercase();
        let &(row, col) = KEYPAD
            .get(&key)
            .ok_or(EncodeError::UnknownSymbol { symbol: ch, pos })?;
        symbols.push(DialSymbol::Key { key, row, col });
    }
    Ok(symbols)
}
