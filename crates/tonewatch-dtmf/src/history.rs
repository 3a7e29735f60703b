use std::collections::VecDeque;
use std::fmt;

/// Recently emitted keys, oldest first, holding at most `capacity` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHistory {
    cap: usize,
    keys: VecDeque<char>,
}

impl KeyHistory {
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self {
            cap,
            keys: VecDeque::with_capacity(cap),
        }
    }

    /// Append a key, evicting and returning the oldest one when full.
    pub fn push(&mut self, key: char) -> Option<char> {
        let evicted = if self.keys.len() == self.cap {
            self.keys.pop_front()
        } else {
            None
        };
        self.keys.push_back(key);
        evicted
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.keys.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<char> {
        self.iter().collect()
    }
}

impl fmt::Display for KeyHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in self.iter() {
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut history = KeyHistory::new(3);
        assert_eq!(history.push('1'), None);
        assert_eq!(history.push('2'), None);
        assert_eq!(history.push('3'), None);
        assert_eq!(history.push('4'), Some('1'));
        assert_eq!(history.to_vec(), vec!['2', '3', '4']);
        assert_eq!(history.iter().last(), Some('4'));
    }

    #[test]
    fn keeps_twelve_most_recent() {
        let mut history = KeyHistory::new(12);
        for key in "0123456789*#ABCD".chars() {
            history.push(key);
        }
        assert_eq!(history.len(), 12);
        assert_eq!(history.to_string(), "456789*#ABCD");
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut history = KeyHistory::new(0);
        history.push('7');
        assert_eq!(history.push('8'), Some('7'));
        assert_eq!(history.capacity(), 1);
    }

    #[test]
    fn clear_empties() {
        let mut history = KeyHistory::new(4);
        history.push('#');
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.to_string(), "");
    }
}
