//! # Bitmasks
//!
//! Growable bit vectors backed by `u64` words. Alive sets, component
//! membership and tag membership are all `Bits`, so entity queries reduce
//! to word-parallel AND / AND-NOT passes.

use std::fmt;

/// Number of bits stored per backing word.
const WORD_BITS: usize = 64;

#[inline]
const fn words_for(bits: usize) -> usize {
    (bits + WORD_BITS - 1) / WORD_BITS
}

/// Growable bit vector.
///
/// Reads beyond the backing storage return `false`; writes grow it.
/// Equality is logical: two masks with the same set bits are equal even if
/// one carries extra zero words.
#[derive(Clone, Default)]
pub struct Bits {
    words: Vec<u64>,
}

impl Bits {
    /// Creates an empty mask with no backing storage.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates an all-zero mask able to hold `bits` bits without growing.
    #[must_use]
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; words_for(bits)],
        }
    }

    /// Number of bits that fit in the current backing storage.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    /// Raw backing words, lowest indices first.
    #[inline]
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns the bit at `index`; `false` when out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1 << (index % WORD_BITS)) != 0)
    }

    /// Sets the bit at `index`, growing storage when needed.
    #[inline]
    pub fn set(&mut self, index: usize) {
        self.grow_to_index(index);
        self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
    }

    /// Clears the bit at `index`. Out of range indices are ignored.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1 << (index % WORD_BITS));
        }
    }

    /// Grows storage so that `index` is addressable.
    pub fn grow_to_index(&mut self, index: usize) -> &mut Self {
        let required = index / WORD_BITS + 1;
        if required > self.words.len() {
            self.words.resize(required, 0);
        }
        self
    }

    /// Clears every bit, keeping the backing storage.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Index of the first clear bit at or after `from`.
    ///
    /// Every index beyond the backing storage counts as clear, so this
    /// always returns a value.
    #[must_use]
    pub fn next_clear_bit(&self, from: usize) -> usize {
        let mut word_index = from / WORD_BITS;
        if word_index >= self.words.len() {
            return from;
        }

        let mut free = !self.words[word_index] & (u64::MAX << (from % WORD_BITS));
        loop {
            if free != 0 {
                return word_index * WORD_BITS + free.trailing_zeros() as usize;
            }
            word_index += 1;
            if word_index == self.words.len() {
                return word_index * WORD_BITS;
            }
            free = !self.words[word_index];
        }
    }

    /// `self &= other`. Words missing from `other` count as zero.
    pub fn and(&mut self, other: &Bits) {
        for (index, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(index).copied().unwrap_or(0);
        }
    }

    /// `self &= !other`. Words missing from `other` leave `self` untouched.
    pub fn and_not(&mut self, other: &Bits) {
        for (word, mask) in self.words.iter_mut().zip(&other.words) {
            *word &= !mask;
        }
    }

    /// `self |= other`, growing as needed.
    pub fn or(&mut self, other: &Bits) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, mask) in self.words.iter_mut().zip(&other.words) {
            *word |= mask;
        }
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// True when no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Iterates the indices of set bits in ascending order.
    #[must_use]
    pub fn iter_ones(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl PartialEq for Bits {
    fn eq(&self, other: &Self) -> bool {
        let (short, long) = if self.words.len() <= other.words.len() {
            (&self.words, &other.words)
        } else {
            (&other.words, &self.words)
        };
        short.iter().zip(long.iter()).all(|(a, b)| a == b)
            && long[short.len()..].iter().all(|&word| word == 0)
    }
}

impl Eq for Bits {}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter_ones()).finish()
    }
}

impl FromIterator<usize> for Bits {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bits = Bits::new();
        for index in iter {
            bits.set(index);
        }
        bits
    }
}

/// Ascending iterator over set bit indices. See [`Bits::iter_ones`].
pub struct Ones<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_index * WORD_BITS + bit);
            }
            self.word_index += 1;
            self.current = *self.words.get(self.word_index)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut bits = Bits::new();
        assert!(!bits.get(300));

        bits.set(300);
        assert!(bits.get(300));
        assert!(bits.capacity() >= 301);

        bits.clear(300);
        assert!(!bits.get(300));
        // Clearing past the end is a no-op.
        bits.clear(10_000);
    }

    #[test]
    fn test_next_clear_bit() {
        let mut bits = Bits::new();
        assert_eq!(bits.next_clear_bit(0), 0);

        for i in 0..130 {
            bits.set(i);
        }
        assert_eq!(bits.next_clear_bit(0), 130);

        bits.clear(64);
        assert_eq!(bits.next_clear_bit(0), 64);
        assert_eq!(bits.next_clear_bit(65), 130);
        assert_eq!(bits.next_clear_bit(500), 500);
    }

    #[test]
    fn test_next_clear_bit_full_words() {
        let bits: Bits = (0..128).collect();
        assert_eq!(bits.capacity(), 128);
        assert_eq!(bits.next_clear_bit(0), 128);
    }

    #[test]
    fn test_and_and_not() {
        let mut a: Bits = [1, 2, 3, 100].into_iter().collect();
        let b: Bits = [2, 3, 4].into_iter().collect();
        let c: Bits = [3].into_iter().collect();

        a.and(&b);
        assert_eq!(a.iter_ones().collect::<Vec<_>>(), vec![2, 3]);

        a.and_not(&c);
        assert_eq!(a.iter_ones().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_or_grows() {
        let mut a: Bits = [1].into_iter().collect();
        let b: Bits = [200].into_iter().collect();
        a.or(&b);
        assert_eq!(a.iter_ones().collect::<Vec<_>>(), vec![1, 200]);
    }

    #[test]
    fn test_logical_equality_ignores_trailing_words() {
        let a: Bits = [5].into_iter().collect();
        let mut b = Bits::with_capacity(1024);
        b.set(5);
        assert_eq!(a, b);

        b.set(700);
        assert_ne!(a, b);
    }

    #[test]
    fn test_count_and_empty() {
        let mut bits = Bits::with_capacity(256);
        assert!(bits.is_empty());
        bits.set(0);
        bits.set(255);
        assert_eq!(bits.count_ones(), 2);
        bits.clear_all();
        assert!(bits.is_empty());
        assert_eq!(bits.capacity(), 256);
    }
}
