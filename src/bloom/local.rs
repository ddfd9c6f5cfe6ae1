//! In-process Bloom filter: a 64-bit word array sized so
//! `len(words) * 64 ≈ 8 * maxDocCount` bits, tested/set by five hash
//! functions over the seed set {31, 37, 61, 17, 13}.

use parking_lot::Mutex;

use super::{hash_bit, SEEDS};

pub struct LocalBloomFilter {
    words: Mutex<Vec<u64>>,
    bit_count: u64,
}

impl LocalBloomFilter {
    /// `max_doc_count` sizes the filter at roughly 8 bits per expected URL,
    /// the design point for a ~1% false-positive rate.
    pub fn new(max_doc_count: usize) -> Self {
        let bit_count = (max_doc_count as u64 * 8).max(64);
        let word_count = ((bit_count + 63) / 64) as usize;
        LocalBloomFilter {
            words: Mutex::new(vec![0u64; word_count]),
            bit_count: word_count as u64 * 64,
        }
    }

    fn bit_positions(&self, url: &str) -> [u64; 5] {
        let mut positions = [0u64; 5];
        for (i, seed) in SEEDS.iter().enumerate() {
            positions[i] = hash_bit(url, *seed, self.bit_count);
        }
        positions
    }

    /// True only if all five bits are set.
    pub fn has(&self, url: &str) -> bool {
        let positions = self.bit_positions(url);
        let words = self.words.lock();
        positions.iter().all(|&bit| {
            let word = (bit / 64) as usize;
            let offset = bit % 64;
            words[word] & (1u64 << offset) != 0
        })
    }

    /// Sets all five bits for `url`.
    pub fn add(&self, url: &str) {
        let positions = self.bit_positions(url);
        let mut words = self.words.lock();
        for bit in positions {
            let word = (bit / 64) as usize;
            let offset = bit % 64;
            words[word] |= 1u64 << offset;
        }
    }

    /// Clears every bit; a refresh operation, not part of normal crawl flow.
    pub fn clear(&self) {
        let mut words = self.words.lock();
        words.iter_mut().for_each(|w| *w = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_url_is_then_present() {
        let filter = LocalBloomFilter::new(1_000);
        assert!(!filter.has("http://example.com/a"));
        filter.add("http://example.com/a");
        assert!(filter.has("http://example.com/a"));
    }

    #[test]
    fn false_positive_rate_is_bounded_over_random_non_members() {
        let filter = LocalBloomFilter::new(10_000);
        for i in 0..10_000 {
            filter.add(&format!("http://example.com/seen/{i}"));
        }
        let mut false_positives = 0;
        for i in 0..10_000 {
            if filter.has(&format!("http://example.com/unseen/{i}")) {
                false_positives += 1;
            }
        }
        // design sizing targets ~1%; allow generous slack for the simple hash scheme
        assert!(false_positives < 1_000, "false positive count too high: {false_positives}");
    }

    #[test]
    fn clear_resets_all_bits() {
        let filter = LocalBloomFilter::new(1_000);
        filter.add("http://example.com/a");
        filter.clear();
        assert!(!filter.has("http://example.com/a"));
    }
}
