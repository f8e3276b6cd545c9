//! Bit-packed signal layout
//!
//! Signals are grouped `WORD_BITS` at a time into `u32` words. These helpers map
//! between global signal indices and (word, bit) pairs, toggle single bits and
//! find the most significant bit that differs between two words.

/// Number of signals packed into one word
pub const WORD_BITS: usize = u32::BITS as usize;

/// floor(log2(i)) for every non-zero byte; entry 0 is never consulted
static LOG_TABLE_256: [u8; 256] = build_log_table();

const fn build_log_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 2;
    while i < 256 {
        table[i] = table[i / 2] + 1;
        i += 1;
    }
    table
}

/// Map a global signal index to `(word_index, bit_index)`
#[inline]
pub fn locate(signal: usize) -> (usize, u32) {
    (signal / WORD_BITS, (signal % WORD_BITS) as u32)
}

/// Inverse of [`locate`]
#[inline]
pub fn global_index(word: usize, bit: u32) -> usize {
    word * WORD_BITS + bit as usize
}

/// Number of words needed to hold `signals` bits
#[inline]
pub fn words_for(signals: usize) -> usize {
    signals.div_ceil(WORD_BITS)
}

/// Flip `bit` in `word`; returns the new word and whether the bit is now set
#[inline]
pub fn toggle(word: u32, bit: u32) -> (u32, bool) {
    let new_word = word ^ (1 << bit);
    (new_word, (new_word >> bit) & 1 == 1)
}

/// Index of the most significant bit that differs between `current` and `old`
///
/// Looks up the highest non-zero byte of `current ^ old` in a 256-entry log2
/// table. The words must differ.
#[inline]
pub fn msb_changed(current: u32, old: u32) -> u32 {
    let diff = current ^ old;
    debug_assert_ne!(diff, 0, "msb_changed called on equal words");

    let high = diff >> 16;
    if high != 0 {
        let top = high >> 8;
        if top != 0 {
            24 + u32::from(LOG_TABLE_256[top as usize])
        } else {
            16 + u32::from(LOG_TABLE_256[high as usize])
        }
    } else {
        let mid = diff >> 8;
        if mid != 0 {
            8 + u32::from(LOG_TABLE_256[mid as usize])
        } else {
            u32::from(LOG_TABLE_256[diff as usize])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_msb(a: u32, b: u32) -> u32 {
        31 - (a ^ b).leading_zeros()
    }

    #[test]
    fn test_log_table() {
        assert_eq!(LOG_TABLE_256[1], 0);
        assert_eq!(LOG_TABLE_256[2], 1);
        assert_eq!(LOG_TABLE_256[3], 1);
        assert_eq!(LOG_TABLE_256[16], 4);
        assert_eq!(LOG_TABLE_256[255], 7);
    }

    #[test]
    fn test_locate_roundtrip() {
        for signal in 0..1000 {
            let (word, bit) = locate(signal);
            assert!(bit < WORD_BITS as u32);
            assert_eq!(global_index(word, bit), signal);
        }
        assert_eq!(locate(33), (1, 1));
    }

    #[test]
    fn test_words_for() {
        assert_eq!(words_for(1), 1);
        assert_eq!(words_for(32), 1);
        assert_eq!(words_for(33), 2);
        assert_eq!(words_for(200), 7);
    }

    #[test]
    fn test_toggle_twice() {
        let (once, active) = toggle(0, 5);
        assert!(active);
        assert_eq!(once, 1 << 5);

        let (twice, active) = toggle(once, 5);
        assert!(!active);
        assert_eq!(twice, 0);
    }

    #[test]
    fn test_msb_single_bits() {
        for bit in 0..32 {
            assert_eq!(msb_changed(1 << bit, 0), bit);
            assert_eq!(msb_changed(0, 1 << bit), bit);
        }
    }

    #[test]
    fn test_msb_picks_highest() {
        assert_eq!(msb_changed(0b1010, 0), 3);
        assert_eq!(msb_changed(0xFFFF_FFFF, 0x7FFF_FFFF), 31);
        assert_eq!(msb_changed(0x0001_0100, 0x0000_0100), 16);
    }

    #[test]
    fn test_msb_small_exhaustive() {
        for a in 0u32..512 {
            for b in 0u32..512 {
                if a != b {
                    assert_eq!(msb_changed(a, b), reference_msb(a, b));
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_msb_matches_leading_zeros(a: u32, b: u32) {
            prop_assume!(a != b);
            prop_assert_eq!(msb_changed(a, b), reference_msb(a, b));
        }
    }
}
