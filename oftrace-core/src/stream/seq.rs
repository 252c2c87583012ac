//! Wraparound-aware TCP sequence number arithmetic.

use std::cmp::Ordering;

/// Default comparison window (2^20 bytes).
pub const DEFAULT_SEQ_WINDOW: u32 = 1 << 20;

/// Orders 32-bit sequence numbers across wraparound.
///
/// Two numbers closer than `window` compare numerically. A larger apparent
/// distance is taken as evidence of wraparound, so the numerically smaller
/// one is the later of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    window: u32,
}

impl SeqSpace {
    pub fn new(window: u32) -> Self {
        Self { window }
    }

    /// Compare `a` and `b` in wire order.
    pub fn cmp(&self, a: u32, b: u32) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (lo, hi, a_is_lo) = if a < b { (a, b, true) } else { (b, a, false) };
        let wrapped = hi - lo >= self.window;
        match (a_is_lo, wrapped) {
            (true, false) | (false, true) => Ordering::Less,
            (true, true) | (false, false) => Ordering::Greater,
        }
    }

    #[inline]
    pub fn lt(&self, a: u32, b: u32) -> bool {
        self.cmp(a, b) == Ordering::Less
    }

    #[inline]
    pub fn le(&self, a: u32, b: u32) -> bool {
        self.cmp(a, b) != Ordering::Greater
    }

    /// Byte distance from `from` forward to `to`. Callers must have
    /// established `from <= to` in wire order.
    #[inline]
    pub fn distance(from: u32, to: u32) -> usize {
        to.wrapping_sub(from) as usize
    }
}

impl Default for SeqSpace {
    fn default() -> Self {
        Self::new(DEFAULT_SEQ_WINDOW)
    }
}

#[inline]
pub fn seq_add(a: u32, n: usize) -> u32 {
    a.wrapping_add(n as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ordering() {
        let space = SeqSpace::default();
        assert!(space.lt(100, 200));
        assert!(!space.lt(200, 100));
        assert_eq!(space.cmp(5, 5), Ordering::Equal);
        assert!(space.le(5, 5));
    }

    #[test]
    fn test_wraparound_ordering() {
        let space = SeqSpace::default();
        assert!(space.lt(0xFFFF_FFF0, 0x0000_0010));
        assert!(!space.lt(0x0000_0010, 0xFFFF_FFF0));
        assert_eq!(space.cmp(0x0000_0010, 0xFFFF_FFF0), Ordering::Greater);
    }

    #[test]
    fn test_window_boundary() {
        let space = SeqSpace::new(1000);
        // Just inside the window: numeric order
        assert!(space.lt(0, 999));
        // At the window: treated as wraparound
        assert!(space.lt(1000, 0));
    }

    #[test]
    fn test_distance_and_add() {
        assert_eq!(SeqSpace::distance(0xFFFF_FFF0, 0x10), 0x20);
        assert_eq!(seq_add(u32::MAX, 2), 1);
    }
}
