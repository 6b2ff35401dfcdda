//! Bit groups <-> constellation points.
//!
//! Each symbol carries `bits_per_symbol` bits: the first half is read as
//! the unsigned MSB-first x coordinate, the second half as y.

use super::bits::BitStream;
use super::config::{ModulationOrder, OverflowPolicy};
use tracing::trace;

/// A constellation point. Coordinates are wide enough to hold a 32-bit
/// magnitude plus whatever the channel noise adds, sign included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub x: i64,
    pub y: i64,
}

impl Symbol {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SymbolMapper {
    order: ModulationOrder,
    overflow: OverflowPolicy,
}

impl SymbolMapper {
    pub fn new(order: ModulationOrder, overflow: OverflowPolicy) -> Self {
        Self { order, overflow }
    }

    pub fn order(&self) -> ModulationOrder {
        self.order
    }

    /// Bits `modulate` will drop from a stream of `len` bits.
    pub fn remainder_bits(&self, len: usize) -> usize {
        len % self.order.bits_per_symbol()
    }

    /// Map consecutive groups of `bits_per_symbol` bits to symbols.
    ///
    /// A trailing group shorter than a full symbol is dropped; callers that
    /// need every bit must pad first (see [`SymbolMapper::remainder_bits`]).
    pub fn modulate(&self, bits: &[u8]) -> Vec<Symbol> {
        let bits_per_symbol = self.order.bits_per_symbol();
        let half = self.order.bits_per_coordinate();

        let dropped = self.remainder_bits(bits.len());
        if dropped > 0 {
            trace!("modulate: dropping {} trailing bits", dropped);
        }

        bits.chunks_exact(bits_per_symbol)
            .map(|group| {
                Symbol::new(bits_to_value(&group[..half]), bits_to_value(&group[half..]))
            })
            .collect()
    }

    /// Inverse of [`SymbolMapper::modulate`]: x bits then y bits per symbol,
    /// `bits_per_coordinate` each, whatever the coordinate's magnitude.
    pub fn demodulate(&self, symbols: &[Symbol]) -> BitStream {
        let half = self.order.bits_per_coordinate();
        let mut bits = Vec::with_capacity(symbols.len() * self.order.bits_per_symbol());

        for symbol in symbols {
            push_bits(&mut bits, self.decode_coordinate(symbol.x), half);
            push_bits(&mut bits, self.decode_coordinate(symbol.y), half);
        }

        bits
    }

    /// Bring a received coordinate back into `bits_per_coordinate` bits.
    pub fn decode_coordinate(&self, value: i64) -> u64 {
        let max = self.order.max_coordinate();
        match self.overflow {
            OverflowPolicy::Clamp => value.clamp(0, max) as u64,
            OverflowPolicy::Wrap => (value as u64) & max as u64,
        }
    }
}

fn bits_to_value(bits: &[u8]) -> i64 {
    bits.iter()
        .fold(0i64, |value, &bit| (value << 1) | (bit & 1) as i64)
}

fn push_bits(out: &mut BitStream, value: u64, width: usize) {
    for shift in (0..width).rev() {
        out.push(((value >> shift) & 1) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(points: u128, overflow: OverflowPolicy) -> SymbolMapper {
        SymbolMapper::new(ModulationOrder::from_points(points).unwrap(), overflow)
    }

    #[test]
    fn test_sixteen_point_symbol() {
        let mapper = mapper(16, OverflowPolicy::Clamp);
        let symbols = mapper.modulate(&[1, 0, 1, 1]);
        assert_eq!(symbols, vec![Symbol::new(2, 3)]);
        assert_eq!(mapper.demodulate(&symbols), vec![1, 0, 1, 1]);
    }

    #[test]
    fn test_symbol_order_preserved() {
        let mapper = mapper(4, OverflowPolicy::Clamp);
        let bits = [0, 1, 1, 0, 1, 1, 0, 0];
        let symbols = mapper.modulate(&bits);
        assert_eq!(
            symbols,
            vec![
                Symbol::new(0, 1),
                Symbol::new(1, 0),
                Symbol::new(1, 1),
                Symbol::new(0, 0)
            ]
        );
        assert_eq!(mapper.demodulate(&symbols), bits.to_vec());
    }

    #[test]
    fn test_trailing_partial_symbol_dropped() {
        let mapper = mapper(16, OverflowPolicy::Clamp);
        let bits = [1, 0, 1, 1, 0, 1, 1];
        assert_eq!(mapper.remainder_bits(bits.len()), 3);

        let symbols = mapper.modulate(&bits);
        assert_eq!(symbols.len(), 1);
        assert_eq!(mapper.demodulate(&symbols), vec![1, 0, 1, 1]);

        assert!(mapper.modulate(&[1, 1, 1]).is_empty());
    }

    #[test]
    fn test_reference_order_full_width() {
        let mapper = SymbolMapper::new(
            ModulationOrder::from_bit_level(64).unwrap(),
            OverflowPolicy::Clamp,
        );
        let mut bits = vec![1u8; 32];
        bits.extend(vec![0u8; 31]);
        bits.push(1);

        let symbols = mapper.modulate(&bits);
        assert_eq!(symbols, vec![Symbol::new(u32::MAX as i64, 1)]);
        assert_eq!(mapper.demodulate(&symbols), bits);
    }

    #[test]
    fn test_clamp_saturates_out_of_range() {
        let mapper = mapper(16, OverflowPolicy::Clamp);
        assert_eq!(mapper.decode_coordinate(-1), 0);
        assert_eq!(mapper.decode_coordinate(4), 3);
        assert_eq!(mapper.decode_coordinate(i64::MIN), 0);
        assert_eq!(mapper.demodulate(&[Symbol::new(-1, 4)]), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_wrap_keeps_low_bits() {
        let mapper = mapper(16, OverflowPolicy::Wrap);
        assert_eq!(mapper.decode_coordinate(-1), 3);
        assert_eq!(mapper.decode_coordinate(4), 0);
        assert_eq!(mapper.decode_coordinate(5), 1);
        assert_eq!(mapper.demodulate(&[Symbol::new(-1, 4)]), vec![1, 1, 0, 0]);
    }
}
