//! Fixed-size bit vectors.
//!
//! On the wire each byte carries 7 bits, lowest index first, in its low bits. The last byte has
//! its high bit set. Bytes are only emitted up to the one holding the highest set bit, so an
//! all-clear vector is the single byte `0x80`, and a vector can grow without breaking old saves.

use std::fmt;

use crate::error::{Error, Result};
use crate::marshal::{Marshaller, Unmarshaller};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedBitVec<const N: usize> {
    bits: [bool; N],
}

impl<const N: usize> FixedBitVec<N> {
    pub fn new() -> Self {
        Self { bits: [false; N] }
    }

    pub fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    /// Out-of-range indices read as clear.
    pub fn get(&self, i: usize) -> bool {
        self.bits.get(i).copied().unwrap_or(false)
    }

    /// # Panics
    /// Panics if `i >= N`.
    pub fn set(&mut self, i: usize, v: bool) {
        self.bits[i] = v;
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, b)| if *b { Some(i) } else { None })
    }

    pub fn marshal(&self, m: &mut Marshaller) {
        let used = self.bits.iter().rposition(|b| *b).map_or(0, |i| i + 1);
        let n_bytes = ((used + 6) / 7).max(1);
        for byte_idx in 0..n_bytes {
            let mut byte = 0u8;
            for bit in 0..7 {
                if self.get(byte_idx * 7 + bit) {
                    byte |= 1 << bit;
                }
            }
            if byte_idx + 1 == n_bytes {
                byte |= 0x80;
            }
            m.write_u8(byte);
        }
    }

    pub fn unmarshal(r: &mut Unmarshaller<'_>) -> Result<Self> {
        let max_bytes = (N + 6) / 7 + 1;
        let mut out = Self::new();
        for byte_idx in 0..max_bytes {
            let byte = r.read_u8()?;
            for bit in 0..7 {
                if byte & (1 << bit) != 0 {
                    let i = byte_idx * 7 + bit;
                    if i >= N {
                        return Err(Error::Format(format!(
                            "bit {} set in a {}-bit vector",
                            i, N
                        )));
                    }
                    out.bits[i] = true;
                }
            }
            if byte & 0x80 != 0 {
                return Ok(out);
            }
        }
        Err(Error::Format(format!(
            "{}-bit vector runs past {} bytes without an end marker",
            N, max_bytes
        )))
    }
}

impl<const N: usize> Default for FixedBitVec<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FixedBitVec<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter_ones()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::DecodeContext;

    fn encode<const N: usize>(v: &FixedBitVec<N>) -> Vec<u8> {
        let mut m = Marshaller::new();
        v.marshal(&mut m);
        m.into_inner()
    }

    fn decode<const N: usize>(buf: &[u8]) -> Result<FixedBitVec<N>> {
        let mut r = Unmarshaller::new(buf, DecodeContext::current());
        let v = FixedBitVec::<N>::unmarshal(&mut r)?;
        r.expect_end("bits")?;
        Ok(v)
    }

    #[test]
    fn empty_is_one_byte() {
        assert_eq!(encode(&FixedBitVec::<20>::new()), vec![0x80]);
        assert_eq!(encode(&FixedBitVec::<0>::new()), vec![0x80]);
        assert_eq!(decode::<20>(&[0x80]).unwrap(), FixedBitVec::new());
    }

    #[test]
    fn stops_at_highest_set_bit() {
        let mut v = FixedBitVec::<20>::new();
        v.set(0, true);
        v.set(2, true);
        assert_eq!(encode(&v), vec![0x85]);
        v.set(7, true);
        assert_eq!(encode(&v), vec![0x05, 0x81]);
        v.set(19, true);
        assert_eq!(encode(&v), vec![0x05, 0x01, 0x80 | 0x20]);
        assert_eq!(decode::<20>(&encode(&v)).unwrap(), v);
        assert_eq!(v.count_ones(), 4);
        assert_eq!(v.iter_ones().collect::<Vec<_>>(), vec![0, 2, 7, 19]);
    }

    #[test]
    fn every_single_bit() {
        for i in 0..30 {
            let mut v = FixedBitVec::<30>::new();
            v.set(i, true);
            let enc = encode(&v);
            assert_eq!(enc.len(), i / 7 + 1);
            assert_eq!(decode::<30>(&enc).unwrap(), v);
        }
    }

    #[test]
    fn shorter_vector_reads_into_longer() {
        let mut old = FixedBitVec::<5>::new();
        old.set(4, true);
        let grown = decode::<12>(&encode(&old)).unwrap();
        assert!(grown.get(4));
        assert_eq!(grown.count_ones(), 1);
    }

    #[test]
    fn bit_out_of_range() {
        // Bit 5 of a 4-bit vector
        assert!(matches!(decode::<4>(&[0xa0]), Err(Error::Format(_))));
    }

    #[test]
    fn missing_end_marker() {
        assert!(decode::<7>(&[0x01]).unwrap_err().is_short_read());
        assert!(matches!(
            decode::<7>(&[0x00, 0x00, 0x80]),
            Err(Error::Format(_))
        ));
    }
}
