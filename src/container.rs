//! Sequences, sets, and maps, each a 4-byte element count followed by the elements.
//!
//! The element codec is passed in, so the same framing serves a list of items, a set of flags,
//! or a map keyed by level.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::marshal::{Marshaller, Unmarshaller};

fn write_count(m: &mut Marshaller, n: usize) {
    m.write_u32(n as u32);
}

/// Read an element count and check it before anything is allocated for it. Every element takes
/// at least one byte, so a count larger than what's left can't be right either.
pub fn read_count(r: &mut Unmarshaller<'_>) -> Result<usize> {
    let n = r.read_u32()? as usize;
    let max = r.context().limits.max_count;
    if n > max {
        return Err(Error::Format(format!(
            "element count {} is over the limit of {}",
            n, max
        )));
    }
    if n > r.remaining() {
        return Err(Error::Format(format!(
            "element count {} but only {} bytes remain",
            n,
            r.remaining()
        )));
    }
    Ok(n)
}

pub fn marshal_sequence<'i, T, I, F>(m: &mut Marshaller, items: I, mut elem: F)
where
    T: 'i,
    I: IntoIterator<Item = &'i T>,
    I::IntoIter: ExactSizeIterator,
    F: FnMut(&mut Marshaller, &T),
{
    let items = items.into_iter();
    write_count(m, items.len());
    for item in items {
        elem(m, item);
    }
}

pub fn unmarshal_sequence<'a, T, F>(r: &mut Unmarshaller<'a>, mut elem: F) -> Result<Vec<T>>
where
    F: FnMut(&mut Unmarshaller<'a>) -> Result<T>,
{
    let n = read_count(r)?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(elem(r)?);
    }
    Ok(out)
}

pub fn marshal_set<T, F>(m: &mut Marshaller, set: &BTreeSet<T>, elem: F)
where
    F: FnMut(&mut Marshaller, &T),
{
    marshal_sequence(m, set, elem)
}

/// Duplicates in the stream collapse into one element.
pub fn unmarshal_set<'a, T, F>(r: &mut Unmarshaller<'a>, mut elem: F) -> Result<BTreeSet<T>>
where
    T: Ord,
    F: FnMut(&mut Unmarshaller<'a>) -> Result<T>,
{
    let n = read_count(r)?;
    let mut out = BTreeSet::new();
    for _ in 0..n {
        out.insert(elem(r)?);
    }
    Ok(out)
}

pub fn marshal_map<K, V, FK, FV>(m: &mut Marshaller, map: &BTreeMap<K, V>, mut key: FK, mut value: FV)
where
    FK: FnMut(&mut Marshaller, &K),
    FV: FnMut(&mut Marshaller, &V),
{
    write_count(m, map.len());
    for (k, v) in map {
        key(m, k);
        value(m, v);
    }
}

/// A repeated key keeps the last value.
pub fn unmarshal_map<'a, K, V, FK, FV>(
    r: &mut Unmarshaller<'a>,
    mut key: FK,
    mut value: FV,
) -> Result<BTreeMap<K, V>>
where
    K: Ord,
    FK: FnMut(&mut Unmarshaller<'a>) -> Result<K>,
    FV: FnMut(&mut Unmarshaller<'a>) -> Result<V>,
{
    let n = read_count(r)?;
    let mut out = BTreeMap::new();
    for _ in 0..n {
        let k = key(r)?;
        let v = value(r)?;
        out.insert(k, v);
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::{DecodeContext, Limits};

    fn reader(buf: &[u8]) -> Unmarshaller<'_> {
        Unmarshaller::new(buf, DecodeContext::current())
    }

    mod roundtrip {
        use super::*;

        #[test]
        fn sequence() {
            let items = vec![1u16, 300, 65535];
            let mut m = Marshaller::new();
            marshal_sequence(&mut m, &items, |m, v| m.write_u16(*v));
            let buf = m.into_inner();
            assert_eq!(&buf[..4], &[0, 0, 0, 3]);
            let mut r = reader(&buf);
            assert_eq!(unmarshal_sequence(&mut r, |r| r.read_u16()).unwrap(), items);
            assert!(r.is_empty());
        }

        #[test]
        fn empty_sequence() {
            let items: Vec<String> = Vec::new();
            let mut m = Marshaller::new();
            marshal_sequence(&mut m, &items, |m, v| m.write_string(v));
            let buf = m.into_inner();
            assert_eq!(buf, vec![0, 0, 0, 0]);
            let got = unmarshal_sequence(&mut reader(&buf), |r| r.read_string()).unwrap();
            assert!(got.is_empty());
        }

        #[test]
        fn set_and_map() {
            let set: BTreeSet<String> = ["orc", "elf", "dwarf"].iter().map(|s| s.to_string()).collect();
            let mut map = BTreeMap::new();
            map.insert(3u8, vec![-1i32, 2]);
            map.insert(1u8, vec![]);

            let mut m = Marshaller::new();
            marshal_set(&mut m, &set, |m, v| m.write_string(v));
            marshal_map(
                &mut m,
                &map,
                |m, k| m.write_u8(*k),
                |m, v| marshal_sequence(m, v, |m, x| m.write_signed(*x as i64)),
            );
            let buf = m.into_inner();

            let mut r = reader(&buf);
            assert_eq!(unmarshal_set(&mut r, |r| r.read_string()).unwrap(), set);
            let got = unmarshal_map(
                &mut r,
                |r| r.read_u8(),
                |r| unmarshal_sequence(r, |r| r.read_signed().map(|v| v as i32)),
            )
            .unwrap();
            assert_eq!(got, map);
            assert!(r.is_empty());
        }
    }

    mod spec {
        use super::*;

        #[test]
        fn set_duplicates_collapse() {
            let buf = [0, 0, 0, 3, 5, 5, 6];
            let set = unmarshal_set(&mut reader(&buf), |r| r.read_u8()).unwrap();
            assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![5, 6]);
        }

        #[test]
        fn map_duplicate_keeps_last() {
            let buf = [0, 0, 0, 2, 1, 10, 1, 20];
            let map = unmarshal_map(&mut reader(&buf), |r| r.read_u8(), |r| r.read_u8()).unwrap();
            assert_eq!(map.len(), 1);
            assert_eq!(map[&1], 20);
        }

        #[test]
        fn count_over_limit_is_rejected_before_reading() {
            let limits = Limits::new().max_count(2);
            let buf = [0, 0, 0, 3, 1, 2, 3];
            let mut r = Unmarshaller::new(&buf, DecodeContext::current().with_limits(limits));
            let mut calls = 0;
            let res = unmarshal_sequence(&mut r, |r| {
                calls += 1;
                r.read_u8()
            });
            assert!(matches!(res, Err(Error::Format(_))));
            assert_eq!(calls, 0);
        }

        #[test]
        fn count_larger_than_data() {
            let buf = [0xff, 0xff, 0xff, 0xff, 1];
            let res = unmarshal_sequence(&mut reader(&buf), |r| r.read_u8());
            assert!(matches!(res, Err(Error::Format(_))));
        }
    }

    mod not_enough_bytes {
        use super::*;

        #[test]
        fn truncated_elements() {
            let items = vec![0x0102_0304u32, 5];
            let mut m = Marshaller::new();
            marshal_sequence(&mut m, &items, |m, v| m.write_u32(*v));
            let buf = m.into_inner();
            for cut in 0..buf.len() {
                let res = unmarshal_sequence(&mut reader(&buf[..cut]), |r| r.read_u32());
                assert!(res.is_err(), "cut at {}", cut);
            }
        }
    }
}
