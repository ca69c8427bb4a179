//! Static quaternary filters: key → small-integer mappings that store no
//! keys.
//!
//! A [`Filter`] is built once from a mapping of byte-string keys to unsigned
//! integers of a fixed bit width. After construction, [`Filter::get`]
//! returns the exact value for every key the filter was built from and an
//! arbitrary value (still within the bit width) for any other key. There
//! is no membership signal and no way to enumerate keys; callers that need
//! to reject false matches must verify the answer against data they hold
//! themselves, which is exactly what the bucket layer does.
//!
//! The construction is the classic peelable 3-wise XOR shape: every key
//! hashes to one slot in each of three equal segments, and the slot words
//! are assigned so the three slots XOR to the key's value. Slot storage is
//! bit-packed at `width` bits per slot; a filter standing in for posting
//! lists cannot afford a machine word per entry.

use std::collections::HashMap;

use rand::thread_rng;
use rand::RngCore;
use siphasher::sip128::SipHasher24;

/// How many fresh hash keys the builder tries before reporting failure.
/// Each attempt succeeds with overwhelming probability at the slot budget
/// used here, so exhausting them indicates something is deeply wrong.
const MAX_KEY_ATTEMPTS: usize = 64;

/// An error constructing a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A mapping value does not fit in the requested bit width.
    ValueTooWide { value: u64, width: u32 },
    /// No attempted hash key produced a peelable slot assignment.
    KeysExhausted { entries: usize },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::ValueTooWide { value, width } => {
                write!(f, "value {value} does not fit in {width} bits")
            }
            BuildError::KeysExhausted { entries } => {
                write!(
                    f,
                    "no peelable hash key found for {entries} entries after {MAX_KEY_ATTEMPTS} attempts"
                )
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// A static map from byte-string keys to `width`-bit unsigned integers.
///
/// Exact for keys present at build time, arbitrary for unknown keys. See
/// the [module docs](self) for the contract and construction.
#[derive(Debug, Clone)]
pub struct Filter {
    sip_key: [u8; 16],
    width: u32,
    seg_len: usize,
    slots: Box<[u64]>,
}

impl Filter {
    /// Builds a filter answering `width`-bit values for every key in
    /// `entries`.
    ///
    /// Peeling retries under fresh hash keys; a bounded number of failed
    /// attempts surfaces [`BuildError::KeysExhausted`]. Panics if `width`
    /// is outside `1..=64`.
    pub fn build<K: AsRef<[u8]>>(
        entries: &HashMap<K, u64>,
        width: u32,
    ) -> Result<Filter, BuildError> {
        assert!(
            (1..=64).contains(&width),
            "filter width must be within 1..=64"
        );
        let mut keyed: Vec<(&[u8], u64)> = Vec::with_capacity(entries.len());
        for (key, &value) in entries {
            if value & !value_mask(width) != 0 {
                return Err(BuildError::ValueTooWide { value, width });
            }
            keyed.push((key.as_ref(), value));
        }
        let seg_len = segment_len(keyed.len());

        let mut rng = thread_rng();
        for _ in 0..MAX_KEY_ATTEMPTS {
            let mut sip_key = [0u8; 16];
            rng.fill_bytes(&mut sip_key);
            let Some(order) = peel(&keyed, &sip_key, seg_len) else {
                continue;
            };
            let mut slots =
                vec![0u64; (3 * seg_len * width as usize).div_ceil(64)].into_boxed_slice();
            // Assign in reverse peel order: each peeled slot is still zero
            // when its turn comes, so the residual lands exactly there.
            for &(entry, slot) in order.iter().rev() {
                let (key, value) = keyed[entry];
                let pos = positions(&sip_key, key, seg_len);
                let residual = value
                    ^ load_slot(&slots, width, pos[0])
                    ^ load_slot(&slots, width, pos[1])
                    ^ load_slot(&slots, width, pos[2]);
                store_slot(&mut slots, width, slot, residual);
            }
            return Ok(Filter {
                sip_key,
                width,
                seg_len,
                slots,
            });
        }
        Err(BuildError::KeysExhausted {
            entries: keyed.len(),
        })
    }

    /// Looks up a key. Exact for keys passed to [`Filter::build`]; an
    /// arbitrary `width`-bit integer for any other key.
    pub fn get(&self, key: impl AsRef<[u8]>) -> u64 {
        let pos = positions(&self.sip_key, key.as_ref(), self.seg_len);
        load_slot(&self.slots, self.width, pos[0])
            ^ load_slot(&self.slots, self.width, pos[1])
            ^ load_slot(&self.slots, self.width, pos[2])
    }

    /// The bit width every answer stays within.
    pub fn width(&self) -> u32 {
        self.width
    }
}

/// Slot budget per segment: three segments at ~1.23x the entry count
/// overall, plus constant slack so tiny mappings stay peelable.
fn segment_len(entries: usize) -> usize {
    (32 + entries + entries * 23 / 100).div_ceil(3)
}

fn value_mask(width: u32) -> u64 {
    if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// One slot per segment; segments are disjoint, so the three positions of a
/// key never collide with each other.
fn positions(sip_key: &[u8; 16], key: &[u8], seg_len: usize) -> [usize; 3] {
    let hash: u128 = SipHasher24::new_with_key(sip_key).hash(key).into();
    let lo = hash as u64;
    let hi = (hash >> 64) as u64;
    [
        reduce(lo, seg_len),
        seg_len + reduce(hi, seg_len),
        2 * seg_len + reduce(remix(lo ^ hi), seg_len),
    ]
}

/// Maps a full-range word onto `0..n` without the modulo bias.
fn reduce(x: u64, n: usize) -> usize {
    ((x as u128 * n as u128) >> 64) as usize
}

fn remix(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

fn load_slot(slots: &[u64], width: u32, slot: usize) -> u64 {
    let bit = slot * width as usize;
    let word = bit / 64;
    let off = (bit % 64) as u32;
    let mut value = slots[word] >> off;
    if off + width > 64 {
        value |= slots[word + 1] << (64 - off);
    }
    value & value_mask(width)
}

/// Slots are written at most once per build, so plain ORs suffice.
fn store_slot(slots: &mut [u64], width: u32, slot: usize, value: u64) {
    let bit = slot * width as usize;
    let word = bit / 64;
    let off = (bit % 64) as u32;
    slots[word] |= value << off;
    if off + width > 64 {
        slots[word + 1] |= value >> (64 - off);
    }
}

/// Runs the peeling pass for one hash key. Returns the `(entry, slot)`
/// elimination order when every entry peeled, `None` when an unpeelable
/// core remains.
fn peel(
    keyed: &[(&[u8], u64)],
    sip_key: &[u8; 16],
    seg_len: usize,
) -> Option<Vec<(usize, usize)>> {
    let slot_count = 3 * seg_len;
    // Per slot: incident entry count and the XOR of incident entry ids.
    // A slot of degree one therefore names its sole entry directly.
    let mut degree = vec![0u32; slot_count];
    let mut acc = vec![0usize; slot_count];
    let mut pos = Vec::with_capacity(keyed.len());
    for (entry, (key, _)) in keyed.iter().enumerate() {
        let p = positions(sip_key, key, seg_len);
        for &slot in &p {
            degree[slot] += 1;
            acc[slot] ^= entry;
        }
        pos.push(p);
    }

    let mut ready: Vec<usize> = (0..slot_count).filter(|&slot| degree[slot] == 1).collect();
    let mut order = Vec::with_capacity(keyed.len());
    while let Some(slot) = ready.pop() {
        if degree[slot] != 1 {
            continue;
        }
        let entry = acc[slot];
        order.push((entry, slot));
        for &other in &pos[entry] {
            degree[other] -= 1;
            acc[other] ^= entry;
            if degree[other] == 1 {
                ready.push(other);
            }
        }
    }
    (order.len() == keyed.len()).then_some(order)
}
