//! Stable hashing of connection tuples.
//!
//! Uses the keyed hash function SipHash-2-4 with a key fixed at compile time so that the hash of
//! a connection is the same across runs and processes. Hash function SipHash-2-4 from:
//!
//! > SipHash: a fast short-input PRF, Jean-Philippe Aumasson and Daniel J. Bernstein
use super::endpoint::FourTuple;

/// A SipHash-2-4 hasher for IPv4 connection tuples.
pub(crate) struct TupleHasher {
    keys: (u64, u64),
}

// Yes, that's the initial values, as ASCII text.
const IV: [&[u8; 8]; 4] = [
    b"somepseu",
    b"dorandom",
    b"lygenera",
    b"tedbytes"];

const FIXED_KEY: [u8; 16] = *b"l2net tuple hash";

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl TupleHasher {
    /// The hasher with the fixed key used for `FourTuple::hash_code`.
    pub(crate) const fn fixed() -> Self {
        Self::from_secret_key_bytes(FIXED_KEY)
    }

    /// Create a hasher with some pre-defined secret key.
    pub(crate) const fn from_secret_key_bytes(bytes: [u8; 16]) -> Self {
        let a = u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
            bytes[4], bytes[5], bytes[6], bytes[7]]);
        let b = u64::from_le_bytes([
            bytes[8], bytes[9], bytes[10], bytes[11],
            bytes[12], bytes[13], bytes[14], bytes[15]]);
        TupleHasher { keys: (a, b), }
    }

    /// Hash the tuple, local side first.
    pub(crate) fn hash(&self, tuple: &FourTuple) -> u64 {
        let mut state = State::init(self.keys.0, self.keys.1);
        let m = u64::from(u32::from(tuple.local))
            | u64::from(u32::from(tuple.remote)) << 32;
        let p = u64::from(tuple.local_port)
            | u64::from(tuple.remote_port) << 16
            // Message length = 12
            | 12_u64 << 56;
        state.absorb(m);
        state.absorb(p);
        state.finalize()
    }
}

impl State {
    const SIP_C: usize = 2;
    const SIP_D: usize = 4;

    fn init(k0: u64, k1: u64) -> Self {
        State {
            v0: u64::from_be_bytes(*IV[0]) ^ k0,
            v1: u64::from_be_bytes(*IV[1]) ^ k1,
            v2: u64::from_be_bytes(*IV[2]) ^ k0,
            v3: u64::from_be_bytes(*IV[3]) ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Process one 8-byte block; the caller absorbs the length block last.
    fn absorb(&mut self, m: u64) {
        self.v3 ^= m;
        (0..Self::SIP_C).for_each(|_| self.round());
        self.v0 ^= m;
    }

    fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        (0..Self::SIP_D).for_each(|_| self.round());
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}
