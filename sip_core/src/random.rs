//! Sources of the per-session random tokens (Call-ID, tags, branches,
//! client nonces).

use crate::auth::md5_hex;

/// Branch prefix mandated by RFC 3261 for transaction matching.
pub const BRANCH_MAGIC: &str = "z9hG4bK";

pub const CNONCE_LEN: usize = 16;

pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_u32(&mut self) -> u32 {
        (**self).next_u32()
    }
}

/// Thread-local generator from `rand`. Not cryptographically vetted for
/// this use, which the protocol does not require.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u32(&mut self) -> u32 {
        rand::random::<u32>()
    }
}

fn in_range<R: RandomSource + ?Sized>(rng: &mut R, low: u32, high: u32) -> u32 {
    low + rng.next_u32() % (high - low + 1)
}

pub fn call_id<R: RandomSource + ?Sized>(rng: &mut R, host: &str) -> String {
    format!("{}@{}", in_range(rng, 1_000_000, 9_999_999), host)
}

pub fn tag<R: RandomSource + ?Sized>(rng: &mut R) -> String {
    in_range(rng, 1_000_000, 9_999_999).to_string()
}

pub fn branch<R: RandomSource + ?Sized>(rng: &mut R) -> String {
    format!("{}{}", BRANCH_MAGIC, in_range(rng, 100_000, 999_999))
}

/// 16 hex characters taken from the MD5 of a fresh random value.
pub fn cnonce<R: RandomSource + ?Sized>(rng: &mut R) -> String {
    let seed = format!("{:08x}{:08x}", rng.next_u32(), rng.next_u32());
    let mut hex = md5_hex(seed.as_bytes());
    hex.truncate(CNONCE_LEN);
    hex
}
