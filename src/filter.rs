//! Filter variants: the requested asset attributes (sex, age, quality,
//! preview size, sound type) packed into a stable integer.
//!
//! The integer form partitions the cache, so bit positions must never be
//! reassigned once assets have been written under them.

use std::fmt;

const MALE: u32 = 1 << 0;
const FEMALE: u32 = 1 << 1;
const ADULT: u32 = 1 << 2;
const IMMATURE: u32 = 1 << 3;
const JUVENILE: u32 = 1 << 4;
/// Quality tiers 1..=5 occupy bits 5..=9.
const QUALITY_SHIFT: u32 = 5;
const QUALITY_MASK: u32 = 0b11111 << QUALITY_SHIFT;
const SMALL: u32 = 1 << 10;
const BLACK_AND_WHITE: u32 = 1 << 11;
const SONG: u32 = 1 << 12;
const CALL: u32 = 1 << 13;

const KNOWN_BITS: u32 = (1 << 14) - 1;

/// Quality tiers requested when no tier bit is set.
pub const DEFAULT_QUALITY: [u8; 3] = [3, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilterVariant {
    bits: u32,
}

impl FilterVariant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored variant. Unknown high bits are dropped.
    pub fn from_int(value: u32) -> Self {
        Self {
            bits: value & KNOWN_BITS,
        }
    }

    pub fn to_int(&self) -> u32 {
        self.bits
    }

    fn with(mut self, flag: u32, on: bool) -> Self {
        if on {
            self.bits |= flag;
        } else {
            self.bits &= !flag;
        }
        self
    }

    pub fn male(self, on: bool) -> Self {
        self.with(MALE, on)
    }

    pub fn female(self, on: bool) -> Self {
        self.with(FEMALE, on)
    }

    pub fn adult(self, on: bool) -> Self {
        self.with(ADULT, on)
    }

    pub fn immature(self, on: bool) -> Self {
        self.with(IMMATURE, on)
    }

    pub fn juvenile(self, on: bool) -> Self {
        self.with(JUVENILE, on)
    }

    pub fn small(self, on: bool) -> Self {
        self.with(SMALL, on)
    }

    pub fn black_and_white(self, on: bool) -> Self {
        self.with(BLACK_AND_WHITE, on)
    }

    pub fn song(self, on: bool) -> Self {
        self.with(SONG, on)
    }

    pub fn call(self, on: bool) -> Self {
        self.with(CALL, on)
    }

    /// Request an explicit quality tier (1..=5). Out-of-range tiers are ignored.
    pub fn quality(self, tier: u8, on: bool) -> Self {
        if !(1..=5).contains(&tier) {
            return self;
        }
        self.with(1 << (QUALITY_SHIFT + u32::from(tier) - 1), on)
    }

    pub fn is_small(&self) -> bool {
        self.bits & SMALL != 0
    }

    pub fn is_black_and_white(&self) -> bool {
        self.bits & BLACK_AND_WHITE != 0
    }

    /// Quality tiers to request, falling back to [`DEFAULT_QUALITY`].
    pub fn quality_tiers(&self) -> Vec<u8> {
        if self.bits & QUALITY_MASK == 0 {
            return DEFAULT_QUALITY.to_vec();
        }
        (1..=5u8)
            .filter(|tier| self.bits & (1 << (QUALITY_SHIFT + u32::from(*tier) - 1)) != 0)
            .collect()
    }

    fn codes(&self, flags: &[(u32, &'static str)]) -> String {
        flags
            .iter()
            .filter(|(flag, _)| self.bits & flag != 0)
            .map(|(_, code)| *code)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Catalog query parameters derived from the flags.
    ///
    /// Empty values are still sent; the catalog treats them as "any".
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let quality = self
            .quality_tiers()
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",");
        vec![
            ("sex", self.codes(&[(MALE, "m"), (FEMALE, "f")])),
            (
                "age",
                self.codes(&[(ADULT, "a"), (IMMATURE, "i"), (JUVENILE, "j")]),
            ),
            ("behavior", self.codes(&[(SONG, "s"), (CALL, "c")])),
            ("qua", quality),
        ]
    }

    /// Human-readable names of the active flags.
    pub fn display(&self) -> Vec<String> {
        let mut out: Vec<String> = [
            (MALE, "male"),
            (FEMALE, "female"),
            (ADULT, "adult"),
            (IMMATURE, "immature"),
            (JUVENILE, "juvenile"),
            (SMALL, "small"),
            (BLACK_AND_WHITE, "black & white"),
            (SONG, "song"),
            (CALL, "call"),
        ]
        .iter()
        .filter(|(flag, _)| self.bits & flag != 0)
        .map(|(_, name)| (*name).to_string())
        .collect();
        if self.bits & QUALITY_MASK != 0 {
            for tier in self.quality_tiers() {
                out.push(format!("quality {}", tier));
            }
        }
        if out.is_empty() {
            out.push("none".to_string());
        }
        out
    }
}

impl fmt::Display for FilterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits)
    }
}

impl From<u32> for FilterVariant {
    fn from(value: u32) -> Self {
        Self::from_int(value)
    }
}
