//! Variable-width LZW as used by GIF image data.
//!
//! Codes are packed least-significant-bit first. The phrase dictionary is an open-addressed hash
//! table keyed by `(prefix code, next symbol)`, sized independently of the code space; on
//! exhaustion a clear code is emitted and the dictionary starts over.

use crate::foundation::error::{FramegifError, FramegifResult};

/// Widest code the format allows.
pub const MAX_CODE_BITS: u8 = 12;

/// Smallest minimum code size written to a GIF stream.
pub const MIN_CODE_SIZE_FLOOR: u8 = 2;

const MAX_CODES: u16 = 1 << MAX_CODE_BITS;

// Prime, roughly 80% occupancy at a full 4096-code dictionary.
const HASH_SIZE: usize = 5003;

const EMPTY: u32 = u32::MAX;

/// Reusable LZW encoder; dictionary storage is kept between [`LzwEncoder::encode_into`] calls.
pub struct LzwEncoder {
    min_code_size: u8,
    clear_code: u16,
    end_code: u16,
    next_code: u16,
    code_width: u8,
    keys: Box<[u32]>,
    codes: Box<[u16]>,
}

impl std::fmt::Debug for LzwEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzwEncoder")
            .field("min_code_size", &self.min_code_size)
            .field("next_code", &self.next_code)
            .field("code_width", &self.code_width)
            .finish_non_exhaustive()
    }
}

impl LzwEncoder {
    /// Create an encoder for symbols of `min_code_size` bits (`2..=8`).
    pub fn new(min_code_size: u8) -> FramegifResult<Self> {
        if !(MIN_CODE_SIZE_FLOOR..=8).contains(&min_code_size) {
            return Err(FramegifError::validation(format!(
                "lzw min code size must be within {MIN_CODE_SIZE_FLOOR}..=8, got {min_code_size}"
            )));
        }
        let clear_code = 1u16 << min_code_size;
        Ok(Self {
            min_code_size,
            clear_code,
            end_code: clear_code + 1,
            next_code: clear_code + 2,
            code_width: min_code_size + 1,
            keys: vec![EMPTY; HASH_SIZE].into_boxed_slice(),
            codes: vec![0; HASH_SIZE].into_boxed_slice(),
        })
    }

    /// The configured minimum code size.
    pub fn min_code_size(&self) -> u8 {
        self.min_code_size
    }

    /// Compress `indices` as one complete stream (clear code … end code) appended to `out`.
    ///
    /// Every symbol must be below `1 << min_code_size`.
    pub fn encode_into(&mut self, indices: &[u8], out: &mut Vec<u8>) -> FramegifResult<()> {
        self.reset();
        let mut bits = BitPacker::new(out);
        bits.push(self.clear_code, self.code_width);

        let Some((&first, rest)) = indices.split_first() else {
            bits.push(self.end_code, self.code_width);
            bits.finish();
            return Ok(());
        };
        self.check_symbol(first)?;

        let mut prefix = u16::from(first);
        // No code emitted since the last clear; the decoder adds no entry for that first code.
        let mut fresh = true;

        'symbols: for &sym in rest {
            self.check_symbol(sym)?;

            let key = (u32::from(prefix) << 8) | u32::from(sym);
            let mut slot = ((usize::from(prefix) << 8) ^ usize::from(sym)) % HASH_SIZE;
            loop {
                match self.keys[slot] {
                    k if k == key => {
                        prefix = self.codes[slot];
                        continue 'symbols;
                    }
                    EMPTY => break,
                    _ => slot = (slot + 1) % HASH_SIZE,
                }
            }

            bits.push(prefix, self.code_width);
            fresh = false;

            if self.next_code < MAX_CODES {
                self.keys[slot] = key;
                self.codes[slot] = self.next_code;
                self.next_code += 1;
                if self.next_code > (1 << self.code_width) && self.code_width < MAX_CODE_BITS {
                    self.code_width += 1;
                }
            } else {
                bits.push(self.clear_code, self.code_width);
                self.reset();
                fresh = true;
            }

            prefix = u16::from(sym);
        }

        bits.push(prefix, self.code_width);
        // Reading that last code makes the decoder add one more entry, which may widen its codes
        // before it reads the end code.
        if !fresh && self.next_code == (1 << self.code_width) && self.code_width < MAX_CODE_BITS {
            self.code_width += 1;
        }
        bits.push(self.end_code, self.code_width);
        bits.finish();
        Ok(())
    }

    /// Compress `indices` into a fresh buffer.
    pub fn encode(&mut self, indices: &[u8]) -> FramegifResult<Vec<u8>> {
        let mut out = Vec::with_capacity(indices.len() / 2 + 16);
        self.encode_into(indices, &mut out)?;
        Ok(out)
    }

    fn reset(&mut self) {
        self.keys.fill(EMPTY);
        self.next_code = self.end_code + 1;
        self.code_width = self.min_code_size + 1;
    }

    fn check_symbol(&self, sym: u8) -> FramegifResult<()> {
        if self.min_code_size < 8 && u16::from(sym) >= self.clear_code {
            return Err(FramegifError::validation(format!(
                "symbol {sym} does not fit in {} bits",
                self.min_code_size
            )));
        }
        Ok(())
    }
}

/// One-shot convenience wrapper around [`LzwEncoder`].
pub fn encode(indices: &[u8], min_code_size: u8) -> FramegifResult<Vec<u8>> {
    LzwEncoder::new(min_code_size)?.encode(indices)
}

/// LSB-first bit accumulator appending whole bytes to a borrowed buffer.
struct BitPacker<'a> {
    out: &'a mut Vec<u8>,
    acc: u32,
    nbits: u8,
}

impl<'a> BitPacker<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            acc: 0,
            nbits: 0,
        }
    }

    #[inline]
    fn push(&mut self, code: u16, width: u8) {
        self.acc |= u32::from(code) << self.nbits;
        self.nbits += width;
        while self.nbits >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.nbits -= 8;
        }
    }

    /// Zero-pad and emit a trailing partial byte.
    fn finish(mut self) {
        if self.nbits > 0 {
            self.out.push(self.acc as u8);
            self.acc = 0;
            self.nbits = 0;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/lzw.rs"]
mod tests;
