//! Block-type table (C2): the three recognized PM block sizes and their
//! shift/size pairs, exposed as an immutable singleton lookup, matching the
//! teacher's convention of keeping such tables as `const`/`static` data
//! rather than hidden process globals (the spec explicitly calls
//! block-type tables "immutable singletons (safe)").

use pod_enum::pod_enum;

/// The PM base meta-block size (radix nodes, log pages): always 4 KiB.
pub const META_BLK_SHIFT: u32 = 12;

/// Number of 64-bit slots per radix node / log entries addressed per
/// meta-block-sized unit (`2^9 = 512`).
pub const META_BLK_SLOT_BITS: u32 = 9;

/// Recognized data block sizes. Uses [`pod_enum`] so that a stray or
/// corrupted `blk_type` byte read back from PM decodes to a value that
/// compares unequal to every known variant rather than undefined behavior.
#[pod_enum]
#[repr(u8)]
pub enum BlockType {
    /// 4 KiB data blocks.
    Block4K = 0,
    /// 2 MiB data blocks.
    Block2M = 1,
    /// 1 GiB data blocks.
    Block1G = 2,
}

impl BlockType {
    /// `log2` of the block's size in bytes.
    #[must_use]
    pub fn shift(self) -> u32 {
        match self {
            BlockType::Block4K => 12,
            BlockType::Block2M => 21,
            BlockType::Block1G => 30,
            // a corrupted or unrecognized byte falls back to the base block size
            _ => 12,
        }
    }

    /// Size of one block in bytes.
    #[must_use]
    pub fn size(self) -> u64 {
        1u64 << self.shift()
    }

    /// Ratio between a data block of this type and a 4 KiB meta block,
    /// i.e. how many meta-block-sized units fit in one data block
    /// (`blk_shift` in the spec).
    #[must_use]
    pub fn blk_shift(self) -> u32 {
        self.shift() - META_BLK_SHIFT
    }
}

impl Default for BlockType {
    fn default() -> Self {
        BlockType::Block4K
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_match_spec() {
        assert_eq!(BlockType::Block4K.shift(), 12);
        assert_eq!(BlockType::Block2M.shift(), 21);
        assert_eq!(BlockType::Block1G.shift(), 30);
    }

    #[test]
    fn sizes_match_shifts() {
        assert_eq!(BlockType::Block4K.size(), 4096);
        assert_eq!(BlockType::Block2M.size(), 2 * 1024 * 1024);
        assert_eq!(BlockType::Block1G.size(), 1024 * 1024 * 1024);
    }

    #[test]
    fn blk_shift_is_ratio_to_meta_block() {
        assert_eq!(BlockType::Block4K.blk_shift(), 0);
        assert_eq!(BlockType::Block2M.blk_shift(), 9);
        assert_eq!(BlockType::Block1G.blk_shift(), 18);
    }

    #[test]
    fn unknown_discriminant_does_not_panic() {
        let bt = BlockType::from(200u8);
        assert_eq!(bt.shift(), 12);
    }
}
