//! 大小掩码的编解码
//!
//! 掩码共 32 位，每位对应文件的一个 8 KiB 段；擦除态为全 1，
//! 某段一经写入就把对应位清零，所以掩码可以随写入逐步编程，
//! 永远不需要擦除。确切大小因掉电而未知时，就用掩码的
//! 粗粒度估计代替：估计值不小于真实写入量，且相差不足一段。

use crate::MASK_CHUNK;

/// 覆盖 `bytes` 个字节所需要清零的位集合（向上取整，0 字节为空集）
///
/// 调用方把返回值的反码编程进掩码字段，flash 的与特性
/// 会替我们保留已清零的历史。
pub fn encode_extent(bytes: u32) -> u32 {
    match bytes.div_ceil(MASK_CHUNK).min(u32::BITS) {
        0 => 0,
        32 => u32::MAX,
        chunks => (1 << chunks) - 1,
    }
}

/// 由存储态的掩码估计已写入的字节数：数清零的位
pub fn decode_extent(mask: u32) -> u32 {
    (!mask).count_ones() * MASK_CHUNK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_rounds_up() {
        assert_eq!(0, encode_extent(0));
        assert_eq!(0b1, encode_extent(1));
        assert_eq!(0b1, encode_extent(8192));
        assert_eq!(0b11, encode_extent(8193));
        assert_eq!(0b111, encode_extent(20000));
        assert_eq!(u32::MAX, encode_extent(u32::MAX));
    }

    #[test]
    fn decode_counts_cleared_bits() {
        assert_eq!(0, decode_extent(u32::MAX));
        assert_eq!(8192, decode_extent(!0b1));
        assert_eq!(24576, decode_extent(!0b111));
        assert_eq!(32 * 8192, decode_extent(0));
    }

    #[test]
    fn estimate_brackets_true_length() {
        let stored = u32::MAX & !encode_extent(20000);
        let estimate = decode_extent(stored);
        assert!(estimate >= 16384 && estimate <= 24576);
    }
}
