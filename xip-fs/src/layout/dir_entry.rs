//! 目录表的槽位记录

use core::mem;
use core::slice;

use vfs::DirEntryType;

use super::size_mask;
use crate::{ENTRY_END, ERASED_WORD, MAGIC};

/// 文件大小尚未落盘确认的哨兵值
pub const SIZE_UNKNOWN: u32 = ERASED_WORD;
/// 目录占位项的数据偏移哨兵值，不指向任何数据
pub const DIR_DATA: u32 = 0xFFFF_FFF0;

/// 布尔字段的"真"就是保持擦除态
const FLAG_SET: u8 = 0xFF;

/// 持久化的目录项，40 字节
///
/// `end` 是记录的最后一个字段：编程中途掉电它必然缺失，
/// 借此识别残缺记录。此后的字段级改写全部只清位，
/// 无需擦除即可直接编程。
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    /// 槽位在用标记；保持擦除态表示空闲
    pub magic: u32,
    /// 种类：1 文件，2 目录
    pub kind: u8,
    /// 墓碑标记，清零即删除
    pub valid: u8,
    /// 截断标记，清零表示写入曾被容量截断
    pub truncated: u8,
    /// 预留
    pub rsv: u8,
    /// 短名；装满 16 字节时没有结尾 NUL
    pub name: [u8; 16],
    /// 确切大小；[`SIZE_UNKNOWN`] 表示写入中或从未成功关闭
    pub size: u32,
    /// 大小掩码，见 [`size_mask`]
    pub size_mask: u32,
    /// 数据起始偏移（相对区域起点）
    pub data: u32,
    /// 预留的校验和字段，保持擦除态
    pub crc: u16,
    /// 完整落盘确认标记
    pub end: u16,
}

impl DirEntry {
    pub const SIZE: usize = mem::size_of::<Self>();

    /// 单字段编程所用的记录内偏移
    pub const VALID_OFFSET: u32 = mem::offset_of!(DirEntry, valid) as u32;
    pub const TRUNCATED_OFFSET: u32 = mem::offset_of!(DirEntry, truncated) as u32;
    pub const SIZE_OFFSET: u32 = mem::offset_of!(DirEntry, size) as u32;
    pub const SIZE_MASK_OFFSET: u32 = mem::offset_of!(DirEntry, size_mask) as u32;

    /// 新文件记录；确切大小在关闭时才回填
    pub fn new_file(name: &str, data: u32) -> Self {
        Self::new(DirEntryType::Regular, name, SIZE_UNKNOWN, data)
    }

    /// 目录占位记录，没有数据区
    pub fn new_directory(name: &str) -> Self {
        Self::new(DirEntryType::Directory, name, 0, DIR_DATA)
    }

    fn new(ty: DirEntryType, name: &str, size: u32, data: u32) -> Self {
        let mut field = [0u8; 16];
        for (dst, src) in field.iter_mut().zip(name.bytes()) {
            *dst = src;
        }
        Self {
            magic: MAGIC,
            kind: ty as u8,
            valid: FLAG_SET,
            truncated: FLAG_SET,
            rsv: FLAG_SET,
            name: field,
            size,
            size_mask: ERASED_WORD,
            data,
            crc: 0xFFFF,
            end: ENTRY_END,
        }
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        unsafe { mem::transmute(bytes) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self as *const _ as usize as *const u8, Self::SIZE) }
    }

    /// 槽位从未被写过
    pub fn is_free(&self) -> bool {
        self.magic == ERASED_WORD
    }

    pub fn in_use(&self) -> bool {
        self.magic == MAGIC
    }

    /// 记录完整落盘且未被删除
    pub fn is_live(&self) -> bool {
        self.in_use() && self.valid != 0 && self.end == ENTRY_END
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated != FLAG_SET
    }

    pub fn size_known(&self) -> bool {
        self.size != SIZE_UNKNOWN
    }

    pub fn is_dir(&self) -> bool {
        self.kind == DirEntryType::Directory as u8
    }

    /// 种类字段的受检解码
    pub fn ty(&self) -> Option<DirEntryType> {
        match self.kind {
            1 => Some(DirEntryType::Regular),
            2 => Some(DirEntryType::Directory),
            _ => None,
        }
    }

    /// 最可信的大小：确切值优先，未知时用掩码估计
    pub fn best_size(&self) -> u32 {
        if self.size_known() {
            self.size
        } else {
            size_mask::decode_extent(self.size_mask)
        }
    }

    /// 名字的有效字节（到首个 NUL 为止，可占满整个字段）
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        &self.name[..len]
    }

    /// 名字比较；两侧都按字段宽度截断
    pub fn name_matches(&self, s: &str) -> bool {
        let s = s.as_bytes();
        self.name_bytes() == &s[..s.len().min(self.name.len())]
    }
}
