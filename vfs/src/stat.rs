use enumflags2::bitflags;

use crate::DirEntryType;

/// 条目元信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: DirEntryType,
    /// st_mode 风格的种类与权限合成位
    pub mode: u32,
    /// 文件大小；目录为其下有效目录项占据的字节数
    pub size: u32,
}

/// 种类位，八进制数值与传统 Unix 一致
#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    DIR = 0o040000,
    FILE = 0o100000,
}

impl Stat {
    /// 文件一律可读写
    pub fn file(size: u32) -> Self {
        Self {
            kind: DirEntryType::Regular,
            mode: StatKind::FILE as u32 | 0o666,
            size,
        }
    }

    /// 目录一律可读可进入
    pub fn directory(size: u32) -> Self {
        Self {
            kind: DirEntryType::Directory,
            mode: StatKind::DIR as u32 | 0o555,
            size,
        }
    }
}
