//! # flash 数据结构层
//!
//! 区域布局从 0 号块起固定为：
//!
//! | 偏移 | 内容 |
//! | ---- | ---- |
//! | 0 | 头部，8 字节 |
//! | 8 | 目录表，32 项 x 40 字节 |
//! | 1288 | 影子备份表，32 项 x 40 字节 |
//! | 2568 | 文件数据区，4 字节对齐 |
//!
//! 区域末块是压缩流程专用的暂存块，不计入可用空间。
//! 多字节字段一律按小端持久化。

mod dir_entry;
mod header;
pub mod size_mask;

pub use self::dir_entry::{DirEntry, DIR_DATA, SIZE_UNKNOWN};
pub use self::header::{Header, MoveState};

use core::mem;

use crate::DIR_CAPACITY;

/// 目录表起始偏移
pub const TABLE_OFFSET: u32 = mem::size_of::<Header>() as u32;
/// 影子备份表起始偏移
pub const SHADOW_OFFSET: u32 = TABLE_OFFSET + (DIR_CAPACITY * mem::size_of::<DirEntry>()) as u32;
/// 头部与两张目录表占据的字节数，亦即数据区起点
pub const LAYOUT_SPAN: u32 =
    (mem::size_of::<Header>() + 2 * DIR_CAPACITY * mem::size_of::<DirEntry>()) as u32;
