//! # xip-fs
//!
//! 面向 NOR flash 的日志结构文件系统：
//! 文件数据按字节原地存放，可直接寻址执行（XIP）。
//! 根下只有一层条目，文件一次写成，删除只留墓碑，
//! 空间耗尽时整体压缩回收。

#![no_std]

extern crate alloc;

/* xip-fs 的整体架构，自上而下 */

// 文件操作层：打开、读写、关闭、删除与列目录
mod vfs;
pub use self::vfs::{FileHandle, OpenFlag};

// 区域管理层：挂载、格式化、目录表读写与线性分配
mod fs;
pub use self::fs::{FlashGeometry, XipFileSystem};

// 压缩回收层：腾挪目录表与数据，回收墓碑占据的空间
mod compact;

// flash 数据结构层：持久化的头部、目录项与大小掩码
pub mod layout;

/// 区域与目录项共用的签名，即 "XIPF"
pub const MAGIC: u32 = 0x5849_5046;
/// 目录项完整落盘的确认标记
pub const ENTRY_END: u16 = 0xEDED;
/// 目录表槽位数
pub const DIR_CAPACITY: usize = 32;
/// 大小掩码的粒度，每位代表 8 KiB
pub const MASK_CHUNK: u32 = 8 * 1024;
/// 擦除态的 32 位图样
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;
