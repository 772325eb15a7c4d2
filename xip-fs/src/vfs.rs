//! # 文件操作层
//!
//! 打开、读写、关闭、删除与列目录的编排。单写者准入、
//! 只追加写入、重新打开即截断这些策略都在这一层执行；
//! 层内不缓存任何元数据，每次操作都以表中记录为准。

use alloc::string::String;
use core::ops::Range;

use enumflags2::{bitflags, BitFlags};
use vfs::{DirEntryType, Error, Stat};

use crate::fs::{Writer, XipFileSystem};
use crate::layout::{size_mask, DirEntry};
use crate::DIR_CAPACITY;

/// 打开方式；空集合即只读
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    /// 读写模式。文件一次写成，读写打开恒被拒绝
    ReadWrite = 0b0001,
    /// 不存在则创建
    Create = 0b0010,
    /// 已存在则作废重建
    Truncate = 0b0100,
    /// 目标必须是目录
    Directory = 0b1000,
}

/// 打开条目得到的句柄，由上层适配器持有
///
/// 句柄只是定位信息，条目的真实状态始终在 flash 上。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle {
    pub(crate) target: Target,
    /// 打开时最可信的大小；写入中的文件为掩码估计值
    pub size: u32,
    pub ty: DirEntryType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    /// 根目录，表中没有它的记录
    Root,
    Slot(usize),
}

/// 查名结果
enum Located {
    Root,
    Slot(usize, DirEntry),
}

impl XipFileSystem {
    /// 打开或创建条目
    ///
    /// 已关闭的文件只读；新建的条目是唯一写者，直到关闭。
    pub fn open(&mut self, path: &str, flags: BitFlags<OpenFlag>) -> Result<FileHandle, Error> {
        if flags.contains(OpenFlag::ReadWrite) {
            return Err(Error::InvalidArgument);
        }

        let mut located = self.lookup(path);
        if flags.contains(OpenFlag::Truncate) {
            match located {
                Ok(Located::Root) => return Err(Error::InvalidArgument),
                Ok(Located::Slot(slot, _)) => {
                    // 原条目作废，之后按不存在处理
                    self.tombstone(slot)?;
                    located = self.lookup(path);
                }
                Err(_) => {}
            }
        }

        match located {
            Ok(Located::Root) => {
                if flags.contains(OpenFlag::Create) {
                    return Err(Error::AlreadyExists);
                }
                if !flags.contains(OpenFlag::Directory) {
                    return Err(Error::NotFound);
                }
                Ok(FileHandle {
                    target: Target::Root,
                    size: self.root_size()?,
                    ty: DirEntryType::Directory,
                })
            }
            Ok(Located::Slot(slot, ent)) => {
                if flags.contains(OpenFlag::Create) {
                    return Err(Error::AlreadyExists);
                }
                let Some(ty) = ent.ty() else {
                    return Err(Error::NotFound);
                };
                if (ty == DirEntryType::Directory) != flags.contains(OpenFlag::Directory) {
                    return Err(Error::NotFound);
                }
                Ok(FileHandle {
                    target: Target::Slot(slot),
                    size: ent.best_size(),
                    ty,
                })
            }
            Err(Error::NotFound) if flags.contains(OpenFlag::Create) => self.create(path, flags),
            Err(e) => Err(e),
        }
    }

    /// 新建条目，抢占唯一的写者名额
    fn create(&mut self, path: &str, flags: BitFlags<OpenFlag>) -> Result<FileHandle, Error> {
        let Some(name) = first_component(path) else {
            return Err(Error::InvalidArgument);
        };
        let ty = if flags.contains(OpenFlag::Directory) {
            DirEntryType::Directory
        } else {
            DirEntryType::Regular
        };

        // 写者准入，唯一需要驱动互斥锁保护的临界区
        self.dev.lock();
        if self.writer != Writer::Idle {
            self.dev.unlock();
            return Err(Error::Busy);
        }
        self.writer = Writer::Claimed;
        self.dev.unlock();

        match self.create_entry(name, ty) {
            Ok((slot, _)) => {
                self.writer = Writer::Open(slot);
                Ok(FileHandle {
                    target: Target::Slot(slot),
                    size: 0,
                    ty,
                })
            }
            Err(e) => {
                self.writer = Writer::Idle;
                Err(e)
            }
        }
    }

    /// 读出已关闭文件的一段内容，越过文件末尾的部分不返回
    pub fn read(&self, handle: &FileHandle, pos: u32, buf: &mut [u8]) -> Result<usize, Error> {
        let Target::Slot(slot) = handle.target else {
            return Err(Error::BadFile);
        };
        let ent = self.read_entry(slot)?;
        if !ent.size_known() {
            return Err(Error::BadFile);
        }
        if pos >= ent.size || buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min((ent.size - pos) as usize);
        let Some(start) = ent.data.checked_add(pos) else {
            return Err(Error::Io);
        };
        self.flash_read(start, &mut buf[..len])?;
        Ok(len)
    }

    /// 追加写入，只有当前写者可用
    ///
    /// 空间不足时写到容量为止并给条目打上截断标记。
    /// 大小掩码先于数据落盘，掉电后的估计只会偏大不会偏小。
    pub fn write(&mut self, handle: &FileHandle, pos: u32, buf: &[u8]) -> Result<usize, Error> {
        let Target::Slot(slot) = handle.target else {
            return Err(Error::BadFile);
        };
        if self.writer != Writer::Open(slot) {
            return Err(Error::BadFile);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let ent = self.read_entry(slot)?;
        if ent.is_dir() {
            return Err(Error::BadFile);
        }

        let start = ent.data.checked_add(pos).unwrap_or(u32::MAX);
        if start >= self.avail_size {
            self.mark_truncated(slot, &ent)?;
            return Err(Error::OutOfSpace);
        }
        let mut len = buf.len();
        if start as u64 + len as u64 > self.avail_size as u64 {
            len = (self.avail_size - start) as usize;
            self.mark_truncated(slot, &ent)?;
        }

        let need = size_mask::encode_extent(pos + len as u32);
        if ent.size_mask & need != 0 {
            self.write_entry_field(slot, DirEntry::SIZE_MASK_OFFSET, &(!need).to_le_bytes())?;
        }

        self.flash_write(start, &buf[..len])?;
        Ok(len)
    }

    /// 关闭句柄；只有当前写者的关闭会把最终大小落盘
    pub fn close(&mut self, handle: &FileHandle, final_size: u32) -> Result<(), Error> {
        let Target::Slot(slot) = handle.target else {
            return Ok(());
        };
        if self.writer != Writer::Open(slot) {
            return Ok(());
        }
        // 大小写不出去文件也保持未知态，写者名额照样释放
        let res = self.write_entry_field(slot, DirEntry::SIZE_OFFSET, &final_size.to_le_bytes());
        self.writer = Writer::Idle;
        res
    }

    /// 查询路径的元信息
    pub fn stat(&self, path: &str) -> Result<Stat, Error> {
        match self.lookup(path)? {
            Located::Root => Ok(Stat::directory(self.root_size()?)),
            Located::Slot(_, ent) => {
                if ent.is_dir() {
                    Ok(Stat::directory(ent.size))
                } else if ent.size_known() {
                    Ok(Stat::file(ent.size))
                } else {
                    Err(Error::BadFile)
                }
            }
        }
    }

    /// 删除条目：只写一个墓碑字节，空间留待压缩回收
    pub fn unlink(&mut self, path: &str) -> Result<(), Error> {
        match self.lookup(path)? {
            Located::Root => Err(Error::InvalidArgument),
            Located::Slot(slot, _) => self.tombstone(slot),
        }
    }

    /// 返回表序中第 `pos` 个有效条目；越过表尾返回 `None`
    pub fn read_dir(&self, pos: usize) -> Result<Option<vfs::DirEntry>, Error> {
        let mut seen = 0;
        for slot in 0..DIR_CAPACITY {
            let ent = self.read_entry(slot)?;
            if !ent.in_use() {
                break;
            }
            let Some(ty) = ent.ty() else { continue };
            if !ent.is_live() {
                continue;
            }
            if seen == pos {
                return Ok(Some(vfs::DirEntry {
                    ty,
                    name: String::from_utf8_lossy(ent.name_bytes()).into_owned(),
                    size: ent.best_size(),
                }));
            }
            seen += 1;
        }
        Ok(None)
    }

    /// 完整关闭的文件在设备上的绝对地址区间
    ///
    /// 供直接寻址（XIP）的消费者使用。压缩会挪动数据，
    /// 区间只在没有写者活动的期间可靠。
    pub fn data_range(&self, handle: &FileHandle) -> Result<Range<u32>, Error> {
        let Target::Slot(slot) = handle.target else {
            return Err(Error::BadFile);
        };
        let ent = self.read_entry(slot)?;
        if ent.is_dir() || !ent.size_known() || ent.is_truncated() {
            return Err(Error::BadFile);
        }
        // 尺寸字段可能是损坏的残值，区间必须落在可用区内
        let Some(end) = ent.data.checked_add(ent.size) else {
            return Err(Error::BadFile);
        };
        if end > self.avail_size {
            return Err(Error::BadFile);
        }
        let start = self.start + ent.data;
        Ok(start..start + ent.size)
    }

    /// 表序线性查找首个同名的完整有效条目
    fn lookup(&self, path: &str) -> Result<Located, Error> {
        let Some(name) = first_component(path) else {
            return Ok(Located::Root);
        };
        for slot in 0..DIR_CAPACITY {
            let ent = self.read_entry(slot)?;
            if !ent.in_use() {
                break;
            }
            if ent.is_live() && ent.name_matches(name) {
                return Ok(Located::Slot(slot, ent));
            }
        }
        Err(Error::NotFound)
    }

    /// 根目录的"大小"：有效条目数乘以记录大小
    fn root_size(&self) -> Result<u32, Error> {
        let mut n = 0u32;
        for slot in 0..DIR_CAPACITY {
            let ent = self.read_entry(slot)?;
            if !ent.in_use() {
                break;
            }
            if ent.is_live() {
                n += 1;
            }
        }
        Ok(n * DirEntry::SIZE as u32)
    }

    fn tombstone(&self, slot: usize) -> Result<(), Error> {
        self.write_entry_field(slot, DirEntry::VALID_OFFSET, &[0])
    }

    /// 截断标记只打一次
    fn mark_truncated(&self, slot: usize, ent: &DirEntry) -> Result<(), Error> {
        if !ent.is_truncated() {
            self.write_entry_field(slot, DirEntry::TRUNCATED_OFFSET, &[0])?;
        }
        Ok(())
    }
}

/// 路径在根下的首个分量；全斜杠或空串指根自身
///
/// 根下只有一层，更深的路径分量一律忽略。
fn first_component(path: &str) -> Option<&str> {
    let comp = path.trim_start_matches('/').split('/').next()?;
    (!comp.is_empty()).then_some(comp)
}
