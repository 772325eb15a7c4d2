//! # 区域管理层
//!
//! 挂载、格式化、目录表的底层读写，
//! 以及为新条目挑选槽位与数据偏移的线性分配。

use alloc::sync::Arc;

use flash_dev::{DevError, FlashDevice};
use vfs::{DirEntryType, Error};

use crate::layout::{DirEntry, Header, MoveState, LAYOUT_SPAN, TABLE_OFFSET};
use crate::{DIR_CAPACITY, ENTRY_END, MAGIC};

/// flash 区域的几何参数，由驱动方给出
#[derive(Debug, Clone, Copy)]
pub struct FlashGeometry {
    /// 区域起始的设备绝对地址
    pub start: u32,
    /// 擦除块大小
    pub block_size: u32,
    /// 块数，含末尾的暂存块
    pub block_count: u32,
}

impl FlashGeometry {
    pub fn total_size(&self) -> u32 {
        self.block_size * self.block_count
    }

    /// 可用大小：扣除暂存块
    pub fn available_size(&self) -> u32 {
        self.block_size * (self.block_count - 1)
    }

    /// 至少两块，0 号块要装得下头部与两张目录表，末端不越过地址空间
    fn validate(self) -> Result<Self, Error> {
        if self.block_count < 2 || self.block_size < LAYOUT_SPAN {
            return Err(Error::InvalidArgument);
        }
        let end = self.start as u64 + self.block_size as u64 * self.block_count as u64;
        if end > u32::MAX as u64 {
            return Err(Error::InvalidArgument);
        }
        Ok(self)
    }
}

/// 单写者的准入状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Writer {
    Idle,
    /// 名额已被占下，目录项还没写出
    Claimed,
    /// 表中某槽位正在写入
    Open(usize),
}

/// 一个挂载的 xip-fs 区域
pub struct XipFileSystem {
    pub(crate) dev: Arc<dyn FlashDevice>,
    pub(crate) start: u32,
    pub(crate) block_size: u32,
    pub(crate) block_count: u32,
    total_size: u32,
    pub(crate) avail_size: u32,
    pub(crate) writer: Writer,
}

impl XipFileSystem {
    /// 挂载一个区域；发现中断的压缩时强制重格式化
    pub fn mount(dev: Arc<dyn FlashDevice>, geo: FlashGeometry) -> Result<Self, Error> {
        let geo = geo.validate()?;
        let mut fs = Self {
            dev,
            start: geo.start,
            block_size: geo.block_size,
            block_count: geo.block_count,
            total_size: geo.total_size(),
            avail_size: geo.available_size(),
            writer: Writer::Idle,
        };

        let header = fs.read_header()?;
        if !header.is_valid() {
            return Err(Error::InvalidArgument);
        }
        let state = header.move_state();
        if state.interrupted() {
            log::warn!("interrupted compaction left at {state:?}, reformatting");
            fs.wipe()?;
        }
        log::info!(
            "mounted: {} blocks of {} bytes at {:#x}",
            fs.block_count,
            fs.block_size,
            fs.start
        );
        Ok(fs)
    }

    /// 格式化：擦除整个可用区域（暂存块用前必擦，不必在此处理）
    pub fn format(dev: &dyn FlashDevice, geo: FlashGeometry) -> Result<(), Error> {
        let geo = geo.validate()?;
        dev.erase(geo.start, geo.available_size()).map_err(io_err)?;
        log::info!("formatted {} bytes at {:#x}", geo.available_size(), geo.start);
        Ok(())
    }

    /// 把已挂载的区域重置为刚格式化的状态
    fn wipe(&mut self) -> Result<(), Error> {
        self.flash_erase(0, self.avail_size)?;
        self.writer = Writer::Idle;
        Ok(())
    }

    /* 底层访问，偏移相对区域起点，越界视为状态损坏 */

    pub(crate) fn flash_read(&self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.check_range(offset, buf.len())?;
        self.dev.read(self.start + offset, buf).map_err(io_err)
    }

    pub(crate) fn flash_write(&self, offset: u32, buf: &[u8]) -> Result<(), Error> {
        self.check_range(offset, buf.len())?;
        self.dev.program(self.start + offset, buf).map_err(io_err)
    }

    pub(crate) fn flash_erase(&self, offset: u32, len: u32) -> Result<(), Error> {
        self.check_range(offset, len as usize)?;
        self.dev.erase(self.start + offset, len).map_err(io_err)
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), Error> {
        if offset as u64 + len as u64 > self.total_size as u64 {
            return Err(Error::Io);
        }
        Ok(())
    }

    /* 头部与目录表 */

    fn read_header(&self) -> Result<Header, Error> {
        let mut buf = [0u8; Header::SIZE];
        self.flash_read(0, &mut buf)?;
        Ok(Header::from_bytes(buf))
    }

    /// 推进压缩进度
    ///
    /// 进行中标记只能写在刚随 0 号块擦除的全 1 头部上；
    /// 完成标记是全 0，任何旧值上都编程得出。两次都不置位。
    pub(crate) fn set_move_state(&self, state: MoveState) -> Result<(), Error> {
        let header = Header {
            magic: MAGIC,
            move_state: state.encode(),
        };
        self.flash_write(0, header.as_bytes())
    }

    /// 槽位记录在区域内的偏移
    pub(crate) fn entry_offset(slot: usize) -> u32 {
        TABLE_OFFSET + (slot * DirEntry::SIZE) as u32
    }

    pub(crate) fn read_entry(&self, slot: usize) -> Result<DirEntry, Error> {
        let mut buf = [0u8; DirEntry::SIZE];
        self.flash_read(Self::entry_offset(slot), &mut buf)?;
        Ok(DirEntry::from_bytes(buf))
    }

    /// 编程一条完整记录并回读确认
    fn write_entry(&self, slot: usize, entry: &DirEntry) -> Result<(), Error> {
        self.flash_write(Self::entry_offset(slot), entry.as_bytes())?;
        if self.read_entry(slot)?.magic != MAGIC {
            return Err(Error::Io);
        }
        Ok(())
    }

    /// 单字段编程；只能清位
    pub(crate) fn write_entry_field(
        &self,
        slot: usize,
        field: u32,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.flash_write(Self::entry_offset(slot) + field, bytes)
    }

    /* 线性分配 */

    /// 扫描目录表，为新条目归纳出槽位与数据偏移
    ///
    /// 表是只追加的：首个不在用的槽位就是表尾。墓碑条目的
    /// 数据区在压缩前仍然占着位置，大小未知的条目按掩码估计
    /// 占位；残缺记录的字段不可信，不参与偏移计算。
    fn plan_allocation(&self) -> Result<Plan, Error> {
        let mut plan = Plan {
            free_slot: None,
            next_offset: LAYOUT_SPAN,
            dead: 0,
        };

        for slot in 0..DIR_CAPACITY {
            let ent = self.read_entry(slot)?;
            if !ent.in_use() {
                if ent.is_free() {
                    plan.free_slot = Some(slot);
                }
                // 非哨兵的残值只能靠压缩回收，表到此为止
                break;
            }

            let whole = ent.end == ENTRY_END;
            if !whole || ent.valid == 0 || (!ent.is_dir() && !ent.size_known()) {
                plan.dead += 1;
            }
            if whole && !ent.is_dir() {
                let end = ent.data.saturating_add(ent.best_size());
                plan.next_offset = plan.next_offset.max(end);
            }
        }
        Ok(plan)
    }

    /// 写出一条新目录项
    ///
    /// 空间或槽位不足时先压缩一次再重试一次；整张表都是
    /// 墓碑时直接擦掉可用区域，省下这轮压缩。
    pub(crate) fn create_entry(
        &mut self,
        name: &str,
        ty: DirEntryType,
    ) -> Result<(usize, DirEntry), Error> {
        let plan = self.plan_allocation()?;
        if let Some(slot) = plan.usable_slot(self.avail_size) {
            return self.write_new_entry(slot, plan.next_offset, name, ty);
        }

        if plan.dead == DIR_CAPACITY {
            log::debug!("all slots dead, erasing region");
            self.flash_erase(0, self.avail_size)?;
            return self.write_new_entry(0, LAYOUT_SPAN, name, ty);
        }

        self.compact()?;
        let plan = self.plan_allocation()?;
        match plan.usable_slot(self.avail_size) {
            Some(slot) => self.write_new_entry(slot, plan.next_offset, name, ty),
            None => Err(Error::OutOfSpace),
        }
    }

    fn write_new_entry(
        &mut self,
        slot: usize,
        offset: u32,
        name: &str,
        ty: DirEntryType,
    ) -> Result<(usize, DirEntry), Error> {
        let entry = match ty {
            DirEntryType::Directory => DirEntry::new_directory(name),
            DirEntryType::Regular => DirEntry::new_file(name, align4(offset)),
        };
        self.write_entry(slot, &entry)?;
        Ok((slot, entry))
    }
}

/// 一次分配扫描的结论
struct Plan {
    free_slot: Option<usize>,
    /// 新数据的起始偏移（对齐前）
    next_offset: u32,
    /// 在用槽位中可由压缩回收的个数
    dead: usize,
}

impl Plan {
    /// 有空槽还不够，数据区也得没越界
    fn usable_slot(&self, avail: u32) -> Option<usize> {
        (self.next_offset < avail).then_some(self.free_slot).flatten()
    }
}

pub(crate) fn align4(n: u32) -> u32 {
    n.next_multiple_of(4)
}

fn io_err(_: DevError) -> Error {
    Error::Io
}
