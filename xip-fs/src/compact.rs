//! # 压缩回收层
//!
//! 删除只留墓碑，空间靠整体压缩回收：目录表只留下完整有效的
//! 条目，数据按表序前移填实。区域末块是唯一的暂存空间，
//! 一次腾挪一个擦除块。头部进度字是这轮压缩的意图日志，
//! 中途掉电由挂载流程识别并强制重格式化。

use alloc::vec::Vec;

use derive_more::{Add, From, Into};
use vfs::Error;

use crate::fs::{align4, XipFileSystem};
use crate::layout::{DirEntry, MoveState, LAYOUT_SPAN, SHADOW_OFFSET};
use crate::{DIR_CAPACITY, ENTRY_END};

/// 擦除块编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Add, From, Into)]
#[repr(transparent)]
struct BlockId(u32);

impl BlockId {
    /// 偏移 `offset` 落在哪一块
    fn holding(offset: u32, block_size: u32) -> Self {
        Self(offset / block_size)
    }
}

impl core::ops::Add<u32> for BlockId {
    type Output = Self;

    fn add(self, rhs: u32) -> Self {
        self + Self(rhs)
    }
}

/// 压缩的幸存条目：重建后的新记录与压缩前的原记录
struct Survivor {
    new: DirEntry,
    old: DirEntry,
}

impl XipFileSystem {
    /// 压缩整个区域，回收墓碑与残缺条目占据的空间
    ///
    /// 顺序固定：先重建表并落进行中标记，再搬移数据，最后写完成标记。
    /// 过程中任何断点留下的状态都会被下次挂载识别为中断压缩。
    pub(crate) fn compact(&mut self) -> Result<(), Error> {
        log::debug!("compaction start");
        let (survivors, old_high_water) = self.rewrite_table()?;
        self.move_data(&survivors, old_high_water)?;
        self.set_move_state(MoveState::Complete)?;
        log::debug!("compaction done, {} entries kept", survivors.len());
        Ok(())
    }

    /// 表重建：0 号块整体暂存并擦除，然后只写回完整有效的条目
    ///
    /// 进行中标记紧跟擦除编程到头部：此时整字为全 1，必然落位；
    /// 入口处的旧字可能是上一轮留下的全 0，清位编程写不上去。
    /// 幸存条目按表序取得紧凑的新数据偏移；其压缩前的原记录
    /// 同时写入影子备份表，供数据搬移阶段当作源清单。
    /// 一并返回旧表的数据高水位，搬移完成后低于它的块都要擦净。
    fn rewrite_table(&mut self) -> Result<(Vec<Survivor>, u32), Error> {
        self.stage_block(BlockId(0))?;
        let target = u32::from(self.scratch_block());
        self.set_move_state(MoveState::Started { target })?;

        // 旧表此刻只存在于暂存块里
        let mut survivors = Vec::new();
        let mut high_water = LAYOUT_SPAN;
        let mut pos = LAYOUT_SPAN;
        for slot in 0..DIR_CAPACITY {
            let old = self.read_staged_entry(slot)?;
            if !old.in_use() {
                break;
            }
            if old.end == ENTRY_END && !old.is_dir() {
                let end = old.data.saturating_add(old.best_size());
                high_water = high_water.max(end);
            }
            if !old.is_live() || !old.size_known() {
                continue;
            }

            let mut new = old;
            new.data = pos;
            pos += align4(old.size);

            let dst = survivors.len();
            self.flash_write(Self::entry_offset(dst), new.as_bytes())?;
            self.flash_write(
                SHADOW_OFFSET + (dst * DirEntry::SIZE) as u32,
                old.as_bytes(),
            )?;
            survivors.push(Survivor { new, old });
        }
        // 数据不可能越过可用区，更高的水位只是残值噪声
        Ok((survivors, high_water.min(self.avail_size)))
    }

    /// 数据搬移：把每个幸存文件的字节从旧偏移搬到新偏移
    ///
    /// 搬移方向恒为向前（新偏移不大于旧偏移），且旧偏移按表序
    /// 单调不减。源块在首次被读到时整块暂存并擦除；被源游标
    /// 跳过的块只含废弃数据，顺手擦除，最后把高水位以下剩余的
    /// 块也擦净，保证回收到的空间处处可编程。
    fn move_data(&mut self, survivors: &[Survivor], old_high_water: u32) -> Result<(), Error> {
        // 0 号块已在表重建阶段暂存
        let mut staged = BlockId(0);

        for s in survivors {
            if s.old.is_dir() || s.old.size == 0 {
                continue;
            }

            let mut src = s.old.data;
            let mut dst = s.new.data;
            let mut remaining = s.old.size;
            debug_assert!(dst <= src);

            while remaining > 0 {
                let b = BlockId::holding(src, self.block_size);
                debug_assert!(b >= staged);
                if b != staged {
                    self.erase_gap(staged, b)?;
                    self.stage_block(b)?;
                    staged = b;
                }
                let block_end = self.block_offset(staged) + self.block_size;
                let len = remaining.min(block_end - src);
                self.copy_from_scratch(src - self.block_offset(staged), dst, len)?;
                src += len;
                dst += len;
                remaining -= len;
            }
        }

        // 高水位之前未经手的块同样只含废弃数据
        if old_high_water > LAYOUT_SPAN {
            let last = BlockId::holding(old_high_water - 1, self.block_size);
            self.erase_gap(staged, last + 1)?;
        }
        Ok(())
    }

    /// 把一块整体复制进暂存块，然后擦除原块备用
    ///
    /// 此后该块的旧内容要从暂存副本读取。
    fn stage_block(&mut self, b: BlockId) -> Result<(), Error> {
        log::trace!("staging block {}", u32::from(b));
        self.flash_erase(self.avail_size, self.block_size)?;
        self.copy_region(self.block_offset(b), self.avail_size, self.block_size)?;
        self.flash_erase(self.block_offset(b), self.block_size)?;
        Ok(())
    }

    /// 擦除 `(after, before)` 开区间里的块
    fn erase_gap(&self, after: BlockId, before: BlockId) -> Result<(), Error> {
        for b in (u32::from(after) + 1)..u32::from(before) {
            log::trace!("erasing skipped block {b}");
            self.flash_erase(b * self.block_size, self.block_size)?;
        }
        Ok(())
    }

    /// 从暂存副本把数据搬回新偏移
    fn copy_from_scratch(&self, scratch_offset: u32, dst: u32, len: u32) -> Result<(), Error> {
        self.copy_region(self.avail_size + scratch_offset, dst, len)
    }

    /// 区域内搬运字节；目的区间必须已擦除，且与源不在同一块
    fn copy_region(&self, src: u32, dst: u32, len: u32) -> Result<(), Error> {
        let mut buf = [0u8; 256];
        let mut done = 0;
        while done < len {
            let n = (len - done).min(buf.len() as u32) as usize;
            self.flash_read(src + done, &mut buf[..n])?;
            self.flash_write(dst + done, &buf[..n])?;
            done += n as u32;
        }
        Ok(())
    }

    /// 旧表中某槽位的记录，从暂存副本读出
    fn read_staged_entry(&self, slot: usize) -> Result<DirEntry, Error> {
        let mut buf = [0u8; DirEntry::SIZE];
        self.flash_read(self.avail_size + Self::entry_offset(slot), &mut buf)?;
        Ok(DirEntry::from_bytes(buf))
    }

    fn block_offset(&self, b: BlockId) -> u32 {
        u32::from(b) * self.block_size
    }

    /// 暂存块恒为区域末块
    fn scratch_block(&self) -> BlockId {
        BlockId(self.block_count - 1)
    }
}
