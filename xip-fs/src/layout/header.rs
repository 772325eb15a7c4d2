use core::mem;
use core::slice;

use crate::{ERASED_WORD, MAGIC};

/// 区域头部，只由挂载与压缩流程改写
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub magic: u32,
    /// 压缩进度字，按 [`MoveState`] 解读
    pub move_state: u32,
}

impl Header {
    pub const SIZE: usize = mem::size_of::<Self>();

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        unsafe { mem::transmute(bytes) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self as *const _ as usize as *const u8, Self::SIZE) }
    }

    /// 本文件系统的区域：已写入签名，或从未写过头部
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC || self.magic == ERASED_WORD
    }

    pub fn move_state(&self) -> MoveState {
        MoveState::decode(self.move_state)
    }
}

/// 压缩进度的标签化读法
///
/// 编程只能清位，而 Complete 是全 0 字，其上写不出任何非零标记。
/// 进行中标记因此要等 0 号块随表暂存擦成全 1 后再编程；
/// 完成标记本身是全 0，落在任何旧值上都能成立。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    /// 头部整字保持擦除态，从未压缩过
    Unformatted,
    /// 压缩进行中，数据正暂存到第 `target` 块
    Started { target: u32 },
    /// 上一轮压缩已完成
    Complete,
}

impl MoveState {
    /// [`Complete`](MoveState::Complete) 的持久化值
    pub const COMPLETE: u32 = 0;

    pub fn decode(word: u32) -> Self {
        match word {
            ERASED_WORD => Self::Unformatted,
            Self::COMPLETE => Self::Complete,
            target => Self::Started { target },
        }
    }

    pub fn encode(self) -> u32 {
        match self {
            Self::Unformatted => ERASED_WORD,
            Self::Complete => Self::COMPLETE,
            Self::Started { target } => target,
        }
    }

    /// 压缩进行到一半掉电留下的状态，挂载时须强制重格式化
    pub fn interrupted(self) -> bool {
        matches!(self, Self::Started { .. })
    }
}
