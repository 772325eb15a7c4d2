//! # flash 设备接口层
//!
//! NOR flash 以块为擦除单位、以字节为编程单位：
//! 擦除把整块置回 0xFF，编程只能把位从 1 清为 0。
//! 定义设备驱动要实现的接口 [`FlashDevice`]，
//! 实现了此接口的类型我们称之为 flash 驱动。
//!
//! `xip-fs` 只通过这一接口触碰 flash。

#![no_std]

/// 驱动层错误，引擎不解读具体原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevError;

/// flash 驱动接口
///
/// 地址一律是设备绝对地址，片内偏移由驱动自行换算。
pub trait FlashDevice: Send + Sync {
    /// 擦除 `[addr, addr + len)`，长度应为擦除块大小的整数倍
    fn erase(&self, addr: u32, len: u32) -> Result<(), DevError>;

    /// 编程一段字节；只能把位从 1 清为 0
    fn program(&self, addr: u32, buf: &[u8]) -> Result<(), DevError>;

    /// 读出一段字节，无副作用
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), DevError>;

    /// 写者准入所用的互斥锁，单执行流环境用默认的空实现即可
    fn lock(&self) {}

    /// 释放 [`lock`](FlashDevice::lock) 取得的互斥锁
    fn unlock(&self) {}
}
