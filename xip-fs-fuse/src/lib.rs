
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use flash_dev::{DevError, FlashDevice};

/// 以普通文件模拟 flash 区域
///
/// 编程按 NOR 规则执行：读出旧值按位与后写回。
pub struct FlashFile(pub Mutex<File>);

impl FlashDevice for FlashFile {
    fn erase(&self, addr: u32, len: u32) -> Result<(), DevError> {
        const WIPE: [u8; 512] = [0xFF; 512];
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start(addr as u64)).map_err(|_| DevError)?;
        let mut left = len as usize;
        while left > 0 {
            let n = left.min(WIPE.len());
            file.write_all(&WIPE[..n]).map_err(|_| DevError)?;
            left -= n;
        }
        Ok(())
    }

    fn program(&self, addr: u32, buf: &[u8]) -> Result<(), DevError> {
        let mut file = self.0.lock().unwrap();
        let mut old = vec![0u8; buf.len()];
        file.seek(SeekFrom::Start(addr as u64)).map_err(|_| DevError)?;
        file.read_exact(&mut old).map_err(|_| DevError)?;
        for (cell, b) in old.iter_mut().zip(buf) {
            *cell &= b;
        }
        file.seek(SeekFrom::Start(addr as u64)).map_err(|_| DevError)?;
        file.write_all(&old).map_err(|_| DevError)
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), DevError> {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start(addr as u64)).map_err(|_| DevError)?;
        file.read_exact(buf).map_err(|_| DevError)
    }
}

/// 内存里的 flash 区域，测试用
///
/// 比 [`FlashFile`] 严格：编程逐字节校验 NOR 约定，
/// 试图把 0 写回 1 的请求直接报错而不是默默按位与。
pub struct MemFlash(Mutex<Vec<u8>>);

impl MemFlash {
    pub fn new(size: usize) -> Self {
        Self(Mutex::new(vec![0xFF; size]))
    }
}

impl FlashDevice for MemFlash {
    fn erase(&self, addr: u32, len: u32) -> Result<(), DevError> {
        let mut mem = self.0.lock().unwrap();
        let (addr, len) = (addr as usize, len as usize);
        if addr + len > mem.len() {
            return Err(DevError);
        }
        mem[addr..addr + len].fill(0xFF);
        Ok(())
    }

    fn program(&self, addr: u32, buf: &[u8]) -> Result<(), DevError> {
        let mut mem = self.0.lock().unwrap();
        let addr = addr as usize;
        if addr + buf.len() > mem.len() {
            return Err(DevError);
        }
        let cells = &mut mem[addr..addr + buf.len()];
        if cells.iter().zip(buf).any(|(cell, b)| b & !cell != 0) {
            return Err(DevError);
        }
        cells.copy_from_slice(buf);
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), DevError> {
        let mem = self.0.lock().unwrap();
        let addr = addr as usize;
        if addr + buf.len() > mem.len() {
            return Err(DevError);
        }
        buf.copy_from_slice(&mem[addr..addr + buf.len()]);
        Ok(())
    }
}
