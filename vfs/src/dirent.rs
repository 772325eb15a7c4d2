use alloc::string::String;

/// 列目录时逐条返回的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ty: DirEntryType,
    pub name: String,
    /// 已知的文件大小；尚未关闭的文件给出掩码估计值
    pub size: u32,
}

/// 条目种类，数值与持久化的种类字段一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DirEntryType {
    #[default]
    Regular = 1,
    Directory = 2,
}
