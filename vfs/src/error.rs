/// 文件系统操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 无同名条目，或条目种类与打开方式不符
    NotFound,
    /// 要求创建，但同名条目已存在
    AlreadyExists,
    /// 已有写者在写入
    Busy,
    /// 压缩之后空间仍然不足
    OutOfSpace,
    /// 文件大小未知（写入后从未成功关闭），或操作不适用于该条目
    BadFile,
    /// 非法的几何参数、路径或打开方式
    InvalidArgument,
    /// 驱动操作失败，或读到了无法解释的状态
    Io,
}
