//! 文件系统与上层适配器之间交换的公共类型

#![no_std]

extern crate alloc;

mod dirent;
mod error;
mod stat;

pub use self::{
    dirent::{DirEntry, DirEntryType},
    error::Error,
    stat::{Stat, StatKind},
};
