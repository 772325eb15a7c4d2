use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Directory of files to pack
    #[arg(long, short)]
    pub source: PathBuf,

    /// Flash image to create
    #[arg(long, short)]
    pub target: PathBuf,

    /// Erase block size in bytes
    #[arg(long, default_value_t = 4096)]
    pub block_size: u32,

    /// Region size in blocks, scratch block included
    #[arg(long, default_value_t = 64)]
    pub block_count: u32,
}
