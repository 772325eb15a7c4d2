mod cli;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;

use clap::Parser;
use cli::Cli;
use xip_fs::{FlashGeometry, OpenFlag, XipFileSystem};
use xip_fs_fuse::FlashFile;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\ntarget={:?}", cli.source, cli.target);

    let geo = FlashGeometry {
        start: 0,
        block_size: cli.block_size,
        block_count: cli.block_count,
    };

    let flash = Arc::new(FlashFile(Mutex::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&cli.target)?;
        fd.set_len(geo.total_size() as u64).unwrap();

        fd
    })));

    XipFileSystem::format(flash.as_ref(), geo).expect("formatting failed");
    let mut fs = XipFileSystem::mount(flash, geo).expect("mounting failed");

    for file in fs::read_dir(&cli.source)? {
        let file = file?;
        if !file.file_type()?.is_file() {
            continue;
        }
        let name = file.file_name();
        let name = name.to_str().expect("source file name isn't utf-8");
        println!("packing: {name:?}");

        let mut data: Vec<u8> = Vec::new();
        File::open(file.path())?.read_to_end(&mut data)?;

        let handle = fs
            .open(&format!("/{name}"), OpenFlag::Create.into())
            .expect("creating failed");
        let n = fs.write(&handle, 0, &data).expect("writing failed");
        assert_eq!(data.len(), n, "image is full");
        fs.close(&handle, n as u32).expect("closing failed");
    }

    let mut pos = 0;
    while let Some(entry) = fs.read_dir(pos).expect("listing failed") {
        log::info!("packed: {} ({} bytes)", entry.name, entry.size);
        pos += 1;
    }

    Ok(())
}
