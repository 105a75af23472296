use std::fs;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use ftable::FileTable;
use mini_fs::DIRSIZ;
use vfs::InodeKind;

/// Build a mini-fs image and copy host files into its root directory
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Output image
    #[arg(short, long, default_value = "fs.img")]
    image: PathBuf,
    /// Total number of blocks
    #[arg(long, default_value_t = 2048)]
    blocks: u32,
    /// Number of inodes
    #[arg(long, default_value_t = 200)]
    inodes: u32,
    /// Store the files as checked files
    #[arg(long)]
    checked: bool,
    /// Host files to copy
    files: Vec<PathBuf>,
}

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let fs = fs_tools::create(&cli.image, cli.blocks, cli.inodes)?;
    let table: FileTable = FileTable::new();
    let kind = if cli.checked {
        InodeKind::Checked
    } else {
        InodeKind::File
    };

    for path in &cli.files {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| name.len() <= DIRSIZ)
            .ok_or_else(|| io::Error::other(format!("unusable file name {path:?}")))?;
        let data = fs::read(path)?;

        let inum =
            fs_tools::add_file(&table, &fs, name, &data, kind).map_err(io::Error::other)?;
        log::info!("{name} -> inode {inum}, {} bytes", data.len());
    }

    fs.sync().map_err(io::Error::other)
}
