use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ftable::FileTable;

/// Print the size, type and checksum of a file inside a mini-fs image
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Filesystem image
    #[arg(short, long, default_value = "fs.img")]
    image: PathBuf,
    /// Path of the file, relative to the root directory
    path: String,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let fs = match fs_tools::mount(&cli.image) {
        Ok(fs) => fs,
        Err(err) => {
            eprintln!("cannot mount {:?}: {err}", cli.image);
            return ExitCode::FAILURE;
        }
    };

    let table: FileTable = FileTable::new();
    match fs_tools::stat_path(&table, &fs, &cli.path) {
        Ok(stat) => {
            println!("File: {}", cli.path);
            println!("Size: {}", stat.size);
            println!("Type: {} ({:?})", u16::from(stat.kind), stat.kind);
            println!("Checksum: {}", stat.checksum);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("something wrong in stat: {err}");
            ExitCode::FAILURE
        }
    }
}
