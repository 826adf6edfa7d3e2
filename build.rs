//! Build script for the `mooring` man pages.
//!
//! Renders `mooring.1` plus one `mooring-<subcommand>.1` page per
//! subcommand into the build output directory with clap-mangen.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(command: clap::Command, out_dir: &Path, name: &str) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).title(name).render(&mut buffer)?;
    File::create(out_dir.join(format!("{name}.1")))?.write_all(&buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let command = Cli::command();
    for sub in command.get_subcommands() {
        render(sub.clone(), &out_dir, &format!("mooring-{}", sub.get_name()))?;
    }
    render(command, &out_dir, "mooring")?;

    Ok(())
}
