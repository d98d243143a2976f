//! Build script rendering the `relaylink(1)` man page from the CLI definition.
//!
//! The page lands in `target/generated-man` unless `RELAYLINK_MAN_DIR` names
//! another directory.

use std::{
    env,
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

const MAN_DIR_VAR: &str = "RELAYLINK_MAN_DIR";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed={MAN_DIR_VAR}");

    let man_dir = env::var_os(MAN_DIR_VAR)
        .map_or_else(|| PathBuf::from("target/generated-man"), PathBuf::from);
    fs::create_dir_all(&man_dir)?;

    let version = env::var("CARGO_PKG_VERSION")?;
    let page = Man::new(cli::Cli::command())
        .section("1")
        .manual("relaylink manual")
        .source(format!("relaylink {version}"));

    let mut out = BufWriter::new(File::create(man_dir.join("relaylink.1"))?);
    page.render(&mut out)?;
    out.flush()?;
    Ok(())
}
