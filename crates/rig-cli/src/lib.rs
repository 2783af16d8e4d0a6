//! rig - pinned CLI tools, verified
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! `rig install` reads the nearest `rig.toml`, installs every listed
//! package for the host platform and links its commands into
//! `<root>/bin`. `rig update-checksum` fills the checksum manifest next to
//! the config for every supported platform.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod cmd;

#[derive(Debug, Parser)]
#[command(name = "rig")]
#[command(author, version, about = "rig - install pinned CLI tool versions")]
pub struct Cli {
    /// Config file (default: nearest rig.toml)
    #[arg(short, long, global = true, env = "RIG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory for links and packages
    #[arg(long, global = true, env = "RIG_ROOT_DIR")]
    pub root_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install every package of the config
    #[command(visible_alias = "i")]
    Install {
        /// Only create links
        #[arg(short = 'l', long)]
        only_link: bool,

        /// Don't create links
        #[arg(long, conflicts_with = "only_link")]
        skip_link: bool,

        /// Fail when a file can't be found in a package
        #[arg(long)]
        test: bool,

        /// Also copy executables into this directory
        #[arg(long, value_name = "DIR")]
        copy_dir: Option<PathBuf>,

        /// Only install packages with one of these tags
        #[arg(short = 't', long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Skip packages with any of these tags
        #[arg(long, value_delimiter = ',')]
        exclude_tags: Vec<String>,
    },

    /// Record checksums of every package for every supported platform
    #[command(name = "update-checksum", visible_alias = "upc")]
    UpdateChecksum {
        /// Download and hash assets that have no upstream checksum file
        #[arg(long)]
        deep: bool,

        /// Also update global config files
        #[arg(short, long)]
        all: bool,
    },
}
