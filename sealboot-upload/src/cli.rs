// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use sealboot_common::Region;
use sealboot_upload::client::DEFAULT_PAGE_SIZE;
use sealboot_upload::Transport;

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "sealboot-upload")]
#[command(about = "Provisioning tool for the sealboot serial bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0). Auto-detected when omitted.
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Flash page size of the device, in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flash region selector for readback.
#[derive(Clone, Copy, ValueEnum)]
pub enum RegionArg {
    Firmware,
    Config,
}

impl From<RegionArg> for Region {
    fn from(arg: RegionArg) -> Self {
        match arg {
            RegionArg::Firmware => Region::Firmware,
            RegionArg::Config => Region::Configuration,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt and hash a firmware image into a sealed bundle
    Protect {
        /// Plain firmware binary
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Firmware version (0 keeps the installed version)
        #[arg(short, long)]
        version: u16,

        /// Release message shown when the device boots
        #[arg(short, long, default_value = "")]
        message: String,

        /// File holding the AES-128 key as 32 hex characters (default: development key)
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Output bundle
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,
    },

    /// Install a sealed bundle
    Update {
        #[arg(value_name = "BUNDLE")]
        bundle: PathBuf,
    },

    /// Store a configuration blob
    Configure {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Read raw bytes from the start of a flash region
    Readback {
        #[arg(value_enum)]
        region: RegionArg,

        /// Number of bytes
        size: u32,

        /// Write to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Boot the installed firmware
    Boot,
}

fn open(port: Option<&str>) -> Result<Transport> {
    match port {
        Some(name) => Transport::new(name),
        None => Transport::discover(),
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Protect {
        file,
        version,
        message,
        key_file,
        output,
    } = &cli.command
    {
        return commands::protect(file, *version, message, key_file.as_deref(), output);
    }

    let transport = open(cli.port.as_deref())?;
    println!("Port: {}", transport.port_name());
    let mut client = sealboot_upload::Client::new(transport, cli.page_size);

    match cli.command {
        Commands::Protect { .. } => Ok(()),
        Commands::Update { bundle } => commands::update(&mut client, &bundle),
        Commands::Configure { file } => commands::configure(&mut client, &file),
        Commands::Readback { region, size, output } => {
            commands::readback(&mut client, region.into(), size, output.as_deref())
        }
        Commands::Boot => commands::boot(&mut client),
    }
}
