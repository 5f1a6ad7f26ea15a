// This file is part of gts, a generative testcase toolkit.
// Copyright 2024 gts contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later
//
// gts is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License,
// or (at your option) any later version.
//
// gts is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with gts.  If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gts::driver::{self, ClassifyArgs, GenArgs};
use gts::message;

#[derive(Parser)]
#[command(name = gts::PROGRAM_NAME, about = "Generative testcase toolkit for micro-architectural tests")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v for info, -v -v for debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a GTS string and generate AArch64 testcases.
    Gen {
        /// The GTS source text.
        gts: String,

        /// Directory to write generated testcases into. Without it,
        /// assembly is printed to stdout.
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Read/write deterministic-mode placeholder state from this file.
        /// Bare `-d`/`--deterministic` with no path defaults to state.json.
        #[arg(short, long, num_args = 0..=1, default_missing_value = "state.json")]
        deterministic: Option<PathBuf>,
    },

    /// Classify measurements under OUTDIR and mine constraints/relations.
    Classify {
        /// Directory of experiment subdirectories to read.
        #[arg(short, long)]
        outdir: PathBuf,

        /// Classifier config file (INI-like format).
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Gen { gts, outdir, deterministic } => driver::gen(&GenArgs { gts, outdir, deterministic }),
        Command::Classify { outdir, config } => {
            driver::classify(&ClassifyArgs { outdir, config }).map(|analyses| {
                print!("{}", driver::render_report(&analyses));
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            message::print(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
