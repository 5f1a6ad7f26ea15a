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

//! The `gen`/`classify` command implementations
//!
//! `gen` parses and expands a GTS string, generates one AArch64 testcase per
//! expanded experiment, and either prints the assembly to stdout or writes
//! the `OUTDIR/NNNNNNNN/` directory tree the executor expects. `classify`
//! reads that tree back, applies the configured classification method to
//! group measurements into classes, and runs the analyzer over each class.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::analyzer::{self, ClassAnalysis};
use crate::codegen::{Aarch64, CodeGenerator, DeterministicState, RegisterContents, Target};
use crate::config::{ClassificationMethod, Config, IntRelation};
use crate::error::{GtsError, GtsResult};
use crate::lang::ast::Gts;
use crate::lang::expand::{expand_gts, BitWidths, ExpansionState};
use crate::lang::parser::parse;

/// The driver retries a `CodegenOffset` conflict this many times before it
/// becomes fatal.
const MAX_CODEGEN_RETRIES: u32 = 3;

/// `gen` command arguments.
pub struct GenArgs {
    /// The raw GTS source text (the language's only input form).
    pub gts: String,
    /// Directory to write `NNNNNNNN/{asm_setup.h,asm.h,registers.json}` and
    /// `gts.txt` into. Without it, assembly goes to stdout.
    pub outdir: Option<PathBuf>,
    /// Deterministic-mode state file: read if present, written back after
    /// generation so the next run continues the same placeholder mapping.
    pub deterministic: Option<PathBuf>,
}

/// `classify` command arguments.
pub struct ClassifyArgs {
    pub outdir: PathBuf,
    pub config: PathBuf,
}

struct ArchWidths<'a, T: Target>(&'a T);

impl<'a, T: Target> BitWidths for ArchWidths<'a, T> {
    fn offset_width(&self) -> u32 {
        self.0.offset_bits().width()
    }

    fn set_width(&self) -> u32 {
        self.0.set_bits().width()
    }
}

fn build_generator<'t, 'r>(
    target: &'t Aarch64,
    rng: &'r mut StdRng,
    state: Option<DeterministicState>,
) -> GtsResult<CodeGenerator<'t, 'r, Aarch64>> {
    match state {
        Some(s) => CodeGenerator::from_state(target, rng, s),
        None => CodeGenerator::new(target, rng),
    }
}

/// Runs the `gen` command.
///
/// Each experiment is generated from a reset generator state
/// so experiments are independent of one another — except in deterministic
/// mode, where the generator's placeholder mapping tables are deliberately
/// carried from one experiment to the next (and persisted to
/// `args.deterministic` once the whole run completes). A recoverable
/// `CodegenOffset` conflict rebuilds the generator from the *pre-attempt*
/// state and retries, so a failed attempt's partial pool draws never leak
/// into the next one.
pub fn gen(args: &GenArgs) -> GtsResult<()> {
    let gts: Gts = parse(&args.gts)?;

    let target = Aarch64;
    let mut expansion_rng = StdRng::from_entropy();
    let (pre_experiments, main_experiments) = {
        let widths = ArchWidths(&target);
        let mut state = ExpansionState::new(&widths, &mut expansion_rng);
        expand_gts(&gts, &mut state)?
    };
    let precondition = pre_experiments.first();

    let mut carried_state = match &args.deterministic {
        Some(path) if path.exists() => Some(DeterministicState::from_json(&fs::read_to_string(path)?)?),
        _ => None,
    };

    if let Some(outdir) = &args.outdir {
        fs::create_dir_all(outdir)?;
        fs::write(outdir.join("gts.txt"), format!("{gts}\n"))?;
    }

    for (index, main) in main_experiments.iter().enumerate() {
        let mut attempt = 0;
        let (output, next_state) = loop {
            let mut codegen_rng = StdRng::from_entropy();
            let mut generator = build_generator(&target, &mut codegen_rng, carried_state.clone())?;
            match generator.generate(precondition, main) {
                Ok(output) => break (output, generator.dump_state()),
                Err(e) if e.is_recoverable() && attempt < MAX_CODEGEN_RETRIES => {
                    tracing::warn!(experiment = index, attempt, "codegen offset conflict, retrying: {e}");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        match &args.outdir {
            Some(outdir) => write_experiment(outdir, index, &output)?,
            None => print_experiment(index, &output)?,
        }

        if args.deterministic.is_some() {
            carried_state = Some(next_state);
        }
    }

    if let (Some(path), Some(state)) = (&args.deterministic, carried_state) {
        fs::write(path, state.to_json()?)?;
    }

    tracing::info!(count = main_experiments.len(), "generation complete");
    Ok(())
}

fn write_experiment(outdir: &Path, index: usize, output: &crate::codegen::Output) -> GtsResult<()> {
    let dir = outdir.join(format!("{index:08}"));
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("asm_setup.h"), format!("{}\n", output.setup_text))?;
    fs::write(dir.join("asm.h"), format!("{}\n", output.main_text))?;
    fs::write(dir.join("registers.json"), output.register_contents.to_json()?)?;
    Ok(())
}

fn print_experiment(index: usize, output: &crate::codegen::Output) -> GtsResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "// experiment {index:08}")?;
    writeln!(out, "{}", output.setup_text)?;
    writeln!(out, "{}", output.main_text)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// A decoded content line from a `print_cache_valid` dump:
/// `<set>\s+::<way>\s+::\stag: <hex>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub set: i64,
    pub way: i64,
    pub tag: u64,
}

/// The entries dumped for one cache level within one `uart.log`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheLevelDump {
    pub level: u32,
    pub entries: Vec<CacheEntry>,
}

fn parse_cache_entry(line: &str) -> Option<CacheEntry> {
    let mut parts = line.splitn(3, "::");
    let set = parts.next()?.trim().parse().ok()?;
    let way = parts.next()?.trim().parse().ok()?;
    let tag_part = parts.next()?.trim();
    let hex = tag_part.strip_prefix("tag:")?.trim();
    let tag = u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok()?;
    Some(CacheEntry { set, way, tag })
}

/// Parses the cache log shape
pub fn parse_cache_log(text: &str) -> GtsResult<Vec<CacheLevelDump>> {
    let mut lines = text.lines();
    for line in lines.by_ref() {
        if line.trim() == "Init complete." {
            break;
        }
    }

    let mut levels = Vec::new();
    let mut pending: Option<u32> = None;
    let mut in_dump = false;
    let mut entries = Vec::new();

    for line in lines {
        let line = line.trim();
        if line == "Experiment complete." {
            break;
        }
        if let Some(rest) = line.strip_prefix('L') {
            if let Some(level) = rest.strip_suffix(" output").and_then(|n| n.parse::<u32>().ok()) {
                pending = Some(level);
                continue;
            }
        }
        if line == "print_cache_valid" {
            continue;
        }
        if line == "----" {
            if in_dump {
                let level = pending.take().ok_or_else(|| {
                    GtsError::Io("cache log: closing '----' with no pending level".to_string())
                })?;
                levels.push(CacheLevelDump { level, entries: std::mem::take(&mut entries) });
                in_dump = false;
            } else {
                in_dump = true;
            }
            continue;
        }
        if in_dump {
            if let Some(entry) = parse_cache_entry(line) {
                entries.push(entry);
            }
        }
    }

    Ok(levels)
}

/// Parses the integer log shape: a `name;<digits>` line.
pub fn parse_int_log(text: &str) -> GtsResult<(String, i64)> {
    for line in text.lines() {
        if let Some((name, digits)) = line.split_once(';') {
            let value = digits
                .trim()
                .parse::<i64>()
                .map_err(|_| GtsError::Io(format!("integer log: not a number: {digits:?}")))?;
            return Ok((name.trim().to_string(), value));
        }
    }
    Err(GtsError::Io("integer log: no 'name;<digits>' line found".to_string()))
}

fn apply_int_relation(relation: IntRelation, value: i64, threshold: i64) -> bool {
    match relation {
        IntRelation::Lt => value < threshold,
        IntRelation::Le => value <= threshold,
        IntRelation::Eq => value == threshold,
        IntRelation::Ge => value >= threshold,
        IntRelation::Gt => value > threshold,
        IntRelation::Ne => value != threshold,
    }
}

/// Computes the class key one measurement's `uart.log` falls into under
/// `config`'s classification method.
fn classify_measurement(config: &Config, uart_log: &str) -> GtsResult<String> {
    match config.general.classification_method {
        ClassificationMethod::CacheCount => {
            let section = config.cache_count.as_ref().expect("validated at config load time");
            let levels = parse_cache_log(uart_log)?;
            let count =
                levels.iter().find(|d| d.level as i64 == section.cache_level).map(|d| d.entries.len()).unwrap_or(0);
            Ok(count.to_string())
        }
        ClassificationMethod::CacheExactAddress => {
            let section = config.cache_exact_address.as_ref().expect("validated at config load time");
            let levels = parse_cache_log(uart_log)?;
            let dump = levels.iter().find(|d| d.level as i64 == section.cache_level);
            let tag = dump
                .and_then(|d| d.entries.get(section.expected_address_index as usize))
                .map(|e| format!("{:#x}", e.tag));
            Ok(tag.unwrap_or_else(|| "absent".to_string()))
        }
        ClassificationMethod::IntThreshold => {
            let section = config.int_threshold.as_ref().expect("validated at config load time");
            let (_, value) = parse_int_log(uart_log)?;
            Ok(apply_int_relation(section.relation, value, section.threshold).to_string())
        }
        ClassificationMethod::IntPctError => {
            let section = config.int_pct_error.as_ref().expect("validated at config load time");
            let (_, value) = parse_int_log(uart_log)?;
            let bucket = if section.bucket_size <= 0 { 0 } else { value.div_euclid(section.bucket_size) };
            Ok(bucket.to_string())
        }
    }
}

fn read_experiment_dirs(outdir: &Path) -> GtsResult<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(outdir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Runs the `classify` command, returning the per-class analysis so callers
/// (the CLI, or tests) can decide how to present it.
pub fn classify(args: &ClassifyArgs) -> GtsResult<Vec<ClassAnalysis>> {
    let config = Config::load(&args.config)?;

    let mut classes: HashMap<String, Vec<RegisterContents>> = HashMap::new();
    for dir in read_experiment_dirs(&args.outdir)? {
        let uart_log_path = dir.join("uart.log");
        let registers_path = dir.join("registers.json");
        if !uart_log_path.exists() || !registers_path.exists() {
            continue;
        }

        let uart_log = fs::read_to_string(&uart_log_path)?;
        let registers = RegisterContents::from_json(&fs::read_to_string(&registers_path)?)?;
        let class_id = classify_measurement(&config, &uart_log)?;
        classes.entry(class_id).or_default().push(registers);
    }

    Ok(analyzer::analyze_classes(&classes, 0, 64))
}

/// Renders a [`ClassAnalysis`] list as a human-readable report.
pub fn render_report(analyses: &[ClassAnalysis]) -> String {
    let mut out = String::new();
    for analysis in analyses {
        out.push_str(&format!("class {}\n", analysis.class_id));
        for scored in &analysis.constraints {
            out.push_str(&format!(
                "  constraint: {}[{}] == {} (match rate {:.3})\n",
                scored.finding.register, scored.finding.bit, scored.finding.value as u8, scored.match_rate
            ));
        }
        for scored in &analysis.relations {
            out.push_str(&format!(
                "  relation: {} == {}*{} + {} (match rate {:.3})\n",
                scored.finding.register_2,
                scored.finding.a,
                scored.finding.register_1,
                scored.finding.b,
                scored.match_rate
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_cache_log_with_two_levels() {
        let text = "\
booting...
Init complete.
L1 output
print_cache_valid
----
0 :: 0 :: tag: 0x10
0 :: 1 :: tag: 0x20
----
L2 output
print_cache_valid
----
----
Experiment complete.
";
        let levels = parse_cache_log(text).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].level, 1);
        assert_eq!(levels[0].entries.len(), 2);
        assert_eq!(levels[0].entries[0], CacheEntry { set: 0, way: 0, tag: 0x10 });
        assert_eq!(levels[1].entries.len(), 0);
    }

    #[test]
    fn parses_an_integer_log() {
        let text = "cycles;1234\nExperiment complete.\n";
        assert_eq!(parse_int_log(text).unwrap(), ("cycles".to_string(), 1234));
    }

    #[test]
    fn int_threshold_classification_buckets_on_relation() {
        let config = Config::parse(
            "\
[general]
measurement_method = time
classification_method = int_threshold
cpu_architecture = aarch64

[method_int_threshold]
threshold = 100
relation = ge
",
        )
        .unwrap();
        let above = classify_measurement(&config, "cycles;150\nExperiment complete.\n").unwrap();
        let below = classify_measurement(&config, "cycles;50\nExperiment complete.\n").unwrap();
        assert_eq!(above, "true");
        assert_eq!(below, "false");
    }

    #[test]
    fn cache_count_classification_counts_entries_at_the_configured_level() {
        let config = Config::parse(
            "\
[general]
measurement_method = cache
classification_method = cache_count
cpu_architecture = aarch64

[method_cache_count]
cache_level = 1
",
        )
        .unwrap();
        let text = "\
Init complete.
L1 output
print_cache_valid
----
0 :: 0 :: tag: 0x1
0 :: 1 :: tag: 0x2
0 :: 2 :: tag: 0x3
----
Experiment complete.
";
        assert_eq!(classify_measurement(&config, text).unwrap(), "3");
    }
}
