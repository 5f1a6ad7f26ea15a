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

//! The classifier config file format
//!
//! The format is a small INI dialect: `[section]` headers, `key = value`
//! lines, blank lines and `;`/`#`-prefixed lines ignored. There is no
//! nesting and no quoting, so this reads it by hand a line at a time
//! rather than reaching for a generic INI crate.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{GtsError, GtsResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasurementMethod {
    Cache,
    Time,
    BranchPredictor,
}

impl MeasurementMethod {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "cache" => Some(Self::Cache),
            "time" => Some(Self::Time),
            "branch_predictor" => Some(Self::BranchPredictor),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationMethod {
    CacheCount,
    CacheExactAddress,
    IntThreshold,
    IntPctError,
}

impl ClassificationMethod {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "cache_count" => Some(Self::CacheCount),
            "cache_exact_address" => Some(Self::CacheExactAddress),
            "int_threshold" => Some(Self::IntThreshold),
            "int_pct_error" => Some(Self::IntPctError),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntRelation {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl IntRelation {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            "eq" => Some(Self::Eq),
            "ge" => Some(Self::Ge),
            "gt" => Some(Self::Gt),
            "ne" => Some(Self::Ne),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneralSection {
    pub measurement_method: MeasurementMethod,
    pub classification_method: ClassificationMethod,
    pub cpu_architecture: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CacheCountSection {
    pub cache_level: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CacheExactAddressSection {
    pub cache_level: i64,
    pub expected_address_index: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntThresholdSection {
    pub threshold: i64,
    pub relation: IntRelation,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct IntPctErrorSection {
    pub bucket_size: i64,
}

/// The fully validated config. Exactly one of the four
/// `method_*` sections is populated, matching `general.classification_method`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub general: GeneralSection,
    pub cache_count: Option<CacheCountSection>,
    pub cache_exact_address: Option<CacheExactAddressSection>,
    pub int_threshold: Option<IntThresholdSection>,
    pub int_pct_error: Option<IntPctErrorSection>,
}

type RawSections = HashMap<String, HashMap<String, String>>;

fn parse_raw(text: &str) -> GtsResult<RawSections> {
    let mut sections: RawSections = HashMap::new();
    let mut current: Option<String> = None;

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('[') {
            let name = stripped.strip_suffix(']').ok_or_else(|| {
                GtsError::Config(format!("line {}: unterminated section header {:?}", lineno + 1, line))
            })?;
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }
        let Some(section) = &current else {
            return Err(GtsError::Config(format!("line {}: key outside any [section]: {:?}", lineno + 1, line)));
        };
        let Some((key, value)) = line.split_once('=') else {
            return Err(GtsError::Config(format!("line {}: expected key = value, found {:?}", lineno + 1, line)));
        };
        sections.get_mut(section).unwrap().insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(sections)
}

fn required<'a>(fields: &'a HashMap<String, String>, section: &str, key: &str) -> GtsResult<&'a str> {
    fields
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| GtsError::Config(format!("[{section}] is missing required key {key:?}")))
}

fn required_int(fields: &HashMap<String, String>, section: &str, key: &str) -> GtsResult<i64> {
    let raw = required(fields, section, key)?;
    raw.parse::<i64>().map_err(|_| GtsError::Config(format!("[{section}] {key} must be an integer, found {raw:?}")))
}

impl Config {
    /// Parses and validates a config file at `path`.
    pub fn load(path: &Path) -> GtsResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses and validates config source text.
    pub fn parse(text: &str) -> GtsResult<Self> {
        let sections = parse_raw(text)?;

        let general_fields =
            sections.get("general").ok_or_else(|| GtsError::Config("missing [general] section".to_string()))?;

        let measurement_raw = required(general_fields, "general", "measurement_method")?;
        let measurement_method = MeasurementMethod::parse(measurement_raw)
            .ok_or_else(|| GtsError::Config(format!("[general] measurement_method: unknown value {measurement_raw:?}")))?;

        let classification_raw = required(general_fields, "general", "classification_method")?;
        let classification_method = ClassificationMethod::parse(classification_raw).ok_or_else(|| {
            GtsError::Config(format!("[general] classification_method: unknown value {classification_raw:?}"))
        })?;

        let cpu_architecture = required(general_fields, "general", "cpu_architecture")?.to_string();

        let general = GeneralSection { measurement_method, classification_method, cpu_architecture };

        let mut cache_count = None;
        let mut cache_exact_address = None;
        let mut int_threshold = None;
        let mut int_pct_error = None;

        match classification_method {
            ClassificationMethod::CacheCount => {
                let fields = sections
                    .get("method_cache_count")
                    .ok_or_else(|| GtsError::Config("missing [method_cache_count] section".to_string()))?;
                cache_count =
                    Some(CacheCountSection { cache_level: required_int(fields, "method_cache_count", "cache_level")? });
            }
            ClassificationMethod::CacheExactAddress => {
                let fields = sections
                    .get("method_cache_exact_address")
                    .ok_or_else(|| GtsError::Config("missing [method_cache_exact_address] section".to_string()))?;
                cache_exact_address = Some(CacheExactAddressSection {
                    cache_level: required_int(fields, "method_cache_exact_address", "cache_level")?,
                    expected_address_index: required_int(
                        fields,
                        "method_cache_exact_address",
                        "expected_address_index",
                    )?,
                });
            }
            ClassificationMethod::IntThreshold => {
                let fields = sections
                    .get("method_int_threshold")
                    .ok_or_else(|| GtsError::Config("missing [method_int_threshold] section".to_string()))?;
                let relation_raw = required(fields, "method_int_threshold", "relation")?;
                let relation = IntRelation::parse(relation_raw).ok_or_else(|| {
                    GtsError::Config(format!("[method_int_threshold] relation: unknown value {relation_raw:?}"))
                })?;
                int_threshold = Some(IntThresholdSection {
                    threshold: required_int(fields, "method_int_threshold", "threshold")?,
                    relation,
                });
            }
            ClassificationMethod::IntPctError => {
                let fields = sections
                    .get("method_int_pct_error")
                    .ok_or_else(|| GtsError::Config("missing [method_int_pct_error] section".to_string()))?;
                int_pct_error = Some(IntPctErrorSection {
                    bucket_size: required_int(fields, "method_int_pct_error", "bucket_size")?,
                });
            }
        }

        Ok(Config { general, cache_count, cache_exact_address, int_threshold, int_pct_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_cache_count_config() {
        let text = "\
[general]
measurement_method = cache
classification_method = cache_count
cpu_architecture = aarch64

[method_cache_count]
cache_level = 1
";
        let config = Config::parse(text).unwrap();
        assert_eq!(config.general.measurement_method, MeasurementMethod::Cache);
        assert_eq!(config.general.classification_method, ClassificationMethod::CacheCount);
        assert_eq!(config.cache_count, Some(CacheCountSection { cache_level: 1 }));
        assert!(config.cache_exact_address.is_none());
    }

    #[test]
    fn cache_exact_address_requires_expected_address_index() {
        let text = "\
[general]
measurement_method = cache
classification_method = cache_exact_address
cpu_architecture = aarch64

[method_cache_exact_address]
cache_level = 2
";
        let err = Config::parse(text).unwrap_err();
        assert!(matches!(err, GtsError::Config(_)));
    }

    #[test]
    fn int_threshold_parses_relation_enum() {
        let text = "\
[general]
measurement_method = time
classification_method = int_threshold
cpu_architecture = aarch64

[method_int_threshold]
threshold = 100
relation = ge
";
        let config = Config::parse(text).unwrap();
        assert_eq!(
            config.int_threshold,
            Some(IntThresholdSection { threshold: 100, relation: IntRelation::Ge })
        );
    }

    #[test]
    fn unknown_measurement_method_is_rejected() {
        let text = "\
[general]
measurement_method = quantum
classification_method = cache_count
cpu_architecture = aarch64

[method_cache_count]
cache_level = 1
";
        assert!(Config::parse(text).is_err());
    }

    #[test]
    fn key_outside_any_section_is_rejected() {
        let text = "measurement_method = cache\n";
        assert!(Config::parse(text).is_err());
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "\
; a comment
[general]
# another comment
measurement_method = cache
classification_method = cache_count
cpu_architecture = aarch64

[method_cache_count]
cache_level = 3
";
        assert!(Config::parse(text).is_ok());
    }
}
