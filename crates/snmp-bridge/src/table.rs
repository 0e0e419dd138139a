// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OID translation table.

use std::fmt;

/// Value transformation applied to a matched binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformKind {
    /// Identifier rewrite only.
    #[default]
    None,
    /// Decimal volts to centivolts.
    Voltage,
    /// Decimal degrees to tenths of a degree.
    Temperature,
}

impl TransformKind {
    /// Parse the `translation_type` config value.
    ///
    /// An empty string means no value transform.
    pub fn from_config(s: &str) -> Option<Self> {
        match s {
            "" => Some(Self::None),
            "voltage" => Some(Self::Voltage),
            "temp" => Some(Self::Temperature),
            _ => None,
        }
    }

    /// Multiplier applied before rounding.
    pub fn scale(self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Voltage => Some(100.0),
            Self::Temperature => Some(10.0),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Voltage => "voltage",
            Self::Temperature => "temp",
        })
    }
}

/// Translation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client requests heading upstream: match `source_oid`, emit `target_oid`.
    SourceToTarget,
    /// Upstream replies and device traps: match `target_oid`, emit `source_oid`.
    TargetToSource,
}

/// One identifier mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRule {
    pub source_oid: String,
    pub target_oid: String,
    pub kind: TransformKind,
}

impl TranslationRule {
    /// Create a rule. Leading dots are stripped from both identifiers.
    pub fn new(source_oid: &str, target_oid: &str, kind: TransformKind) -> Self {
        Self {
            source_oid: normalize_oid(source_oid).to_string(),
            target_oid: normalize_oid(target_oid).to_string(),
            kind,
        }
    }

    /// Identifier matched in `direction`.
    pub fn matched(&self, direction: Direction) -> &str {
        match direction {
            Direction::SourceToTarget => &self.source_oid,
            Direction::TargetToSource => &self.target_oid,
        }
    }

    /// Identifier emitted in `direction`.
    pub fn counterpart(&self, direction: Direction) -> &str {
        match direction {
            Direction::SourceToTarget => &self.target_oid,
            Direction::TargetToSource => &self.source_oid,
        }
    }
}

/// Immutable rule set, scanned in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    rules: Vec<TranslationRule>,
}

impl TranslationTable {
    pub fn build(rules: Vec<TranslationRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| TranslationRule::new(&r.source_oid, &r.target_oid, r.kind))
            .collect();
        Self { rules }
    }

    /// First rule whose identifier for `direction` equals `oid`.
    pub fn lookup(&self, oid: &str, direction: Direction) -> Option<&TranslationRule> {
        let oid = normalize_oid(oid);
        self.rules.iter().find(|r| r.matched(direction) == oid)
    }

    pub fn rules(&self) -> &[TranslationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Strip a single leading dot.
pub fn normalize_oid(oid: &str) -> &str {
    oid.strip_prefix('.').unwrap_or(oid)
}
