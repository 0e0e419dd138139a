// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Variable binding translation.

use crate::codec::{Value, VarBind};
use crate::table::{Direction, TransformKind, TranslationTable};
use thiserror::Error;

/// Reasons a value could not be converted for a Voltage/Temperature rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueParseError {
    #[error("expected OctetString, got {0}")]
    NotOctetString(&'static str),

    #[error("value is not valid UTF-8")]
    NotUtf8,

    #[error("value {0:?} is not a decimal number")]
    NotNumeric(String),

    #[error("value {0} is not finite")]
    NonFinite(f64),

    #[error("scaled value {0} does not fit in Integer32")]
    OutOfRange(f64),
}

/// Rewrite `variables` under `direction`.
///
/// Returns the rewritten list and whether any binding matched a rule.
pub fn translate(
    variables: &[VarBind],
    table: &TranslationTable,
    direction: Direction,
) -> (Vec<VarBind>, bool) {
    let mut any_translated = false;

    let out = variables
        .iter()
        .map(|vb| {
            let Some(rule) = table.lookup(&vb.oid, direction) else {
                return vb.clone();
            };
            any_translated = true;

            let oid = rule.counterpart(direction).to_string();
            tracing::trace!("{} -> {} ({:?}, {})", vb.oid, oid, direction, rule.kind);

            if vb.value.is_null() {
                return VarBind::null(oid);
            }

            let value = match scale_value(&vb.value, rule.kind) {
                Ok(Some(v)) => Value::Integer(v),
                Ok(None) => vb.value.clone(),
                Err(e) => {
                    tracing::warn!("{} ({}): {}, value passed through", vb.oid, rule.kind, e);
                    vb.value.clone()
                }
            };
            VarBind { oid, value }
        })
        .collect();

    (out, any_translated)
}

/// Apply a numeric transform. `Ok(None)` means the kind has no value transform.
pub fn scale_value(value: &Value, kind: TransformKind) -> Result<Option<i32>, ValueParseError> {
    let Some(scale) = kind.scale() else {
        return Ok(None);
    };

    let bytes = match value {
        Value::OctetString(b) => b,
        other => return Err(ValueParseError::NotOctetString(other.type_name())),
    };
    let text = std::str::from_utf8(bytes).map_err(|_| ValueParseError::NotUtf8)?;
    let parsed: f64 = text
        .trim()
        .parse()
        .map_err(|_| ValueParseError::NotNumeric(text.to_string()))?;
    if !parsed.is_finite() {
        return Err(ValueParseError::NonFinite(parsed));
    }

    let scaled = (parsed * scale).round();
    if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
        return Err(ValueParseError::OutOfRange(scaled));
    }
    Ok(Some(scaled as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TranslationRule;

    const SRC_VOLT: &str = "1.3.6.1.4.1.9999.1.1";
    const DST_VOLT: &str = "1.3.6.1.4.1.2021.8.1";
    const SRC_TEMP: &str = "1.3.6.1.4.1.9999.1.2";
    const DST_TEMP: &str = "1.3.6.1.4.1.2021.8.2";
    const SRC_NAME: &str = "1.3.6.1.4.1.9999.1.3";
    const DST_NAME: &str = "1.3.6.1.4.1.2021.8.3";

    fn table() -> TranslationTable {
        TranslationTable::build(vec![
            TranslationRule::new(SRC_VOLT, DST_VOLT, TransformKind::Voltage),
            TranslationRule::new(SRC_TEMP, DST_TEMP, TransformKind::Temperature),
            TranslationRule::new(SRC_NAME, DST_NAME, TransformKind::None),
        ])
    }

    fn text(s: &str) -> Value {
        Value::OctetString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_unmapped_passes_through() {
        let input = vec![VarBind::new("1.3.6.1.2.1.1.1.0", text("router"))];
        let (out, translated) = translate(&input, &table(), Direction::SourceToTarget);

        assert_eq!(out, input);
        assert!(!translated);
    }

    #[test]
    fn test_voltage_and_temperature_scaling() {
        let input = vec![
            VarBind::new(DST_VOLT, text("12.34")),
            VarBind::new(DST_TEMP, text("23.5")),
        ];
        let (out, translated) = translate(&input, &table(), Direction::TargetToSource);

        assert!(translated);
        assert_eq!(out[0], VarBind::new(SRC_VOLT, Value::Integer(1234)));
        assert_eq!(out[1], VarBind::new(SRC_TEMP, Value::Integer(235)));
    }

    #[test]
    fn test_scaling_rounds_to_nearest() {
        // 0.29 * 100 is 28.999999999999996 in binary floating point.
        assert_eq!(scale_value(&text("0.29"), TransformKind::Voltage), Ok(Some(29)));
        assert_eq!(scale_value(&text("-4.26"), TransformKind::Temperature), Ok(Some(-43)));
        assert_eq!(scale_value(&text(" 5 "), TransformKind::Voltage), Ok(Some(500)));
    }

    #[test]
    fn test_null_gets_identifier_rewrite_only() {
        let input = vec![VarBind::null(SRC_VOLT), VarBind::null(SRC_TEMP)];
        let (out, translated) = translate(&input, &table(), Direction::SourceToTarget);

        assert!(translated);
        assert_eq!(out, vec![VarBind::null(DST_VOLT), VarBind::null(DST_TEMP)]);
    }

    #[test]
    fn test_identifier_only_rule_keeps_value() {
        let input = vec![VarBind::new(DST_NAME, text("cabinet-7"))];
        let (out, translated) = translate(&input, &table(), Direction::TargetToSource);

        assert!(translated);
        assert_eq!(out, vec![VarBind::new(SRC_NAME, text("cabinet-7"))]);
    }

    #[test]
    fn test_parse_failure_keeps_value() {
        let input = vec![
            VarBind::new(DST_VOLT, text("n/a")),
            VarBind::new(DST_TEMP, Value::Gauge32(12)),
            VarBind::new(DST_VOLT, Value::OctetString(vec![0xff, 0xfe])),
        ];
        let (out, translated) = translate(&input, &table(), Direction::TargetToSource);

        assert!(translated);
        assert_eq!(out[0], VarBind::new(SRC_VOLT, text("n/a")));
        assert_eq!(out[1], VarBind::new(SRC_TEMP, Value::Gauge32(12)));
        assert_eq!(out[2].value, Value::OctetString(vec![0xff, 0xfe]));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            scale_value(&Value::Integer(5), TransformKind::Voltage),
            Err(ValueParseError::NotOctetString("Integer"))
        );
        assert_eq!(
            scale_value(&text("abc"), TransformKind::Voltage),
            Err(ValueParseError::NotNumeric("abc".into()))
        );
        assert!(matches!(
            scale_value(&text("inf"), TransformKind::Voltage),
            Err(ValueParseError::NonFinite(_))
        ));
        assert!(matches!(
            scale_value(&text("1e12"), TransformKind::Temperature),
            Err(ValueParseError::OutOfRange(_))
        ));
        assert_eq!(scale_value(&Value::Integer(5), TransformKind::None), Ok(None));
    }

    #[test]
    fn test_round_trip_restores_identifiers_not_values() {
        let table = table();
        let request = vec![
            VarBind::new(SRC_VOLT, text("12.34")),
            VarBind::new(SRC_NAME, text("x")),
        ];

        let (upstream, _) = translate(&request, &table, Direction::SourceToTarget);
        assert_eq!(upstream[0], VarBind::new(DST_VOLT, Value::Integer(1234)));

        let (back, _) = translate(&upstream, &table, Direction::TargetToSource);
        let oids: Vec<_> = back.iter().map(|vb| vb.oid.as_str()).collect();
        assert_eq!(oids, vec![SRC_VOLT, SRC_NAME]);

        // Integer is not an OctetString, so the scaled value is not undone.
        assert_eq!(back[0].value, Value::Integer(1234));
        assert_eq!(back[1].value, text("x"));
    }

    #[test]
    fn test_first_match_wins_for_duplicates() {
        let table = TranslationTable::build(vec![
            TranslationRule::new(SRC_VOLT, DST_VOLT, TransformKind::Voltage),
            TranslationRule::new(SRC_VOLT, DST_TEMP, TransformKind::Temperature),
        ]);
        let (out, _) = translate(
            &[VarBind::new(SRC_VOLT, text("1.5"))],
            &table,
            Direction::SourceToTarget,
        );
        assert_eq!(out, vec![VarBind::new(DST_VOLT, Value::Integer(150))]);
    }

    #[test]
    fn test_order_and_length_preserved() {
        let input = vec![
            VarBind::null("1.3.6.1.2.1.1.5.0"),
            VarBind::null(SRC_TEMP),
            VarBind::null("1.3.6.1.2.1.1.6.0"),
        ];
        let (out, _) = translate(&input, &table(), Direction::SourceToTarget);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].oid, "1.3.6.1.2.1.1.5.0");
        assert_eq!(out[1].oid, DST_TEMP);
        assert_eq!(out[2].oid, "1.3.6.1.2.1.1.6.0");
    }
}
