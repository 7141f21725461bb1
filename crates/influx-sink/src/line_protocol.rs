use crate::{FieldValue, Point, Precision};
use std::fmt::Write;

/// Encode one point as a line-protocol line:
/// `measurement,tag=v field=1.5,other="x" 1700000000`.
/// Tags with empty values are omitted.
pub fn encode_point(point: &Point, precision: Precision) -> String {
    let mut line = String::with_capacity(128);
    push_escaped(&mut line, point.measurement(), &[',', ' ']);
    for (key, value) in point.tags() {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        push_escaped(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        push_escaped(&mut line, value, &[',', '=', ' ']);
    }
    line.push(' ');
    for (i, (key, value)) in point.fields().iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        push_escaped(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        push_field_value(&mut line, value);
    }
    let _ = write!(line, " {}", precision.timestamp(point.timestamp()));
    line
}

fn push_escaped(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn push_field_value(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Float(f) => {
            // Integral floats still need a float marker or the store types them as ints.
            if f.fract() == 0.0 && f.abs() < 1e15 {
                let _ = write!(out, "{f:.1}");
            } else {
                let _ = write!(out, "{f}");
            }
        }
        FieldValue::Integer(i) => {
            let _ = write!(out, "{i}i");
        }
        FieldValue::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        FieldValue::Str(s) => {
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use time::macros::datetime;

    fn point(tags: &[(&str, &str)], fields: Vec<(&str, FieldValue)>) -> Point {
        Point::new(
            "battery",
            tags.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            datetime!(2024-05-01 10:00:00 UTC),
        )
        .unwrap()
    }

    #[test]
    fn encodes_typed_fields_and_sorted_tags() {
        let p = point(
            &[("unit", "%"), ("deviceName", "Front Door")],
            vec![
                ("value", FieldValue::Float(87.0)),
                ("valueBinary", FieldValue::Integer(1)),
                ("health", FieldValue::Str("ONLINE".into())),
            ],
        );
        assert_eq!(
            encode_point(&p, Precision::Seconds),
            r#"battery,deviceName=Front\ Door,unit=% health="ONLINE",value=87.0,valueBinary=1i 1714557600"#
        );
    }

    #[test]
    fn escapes_special_characters_and_skips_empty_tags() {
        let p = point(
            &[("deviceName", "a,b=c"), ("unit", "")],
            vec![("value", FieldValue::Str(r#"say "hi" \o/"#.into()))],
        );
        assert_eq!(
            encode_point(&p, Precision::Seconds),
            r#"battery,deviceName=a\,b\=c value="say \"hi\" \\o/" 1714557600"#
        );
    }

    #[test]
    fn keeps_fractional_floats_and_booleans() {
        let p = point(
            &[],
            vec![
                ("valueFloat", FieldValue::Float(21.25)),
                ("online", FieldValue::Bool(true)),
            ],
        );
        assert_eq!(
            encode_point(&p, Precision::Milliseconds),
            "battery online=true,valueFloat=21.25 1714557600000"
        );
    }
}
