//! Claim mapper.
//!
//! Turns raw directory attributes into userinfo claims according to the
//! scope configuration. This is a pure function: fetching the attributes is
//! the caller's job.

use serde_json::{Map, Number, Value};

use lauth_core::{ClaimConfig, ClaimType};
use lauth_ldap::Attributes;

/// Maps `attributes` through `claims` and writes `sub` last.
#[must_use]
pub fn map_claims<'a, I>(subject: &str, attributes: &Attributes, claims: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a ClaimConfig>,
{
    let mut out = Map::new();
    for claim in claims {
        let Some(values) = attributes.get(&claim.attribute) else {
            continue;
        };
        if let Some(value) = convert(values, claim.kind) {
            out.insert(claim.claim.clone(), value);
        }
    }
    out.insert("sub".to_string(), Value::String(subject.to_string()));
    out
}

fn convert(values: &[String], kind: ClaimType) -> Option<Value> {
    match kind {
        ClaimType::String => values.first().map(|v| Value::String(v.clone())),
        ClaimType::StringList => Some(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        ClaimType::Number => values.first().map(|v| number(v)),
        ClaimType::NumberList => Some(Value::Array(values.iter().map(|v| number(v)).collect())),
    }
}

/// Parses a float, falling back to 0. Integral values are kept as integers.
#[allow(clippy::cast_possible_truncation)]
fn number(value: &str) -> Value {
    let parsed = value.trim().parse::<f64>().unwrap_or(0.0);
    if parsed.fract() == 0.0 && parsed.abs() < 9.0e15 {
        return Value::Number(Number::from(parsed as i64));
    }
    Number::from_f64(parsed).map_or_else(|| Value::Number(Number::from(0)), Value::Number)
}
