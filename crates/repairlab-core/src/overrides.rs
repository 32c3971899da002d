//! Typed `path=value` overrides merged onto any serializable configuration.

use crate::error::ConfigError;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use smallvec::SmallVec;

/// One `path=value` override, e.g. `event.deadline=25000`.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub path: String,
    pub value: Value,
}

impl Override {
    #[must_use]
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Parse `path=value`. The value is kept as a string and coerced against
    /// the target field's type during the merge.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let Some((path, value)) = raw.split_once('=') else {
            return Err(ConfigError::InvalidPatch(format!(
                "override '{raw}' must have the form path=value"
            )));
        };
        let path = path.trim();
        if path.is_empty() {
            return Err(ConfigError::InvalidPatch("empty override path".into()));
        }
        Ok(Self::new(path, Value::String(value.trim().to_owned())))
    }
}

impl std::str::FromStr for Override {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Apply `overrides` to `config`, returning the patched copy.
///
/// Unknown paths and type mismatches are rejected; deserialization errors name
/// the offending field path.
pub fn apply_overrides<T>(config: &T, overrides: &[Override]) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let mut patch = Map::new();
    for item in overrides {
        insert_path(&mut patch, &item.path, item.value.clone())?;
    }
    apply_patch(config, &Value::Object(patch))
}

/// Merge a JSON object patch onto `config`.
pub fn apply_patch<T>(config: &T, patch: &Value) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    if !patch.is_object() {
        return Err(ConfigError::InvalidPatch(
            "configuration patch must be a JSON object".into(),
        ));
    }
    let mut value = serde_json::to_value(config)
        .map_err(|err| ConfigError::InvalidPatch(format!("serialization error: {err}")))?;
    let mut path = SmallVec::<[&str; 8]>::new();
    merge_value(&mut value, patch, &mut path)?;
    serde_path_to_error::deserialize::<_, T>(value)
        .map_err(|e| ConfigError::InvalidPatch(format!("{} at {}", e, e.path())))
}

fn insert_path(map: &mut Map<String, Value>, path: &str, value: Value) -> Result<(), ConfigError> {
    let mut segments = path.split('.').filter(|s| !s.is_empty());
    let Some(mut seg) = segments.next() else {
        return Err(ConfigError::InvalidPatch("empty override path".into()));
    };
    let mut cur = map;

    for next in segments {
        let entry = cur
            .entry(seg.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        cur = entry.as_object_mut().ok_or_else(|| {
            ConfigError::InvalidPatch(format!("intermediate segment '{seg}' is not an object"))
        })?;
        seg = next;
    }

    cur.insert(seg.to_owned(), value);
    Ok(())
}

fn path_display(path: &[&str]) -> String {
    path.join(".")
}

fn mismatch(path: &[&str]) -> ConfigError {
    ConfigError::InvalidPatch(format!("type mismatch at {}", path_display(path)))
}

fn unparsable(raw: &str, path: &[&str]) -> ConfigError {
    ConfigError::InvalidPatch(format!("cannot parse '{raw}' for {}", path_display(path)))
}

fn set_f64(target: &mut Value, v: f64, path: &[&str]) -> Result<(), ConfigError> {
    let number = serde_json::Number::from_f64(v).ok_or_else(|| {
        ConfigError::InvalidPatch(format!("non-finite float at {}", path_display(path)))
    })?;
    *target = Value::Number(number);
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string into the most specific JSON scalar it denotes.
fn parse_scalar(raw: &str) -> Value {
    let raw = raw.trim();
    if raw == "null" {
        return Value::Null;
    }
    if let Some(b) = parse_bool(raw).filter(|_| !raw.chars().all(|c| c.is_ascii_digit())) {
        return Value::Bool(b);
    }
    if let Ok(v) = raw.parse::<u64>() {
        return Value::from(v);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Value::from(v);
    }
    if let Ok(v) = raw.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(v)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_owned())
}

fn merge_value<'a>(
    target: &mut Value,
    patch: &'a Value,
    path: &mut SmallVec<[&'a str; 8]>,
) -> Result<(), ConfigError> {
    match target {
        Value::Object(target_map) => {
            let Value::Object(patch_map) = patch else {
                return Err(mismatch(path));
            };
            for (key, patch_value) in patch_map {
                path.push(key);
                let Some(target_value) = target_map.get_mut(key) else {
                    return Err(ConfigError::UnknownPath(path_display(path)));
                };
                merge_value(target_value, patch_value, path)?;
                path.pop();
            }
            Ok(())
        }
        Value::Array(_) => match patch {
            Value::Array(_) => {
                *target = patch.clone();
                Ok(())
            }
            Value::String(s) => {
                let items = s
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(parse_scalar)
                    .collect();
                *target = Value::Array(items);
                Ok(())
            }
            _ => Err(mismatch(path)),
        },
        Value::Number(_) => match patch {
            Value::Number(n) => {
                *target = Value::Number(n.clone());
                Ok(())
            }
            Value::String(s) => {
                let s = s.trim();
                if target.is_u64() {
                    let v: u64 = s.parse().map_err(|_| unparsable(s, path))?;
                    *target = Value::from(v);
                } else if target.is_i64() {
                    let v: i64 = s.parse().map_err(|_| unparsable(s, path))?;
                    *target = Value::from(v);
                } else {
                    let v: f64 = s.parse().map_err(|_| unparsable(s, path))?;
                    set_f64(target, v, path)?;
                }
                Ok(())
            }
            _ => Err(mismatch(path)),
        },
        Value::String(_) => match patch {
            Value::String(_) => {
                *target = patch.clone();
                Ok(())
            }
            _ => Err(mismatch(path)),
        },
        Value::Bool(_) => match patch {
            Value::Bool(_) => {
                *target = patch.clone();
                Ok(())
            }
            Value::String(s) => {
                let parsed = parse_bool(s).ok_or_else(|| {
                    ConfigError::InvalidPatch(format!(
                        "cannot coerce '{s}' to bool for {}",
                        path_display(path)
                    ))
                })?;
                *target = Value::from(parsed);
                Ok(())
            }
            _ => Err(mismatch(path)),
        },
        // Optional fields: the patch decides the shape.
        Value::Null => {
            *target = match patch {
                Value::String(s) => parse_scalar(s),
                other => other.clone(),
            };
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HarnessConfig, OpBinsMode, RegionKind};

    fn parse_all(raw: &[&str]) -> Vec<Override> {
        raw.iter()
            .map(|r| Override::parse(r).expect("override"))
            .collect()
    }

    #[test]
    fn string_values_are_coerced_to_field_types() {
        let base = HarnessConfig::default();
        let patched = apply_overrides(
            &base,
            &parse_all(&[
                "event.deadline=30000",
                "event.corrupt_frac=0.35",
                "gate.conditioned=off",
                "region.kind=stripe",
                "motif.op_bins=axis",
            ]),
        )
        .expect("patched");
        assert_eq!(patched.event.deadline, 30_000);
        assert!((patched.event.corrupt_frac - 0.35).abs() < 1e-12);
        assert!(!patched.gate.conditioned);
        assert_eq!(patched.region.kind, RegionKind::Stripe);
        assert_eq!(patched.motif.op_bins, OpBinsMode::Axis);
        assert_eq!(base.event.deadline, 25_000);
    }

    #[test]
    fn optional_fields_accept_numbers() {
        let patched = apply_overrides(
            &HarnessConfig::default(),
            &parse_all(&["event.pre_window=1234"]),
        )
        .expect("patched");
        assert_eq!(patched.event.pre_window, Some(1234));
    }

    #[test]
    fn unknown_path_errors() {
        let err = apply_overrides(
            &HarnessConfig::default(),
            &parse_all(&["event.does_not_exist=1"]),
        )
        .expect_err("unknown path");
        assert_eq!(err, ConfigError::UnknownPath("event.does_not_exist".into()));
    }

    #[test]
    fn bad_enum_names_report_the_path() {
        let err = apply_overrides(&HarnessConfig::default(), &parse_all(&["gate.mode=sometimes"]))
            .expect_err("bad variant");
        match err {
            ConfigError::InvalidPatch(message) => assert!(message.contains("gate.mode"), "{message}"),
            other => panic!("expected InvalidPatch, got {other:?}"),
        }
    }

    #[test]
    fn integer_fields_reject_fractions() {
        let err = apply_overrides(&HarnessConfig::default(), &parse_all(&["run.steps=1.5"]))
            .expect_err("fraction");
        assert!(matches!(err, ConfigError::InvalidPatch(_)));
    }

    #[test]
    fn malformed_override_is_rejected() {
        assert!(Override::parse("no_equals_sign").is_err());
        assert!(Override::parse("=5").is_err());
    }
}
