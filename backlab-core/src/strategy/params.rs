//! Strategy parameters: declarations, values and override resolution.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Float,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
        }
    }
}

/// A typed parameter value. Serializes as a bare JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Int(_) => ParamKind::Int,
            Self::Float(_) => ParamKind::Float,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    /// Coerce a raw number into this value's kind. Integers round to nearest.
    pub fn coerce(kind: ParamKind, raw: f64) -> Self {
        match kind {
            ParamKind::Int => Self::Int(raw.round() as i64),
            ParamKind::Float => Self::Float(raw),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// A parameter a strategy declares, with its default and an optional
/// suggested optimization range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub default: ParamValue,
    #[serde(default)]
    pub suggested: Option<ParamRange>,
}

impl ParamDecl {
    pub fn int(name: impl Into<String>, default: i64) -> Self {
        Self {
            name: name.into(),
            default: ParamValue::Int(default),
            suggested: None,
        }
    }

    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            default: ParamValue::Float(default),
            suggested: None,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.suggested = Some(ParamRange::new(min, max));
        self
    }

    pub fn kind(&self) -> ParamKind {
        self.default.kind()
    }
}

/// Ordered name -> value mapping handed to a strategy at build time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults of every declared parameter.
    pub fn from_decls(decls: &[ParamDecl]) -> Self {
        let values = decls
            .iter()
            .map(|d| (d.name.clone(), d.default))
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.as_f64())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).map(|v| match v {
            ParamValue::Int(i) => i,
            ParamValue::Float(f) => f.round() as i64,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for ParamSet {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Result of overlaying caller overrides on declared defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParams {
    pub params: ParamSet,
    /// Override names the strategy does not declare, sorted.
    pub ignored: Vec<String>,
}

/// Overlay `overrides` on the declared defaults.
///
/// Matching is exact and case-sensitive. Unknown names are reported in
/// `ignored`, never applied. Override values take the declared parameter's kind.
pub fn resolve_params(decls: &[ParamDecl], overrides: &BTreeMap<String, f64>) -> ResolvedParams {
    let mut params = ParamSet::from_decls(decls);
    let mut ignored = Vec::new();

    for (name, raw) in overrides {
        match decls.iter().find(|d| &d.name == name) {
            Some(decl) => params.insert(name.clone(), ParamValue::coerce(decl.kind(), *raw)),
            None => ignored.push(name.clone()),
        }
    }
    ignored.sort();

    ResolvedParams { params, ignored }
}
