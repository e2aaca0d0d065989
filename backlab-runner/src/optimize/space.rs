//! Search-space construction from declared parameters and caller ranges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use backlab_core::rounding::round_to;
use backlab_core::strategy::{ParamDecl, ParamKind, ParamValue};

use super::OptimizeError;

/// Smallest continuous bound and range width.
const FLOAT_FLOOR: f64 = 0.0001;

/// A range bound as the caller sent it: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Number(f64),
    Text(String),
}

impl Bound {
    fn to_f64(&self) -> Option<f64> {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

impl From<f64> for Bound {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// Caller-supplied range for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub min: Bound,
    pub max: Bound,
}

impl RangeRequest {
    pub fn new(min: impl Into<Bound>, max: impl Into<Bound>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }
}

/// Where a search range came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSource {
    User,
    Declared,
    Derived,
}

/// One searched parameter with its inclusive bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParam {
    pub name: String,
    pub kind: ParamKind,
    pub low: f64,
    pub high: f64,
    pub source: RangeSource,
}

impl SearchParam {
    /// Continuous interval the sampler works in. Integers get half a step of
    /// padding on each side so every value is equally likely after rounding.
    pub fn sampling_bounds(&self) -> (f64, f64) {
        match self.kind {
            ParamKind::Int => (self.low - 0.5, self.high + 0.5),
            ParamKind::Float => (self.low, self.high),
        }
    }

    /// Map a raw sampled number back into a typed value inside the range.
    pub fn to_value(&self, raw: f64) -> ParamValue {
        let clamped = raw.clamp(self.low, self.high);
        ParamValue::coerce(self.kind, clamped)
    }

    pub fn contains(&self, value: ParamValue) -> bool {
        let v = value.as_f64();
        v >= self.low && v <= self.high
    }
}

/// Ordered list of searched parameters (declaration order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    pub params: Vec<SearchParam>,
}

impl SearchSpace {
    /// Build the space for `decls`, overlaying `user` ranges.
    ///
    /// Every declared parameter is searched. User ranges take precedence over a
    /// declared suggested range, which takes precedence over the derived default.
    pub fn build(
        decls: &[ParamDecl],
        user: &BTreeMap<String, RangeRequest>,
    ) -> Result<Self, OptimizeError> {
        if let Some(unknown) = user.keys().find(|k| !decls.iter().any(|d| &d.name == *k)) {
            return Err(OptimizeError::InvalidSearchSpace {
                param: unknown.clone(),
                reason: "not declared by the strategy".into(),
            });
        }

        let params = decls
            .iter()
            .map(|decl| match user.get(&decl.name) {
                Some(req) => user_range(decl, req),
                None => Ok(declared_or_default(decl)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SearchParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Derived default range for a declared parameter, ignoring any suggestion.
pub fn default_range(decl: &ParamDecl) -> (f64, f64) {
    match decl.default {
        ParamValue::Int(d) => {
            if d <= 0 {
                return (1.0, 10.0);
            }
            let min = ((d as f64) * 0.5).trunc().max(1.0);
            let max = ((d as f64) * 2.0).trunc().max(min + 1.0);
            (min, max)
        }
        ParamValue::Float(d) => {
            if d <= 0.0 {
                return (0.01, 1.0);
            }
            let min = round_to(d * 0.5, 6).max(FLOAT_FLOOR);
            let max = round_to(d * 2.0, 6).max(min + FLOAT_FLOOR);
            (min, max)
        }
    }
}

fn declared_or_default(decl: &ParamDecl) -> SearchParam {
    let kind = decl.kind();
    let (low, high, source) = match decl.suggested {
        Some(r) => match kind {
            ParamKind::Int => (r.min.trunc(), r.max.trunc(), RangeSource::Declared),
            ParamKind::Float => (r.min, r.max, RangeSource::Declared),
        },
        None => {
            let (low, high) = default_range(decl);
            (low, high, RangeSource::Derived)
        }
    };
    SearchParam {
        name: decl.name.clone(),
        kind,
        low,
        high,
        source,
    }
}

fn user_range(decl: &ParamDecl, req: &RangeRequest) -> Result<SearchParam, OptimizeError> {
    let invalid = |reason: String| OptimizeError::InvalidSearchSpace {
        param: decl.name.clone(),
        reason,
    };
    let min = req
        .min
        .to_f64()
        .ok_or_else(|| invalid(format!("min {:?} is not a finite number", req.min)))?;
    let max = req
        .max
        .to_f64()
        .ok_or_else(|| invalid(format!("max {:?} is not a finite number", req.max)))?;

    let kind = decl.kind();
    let (low, high) = match kind {
        ParamKind::Int => {
            let (low, high) = (min.trunc(), max.trunc());
            if low > high {
                return Err(invalid(format!("min {low} > max {high}")));
            }
            (low, high)
        }
        ParamKind::Float => {
            if min >= max {
                return Err(invalid(format!("min {min} >= max {max}")));
            }
            (min, max)
        }
    };
    Ok(SearchParam {
        name: decl.name.clone(),
        kind,
        low,
        high,
        source: RangeSource::User,
    })
}
