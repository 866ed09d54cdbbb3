//! Label selector used by VolumeGroup to pick its member PersistentVolumeClaims
//!
//! Mirrors the shape of a Kubernetes `LabelSelector` so manifests written for
//! the upstream API keep working. The selector can be evaluated locally with
//! [`VolumeSelector::matches`] or rendered into an API server label query with
//! [`VolumeSelector::to_query`].

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Operator for label selector requirements
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SelectorOperator {
    /// Label value must be in the specified set
    In,
    /// Label value must not be in the specified set
    NotIn,
    /// Label must exist (value ignored)
    Exists,
    /// Label must not exist (value ignored)
    DoesNotExist,
}

impl SelectorOperator {
    /// Check if a label value matches this operator
    pub fn matches(&self, label_value: Option<&str>, values: &[String]) -> bool {
        match self {
            Self::In => label_value.is_some_and(|v| values.iter().any(|req| req == v)),
            Self::NotIn => {
                label_value.is_none() || !values.iter().any(|req| Some(req.as_str()) == label_value)
            }
            Self::Exists => label_value.is_some(),
            Self::DoesNotExist => label_value.is_none(),
        }
    }
}

/// A single requirement in `matchExpressions`
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRequirement {
    /// The label key that the selector applies to
    pub key: String,

    /// Operator representing the relationship between label and values
    pub operator: SelectorOperator,

    /// Values for `In` and `NotIn`; must be empty for the other operators
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl SelectorRequirement {
    /// Check if a label set satisfies this requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key).map(|s| s.as_str());
        self.operator.matches(value, &self.values)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.key.is_empty() {
            return Err(Error::invalid_selector("requirement key must not be empty"));
        }
        match self.operator {
            SelectorOperator::In | SelectorOperator::NotIn if self.values.is_empty() => {
                Err(Error::invalid_selector(format!(
                    "operator {:?} on key {} requires at least one value",
                    self.operator, self.key
                )))
            }
            SelectorOperator::Exists | SelectorOperator::DoesNotExist
                if !self.values.is_empty() =>
            {
                Err(Error::invalid_selector(format!(
                    "operator {:?} on key {} must not have values",
                    self.operator, self.key
                )))
            }
            _ => Ok(()),
        }
    }

    fn to_query(&self) -> String {
        match self.operator {
            SelectorOperator::In => format!("{} in ({})", self.key, self.values.join(",")),
            SelectorOperator::NotIn => format!("{} notin ({})", self.key, self.values.join(",")),
            SelectorOperator::Exists => self.key.clone(),
            SelectorOperator::DoesNotExist => format!("!{}", self.key),
        }
    }
}

/// Label selector over PersistentVolumeClaims
///
/// An empty selector `{}` matches every claim in the namespace.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSelector {
    /// Exact label matches; all must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// Set-based requirements; all must match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<SelectorRequirement>,
}

impl VolumeSelector {
    /// Selector with only exact label matches
    pub fn from_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: Some(
                labels
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            match_expressions: vec![],
        }
    }

    /// Check if a claim's labels satisfy this selector
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        if let Some(match_labels) = &self.match_labels {
            for (key, value) in match_labels {
                if labels.get(key) != Some(value) {
                    return false;
                }
            }
        }

        self.match_expressions.iter().all(|req| req.matches(labels))
    }

    /// Check if this selector is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().is_none_or(|m| m.is_empty())
            && self.match_expressions.is_empty()
    }

    /// Reject requirements the API server would refuse
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(labels) = &self.match_labels {
            if labels.keys().any(|k| k.is_empty()) {
                return Err(Error::invalid_selector("matchLabels key must not be empty"));
            }
        }
        self.match_expressions
            .iter()
            .try_for_each(SelectorRequirement::validate)
    }

    /// Render as a `labelSelector` query string for list calls.
    ///
    /// Returns an empty string for the empty selector.
    pub fn to_query(&self) -> Result<String, Error> {
        self.validate()?;

        let mut parts: Vec<String> = self
            .match_labels
            .iter()
            .flatten()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        parts.extend(self.match_expressions.iter().map(SelectorRequirement::to_query));
        Ok(parts.join(","))
    }
}
