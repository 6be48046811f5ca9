//! Maven coordinates

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GavError {
    #[error("GAV must match <groupId>:<artifactId>[:<packagingType>[:<classifier>]]:<version>, got '{0}'")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<Exclusion>,
}

impl Dependency {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = (!version.is_empty()).then_some(version);
        self
    }

    /// Same group and artifact id
    pub fn same_artifact(&self, other: &Dependency) -> bool {
        self.group_id == other.group_id && self.artifact_id == other.artifact_id
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if let Some(kind) = &self.kind {
            write!(f, ":{}", kind)?;
            if let Some(classifier) = &self.classifier {
                write!(f, ":{}", classifier)?;
            }
        }
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Parses `<groupId>:<artifactId>[:<type>[:<classifier>]]:<version>`
pub fn parse_gav(gav: &str) -> Result<Dependency, GavError> {
    let parts: Vec<&str> = gav.trim().split(':').collect();

    if parts.len() < 2 || parts.len() > 5 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(GavError::Malformed(gav.to_string()));
    }
    if parts.iter().any(|p| p.contains(' ')) {
        return Err(GavError::Malformed(gav.to_string()));
    }

    let mut dep = Dependency::new(parts[0], parts[1]);
    match parts.len() {
        3 => dep.version = non_empty(parts[2]),
        4 => {
            dep.kind = non_empty(parts[2]);
            dep.version = non_empty(parts[3]);
        }
        5 => {
            dep.kind = non_empty(parts[2]);
            dep.classifier = non_empty(parts[3]);
            dep.version = non_empty(parts[4]);
        }
        _ => {}
    }

    Ok(dep)
}
