use serde::{Deserialize, Serialize};

/// One resolved dependency file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,

    /// Local path of the file inside the build directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    /// Path relative to the image deployment directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl Artifact {
    pub fn new(id: impl Into<String>, location: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            target: target.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// An empty checksum string counts as absent
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref().filter(|c| !c.is_empty())
    }

    pub fn has_checksum(&self) -> bool {
        self.checksum().is_some()
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Arbitrary content to inject into the image context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub target: String,
    pub content: String,
}

pub fn artifact_ids(artifacts: &[Artifact]) -> Vec<&str> {
    artifacts.iter().map(|a| a.id.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_checksum_is_absent() {
        let artifact = Artifact::new("a", "/tmp/a.jar", "dependencies/a.jar").with_checksum("");
        assert!(!artifact.has_checksum());
        assert_eq!(artifact.checksum(), None);

        let artifact = artifact.with_checksum("sha256:00");
        assert_eq!(artifact.checksum(), Some("sha256:00"));
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = "id: org.acme:lib:1.0\ntarget: dependencies/lib.jar\nchecksum: sha256:ab\n";
        let artifact: Artifact = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(artifact.id, "org.acme:lib:1.0");
        assert!(artifact.location.is_empty());
        assert_eq!(artifact.to_string(), "org.acme:lib:1.0");

        let json = serde_json::to_string(&Artifact::new("x", "", "")).unwrap();
        assert_eq!(json, r#"{"id":"x"}"#);
    }
}
