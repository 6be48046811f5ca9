//! Maven project model and `pom.xml` generation

use super::gav::{parse_gav, Dependency, Exclusion, GavError};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Repository {
    pub id: String,
    pub url: String,
    pub releases: bool,
    pub snapshots: bool,
    pub checksum_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Execution {
    pub id: Option<String>,
    pub phase: Option<String>,
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plugin {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub executions: Vec<Execution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Project {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub properties: BTreeMap<String, String>,
    pub dependency_management: Vec<Dependency>,
    pub dependencies: Vec<Dependency>,
    pub repositories: Vec<Repository>,
    pub plugins: Vec<Plugin>,
}

impl Project {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    pub fn lookup_dependency(&self, dep: &Dependency) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.same_artifact(dep))
    }

    /// Adds the dependency unless one with the same group and artifact exists
    pub fn add_dependency(&mut self, dep: Dependency) {
        if self.lookup_dependency(&dep).is_none() {
            self.dependencies.push(dep);
        }
    }

    pub fn add_dependency_gav(&mut self, group_id: &str, artifact_id: &str, version: &str) {
        self.add_dependency(Dependency::new(group_id, artifact_id).with_version(version));
    }

    pub fn add_encoded_dependency_gav(&mut self, gav: &str) -> Result<(), GavError> {
        let dep = parse_gav(gav)?;
        self.add_dependency(dep);
        Ok(())
    }

    /// Adds an exclusion to an existing dependency, ignoring duplicates
    pub fn add_dependency_exclusion(&mut self, dep: &Dependency, exclusion: Exclusion) {
        if let Some(target) = self.dependencies.iter_mut().find(|d| d.same_artifact(dep)) {
            let exists = target.exclusions.iter().any(|e| {
                e.group_id == exclusion.group_id && e.artifact_id == exclusion.artifact_id
            });
            if !exists {
                target.exclusions.push(exclusion);
            }
        }
    }

    pub fn has_repository_url(&self, url: &str) -> bool {
        self.repositories.iter().any(|r| r.url == url)
    }

    /// Serialises the project as a deterministic `pom.xml`
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<project xmlns=\"http://maven.apache.org/POM/4.0.0\" ");
        out.push_str("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ");
        out.push_str("xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 https://maven.apache.org/xsd/maven-4.0.0.xsd\">\n");
        out.push_str("  <modelVersion>4.0.0</modelVersion>\n");
        element(&mut out, 1, "groupId", &self.group_id);
        element(&mut out, 1, "artifactId", &self.artifact_id);
        element(&mut out, 1, "version", &self.version);

        if !self.properties.is_empty() {
            out.push_str("  <properties>\n");
            for (k, v) in &self.properties {
                element(&mut out, 2, k, v);
            }
            out.push_str("  </properties>\n");
        }

        if !self.dependency_management.is_empty() {
            out.push_str("  <dependencyManagement>\n    <dependencies>\n");
            for dep in &self.dependency_management {
                dependency_xml(&mut out, 3, dep);
            }
            out.push_str("    </dependencies>\n  </dependencyManagement>\n");
        }

        if !self.dependencies.is_empty() {
            out.push_str("  <dependencies>\n");
            for dep in &self.dependencies {
                dependency_xml(&mut out, 2, dep);
            }
            out.push_str("  </dependencies>\n");
        }

        if !self.repositories.is_empty() {
            out.push_str("  <repositories>\n");
            for repo in &self.repositories {
                repository_xml(&mut out, 2, "repository", repo);
            }
            out.push_str("  </repositories>\n");
            out.push_str("  <pluginRepositories>\n");
            for repo in &self.repositories {
                repository_xml(&mut out, 2, "pluginRepository", repo);
            }
            out.push_str("  </pluginRepositories>\n");
        }

        if !self.plugins.is_empty() {
            out.push_str("  <build>\n    <plugins>\n");
            for plugin in &self.plugins {
                plugin_xml(&mut out, 3, plugin);
            }
            out.push_str("    </plugins>\n  </build>\n");
        }

        out.push_str("</project>\n");
        out
    }
}

/// Writes `pom.xml` and an `application.properties` under `dir`
pub fn create_structure(dir: &Path, project: &Project) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join("pom.xml"), project.to_xml())?;

    let resources = dir.join("src").join("main").join("resources");
    fs::create_dir_all(&resources)?;
    let properties = resources.join("application.properties");
    if !properties.exists() {
        fs::write(properties, "")?;
    }
    Ok(())
}

pub(crate) fn escape(value: &str) -> String {
    let mut s = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            '\'' => s.push_str("&apos;"),
            _ => s.push(c),
        }
    }
    s
}

pub(crate) fn element(out: &mut String, depth: usize, name: &str, value: &str) {
    let _ = writeln!(
        out,
        "{}<{}>{}</{}>",
        "  ".repeat(depth),
        name,
        escape(value),
        name
    );
}

fn opt_element(out: &mut String, depth: usize, name: &str, value: &Option<String>) {
    if let Some(v) = value {
        element(out, depth, name, v);
    }
}

fn dependency_xml(out: &mut String, depth: usize, dep: &Dependency) {
    let pad = "  ".repeat(depth);
    let _ = writeln!(out, "{}<dependency>", pad);
    element(out, depth + 1, "groupId", &dep.group_id);
    element(out, depth + 1, "artifactId", &dep.artifact_id);
    opt_element(out, depth + 1, "version", &dep.version);
    opt_element(out, depth + 1, "type", &dep.kind);
    opt_element(out, depth + 1, "classifier", &dep.classifier);
    opt_element(out, depth + 1, "scope", &dep.scope);
    if !dep.exclusions.is_empty() {
        let _ = writeln!(out, "{}  <exclusions>", pad);
        for e in &dep.exclusions {
            let _ = writeln!(out, "{}    <exclusion>", pad);
            element(out, depth + 3, "groupId", &e.group_id);
            element(out, depth + 3, "artifactId", &e.artifact_id);
            let _ = writeln!(out, "{}    </exclusion>", pad);
        }
        let _ = writeln!(out, "{}  </exclusions>", pad);
    }
    let _ = writeln!(out, "{}</dependency>", pad);
}

fn repository_xml(out: &mut String, depth: usize, tag: &str, repo: &Repository) {
    let pad = "  ".repeat(depth);
    let _ = writeln!(out, "{}<{}>", pad, tag);
    element(out, depth + 1, "id", &repo.id);
    element(out, depth + 1, "url", &repo.url);
    for (policy, enabled) in [("releases", repo.releases), ("snapshots", repo.snapshots)] {
        let _ = writeln!(out, "{}  <{}>", pad, policy);
        element(out, depth + 2, "enabled", if enabled { "true" } else { "false" });
        opt_element(out, depth + 2, "checksumPolicy", &repo.checksum_policy);
        let _ = writeln!(out, "{}  </{}>", pad, policy);
    }
    let _ = writeln!(out, "{}</{}>", pad, tag);
}

fn plugin_xml(out: &mut String, depth: usize, plugin: &Plugin) {
    let pad = "  ".repeat(depth);
    let _ = writeln!(out, "{}<plugin>", pad);
    element(out, depth + 1, "groupId", &plugin.group_id);
    element(out, depth + 1, "artifactId", &plugin.artifact_id);
    opt_element(out, depth + 1, "version", &plugin.version);
    if !plugin.executions.is_empty() {
        let _ = writeln!(out, "{}  <executions>", pad);
        for exec in &plugin.executions {
            let _ = writeln!(out, "{}    <execution>", pad);
            opt_element(out, depth + 3, "id", &exec.id);
            opt_element(out, depth + 3, "phase", &exec.phase);
            let _ = writeln!(out, "{}      <goals>", pad);
            for goal in &exec.goals {
                element(out, depth + 4, "goal", goal);
            }
            let _ = writeln!(out, "{}      </goals>", pad);
            let _ = writeln!(out, "{}    </execution>", pad);
        }
        let _ = writeln!(out, "{}  </executions>", pad);
    }
    let _ = writeln!(out, "{}</plugin>", pad);
}
