//! Maven `settings.xml` generation and server injection

use super::project::{element, escape};
use super::MavenError;
use crate::api::{MavenRepository, MavenServer};
use regex::Regex;
use std::fmt::Write;
use tracing::info;

const SERVERS_TAG: &str = "\n  <servers></servers>\n";
const END_SERVERS_TAG: &str = "</servers>";

/// Tags after which a missing `<servers>` element may be placed, in order
const ANCHOR_TAGS: &[&str] = &[
    "</proxies>",
    "<proxies/>",
    "</offline>",
    "<offline/>",
    "</usePluginRegistry>",
    "<usePluginRegistry/>",
    "</interactiveMode>",
    "<interactiveMode/>",
    "</localRepository>",
    "<localRepository/>",
];

pub fn default_repositories() -> Vec<MavenRepository> {
    vec![
        MavenRepository {
            id: "central".to_string(),
            url: "https://repo.maven.apache.org/maven2".to_string(),
            releases: true,
            snapshots: false,
        },
        MavenRepository {
            id: "apache-snapshots".to_string(),
            url: "https://repository.apache.org/content/repositories/snapshots-group".to_string(),
            releases: false,
            snapshots: true,
        },
    ]
}

/// Global settings with a single active profile holding `repositories`
pub fn global_settings(repositories: &[MavenRepository]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<settings xmlns=\"http://maven.apache.org/SETTINGS/1.0.0\" ");
    out.push_str("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ");
    out.push_str("xsi:schemaLocation=\"http://maven.apache.org/SETTINGS/1.0.0 https://maven.apache.org/xsd/settings-1.0.0.xsd\">\n");
    out.push_str("  <profiles>\n    <profile>\n");
    element(&mut out, 3, "id", "maven-settings");
    out.push_str("      <activation>\n");
    element(&mut out, 4, "activeByDefault", "true");
    out.push_str("      </activation>\n");
    for tag in ["repositories", "pluginRepositories"] {
        let item = if tag == "repositories" {
            "repository"
        } else {
            "pluginRepository"
        };
        let _ = writeln!(out, "      <{}>", tag);
        for repo in repositories {
            let _ = writeln!(out, "        <{}>", item);
            element(&mut out, 5, "id", &repo.id);
            element(&mut out, 5, "url", &repo.url);
            for (policy, enabled) in [("releases", repo.releases), ("snapshots", repo.snapshots)] {
                let _ = writeln!(out, "          <{}>", policy);
                element(&mut out, 6, "enabled", if enabled { "true" } else { "false" });
                element(&mut out, 6, "checksumPolicy", "fail");
                let _ = writeln!(out, "          </{}>", policy);
            }
            let _ = writeln!(out, "        </{}>", item);
        }
        let _ = writeln!(out, "      </{}>", tag);
    }
    out.push_str("    </profile>\n  </profiles>\n</settings>\n");
    out
}

fn servers_xml(servers: &[MavenServer]) -> String {
    let mut out = String::from("\n");
    for server in servers {
        out.push_str("    <server>\n");
        let _ = writeln!(out, "      <id>{}</id>", escape(&server.id));
        let _ = writeln!(out, "      <username>{}</username>", escape(&server.username));
        let _ = writeln!(out, "      <password>{}</password>", escape(&server.password));
        out.push_str("    </server>\n");
    }
    out.push_str("  ");
    out
}

/// Returns the settings with an ensured `<servers>` element and the index
/// of its closing tag, or `None` when no insertion point exists
fn server_tag_index(settings: &str) -> Option<(String, usize)> {
    let settings = settings.replacen("<servers/>", SERVERS_TAG, 1);
    if let Some(i) = settings.find(END_SERVERS_TAG).filter(|i| *i > 0) {
        return Some((settings, i));
    }

    let anchor = ANCHOR_TAGS.iter().find_map(|tag| {
        settings
            .find(tag)
            .filter(|i| *i > 0)
            .map(|i| i + tag.len())
    });

    let insert_at = match anchor {
        Some(i) => i,
        None => {
            let re = Regex::new(r"<settings[^>]*>").ok()?;
            re.find(&settings)?.end()
        }
    };

    let mut updated = String::with_capacity(settings.len() + SERVERS_TAG.len());
    updated.push_str(&settings[..insert_at]);
    updated.push_str(SERVERS_TAG);
    updated.push_str(&settings[insert_at..]);
    let i = updated.find(END_SERVERS_TAG)?;
    Some((updated, i))
}

/// Inserts `<server>` entries before `</servers>`, creating the element when
/// absent. Settings without a `<settings>` element are returned unchanged.
pub fn inject_servers(settings: &str, servers: &[MavenServer]) -> String {
    if servers.is_empty() {
        return settings.to_string();
    }
    match server_tag_index(settings) {
        Some((updated, i)) => {
            let mut out = String::with_capacity(updated.len() + 128);
            out.push_str(&updated[..i]);
            out.push_str(&servers_xml(servers));
            out.push_str(&updated[i..]);
            out
        }
        None => {
            info!("Could not find a place to store server information in Maven settings, skipping");
            settings.to_string()
        }
    }
}

/// User settings must be well-formed XML with a `settings` root
pub fn validate_settings(settings: &str) -> Result<(), MavenError> {
    let doc = roxmltree::Document::parse(settings)
        .map_err(|e| MavenError::InvalidSettings(e.to_string()))?;
    if doc.root_element().tag_name().name() != "settings" {
        return Err(MavenError::InvalidSettings(format!(
            "unexpected root element <{}>",
            doc.root_element().tag_name().name()
        )));
    }
    Ok(())
}
