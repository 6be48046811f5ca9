//! Incremental base image selection
//!
//! A previously published image can serve as the base of a new build when
//! it already contains most of the required dependencies. Only artifacts
//! carrying a checksum are ever considered shared: a checksum-less artifact
//! (a snapshot, a generated jar) may have changed under the same ID.

use crate::api::{Artifact, PublishedImage};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Best candidate found by [`find_best_image`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestImage<'a> {
    pub image: &'a PublishedImage,
    /// IDs of the required artifacts the image already contains
    pub common: HashSet<String>,
    pub surplus: usize,
}

/// Outcome of a selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub base_image: String,
    /// Image reused as base, `None` on fallback
    pub reused: Option<String>,
    /// Artifacts still to be layered on top of the base image
    pub selected_artifacts: Vec<Artifact>,
}

/// Single pass over `images`. Candidates that are not a pure subset of the
/// required set are rejected when their surplus reaches a third of what
/// they share. Survivors compete on shared count, then on smaller surplus;
/// the first seen wins remaining ties.
pub fn find_best_image<'a>(
    images: &'a [PublishedImage],
    required: &[Artifact],
) -> Option<BestImage<'a>> {
    let required_libs: HashMap<&str, Option<&str>> = required
        .iter()
        .map(|a| (a.id.as_str(), a.checksum()))
        .collect();

    let mut best: Option<BestImage<'a>> = None;
    let mut best_common = 0;
    let mut best_surplus = 0;

    for image in images {
        let common: HashSet<String> = image
            .artifacts
            .iter()
            .filter_map(|artifact| {
                let checksum = artifact.checksum()?;
                match required_libs.get(artifact.id.as_str()) {
                    Some(Some(required)) if *required == checksum => Some(artifact.id.clone()),
                    _ => None,
                }
            })
            .collect();

        let total = image.artifacts.len();
        let shared = common.len();
        let surplus = total.saturating_sub(shared);

        if shared != total && surplus >= shared / 3 {
            debug!(image = %image.image, shared, surplus, "Rejected candidate base image");
            continue;
        }

        if shared > best_common || (shared == best_common && surplus < best_surplus) {
            best_common = shared;
            best_surplus = surplus;
            best = Some(BestImage {
                image,
                common,
                surplus,
            });
        }
    }

    best
}

/// Picks the base image for `required`, falling back to `default_base` and
/// the full artifact set when no candidate qualifies
pub fn select_base(images: &[PublishedImage], required: &[Artifact], default_base: &str) -> Selection {
    match find_best_image(images, required) {
        Some(best) => {
            let selected_artifacts: Vec<Artifact> = required
                .iter()
                .filter(|a| !best.common.contains(&a.id))
                .cloned()
                .collect();
            debug!(
                image = %best.image.image,
                shared = best.common.len(),
                surplus = best.surplus,
                selected = selected_artifacts.len(),
                "Reusing published image as base"
            );
            Selection {
                base_image: best.image.image.clone(),
                reused: Some(best.image.image.clone()),
                selected_artifacts,
            }
        }
        None => Selection {
            base_image: default_base.to_string(),
            reused: None,
            selected_artifacts: required.to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(id: &str, checksum: &str) -> Artifact {
        Artifact::new(id, format!("/tmp/{}.jar", id), format!("dependencies/{}.jar", id))
            .with_checksum(checksum)
    }

    fn image(name: &str, artifacts: Vec<Artifact>) -> PublishedImage {
        PublishedImage {
            image: name.to_string(),
            artifacts,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_catalog_falls_back() {
        let required = vec![artifact("a", "sha256:a")];
        let selection = select_base(&[], &required, "root/base");
        assert_eq!(selection.base_image, "root/base");
        assert_eq!(selection.reused, None);
        assert_eq!(selection.selected_artifacts, required);
    }

    #[test]
    fn test_image_without_artifacts_never_wins() {
        let required = vec![artifact("a", "sha256:a")];
        let images = vec![image("empty", vec![])];
        assert!(find_best_image(&images, &required).is_none());
    }

    #[test]
    fn test_smaller_surplus_wins_tie() {
        let required: Vec<Artifact> = (0..12)
            .map(|i| artifact(&format!("lib{}", i), &format!("sha256:{}", i)))
            .collect();
        let mut extra_one = required[..9].to_vec();
        extra_one.push(artifact("x", "sha256:x"));
        let mut extra_two = extra_one.clone();
        extra_two.push(artifact("y", "sha256:y"));

        let images = vec![image("two", extra_two), image("one", extra_one)];
        let best = find_best_image(&images, &required).unwrap();
        assert_eq!(best.image.image, "one");
        assert_eq!(best.surplus, 1);
    }

    #[test]
    fn test_mismatched_checksum_is_not_common() {
        let required = vec![artifact("a", "sha256:a"), artifact("b", "sha256:b")];
        let images = vec![image("stale", vec![artifact("a", "sha256:old")])];
        assert!(find_best_image(&images, &required).is_none());
    }
}
