//! Two-level folder grouping used for jump navigation in ordered playback.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::PlayMode;
use crate::scan::DirectoryIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTarget {
    pub label: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    /// Top-level folder without subfolders: jump straight to it.
    Target(JumpTarget),
    /// Top-level folder whose subfolders are the jump targets.
    Group {
        name: String,
        targets: Vec<JumpTarget>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    root: PathBuf,
    /// top-level name -> paths below it, relative to that folder; anything
    /// deeper than the second level stays a single multi-component entry.
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl DirectoryTree {
    /// Build the view when it applies: ordered playback of a recursive scan
    /// that found images in more than one directory.
    #[must_use]
    pub fn for_view(
        mode: PlayMode,
        recursive: bool,
        index: Option<&DirectoryIndex>,
        root: &Path,
    ) -> Option<Self> {
        let index = index?;
        (mode == PlayMode::Ordered && recursive && index.len() > 1)
            .then(|| Self::build(index, root))
    }

    #[must_use]
    pub fn build(index: &DirectoryIndex, root: &Path) -> Self {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for dir in index.dirs() {
            let Ok(rel) = dir.strip_prefix(root) else {
                continue;
            };
            let mut parts = rel.components();
            let Some(first) = parts.next() else {
                continue;
            };
            let subs = groups
                .entry(first.as_os_str().to_string_lossy().into_owned())
                .or_default();
            let rest = parts.as_path();
            if !rest.as_os_str().is_empty() {
                subs.insert(rest.to_string_lossy().into_owned());
            }
        }
        Self {
            root: root.to_path_buf(),
            groups,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Entries in display order (sorted by name at both levels).
    #[must_use]
    pub fn entries(&self) -> Vec<TreeEntry> {
        self.groups
            .iter()
            .map(|(name, subs)| {
                let top = self.root.join(name);
                if subs.is_empty() {
                    TreeEntry::Target(JumpTarget {
                        label: name.clone(),
                        dir: top,
                    })
                } else {
                    let targets = subs
                        .iter()
                        .map(|sub| {
                            let dir = top.join(sub);
                            let label = dir
                                .file_name()
                                .map_or_else(|| sub.clone(), |n| n.to_string_lossy().into_owned());
                            JumpTarget { label, dir }
                        })
                        .collect();
                    TreeEntry::Group {
                        name: name.clone(),
                        targets,
                    }
                }
            })
            .collect()
    }
}

/// Index of the first image inside `dir` (at any depth).
#[must_use]
pub fn jump_index(paths: &[PathBuf], dir: &Path) -> Option<usize> {
    paths.iter().position(|p| p.starts_with(dir))
}
