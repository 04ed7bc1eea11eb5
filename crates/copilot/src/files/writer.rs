use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::reply::GenFile;
use crate::{ProjectPaths, SOURCE_ROOT_DIR};

use super::atomic_io::write_text_atomic;
use super::formatter::{format_best_effort, SourceFormatter};

#[derive(Debug, Error)]
pub enum FileWriteError {
    #[error("generated path escapes the project source root: {path}")]
    OutsideProject { path: String },
    #[error("failed to write generated file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRule {
    pub extension: String,
    pub prelude: Vec<String>,
    pub format: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRules {
    rules: Vec<SourceRule>,
}

impl Default for SourceRules {
    fn default() -> Self {
        Self {
            rules: vec![SourceRule {
                extension: "cs".to_string(),
                prelude: vec![
                    "using UnityEngine;".to_string(),
                    "using System.Collections;".to_string(),
                    "using System.Collections.Generic;".to_string(),
                ],
                format: true,
            }],
        }
    }
}

impl SourceRules {
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: SourceRule) -> Self {
        self.rules
            .retain(|existing| !existing.extension.eq_ignore_ascii_case(&rule.extension));
        self.rules.push(rule);
        self
    }

    pub fn rule_for(&self, path: &Path) -> Option<&SourceRule> {
        let extension = path.extension()?.to_str()?;
        self.rules
            .iter()
            .find(|rule| rule.extension.eq_ignore_ascii_case(extension))
    }
}

/// Writes every non-blank file in order. Stops at the first failure; files
/// written before it stay on disk.
pub fn write_files(
    paths: &ProjectPaths,
    files: &[GenFile],
    rules: &SourceRules,
    formatter: &dyn SourceFormatter,
) -> Result<Vec<PathBuf>, FileWriteError> {
    let mut written = Vec::new();
    for file in files {
        let Some((raw_path, content)) = file.non_blank() else {
            warn!(path = ?file.path, "copilot_file_skipped_blank");
            continue;
        };

        let target = resolve_project_path(paths, raw_path)?;
        let text = match rules.rule_for(&target) {
            Some(rule) => {
                let with_prelude = ensure_prelude(content, &rule.prelude);
                if rule.format {
                    format_best_effort(formatter, &with_prelude)
                } else {
                    with_prelude
                }
            }
            None => content.to_string(),
        };

        write_text_atomic(&target, &text).map_err(|source| FileWriteError::Write {
            path: target.clone(),
            source,
        })?;
        info!(path = %target.display(), bytes = text.len(), "copilot_file_written");
        written.push(target);
    }
    Ok(written)
}

/// Maps a reply path onto the project: `Assets/...` is taken relative to the
/// project root, anything else is placed under the source root.
pub fn resolve_project_path(paths: &ProjectPaths, raw: &str) -> Result<PathBuf, FileWriteError> {
    let normalized = raw.trim().replace('\\', "/");
    let candidate = Path::new(&normalized);
    let outside = || FileWriteError::OutsideProject {
        path: raw.to_string(),
    };

    if candidate.is_absolute() {
        let relative = candidate
            .strip_prefix(&paths.source_root)
            .map_err(|_| outside())?;
        return Ok(paths.source_root.join(clean_relative(relative).ok_or_else(outside)?));
    }

    let relative = clean_relative(candidate).ok_or_else(outside)?;
    if relative.starts_with(SOURCE_ROOT_DIR) {
        Ok(paths.root.join(relative))
    } else {
        Ok(paths.source_root.join(relative))
    }
}

fn clean_relative(path: &Path) -> Option<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!cleaned.as_os_str().is_empty()).then_some(cleaned)
}

/// Prepends any prelude line the source does not already contain, keeping the
/// prelude's own order.
pub fn ensure_prelude(source: &str, prelude: &[String]) -> String {
    let missing = prelude
        .iter()
        .filter(|line| !source.contains(line.as_str()))
        .collect::<Vec<_>>();
    if missing.is_empty() {
        return source.to_string();
    }

    let mut output = String::new();
    for line in missing {
        output.push_str(line);
        output.push('\n');
    }
    output.push_str(source);
    output
}
