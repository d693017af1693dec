//! Knowledge-base scanner.
//!
//! Walks `[ingest].documents_path`, keeps files matching the include globs
//! (and not the exclude globs), extracts their text and returns them sorted by
//! relative path. Files that fail extraction or contain no text are skipped
//! with a warning and counted.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::Config;
use crate::extract::{content_type_for, extract_text};
use crate::models::SourceDocument;

/// Documents found by [`scan_documents`], plus the number of files skipped.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<SourceDocument>,
    pub skipped: usize,
}

pub fn scan_documents(config: &Config) -> Result<ScanOutcome> {
    let ingest = &config.ingest;
    let root = &ingest.documents_path;
    if !root.is_dir() {
        bail!("Documents directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&ingest.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string()];
    default_excludes.extend(ingest.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut outcome = ScanOutcome::default();

    let walker = WalkDir::new(root).follow_links(ingest.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let Some(content_type) = content_type_for(path) else {
            tracing::warn!(file = %rel_str, "skipping file with unsupported extension");
            outcome.skipped += 1;
            continue;
        };

        let bytes = std::fs::read(path)?;
        match extract_text(&bytes, content_type) {
            Ok(body) if !body.trim().is_empty() => outcome.documents.push(SourceDocument {
                source: rel_str,
                content_type: content_type.to_string(),
                body,
            }),
            Ok(_) => {
                tracing::warn!(file = %rel_str, "skipping document with no extractable text");
                outcome.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(file = %rel_str, error = %e, "skipping document");
                outcome.skipped += 1;
            }
        }
    }

    outcome.documents.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(outcome)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
