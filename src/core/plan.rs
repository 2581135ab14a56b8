/*!
 * Expansion of `cp` arguments into individual transfer jobs
 */

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::transfer::TransferJob;
use crate::error::{CascadeError, Result};

/// One planned transfer, or the reason it cannot run
#[derive(Debug)]
pub enum PlanItem {
    Job(TransferJob),
    Invalid { job: TransferJob, error: CascadeError },
}

impl PlanItem {
    pub fn job(&self) -> &TransferJob {
        match self {
            PlanItem::Job(job) | PlanItem::Invalid { job, .. } => job,
        }
    }
}

/// Expand `sources` into jobs landing under or at `target`.
///
/// A single file copied to a path that is not a directory lands at that
/// path. Otherwise each source lands under `target/<name>`, and directories
/// (which need `recursive`) keep their relative layout. Problems with one
/// source become [`PlanItem::Invalid`]; only an unusable target is fatal.
pub fn plan_copy(sources: &[PathBuf], target: &Path, recursive: bool) -> Result<Vec<PlanItem>> {
    if sources.is_empty() {
        return Err(CascadeError::Config("no source given".to_string()));
    }

    let target_exists_as_dir = target.is_dir();
    let multi = sources.len() > 1;

    if (multi || has_trailing_separator(target)) && target.exists() && !target_exists_as_dir {
        return Err(CascadeError::InvalidTarget {
            path: target.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let into_dir = target_exists_as_dir || multi || has_trailing_separator(target);
    let mut items = Vec::new();

    for source in sources {
        let name = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let dest = if into_dir {
            target.join(&name)
        } else {
            target.to_path_buf()
        };

        if !source.exists() {
            items.push(PlanItem::Invalid {
                job: TransferJob::new(source, dest),
                error: CascadeError::SourceNotFound(source.clone()),
            });
            continue;
        }

        if !source.is_dir() {
            if same_location(source, &dest) {
                items.push(PlanItem::Invalid {
                    error: CascadeError::InvalidTarget {
                        path: dest.clone(),
                        reason: "source and target are the same file".to_string(),
                    },
                    job: TransferJob::new(source, dest),
                });
            } else {
                items.push(PlanItem::Job(TransferJob::new(source, dest)));
            }
            continue;
        }

        if !recursive {
            items.push(PlanItem::Invalid {
                job: TransferJob::new(source, dest),
                error: CascadeError::TransferFailed(format!(
                    "{} is a directory, use --recursive",
                    source.display()
                )),
            });
            continue;
        }

        if is_within(&dest, source) {
            items.push(PlanItem::Invalid {
                error: CascadeError::InvalidTarget {
                    path: dest.clone(),
                    reason: format!("cannot copy {} into itself", source.display()),
                },
                job: TransferJob::new(source, dest),
            });
            continue;
        }

        plan_directory(source, &dest, &mut items);
    }

    debug!(items = items.len(), "Planned copy");
    Ok(items)
}

fn plan_directory(root: &Path, dest_root: &Path, items: &mut Vec<PlanItem>) {
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or_else(|_| entry.path());
                items.push(PlanItem::Job(TransferJob::new(
                    entry.path(),
                    dest_root.join(relative),
                )));
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                items.push(PlanItem::Invalid {
                    job: TransferJob::new(&path, dest_root.join(relative)),
                    error: CascadeError::TransferFailed(format!(
                        "unable to read {}: {}",
                        path.display(),
                        e
                    )),
                });
            }
        }
    }
}

/// Absolute, symlink-free form of `path`, which need not exist yet.
///
/// The deepest existing ancestor is canonicalized and the missing tail
/// appended as given.
fn resolve(path: &Path) -> Option<PathBuf> {
    let mut tail = Vec::new();
    let mut current = path;
    loop {
        if let Ok(real) = current.canonicalize() {
            return Some(tail.iter().rev().fold(real, |acc, part| acc.join(part)));
        }
        tail.push(current.file_name()?.to_os_string());
        current = match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
    }
}

/// Whether `source` and `dest` name the same file
pub(crate) fn same_location(source: &Path, dest: &Path) -> bool {
    match (resolve(source), resolve(dest)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether `path` is `dir` or lies underneath it
fn is_within(path: &Path, dir: &Path) -> bool {
    match (resolve(path), resolve(dir)) {
        (Some(path), Some(dir)) => path.starts_with(dir),
        _ => false,
    }
}

fn has_trailing_separator(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .ends_with(std::path::MAIN_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn jobs(items: &[PlanItem]) -> Vec<&TransferJob> {
        items
            .iter()
            .filter_map(|item| match item {
                PlanItem::Job(job) => Some(job),
                PlanItem::Invalid { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_single_file_to_new_path() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"a").unwrap();
        let target = dir.path().join("b.txt");

        let items = plan_copy(&[source.clone()], &target, false).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(jobs(&items)[0], &TransferJob::new(&source, &target));
    }

    #[test]
    fn test_file_into_existing_dir() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"a").unwrap();
        let target = dir.path().join("out");
        fs::create_dir(&target).unwrap();

        let items = plan_copy(&[source.clone()], &target, false).unwrap();
        assert_eq!(jobs(&items)[0].target, target.join("a.txt"));
    }

    #[test]
    fn test_multiple_sources_need_directory_target() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let err = plan_copy(&[a.clone(), b.clone()], &b, false).unwrap_err();
        assert!(matches!(err, CascadeError::InvalidTarget { .. }));

        let out = dir.path().join("out");
        let items = plan_copy(&[a, b], &out, false).unwrap();
        assert_eq!(jobs(&items).len(), 2);
        assert!(jobs(&items).iter().all(|job| job.target.starts_with(&out)));
    }

    #[test]
    fn test_missing_source_is_invalid_item() {
        let dir = tempdir().unwrap();
        let items = plan_copy(&[dir.path().join("ghost")], &dir.path().join("out"), false).unwrap();
        assert!(matches!(
            items[0],
            PlanItem::Invalid {
                error: CascadeError::SourceNotFound(_),
                ..
            }
        ));
    }

    #[test]
    fn test_directory_without_recursive_is_invalid() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();

        let items = plan_copy(&[src], &dir.path().join("out"), false).unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], PlanItem::Invalid { .. }));
    }

    #[test]
    fn test_recursive_keeps_layout() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir_all(src.join("nested/deeper")).unwrap();
        fs::write(src.join("top.txt"), b"1").unwrap();
        fs::write(src.join("nested/mid.txt"), b"2").unwrap();
        fs::write(src.join("nested/deeper/low.txt"), b"3").unwrap();

        let out = dir.path().join("copy");
        let items = plan_copy(&[src.clone()], &out, true).unwrap();
        let mut targets: Vec<PathBuf> = jobs(&items).iter().map(|j| j.target.clone()).collect();
        targets.sort();

        assert_eq!(
            targets,
            vec![
                out.join("nested/deeper/low.txt"),
                out.join("nested/mid.txt"),
                out.join("top.txt"),
            ]
        );
    }

    #[test]
    fn test_recursive_into_existing_dir_nests_by_name() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("f"), b"x").unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let items = plan_copy(&[src], &out, true).unwrap();
        assert_eq!(jobs(&items)[0].target, out.join("tree/f"));
    }

    #[test]
    fn test_empty_sources_rejected() {
        let err = plan_copy(&[], Path::new("/tmp"), false).unwrap_err();
        assert!(matches!(err, CascadeError::Config(_)));
    }

    #[test]
    fn test_copy_onto_itself_is_invalid() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"precious data").unwrap();

        let items = plan_copy(&[source.clone()], &source, false).unwrap();
        assert!(matches!(
            items[0],
            PlanItem::Invalid {
                error: CascadeError::InvalidTarget { .. },
                ..
            }
        ));

        // Same file reached through a different spelling
        let dotted = dir.path().join(".").join("a.txt");
        let items = plan_copy(&[source.clone()], &dotted, false).unwrap();
        assert!(matches!(items[0], PlanItem::Invalid { .. }));

        // Into its own directory
        let items = plan_copy(&[source], dir.path(), false).unwrap();
        assert!(matches!(items[0], PlanItem::Invalid { .. }));
    }

    #[test]
    fn test_recursive_copy_into_own_subtree_is_invalid() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("f"), b"x").unwrap();

        let items = plan_copy(&[src.clone()], &src.join("sub/backup"), true).unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            PlanItem::Invalid {
                error: CascadeError::InvalidTarget { .. },
                ..
            }
        ));

        // Existing directory target nests the source under itself
        let items = plan_copy(&[src.clone()], &src, true).unwrap();
        assert!(matches!(items[0], PlanItem::Invalid { .. }));

        // A sibling with a shared name prefix is fine
        let items = plan_copy(&[src.clone()], &dir.path().join("tree2"), true).unwrap();
        assert_eq!(jobs(&items).len(), 1);
    }
}
