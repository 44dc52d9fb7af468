use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::RoleRecord;

/// Check that `source` can be copied over `target`.
pub fn validate_copy(source: &RoleRecord, target: &RoleRecord) -> Result<()> {
    source.check_names()?;
    target.check_names()?;
    if !source.path.exists() {
        return Err(Error::SourceMissing(source.path.clone()));
    }
    if source.path == target.path {
        return Err(Error::SameRole(source.path.clone()));
    }
    match target.path.parent() {
        Some(parent) if parent.is_dir() => Ok(()),
        Some(parent) => Err(Error::TargetParentMissing(parent.to_path_buf())),
        None => Err(Error::TargetParentMissing(target.path.clone())),
    }
}

/// Replace the target role folder with a copy of the source folder.
pub fn copy_role(source: &RoleRecord, target: &RoleRecord) -> Result<()> {
    validate_copy(source, target)?;
    replace_tree(&source.path, &target.path)?;
    info!(from = %source, to = %target, "copied role");
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct CopyFailure {
    pub role: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyReport {
    pub success_count: usize,
    pub failed: Vec<CopyFailure>,
}

/// Copy `source` to each target in turn; one failure does not stop the rest.
///
/// `progress(done, total, message)` fires before each target and once more
/// when all are processed.
pub fn copy_to_many(
    source: &RoleRecord,
    targets: &[RoleRecord],
    mut progress: impl FnMut(usize, usize, &str),
) -> CopyReport {
    let total = targets.len();
    let mut report = CopyReport::default();
    for (i, target) in targets.iter().enumerate() {
        progress(i, total, &format!("copying to {}", target));
        match copy_role(source, target) {
            Ok(()) => report.success_count += 1,
            Err(e) => {
                warn!(to = %target, error = %e, "copy failed");
                report.failed.push(CopyFailure { role: target.to_string(), error: e.to_string() });
            }
        }
    }
    progress(total, total, "copy finished");
    report
}

/// Delete `dst` if present, then copy the `src` tree to it.
pub(crate) fn replace_tree(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        fs::remove_dir_all(dst)?;
    }
    copy_tree(src, dst)
}

/// Recursively copy `src` to `dst`, which must not exist yet.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", dst.display()),
        )
        .into());
    }
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let path = entry.path();
        let rel = path.strip_prefix(src).unwrap_or(path);
        let out = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            fs::copy(path, &out)?;
        }
    }
    Ok(())
}

/// Total size in bytes of the regular files under `dir`; unreadable entries count as zero.
pub(crate) fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn role(root: &Path, name: &str, files: &[(&str, &str)]) -> RoleRecord {
        let r = RoleRecord::new(root, "acct", "cn", "srv", name);
        fs::create_dir_all(&r.path).unwrap();
        for (rel, body) in files {
            let p = r.path.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, body).unwrap();
        }
        r
    }

    #[test]
    fn copy_replaces_target_contents() {
        let d = tempdir().unwrap();
        let src = role(d.path(), "src", &[("a.ini", "1"), ("ui/layout.dat", "L")]);
        let dst = role(d.path(), "dst", &[("stale.ini", "old")]);
        copy_role(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.path.join("a.ini")).unwrap(), "1");
        assert_eq!(fs::read_to_string(dst.path.join("ui/layout.dat")).unwrap(), "L");
        assert!(!dst.path.join("stale.ini").exists());
        assert!(src.path.join("a.ini").exists());
    }

    #[test]
    fn copy_creates_missing_target_folder() {
        let d = tempdir().unwrap();
        let src = role(d.path(), "src", &[("a.ini", "1")]);
        let dst = RoleRecord::new(d.path(), "acct", "cn", "srv", "fresh");
        copy_role(&src, &dst).unwrap();
        assert!(dst.path.join("a.ini").is_file());
    }

    #[test]
    fn validation_errors() {
        let d = tempdir().unwrap();
        let src = role(d.path(), "src", &[]);
        let missing = RoleRecord::new(d.path(), "acct", "cn", "srv", "ghost");
        assert!(matches!(validate_copy(&missing, &src), Err(Error::SourceMissing(_))));
        assert!(matches!(validate_copy(&src, &src), Err(Error::SameRole(_))));
        let orphan = RoleRecord::new(d.path(), "other", "cn", "srv", "r");
        assert!(matches!(validate_copy(&src, &orphan), Err(Error::TargetParentMissing(_))));
    }

    #[test]
    fn refuses_target_outside_the_role_tree() {
        let d = tempdir().unwrap();
        let root = d.path().join("userdata");
        let src = role(&root, "src", &[("a.ini", "1")]);
        let outside = d.path().join("Documents");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("keep.txt"), b"x").unwrap();

        let escape = RoleRecord::new(&root, "..", "..", "..", "Documents");
        assert!(matches!(copy_role(&src, &escape), Err(Error::InvalidRoleName(_))));
        let dotted = RoleRecord::new(&root, "acct", "cn", ".", "dst");
        assert!(matches!(validate_copy(&src, &dotted), Err(Error::InvalidRoleName(_))));
        assert!(outside.join("keep.txt").is_file());
    }

    #[test]
    fn copy_to_many_reports_each_target() {
        let d = tempdir().unwrap();
        let src = role(d.path(), "src", &[("a.ini", "1")]);
        let ok = role(d.path(), "t1", &[]);
        let bad = RoleRecord::new(d.path(), "nobody", "cn", "srv", "t2");
        let mut calls = Vec::new();
        let report = copy_to_many(&src, &[ok.clone(), bad], |done, total, _| calls.push((done, total)));
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].role, "nobody-cn-srv-t2");
        assert_eq!(calls, vec![(0, 2), (1, 2), (2, 2)]);
        assert!(ok.path.join("a.ini").exists());
    }

    #[test]
    fn dir_size_sums_files() {
        let d = tempdir().unwrap();
        let r = role(d.path(), "r", &[("a", "123"), ("sub/b", "45")]);
        assert_eq!(dir_size(&r.path), 5);
        assert_eq!(dir_size(&d.path().join("missing")), 0);
    }
}
