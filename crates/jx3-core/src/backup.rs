//! Timestamped role backups with per-role rotation.
//!
//! A backup is a plain folder copy named `<label>_<YYYYmmdd>_<HHMMSS>`, where
//! the label is `account_region_server_role`. Same-second backups get a `-N`
//! suffix on the time part.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::copier::{copy_tree, dir_size, replace_tree};
use crate::error::{Error, Result};
use crate::model::{BackupInfo, RoleRecord, is_plain_component};

pub const DEFAULT_MAX_BACKUPS: usize = 5;
pub const DEFAULT_BACKUP_DIR_NAME: &str = "userdata_backup";

#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    max_backups: usize,
}

impl BackupManager {
    /// Backups go to `backup_dir`, or next to `userdata` when not given.
    /// The folder is created if needed.
    pub fn new(userdata: &Path, max_backups: usize, backup_dir: Option<PathBuf>) -> Result<Self> {
        let backup_dir = backup_dir.unwrap_or_else(|| {
            userdata
                .parent()
                .unwrap_or(Path::new("."))
                .join(DEFAULT_BACKUP_DIR_NAME)
        });
        fs::create_dir_all(&backup_dir)?;
        Ok(Self { backup_dir, max_backups })
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Copy the role folder into a new backup and prune old ones for that role.
    pub fn backup_role(&self, role: &RoleRecord) -> Result<PathBuf> {
        role.check_names()?;
        if !role.path.exists() {
            return Err(Error::SourceMissing(role.path.clone()));
        }
        let label = role.backup_label();
        let base = format!("{}_{}", label, Local::now().format("%Y%m%d_%H%M%S"));
        let mut dest = self.backup_dir.join(&base);
        let mut n = 1;
        while dest.exists() {
            dest = self.backup_dir.join(format!("{}-{}", base, n));
            n += 1;
        }
        copy_tree(&role.path, &dest)?;
        info!(role = %role, backup = %dest.display(), "backed up role");
        self.prune(&label);
        Ok(dest)
    }

    // Keep the newest `max_backups` for `label`; failures are logged only.
    fn prune(&self, label: &str) {
        let mut mine: Vec<(std::time::SystemTime, String, PathBuf)> = match fs::read_dir(&self.backup_dir) {
            Ok(rd) => rd
                .flatten()
                .filter(|e| e.path().is_dir())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    let (l, _) = split_backup_name(&name)?;
                    if l != label {
                        return None;
                    }
                    let mtime = e.metadata().and_then(|m| m.modified()).ok()?;
                    Some((mtime, name, e.path()))
                })
                .collect(),
            Err(e) => {
                warn!(dir = %self.backup_dir.display(), error = %e, "cannot list backups for pruning");
                return;
            }
        };
        newest_first(&mut mine);
        for (_, name, path) in mine.into_iter().skip(self.max_backups) {
            match fs::remove_dir_all(&path) {
                Ok(()) => info!(backup = %name, "removed old backup"),
                Err(e) => warn!(backup = %name, error = %e, "failed to remove old backup"),
            }
        }
    }

    /// All backups, newest first, optionally truncated to `limit`.
    pub fn list_backups(&self, limit: Option<usize>) -> Vec<BackupInfo> {
        let rd = match fs::read_dir(&self.backup_dir) {
            Ok(rd) => rd,
            Err(e) => {
                warn!(dir = %self.backup_dir.display(), error = %e, "cannot list backups");
                return Vec::new();
            }
        };
        let mut dirs: Vec<(DateTime<Local>, String, PathBuf)> = rd
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let mtime = e.metadata().and_then(|m| m.modified()).ok()?;
                Some((mtime.into(), e.file_name().to_string_lossy().into_owned(), e.path()))
            })
            .collect();
        newest_first(&mut dirs);
        dirs.into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(mtime, name, path)| BackupInfo {
                role_info: split_backup_name(&name)
                    .map(|(label, _)| label.to_string())
                    .unwrap_or_else(|| name.clone()),
                size: dir_size(&path),
                created_at: mtime.format("%Y-%m-%d %H:%M:%S").to_string(),
                name,
                path,
            })
            .collect()
    }

    /// Replace the target role folder with the contents of backup `name`.
    pub fn restore_backup(&self, name: &str, target: &RoleRecord) -> Result<()> {
        target.check_names()?;
        let src = self.existing(name)?;
        replace_tree(&src, &target.path)?;
        info!(backup = name, role = %target, "restored backup");
        Ok(())
    }

    pub fn delete_backup(&self, name: &str) -> Result<()> {
        let path = self.existing(name)?;
        fs::remove_dir_all(&path)?;
        info!(backup = name, "deleted backup");
        Ok(())
    }

    /// Pack backup `name` into `<dest_dir>/<name>.zip`.
    pub fn export_zip(&self, name: &str, dest_dir: &Path) -> Result<PathBuf> {
        let base = self.existing(name)?;
        fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(format!("{}.zip", name));

        let file = fs::File::create(&dest)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            let rel = path.strip_prefix(&base).unwrap_or(path);
            if rel.as_os_str().is_empty() {
                continue;
            }
            let entry_name = rel.to_string_lossy().replace('\\', "/");
            if entry.file_type().is_dir() {
                zip.add_directory(entry_name, options)?;
            } else {
                zip.start_file(entry_name, options)?;
                let data = fs::read(path)?;
                zip.write_all(&data)?;
            }
        }
        zip.finish()?;
        info!(backup = name, zip = %dest.display(), "exported backup");
        Ok(dest)
    }

    fn existing(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        let path = self.backup_dir.join(name);
        if !path.is_dir() {
            return Err(Error::BackupNotFound(name.to_string()));
        }
        Ok(path)
    }
}

// Backup names come from clients; only a single plain path component is allowed.
fn check_name(name: &str) -> Result<()> {
    if is_plain_component(name) {
        Ok(())
    } else {
        Err(Error::InvalidBackupName(name.to_string()))
    }
}

// Sort by mtime, then by name with the `-N` suffix compared as a number.
fn newest_first<T: Ord>(entries: &mut [(T, String, PathBuf)]) {
    entries.sort_by(|a, b| (&b.0, name_key(&b.1)).cmp(&(&a.0, name_key(&a.1))));
}

fn name_key(name: &str) -> (&str, u64) {
    match name.rsplit_once('-') {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
            (base, n.parse().unwrap_or(u64::MAX))
        }
        _ => (name, 0),
    }
}

/// Split `<label>_<YYYYmmdd>_<HHMMSS>[-N]` into label and timestamp.
pub fn split_backup_name(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.rsplitn(3, '_');
    let time = parts.next()?;
    let date = parts.next()?;
    let label = parts.next()?;
    let clock = time.split_once('-').map_or(time, |(t, _)| t);
    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
    if label.is_empty() || !digits(date, 8) || !digits(clock, 6) {
        return None;
    }
    Some((label, &name[label.len() + 1..]))
}
