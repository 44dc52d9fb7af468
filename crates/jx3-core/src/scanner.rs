//! Enumerating roles under a save-data root.
//!
//! Layout: `root/<account>/<region>/<server>/<role>`. Every scan reads the
//! filesystem again; nothing is cached between calls.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::model::RoleRecord;

#[derive(Debug, Clone)]
pub struct RoleScanner {
    root: PathBuf,
}

impl RoleScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the four-level tree and return one record per role folder.
    ///
    /// Accounts without any subdirectory are skipped: they hold
    /// server-maintained data rather than local role caches. This is a
    /// heuristic, so a freshly created local account with no regions yet is
    /// dropped as well. A directory that cannot be read is logged and its
    /// subtree left out; the rest of the scan still completes.
    pub fn scan_all(&self) -> Vec<RoleRecord> {
        let mut out = Vec::new();
        if !self.root.exists() {
            debug!(root = %self.root.display(), "save-data root missing, no roles");
            return out;
        }
        for (account, account_dir) in self.level(&self.root) {
            let regions = self.level(&account_dir);
            if regions.is_empty() {
                debug!(account = %account, "skipping account without local data");
                continue;
            }
            for (region, region_dir) in regions {
                for (server, server_dir) in self.level(&region_dir) {
                    for (role, role_dir) in self.level(&server_dir) {
                        out.push(RoleRecord {
                            account: account.clone(),
                            region: region.clone(),
                            server: server.clone(),
                            role,
                            path: role_dir,
                        });
                    }
                }
            }
        }
        debug!(root = %self.root.display(), count = out.len(), "scanned roles");
        out
    }

    /// Look up a single role by identity with a fresh scan.
    pub fn find(&self, account: &str, region: &str, server: &str, role: &str) -> Option<RoleRecord> {
        self.scan_all().into_iter().find(|r| {
            r.account == account && r.region == region && r.server == server && r.role == role
        })
    }

    fn level(&self, dir: &Path) -> Vec<(String, PathBuf)> {
        match subdirs(dir) {
            Ok(v) => v,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read directory, skipping");
                Vec::new()
            }
        }
    }
}

// Child directories sorted by name; files and unreadable entries are dropped.
fn subdirs(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for e in fs::read_dir(dir)? {
        let e = match e {
            Ok(e) => e,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "cannot read directory entry, skipping");
                continue;
            }
        };
        let p = e.path();
        if p.is_dir() {
            out.push((e.file_name().to_string_lossy().into_owned(), p));
        }
    }
    out.sort();
    Ok(out)
}

pub fn distinct_accounts(records: &[RoleRecord]) -> Vec<String> {
    distinct(records, |r| &r.account)
}

pub fn distinct_regions(records: &[RoleRecord]) -> Vec<String> {
    distinct(records, |r| &r.region)
}

pub fn distinct_servers(records: &[RoleRecord]) -> Vec<String> {
    distinct(records, |r| &r.server)
}

fn distinct(records: &[RoleRecord], field: impl Fn(&RoleRecord) -> &String) -> Vec<String> {
    records
        .iter()
        .map(field)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Exact, case-sensitive field filters; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFilter {
    pub account: Option<String>,
    pub region: Option<String>,
    pub server: Option<String>,
}

impl RoleFilter {
    pub fn matches(&self, r: &RoleRecord) -> bool {
        fn ok(want: &Option<String>, have: &str) -> bool {
            want.as_deref().is_none_or(|w| w == have)
        }
        ok(&self.account, &r.account) && ok(&self.region, &r.region) && ok(&self.server, &r.server)
    }
}

pub fn filter_roles(records: &[RoleRecord], filter: &RoleFilter) -> Vec<RoleRecord> {
    records.iter().filter(|r| filter.matches(r)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mk(root: &Path, rel: &str) {
        fs::create_dir_all(root.join(rel)).unwrap();
    }

    #[test]
    fn scans_two_roles_under_one_server() {
        let d = tempdir().unwrap();
        mk(d.path(), "acct1/cn/server1/roleA");
        mk(d.path(), "acct1/cn/server1/roleB");
        let roles = RoleScanner::new(d.path()).scan_all();
        assert_eq!(roles.len(), 2);
        for r in &roles {
            assert_eq!((r.account.as_str(), r.region.as_str(), r.server.as_str()), ("acct1", "cn", "server1"));
            assert_eq!(r.path, d.path().join("acct1/cn/server1").join(&r.role));
            assert!(r.path.is_dir());
        }
        assert_eq!(roles[0].role, "roleA");
        assert_eq!(roles[1].role, "roleB");
    }

    #[test]
    fn skips_account_without_subdirectories() {
        let d = tempdir().unwrap();
        mk(d.path(), "acct1/cn/server1/roleA");
        mk(d.path(), "acct2");
        fs::write(d.path().join("acct2/server.dat"), b"x").unwrap();
        let roles = RoleScanner::new(d.path()).scan_all();
        assert!(roles.iter().all(|r| r.account != "acct2"));
        assert_eq!(roles.len(), 1);
    }

    #[test]
    fn ignores_files_at_every_level() {
        let d = tempdir().unwrap();
        mk(d.path(), "acct1/cn/server1/roleA");
        fs::write(d.path().join("readme.txt"), b"x").unwrap();
        fs::write(d.path().join("acct1/x.ini"), b"x").unwrap();
        fs::write(d.path().join("acct1/cn/y.ini"), b"x").unwrap();
        fs::write(d.path().join("acct1/cn/server1/z.ini"), b"x").unwrap();
        let roles = RoleScanner::new(d.path()).scan_all();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role, "roleA");
    }

    #[test]
    fn empty_region_or_server_contributes_nothing() {
        let d = tempdir().unwrap();
        mk(d.path(), "acct1/cn");
        mk(d.path(), "acct1/tw/server9");
        assert!(RoleScanner::new(d.path()).scan_all().is_empty());
    }

    #[test]
    fn missing_root_yields_empty() {
        let d = tempdir().unwrap();
        assert!(RoleScanner::new(d.path().join("nope")).scan_all().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_account_keeps_other_roles() {
        use std::os::unix::fs::PermissionsExt;
        let d = tempdir().unwrap();
        mk(d.path(), "acct1/cn/server1/roleA");
        mk(d.path(), "acct2/cn/server1/roleB");
        let locked = d.path().join("acct1");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignores permission bits
        let privileged = fs::read_dir(&locked).is_ok();
        let roles = RoleScanner::new(d.path()).scan_all();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if privileged {
            return;
        }
        assert_eq!(roles.len(), 1);
        assert_eq!((roles[0].account.as_str(), roles[0].role.as_str()), ("acct2", "roleB"));
    }

    #[test]
    fn find_by_identity() {
        let d = tempdir().unwrap();
        mk(d.path(), "a/r/s/x");
        let s = RoleScanner::new(d.path());
        assert!(s.find("a", "r", "s", "x").is_some());
        assert!(s.find("a", "r", "s", "y").is_none());
    }

    fn sample() -> Vec<RoleRecord> {
        let root = Path::new("/ud");
        vec![
            RoleRecord::new(root, "b", "cn", "s2", "r1"),
            RoleRecord::new(root, "a", "cn", "s1", "r2"),
            RoleRecord::new(root, "b", "tw", "s1", "r3"),
            RoleRecord::new(root, "a", "cn", "s2", "r4"),
        ]
    }

    #[test]
    fn distinct_projections_are_sorted_and_unique() {
        let rs = sample();
        assert_eq!(distinct_accounts(&rs), vec!["a", "b"]);
        assert_eq!(distinct_regions(&rs), vec!["cn", "tw"]);
        assert_eq!(distinct_servers(&rs), vec!["s1", "s2"]);
        assert!(distinct_accounts(&[]).is_empty());
    }

    #[test]
    fn filter_preserves_order_and_combines_fields() {
        let rs = sample();
        let by_account = filter_roles(&rs, &RoleFilter { account: Some("b".into()), ..Default::default() });
        assert_eq!(by_account.iter().map(|r| r.role.as_str()).collect::<Vec<_>>(), vec!["r1", "r3"]);

        let both = RoleFilter { account: Some("a".into()), server: Some("s2".into()), ..Default::default() };
        let hit = filter_roles(&rs, &both);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].role, "r4");

        assert_eq!(filter_roles(&rs, &RoleFilter::default()), rs);
        let case = RoleFilter { region: Some("CN".into()), ..Default::default() };
        assert!(filter_roles(&rs, &case).is_empty());
    }
}
