use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// One role's save-data folder, `root/account/region/server/role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub account: String,
    pub region: String,
    pub server: String,
    pub role: String,
    pub path: PathBuf,
}

impl RoleRecord {
    pub fn new(
        root: &Path,
        account: impl Into<String>,
        region: impl Into<String>,
        server: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        let (account, region, server, role) =
            (account.into(), region.into(), server.into(), role.into());
        let path = root.join(&account).join(&region).join(&server).join(&role);
        Self { account, region, server, role, path }
    }

    /// Like [`RoleRecord::new`], but rejects names that would point the path
    /// anywhere other than one folder four levels below `root`.
    pub fn checked(
        root: &Path,
        account: impl Into<String>,
        region: impl Into<String>,
        server: impl Into<String>,
        role: impl Into<String>,
    ) -> Result<Self> {
        let r = Self::new(root, account, region, server, role);
        r.check_names()?;
        Ok(r)
    }

    /// Every identity field must be a single plain folder name.
    pub fn check_names(&self) -> Result<()> {
        for name in [&self.account, &self.region, &self.server, &self.role] {
            if !is_plain_component(name) {
                return Err(Error::InvalidRoleName(name.clone()));
            }
        }
        Ok(())
    }

    /// Same account, region, server and role name. `path` is not compared.
    pub fn same_identity(&self, other: &RoleRecord) -> bool {
        self.account == other.account
            && self.region == other.region
            && self.server == other.server
            && self.role == other.role
    }

    /// Folder-name safe label used to prefix backups of this role.
    ///
    /// Fields are joined with `_`; a `_` or `%` inside a field is written as
    /// `%5F` / `%25` so two different roles never share a label.
    pub fn backup_label(&self) -> String {
        [&self.account, &self.region, &self.server, &self.role]
            .map(|f| escape_label_field(f))
            .join("_")
    }
}

fn escape_label_field(field: &str) -> String {
    field.replace('%', "%25").replace('_', "%5F")
}

/// True for a non-empty name with no separators that is not `.` or `..`.
pub(crate) fn is_plain_component(name: &str) -> bool {
    let mut comps = Path::new(name).components();
    matches!((comps.next(), comps.next()), (Some(Component::Normal(_)), None))
        && !name.contains(['/', '\\'])
}

impl fmt::Display for RoleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.account, self.region, self.server, self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: String,
    pub role_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_derived_from_identity() {
        let r = RoleRecord::new(Path::new("/ud"), "acct1", "cn", "server1", "roleA");
        assert_eq!(r.path, Path::new("/ud/acct1/cn/server1/roleA"));
        assert_eq!(r.to_string(), "acct1-cn-server1-roleA");
        assert_eq!(r.backup_label(), "acct1_cn_server1_roleA");
    }

    #[test]
    fn identity_ignores_path() {
        let a = RoleRecord::new(Path::new("/a"), "x", "y", "z", "r");
        let b = RoleRecord::new(Path::new("/b"), "x", "y", "z", "r");
        assert!(a.same_identity(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn labels_keep_underscored_fields_apart() {
        let a = RoleRecord::new(Path::new("/ud"), "a_b", "cn", "s", "r");
        let b = RoleRecord::new(Path::new("/ud"), "a", "b_cn", "s", "r");
        assert_ne!(a.backup_label(), b.backup_label());
        assert_eq!(a.backup_label(), "a%5Fb_cn_s_r");
        let pct = RoleRecord::new(Path::new("/ud"), "a%5Fb", "cn", "s", "r");
        assert_ne!(pct.backup_label(), a.backup_label());
    }

    #[test]
    fn checked_rejects_path_like_names() {
        let root = Path::new("/ud");
        assert!(RoleRecord::checked(root, "a", "cn", "s", "hero").is_ok());
        for bad in ["..", ".", "x/y", "x\\y", ""] {
            let r = RoleRecord::checked(root, "a", "cn", "s", bad);
            assert!(matches!(r, Err(Error::InvalidRoleName(_))), "{bad:?}");
            let r = RoleRecord::checked(root, bad, "cn", "s", "hero");
            assert!(matches!(r, Err(Error::InvalidRoleName(_))), "{bad:?}");
        }
    }
}
