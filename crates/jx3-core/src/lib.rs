//! jx3-core: save-data discovery and role management for JX3 installs
//!
//! - `resolver`: find the `userdata` root from any nearby path
//! - `scanner`: list roles as account/region/server/role records
//! - `copier`: copy one role's folder over others
//! - `backup`: timestamped backups with rotation, restore and zip export
//! - `config`: persisted settings for the front ends
//!
pub mod backup;
pub mod config;
pub mod copier;
pub mod error;
pub mod model;
pub mod resolver;
pub mod scanner;

pub use backup::BackupManager;
pub use config::{AppConfig, ConfigStore};
pub use copier::{CopyFailure, CopyReport, copy_role, copy_to_many, validate_copy};
pub use error::{Error, Result};
pub use model::{BackupInfo, RoleRecord};
pub use resolver::{PathResolver, resolve_root, validate_root};
pub use scanner::{
    RoleFilter, RoleScanner, distinct_accounts, distinct_regions, distinct_servers, filter_roles,
};
