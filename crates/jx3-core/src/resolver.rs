//! Locating the `userdata` save-data root from an arbitrary starting path.
//!
//! The search climbs first (cheap, bounded by the ancestor count) and only
//! falls back to a bounded depth-first descent when nothing is found above.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Relative locations of the save-data root, in priority order.
/// The high-definition client wins when both are installed side by side.
pub const CANDIDATE_PATTERNS: [[&str; 3]; 2] = [
    ["bin", "zhcn_hd", "userdata"],
    ["bin", "zhcn", "userdata"],
];

/// Ancestor levels inspected by the upward phase, starting level included.
pub const MAX_UP_LEVELS: usize = 10;
/// Deepest directory visited by the downward phase (the start is depth 0).
pub const MAX_DOWN_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathResolver {
    max_up_levels: usize,
    max_down_depth: usize,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver {
    pub fn new() -> Self {
        Self::with_limits(MAX_UP_LEVELS, MAX_DOWN_DEPTH)
    }

    pub fn with_limits(max_up_levels: usize, max_down_depth: usize) -> Self {
        Self { max_up_levels, max_down_depth }
    }

    /// Find the `userdata` directory near `start`.
    ///
    /// `start` may be an install directory or a file inside it; an `.exe`
    /// is replaced by its parent. Unreadable directories are treated as dead
    /// ends, so `None` means "not found from here", which under restricted
    /// permissions is not proof of absence.
    pub fn resolve_root(&self, start: &Path) -> Option<PathBuf> {
        let start = normalize_start(start);
        debug!(start = %start.display(), "resolving save-data root");
        if let Some(found) = self.search_up(&start) {
            return Some(found);
        }
        let found = self.search_down(&start);
        if found.is_none() {
            debug!(start = %start.display(), "no save-data root found");
        }
        found
    }

    fn search_up(&self, start: &Path) -> Option<PathBuf> {
        for (level, dir) in start.ancestors().take(self.max_up_levels).enumerate() {
            if let Some(found) = match_patterns(dir) {
                debug!(level, root = %found.display(), "found save-data root above start");
                return Some(found);
            }
        }
        None
    }

    fn search_down(&self, start: &Path) -> Option<PathBuf> {
        // Links are followed; walkdir reports a loop as an error, which is skipped.
        let walker = WalkDir::new(start)
            .follow_links(true)
            .max_depth(self.max_down_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(found) = match_patterns(entry.path()) {
                debug!(depth = entry.depth(), root = %found.display(), "found save-data root below start");
                return Some(found);
            }
        }
        None
    }
}

/// Resolve with the default bounds.
pub fn resolve_root(start: &Path) -> Option<PathBuf> {
    PathResolver::new().resolve_root(start)
}

/// True if `path` is a directory holding at least one subdirectory.
pub fn validate_root(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    match fs::read_dir(path) {
        Ok(rd) => rd.flatten().any(|e| e.path().is_dir()),
        Err(_) => false,
    }
}

fn normalize_start(start: &Path) -> PathBuf {
    let abs = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
    if abs.is_file()
        && abs.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
        && let Some(parent) = abs.parent()
    {
        return parent.to_path_buf();
    }
    abs
}

fn match_patterns(dir: &Path) -> Option<PathBuf> {
    CANDIDATE_PATTERNS.iter().find_map(|segments| {
        let candidate = segments.iter().fold(dir.to_path_buf(), |p, s| p.join(s));
        candidate.is_dir().then_some(candidate)
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|s| s.starts_with('.'))
}
