use clap::{Args as ClapArgs, Parser, Subcommand};
use jx3_core::{BackupManager, ConfigStore, RoleFilter, RoleRecord, RoleScanner};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "jx3-sync",
    about = "Locate JX3 save data, list roles, copy and back up role settings",
    version
)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Find the userdata folder from an install dir, exe or any nearby path
    Resolve(ResolveArgs),
    /// Check that a folder looks like a userdata root
    Validate { path: PathBuf },
    /// List roles, optionally filtered
    Roles(RolesArgs),
    /// List distinct accounts, regions and servers
    Filters(RootArg),
    /// Copy one role's folder over one or more roles
    Copy(CopyArgs),
    /// Back up a role (account/region/server/role)
    Backup(BackupArgs),
    /// Manage existing backups
    #[command(subcommand)]
    Backups(BackupsCmd),
    /// Show or change settings
    #[command(subcommand)]
    Config(ConfigCmd),
}

#[derive(ClapArgs, Debug)]
struct ResolveArgs {
    path: PathBuf,
    /// Remember the result in the config file
    #[arg(long, default_value_t = false)]
    save: bool,
}

#[derive(ClapArgs, Debug)]
struct RootArg {
    /// userdata folder (defaults to the configured one)
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct RolesArgs {
    #[command(flatten)]
    root: RootArg,
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    server: Option<String>,
    /// Print records as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(ClapArgs, Debug)]
struct CopyArgs {
    #[command(flatten)]
    root: RootArg,
    /// Source role, account/region/server/role
    #[arg(long)]
    from: String,
    /// Target role(s), account/region/server/role
    #[arg(long, required = true, num_args = 1..)]
    to: Vec<String>,
    /// Skip the automatic backup of each target
    #[arg(long, default_value_t = false)]
    no_backup: bool,
}

#[derive(ClapArgs, Debug)]
struct BackupArgs {
    #[command(flatten)]
    root: RootArg,
    role: String,
}

#[derive(Subcommand, Debug)]
enum BackupsCmd {
    /// List backups, newest first
    List {
        #[command(flatten)]
        root: RootArg,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Restore a backup over a role
    Restore {
        #[command(flatten)]
        root: RootArg,
        name: String,
        /// Target role, account/region/server/role
        #[arg(long)]
        to: String,
    },
    /// Delete a backup
    Delete {
        #[command(flatten)]
        root: RootArg,
        name: String,
    },
    /// Write a backup as a .zip file
    Export {
        #[command(flatten)]
        root: RootArg,
        name: String,
        /// Output folder (defaults to the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    /// Print the settings as JSON
    Get,
    /// Set one setting from a JSON value, e.g. `max_backups 3`
    Set { key: String, value: String },
    /// Restore default settings
    Reset,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jx3_core=info,jx3_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = ConfigStore::open(cli.config.unwrap_or_else(jx3_core::config::default_config_path));
    match cli.cmd {
        Cmd::Resolve(a) => cmd_resolve(&mut store, a),
        Cmd::Validate { path } => cmd_validate(&path),
        Cmd::Roles(a) => cmd_roles(&store, a),
        Cmd::Filters(a) => cmd_filters(&store, a),
        Cmd::Copy(a) => cmd_copy(&store, a),
        Cmd::Backup(a) => cmd_backup(&store, a),
        Cmd::Backups(c) => cmd_backups(&store, c),
        Cmd::Config(c) => cmd_config(&mut store, c),
    }
}

fn fail(code: i32, msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", msg);
    std::process::exit(code);
}

fn root_or_config(store: &ConfigStore, arg: RootArg) -> PathBuf {
    arg.root
        .or_else(|| store.config().userdata())
        .unwrap_or_else(|| fail(2, "no userdata folder; pass --root or run `resolve --save` first"))
}

fn backup_manager(store: &ConfigStore, root: &Path) -> BackupManager {
    let cfg = store.config();
    BackupManager::new(root, cfg.max_backups, cfg.backup_dir.clone())
        .unwrap_or_else(|e| fail(4, format!("cannot open backup folder: {}", e)))
}

/// Split `account/region/server/role`.
fn parse_role_spec(spec: &str) -> Option<[&str; 4]> {
    let parts: Vec<&str> = spec.split('/').collect();
    match parts.as_slice() {
        [a, r, s, n] if parts.iter().all(|p| !p.is_empty()) => Some([*a, *r, *s, *n]),
        _ => None,
    }
}

// Existing roles come from a scan; unknown names address a new folder under root.
fn lookup_role(scanner: &RoleScanner, spec: &str) -> RoleRecord {
    let Some([a, r, s, n]) = parse_role_spec(spec) else {
        fail(3, format!("bad role {:?}, expected account/region/server/role", spec));
    };
    let role = RoleRecord::checked(scanner.root(), a, r, s, n).unwrap_or_else(|e| fail(3, e));
    scanner.find(a, r, s, n).unwrap_or(role)
}

fn cmd_resolve(store: &mut ConfigStore, args: ResolveArgs) {
    match jx3_core::resolve_root(&args.path) {
        Some(root) => {
            println!("{}", root.display());
            if args.save {
                store.remember_root(&args.path, &root);
                if let Err(e) = store.save() {
                    fail(5, format!("saving config: {}", e));
                }
            }
        }
        None => fail(3, format!("no userdata folder found near {}", args.path.display())),
    }
}

fn cmd_validate(path: &Path) {
    if jx3_core::validate_root(path) {
        println!("ok");
    } else {
        fail(3, format!("{} is not a usable userdata folder", path.display()));
    }
}

fn cmd_roles(store: &ConfigStore, args: RolesArgs) {
    let root = root_or_config(store, args.root);
    let roles = RoleScanner::new(root).scan_all();
    let filter = RoleFilter {
        account: args.account.filter(|s| !s.is_empty()),
        region: args.region.filter(|s| !s.is_empty()),
        server: args.server.filter(|s| !s.is_empty()),
    };
    let roles = jx3_core::filter_roles(&roles, &filter);
    if args.json {
        match serde_json::to_string_pretty(&roles) {
            Ok(s) => println!("{}", s),
            Err(e) => fail(5, e),
        }
    } else {
        for r in &roles {
            println!("{}\t{}\t{}\t{}\t{}", r.account, r.region, r.server, r.role, r.path.display());
        }
    }
}

fn cmd_filters(store: &ConfigStore, args: RootArg) {
    let roles = RoleScanner::new(root_or_config(store, args)).scan_all();
    let out = serde_json::json!({
        "accounts": jx3_core::distinct_accounts(&roles),
        "regions": jx3_core::distinct_regions(&roles),
        "servers": jx3_core::distinct_servers(&roles),
    });
    match serde_json::to_string_pretty(&out) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(5, e),
    }
}

fn cmd_copy(store: &ConfigStore, args: CopyArgs) {
    let root = root_or_config(store, args.root);
    let scanner = RoleScanner::new(&root);
    let source = lookup_role(&scanner, &args.from);
    let targets: Vec<RoleRecord> = args.to.iter().map(|t| lookup_role(&scanner, t)).collect();

    if !args.no_backup && store.config().auto_backup {
        let backups = backup_manager(store, &root);
        for t in targets.iter().filter(|t| t.path.exists()) {
            if let Err(e) = backups.backup_role(t) {
                fail(4, format!("backup of {} failed: {}", t, e));
            }
        }
    }

    let report = jx3_core::copy_to_many(&source, &targets, |done, total, msg| {
        tracing::info!(done, total, "{}", msg);
    });
    println!("copied to {} of {} role(s)", report.success_count, targets.len());
    for f in &report.failed {
        eprintln!("failed: {}: {}", f.role, f.error);
    }
    if !report.failed.is_empty() {
        std::process::exit(6);
    }
}

fn cmd_backup(store: &ConfigStore, args: BackupArgs) {
    let root = root_or_config(store, args.root);
    let role = lookup_role(&RoleScanner::new(&root), &args.role);
    match backup_manager(store, &root).backup_role(&role) {
        Ok(p) => println!("{}", p.display()),
        Err(e) => fail(4, e),
    }
}

fn cmd_backups(store: &ConfigStore, cmd: BackupsCmd) {
    match cmd {
        BackupsCmd::List { root, limit, json } => {
            let list = backup_manager(store, &root_or_config(store, root)).list_backups(limit);
            if json {
                match serde_json::to_string_pretty(&list) {
                    Ok(s) => println!("{}", s),
                    Err(e) => fail(5, e),
                }
            } else {
                for b in &list {
                    println!("{}\t{}\t{}\t{}", b.name, b.created_at, b.size, b.role_info);
                }
            }
        }
        BackupsCmd::Restore { root, name, to } => {
            let root = root_or_config(store, root);
            let target = lookup_role(&RoleScanner::new(&root), &to);
            if let Err(e) = backup_manager(store, &root).restore_backup(&name, &target) {
                fail(4, e);
            }
            println!("restored {} to {}", name, target);
        }
        BackupsCmd::Delete { root, name } => {
            let root = root_or_config(store, root);
            if let Err(e) = backup_manager(store, &root).delete_backup(&name) {
                fail(4, e);
            }
            println!("deleted {}", name);
        }
        BackupsCmd::Export { root, name, out } => {
            let root = root_or_config(store, root);
            let out = out.unwrap_or_else(|| PathBuf::from("."));
            match backup_manager(store, &root).export_zip(&name, &out) {
                Ok(p) => println!("{}", p.display()),
                Err(e) => fail(4, e),
            }
        }
    }
}

fn cmd_config(store: &mut ConfigStore, cmd: ConfigCmd) {
    match cmd {
        ConfigCmd::Get => match serde_json::to_string_pretty(store.config()) {
            Ok(s) => println!("{}", s),
            Err(e) => fail(5, e),
        },
        ConfigCmd::Set { key, value } => {
            if let Err(e) = store.set(&key, &value) {
                fail(3, e);
            }
            if let Err(e) = store.save() {
                fail(5, e);
            }
        }
        ConfigCmd::Reset => {
            store.reset();
            if let Err(e) = store.save() {
                fail(5, e);
            }
        }
    }
}
