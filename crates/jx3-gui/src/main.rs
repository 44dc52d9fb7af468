use chrono::{DateTime, Local};
use eframe::{App, egui};
use jx3_core::{BackupInfo, BackupManager, ConfigStore, RoleFilter, RoleRecord, RoleScanner};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct State {
    root: Option<PathBuf>,
    roles: Vec<RoleRecord>,
    filter: RoleFilter,
    // indices into `roles`, reset on every rescan
    source: Option<usize>,
    targets: BTreeSet<usize>,
    backups: Vec<BackupInfo>,
    confirm_copy: bool,
    confirm_restore: Option<String>,
    confirm_delete: Option<String>,
    last_backup_time: Option<DateTime<Local>>,
    status: String,
}

impl State {
    fn clear_selection(&mut self) {
        self.source = None;
        self.targets.clear();
        self.confirm_copy = false;
        self.confirm_restore = None;
    }
    fn source_role(&self) -> Option<&RoleRecord> {
        self.source.and_then(|i| self.roles.get(i))
    }
    fn target_roles(&self) -> Vec<RoleRecord> {
        self.targets
            .iter()
            .filter(|&&i| Some(i) != self.source)
            .filter_map(|&i| self.roles.get(i).cloned())
            .collect()
    }
}

struct AppGui {
    state: State,
    store: ConfigStore,
}

impl AppGui {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let store = ConfigStore::open(jx3_core::config::default_config_path());
        let mut app = Self {
            state: State {
                root: store.config().userdata(),
                status: "Pick the game install folder or SeasunGame.exe".into(),
                ..Default::default()
            },
            store,
        };
        if app.state.root.is_some() {
            app.refresh_roles();
            app.refresh_backups();
        }
        app
    }
    fn backup_manager(&self) -> Option<BackupManager> {
        let root = self.state.root.as_ref()?;
        let cfg = self.store.config();
        BackupManager::new(root, cfg.max_backups, cfg.backup_dir.clone()).ok()
    }
    fn refresh_roles(&mut self) {
        if let Some(root) = &self.state.root {
            self.state.roles = RoleScanner::new(root).scan_all();
            self.state.clear_selection();
            self.state.status = if self.state.roles.is_empty() {
                "No roles found".into()
            } else {
                format!("Found {} role(s)", self.state.roles.len())
            };
        }
    }
    fn refresh_backups(&mut self) {
        self.state.backups = self
            .backup_manager()
            .map(|m| m.list_backups(None))
            .unwrap_or_default();
    }
    fn apply_root(&mut self, picked: PathBuf) {
        match jx3_core::resolve_root(&picked) {
            Some(root) => {
                tracing::info!(root = %root.display(), "using save-data root");
                self.store.remember_root(&picked, &root);
                if let Err(e) = self.store.save() {
                    tracing::warn!(error = %e, "could not save config");
                }
                self.state.root = Some(root);
                self.refresh_roles();
                self.refresh_backups();
            }
            None => {
                self.state.status = format!("No userdata folder found near {}", picked.display());
            }
        }
    }
    fn pick_install_dir(&mut self) {
        if let Some(dir) = rfd::FileDialog::new().set_directory(".").pick_folder() {
            self.apply_root(dir);
        }
    }
    fn pick_exe(&mut self) {
        if let Some(file) = rfd::FileDialog::new()
            .add_filter("Game launcher", &["exe"])
            .pick_file()
        {
            self.apply_root(file);
        }
    }
    fn run_copy(&mut self) {
        let Some(source) = self.state.source_role().cloned() else {
            self.state.status = "Select a source role".into();
            return;
        };
        let targets = self.state.target_roles();
        if targets.is_empty() {
            self.state.status = "Tick at least one target role".into();
            return;
        }
        if self.store.config().auto_backup
            && let Some(mgr) = self.backup_manager()
        {
            for t in &targets {
                if let Err(e) = mgr.backup_role(t) {
                    self.state.status = format!("Backup of {} failed: {}", t, e);
                    return;
                }
            }
            self.state.last_backup_time = Some(Local::now());
        }
        let report = jx3_core::copy_to_many(&source, &targets, |done, total, msg| {
            tracing::debug!(done, total, "{}", msg);
        });
        self.state.status = if report.failed.is_empty() {
            format!("Copied to {} role(s)", report.success_count)
        } else {
            let first = &report.failed[0];
            format!(
                "Copied to {}, {} failed ({}: {})",
                report.success_count,
                report.failed.len(),
                first.role,
                first.error
            )
        };
        self.refresh_backups();
    }
    fn backup_selected(&mut self) {
        let Some(role) = self.state.source_role().cloned() else {
            self.state.status = "Select a role to back up".into();
            return;
        };
        match self.backup_manager().map(|m| m.backup_role(&role)) {
            Some(Ok(_)) => {
                self.state.status = format!("Backed up {}", role);
                self.state.last_backup_time = Some(Local::now());
            }
            Some(Err(e)) => self.state.status = format!("Backup error: {}", e),
            None => self.state.status = "Backup folder unavailable".into(),
        }
        self.refresh_backups();
    }
    fn restore(&mut self, name: &str) {
        let Some(role) = self.state.source_role().cloned() else {
            self.state.status = "Select the role to restore into".into();
            return;
        };
        match self.backup_manager().map(|m| m.restore_backup(name, &role)) {
            Some(Ok(())) => self.state.status = format!("Restored {} into {}", name, role),
            Some(Err(e)) => self.state.status = format!("Restore error: {}", e),
            None => self.state.status = "Backup folder unavailable".into(),
        }
    }
    fn delete(&mut self, name: &str) {
        match self.backup_manager().map(|m| m.delete_backup(name)) {
            Some(Ok(())) => self.state.status = format!("Deleted {}", name),
            Some(Err(e)) => self.state.status = format!("Delete error: {}", e),
            None => self.state.status = "Backup folder unavailable".into(),
        }
        self.refresh_backups();
    }
}

fn filter_combo(ui: &mut egui::Ui, label: &str, value: &mut Option<String>, options: &[String]) -> bool {
    let before = value.clone();
    egui::ComboBox::from_label(label)
        .selected_text(value.as_deref().unwrap_or("All"))
        .show_ui(ui, |ui| {
            ui.selectable_value(value, None, "All");
            for o in options {
                ui.selectable_value(value, Some(o.clone()), o.as_str());
            }
        });
    *value != before
}

impl App for AppGui {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open Install Folder").clicked() {
                    self.pick_install_dir();
                }
                if ui.button("Open Game Exe").clicked() {
                    self.pick_exe();
                }
                if ui.button("Rescan").clicked() {
                    self.refresh_roles();
                    self.refresh_backups();
                }
                ui.separator();
                let cfg = self.store.config_mut();
                let mut changed = ui.checkbox(&mut cfg.auto_backup, "Backup targets before copy").changed();
                changed |= ui
                    .checkbox(&mut cfg.confirm_before_copy, "Confirm before copy")
                    .changed();
                if changed && let Err(e) = self.store.save() {
                    self.state.status = format!("Config save error: {}", e);
                }
                if let Some(time) = self.state.last_backup_time {
                    ui.label(format!("Last backup: {}", time.format("%Y-%m-%d %H:%M:%S")));
                }
            });
            if let Some(root) = &self.state.root {
                ui.label(format!("userdata: {}", root.display()));
            }
        });

        egui::SidePanel::left("left").min_width(320.0).show(ctx, |ui| {
            ui.heading("Roles");
            let accounts = jx3_core::distinct_accounts(&self.state.roles);
            let regions = jx3_core::distinct_regions(&self.state.roles);
            let servers = jx3_core::distinct_servers(&self.state.roles);
            let mut changed = filter_combo(ui, "Account", &mut self.state.filter.account, &accounts);
            changed |= filter_combo(ui, "Region", &mut self.state.filter.region, &regions);
            changed |= filter_combo(ui, "Server", &mut self.state.filter.server, &servers);
            if changed {
                self.state.clear_selection();
            }
            ui.separator();
            ui.label("Click a role to select the source, tick targets:");
            let visible: Vec<usize> = (0..self.state.roles.len())
                .filter(|&i| self.state.filter.matches(&self.state.roles[i]))
                .collect();
            egui::ScrollArea::vertical()
                .id_source("roles_scroll")
                .show(ui, |ui| {
                    for i in visible {
                        let label = self.state.roles[i].to_string();
                        ui.horizontal(|ui| {
                            let mut ticked = self.state.targets.contains(&i);
                            let is_source = Some(i) == self.state.source;
                            if ui
                                .add_enabled(!is_source, egui::Checkbox::without_text(&mut ticked))
                                .changed()
                            {
                                if ticked {
                                    self.state.targets.insert(i);
                                } else {
                                    self.state.targets.remove(&i);
                                }
                            }
                            if ui.selectable_label(is_source, label).clicked() {
                                self.state.source = Some(i);
                                self.state.targets.remove(&i);
                            }
                        });
                    }
                });
        });

        egui::TopBottomPanel::bottom("backups_panel")
            .resizable(true)
            .default_height(220.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Backups");
                    if ui.button("Back Up Selected Role").clicked() {
                        self.backup_selected();
                    }
                });
                let mut restore: Option<String> = None;
                let mut delete: Option<String> = None;
                egui::ScrollArea::vertical()
                    .id_source("backups_scroll")
                    .show(ui, |ui| {
                        for b in &self.state.backups {
                            ui.horizontal(|ui| {
                                ui.label(&b.created_at);
                                ui.label(&b.role_info);
                                ui.label(format!("{} bytes", b.size));
                                if ui.small_button("Restore into selected").clicked() {
                                    restore = Some(b.name.clone());
                                }
                                if ui.small_button("Delete").clicked() {
                                    delete = Some(b.name.clone());
                                }
                            });
                        }
                    });
                if restore.is_some() {
                    self.state.confirm_restore = restore;
                }
                if delete.is_some() {
                    self.state.confirm_delete = delete;
                }
                if let Some(name) = self.state.confirm_restore.clone() {
                    ui.horizontal(|ui| {
                        ui.label(format!("Restore {} over the selected role?", name));
                        if ui.button("Confirm").clicked() {
                            self.restore(&name);
                            self.state.confirm_restore = None;
                        }
                        if ui.button("Cancel").clicked() {
                            self.state.confirm_restore = None;
                        }
                    });
                }
                if let Some(name) = self.state.confirm_delete.clone() {
                    ui.horizontal(|ui| {
                        ui.label(format!("Delete backup {}?", name));
                        if ui.button("Confirm").clicked() {
                            self.delete(&name);
                            self.state.confirm_delete = None;
                        }
                        if ui.button("Cancel").clicked() {
                            self.state.confirm_delete = None;
                        }
                    });
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Copy");
            match self.state.source_role() {
                Some(r) => ui.label(format!("Source: {}", r)),
                None => ui.label("Source: (none)"),
            };
            let targets = self.state.target_roles();
            ui.label(format!("Targets: {}", targets.len()));
            for t in &targets {
                ui.label(format!("  {}", t));
            }
            ui.separator();
            if ui.button("Copy Settings").clicked() {
                if self.store.config().confirm_before_copy {
                    self.state.confirm_copy = true;
                } else {
                    self.run_copy();
                }
            }
            if self.state.confirm_copy {
                ui.horizontal(|ui| {
                    ui.label(format!("Overwrite {} role folder(s)?", targets.len()));
                    if ui.button("Confirm").clicked() {
                        self.run_copy();
                        self.state.confirm_copy = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.state.confirm_copy = false;
                    }
                });
            }
            ui.separator();
            ui.label(&self.state.status);
        });
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jx3_core=info,jx3_gui=info")),
        )
        .init();

    let native_options = eframe::NativeOptions {
        viewport: egui::viewport::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([800.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "JX3 Role Sync",
        native_options,
        Box::new(|cc| Ok(Box::new(AppGui::new(cc)))),
    )
}
