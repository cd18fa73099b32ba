use std::path::Path;

use emote_core::config::{ensure_config_dir, get_settings_path};
use emote_core::policy::parse_bundle_ids;
use emote_core::storage::bundled_aliases;
use emote_core::{
    add_alias, best_match, load_settings, remove_alias, save_settings, FilterMode, JsonAliasStore,
    Result, Settings,
};
use emote_daemon::{
    check_and_request_permissions, daemon_status, daemon_worker_entry, is_trusted, start_daemon,
    stop_daemon,
};

use crate::cli::Commands;
use crate::utils::{print_aliases, print_filter, print_settings};

/// Changes requested by `emote filter`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterUpdate {
    pub mode: Option<FilterMode>,
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub clear: bool,
}

impl FilterUpdate {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.add.is_empty() && self.remove.is_empty() && !self.clear
    }

    /// Clear first, then remove, then add, then set the mode.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if self.clear {
            settings.bundle_identifiers.clear();
        }

        let removed: Vec<String> = self.remove.iter().map(|id| id.trim().to_lowercase()).collect();
        settings
            .bundle_identifiers
            .retain(|id| !removed.contains(&id.to_lowercase()));

        for ids in &self.add {
            settings.bundle_identifiers.extend(parse_bundle_ids(ids));
        }

        if let Some(mode) = self.mode {
            settings.filter_mode = mode;
        }

        settings.normalized()
    }
}

pub fn handle_command(command: Option<Commands>) -> Result<()> {
    match command {
        Some(command) => handle_subcommand(command),
        None => {
            daemon_status()?;
            println!("\nRun 'emote --help' to see all commands.");
            Ok(())
        }
    }
}

fn handle_subcommand(command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            trigger,
            replacement,
        } => {
            ensure_config_dir()?;
            let entry = add_alias(&JsonAliasStore::from_config_dir(), &trigger, &replacement)?;
            println!("Alias :{}: added", entry.trigger);
            Ok(())
        }
        Commands::Remove { trigger } => {
            remove_alias(&JsonAliasStore::from_config_dir(), &trigger)
                .map(|_| println!("Alias removed successfully"))
        }
        Commands::List { custom } => handle_list(custom),
        Commands::Edit => {
            ensure_config_dir()?;
            let store = JsonAliasStore::from_config_dir();
            println!("{}", store.ensure_custom_file()?.display());
            Ok(())
        }
        Commands::Expand { text } => handle_expand(&text),
        Commands::Filter {
            mode,
            add,
            remove,
            clear,
        } => handle_filter(
            &get_settings_path(),
            FilterUpdate {
                mode,
                add,
                remove,
                clear,
            },
        ),
        Commands::Settings => {
            let settings = load_settings(&get_settings_path())?;
            print_settings(&settings);
            Ok(())
        }
        Commands::Start => start_daemon(),
        Commands::Stop => stop_daemon(),
        Commands::Status => daemon_status(),
        Commands::Permissions => handle_permissions(),
        Commands::DaemonWorker => daemon_worker_entry(),
    }
}

fn handle_list(custom_only: bool) -> Result<()> {
    let store = JsonAliasStore::from_config_dir();

    if custom_only {
        ensure_config_dir()?;
        let custom = store.load_custom()?;
        print_aliases(custom.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    } else {
        let table = store.load_table();
        print_aliases(table.sorted());
        println!("\n{} aliases ({} bundled)", table.len(), bundled_aliases().len());
    }

    Ok(())
}

fn handle_expand(text: &str) -> Result<()> {
    let settings = load_settings(&get_settings_path())?;
    let table = JsonAliasStore::from_config_dir().load_table();

    match best_match(text, &table, settings.max_trigger_length) {
        Some(found) => println!(":{}: → {}", found.trigger, found.replacement),
        None => println!("no match"),
    }
    Ok(())
}

pub fn handle_filter(settings_path: &Path, update: FilterUpdate) -> Result<()> {
    let settings = load_settings(settings_path)?;

    if update.is_empty() {
        print_filter(&settings);
        return Ok(());
    }

    let settings = update.apply(settings);
    save_settings(settings_path, &settings)?;
    print_filter(&settings);
    Ok(())
}

fn handle_permissions() -> Result<()> {
    if is_trusted() {
        println!("✅ emote can monitor keyboard input.");
        return Ok(());
    }

    check_and_request_permissions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn filter_update_applies_in_order() {
        let settings = Settings {
            bundle_identifiers: vec!["com.a".into(), "com.b".into()],
            ..Settings::default()
        };
        let update = FilterUpdate {
            mode: Some(FilterMode::Allow),
            add: vec![" Com.C ,com.a".into()],
            remove: vec!["COM.B".into()],
            clear: false,
        };

        let updated = update.apply(settings);
        assert_eq!(updated.filter_mode, FilterMode::Allow);
        assert_eq!(
            updated.bundle_identifiers,
            vec!["com.a".to_string(), "com.c".to_string()]
        );
    }

    #[test]
    fn clear_then_add_replaces_the_list() {
        let settings = Settings {
            bundle_identifiers: vec!["com.a".into()],
            ..Settings::default()
        };
        let update = FilterUpdate {
            add: vec!["com.z".into()],
            clear: true,
            ..FilterUpdate::default()
        };
        assert_eq!(update.apply(settings).bundle_identifiers, vec!["com.z".to_string()]);
    }

    #[test]
    fn handle_filter_persists_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        handle_filter(
            &path,
            FilterUpdate {
                mode: Some(FilterMode::Deny),
                add: vec!["com.example.a".into()],
                ..FilterUpdate::default()
            },
        )
        .unwrap();

        let saved = load_settings(&path).unwrap();
        assert_eq!(saved.filter_mode, FilterMode::Deny);
        assert!(!saved.policy().should_process(Some("com.example.a"), false));
    }

    #[test]
    fn empty_update_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        handle_filter(&path, FilterUpdate::default()).unwrap();
        assert!(!path.exists());
    }
}
