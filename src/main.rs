use quick_launcher::launcher::{KeyOutcome, Launcher, LogExecutor};
use quick_launcher::plugin::PluginManager;
use quick_launcher::plugins::list::default_actions;
use quick_launcher::plugins::{DirectoryPlugin, ListPlugin};
use quick_launcher::session::Pane;
use quick_launcher::settings::Settings;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const OBJECTS_FILE: &str = "objects.json";

fn main() -> anyhow::Result<()> {
    let settings = Settings::load("settings.json")?;
    quick_launcher::logging::init(settings.debug_logging, settings.log_file.clone());

    let mut plugins = PluginManager::new();
    if let Some(paths) = &settings.index_paths {
        plugins.register(Arc::new(DirectoryPlugin::from_settings(paths)));
    }
    if Path::new(OBJECTS_FILE).exists() {
        plugins.register(Arc::new(ListPlugin::from_file("list", OBJECTS_FILE, default_actions())));
    }

    let mut launcher = Launcher::new(settings, plugins, Box::new(LogExecutor));
    for err in launcher.refresh_catalog() {
        eprintln!("{err}");
    }
    let watching = launcher.catalog().start_watching();
    tracing::info!(watching, objects = launcher.catalog().current_snapshot().len(), "ready");

    let stdin = std::io::stdin();
    let mut out = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        if let Err(e) = command(&mut launcher, line.trim_end()) {
            writeln!(out, "! {e}")?;
        }
        launcher.wait_for_results(Duration::from_millis(500));
        print_state(&launcher, &mut out)?;
    }
    launcher.learner().save()?;
    Ok(())
}

/// `:`-prefixed lines are commands, anything else is typed into the active
/// pane.
fn command(launcher: &mut Launcher, line: &str) -> anyhow::Result<()> {
    let Some(cmd) = line.strip_prefix(':') else {
        launcher.input(line);
        return Ok(());
    };
    let (name, arg) = cmd.split_once(' ').unwrap_or((cmd, ""));
    match name {
        "back" => {
            launcher.delete_last_char();
        }
        "up" => {
            launcher.go_up_level();
        }
        "reset" => {
            launcher.reset_all();
        }
        "free" => {
            launcher.toggle_free_text()?;
        }
        "stack" => {
            launcher.put_on_stack()?;
        }
        "pane" => {
            let pane = match arg {
                "action" => Pane::Action,
                "indirect" => Pane::IndirectObject,
                _ => Pane::Object,
            };
            launcher.select_pane(pane)?;
        }
        "pick" => {
            let index: usize = arg.parse().unwrap_or(0);
            let id = launcher
                .results()
                .get(index)
                .map(|r| r.id.clone())
                .ok_or_else(|| anyhow::anyhow!("no result {index}"))?;
            launcher.commit(&id)?;
        }
        "run" => {
            let outcome = launcher.activate()?;
            println!("ran {} on {}", outcome.action.id, outcome.object.id);
        }
        "key" => {
            let key = arg.chars().next().ok_or_else(|| anyhow::anyhow!("missing key"))?;
            match launcher.activate_accelerator(key)? {
                KeyOutcome::Activated(outcome) => {
                    println!("ran {} on {}", outcome.action.id, outcome.object.id)
                }
                KeyOutcome::AwaitingIndirect(state) => {
                    let action = state.action.map(|a| a.id).unwrap_or_default();
                    println!("{action} needs a second object");
                }
            }
        }
        other => anyhow::bail!("unknown command '{other}'"),
    }
    Ok(())
}

fn print_state(launcher: &Launcher, out: &mut impl Write) -> anyhow::Result<()> {
    let state = launcher.state();
    writeln!(out, "[{:?}/{:?}] {}", state.pane, state.mode, state.buffer)?;
    for r in launcher.results().iter().take(10) {
        writeln!(out, "{:>2} {:<40} {:.3}", r.position, r.display_name, r.total)?;
    }
    Ok(())
}
