use anyhow::{Context, bail};
use autotool::config::{AppSettings, SETTINGS_FILE};
use autotool::editor::MacroEditor;
use autotool::executor::Interpreter;
use autotool::executor::context::CancellationToken;
use autotool::executor::events::ExecutionEvent;
use autotool::executor::flow_control::ControlFlow;
use autotool::executor::services::Services;
use autotool::executor::variables::VariableScope;
use autotool::graph::{CommandKind, CommandNode, MacroScript, Value};
use autotool::history::UndoStack;
use autotool::listing;
use autotool::node_types::{BLOCK_BODY, BLOCK_ELSE, BLOCK_THEN};
use autotool::persistence;
use autotool::registry::CommandRegistry;
use autotool::settings::*;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "autotool", version, about = "Replay desktop automation macros")]
struct Cli {
    /// Settings file
    #[arg(long, default_value = SETTINGS_FILE)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script. F3 stops it.
    Run {
        script: String,
        /// Seed a variable, e.g. --var count=3
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
        /// Do not install the global F3 stop hotkey
        #[arg(long)]
        no_hotkey: bool,
        /// Write the run log to the log directory afterwards
        #[arg(long)]
        export_log: bool,
        /// Write the run log to the Desktop afterwards
        #[arg(long)]
        desktop_log: bool,
    },
    /// Load a script and report problems
    Validate { script: String },
    /// Print the flat listing with nesting levels and marker pairs
    List { script: String },
    /// Write a sample script
    New {
        script: String,
        #[arg(long)]
        force: bool,
    },
}

fn parse_var(arg: &str) -> Result<(String, Value), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{}'", arg));
    }
    Ok((name.to_string(), Value::parse_loose(value)))
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[Error] {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = AppSettings::load(&cli.settings)
        .with_context(|| format!("loading {:?}", cli.settings))?;
    let registry = CommandRegistry::builtin();

    match cli.command {
        Command::Run {
            script,
            vars,
            no_hotkey,
            export_log,
            desktop_log,
        } => {
            let path = settings.script_path(&script);
            let macro_script = load_script(&path, &registry)?;
            let variables: VariableScope = vars.into_iter().collect();

            let (rx, token) =
                Interpreter::run_async_with_registry(
                    &macro_script,
                    registry.clone(),
                    Services::desktop,
                    variables,
                );
            if !no_hotkey {
                install_stop_hotkey(token.clone());
            }

            let mut lines = Vec::new();
            let mut outcome = ControlFlow::Error;
            for event in rx {
                match event {
                    ExecutionEvent::Log(msg) => {
                        let line = format!("[{}] {}", Local::now().format("%H:%M:%S%.3f"), msg);
                        println!("{}", line);
                        lines.push(line);
                    }
                    ExecutionEvent::NodeActive(id) => log::trace!("active {}", id),
                    ExecutionEvent::NodeInactive(id) => log::trace!("inactive {}", id),
                    ExecutionEvent::Finished(flow) => outcome = flow,
                }
            }

            if export_log {
                let file = settings.export_log(&lines)?;
                println!("[System] Exported to {:?}", file);
            }
            if desktop_log {
                let file = settings.export_log_to_desktop(&lines)?;
                println!("[System] Exported to {:?}", file);
            }

            settings.last_script_name = Some(macro_script.name.clone());
            if let Err(e) = settings.save(&cli.settings) {
                log::warn!("Could not save settings: {}", e);
            }

            Ok(match outcome {
                ControlFlow::Error => ExitCode::from(1),
                ControlFlow::Stop => ExitCode::from(2),
                _ => ExitCode::SUCCESS,
            })
        }
        Command::Validate { script } => {
            let path = settings.script_path(&script);
            let macro_script = load_script(&path, &registry)?;
            let mut problems = registry.validate_script(&macro_script);
            let items = listing::flatten(&macro_script.commands);
            for line in listing::unpaired(&items) {
                problems.push(format!("line {}: unpaired block marker", line));
            }

            if problems.is_empty() {
                println!(
                    "{:?}: OK ({} commands)",
                    path,
                    macro_script.node_count()
                );
                Ok(ExitCode::SUCCESS)
            } else {
                for problem in &problems {
                    println!("{}", problem);
                }
                Ok(ExitCode::from(1))
            }
        }
        Command::List { script } => {
            let path = settings.script_path(&script);
            let macro_script = load_script(&path, &registry)?;
            let items = listing::flatten(&macro_script.commands);
            println!("{} (version {})", macro_script.name, macro_script.version);
            print!("{}", listing::render(&items, &macro_script));
            Ok(ExitCode::SUCCESS)
        }
        Command::New { script, force } => {
            let path = settings.script_path(&script);
            if path.exists() && !force {
                bail!("{:?} already exists (use --force to overwrite)", path);
            }
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| script.clone());
            let sample = sample_script(&name, &settings)?;
            persistence::save_to_path(&sample, &path)?;
            println!("[System] Wrote {:?}", path);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_script(path: &Path, registry: &CommandRegistry) -> anyhow::Result<MacroScript> {
    persistence::load_from_path(path, registry).with_context(|| format!("loading {:?}", path))
}

/// Cancels `token` when F3 is pressed anywhere on the desktop.
fn install_stop_hotkey(token: CancellationToken) {
    std::thread::spawn(move || {
        if let Err(error) = rdev::listen(move |event| {
            if let rdev::EventType::KeyPress(rdev::Key::F3) = event.event_type {
                println!("[System] F3 Pressed - sending stop signal");
                token.cancel();
            }
        }) {
            log::error!("Global hotkey listener failed: {:?}", error);
        }
    });
}

/// Up to three rounds of: press Enter on the first round, mark the round as
/// done, wait. The second round sees the mark and breaks out of the loop.
fn sample_script(name: &str, settings: &AppSettings) -> anyhow::Result<MacroScript> {
    let mut editor = MacroEditor::with_history(
        MacroScript::new(name),
        UndoStack::with_max_records(settings.history_max_records),
    );

    let looped = editor.insert(
        None,
        0,
        CommandNode::new(CommandKind::Loop(LoopSettings { loop_count: 3 })),
    )?;
    editor.insert(
        None,
        0,
        CommandNode::new(CommandKind::SetVariable(SetVariableSettings {
            name: "round".into(),
            value: Value::String("pending".into()),
        })),
    )?;
    let check = editor.insert(
        Some((looped, BLOCK_BODY)),
        0,
        CommandNode::new(CommandKind::If(IfSettings {
            condition: "$round != done".into(),
        })),
    )?;
    editor.insert(
        Some((check, BLOCK_THEN)),
        0,
        CommandNode::new(CommandKind::KeyInput(KeyInputSettings::default())),
    )?;
    editor.insert(Some((check, BLOCK_ELSE)), 0, CommandNode::new(CommandKind::Break))?;
    editor.insert(
        Some((looped, BLOCK_BODY)),
        1,
        CommandNode::new(CommandKind::SetVariable(SetVariableSettings {
            name: "round".into(),
            value: Value::String("done".into()),
        })),
    )?;
    editor.insert(
        Some((looped, BLOCK_BODY)),
        2,
        CommandNode::new(CommandKind::Wait(WaitSettings { duration_ms: 500 })),
    )?;
    editor.insert(
        None,
        2,
        CommandNode::new(CommandKind::WaitImageNotExist(WaitImageSettings {
            image: ImageQuery {
                path: "templates/loading.png".into(),
                threshold: settings.default_image_threshold,
                ..Default::default()
            },
            timeout_ms: 10_000,
            ..Default::default()
        })),
    )?;

    Ok(editor.into_script())
}
