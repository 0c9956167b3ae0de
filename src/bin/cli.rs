use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bulbscript::clock::SystemClock;
use bulbscript::device::{FakeLights, LightDevices};
use bulbscript::dsl::{compile_source, format_errors};
use bulbscript::error::AppError;
use bulbscript::model::LightSetHandle;
use bulbscript::runner::ScriptRunner;
use bulbscript::script_job::Environment;
use bulbscript::settings::{self, Settings};
use bulbscript::vm::StdoutSink;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bulbscript-cli", about = "Run and inspect light scripts", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (JSON); defaults apply when it does not exist
    #[arg(long, global = true, default_value = "bulbscript.json")]
    config: PathBuf,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run scripts, one after another
    Run {
        files: Vec<PathBuf>,
        /// Run the queue again each time it drains
        #[arg(long)]
        repeat: bool,
        /// Run each script on its own thread instead of queueing
        #[arg(long)]
        background: bool,
    },
    /// Compile scripts and report errors without running them
    Check { files: Vec<PathBuf> },
    /// Print the compiled instructions of a script
    Disasm { file: PathBuf },
    /// List the lights discovery currently reports
    Lights,
    /// Print the JSON schema of the settings file
    Schema,
}

// ── Helpers ──────────────────────────────────────────────────────

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn read_source(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())))
}

fn script_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn devices(settings: &Settings) -> Arc<dyn LightDevices> {
    if !settings.use_fakes {
        fail(AppError::Config {
            message: "no network light driver is built in; set use_fakes".to_string(),
        });
    }
    Arc::new(FakeLights::new(settings.fake_lights.clone()))
}

fn build_runner(settings: &Settings) -> ScriptRunner {
    let env = Environment {
        devices: devices(settings),
        lights: LightSetHandle::default(),
        clock: Arc::new(SystemClock::new(settings.sleep_slice())),
        output: Arc::new(StdoutSink),
        default_units: settings.default_units,
    };
    ScriptRunner::new(env, settings.clone())
}

/// Compile one file, printing its errors. Returns whether it compiled.
fn check_file(path: &Path, json: bool) -> bool {
    let source = read_source(path);
    match compile_source(&source) {
        Ok(program) => {
            if json {
                let report = serde_json::json!({
                    "file": path.display().to_string(),
                    "instructions": program.len(),
                    "routines": program.routines.keys().collect::<Vec<_>>(),
                });
                println!("{report}");
            } else {
                println!("{}: ok ({} instructions)", path.display(), program.len());
            }
            true
        }
        Err(errors) => {
            if json {
                let report = serde_json::json!({
                    "file": path.display().to_string(),
                    "errors": errors,
                });
                println!("{report}");
            } else {
                eprintln!("{}:", path.display());
                eprintln!("{}", format_errors(&errors, &source));
            }
            false
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────

fn run_scripts(settings: &Settings, files: &[PathBuf], repeat: bool, background: bool) {
    let runner = build_runner(settings);
    runner.set_repeat(repeat);
    for path in files {
        let source = read_source(path);
        let name = script_name(path);
        let queued = if background {
            runner.spawn_script(&name, &source, repeat)
        } else {
            runner.queue_script(&name, &source, false)
        };
        if let Err(e) = queued {
            if let AppError::Compile(errors) = &e {
                eprintln!("{}:", path.display());
                eprintln!("{}", format_errors(errors, &source));
            }
            runner.request_stop(true);
            fail(e);
        }
    }
    runner.wait_idle(Duration::MAX);
    info!("all scripts finished");
}

fn list_lights(settings: &Settings, json: bool) {
    let found = devices(settings).discover().unwrap_or_else(|e| fail(e));
    if json {
        println!("{}", serde_json::to_string_pretty(&found).unwrap_or_default());
        return;
    }
    for light in found {
        println!(
            "{:<16} group={:<12} location={:<12} {}{}{}",
            light.name,
            light.group.as_deref().unwrap_or("-"),
            light.location.as_deref().unwrap_or("-"),
            light.color,
            if light.multizone { " multizone" } else { "" },
            if light.matrix { " matrix" } else { "" },
        );
    }
}

// ── Main ─────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let settings = settings::load_settings(&cli.config).unwrap_or_else(|e| fail(e));
    init_logging(&settings);

    match &cli.command {
        Commands::Run {
            files,
            repeat,
            background,
        } => run_scripts(&settings, files, *repeat, *background),
        Commands::Check { files } => {
            let failed = files.iter().filter(|f| !check_file(f, cli.json)).count();
            if failed > 0 {
                process::exit(1);
            }
        }
        Commands::Disasm { file } => {
            let source = read_source(file);
            let program = compile_source(&source)
                .unwrap_or_else(|errors| fail(format_errors(&errors, &source)));
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&program).unwrap_or_default());
            } else {
                print!("{}", program.disassemble());
            }
        }
        Commands::Lights => list_lights(&settings, cli.json),
        Commands::Schema => {
            let schema = schemars::schema_for!(Settings);
            println!("{}", serde_json::to_string_pretty(&schema).unwrap_or_default());
        }
    }
}
