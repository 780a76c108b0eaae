//! CodeQuest - a gamified programming tutor for the terminal
//!
//! CLI entry point with global panic handler.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use codequest::chat::HttpTransport;
use codequest::cli::OutputOptions;
use codequest::config::{quest_home, Config};
use codequest::error::exit_codes;
use codequest::{
    AskCommand, Catalogs, FileStateStore, GameStore, LanguageCommand, MapCommand, PlayCommand,
    PracticeCommand, ResetCommand, StatusCommand, TheoryCommand,
};

type Game = GameStore<FileStateStore>;
type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

// =============================================================================
// CLI Definition
// =============================================================================

/// CodeQuest - learn Python or JavaScript one lesson at a time
#[derive(Parser)]
#[command(name = "codequest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, short, global = true)]
    json: bool,
    /// Suppress output
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or switch the course language (python, javascript)
    Language {
        /// Language to switch to
        name: Option<String>,
    },

    /// Show XP, hearts, streak and the next lesson
    Status,

    /// Show the level map with locks and completion
    Map,

    /// Read the theory page of a level
    Theory {
        /// Level number
        level: u32,
    },

    /// Play a lesson (the next open one by default)
    Play {
        /// Lesson id, e.g. 1-2
        #[arg(long, short)]
        lesson: Option<String>,
    },

    /// Practice questions from completed lessons
    Practice {
        /// quick, targeted or random; omit to list modes
        mode: Option<String>,
        /// Lesson id for targeted practice
        #[arg(long, short)]
        lesson: Option<String>,
    },

    /// Ask the chat tutor; without a message, start a conversation
    Ask {
        /// Question for the tutor
        message: Vec<String>,
    },

    /// Erase all progress
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> ExitCode {
    setup_panic_handler();
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("codequest error: {}", e);
            ExitCode::from(exit_codes::FAILURE as u8)
        }
    }
}

/// Log to stderr, filtered by `CODEQUEST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CODEQUEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.codequest/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("codequest panic: {}", info);

        if let Some(home) = quest_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> CliResult {
    let cli = Cli::parse();
    let options = OutputOptions {
        json: cli.json,
        quiet: cli.quiet,
    };
    let mut game = open_game()?;

    match cli.command {
        Commands::Language { name } => run_language(&mut game, name.as_deref(), &options),
        Commands::Status => run_status(&game, &options),
        Commands::Map => run_map(&game, &options),
        Commands::Theory { level } => run_theory(&mut game, level, &options),
        Commands::Play { lesson } => run_play(&mut game, lesson.as_deref(), &options),
        Commands::Practice { mode, lesson } => {
            run_practice(&game, mode.as_deref(), lesson.as_deref(), &options)
        }
        Commands::Ask { message } => run_ask(&game, &message.join(" "), &options),
        Commands::Reset { yes } => run_reset(&mut game, yes, &options),
    }
}

fn open_game() -> Result<Game, Box<dyn std::error::Error>> {
    let config = Config::load();
    let store = FileStateStore::new()?;
    let catalogs = Catalogs::bundled()?;
    Ok(GameStore::open(store, catalogs, config))
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::SUCCESS as u8)
    } else {
        ExitCode::from(exit_codes::FAILURE as u8)
    }
}

fn print_formatted(formatted: &str) {
    if !formatted.is_empty() {
        println!("{}", formatted.trim_end());
    }
}

fn run_language(game: &mut Game, name: Option<&str>, options: &OutputOptions) -> CliResult {
    let mut cmd = LanguageCommand::new(game);
    let output = cmd.run(name);
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(output.success))
}

fn run_status(game: &Game, options: &OutputOptions) -> CliResult {
    let cmd = StatusCommand::new(game);
    let output = cmd.run();
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(true))
}

fn run_map(game: &Game, options: &OutputOptions) -> CliResult {
    let cmd = MapCommand::new(game);
    let output = cmd.run();
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(output.success))
}

fn run_theory(game: &mut Game, level: u32, options: &OutputOptions) -> CliResult {
    let mut cmd = TheoryCommand::new(game);
    let output = cmd.run(level);
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(output.success))
}

fn run_play(game: &mut Game, lesson: Option<&str>, options: &OutputOptions) -> CliResult {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();

    let mut cmd = PlayCommand::new(game);
    let output = if options.json || options.quiet {
        // Keep stdout clean for the final document
        cmd.run(lesson, &mut input, &mut io::stderr())
    } else {
        cmd.run(lesson, &mut input, &mut stdout)
    };
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(output.success))
}

fn run_practice(
    game: &Game,
    mode: Option<&str>,
    lesson: Option<&str>,
    options: &OutputOptions,
) -> CliResult {
    let cmd = PracticeCommand::new(game);
    let output = match mode {
        None => cmd.modes(),
        Some(mode) => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut rng = rand::thread_rng();
            if options.json || options.quiet {
                cmd.run(mode, lesson, &mut rng, &mut input, &mut io::stderr())
            } else {
                cmd.run(mode, lesson, &mut rng, &mut input, &mut io::stdout())
            }
        }
    };
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(output.success))
}

fn run_ask(game: &Game, message: &str, options: &OutputOptions) -> CliResult {
    let transport = match HttpTransport::from_config(&game.config().chat) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(exit_codes::USAGE as u8));
        }
    };

    let mut cmd = AskCommand::for_game(&transport, game);
    let output = if message.trim().is_empty() {
        let stdin = io::stdin();
        cmd.interactive(&mut stdin.lock(), &mut io::stdout())
    } else if options.json || options.quiet {
        cmd.run(message, &mut io::sink())
    } else {
        cmd.run(message, &mut io::stdout())
    };
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(output.success))
}

fn run_reset(game: &mut Game, yes: bool, options: &OutputOptions) -> CliResult {
    let mut cmd = ResetCommand::new(game);
    let output = cmd.run(yes);
    print_formatted(&cmd.format_output(&output, options));
    Ok(success_to_exit_code(output.success))
}
