//! goroprof - inspector for Go goroutine dump profiles.

mod cli;
mod input;
mod output;
#[cfg(feature = "serve")]
mod server;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;

use cli::{Args, Command, OutputFormat, ParseArgs};
use settings::{apply_pins, build_raw_settings, compile_settings, load_collection, SettingsArgs};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("goroprof: error: {e:#}");
            ExitCode::from(66)
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Parse(parse_args) => run_parse(parse_args),
        #[cfg(feature = "serve")]
        Command::Serve(serve_args) => run_serve(serve_args),
    }
}

fn run_parse(args: ParseArgs) -> Result<()> {
    let settings_args = SettingsArgs {
        function_trim: &args.function_trim,
        file_trim: &args.file_trim,
        name_rules: args.name_rules.as_ref(),
        category_rules: args.category_rules.as_ref(),
        archive_path_pattern: args.archive_path_pattern.as_deref(),
    };
    let raw = build_raw_settings(&settings_args)?;
    let settings = compile_settings(&raw);
    let archive_pattern = settings.archive_path_pattern.clone();

    let mut collection =
        load_collection(&args.paths, settings, &archive_pattern).context("Failed to load goroutine dumps")?;

    if let Some(filter) = &args.filter {
        let filter = goro_core::Filter::parse(filter).map_err(|e| anyhow::anyhow!(e))?;
        collection.set_filter(filter);
    }
    apply_pins(&mut collection, &args.pin_category, &args.pin_stack);

    let output_str = match args.format {
        OutputFormat::Table => output::format_table(&collection, true),
        OutputFormat::Json => output::format_json(&collection, args.compact).context("Failed to render JSON")?,
        OutputFormat::Tree => output::format_tree(&collection),
    };

    io::stdout().write_all(output_str.as_bytes()).context("Failed to write to stdout")?;
    if !output_str.ends_with('\n') {
        println!();
    }

    Ok(())
}

#[cfg(feature = "serve")]
fn run_serve(args: cli::ServeArgs) -> Result<()> {
    let settings_args = SettingsArgs {
        function_trim: &args.function_trim,
        file_trim: &args.file_trim,
        name_rules: args.name_rules.as_ref(),
        category_rules: args.category_rules.as_ref(),
        archive_path_pattern: args.archive_path_pattern.as_deref(),
    };
    let raw_settings = build_raw_settings(&settings_args)?;
    // Settings are compiled again (and any warnings printed) inside
    // `AppState::new`; here we only need the archive pattern.
    let (settings, _errors) = goro_core::Settings::compile(&raw_settings);
    let archive_pattern = settings.archive_path_pattern.clone();

    let config = server::ServerConfig {
        paths: args.paths,
        port: args.port,
        raw_settings,
        archive_pattern,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(server::run_server(config))
}
