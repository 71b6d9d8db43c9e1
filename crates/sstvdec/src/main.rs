use std::io;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{info, LevelFilter};

mod app;
mod audio;
mod cli;

use audio::Recording;
use cli::{Args, CliError};

fn main() {
    match sstvdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn sstvdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    if args.list_modes {
        app::list_modes();
        return Ok(());
    }
    if args.list_audio_formats {
        app::list_audio_formats();
        return Ok(());
    }
    if args.list_image_formats {
        app::list_image_formats();
        return Ok(());
    }

    let recording = read_input(&args)?;
    app::run(&args, recording)
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("sstvrx", log_filter)
            .filter_module("sstvdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn read_input(args: &Args) -> Result<Recording, anyhow::Error> {
    if args.input_is_stdin() {
        info!("SSTV decoder reading standard input");
        let stdin = io::stdin();
        if is_terminal(&stdin) {
            return Err(anyhow!(
                "cowardly refusing to read audio samples from a terminal.

Pipe a source of raw uncompressed audio from sox, parec, or
similar into this program, or name an audio file to decode."
            ));
        }
        audio::read_raw(io::BufReader::new(stdin.lock()), args.rate)
    } else {
        info!("SSTV decoder reading file: \"{}\"", &args.input);
        if args.input_is_raw() {
            let file = std::fs::File::open(&args.input)
                .with_context(|| format!("Unable to open input \"{}\"", args.input))?;
            audio::read_raw(io::BufReader::new(file), args.rate)
        } else {
            audio::read_file(&args.input)
                .with_context(|| format!("Unable to decode audio file \"{}\"", args.input))
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
