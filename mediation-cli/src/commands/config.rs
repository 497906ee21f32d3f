//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::Path;

use clap::Subcommand;
use mediation::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective settings (file values over defaults)
    Show,

    /// Write a configuration file with default settings if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init => run_init(),
    }
}

fn run_path() -> Result<(), CliError> {
    let path = config_file_path()?;
    println!("{}", path.display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    print!("{}", show_from(&config_file_path()?)?);
    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let path = config_file_path()?;
    if !init_at(&path)? {
        println!("Configuration file already exists: {}", path.display());
        return Ok(());
    }

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize mediation settings.");
    Ok(())
}

/// Effective settings for the file at `path`, defaults if it is absent.
fn show_from(path: &Path) -> Result<String, CliError> {
    let config = if path.exists() {
        ConfigFile::load_from(path)?
    } else {
        ConfigFile::default()
    };
    render(&config)
}

/// Write default settings to `path`. Returns `false` if a file is already
/// there, which is left untouched.
fn init_at(path: &Path) -> Result<bool, CliError> {
    if path.exists() {
        return Ok(false);
    }
    ConfigFile::default().save_to(path)?;
    Ok(true)
}

/// Render settings in INI syntax.
fn render(config: &ConfigFile) -> Result<String, CliError> {
    let mut buf = Vec::new();
    config
        .to_ini()
        .write_to(&mut buf)
        .map_err(|e| CliError::Output(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| CliError::Output(e.to_string()))
}
