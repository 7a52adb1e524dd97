//! Interactive source folder selection.
//!
//! Used when `darkroom run` is invoked without a source path. The prompt
//! yields the chosen folder, or `None` when the user enters nothing, presses
//! Esc or hits Ctrl+C.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use std::path::PathBuf;

const PROMPT: &str = "Folder to convert (empty to cancel)";

/// Prompt theme: a yellow `?` ahead of the question, defaults otherwise.
fn prompt_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().yellow(),
        ..ColorfulTheme::default()
    }
}

/// One line naming the tool and the folder it expects.
fn header() -> String {
    format!(
        "Darkroom v{}: choose a folder of RAW or JPEG files",
        darkroom_core::VERSION
    )
}

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Turn raw prompt input into a folder path, with `~` expanded.
///
/// Blank input means no selection.
pub fn parse_selection(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(shellexpand::tilde(trimmed).into_owned()))
}

/// Ask for a source folder until the answer is an existing directory or the
/// user gives up.
pub fn pick_folder() -> anyhow::Result<Option<PathBuf>> {
    eprintln!("{}", Style::new().for_stderr().bold().apply_to(header()));
    let theme = prompt_theme();

    loop {
        let Some(raw) = handle_interrupt(
            Input::<String>::with_theme(&theme)
                .with_prompt(PROMPT)
                .allow_empty(true)
                .interact_text(),
        )?
        else {
            return Ok(None);
        };

        let Some(path) = parse_selection(&raw) else {
            return Ok(None);
        };

        if path.is_dir() {
            return Ok(Some(path));
        }

        let warn = Style::new().for_stderr().yellow();
        eprintln!(
            "  {}",
            warn.apply_to(format!("Not a folder: {}", path.display()))
        );
    }
}
