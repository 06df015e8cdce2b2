//! Interactive terminal prompts
//!
//! Plain stdin/stdout prompts used by the download flow: numbered
//! selection menus, yes/no confirmations, and credential entry. All
//! prompting lives here; the core modules never touch the terminal.

use std::io::{self, Write};

use crate::errors::{AppError, Result};

/// Read one trimmed line from stdin after printing a prompt
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Prompt for a non-empty value, re-asking until one is given
pub fn read_required(prompt: &str) -> Result<String> {
    loop {
        let value = read_line(prompt)?;
        if !value.is_empty() {
            return Ok(value);
        }
        println!("A value is required.");
    }
}

/// Prompt for a password without echoing it
pub fn read_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)
        .map_err(|e| AppError::generic(format!("Could not read password: {e}")))?;
    if password.is_empty() {
        return Err(AppError::generic("Password cannot be empty"));
    }
    Ok(password)
}

/// Ask a yes/no question; `default_yes` decides what a bare Enter means
pub fn confirm(question: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    let answer = read_line(&format!("{question} {hint} "))?;

    if answer.is_empty() {
        return Ok(default_yes);
    }
    Ok(answer.to_lowercase().starts_with('y'))
}

/// Numbered single-choice menu; returns the selected index
pub fn select_one<T, F>(title: &str, items: &[T], describe: F) -> Result<usize>
where
    F: Fn(&T) -> String,
{
    println!("\n{title}");
    for (i, item) in items.iter().enumerate() {
        println!("  {}. {}", i + 1, describe(item));
    }

    loop {
        let answer = read_line(&format!("Choice [1-{}]: ", items.len()))?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=items.len()).contains(&n) => return Ok(n - 1),
            _ => println!("Please enter a number between 1 and {}.", items.len()),
        }
    }
}

/// Numbered multi-choice menu; accepts comma-separated numbers or "all"
///
/// Returns the selected indices in the order given, duplicates removed.
pub fn select_many<T, F>(title: &str, items: &[T], describe: F) -> Result<Vec<usize>>
where
    F: Fn(&T) -> String,
{
    println!("\n{title}");
    for (i, item) in items.iter().enumerate() {
        println!("  {}. {}", i + 1, describe(item));
    }

    loop {
        let answer = read_line(&format!(
            "Choices [1-{}, comma separated, or 'all']: ",
            items.len()
        ))?;

        if answer.eq_ignore_ascii_case("all") {
            return Ok((0..items.len()).collect());
        }

        match parse_selection(&answer, items.len()) {
            Some(indices) if !indices.is_empty() => return Ok(indices),
            _ => println!("Please enter numbers between 1 and {}.", items.len()),
        }
    }
}

/// Parse "1,3,4" into zero-based indices, rejecting anything out of range
fn parse_selection(answer: &str, len: usize) -> Option<Vec<usize>> {
    let mut indices = Vec::new();
    for part in answer.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let n = part.parse::<usize>().ok()?;
        if !(1..=len).contains(&n) {
            return None;
        }
        if !indices.contains(&(n - 1)) {
            indices.push(n - 1);
        }
    }
    Some(indices)
}
