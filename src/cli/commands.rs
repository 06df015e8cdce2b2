//! Command handlers for P1Doks Fetcher CLI
//!
//! Coordinates between CLI arguments, the interactive prompts, and the
//! core application modules. All process-exit decisions stay in `main.rs`;
//! handlers return errors and let the caller decide.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{Datelike, Local};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::{
    group_by_class, resolve, schedule, CatalogClient, DataPack, DownloadContext,
    ReferenceMapping, Series, SetupOrganizer,
};
use crate::auth::Session;
use crate::cli::prompts;
use crate::cli::{AuthAction, AuthArgs, DownloadArgs, MappingsAction, MappingsArgs};
use crate::constants::{env, limits};
use crate::errors::{AppError, AuthError, Result};
use crate::preferences::{Preferences, PreferencesStore};

/// Handle the download command
///
/// The main flow: establish a session, pick week/series/cars, then
/// download and organize everything selected. A terminal session expiry
/// clears the saved session so the next run starts clean.
pub async fn handle_download(args: DownloadArgs) -> Result<()> {
    let store = PreferencesStore::new();

    let result = run_download(&args, &store).await;
    if let Err(e) = &result {
        if e.is_session_expired() {
            clear_expired_session(&store);
        }
    }
    result
}

/// Drop the saved session after a terminal expiry
///
/// A failed delete is only logged; the expiry itself is what the caller
/// reports.
fn clear_expired_session(store: &PreferencesStore) {
    warn!("Session expired terminally, clearing saved session");
    if let Err(e) = store.clear() {
        warn!(error = %e, "Could not clear the saved session file");
    }
    println!("\nYour session has expired. Please run again and sign in.");
}

async fn run_download(args: &DownloadArgs, store: &PreferencesStore) -> Result<()> {
    let (session, saved_setups_path) = establish_session(store).await?;
    let (setups_path, persisted_setups_path) =
        effective_setups_paths(args.setups_path.clone(), saved_setups_path);

    if !setups_path.exists() {
        return Err(AppError::generic(format!(
            "Setups directory does not exist: {}",
            setups_path.display()
        )));
    }

    // Persist the (possibly rotated) refresh token for the next run
    if let Some(tokens) = session.tokens() {
        store.save(&Preferences {
            username: session.username().to_string(),
            refresh_token: tokens.refresh_token.clone(),
            setups_path: persisted_setups_path,
        })?;
    }

    let today = Local::now().date_naive();
    let current_week = schedule::current_week(today);
    let season = schedule::current_season(today);
    println!("\nCurrent iRacing week: {current_week}, season: {season}");

    let week = match args.week {
        Some(week) => week,
        None => select_week(current_week)?,
    };

    let mut client = CatalogClient::new(session)?;

    let available = client.fetch_available_series(week, season).await?;
    if available.is_empty() {
        println!("\nNo series found for week {week}, season {season}.");
        return Ok(());
    }

    let series = match &args.series {
        Some(name) => available
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| {
                AppError::generic(format!(
                    "Series '{name}' has no setups for week {week} (available: {})",
                    available
                        .iter()
                        .map(|s| s.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?,
        None => select_series(&available)?,
    };

    let packs = client.fetch_data_packs(&series.name, week, season).await?;
    if packs.is_empty() {
        println!("\nNo datapacks found for {} in week {week}.", series.name);
        return Ok(());
    }

    let selected = select_packs(&packs, &series, args.yes)?;
    if selected.is_empty() {
        println!("\nNo cars selected.");
        return Ok(());
    }

    if !args.yes && !prompts::confirm(&format!("Download {} datapack(s)?", selected.len()), true)? {
        println!("\nDownload cancelled.");
        return Ok(());
    }

    let context = DownloadContext {
        track: series.track.clone(),
        series: series.name.clone(),
        season,
        week,
        year: today.year(),
    };

    let organizer = SetupOrganizer::new(&setups_path);
    let bar = download_progress_bar(selected.len() as u64);

    let mut saved = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    for pack in &selected {
        bar.set_message(pack.car.clone());
        let outcomes = organizer
            .download_all(&mut client, std::slice::from_ref(pack), &context)
            .await?;
        for outcome in outcomes {
            saved += outcome.saved.len();
            failed += outcome.failed;
            if outcome.skipped {
                skipped += 1;
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!("\nDone. {saved} setup file(s) saved under {}.", setups_path.display());
    if skipped > 0 {
        println!("{skipped} pack(s) skipped (not in subscription).");
    }
    if failed > 0 {
        println!("{failed} file(s) failed; see the log for details.");
    }

    Ok(())
}

/// Handle the auth command
pub async fn handle_auth(args: AuthArgs) -> Result<()> {
    let store = PreferencesStore::new();

    match args.action {
        AuthAction::Login => {
            let username = match std::env::var(env::USERNAME) {
                Ok(u) => u,
                Err(_) => prompts::read_required("P1Doks username: ")?,
            };
            let password = match std::env::var(env::PASSWORD) {
                Ok(p) => p,
                Err(_) => prompts::read_password("P1Doks password: ")?,
            };
            let setups_path = ask_setups_path(store.load().map(|p| p.setups_path))?;

            let mut session = Session::with_password(&username, password)?;
            let tokens = session.authenticate().await?;

            store.save(&Preferences {
                username,
                refresh_token: tokens.refresh_token,
                setups_path,
            })?;
            println!("Signed in. Session saved to {}.", store.path().display());
            Ok(())
        }
        AuthAction::Status => {
            match store.load() {
                Some(prefs) => {
                    println!("Signed in as: {}", prefs.username);
                    println!("Setups path:  {}", prefs.setups_path.display());
                    println!("Session file: {}", store.path().display());
                }
                None => println!("No saved session. Run 'p1doks_fetcher auth login'."),
            }
            Ok(())
        }
        AuthAction::Logout => {
            store.clear()?;
            println!("Saved session cleared.");
            Ok(())
        }
    }
}

/// Generated override mapping file, shaped for manual review
#[derive(Debug, Serialize)]
struct GeneratedMapping {
    description: String,
    note: String,
    generated_from: GeneratedFrom,
    mappings: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct GeneratedFrom {
    week: u32,
    season: u32,
    series_count: usize,
    total_cars: usize,
}

/// Handle the mappings command
pub async fn handle_mappings(args: MappingsArgs) -> Result<()> {
    match args.action {
        MappingsAction::Generate { output } => generate_mappings(output).await,
        MappingsAction::Resolve { name } => {
            let resolution = resolve(&name, &ReferenceMapping::builtin());
            match resolution.matched_name {
                Some(matched) => {
                    println!("{name} -> {} (matched '{matched}')", resolution.folder)
                }
                None => println!("{name} -> {} (no match, sanitized)", resolution.folder),
            }
            Ok(())
        }
    }
}

/// Scan every series in the current week and regenerate the override
/// mapping from the car names actually in the catalog
async fn generate_mappings(output: PathBuf) -> Result<()> {
    let store = PreferencesStore::new();
    let (session, setups_path) = establish_session(&store).await?;

    // Keep the saved session current if the refresh token was rotated
    if let Some(tokens) = session.tokens() {
        store.save(&Preferences {
            username: session.username().to_string(),
            refresh_token: tokens.refresh_token.clone(),
            setups_path,
        })?;
    }

    let mut client = CatalogClient::new(session)?;

    let today = Local::now().date_naive();
    let week = schedule::current_week(today);
    let season = schedule::current_season(today);
    println!("Scanning catalog for week {week}, season {season}...");

    let available = client.fetch_available_series(week, season).await?;
    println!("Found {} series", available.len());

    let mut cars: BTreeSet<String> = BTreeSet::new();
    for series in &available {
        match client.fetch_data_packs(&series.name, week, season).await {
            Ok(packs) => {
                info!(series = %series.name, count = packs.len(), "Scanned series");
                cars.extend(packs.into_iter().map(|p| p.car));
            }
            Err(e) => {
                // One unreadable series should not sink the whole scan
                warn!(series = %series.name, error = %e, "Skipping series");
            }
        }
        tokio::time::sleep(limits::MAPPING_SCAN_PACING).await;
    }
    println!("Found {} unique car names", cars.len());

    let base = ReferenceMapping::builtin_base();
    let mut mappings = std::collections::BTreeMap::new();
    let mut unmatched = Vec::new();
    for car in &cars {
        let resolution = resolve(car, &base);
        if !resolution.matched {
            unmatched.push(car.clone());
        }
        mappings.insert(car.clone(), resolution.folder);
    }

    let generated = GeneratedMapping {
        description: "P1Doks car name to iRacing folder path overrides".to_string(),
        note: "Keys are car names as they appear in the P1Doks API; review unmatched entries"
            .to_string(),
        generated_from: GeneratedFrom {
            week,
            season,
            series_count: available.len(),
            total_cars: cars.len(),
        },
        mappings,
    };

    let contents = serde_json::to_string_pretty(&generated)
        .map_err(|e| AppError::generic(format!("Could not serialize mappings: {e}")))?;
    std::fs::write(&output, contents)?;
    println!("Mappings written to {}", output.display());

    if unmatched.is_empty() {
        println!("All car names matched the base mapping.");
    } else {
        println!("\n{} name(s) had no match (sanitized fallback used):", unmatched.len());
        for car in &unmatched {
            println!("  - {car}");
        }
        println!("Please review these entries before using the file.");
    }

    Ok(())
}

/// Establish an authenticated session from saved state, `.env`, or prompts
///
/// Returns the session together with the setups directory it was paired
/// with. A rejected refresh drops to a password prompt for the same user.
async fn establish_session(store: &PreferencesStore) -> Result<(Session, PathBuf)> {
    // Saved session first
    if let Some(prefs) = store.load() {
        println!("Using saved session for {}", prefs.username);
        let mut session = Session::with_refresh_token(&prefs.username, &prefs.refresh_token)?;

        match session.authenticate().await {
            Ok(_) => return Ok((session, prefs.setups_path)),
            Err(AuthError::RefreshExpired) => {
                println!("\nSession expired, please sign in again.");
                let password = prompts::read_password("P1Doks password: ")?;
                session.supply_password(password);
                session.authenticate().await?;
                return Ok((session, prefs.setups_path));
            }
            Err(e) => return Err(e.into()),
        }
    }

    // .env fallback for development
    if let (Ok(username), Ok(password), Ok(setups_path)) = (
        std::env::var(env::USERNAME),
        std::env::var(env::PASSWORD),
        std::env::var(env::SETUPS_PATH),
    ) {
        println!("Using credentials from environment");
        let mut session = Session::with_password(&username, password)?;
        session.authenticate().await?;
        return Ok((session, PathBuf::from(setups_path)));
    }

    // First run: ask for everything
    println!("\nNo saved session found.");
    let username = prompts::read_required("P1Doks username: ")?;
    let password = prompts::read_password("P1Doks password: ")?;
    let setups_path = ask_setups_path(None)?;

    let mut session = Session::with_password(&username, password)?;
    session.authenticate().await?;
    println!("Signed in.");

    Ok((session, setups_path))
}

/// Setups directory for this run and the one to persist
///
/// `--setups-path` overrides the directory for the current run only; the
/// saved preference keeps the session's own path.
fn effective_setups_paths(
    override_path: Option<PathBuf>,
    saved_path: PathBuf,
) -> (PathBuf, PathBuf) {
    match override_path {
        Some(path) => (path, saved_path),
        None => (saved_path.clone(), saved_path),
    }
}

/// Ask for the iRacing setups directory, offering the previous value
fn ask_setups_path(previous: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(previous) = previous {
        if prompts::confirm(
            &format!("Keep setups directory {}?", previous.display()),
            true,
        )? {
            return Ok(previous);
        }
    }

    loop {
        let answer = prompts::read_required("iRacing setups directory: ")?;
        let path = PathBuf::from(answer);
        if path.exists() {
            return Ok(path);
        }
        println!("That directory does not exist, please try again.");
    }
}

/// Choose between the current and the next race week
fn select_week(current_week: u32) -> Result<u32> {
    let next = schedule::next_week(current_week);
    let options = [
        format!("Current week (week {current_week})"),
        format!("Next week (week {next})"),
    ];
    let choice = prompts::select_one("Select week:", &options, |s| s.clone())?;
    Ok(if choice == 0 { current_week } else { next })
}

/// Choose a series from the ones that have setups this week
fn select_series(available: &[Series]) -> Result<Series> {
    let choice = prompts::select_one("Select racing series:", available, |s| {
        format!("{} ({})", s.name, s.track)
    })?;
    Ok(available[choice].clone())
}

/// Choose which datapacks to download, grouped by car class
///
/// With `--yes` every pack included in the subscription is selected.
fn select_packs(packs: &[DataPack], series: &Series, yes: bool) -> Result<Vec<DataPack>> {
    if yes {
        return Ok(packs.iter().filter(|p| p.included).cloned().collect());
    }

    println!("\nTrack: {}", series.track);

    // Flatten the class groups into one numbered list
    let grouped = group_by_class(packs);
    let ordered: Vec<&DataPack> = grouped.into_iter().flat_map(|(_, members)| members).collect();

    let indices = prompts::select_many("Select cars to download:", &ordered, |pack| {
        let marker = if pack.included { "+" } else { "- (not in subscription)" };
        let lap_time = pack.lap_time.as_deref().unwrap_or("no lap time");
        format!("[{}] {} - {} {}", pack.car_class, pack.car, lap_time, marker)
    })?;

    let mut selected = Vec::new();
    for index in indices {
        let pack = ordered[index];
        if !pack.included {
            println!("Skipping {} (not in subscription)", pack.car);
            continue;
        }
        selected.push(pack.clone());
    }
    Ok(selected)
}

/// Progress bar over the selected datapacks
fn download_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::app::CarClass;

    fn pack(car: &str, class: CarClass, included: bool) -> DataPack {
        DataPack {
            id: car.to_string(),
            car: car.to_string(),
            lap_time: Some("1:42.0".to_string()),
            track: None,
            author: None,
            included,
            car_class: class,
            lap_count: None,
        }
    }

    #[test]
    fn test_setups_path_override_is_not_persisted() {
        let saved = PathBuf::from("/sim/iracing/setups");

        let (run, persisted) =
            effective_setups_paths(Some(PathBuf::from("/tmp/elsewhere")), saved.clone());
        assert_eq!(run, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(persisted, saved);

        let (run, persisted) = effective_setups_paths(None, saved.clone());
        assert_eq!(run, saved);
        assert_eq!(persisted, saved);
    }

    #[test]
    fn test_clear_expired_session_tolerates_failing_clear() {
        // A directory at the preference path makes the delete fail
        let dir = tempfile::TempDir::new().unwrap();
        let store = PreferencesStore::at(dir.path());
        assert!(store.clear().is_err());

        // Must not panic or surface the delete failure
        clear_expired_session(&store);
    }

    #[test]
    fn test_select_packs_yes_takes_included_only() {
        let series = Series {
            name: "IMSA".to_string(),
            track: "Sebring".to_string(),
        };
        let packs = vec![
            pack("Porsche 963 GTP", CarClass::Gtp, true),
            pack("Ferrari 296 GT3", CarClass::Gt3, false),
            pack("BMW M4 GT3", CarClass::Gt3, true),
        ];

        let selected = select_packs(&packs, &series, true).unwrap();
        let cars: Vec<&str> = selected.iter().map(|p| p.car.as_str()).collect();
        assert_eq!(cars, vec!["Porsche 963 GTP", "BMW M4 GT3"]);
    }
}
