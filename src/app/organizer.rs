//! Download orchestration and setup file organization
//!
//! Drives the sequential download loop over a selection of datapacks and
//! files each setup under the iRacing folder layout:
//!
//! ```text
//! {setups_root}/{car_folder}/p1doks/{year}_S{ss}_W{ww}_{Track}_{Series}/{file}
//! ```
//!
//! The season/week pair is zero-padded so folders sort chronologically.
//! Files are written atomically (temp file, then rename) so an interrupted
//! run never leaves a half-written setup behind.

use std::path::{Path, PathBuf};

use tokio::time::sleep;

use crate::auth::IdentityProvider;
use crate::constants::{files, limits};
use crate::errors::{DownloadError, DownloadResult};

use super::client::CatalogClient;
use super::mapping::{resolve, ReferenceMapping};
use super::models::{DataPack, DownloadContext, SetupFile};

/// Outcome for one datapack in a download run
#[derive(Debug)]
pub struct PackOutcome {
    /// Car name of the pack this outcome belongs to
    pub car: String,
    /// Paths of the setups written, relative to the setups root
    pub saved: Vec<PathBuf>,
    /// Files that could not be fetched or written
    pub failed: usize,
    /// True when the pack was skipped (not in the subscription)
    pub skipped: bool,
}

impl PackOutcome {
    fn skipped(car: &str) -> Self {
        Self {
            car: car.to_string(),
            saved: Vec::new(),
            failed: 0,
            skipped: true,
        }
    }
}

/// Files downloaded setups under the iRacing setups directory
#[derive(Debug)]
pub struct SetupOrganizer {
    setups_root: PathBuf,
    mapping: ReferenceMapping,
}

impl SetupOrganizer {
    pub fn new(setups_root: impl Into<PathBuf>) -> Self {
        Self {
            setups_root: setups_root.into(),
            mapping: ReferenceMapping::builtin(),
        }
    }

    /// Override the mapping (tests use small fixtures)
    pub fn with_mapping(setups_root: impl Into<PathBuf>, mapping: ReferenceMapping) -> Self {
        Self {
            setups_root: setups_root.into(),
            mapping,
        }
    }

    /// Download and organize a selection of datapacks, one at a time
    ///
    /// Packs outside the subscription are skipped. Per-file failures are
    /// logged and counted but never abort the run; session expiry inside
    /// the catalog client does, since nothing further can succeed.
    pub async fn download_all<P: IdentityProvider>(
        &self,
        client: &mut CatalogClient<P>,
        packs: &[DataPack],
        context: &DownloadContext,
    ) -> crate::errors::Result<Vec<PackOutcome>> {
        let mut outcomes = Vec::with_capacity(packs.len());

        for pack in packs {
            if !pack.included {
                tracing::info!(car = %pack.car, "Skipping pack not included in subscription");
                outcomes.push(PackOutcome::skipped(&pack.car));
                continue;
            }

            outcomes.push(self.download_pack(client, pack, context).await?);

            // Cooperative pacing between packs
            sleep(limits::DOWNLOAD_PACING).await;
        }

        Ok(outcomes)
    }

    /// Download every setup file in one pack into its target folder
    async fn download_pack<P: IdentityProvider>(
        &self,
        client: &mut CatalogClient<P>,
        pack: &DataPack,
        context: &DownloadContext,
    ) -> crate::errors::Result<PackOutcome> {
        let target_dir = self.target_dir(&pack.car, context);
        let files = client.data_pack_files(&pack.id).await?;
        tracing::info!(car = %pack.car, count = files.len(), "Downloading pack");

        let mut outcome = PackOutcome {
            car: pack.car.clone(),
            saved: Vec::new(),
            failed: 0,
            skipped: false,
        };

        for file in &files {
            match self.fetch_one(client, &pack.id, file, &target_dir).await {
                Ok(path) => {
                    let relative = path
                        .strip_prefix(&self.setups_root)
                        .map(Path::to_path_buf)
                        .unwrap_or(path);
                    tracing::info!(file = %relative.display(), "Saved setup");
                    outcome.saved.push(relative);
                }
                Err(e) => {
                    // An expired session dooms every remaining file
                    if e.is_session_expired() {
                        return Err(e);
                    }
                    tracing::warn!(file = %file.filename, error = %e, "Setup file failed, continuing");
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Fetch one setup file and write it atomically
    async fn fetch_one<P: IdentityProvider>(
        &self,
        client: &mut CatalogClient<P>,
        pack_id: &str,
        file: &SetupFile,
        target_dir: &Path,
    ) -> crate::errors::Result<PathBuf> {
        let signed_url = client.signed_download_url(pack_id, file).await?;
        let bytes = client.fetch_signed(&signed_url).await?;

        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(DownloadError::Io)?;
        let final_path = target_dir.join(&file.filename);
        write_atomic(&final_path, &bytes).await?;
        Ok(final_path)
    }

    /// Target directory for one car within a download context
    pub fn target_dir(&self, car: &str, context: &DownloadContext) -> PathBuf {
        let resolution = resolve(car, &self.mapping);
        if !resolution.matched {
            tracing::warn!(
                car,
                folder = %resolution.folder,
                "No mapping entry for car, using sanitized folder name"
            );
        }

        self.setups_root
            .join(&resolution.folder)
            .join(files::VENDOR_SUBDIR)
            .join(subfolder_name(context))
    }
}

/// Context subfolder, ordered so newer setups sort after older ones
fn subfolder_name(context: &DownloadContext) -> String {
    format!(
        "{}_S{:02}_W{:02}_{}_{}",
        context.year,
        context.season,
        context.week,
        sanitize_path_component(&context.track),
        sanitize_path_component(&context.series),
    )
}

/// Restrict a name to `[A-Za-z0-9_-]`, collapsing whitespace runs to `_`
fn sanitize_path_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    let mut in_whitespace = false;
    for c in cleaned.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}

/// Write bytes to a temp file next to the target, then rename into place
async fn write_atomic(final_path: &Path, bytes: &[u8]) -> DownloadResult<()> {
    let mut temp_name = final_path.as_os_str().to_owned();
    temp_name.push(files::TEMP_FILE_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    tokio::fs::write(&temp_path, bytes).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, final_path).await {
        // Best effort cleanup of the orphaned temp file
        let _ = tokio::fs::remove_file(&temp_path).await;
        tracing::debug!(error = %e, "Rename into place failed");
        return Err(DownloadError::AtomicOperationFailed {
            temp_path,
            final_path: final_path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn context() -> DownloadContext {
        DownloadContext {
            track: "Watkins Glen (Boot)".to_string(),
            series: "VRS GT  Sprint".to_string(),
            season: 4,
            week: 3,
            year: 2025,
        }
    }

    fn mapping() -> ReferenceMapping {
        ReferenceMapping::new(vec![(
            "Ferrari 296 GT3".to_string(),
            "ferrari296gt3".to_string(),
        )])
    }

    #[test]
    fn test_target_dir_layout() {
        let organizer = SetupOrganizer::with_mapping("/setups", mapping());
        let dir = organizer.target_dir("Ferrari 296 GT3", &context());
        assert_eq!(
            dir,
            PathBuf::from("/setups/ferrari296gt3/p1doks/2025_S04_W03_Watkins_Glen_Boot_VRS_GT_Sprint")
        );
    }

    #[test]
    fn test_target_dir_unmatched_car_uses_sanitized_fallback() {
        let organizer = SetupOrganizer::with_mapping("/setups", mapping());
        let dir = organizer.target_dir("Some Unlisted Car!", &context());
        assert!(dir.starts_with("/setups/someunlistedcar"));
    }

    #[test]
    fn test_sanitize_path_component() {
        assert_eq!(sanitize_path_component("Watkins Glen (Boot)"), "Watkins_Glen_Boot");
        assert_eq!(sanitize_path_component("  Spa-Francorchamps  "), "Spa-Francorchamps");
        assert_eq!(sanitize_path_component("A  B\tC"), "A_B_C");
    }

    #[test]
    fn test_subfolder_name_zero_pads() {
        let name = subfolder_name(&DownloadContext {
            track: "Monza".to_string(),
            series: "IMSA".to_string(),
            season: 1,
            week: 9,
            year: 2026,
        });
        assert_eq!(name, "2026_S01_W09_Monza_IMSA");
    }

    #[tokio::test]
    async fn test_write_atomic_creates_final_file_only() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("quali.sto");

        write_atomic(&target, b"contents").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"contents");
        // No temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != target)
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_write_atomic_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("race.sto");

        write_atomic(&target, b"old").await.unwrap();
        write_atomic(&target, b"new").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }
}
