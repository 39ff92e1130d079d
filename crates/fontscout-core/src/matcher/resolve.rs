use super::FontMatcher;
use crate::error::Error;
use crate::storage::IndexStore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub resolved: usize,
    pub installed: usize,
    pub hinted: usize,
}

/// Refresh the matcher and record the installation status of every
/// distinct font name in the store's side table.
pub fn resolve_system_fonts(
    store: &IndexStore,
    matcher: &FontMatcher,
    cancel: &AtomicBool,
) -> Result<ResolutionSummary, Error> {
    matcher.refresh()?;
    let names = store.distinct_font_names()?;
    let mut summary = ResolutionSummary::default();

    for name in &names {
        if cancel.load(Ordering::Relaxed) {
            debug!("Resolution pass cancelled after {} fonts", summary.resolved);
            return Err(Error::Cancelled);
        }

        let found = matcher.find_best_match(name);
        store.update_system_font_info(name, found.exists, found.real_name.as_deref())?;

        summary.resolved += 1;
        if found.exists {
            summary.installed += 1;
        } else if found.is_hint() {
            summary.hinted += 1;
        }
    }

    info!(
        "Resolved {} fonts: {} installed, {} close variations",
        summary.resolved, summary.installed, summary.hinted
    );
    Ok(summary)
}

/// Platform hook that asks the host to install fonts.
pub trait FontInstaller: Send + Sync {
    /// Request installation of `names`. The returned flag is the platform's
    /// own claim and is only logged.
    fn install(&self, names: &[String]) -> Result<bool, Error>;
}

/// Outcome of a download request, verified against the refreshed matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub installed: Vec<String>,
    pub still_missing: Vec<String>,
    pub installer_claimed: Option<bool>,
}

impl DownloadReport {
    pub fn all_installed(&self) -> bool {
        self.still_missing.is_empty()
    }
}

/// A download verification running on its own thread.
///
/// A new scan clears the table this task writes to, so wait on the task
/// before rescanning.
pub struct DownloadTask {
    report: mpsc::Receiver<DownloadReport>,
    worker: JoinHandle<()>,
}

impl DownloadTask {
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Block for the single report and join the worker. Every store write
    /// made by the task has landed once this returns.
    pub fn wait(self) -> Result<DownloadReport, Error> {
        let received = self.report.recv();
        if self.worker.join().is_err() {
            return Err(Error::Other("download worker panicked".to_string()));
        }
        received.map_err(|_| Error::Other("download worker exited without a report".to_string()))
    }
}

/// Ask `installer` for `names` on a background thread that produces exactly
/// one [`DownloadReport`].
///
/// A font only counts as installed if the matcher resolves it after a
/// refresh; verified fonts are written back to the store.
pub fn resolve_and_download(
    matcher: Arc<FontMatcher>,
    store: Arc<IndexStore>,
    installer: Arc<dyn FontInstaller>,
    names: Vec<String>,
) -> Result<DownloadTask, Error> {
    let (tx, rx) = mpsc::sync_channel(1);

    let worker = thread::Builder::new()
        .name("fontscout-download".to_string())
        .spawn(move || {
            let installer_claimed = match installer.install(&names) {
                Ok(claimed) => Some(claimed),
                Err(err) => {
                    warn!("Font installer failed: {}", err);
                    None
                }
            };

            if let Err(err) = matcher.refresh() {
                warn!("Could not refresh font catalog after install: {}", err);
            }

            let mut report = DownloadReport {
                installer_claimed,
                ..DownloadReport::default()
            };
            for name in names {
                let found = matcher.find_best_match(&name);
                if found.exists {
                    if let Err(err) =
                        store.update_system_font_info(&name, true, found.real_name.as_deref())
                    {
                        warn!("Could not record installed font {}: {}", name, err);
                    }
                    report.installed.push(name);
                } else {
                    report.still_missing.push(name);
                }
            }

            debug!(
                "Download verified: {} installed, {} still missing (installer claimed {:?})",
                report.installed.len(),
                report.still_missing.len(),
                report.installer_claimed
            );
            let _ = tx.send(report);
        })?;

    Ok(DownloadTask { report: rx, worker })
}
