use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use fontscout_core::matcher::{
    resolve_and_download, resolve_system_fonts, FontInstaller, InstalledFont, StaticCatalog,
};
use fontscout_core::scanner::FileKind;
use fontscout_core::storage::FontOccurrence;
use fontscout_core::{Error, FontMatcher, IndexStore};

fn catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        InstalledFont::new("Arial-BoldMT").with_aliases(["Arial Bold", "Arial"]),
        InstalledFont::new("ArialMT").with_aliases(["Arial"]),
        InstalledFont::new("Futura-Medium").with_aliases(["Futura Medium", "Futura"]),
        InstalledFont::new("Menlo-Regular").with_aliases(["Menlo"]),
    ])
}

fn matcher_for(catalog: &StaticCatalog) -> FontMatcher {
    let matcher = FontMatcher::new(Arc::new(catalog.clone()));
    matcher.refresh().unwrap();
    matcher
}

#[test]
fn test_spelling_variants_match_the_same_font() {
    let matcher = matcher_for(&catalog());

    let expected = matcher.find_best_match("Arial-Bold");
    assert!(expected.exists);
    assert_eq!(expected.real_name.as_deref(), Some("Arial-BoldMT"));

    assert_eq!(matcher.find_best_match("arial bold"), expected);
    assert_eq!(matcher.find_best_match("ARIALBOLD"), expected);
    assert_eq!(matcher.find_best_match("Arial_Bold"), expected);
}

#[test]
fn test_first_alias_registration_wins() {
    let matcher = matcher_for(&catalog());
    // "Arial" is an alias of both faces; the first registration wins.
    let found = matcher.find_best_match("arial");
    assert!(found.exists);
    assert_eq!(found.real_name.as_deref(), Some("Arial-BoldMT"));

    let found = matcher.find_best_match("ArialMT");
    assert_eq!(found.real_name.as_deref(), Some("ArialMT"));
}

#[test]
fn test_style_suffix_is_stripped_once() {
    let matcher = matcher_for(&catalog());

    let found = matcher.find_best_match("Menlo Italic");
    assert!(found.exists);
    assert_eq!(found.real_name.as_deref(), Some("Menlo-Regular"));

    let found = matcher.find_best_match("Futura-Black");
    assert!(found.exists);
    assert_eq!(found.real_name.as_deref(), Some("Futura-Medium"));
}

#[test]
fn test_close_variation_is_only_a_hint() {
    let matcher = matcher_for(&catalog());

    let found = matcher.find_best_match("Futura Condensed ExtraBold");
    assert!(!found.exists);
    assert!(found.is_hint());
    assert_eq!(found.real_name.as_deref(), Some("Futura-Medium"));
}

#[test]
fn test_unknown_font_has_no_hint() {
    let matcher = matcher_for(&catalog());

    let found = matcher.find_best_match("Zapfino");
    assert!(!found.exists);
    assert!(found.real_name.is_none());

    let found = matcher.find_best_match("  ");
    assert!(!found.exists);
    assert!(found.real_name.is_none());
}

#[test]
fn test_short_overlaps_are_not_hints() {
    let matcher = matcher_for(&StaticCatalog::new(vec![InstalledFont::new("Ab")]));
    let found = matcher.find_best_match("Abcdef");
    assert!(found.real_name.is_none());
}

#[test]
fn test_empty_cache_until_refresh() {
    let catalog = catalog();
    let matcher = FontMatcher::new(Arc::new(catalog.clone()));
    assert_eq!(matcher.cached_keys(), 0);
    assert!(!matcher.find_best_match("Menlo").exists);

    assert!(matcher.refresh().unwrap() > 0);
    assert!(matcher.find_best_match("Menlo").exists);
}

#[test]
fn test_refresh_picks_up_new_fonts() {
    let catalog = catalog();
    let matcher = matcher_for(&catalog);
    assert!(!matcher.find_best_match("Gill Sans").exists);

    catalog.add(InstalledFont::new("GillSans").with_aliases(["Gill Sans"]));
    // Stale until refreshed.
    assert!(!matcher.find_best_match("Gill Sans").exists);

    matcher.refresh().unwrap();
    let found = matcher.find_best_match("Gill Sans");
    assert!(found.exists);
    assert_eq!(found.real_name.as_deref(), Some("GillSans"));
}

fn store_with(fonts: &[&str]) -> IndexStore {
    let store = IndexStore::open_in_memory().unwrap();
    let occurrences: Vec<FontOccurrence> = fonts
        .iter()
        .map(|font| FontOccurrence {
            font_name: font.to_string(),
            file_path: format!("/Templates/{}.moti", font),
            file_type: FileKind::Title,
        })
        .collect();
    store.insert_batch(&occurrences).unwrap();
    store
}

#[test]
fn test_resolve_system_fonts_records_every_name() {
    let store = store_with(&["Arial-Bold", "Futura Condensed", "Zapfino", "Arial-Bold"]);
    let matcher = FontMatcher::new(Arc::new(catalog()));
    let cancel = AtomicBool::new(false);

    let summary = resolve_system_fonts(&store, &matcher, &cancel).unwrap();
    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.installed, 1);
    assert_eq!(summary.hinted, 1);

    let hinted = store.system_font_info("Futura Condensed").unwrap().unwrap();
    assert!(!hinted.is_installed);
    assert_eq!(hinted.real_name.as_deref(), Some("Futura-Medium"));

    let rows = store.filtered_summary("").unwrap();
    assert!(rows.iter().all(|row| row.exists_in_system.is_some()));
}

#[test]
fn test_resolve_system_fonts_honours_cancellation() {
    let store = store_with(&["Arial"]);
    let matcher = FontMatcher::new(Arc::new(catalog()));
    let cancel = AtomicBool::new(true);

    let err = resolve_system_fonts(&store, &matcher, &cancel).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(store.system_font_info("Arial").unwrap().is_none());
}

/// Installs into the shared catalog, but reports a fixed claim.
struct FakeInstaller {
    catalog: StaticCatalog,
    installs: bool,
    claim: bool,
}

impl FontInstaller for FakeInstaller {
    fn install(&self, names: &[String]) -> Result<bool, Error> {
        if self.installs {
            for name in names {
                self.catalog.add(InstalledFont::new(name.as_str()));
            }
        }
        Ok(self.claim)
    }
}

struct FailingInstaller;

impl FontInstaller for FailingInstaller {
    fn install(&self, _names: &[String]) -> Result<bool, Error> {
        Err(Error::Other("installer unavailable".to_string()))
    }
}

#[test]
fn test_download_is_verified_not_trusted() {
    let catalog = catalog();
    let matcher = Arc::new(matcher_for(&catalog));
    let store = Arc::new(store_with(&["Didot"]));

    let installer = Arc::new(FakeInstaller {
        catalog: catalog.clone(),
        installs: true,
        claim: false,
    });
    let report = resolve_and_download(matcher, store.clone(), installer, vec!["Didot".to_string()])
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.installer_claimed, Some(false));
    assert_eq!(report.installed, vec!["Didot".to_string()]);
    assert!(report.all_installed());

    let entry = store.system_font_info("Didot").unwrap().unwrap();
    assert!(entry.is_installed);
}

#[test]
fn test_download_claim_without_install_stays_missing() {
    let catalog = catalog();
    let matcher = Arc::new(matcher_for(&catalog));
    let store = Arc::new(store_with(&["Bodoni 72"]));

    let installer = Arc::new(FakeInstaller {
        catalog: catalog.clone(),
        installs: false,
        claim: true,
    });
    let report = resolve_and_download(
        matcher,
        store.clone(),
        installer,
        vec!["Bodoni 72".to_string()],
    )
    .unwrap()
    .wait()
    .unwrap();

    assert_eq!(report.installer_claimed, Some(true));
    assert!(report.installed.is_empty());
    assert_eq!(report.still_missing, vec!["Bodoni 72".to_string()]);
    assert!(!report.all_installed());
    assert!(store.system_font_info("Bodoni 72").unwrap().is_none());
}

#[test]
fn test_download_reports_once_when_installer_fails() {
    let matcher = Arc::new(matcher_for(&catalog()));
    let store = Arc::new(store_with(&["Menlo"]));

    let task = resolve_and_download(
        matcher,
        store,
        Arc::new(FailingInstaller),
        vec!["Menlo".to_string(), "Didot".to_string()],
    )
    .unwrap();
    let report = task.wait().unwrap();
    assert_eq!(report.installer_claimed, None);
    assert_eq!(report.installed, vec!["Menlo".to_string()]);
    assert_eq!(report.still_missing, vec!["Didot".to_string()]);
}

/// Blocks inside `install` until released.
struct GatedInstaller {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl FontInstaller for GatedInstaller {
    fn install(&self, _names: &[String]) -> Result<bool, Error> {
        let _ = self.gate.lock().unwrap().recv();
        Ok(true)
    }
}

#[test]
fn test_download_task_finishes_only_after_verification() {
    let matcher = Arc::new(matcher_for(&catalog()));
    let store = Arc::new(store_with(&["Menlo"]));
    let (release, gate) = mpsc::channel();

    let task = resolve_and_download(
        matcher,
        store.clone(),
        Arc::new(GatedInstaller {
            gate: Mutex::new(gate),
        }),
        vec!["Menlo".to_string()],
    )
    .unwrap();

    thread::sleep(Duration::from_millis(20));
    assert!(!task.is_finished());
    assert!(store.system_font_info("Menlo").unwrap().is_none());

    release.send(()).unwrap();
    let report = task.wait().unwrap();
    assert!(report.all_installed());

    // Everything the task wrote is in place, so a following clear is final.
    assert!(store.system_font_info("Menlo").unwrap().unwrap().is_installed);
    store.clear().unwrap();
    assert!(store.system_font_info("Menlo").unwrap().is_none());
}
