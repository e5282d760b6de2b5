//! Top-level entry point: options, every content source in order, then
//! finalization.
//!
//! ```text
//! data/
//!   options.ron         optional
//!   core/**/*.json      one directory per content source
//!   mod_a/**/*.ron
//! ```

use std::path::Path;
use stockpile_core::catalog::{BuildReport, Catalog};
use stockpile_core::id::ContentSource;
use stockpile_core::use_action::UseActionRegistry;

use crate::config::{OptionsError, load_options};
use crate::content::{ContentLoader, LoadReport};
use crate::loader::LoadError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A finalized catalog plus what loading and finalizing it reported.
#[derive(Debug)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub load: LoadReport,
    pub build: BuildReport,
}

impl LoadedCatalog {
    /// No record errors and no build diagnostics.
    pub fn is_clean(&self) -> bool {
        self.load.is_clean() && self.build.diagnostics.is_empty()
    }
}

/// Load `sources` (subdirectories of `root`, in load order) and finalize.
///
/// A record that fails is reported in [`LoadedCatalog::load`] and skipped;
/// only unreadable files and bad options abort the build.
pub fn load_catalog(root: &Path, sources: &[&str]) -> Result<LoadedCatalog, BuildError> {
    let options = load_options(root)?;
    let mut catalog = Catalog::new(options, UseActionRegistry::builtin());

    let mut loader = ContentLoader::new(&mut catalog);
    for name in sources {
        loader.load_dir(&ContentSource::new(*name), &root.join(name))?;
    }
    let load = loader.finish()?;

    let build = catalog.finalize().map_err(LoadError::from)?;
    log::info!(
        "catalog ready: {} archetypes, {} record errors, {} diagnostics",
        build.archetypes,
        load.errors.len(),
        build.diagnostics.len()
    );
    Ok(LoadedCatalog {
        catalog,
        load,
        build,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use stockpile_core::id::ItypeId;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stockpile_pipeline_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let root = make_test_dir("override");
        fs::create_dir_all(root.join("core")).unwrap();
        fs::create_dir_all(root.join("mod_a")).unwrap();
        fs::write(
            root.join("core/items.json"),
            r#"[{"type": "GENERIC", "id": "rock", "weight": 100}]"#,
        )
        .unwrap();
        fs::write(
            root.join("mod_a/items.ron"),
            r#"[{"type": "GENERIC", "id": "rock", "copy-from": "rock", "weight": 300}]"#,
        )
        .unwrap();

        let loaded = load_catalog(&root, &["core", "mod_a"]).unwrap();
        assert!(loaded.load.is_clean(), "{:?}", loaded.load.errors);
        let rock = loaded.catalog.lookup(&ItypeId::new("rock")).unwrap();
        assert_eq!(rock.weight.0, 300);
        assert_eq!(rock.src.len(), 2);
        assert!(loaded.catalog.is_frozen());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_source_directory_is_fatal() {
        let root = make_test_dir("missing");
        let err = load_catalog(&root, &["core"]).unwrap_err();
        assert!(matches!(err, BuildError::Load(LoadError::Io(_))));
        let _ = fs::remove_dir_all(&root);
    }
}
