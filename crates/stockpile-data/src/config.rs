//! Catalog options read from `options.{ron,toml,json}` at the data root.

use std::path::Path;
use stockpile_core::options::{CatalogOptions, MAX_STACK_SIZE};

use crate::loader::{LoadError, deserialize_file, find_data_file};

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid option '{field}': {detail}")]
    Invalid { field: &'static str, detail: String },
}

/// Read the options file under `dir`. A missing file means defaults.
pub fn load_options(dir: &Path) -> Result<CatalogOptions, OptionsError> {
    let Some(path) = find_data_file(dir, "options")? else {
        log::debug!("no options file in {}, using defaults", dir.display());
        return Ok(CatalogOptions::default());
    };
    let options: CatalogOptions = deserialize_file(&path)?;
    validate(&options)?;
    log::info!("options from {}: {options:?}", path.display());
    Ok(options)
}

fn validate(options: &CatalogOptions) -> Result<(), OptionsError> {
    if !(1..=MAX_STACK_SIZE).contains(&options.max_stack_size) {
        return Err(OptionsError::Invalid {
            field: "max_stack_size",
            detail: format!(
                "must be between 1 and {MAX_STACK_SIZE}, got {}",
                options.max_stack_size
            ),
        });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stockpile_options_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = make_test_dir("missing");
        let opts = load_options(&dir).unwrap();
        assert_eq!(opts, CatalogOptions::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reads_any_format() {
        let dir = make_test_dir("ron");
        fs::write(dir.join("options.ron"), "(strict: true, seed: 7)").unwrap();
        let opts = load_options(&dir).unwrap();
        assert!(opts.strict);
        assert_eq!(opts.seed, 7);
        assert_eq!(opts.max_stack_size, MAX_STACK_SIZE);
        let _ = fs::remove_dir_all(&dir);

        let dir = make_test_dir("toml");
        fs::write(dir.join("options.toml"), "no_faults = true\nmax_stack_size = 50\n").unwrap();
        let opts = load_options(&dir).unwrap();
        assert!(opts.no_faults);
        assert_eq!(opts.max_stack_size, 50);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_zero_stack_size() {
        let dir = make_test_dir("zero");
        fs::write(dir.join("options.json"), r#"{"max_stack_size": 0}"#).unwrap();
        let err = load_options(&dir).unwrap_err();
        assert!(matches!(err, OptionsError::Invalid { field: "max_stack_size", .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_stack_size_above_cap() {
        let dir = make_test_dir("cap");
        fs::write(dir.join("options.toml"), "max_stack_size = 500\n").unwrap();
        let err = load_options(&dir).unwrap_err();
        assert!(matches!(err, OptionsError::Invalid { field: "max_stack_size", .. }));
        let _ = fs::remove_dir_all(&dir);

        let dir = make_test_dir("at_cap");
        fs::write(dir.join("options.toml"), format!("max_stack_size = {MAX_STACK_SIZE}\n")).unwrap();
        assert_eq!(load_options(&dir).unwrap().max_stack_size, MAX_STACK_SIZE);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn conflicting_files_are_an_error() {
        let dir = make_test_dir("conflict");
        fs::write(dir.join("options.json"), "{}").unwrap();
        fs::write(dir.join("options.toml"), "").unwrap();
        let err = load_options(&dir).unwrap_err();
        assert!(matches!(err, OptionsError::Load(LoadError::ConflictingFormats { .. })));
        let _ = fs::remove_dir_all(&dir);
    }
}
