//! Content sources: record dispatch and the deferred `copy-from` queue.
//!
//! A [`ContentLoader`] feeds raw records into a [`Catalog`]. Records whose
//! `copy-from` base is not loaded yet are queued and retried after the
//! source's last record; the queue is drained pass by pass while passes
//! make progress. Whatever is left is reported as unresolved.
//!
//! Errors scoped to one record are collected in the [`LoadReport`] and the
//! rest of the batch carries on. Only batch-wide failures (unreadable
//! files, a frozen catalog) are returned as `Err`.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use stockpile_core::catalog::Catalog;
use stockpile_core::id::ContentSource;

use crate::loader::{LoadError, content_files, read_records};
use crate::reader::RecordReader;
use crate::{dependents, groups, item, migration, vocab};

// ===========================================================================
// Report
// ===========================================================================

/// Counts and record-scoped errors from loading one or more sources.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Records read, including deferred ones.
    pub records: usize,
    /// Records queued at least once for a missing `copy-from` base.
    pub deferred: usize,
    /// Deferred records that loaded on a later pass.
    pub drained: usize,
    /// Records of a type nothing here consumes.
    pub skipped: usize,
    /// Record errors, including unresolved `copy-from` bases.
    pub errors: Vec<LoadError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Pending {
    src: ContentSource,
    kind: String,
    record: Map<String, Value>,
    id: String,
    base: String,
}

// ===========================================================================
// Loader
// ===========================================================================

pub struct ContentLoader<'c> {
    catalog: &'c mut Catalog,
    pending: Vec<Pending>,
    report: LoadReport,
}

impl<'c> ContentLoader<'c> {
    pub fn new(catalog: &'c mut Catalog) -> Self {
        Self {
            catalog,
            pending: Vec::new(),
            report: LoadReport::default(),
        }
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Drain anything still queued and hand back the report.
    pub fn finish(mut self) -> Result<LoadReport, LoadError> {
        self.drain()?;
        Ok(self.report)
    }

    /// Load one record. A record-level `src` member overrides `src`.
    pub fn load_record(&mut self, src: &ContentSource, record: Value) -> Result<(), LoadError> {
        self.report.records += 1;
        let record = match record {
            Value::Object(record) => record,
            other => {
                return self.fail(LoadError::record(
                    "<unnamed>",
                    src.as_str(),
                    vec![format!("record is not an object: {other}")],
                ));
            }
        };
        let src = match record.get("src").and_then(Value::as_str) {
            Some(s) => ContentSource::new(s),
            None => src.clone(),
        };
        let Some(kind) = record.get("type").and_then(Value::as_str).map(str::to_string) else {
            let id = record_id(&record).to_string();
            return self.fail(LoadError::record(
                &id,
                src.as_str(),
                vec!["record has no 'type'".to_string()],
            ));
        };

        match self.dispatch(&src, &kind, &record) {
            Ok(()) => Ok(()),
            Err(LoadError::Deferred { id, base }) => {
                log::debug!("'{id}' deferred until '{base}' is loaded");
                self.report.deferred += 1;
                self.pending.push(Pending {
                    src,
                    kind,
                    record,
                    id,
                    base,
                });
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Load a list of records as one content source, then drain.
    pub fn load_source(&mut self, src: &ContentSource, records: Vec<Value>) -> Result<(), LoadError> {
        let before = self.snapshot();
        for record in records {
            self.load_record(src, record)?;
        }
        self.drain()?;
        self.log_source(src, before);
        Ok(())
    }

    /// Load a JSON document holding a record or a list of records as one
    /// content source.
    pub fn load_json(&mut self, src: &ContentSource, text: &str) -> Result<(), LoadError> {
        let value: Value = serde_json::from_str(text).map_err(|e| LoadError::Parse {
            file: PathBuf::from(format!("<{src}>")),
            detail: e.to_string(),
        })?;
        self.load_source(src, crate::loader::flatten_records(value))
    }

    /// Load every record of one file without draining.
    pub fn load_file(&mut self, src: &ContentSource, path: &Path) -> Result<(), LoadError> {
        log::debug!("loading {} for '{src}'", path.display());
        for record in read_records(path)? {
            self.load_record(src, record)?;
        }
        Ok(())
    }

    /// Load every content file under `dir`, in path order, as one source,
    /// then drain.
    pub fn load_dir(&mut self, src: &ContentSource, dir: &Path) -> Result<(), LoadError> {
        let before = self.snapshot();
        for path in content_files(dir)? {
            self.load_file(src, &path)?;
        }
        self.drain()?;
        self.log_source(src, before);
        Ok(())
    }

    /// Retry deferred records until a pass makes no progress. Records still
    /// waiting afterwards become [`LoadError::Unresolved`].
    pub fn drain(&mut self) -> Result<(), LoadError> {
        let mut passes = 0;
        while !self.pending.is_empty() {
            passes += 1;
            let queue = std::mem::take(&mut self.pending);
            let waiting = queue.len();
            for p in queue {
                match self.dispatch(&p.src, &p.kind, &p.record) {
                    Ok(()) => self.report.drained += 1,
                    Err(LoadError::Deferred { base, .. }) => self.pending.push(Pending { base, ..p }),
                    Err(e) => self.fail(e)?,
                }
            }
            if self.pending.len() == waiting {
                break;
            }
        }
        if passes > 0 {
            log::debug!("deferred queue settled after {passes} passes");
        }
        for p in std::mem::take(&mut self.pending) {
            self.fail(LoadError::Unresolved {
                id: p.id,
                base: p.base,
            })?;
        }
        Ok(())
    }

    fn snapshot(&self) -> [usize; 4] {
        [
            self.report.records,
            self.report.deferred,
            self.report.drained,
            self.report.errors.len(),
        ]
    }

    fn log_source(&self, src: &ContentSource, before: [usize; 4]) {
        let now = self.snapshot();
        log::info!(
            "loaded '{src}': {} records ({} deferred, {} drained), {} errors",
            now[0] - before[0],
            now[1] - before[1],
            now[2] - before[2],
            now[3] - before[3]
        );
    }

    /// Keep a record-scoped error and carry on; pass anything else up.
    fn fail(&mut self, e: LoadError) -> Result<(), LoadError> {
        match e {
            LoadError::Record { .. } | LoadError::Unresolved { .. } => {
                log::error!("{e}");
                self.report.errors.push(e);
                Ok(())
            }
            other => Err(other),
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn dispatch(
        &mut self,
        src: &ContentSource,
        kind: &str,
        record: &Map<String, Value>,
    ) -> Result<(), LoadError> {
        if item::is_item_type(kind) {
            return item::load_item(self.catalog, kind, record, src);
        }

        let owner = record_id(record).to_string();
        let mut r = RecordReader::new(record);
        let catalog = &mut *self.catalog;
        match kind {
            "item_group" => {
                let group = groups::load_group(&mut r);
                checked(r, &owner, src)?;
                if let Some(group) = group {
                    catalog.add_group(group);
                }
            }
            "MIGRATION" => {
                let records = migration::load_migrations(&mut r);
                checked(r, &owner, src)?;
                for m in records {
                    catalog.migrations.add(m);
                }
            }
            "ITEM_BLACKLIST" => {
                let items = migration::load_list(&mut r);
                checked(r, &owner, src)?;
                catalog.blacklist.add_blacklist(items);
            }
            "ITEM_WHITELIST" => {
                let items = migration::load_list(&mut r);
                checked(r, &owner, src)?;
                catalog.blacklist.add_whitelist(items);
            }
            "recipe" => {
                let recipe = dependents::load_recipe(&mut r);
                checked(r, &owner, src)?;
                if let Some(recipe) = recipe {
                    catalog.dependents.add_recipe(recipe);
                }
            }
            "vehicle" => {
                let vehicle = dependents::load_vehicle(&mut r);
                checked(r, &owner, src)?;
                if let Some(vehicle) = vehicle {
                    catalog.dependents.add_vehicle(vehicle);
                }
            }
            k if vocab::is_vocab_type(k) => {
                let mut staged = catalog.vocab.clone();
                vocab::load_vocab(&mut staged, k, &mut r);
                checked(r, &owner, src)?;
                catalog.vocab = staged;
            }
            _ => {
                log::debug!("skipping '{owner}' of unhandled type '{kind}'");
                self.report.skipped += 1;
            }
        }
        Ok(())
    }
}

fn record_id(record: &Map<String, Value>) -> &str {
    record
        .get("id")
        .or_else(|| record.get("abstract"))
        .or_else(|| record.get("result"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
}

/// Turn a supporting record's problems into a record error. Their unread
/// members are not checked: only the fields that name items are read.
fn checked(r: RecordReader<'_>, owner: &str, src: &ContentSource) -> Result<(), LoadError> {
    let problems = r.finish(owner, false);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(LoadError::record(owner, src.as_str(), problems))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
