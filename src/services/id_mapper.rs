//! Phases 4/5 bridge: bidirectional id mapping between instances.

use std::collections::HashMap;

use crate::domain::error::MappingError;
use crate::domain::models::report::MappingRecord;

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Resolved through the workflow name; authoritative.
    Name,
    /// Resolved through the source-instance id; degraded (the name hint
    /// was unavailable or stale).
    OldId,
    /// Neither index knows the reference.
    Unresolved,
}

/// Insertion-ordered, append-only mapping from source workflows to the
/// ids the target assigned.
///
/// Written only by the upload pass and read by the reference updater
/// and the verifier. `record` updates both indexes atomically: a
/// conflict on either side leaves the mapper untouched.
#[derive(Debug, Clone, Default)]
pub struct IdMapper {
    by_name: HashMap<String, String>,
    by_old_id: HashMap<String, String>,
    records: Vec<MappingRecord>,
}

impl IdMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` (and `old_id`, when the export carried one) as
    /// mapping to `new_id`.
    ///
    /// Re-recording an identical triple is a no-op; a different
    /// `new_id` for a known name or old id is a consistency bug and
    /// fails without touching either index.
    pub fn record(
        &mut self,
        name: &str,
        old_id: Option<&str>,
        new_id: &str,
    ) -> Result<(), MappingError> {
        if let Some(existing) = self.by_name.get(name) {
            if existing != new_id {
                return Err(MappingError::DuplicateMapping {
                    key: name.to_string(),
                    existing: existing.clone(),
                    attempted: new_id.to_string(),
                });
            }
        }
        if let Some(old_id) = old_id {
            if let Some(existing) = self.by_old_id.get(old_id) {
                if existing != new_id {
                    return Err(MappingError::DuplicateMapping {
                        key: old_id.to_string(),
                        existing: existing.clone(),
                        attempted: new_id.to_string(),
                    });
                }
            }
        }

        let known = self.by_name.contains_key(name);
        self.by_name.insert(name.to_string(), new_id.to_string());
        if let Some(old_id) = old_id {
            self.by_old_id.insert(old_id.to_string(), new_id.to_string());
        }
        if !known {
            self.records.push(MappingRecord {
                name: name.to_string(),
                old_id: old_id.map(str::to_string),
                new_id: new_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn by_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn by_old_id(&self, old_id: &str) -> Option<&str> {
        self.by_old_id.get(old_id).map(String::as_str)
    }

    /// Resolve a reference, name first.
    ///
    /// The name is the stable business identifier across instances; the
    /// old id is only consulted when the name misses, and resolution
    /// through it is reported as degraded.
    pub fn resolve(
        &self,
        hint_name: Option<&str>,
        old_id: &str,
    ) -> (Option<&str>, ResolutionSource) {
        if let Some(new_id) = hint_name.and_then(|name| self.by_name(name)) {
            return (Some(new_id), ResolutionSource::Name);
        }
        if let Some(new_id) = self.by_old_id(old_id) {
            return (Some(new_id), ResolutionSource::OldId);
        }
        (None, ResolutionSource::Unresolved)
    }

    /// Mapping rows in insertion order, for the report.
    pub fn records(&self) -> &[MappingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
