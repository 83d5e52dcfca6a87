//! Versioned IR store
//!
//! Append-only forest keyed by `diagram_id`; `(version, parent_version)`
//! forms a chain per diagram. A write validates first, then lands inside the
//! diagram's critical section where the optimistic parent check runs, so two
//! racing editors get exactly one committed child and one STALE_PARENT.

use crate::model::DiagramIr;
use crate::validate;
use archdraft_core::{DiagramId, Error, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Default)]
pub struct IrStore {
    diagrams: DashMap<DiagramId, BTreeMap<u64, DiagramIr>>,
}

impl IrStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and commit a new version. Returns the committed version
    /// number. Rules:
    /// - the IR must pass validation;
    /// - an initial IR (no parent) is only accepted for an empty lineage;
    /// - otherwise `parent_version` must be the current latest, or the
    ///   write fails with STALE_PARENT and the caller must rebase.
    pub fn put(&self, ir: DiagramIr) -> Result<u64> {
        self.put_txn(ir, |_| Ok(()))
    }

    /// Like [`put`](Self::put) but runs `commit` inside the diagram's
    /// critical section, after the version is accepted and before it becomes
    /// visible to readers of other diagrams' state. Artifacts and the
    /// triggering audit are committed here so the three land atomically.
    pub fn put_txn<F>(&self, ir: DiagramIr, commit: F) -> Result<u64>
    where
        F: FnOnce(&DiagramIr) -> Result<()>,
    {
        validate::validate_strict(&ir)?;

        let diagram_id = ir.diagram_id.clone();
        let mut lineage = self.diagrams.entry(diagram_id.clone()).or_default();

        let latest = lineage.keys().next_back().copied();
        match (ir.parent_version, latest) {
            (None, None) => {
                if ir.version != 1 {
                    return Err(Error::validation(vec![format!(
                        "initial version must be 1, got {}",
                        ir.version
                    )]));
                }
            }
            (None, Some(latest)) => {
                return Err(Error::StaleParent {
                    diagram_id: diagram_id.to_string(),
                    latest,
                    supplied: None,
                });
            }
            (Some(parent), Some(latest)) => {
                if !lineage.contains_key(&parent) {
                    return Err(Error::validation(vec![format!(
                        "parent version {} does not exist",
                        parent
                    )]));
                }
                if parent != latest {
                    return Err(Error::StaleParent {
                        diagram_id: diagram_id.to_string(),
                        latest,
                        supplied: Some(parent),
                    });
                }
                if ir.version != latest + 1 {
                    return Err(Error::validation(vec![format!(
                        "version must be {}, got {}",
                        latest + 1,
                        ir.version
                    )]));
                }
            }
            (Some(parent), None) => {
                return Err(Error::validation(vec![format!(
                    "parent version {} does not exist",
                    parent
                )]));
            }
        }

        let version = ir.version;
        lineage.insert(version, ir);

        // Transactional tail: roll the version back out if the commit
        // closure fails, so no half-written state is ever visible.
        let inserted = lineage.get(&version).cloned();
        if let Some(ref committed) = inserted {
            if let Err(e) = commit(committed) {
                lineage.remove(&version);
                return Err(e);
            }
        }

        debug!(diagram = %diagram_id, version, "IR version committed");
        Ok(version)
    }

    pub fn get(&self, diagram_id: &DiagramId, version: u64) -> Result<DiagramIr> {
        self.diagrams
            .get(diagram_id)
            .and_then(|lineage| lineage.get(&version).cloned())
            .ok_or_else(|| Error::not_found(format!("diagram {} v{}", diagram_id, version)))
    }

    pub fn latest(&self, diagram_id: &DiagramId) -> Result<DiagramIr> {
        self.diagrams
            .get(diagram_id)
            .and_then(|lineage| lineage.values().next_back().cloned())
            .ok_or_else(|| Error::not_found(format!("diagram {}", diagram_id)))
    }

    /// Full version chain, newest first.
    pub fn history(&self, diagram_id: &DiagramId) -> Result<Vec<DiagramIr>> {
        let lineage = self
            .diagrams
            .get(diagram_id)
            .ok_or_else(|| Error::not_found(format!("diagram {}", diagram_id)))?;
        Ok(lineage.values().rev().cloned().collect())
    }

    pub fn contains(&self, diagram_id: &DiagramId) -> bool {
        self.diagrams.contains_key(diagram_id)
    }
}
