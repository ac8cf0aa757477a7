//! Choosing FIBERMAP rows for a target.

use serde::Serialize;

use crate::fits::{FitsError, FitsFile, Table};

/// Identifies the object (and optionally the exposure) to extract.
///
/// `target_id` takes precedence over `fiber`; `exp_id` further restricts
/// either one to a single exposure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TargetSelector {
    pub target_id: Option<i64>,
    pub fiber: Option<u32>,
    pub exp_id: Option<i64>,
}

impl TargetSelector {
    pub fn target(target_id: i64) -> Self {
        Self {
            target_id: Some(target_id),
            ..Self::default()
        }
    }

    pub fn fiber(fiber: u32) -> Self {
        Self {
            fiber: Some(fiber),
            ..Self::default()
        }
    }

    pub fn with_exp_id(mut self, exp_id: i64) -> Self {
        self.exp_id = Some(exp_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.target_id.is_none() && self.fiber.is_none()
    }

    /// Indices of the FIBERMAP rows matching this selector, in table order.
    pub fn matching_rows(
        &self,
        fits: &mut FitsFile,
        fibermap: &Table,
    ) -> Result<Vec<usize>, FitsError> {
        let (column, wanted) = match (self.target_id, self.fiber) {
            (Some(t), _) => ("TARGETID", t),
            (None, Some(f)) => ("FIBER", f as i64),
            (None, None) => return Ok(Vec::new()),
        };
        let keys = fibermap.column_i64(fits, column)?;
        let exposures = match self.exp_id {
            Some(_) => Some(fibermap.column_i64(fits, "EXPID")?),
            None => None,
        };
        Ok(keys
            .iter()
            .enumerate()
            .filter(|(i, k)| {
                **k == wanted
                    && match (&exposures, self.exp_id) {
                        (Some(e), Some(want)) => e[*i] == want,
                        _ => true,
                    }
            })
            .map(|(i, _)| i)
            .collect())
    }
}
