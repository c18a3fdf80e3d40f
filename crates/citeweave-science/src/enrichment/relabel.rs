use citeweave_core::{OTHER_LABEL, RecordStore};

use crate::error::{Result, ScienceError};

/// Renames tag `old` to `new` in every publication label set carrying it.
/// Returns the number of publications changed.
pub fn relabel(store: &dyn RecordStore, old: &str, new: &str) -> Result<usize> {
    let (old, new) = (old.trim(), new.trim());
    if old.is_empty() || new.is_empty() || old.contains(',') || new.contains(',') {
        return Err(ScienceError::Parse(format!("invalid tag pair {old:?} -> {new:?}")));
    }
    if old == OTHER_LABEL || new == OTHER_LABEL {
        return Err(ScienceError::Parse(format!("{OTHER_LABEL} cannot be renamed")));
    }

    let mut changed = 0;
    for mut publication in store.list_publications()? {
        if publication.label.rename(old, new) {
            store.set_label(publication.eid, &publication.label)?;
            changed += 1;
        }
    }
    tracing::info!(old, new, changed, "relabelled");
    Ok(changed)
}
