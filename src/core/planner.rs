//! Pure reconciliation planning over two directory listings.
//!
//! No I/O happens here. Given a source and a destination listing, the
//! planner selects every source file that is missing or stale on the
//! destination. Files matching by (path, size, mtime) are skipped, which
//! is what makes repeated runs converge to an empty plan.

use std::collections::HashMap;

use crate::core::models::{Direction, FileEntry, TransferPlan};

/// Compute the minimal copy set from `source` to `dest` for one direction.
///
/// A file is planned when it is absent from `dest`, or present with a
/// differing size or mtime. Plan order is the order of `source`. Neither
/// listing is mutated.
pub fn plan(source: &[FileEntry], dest: &[FileEntry], direction: Direction) -> TransferPlan {
    let dest_index: HashMap<&str, &FileEntry> =
        dest.iter().map(|f| (f.path.as_str(), f)).collect();

    let needed: Vec<FileEntry> = source
        .iter()
        .filter(|file| match dest_index.get(file.path.as_str()) {
            Some(existing) => !file.same_version(existing),
            None => true,
        })
        .cloned()
        .collect();

    match direction {
        Direction::Pull => TransferPlan {
            to_pull: needed,
            to_push: Vec::new(),
        },
        Direction::Push => TransferPlan {
            to_pull: Vec::new(),
            to_push: needed,
        },
    }
}
