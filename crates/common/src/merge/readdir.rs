use std::collections::HashMap;

use super::codec::{self, NameKind};
use super::node::MergeNode;
use super::view::MergeView;
use super::MergeError;
use crate::backing::EntryKind;
use crate::device::DeviceId;

/// One entry of a merged directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDirEntry {
    /// Name as shown in the view, possibly conflict-encoded
    pub name: String,
    pub kind: EntryKind,
    /// Device that contributed the entry; the first one for merged directories
    pub device: DeviceId,
}

impl MergeView {
    /// List a directory node by merging every comrade's listing.
    ///
    /// Comrades are read in list order, so the local device wins plain
    ///  names. Same-named directories merge into one entry. A later regular
    ///  file with a taken name is shown under its conflict encoding, and so
    ///  is a later directory that collides with a regular file.
    pub async fn readdir(&self, node: &MergeNode) -> Result<Vec<MergeDirEntry>, MergeError> {
        if !node.is_dir() {
            return Err(MergeError::NotADirectory(node.path().to_string()));
        }
        let comrades = node.registry().snapshot();
        let mut entries: Vec<MergeDirEntry> = Vec::new();
        let mut shown: HashMap<String, EntryKind> = HashMap::new();
        let mut last_error = None;
        let mut listed = 0;

        for comrade in &comrades {
            let listing = match self.store().readdir(comrade.path()).await {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!(
                        "skipping listing of {} on device {}: {}",
                        comrade.path(),
                        comrade.device(),
                        e
                    );
                    last_error = Some(e);
                    continue;
                }
            };
            listed += 1;

            for entry in listing {
                if !codec::is_valid_real_name(&entry.name) {
                    tracing::debug!("hiding backing entry {:?}", entry.name);
                    continue;
                }
                let name = match (shown.get(&entry.name), entry.kind) {
                    (None, _) => entry.name.clone(),
                    (Some(EntryKind::Dir), EntryKind::Dir) => continue,
                    (Some(_), EntryKind::Dir) => {
                        codec::encode(&entry.name, comrade.device(), NameKind::Dir)
                    }
                    (Some(_), _) => codec::encode(&entry.name, comrade.device(), NameKind::Reg),
                };
                if shown.contains_key(&name) && name != entry.name {
                    // a directory conflict seen from more than one device
                    continue;
                }
                shown.entry(name.clone()).or_insert(entry.kind);
                entries.push(MergeDirEntry {
                    name,
                    kind: entry.kind,
                    device: comrade.device(),
                });
            }
        }

        match last_error {
            Some(e) if listed == 0 => Err(e.into()),
            _ => Ok(entries),
        }
    }
}
