//! Filename conflict encoding
//!
//! When two devices contribute a same-named entry that cannot be merged, the
//! losing entry is shown under an encoded display name:
//!
//! - regular file: `<stem>_conflict_dev<id>[.<ext>]`, where the last `.`
//!   delimits the extension
//! - directory: `<name>_remote_directory`
//!
//! Everything else is a common name owned by no particular device.

use crate::device::DeviceId;

pub const CONFLICTING_FILE_SUFFIX: &str = "_conflict_dev";
pub const CONFLICTING_DIR_SUFFIX: &str = "_remote_directory";

/// Classification of a display name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Common,
    Dir,
    Reg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub real: String,
    pub device: DeviceId,
    pub kind: NameKind,
}

impl DecodedName {
    pub fn common(name: &str) -> Self {
        Self {
            real: name.to_string(),
            device: DeviceId::LOCAL,
            kind: NameKind::Common,
        }
    }

    /// The device that exclusively owns this name, if any
    pub fn owner(&self) -> Option<DeviceId> {
        match self.kind {
            NameKind::Reg => Some(self.device),
            _ => None,
        }
    }
}

/// Byte offset of the extension dot, or the name length if there is none
fn extension_start(name: &str) -> usize {
    name.rfind('.').unwrap_or(name.len())
}

/// Locate a regular-file conflict marker: returns the offset of the marker
///  and the digit run that follows it.
fn find_reg_marker(name: &str) -> Option<(usize, &str)> {
    let dot = extension_start(name);
    let head = &name[..dot];
    let digits_len = head
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits_len == 0 {
        return None;
    }
    let digits = &head[head.len() - digits_len..];
    let marker_end = head.len() - digits_len;
    let stem = head[..marker_end].strip_suffix(CONFLICTING_FILE_SUFFIX)?;
    Some((stem.len(), digits))
}

pub fn classify(name: &str) -> NameKind {
    if name.len() > CONFLICTING_DIR_SUFFIX.len() && name.ends_with(CONFLICTING_DIR_SUFFIX) {
        return NameKind::Dir;
    }
    match find_reg_marker(name) {
        Some((_, digits)) if digits.parse::<u64>().is_ok() => NameKind::Reg,
        _ => NameKind::Common,
    }
}

/// Whether a name can be used verbatim as a real backing name
pub fn is_valid_real_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && name != "."
        && name != ".."
        && !name.contains(CONFLICTING_FILE_SUFFIX)
        && !name.contains(CONFLICTING_DIR_SUFFIX)
}

pub fn encode(real: &str, device: DeviceId, kind: NameKind) -> String {
    match kind {
        NameKind::Common => real.to_string(),
        NameKind::Dir => format!("{}{}", real, CONFLICTING_DIR_SUFFIX),
        NameKind::Reg => {
            let (stem, ext) = real.split_at(extension_start(real));
            format!("{}{}{}{}", stem, CONFLICTING_FILE_SUFFIX, device, ext)
        }
    }
}

pub fn decode(display: &str) -> DecodedName {
    match classify(display) {
        NameKind::Common => DecodedName::common(display),
        NameKind::Dir => DecodedName {
            real: display[..display.len() - CONFLICTING_DIR_SUFFIX.len()].to_string(),
            device: DeviceId::LOCAL,
            kind: NameKind::Dir,
        },
        NameKind::Reg => {
            // classify only reports Reg when the marker parses
            let Some((stem_len, digits)) = find_reg_marker(display) else {
                return DecodedName::common(display);
            };
            let device = digits.parse::<u64>().map(DeviceId).unwrap_or_default();
            let ext = &display[extension_start(display)..];
            DecodedName {
                real: format!("{}{}", &display[..stem_len], ext),
                device,
                kind: NameKind::Reg,
            }
        }
    }
}
