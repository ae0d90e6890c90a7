//! Device identities and the connection registry
//!
//! Every contributor to the merge view is a *device*: the local backing
//! store, or a connected remote peer. Each device exposes its subtree under
//! a synthetic root inside the backing store:
//!
//! ```text
//! device_view/local/<relative-path>      local device
//! device_view/<cid>/<relative-path>      remote device, addressed by connection id
//! ```

mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use registry::{ConnectionRegistry, PeerConnection, PeerStatus, RegistryError};

/// Top-level directory holding every device's contributed subtree
pub const DEVICE_VIEW_ROOT: &str = "device_view";
/// Selector token for the local device
pub const DEVICE_VIEW_LOCAL: &str = "local";
/// Length of a remote connection identifier
pub const CID_SIZE: usize = 64;

/// Stable identifier for a device. `0` is reserved for the local device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl DeviceId {
    pub const LOCAL: DeviceId = DeviceId(0);

    pub fn is_local(&self) -> bool {
        *self == Self::LOCAL
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        DeviceId(id)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CidError {
    #[error("connection id must be {CID_SIZE} characters, got {0}")]
    InvalidLength(usize),
    #[error("connection id must be ascii alphanumeric")]
    InvalidCharacter,
}

/// Fixed-length connection identifier of a remote device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    pub fn new(cid: impl Into<String>) -> Result<Self, CidError> {
        let cid = cid.into();
        if cid.len() != CID_SIZE {
            return Err(CidError::InvalidLength(cid.len()));
        }
        if !cid.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CidError::InvalidCharacter);
        }
        Ok(Self(cid))
    }

    /// Deterministic connection id derived from a device id, zero padded hex
    pub fn from_device(id: DeviceId) -> Self {
        Self(format!("{:0>width$x}", id.0, width = CID_SIZE))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cid {
    type Error = CidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cid::new(value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

/// Which device subtree a backing path lives under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceSelector {
    Local,
    Remote(Cid),
}

impl DeviceSelector {
    pub fn token(&self) -> &str {
        match self {
            DeviceSelector::Local => DEVICE_VIEW_LOCAL,
            DeviceSelector::Remote(cid) => cid.as_str(),
        }
    }

    /// `device_view/<selector>`
    pub fn root(&self) -> String {
        format!("{}/{}", DEVICE_VIEW_ROOT, self.token())
    }

    /// `device_view/<selector><parent>/<name>`, where `parent` is either
    ///  empty or starts with a `/`
    pub fn child_path(&self, parent: &str, name: &str) -> String {
        format!("{}{}/{}", self.root(), parent, name)
    }
}
