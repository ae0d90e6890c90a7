/**
 * Storage seam for the merge view.
 *  A trait covering the handful of path operations
 *  the engine needs, plus a filesystem-backed and
 *  an in-memory implementation.
 */
pub mod backing;
/**
 * Tunables shared by every merge view.
 */
pub mod config;
/**
 * Device identities and the registry of
 *  connected peers whose subtrees are merged.
 */
pub mod device;
/**
 * The merge engine itself: conflict naming,
 *  comrade registries, async lookup fan-out, and
 *  the create / rename / remove coordinators.
 */
pub mod merge;
/**
 * In-memory multi-device clusters for tests.
 */
pub mod testkit;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::backing::{BackingStore, EntryKind, FsStore, MemoryStore, StoreError};
    pub use crate::config::MergeConfig;
    pub use crate::device::{Cid, ConnectionRegistry, DeviceId, PeerConnection};
    pub use crate::merge::{
        LookupFlags, MergeError, MergeNode, MergeView, NodeKind, RenameFlags,
    };
    pub use crate::version::build_info;
}
