//! Merge (union) view over every device's subtree
//!
//! Each logical entry is a [`MergeNode`] backed by zero or more
//! [`Comrade`]s, one per contributing device. Lookups fan out to every
//! candidate device through the [`dispatch`] worker pool, and the node's
//! [`LookupGroup`] tracks when the fan-out has landed a hit or drained.
//!
//! Structural operations ([`MergeView::mkdir`], [`MergeView::rename`],
//! [`MergeView::unlink`], ...) act on every comrade in turn and are not
//! atomic across devices: the first failure is returned and comrades
//! already handled stay in their new state.

pub mod cache;
pub mod codec;
pub mod comrade;
pub mod dispatch;
pub mod node;
pub mod registry;
pub mod work;

mod create;
mod error;
mod lookup;
mod readdir;
mod remove;
mod rename;
mod revalidate;
mod view;

pub use cache::NodeCache;
pub use codec::{DecodedName, NameKind};
pub use comrade::Comrade;
pub use error::MergeError;
pub use lookup::LookupFlags;
pub use node::{MergeNode, NodeLayer};
pub use readdir::MergeDirEntry;
pub use registry::{ComradeRegistry, MergeAttr, NodeKind, RejectReason, Rejected};
pub use rename::RenameFlags;
pub use revalidate::Validity;
pub use view::MergeView;
pub use work::{LookupGroup, WorkState};
