use super::lookup::LookupFlags;
use super::node::{MergeNode, NodeLayer};
use super::view::MergeView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    /// The node must be looked up again
    Stale,
}

impl MergeView {
    /// Whether a cached node can still be trusted.
    ///
    /// Dead and comrade-less nodes always need a fresh lookup, and so
    ///  does any node when `flags.revalidate` is set. The root is always
    ///  valid, and so is any populated trusted node. Anything else is valid
    ///  unless one of its comrades fails its own backing revalidation.
    ///  Creation and rename intents leave a populated node to the
    ///  comrade check.
    pub async fn revalidate(&self, node: &MergeNode, flags: LookupFlags) -> Validity {
        if node.is_dead() {
            return Validity::Stale;
        }
        if node.layer() == NodeLayer::Root {
            return Validity::Valid;
        }
        if flags.revalidate {
            return Validity::Stale;
        }

        node.work().wait_idle().await;
        let comrades = node.registry().snapshot();
        if comrades.is_empty() {
            return Validity::Stale;
        }
        if node.layer() == NodeLayer::Trusted {
            return Validity::Valid;
        }
        for comrade in comrades {
            if !self.store().revalidate(comrade.entry()).await {
                tracing::debug!(
                    "{} stale: comrade {} on device {} changed",
                    node.path(),
                    comrade.path(),
                    comrade.device()
                );
                return Validity::Stale;
            }
        }
        Validity::Valid
    }
}
