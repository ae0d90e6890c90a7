/// Lightweight harness for multi-device merge view tests
///
/// Every device's subtree lives in one shared [`MemoryStore`](crate::backing::MemoryStore),
/// so a whole cluster runs in-process with no disk or network. Devices can
/// be slowed down, failed, or held behind a gate to exercise the lookup
/// fan-out.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::TestCluster;
///
/// #[tokio::test]
/// async fn test_merged_dir() -> anyhow::Result<()> {
///     let mut cluster = TestCluster::new();
///     let phone = cluster.add_device(2)?;
///
///     cluster.local().add_dir("photos")?;
///     phone.add_file("photos/beach.jpg", 1024)?;
///
///     let view = cluster.mount().await?;
///     let photos = view.lookup_path("/photos").await?;
///     assert_eq!(photos.registry().len(), 2);
///     Ok(())
/// }
/// ```
mod cluster;
mod device;

pub use cluster::TestCluster;
pub use device::TestDevice;
