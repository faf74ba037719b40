mod local;

pub use local::LocalFileReader;

use anyhow::Result;
use async_trait::async_trait;

/// Random-access byte source for an archive.
///
/// This is the boundary behind which the actual transport lives: a local
/// file, a memory buffer, or a remote object fetched with ranged reads.
/// Implementations must not maintain a shared cursor; concurrent calls
/// with disjoint offsets are expected.
///
/// A call may return fewer bytes than requested. The parsing layer treats
/// a short read as fatal rather than retrying; transports that can retry
/// should do so internally before returning.
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read bytes starting at `offset` into `buf`, returning how many
    /// were read.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total size of the archive in bytes.
    fn size(&self) -> u64;
}
