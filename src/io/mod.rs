mod local;

pub use local::LocalFileReader;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for random access reading from a container source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Fill the buffer with data starting at the specified offset
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}
