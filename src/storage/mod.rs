use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::StorageError;

// Point-in-time drive facts consumed by startup (root-drive masking) and
// surfaced to operators.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiskInfo {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub root_disk: bool,
    pub endpoint: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeleteOptions {
    pub recursive: bool,
    pub force: bool,
}

// The capability object a drive exposes to this core. Implementations are
// the local xl backend or a remote storage client; this layer treats them
// uniformly. Every I/O call takes the startup cancellation token and must
// fail fast once it fires.
#[async_trait]
pub trait StorageApi: Send + Sync + fmt::Display {
    fn is_online(&self) -> bool;

    fn is_local(&self) -> bool;

    fn hostname(&self) -> String;

    fn get_disk_id(&self) -> Option<String>;

    fn set_disk_id(&self, id: String);

    async fn disk_info(&self, token: &CancellationToken) -> Result<DiskInfo, StorageError>;

    async fn make_volumes(
        &self,
        token: &CancellationToken,
        volumes: &[&str],
    ) -> Result<(), StorageError>;

    async fn read_all(
        &self,
        token: &CancellationToken,
        volume: &str,
        path: &str,
    ) -> Result<Vec<u8>, StorageError>;

    async fn write_all(
        &self,
        token: &CancellationToken,
        volume: &str,
        path: &str,
        data: &[u8],
    ) -> Result<(), StorageError>;

    // Atomically renames a file within the drive; directories are moved
    // whole when `src_path` names one (empty path means the volume root).
    async fn rename_file(
        &self,
        token: &CancellationToken,
        src_volume: &str,
        src_path: &str,
        dest_volume: &str,
        dest_path: &str,
    ) -> Result<(), StorageError>;

    async fn delete(
        &self,
        token: &CancellationToken,
        volume: &str,
        path: &str,
        opts: DeleteOptions,
    ) -> Result<(), StorageError>;

    async fn close(&self) -> Result<(), StorageError>;
}
