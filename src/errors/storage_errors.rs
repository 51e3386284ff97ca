use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StorageError {
    #[error("unexpected error, please report this issue")]
    Unexpected,

    #[error("corrupted backend format, specified drive mount has unexpected previous content")]
    CorruptedFormat,

    #[error("unformatted drive found")]
    UnformattedDisk,

    #[error("inconsistent drive found")]
    InconsistentDisk,

    #[error("drive not found")]
    DiskNotFound,

    #[error("drive is faulty")]
    FaultyDisk,

    #[error("remote drive is faulty")]
    FaultyRemoteDisk,

    #[error("drive access denied")]
    DiskAccessDenied,

    #[error("file not found")]
    FileNotFound,

    #[error("file access denied")]
    FileAccessDenied,

    #[error("file is corrupted")]
    FileCorrupt,

    #[error("volume already exists")]
    VolumeExists,

    #[error("volume not found")]
    VolumeNotFound,

    #[error("volume access denied")]
    VolumeAccessDenied,

    // Returned when the fleet cannot agree on a reference format.
    #[error("Read failed. Insufficient number of drives online")]
    ErasureReadQuorum,

    // Returned when too few drives acknowledged a batch write.
    #[error("Write failed. Insufficient number of drives online")]
    ErasureWriteQuorum,
}
