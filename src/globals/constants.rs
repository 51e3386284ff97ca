use const_format::concatcp;

pub const SLASH_SEPARATOR: &str = "/";

// Reserved bucket carrying all backend metadata. The name is fixed by the
// on-disk layout and must never change across releases.
pub const META_BUCKET: &str = ".minio.sys";

// Transient work area inside the meta bucket.
pub const META_TMP_BUCKET: &str = concatcp!(META_BUCKET, "/tmp");

// Deleted content lands here before being reclaimed; creating this volume
// also creates its parent tmp volume.
pub const META_TMP_DELETED_BUCKET: &str = concatcp!(META_TMP_BUCKET, "/.trash");

// Legacy multipart staging area, retired by the V2 -> V3 migration.
pub const META_MULTIPART_BUCKET: &str = concatcp!(META_BUCKET, "/multipart");

// Data usage bookkeeping.
pub const META_BUCKETS_BUCKET: &str = concatcp!(META_BUCKET, "/buckets");

// Server configuration.
pub const META_CONFIG_BUCKET: &str = concatcp!(META_BUCKET, "/config");

// Overrides the automatically chosen erasure set drive count.
pub const ENV_ERASURE_SET_DRIVE_COUNT: &str = "MINIO_ERASURE_SET_DRIVE_COUNT";
