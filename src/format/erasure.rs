use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure};
use futures_util::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{FormatMetaV1, FORMAT_CONFIG_FILE, FORMAT_META_VERSION_V1};
use crate::config::storageclass;
use crate::endpoint::Endpoints;
use crate::errors::{
    count_err, reduce_write_quorum_errs, ReducibleError, StorageError, TypedError, UiError,
};
use crate::globals::{
    META_BUCKET, META_BUCKETS_BUCKET, META_CONFIG_BUCKET, META_MULTIPART_BUCKET,
    META_TMP_DELETED_BUCKET,
};
use crate::storage::{DeleteOptions, StorageApi};
use crate::utils::must_get_uuid;

// Represents Erasure backend.
pub const FORMAT_BACKEND_ERASURE: &str = "xl";

// Represents Erasure backend - single drive.
pub const FORMAT_BACKEND_ERASURE_SINGLE: &str = "xl-single";

// FormatErasureV1.erasure.version - version '1'.
pub const FORMAT_ERASURE_VERSION_V1: &str = "1";

// FormatErasureV2.erasure.version - version '2'.
pub const FORMAT_ERASURE_VERSION_V2: &str = "2";

// FormatErasureV3.erasure.version - version '3'.
pub const FORMAT_ERASURE_VERSION_V3: &str = "3";

// Distribution algorithm used, legacy.
pub const FORMAT_ERASURE_VERSION_V2_DISTRIBUTION_ALGO_V1: &str = "CRCMOD";

// Distributed algorithm used, with N/2 default parity.
pub const FORMAT_ERASURE_VERSION_V3_DISTRIBUTION_ALGO_V2: &str = "SIPMOD";

// Distributed algorithm used, with EC:4 default parity.
pub const FORMAT_ERASURE_VERSION_V3_DISTRIBUTION_ALGO_V3: &str = "SIPMOD+PARITY";

// Offline disk UUID represents an offline disk.
pub const OFFLINE_DISK_UUID: &str = "ffffffff-ffff-ffff-ffff-ffffffffffff";

// Used to detect the version of the "xl" format.
#[derive(Deserialize)]
struct FormatErasureVersionDetect {
    #[serde(rename = "xl")]
    erasure: ErasureVersionDetect,
}

#[derive(Deserialize)]
struct ErasureVersionDetect {
    version: String,
}

// Represents the V1 backend drive structure version
// under `.minio.sys` and the actual data namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatErasureV1 {
    #[serde(flatten)]
    pub meta: FormatMetaV1,
    #[serde(rename = "xl")]
    pub erasure: ErasureV1,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureV1 {
    // Version of the 'xl' format.
    pub version: String,
    // Disk field carries the assigned drive uuid.
    #[serde(rename = "drive")]
    pub disk: String,
    // JBOD field carries the input drive order generated the first
    // time when fresh drives were supplied.
    pub jbod: Vec<String>,
}

// The V2 format introduced "large bucket" support: a bucket
// can span multiple erasure sets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatErasureV2 {
    #[serde(flatten)]
    pub meta: FormatMetaV1,
    #[serde(rename = "xl")]
    pub erasure: ErasureV2,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureV2 {
    pub version: String,
    // This field carries the assigned drive uuid.
    pub this: String,
    // Sets field carries the input drive order generated the first
    // time when fresh drives were supplied, it is a two dimensional
    // array; the second dimension represents the list of drives used
    // per set.
    pub sets: Vec<Vec<String>>,
    // Distribution algorithm represents the hashing algorithm
    // used to pick the right set index for an object.
    #[serde(rename = "distributionAlgo")]
    pub distribution_algo: String,
}

// Same shape as the V2 format, except that version "3" indicates the
// simplified multipart backend which is a flat hierarchy:
// in .minio.sys/multipart we have
// sha256(bucket/object)/uploadID/[xl.meta, part.1, part.2 ...]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatErasureV3 {
    #[serde(flatten)]
    pub meta: FormatMetaV1,
    #[serde(rename = "xl")]
    pub erasure: ErasureV3,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureV3 {
    pub version: String,
    pub this: String,
    pub sets: Vec<Vec<String>>,
    #[serde(rename = "distributionAlgo")]
    pub distribution_algo: String,
}

impl FormatErasureV3 {
    // Total drive count described by this format.
    pub fn drives(&self) -> usize {
        self.erasure.sets.iter().map(|set| set.len()).sum()
    }
}

// Constructs a fresh format with newly minted identities for the
// deployment and every drive slot.
pub fn new_format_erasure_v3(num_sets: usize, set_len: usize) -> FormatErasureV3 {
    let format = if num_sets == 1 && set_len == 1 {
        FORMAT_BACKEND_ERASURE_SINGLE
    } else {
        FORMAT_BACKEND_ERASURE
    };
    FormatErasureV3 {
        meta: FormatMetaV1 {
            version: FORMAT_META_VERSION_V1.to_owned(),
            format: format.to_owned(),
            id: must_get_uuid(),
        },
        erasure: ErasureV3 {
            version: FORMAT_ERASURE_VERSION_V3.to_owned(),
            this: String::new(),
            sets: (0..num_sets)
                .map(|_| (0..set_len).map(|_| must_get_uuid()).collect())
                .collect(),
            distribution_algo: FORMAT_ERASURE_VERSION_V3_DISTRIBUTION_ALGO_V3.to_owned(),
        },
    }
}

// Returns the erasure format version after decoding only the `format.json`
// envelope; succeeds only when the backend is erasure.
pub fn format_get_backend_erasure_version(data: &[u8]) -> anyhow::Result<String> {
    let meta: FormatMetaV1 = serde_json::from_slice(data)?;
    ensure!(
        meta.version == FORMAT_META_VERSION_V1,
        "format.version expected: {}, got: {}",
        FORMAT_META_VERSION_V1,
        meta.version
    );
    ensure!(
        meta.format == FORMAT_BACKEND_ERASURE || meta.format == FORMAT_BACKEND_ERASURE_SINGLE,
        "found backend type {}, expected {} or {}",
        meta.format,
        FORMAT_BACKEND_ERASURE,
        FORMAT_BACKEND_ERASURE_SINGLE
    );
    // Erasure backend found, proceed to detect version.
    let format: FormatErasureVersionDetect = serde_json::from_slice(data)?;
    Ok(format.erasure.version)
}

// Migrates the V1 format to V2; the single JBOD becomes the only set.
pub fn format_erasure_migrate_v1_to_v2(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let format_v1: FormatErasureV1 = serde_json::from_slice(data)?;
    ensure!(
        format_v1.erasure.version == FORMAT_ERASURE_VERSION_V1,
        "format version expected {}, found {}",
        FORMAT_ERASURE_VERSION_V1,
        format_v1.erasure.version
    );

    let format_v2 = FormatErasureV2 {
        meta: FormatMetaV1 {
            version: FORMAT_META_VERSION_V1.to_owned(),
            format: FORMAT_BACKEND_ERASURE.to_owned(),
            id: String::new(),
        },
        erasure: ErasureV2 {
            version: FORMAT_ERASURE_VERSION_V2.to_owned(),
            this: format_v1.erasure.disk,
            sets: vec![format_v1.erasure.jbod],
            distribution_algo: FORMAT_ERASURE_VERSION_V2_DISTRIBUTION_ALGO_V1.to_owned(),
        },
    };
    Ok(serde_json::to_vec(&format_v2)?)
}

// Migrates the V2 format to V3 (flat hierarchy for multipart). The
// obsolete multipart tree is moved to the trash volume; a missing tree is
// fine, anything else is logged as a possibly faulty drive but does not
// fail the migration.
pub async fn format_erasure_migrate_v2_to_v3(
    data: &[u8],
    disk: &Arc<dyn StorageApi>,
    token: &CancellationToken,
) -> anyhow::Result<Vec<u8>> {
    let format_v2: FormatErasureV2 = serde_json::from_slice(data)?;
    ensure!(
        format_v2.erasure.version == FORMAT_ERASURE_VERSION_V2,
        "format version expected {}, found {}",
        FORMAT_ERASURE_VERSION_V2,
        format_v2.erasure.version
    );

    let tmp_old = must_get_uuid();
    if let Err(err) = disk
        .rename_file(token, META_MULTIPART_BUCKET, "", META_TMP_DELETED_BUCKET, &tmp_old)
        .await
    {
        if err != StorageError::FileNotFound && err != StorageError::VolumeNotFound {
            warn!(
                "unable to rename {} to {}/{} on drive {}: {}, drive may be faulty please investigate",
                META_MULTIPART_BUCKET, META_TMP_DELETED_BUCKET, tmp_old, disk, err
            );
        }
    }

    let format_v3 = FormatErasureV3 {
        meta: format_v2.meta,
        erasure: ErasureV3 {
            version: FORMAT_ERASURE_VERSION_V3.to_owned(),
            this: format_v2.erasure.this,
            sets: format_v2.erasure.sets,
            distribution_algo: format_v2.erasure.distribution_algo,
        },
    };
    Ok(serde_json::to_vec(&format_v3)?)
}

// Migrates all previous versions to the latest version of `format.json`,
// in sequence: V1 is migrated to V2 before V2 migrates to V3. The result
// is persisted through the atomic write protocol; V3 is terminal.
pub async fn format_erasure_migrate(
    disk: &Arc<dyn StorageApi>,
    token: &CancellationToken,
) -> anyhow::Result<FormatErasureV3> {
    let mut data = disk.read_all(token, META_BUCKET, FORMAT_CONFIG_FILE).await?;
    let version =
        format_get_backend_erasure_version(&data).map_err(|err| anyhow!("Drive {}: {}", disk, err))?;

    match version.as_str() {
        FORMAT_ERASURE_VERSION_V1 | FORMAT_ERASURE_VERSION_V2 => {
            if version == FORMAT_ERASURE_VERSION_V1 {
                data = format_erasure_migrate_v1_to_v2(&data)
                    .map_err(|err| anyhow!("Drive {}: {}", disk, err))?;
            }
            data = format_erasure_migrate_v2_to_v3(&data, disk, token)
                .await
                .map_err(|err| anyhow!("Drive {}: {}", disk, err))?;
            let format: FormatErasureV3 = serde_json::from_slice(&data)?;
            save_format_erasure(disk, &format, token)
                .await
                .map_err(|err| anyhow!("Drive {}: {}", disk, err))?;
            Ok(format)
        }
        FORMAT_ERASURE_VERSION_V3 => {
            // V3 is the latest version, nothing to migrate.
            Ok(serde_json::from_slice(&data)?)
        }
        _ => bail!("Drive {}: unknown format version {}", disk, version),
    }
}

// Counts a specific error in the per-drive slots.
fn count_errs(errs: &[Option<ReducibleError>], err: StorageError) -> usize {
    count_err(errs, &err.into())
}

// Do all errors indicate we need to initialize all drives?
pub fn should_init_erasure_disks(errs: &[Option<ReducibleError>]) -> bool {
    count_errs(errs, StorageError::UnformattedDisk) == errs.len()
}

// Check whether unformatted drives reach the write quorum.
pub fn quorum_unformatted_disks(errs: &[Option<ReducibleError>]) -> bool {
    count_errs(errs, StorageError::UnformattedDisk) >= errs.len() / 2 + 1
}

// Loads `format.json` from the drive.
pub async fn load_format_erasure(
    disk: &Arc<dyn StorageApi>,
    token: &CancellationToken,
) -> Result<FormatErasureV3, ReducibleError> {
    let buf = match disk.read_all(token, META_BUCKET, FORMAT_CONFIG_FILE).await {
        Ok(buf) => buf,
        // 'file not found' and 'volume not found' are treated the same:
        // 'volume not found' usually means a fresh drive.
        Err(StorageError::FileNotFound) | Err(StorageError::VolumeNotFound) => {
            return Err(StorageError::UnformattedDisk.into());
        }
        Err(err) => return Err(err.into()),
    };

    Ok(serde_json::from_slice::<FormatErasureV3>(&buf)?)
}

// Loads the format config from all drives in parallel. The returned
// vectors are index-aligned with the input; every slot carries either a
// format or the error observed for that drive.
pub async fn load_format_erasure_all(
    disks: &[Option<Arc<dyn StorageApi>>],
    heal: bool,
    token: &CancellationToken,
) -> (Vec<Option<FormatErasureV3>>, Vec<Option<ReducibleError>>) {
    let mut handles = Vec::with_capacity(disks.len());
    for disk in disks {
        let disk = disk.clone();
        let token = token.child_token();
        handles.push(tokio::spawn(async move {
            let disk = match disk {
                Some(disk) => disk,
                None => return Err(ReducibleError::from(StorageError::DiskNotFound)),
            };
            let format = load_format_erasure(&disk, &token).await?;
            if !heal {
                // If no healing is required, make the drive valid and
                // online.
                disk.set_disk_id(format.erasure.this.clone());
            }
            Ok(format)
        }));
    }

    let mut formats = Vec::with_capacity(disks.len());
    let mut errs = Vec::with_capacity(disks.len());
    for r in join_all(handles).await {
        match r.unwrap() {
            // no task should panic
            Ok(format) => {
                formats.push(Some(format));
                errs.push(None);
            }
            Err(err) => {
                formats.push(None);
                errs.push(Some(err));
            }
        }
    }
    (formats, errs)
}

// Makes the erasure backend meta volumes.
pub async fn make_format_erasure_meta_volumes(
    disk: &Arc<dyn StorageApi>,
    token: &CancellationToken,
) -> Result<(), StorageError> {
    let volumes = [
        META_TMP_DELETED_BUCKET, // creates .minio.sys/tmp as well as .minio.sys/tmp/.trash
        META_MULTIPART_BUCKET,   // creates .minio.sys/multipart
        META_BUCKETS_BUCKET,     // creates .minio.sys/buckets
        META_CONFIG_BUCKET,      // creates .minio.sys/config
    ];
    match disk.make_volumes(token, &volumes).await {
        Ok(()) | Err(StorageError::VolumeExists) => Ok(()),
        Err(err) => Err(err),
    }
}

// Saves `format.json` on the drive: write to a unique temporary, rename
// into place, stamp the drive identity. The temporary is purged on every
// exit path.
pub async fn save_format_erasure(
    disk: &Arc<dyn StorageApi>,
    format: &FormatErasureV3,
    token: &CancellationToken,
) -> Result<(), ReducibleError> {
    let disk_id = format.erasure.this.clone();

    make_format_erasure_meta_volumes(disk, token).await?;

    let format_bytes = serde_json::to_vec(format)?;

    let tmp_format = format!("{}.json", must_get_uuid());
    let res = async {
        disk.write_all(token, META_BUCKET, &tmp_format, &format_bytes)
            .await?;
        disk.rename_file(token, META_BUCKET, &tmp_format, META_BUCKET, FORMAT_CONFIG_FILE)
            .await
    }
    .await;

    // Purge the temporary file, okay to ignore errors here.
    let _ = disk
        .delete(token, META_BUCKET, &tmp_format, DeleteOptions::default())
        .await;

    res?;
    disk.set_disk_id(disk_id);
    Ok(())
}

// Populates `format.json` on the drives in their order; succeeds once a
// write quorum of drives acknowledged.
pub async fn save_format_erasure_all(
    token: &CancellationToken,
    disks: &[Option<Arc<dyn StorageApi>>],
    formats: &[Option<FormatErasureV3>],
) -> anyhow::Result<()> {
    let mut handles = Vec::with_capacity(disks.len());
    for (disk, format) in disks.iter().zip(formats.iter()) {
        let disk = disk.clone();
        let format = format.clone();
        let token = token.child_token();
        handles.push(tokio::spawn(async move {
            let (disk, format) = match (disk, format) {
                (Some(disk), Some(format)) => (disk, format),
                _ => return Err(ReducibleError::from(StorageError::DiskNotFound)),
            };
            save_format_erasure(&disk, &format, &token).await
        }));
    }

    let mut errs = Vec::with_capacity(disks.len());
    for r in join_all(handles).await {
        errs.push(r.unwrap().err()); // no task should panic
    }

    let write_quorum = disks.len() / 2 + 1;
    match reduce_write_quorum_errs(errs, &[], write_quorum) {
        None => Ok(()),
        Some(err) => Err(err.into()),
    }
}

// Returns the reference `format.json` elected by structural majority: the
// most common total drive count must be shared by a strict majority of
// the fleet. The reference carries no drive identity.
pub fn get_format_erasure_in_quorum(
    formats: &[Option<FormatErasureV3>],
) -> Result<FormatErasureV3, StorageError> {
    let mut format_count_map: HashMap<usize, usize> = HashMap::with_capacity(formats.len());
    for format in formats.iter().flatten() {
        *format_count_map.entry(format.drives()).or_default() += 1;
    }

    let mut max_drives = 0usize;
    let mut max_count = 0usize;
    for (&drives, &count) in &format_count_map {
        // Ties between bins resolve to the larger deployment so the
        // election does not depend on map iteration order.
        if count > max_count || (count == max_count && drives > max_drives) {
            max_count = count;
            max_drives = drives;
        }
    }

    if max_drives == 0 || max_count < formats.len() / 2 + 1 {
        return Err(StorageError::ErasureReadQuorum);
    }

    for format in formats.iter().flatten() {
        if format.drives() == max_drives {
            let mut format = format.clone();
            format.erasure.this = String::new();
            return Ok(format);
        }
    }

    Err(StorageError::ErasureReadQuorum)
}

// Checks whether a drive's format agrees with the reference: same shape,
// same UUID in every cell, and the drive's own identity present in the
// layout.
pub fn format_erasure_v3_check(
    reference: &FormatErasureV3,
    format: &FormatErasureV3,
) -> anyhow::Result<()> {
    let this = &format.erasure.this;
    ensure!(
        reference.erasure.sets.len() == format.erasure.sets.len(),
        "Expected number of sets {}, got {}",
        reference.erasure.sets.len(),
        format.erasure.sets.len()
    );

    // Make sure that the sets match.
    for i in 0..reference.erasure.sets.len() {
        ensure!(
            reference.erasure.sets[i].len() == format.erasure.sets[i].len(),
            "Each set should be of same size, expected {} got {}",
            reference.erasure.sets[i].len(),
            format.erasure.sets[i].len()
        );
        for j in 0..reference.erasure.sets[i].len() {
            if reference.erasure.sets[i][j] != format.erasure.sets[i][j] {
                return Err(anyhow::Error::new(StorageError::InconsistentDisk).context(format!(
                    "UUID on positions {}:{} do not match with, expected {} got {}",
                    i, j, reference.erasure.sets[i][j], format.erasure.sets[i][j]
                )));
            }
        }
    }

    // Make sure that the drive ID is found in the sets.
    for set in &format.erasure.sets {
        for uuid in set {
            if uuid == this {
                return Ok(());
            }
        }
    }
    bail!(
        "DriveID {} not found in any drive sets {:?}",
        this,
        format.erasure.sets
    )
}

// Validates the basic fields of one format.
fn check_format_erasure_value(format: &FormatErasureV3, disk: &str) -> anyhow::Result<()> {
    ensure!(
        format.meta.version == FORMAT_META_VERSION_V1,
        "Unsupported version of backend format [{}] found on {}",
        format.meta.version,
        disk
    );
    ensure!(
        format.meta.format == FORMAT_BACKEND_ERASURE
            || format.meta.format == FORMAT_BACKEND_ERASURE_SINGLE,
        "Unsupported backend format [{}] found on {}",
        format.meta.format,
        disk
    );
    ensure!(
        format.erasure.version == FORMAT_ERASURE_VERSION_V3,
        "Unsupported Erasure backend format found [{}] on {}",
        format.erasure.version,
        disk
    );
    Ok(())
}

// Validates all formats against the planned fleet size and, when the
// operator forced a set drive count, against the persisted layout. The
// on-disk value always wins.
pub fn check_format_erasure_values(
    formats: &[Option<FormatErasureV3>],
    disks: &[Option<Arc<dyn StorageApi>>],
    set_drive_count: Option<usize>,
) -> anyhow::Result<()> {
    for (i, format) in formats.iter().enumerate() {
        let format = match format {
            Some(format) => format,
            None => continue,
        };
        let disk_name = disks
            .get(i)
            .and_then(|d| d.as_ref())
            .map(|d| d.to_string())
            .unwrap_or_default();

        check_format_erasure_value(format, &disk_name)?;
        ensure!(
            !format.erasure.sets.is_empty() && !format.erasure.sets[0].is_empty(),
            "{} drive carries a format.json with an empty erasure set layout",
            disk_name
        );
        ensure!(
            formats.len() == format.erasure.sets.len() * format.erasure.sets[0].len(),
            "{} drive is already being used in another erasure deployment. (Number of drives specified: {} but the number of drives found in the drive's format.json: {})",
            disk_name,
            formats.len(),
            format.drives()
        );
        // Only if the custom erasure drive count was set, verify that the
        // persisted layout agrees; we need to honor what is on the drives.
        if let Some(set_drive_count) = set_drive_count {
            ensure!(
                format.erasure.sets[0].len() == set_drive_count,
                UiError::InvalidErasureSetSize.msg(format!(
                    "{} drive is already formatted with {} drives per erasure set. This cannot be changed to {}, please revert your MINIO_ERASURE_SET_DRIVE_COUNT setting",
                    disk_name,
                    format.erasure.sets[0].len(),
                    set_drive_count
                ))
            );
        }
    }
    Ok(())
}

// Returns the deployment ID from the formats whose sets match the
// reference. This need not be in quorum: even a single format carrying
// the value is trusted. Two distinct non-empty IDs mean the backend
// format is corrupted.
pub fn format_erasure_get_deployment_id(
    ref_format: &FormatErasureV3,
    formats: &[Option<FormatErasureV3>],
) -> anyhow::Result<String> {
    let mut deployment_id = String::new();
    for format in formats.iter().flatten() {
        if format.meta.id.is_empty() {
            continue;
        }
        if format.erasure.sets == ref_format.erasure.sets {
            if deployment_id.is_empty() {
                deployment_id = format.meta.id.clone();
            } else if deployment_id != format.meta.id {
                return Err(anyhow::Error::new(StorageError::CorruptedFormat).context(format!(
                    "Deployment IDs do not match expected {}, got {}",
                    deployment_id, format.meta.id
                )));
            }
        }
    }
    Ok(deployment_id)
}

// Adds the deployment ID where it is not present: adopts the agreed ID if
// any drive carries one, otherwise mints a fresh UUID, then rewrites
// every structurally matching drive.
pub async fn format_erasure_fix_deployment_id(
    disks: &[Option<Arc<dyn StorageApi>>],
    ref_format: &mut FormatErasureV3,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    // Attempt to load all `format.json` from all drives.
    let (mut formats, _) = load_format_erasure_all(disks, false, token).await;
    for format in formats.iter_mut() {
        // If the erasure sets do not match the reference, the drive does
        // not receive an ID.
        if matches!(format, Some(f) if f.erasure.sets != ref_format.erasure.sets) {
            *format = None;
        }
    }

    ref_format.meta.id = format_erasure_get_deployment_id(ref_format, &formats)?;
    if ref_format.meta.id.is_empty() {
        // The ID is generated for the first time.
        ref_format.meta.id = must_get_uuid();
    }

    // The deployment ID needs to be set on all the drives.
    for format in formats.iter_mut().flatten() {
        format.meta.id = ref_format.meta.id.clone();
    }
    save_format_erasure_all(token, disks, &formats).await
}

// Updates only the valid local drives which have not been updated before:
// if this server was down when the deployment ID was minted, catch the
// local drives up with the reference.
pub async fn format_erasure_fix_local_deployment_id(
    endpoints: &Endpoints,
    disks: &[Option<Arc<dyn StorageApi>>],
    ref_format: &FormatErasureV3,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let mut handles = Vec::with_capacity(disks.len());
    for (i, disk) in disks.iter().enumerate() {
        let endpoint_is_local = endpoints[i].is_local();
        let disk = disk.clone();
        let ref_sets = ref_format.erasure.sets.clone();
        let ref_id = ref_format.meta.id.clone();
        let token = token.child_token();
        handles.push(tokio::spawn(async move {
            let disk = match disk {
                Some(disk) if endpoint_is_local && disk.is_online() => disk,
                _ => return Ok(()),
            };
            let mut format = match load_format_erasure(&disk, &token).await {
                Ok(format) => format,
                // The drive can be offline, ignore it here.
                Err(_) => return Ok(()),
            };
            if !format.meta.id.is_empty() {
                return Ok(());
            }
            if format.erasure.sets != ref_sets {
                return Ok(());
            }
            format.meta.id = ref_id;
            save_format_erasure(&disk, &format, &token)
                .await
                .map_err(|err| anyhow!("Unable to save format.json, {}", err))
        }));
    }
    for r in join_all(handles).await {
        r.unwrap()?; // no task should panic
    }
    Ok(())
}

// Finds out whether the `this` field is empty in any of the single-set
// formats. Multi-set layouts are skipped: releases with the V1 format
// never supported multiple sets, so only they can be in this state.
pub fn format_erasure_v3_this_empty(formats: &[Option<FormatErasureV3>]) -> bool {
    formats
        .iter()
        .flatten()
        .any(|format| format.erasure.sets.len() == 1 && format.erasure.this.is_empty())
}

// Fixes the format configuration on local drives whose `this` is empty
// after a legacy migration: the drive adopts the UUID at its own fleet
// index within the single set.
pub async fn fix_format_erasure_v3(
    disks: &[Option<Arc<dyn StorageApi>>],
    endpoints: &Endpoints,
    formats: &mut [Option<FormatErasureV3>],
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let mut handles: Vec<tokio::task::JoinHandle<anyhow::Result<Option<(usize, FormatErasureV3)>>>> =
        Vec::with_capacity(formats.len());
    for (i, format) in formats.iter().enumerate() {
        let endpoint_is_local = endpoints[i].is_local();
        let disk = disks[i].clone();
        let format = format.clone();
        let token = token.child_token();
        handles.push(tokio::spawn(async move {
            let (disk, mut format) = match (disk, format) {
                (Some(disk), Some(format)) if endpoint_is_local => (disk, format),
                _ => return Ok(None),
            };
            if format.erasure.sets.len() > 1 {
                return Ok(None);
            }
            if !format.erasure.this.is_empty() || i >= format.erasure.sets[0].len() {
                return Ok(None);
            }
            format.erasure.this = format.erasure.sets[0][i].clone();
            save_format_erasure(&disk, &format, &token)
                .await
                .map_err(anyhow::Error::from)?;
            Ok(Some((i, format)))
        }));
    }
    for r in join_all(handles).await {
        if let Some((i, format)) = r.unwrap()? {
            formats[i] = Some(format);
        }
    }
    Ok(())
}

// Returns the erasure-coded drive count per set when no config has been
// set: the standard storage class from the environment, falling back to
// the set-size default.
pub fn ec_drives_no_config(set_drive_count: usize) -> usize {
    storageclass::lookup_config(set_drive_count)
        .ok()
        .and_then(|sc| sc.get_parity_for_sc(storageclass::STANDARD))
        .unwrap_or_else(|| storageclass::default_parity_blocks(set_drive_count))
}

// Marks every drive living on the OS root drive as down, so the boot disk
// never takes part in object storage. Errors are recorded in place.
pub async fn mark_root_disks_as_down(
    disks: &mut [Option<Arc<dyn StorageApi>>],
    errs: &mut [Option<ReducibleError>],
    token: &CancellationToken,
) {
    let mut handles = Vec::with_capacity(disks.len());
    for (i, disk) in disks.iter().enumerate() {
        let skip = errs[i].is_some();
        let disk = disk.clone();
        let token = token.child_token();
        handles.push(tokio::spawn(async move {
            match disk {
                Some(disk) if !skip => Some(disk.disk_info(&token).await),
                _ => None,
            }
        }));
    }
    for (i, r) in join_all(handles).await.into_iter().enumerate() {
        match r.unwrap() {
            Some(Ok(info)) if info.root_disk => {
                info!(
                    "Drive `{}` is part of root drive, will not be used",
                    disks[i].as_ref().unwrap()
                );
                disks[i] = None;
                errs[i] = Some(StorageError::DiskNotFound.into());
            }
            Some(Err(err)) => errs[i] = Some(err.into()),
            _ => {}
        }
    }
}

// Mints and saves a fresh erasure format configuration on all drives, and
// returns the quorum reference.
pub async fn init_format_erasure(
    token: &CancellationToken,
    disks: &mut [Option<Arc<dyn StorageApi>>],
    set_count: usize,
    set_drive_count: usize,
    deployment_id: Option<&str>,
    distribution_algo: Option<&str>,
    errs: &mut [Option<ReducibleError>],
) -> anyhow::Result<FormatErasureV3> {
    ensure!(
        disks.len() == set_count * set_drive_count,
        TypedError::InvalidArgument
    );

    let format = new_format_erasure_v3(set_count, set_drive_count);
    let mut formats: Vec<Option<FormatErasureV3>> = vec![None; disks.len()];
    let want_at_most = ec_drives_no_config(set_drive_count);

    for i in 0..set_count {
        let mut host_count: HashMap<String, usize> = HashMap::with_capacity(set_drive_count);
        for j in 0..set_drive_count {
            let mut new_format = format.clone();
            new_format.erasure.this = format.erasure.sets[i][j].clone();
            if let Some(algo) = distribution_algo.filter(|a| !a.is_empty()) {
                new_format.erasure.distribution_algo = algo.to_owned();
            }
            if let Some(id) = deployment_id.filter(|id| !id.is_empty()) {
                new_format.meta.id = id.to_owned();
            }
            if let Some(disk) = &disks[i * set_drive_count + j] {
                *host_count.entry(disk.hostname()).or_default() += 1;
            }
            formats[i * set_drive_count + j] = Some(new_format);
        }

        // An erasure set should survive the loss of any single host.
        let mut roster_logged = false;
        for (host, count) in &host_count {
            if *count > want_at_most {
                let host = if host.is_empty() { "local" } else { host };
                if !roster_logged && host_count.len() > 1 {
                    roster_logged = true;
                    info!(" * Set {}:", i + 1);
                    for j in 0..set_drive_count {
                        if let Some(disk) = &disks[i * set_drive_count + j] {
                            info!("   - Drive: {}", disk);
                        }
                    }
                }
                warn!(
                    "Host {} has more than {} drives of set. A host failure will result in data becoming unavailable.",
                    host, want_at_most
                );
            }
        }
    }

    // Mark all root drives down.
    mark_root_disks_as_down(disks, errs, token).await;

    // Save `format.json` across all drives.
    save_format_erasure_all(token, disks, &formats).await?;

    Ok(get_format_erasure_in_quorum(&formats)?)
}

// Initializes a fresh set of formats for every unformatted slot of an
// existing deployment, arranged `[set][slot]`, each pre-filled from the
// reference and identified by the slot's UUID.
pub fn new_heal_format_sets(
    ref_format: &FormatErasureV3,
    set_count: usize,
    set_drive_count: usize,
    errs: &[Option<ReducibleError>],
) -> Vec<Vec<Option<FormatErasureV3>>> {
    let unformatted: ReducibleError = StorageError::UnformattedDisk.into();
    let mut new_formats = vec![vec![None; set_drive_count]; set_count];
    for i in 0..set_count {
        for j in 0..set_drive_count {
            if matches!(&errs[i * set_drive_count + j], Some(err) if *err == unformatted) {
                new_formats[i][j] = Some(FormatErasureV3 {
                    meta: ref_format.meta.clone(),
                    erasure: ErasureV3 {
                        version: ref_format.erasure.version.clone(),
                        this: ref_format.erasure.sets[i][j].clone(),
                        sets: ref_format.erasure.sets.clone(),
                        distribution_algo: ref_format.erasure.distribution_algo.clone(),
                    },
                });
            }
        }
    }
    new_formats
}

// Relinquishes the underlying connection of every drive.
pub async fn close_storage_disks(disks: &[Option<Arc<dyn StorageApi>>]) {
    let mut handles = Vec::new();
    for disk in disks.iter().flatten() {
        let disk = disk.clone();
        handles.push(tokio::spawn(async move {
            let _ = disk.close().await;
        }));
    }
    for r in join_all(handles).await {
        r.unwrap(); // no task should panic
    }
}
