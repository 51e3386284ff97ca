use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

use super::StorageError;

// One slot of a per-drive error vector. Comparable and hashable so that
// quorum arithmetic can bin identical outcomes; io errors compare by kind,
// free-form errors by message.
#[derive(Debug, Error)]
pub struct ReducibleError {
    ident: u8,
    inner: ReducibleErrorInner,
}

#[derive(Debug, Error)]
#[non_exhaustive]
enum ReducibleErrorInner {
    IoError(std::io::Error),
    StorageError(StorageError),
    Other(String),
}

impl From<std::io::Error> for ReducibleError {
    fn from(err: std::io::Error) -> Self {
        Self {
            ident: 0,
            inner: ReducibleErrorInner::IoError(err),
        }
    }
}

impl From<StorageError> for ReducibleError {
    fn from(err: StorageError) -> Self {
        Self {
            ident: 1,
            inner: ReducibleErrorInner::StorageError(err),
        }
    }
}

impl From<serde_json::Error> for ReducibleError {
    fn from(err: serde_json::Error) -> Self {
        Self::other(err)
    }
}

impl ReducibleError {
    pub fn other(err: impl fmt::Display) -> Self {
        Self {
            ident: 2,
            inner: ReducibleErrorInner::Other(err.to_string()),
        }
    }

    pub fn as_storage_error(&self) -> Option<&StorageError> {
        match &self.inner {
            ReducibleErrorInner::StorageError(err) => Some(err),
            _ => None,
        }
    }

    pub fn is(&self, errs: &[ReducibleError]) -> bool {
        errs.iter().any(|e| e == self)
    }
}

impl fmt::Display for ReducibleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl fmt::Display for ReducibleErrorInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ReducibleErrorInner::*;
        match &self {
            IoError(err) => err.fmt(f),
            StorageError(err) => err.fmt(f),
            Other(msg) => msg.fmt(f),
        }
    }
}

impl PartialEq for ReducibleError {
    fn eq(&self, other: &Self) -> bool {
        use ReducibleErrorInner::*;
        if self.ident != other.ident {
            return false;
        }
        match (&self.inner, &other.inner) {
            (IoError(a), IoError(b)) => a.kind() == b.kind(),
            (StorageError(a), StorageError(b)) => a == b,
            (Other(a), Other(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ReducibleError {}

impl Hash for ReducibleError {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use ReducibleErrorInner::*;
        self.ident.hash(state);
        match &self.inner {
            IoError(err) => err.kind().hash(state),
            StorageError(err) => err.hash(state),
            Other(msg) => msg.hash(state),
        }
    }
}

pub fn count_err(errs: &[Option<ReducibleError>], err: &ReducibleError) -> usize {
    errs.iter()
        .filter(|e| matches!(e, Some(e) if e == err))
        .count()
}

// Bins the error slots and returns the dominant outcome with its
// population. `None` slots mean success and win ties.
pub fn reduce_errs(
    errs: Vec<Option<ReducibleError>>,
    ignored_errs: &[ReducibleError],
) -> (usize, Option<ReducibleError>) {
    let mut err_counts: HashMap<Option<ReducibleError>, usize> = HashMap::new();
    for err in errs {
        if let Some(err) = &err {
            if err.is(ignored_errs) {
                continue;
            }
        }
        *err_counts.entry(err).or_default() += 1;
    }

    let mut max = 0usize;
    let mut max_err = None;
    for (err, count) in err_counts {
        if max < count {
            max = count;
            max_err = err;
        } else if max == count && err.is_none() {
            // Prefer success over an error with the same population.
            max_err = None;
        }
    }
    (max, max_err)
}

// Reduces the slots to a single outcome: the dominant error (or success)
// if its population reaches `quorum`, else `quorum_err`.
pub fn reduce_quorum_errs(
    errs: Vec<Option<ReducibleError>>,
    ignored_errs: &[ReducibleError],
    quorum: usize,
    quorum_err: StorageError,
) -> Option<ReducibleError> {
    let (max_count, max_err) = reduce_errs(errs, ignored_errs);
    if max_count >= quorum {
        max_err
    } else {
        Some(quorum_err.into())
    }
}

pub fn reduce_write_quorum_errs(
    errs: Vec<Option<ReducibleError>>,
    ignored_errs: &[ReducibleError],
    write_quorum: usize,
) -> Option<ReducibleError> {
    reduce_quorum_errs(
        errs,
        ignored_errs,
        write_quorum,
        StorageError::ErasureWriteQuorum,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errs_of(kinds: &[Option<StorageError>]) -> Vec<Option<ReducibleError>> {
        kinds
            .iter()
            .map(|k| k.clone().map(ReducibleError::from))
            .collect()
    }

    #[test]
    fn test_reduce_errs_majority() {
        let errs = errs_of(&[
            Some(StorageError::DiskNotFound),
            Some(StorageError::DiskNotFound),
            Some(StorageError::FaultyDisk),
            None,
        ]);
        let (count, err) = reduce_errs(errs, &[]);
        assert_eq!(count, 2);
        assert_eq!(err, Some(StorageError::DiskNotFound.into()));
    }

    #[test]
    fn test_reduce_errs_prefers_success_on_tie() {
        let errs = errs_of(&[
            Some(StorageError::FaultyDisk),
            Some(StorageError::FaultyDisk),
            None,
            None,
        ]);
        let (count, err) = reduce_errs(errs, &[]);
        assert_eq!(count, 2);
        assert_eq!(err, None);
    }

    #[test]
    fn test_reduce_errs_ignores_listed() {
        let errs = errs_of(&[
            Some(StorageError::DiskNotFound),
            Some(StorageError::DiskNotFound),
            Some(StorageError::DiskNotFound),
            None,
        ]);
        let ignored = [ReducibleError::from(StorageError::DiskNotFound)];
        let (count, err) = reduce_errs(errs, &ignored);
        assert_eq!((count, err), (1, None));
    }

    #[test]
    fn test_write_quorum_reduction() {
        // Three failures out of four: write quorum of three is not met.
        let errs = errs_of(&[
            Some(StorageError::FaultyDisk),
            Some(StorageError::FaultyDisk),
            Some(StorageError::FaultyDisk),
            None,
        ]);
        let err = reduce_write_quorum_errs(errs, &[], 3).unwrap();
        assert_eq!(
            err.as_storage_error(),
            Some(&StorageError::FaultyDisk),
            "dominant error wins when it reaches quorum"
        );

        let errs = errs_of(&[
            Some(StorageError::FaultyDisk),
            Some(StorageError::DiskAccessDenied),
            Some(StorageError::VolumeNotFound),
            None,
        ]);
        let err = reduce_write_quorum_errs(errs, &[], 3).unwrap();
        assert_eq!(err.as_storage_error(), Some(&StorageError::ErasureWriteQuorum));
    }
}
