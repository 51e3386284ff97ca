use anyhow::{bail, ensure};

// Reduced redundancy storage class
pub const RRS: &str = "REDUCED_REDUNDANCY";
// Standard storage class
pub const STANDARD: &str = "STANDARD";

pub const CLASS_STANDARD: &str = "standard";
pub const CLASS_RRS: &str = "rrs";

// Reduced redundancy storage class environment variable
pub const RRS_ENV: &str = "MINIO_STORAGE_CLASS_RRS";
// Standard storage class environment variable
pub const STANDARD_ENV: &str = "MINIO_STORAGE_CLASS_STANDARD";

// Supported storage class scheme is EC
const SCHEME_PREFIX: &str = "EC";

// Min parity drives
const MIN_PARITY_DRIVES: usize = 2;

// Default RRS parity is always minimum parity.
const DEFAULT_RRS_PARITY: usize = MIN_PARITY_DRIVES;

// A parity class, e.g. `EC:4`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StorageClass {
    pub parity: Option<usize>,
}

// Parity configuration for the supported storage classes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    pub standard: StorageClass,
    pub rrs: StorageClass,
}

impl Config {
    // Returns the parity of the requested storage class, the standard
    // class when the name is unknown or empty.
    pub fn get_parity_for_sc(&self, sc: &str) -> Option<usize> {
        match sc.trim() {
            RRS => self.rrs.parity.or(Some(DEFAULT_RRS_PARITY)),
            _ => self.standard.parity,
        }
    }
}

// Parses a storage class value of the form `EC:n`.
pub fn parse_storage_class(value: &str) -> anyhow::Result<StorageClass> {
    let parts: Vec<&str> = value.split(':').collect();
    ensure!(
        parts.len() == 2,
        "too many or too few sections in storage class value {:?}",
        value
    );
    ensure!(
        parts[0] == SCHEME_PREFIX,
        "unsupported scheme {}, only {} is supported",
        parts[0],
        SCHEME_PREFIX
    );
    let parity = parts[1].parse::<usize>()?;
    Ok(StorageClass {
        parity: Some(parity),
    })
}

// Validates the parity of a class against the erasure set size.
fn validate_parity(parity: usize, set_drive_count: usize) -> anyhow::Result<()> {
    if parity > 0 && parity < MIN_PARITY_DRIVES {
        bail!("parity {} should be greater than or equal to {}", parity, MIN_PARITY_DRIVES);
    }
    if parity > set_drive_count / 2 {
        bail!(
            "parity {} should be less than or equal to {}",
            parity,
            set_drive_count / 2
        );
    }
    Ok(())
}

// Reads the storage class configuration from the environment.
pub fn lookup_config(set_drive_count: usize) -> anyhow::Result<Config> {
    let mut cfg = Config::default();

    if let Ok(value) = std::env::var(STANDARD_ENV) {
        if !value.is_empty() {
            cfg.standard = parse_storage_class(&value)?;
            if let Some(parity) = cfg.standard.parity {
                validate_parity(parity, set_drive_count)?;
            }
        }
    }
    if let Ok(value) = std::env::var(RRS_ENV) {
        if !value.is_empty() {
            cfg.rrs = parse_storage_class(&value)?;
            if let Some(parity) = cfg.rrs.parity {
                validate_parity(parity, set_drive_count)?;
            }
        }
    }

    Ok(cfg)
}

// Default parity drives for a set when no storage class is configured.
pub fn default_parity_blocks(drive: usize) -> usize {
    match drive {
        0 | 1 => 0,
        2 | 3 => 1,
        4 | 5 => 2,
        6 | 7 => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_class() {
        assert_eq!(
            parse_storage_class("EC:4").unwrap(),
            StorageClass { parity: Some(4) }
        );
        assert!(parse_storage_class("EC:4:5").is_err());
        assert!(parse_storage_class("AB:4").is_err());
        assert!(parse_storage_class("EC:four").is_err());
    }

    #[test]
    fn test_default_parity_blocks() {
        let cases = [(1, 0), (2, 1), (3, 1), (4, 2), (5, 2), (6, 3), (7, 3), (8, 4), (16, 4)];
        for (drives, parity) in cases {
            assert_eq!(default_parity_blocks(drives), parity, "drives {}", drives);
        }
    }

    #[test]
    fn test_get_parity_for_sc() {
        let cfg = Config {
            standard: StorageClass { parity: Some(6) },
            rrs: StorageClass { parity: None },
        };
        assert_eq!(cfg.get_parity_for_sc(STANDARD), Some(6));
        assert_eq!(cfg.get_parity_for_sc(RRS), Some(DEFAULT_RRS_PARITY));
        assert_eq!(cfg.get_parity_for_sc(""), Some(6));
    }
}
