use anyhow::ensure;

use crate::ellipses::{self, ArgPattern};
use crate::errors::{TypedError, UiError};
use crate::globals::ENV_ERASURE_SET_DRIVE_COUNT;
use crate::strset::StringSet;

// Supported set sizes this is used to find the optimal
// single set size.
const SET_SIZES: [usize; 15] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

// Checks whether given count is a valid set size for erasure coding.
fn is_valid_set_size(count: usize) -> bool {
    count >= SET_SIZES[0] && count <= SET_SIZES[SET_SIZES.len() - 1]
}

fn gcd(mut x: usize, mut y: usize) -> usize {
    while y != 0 {
        (x, y) = (y, x % y);
    }
    x
}

// Returns the greatest common divisor of all the ellipses sizes.
fn get_divisible_size(total_sizes: &[usize]) -> usize {
    total_sizes.iter().cloned().reduce(gcd).unwrap()
}

// Returns the largest set size which results in the least number of sets.
// Expects `set_counts` to be sorted ascending.
fn common_set_drive_count(divisible_size: usize, set_counts: &[usize]) -> usize {
    if divisible_size < set_counts[set_counts.len() - 1] {
        return divisible_size;
    }

    let mut set_size = 0;
    let mut prev_d = divisible_size / set_counts[0];
    for &cnt in set_counts {
        if divisible_size % cnt == 0 {
            let d = divisible_size / cnt;
            if d <= prev_d {
                prev_d = d;
                set_size = cnt;
            }
        }
    }
    set_size
}

// Returns symmetrical set counts based on the input argument patterns. A
// candidate survives only when every positional range of every pattern
// divides into it evenly, so each host contributes the same number of
// drives to every set. A range of length 1 is trivially symmetric.
fn possible_set_counts_with_symmetry(
    set_counts: &[usize],
    arg_patterns: &[ArgPattern],
) -> Vec<usize> {
    let mut new_set_counts: Vec<usize> = Vec::new();
    for &ss in set_counts {
        let mut symmetry = true;
        for arg_pattern in arg_patterns {
            for p in arg_pattern.iter() {
                let len = p.seq.len();
                if len > ss {
                    symmetry = symmetry && len % ss == 0;
                } else {
                    symmetry = symmetry && ss % len == 0;
                }
            }
        }
        // With no arg patterns, it is expected that the user knows
        // the right symmetry, so either ellipses patterns are
        // provided (recommended) or no ellipses patterns.
        if symmetry || arg_patterns.is_empty() {
            new_set_counts.push(ss);
        }
    }
    // Input order is already ascending, and so is the output; the
    // subsequent selection depends on it.
    new_set_counts
}

// Returns a list of set sizes per pool, one entry per erasure set. This
// also decides the final uniform set size.
pub(super) fn get_set_indexes(
    args: &[&str],
    total_sizes: &[usize],
    custom_set_drive_count: Option<usize>,
    arg_patterns: &[ArgPattern],
) -> anyhow::Result<Vec<Vec<usize>>> {
    ensure!(
        !total_sizes.is_empty() && !args.is_empty(),
        TypedError::InvalidArgument
    );

    for &total_size in total_sizes {
        // Check if total_size has minimum range upto set size.
        ensure!(
            total_size >= SET_SIZES[0] && total_size >= custom_set_drive_count.unwrap_or(0),
            UiError::InvalidNumberOfErasureEndpoints
                .msg(format!("Incorrect number of endpoints provided {:?}", args))
        );
    }

    let common_size = get_divisible_size(total_sizes);
    let set_counts: Vec<usize> = SET_SIZES
        .iter()
        .cloned()
        .filter(|&s| common_size % s == 0)
        .collect();
    ensure!(
        !set_counts.is_empty(),
        UiError::InvalidNumberOfErasureEndpoints.msg(format!(
            "Incorrect number of endpoints provided {:?}, number of drives {} is not divisible by any supported erasure set sizes {:?}",
            args, common_size, SET_SIZES
        ))
    );

    let set_size = if let Some(custom) = custom_set_drive_count {
        // Custom set drive count allows to override automatic distribution,
        // only meant if you want to further optimize drive distribution.
        ensure!(
            set_counts.contains(&custom),
            UiError::InvalidErasureSetSize.msg(format!(
                "Invalid set drive count. Acceptable values for {} number drives are {:?}",
                common_size, set_counts
            ))
        );
        // No automatic symmetry calculation expected, user is on their own.
        custom
    } else {
        let set_counts = possible_set_counts_with_symmetry(&set_counts, arg_patterns);
        ensure!(
            !set_counts.is_empty(),
            UiError::InvalidNumberOfErasureEndpoints.msg(format!(
                "No symmetric distribution detected with input endpoints provided {:?}, drives {} cannot be spread symmetrically by any supported erasure set sizes {:?}",
                args, common_size, SET_SIZES
            ))
        );

        // Final set size with all the symmetry accounted for.
        common_set_drive_count(common_size, &set_counts)
    };

    // Check whether set_size is within the supported range.
    ensure!(
        is_valid_set_size(set_size),
        UiError::InvalidNumberOfErasureEndpoints.msg(format!(
            "Incorrect number of endpoints provided {:?}, number of drives {} is not divisible by any supported erasure set sizes {:?}",
            args, common_size, SET_SIZES
        ))
    );

    Ok(total_sizes
        .iter()
        .map(|&total_size| vec![set_size; total_size / set_size])
        .collect())
}

// Parsed ellipses values for one pool, and the partition of its expanded
// endpoints into erasure sets.
#[derive(Clone, Debug, Default)]
pub struct EndpointSet {
    arg_patterns: Vec<ArgPattern>,
    endpoints: Vec<String>,
    set_indexes: Vec<Vec<usize>>,
}

impl EndpointSet {
    // Returns the expanded endpoints, each argument expanded separately.
    fn get_endpoints(&mut self) -> &[String] {
        if self.endpoints.is_empty() {
            for arg_pattern in &self.arg_patterns {
                for lbls in arg_pattern.expand() {
                    self.endpoints.push(lbls.concat());
                }
            }
        }
        &self.endpoints
    }

    // Returns the sets representation of the endpoints: contiguous slices
    // of the expansion, sized by the set indexes.
    pub fn get(&mut self) -> Vec<Vec<String>> {
        let set_indexes = self.set_indexes.clone();
        let endpoints = self.get_endpoints();
        let mut sets = Vec::new();
        let mut k = 0usize;
        for indexes in &set_indexes {
            for &size in indexes {
                sets.push(endpoints[k..k + size].to_vec());
                k += size;
            }
        }
        sets
    }
}

// Returns the total size of each argument pattern.
fn get_total_sizes(arg_patterns: &[ArgPattern]) -> Vec<usize> {
    arg_patterns.iter().map(|a| a.total_size()).collect()
}

// Parses all arguments and returns an EndpointSet which is a collection
// of endpoints following the ellipses pattern, this is what is used
// by the object layer for initializing itself.
pub(super) fn parse_endpoint_set(
    custom_set_drive_count: Option<usize>,
    args: &[&str],
) -> anyhow::Result<EndpointSet> {
    let mut arg_patterns = Vec::with_capacity(args.len());
    for &arg in args {
        let patterns = ellipses::find_ellipses_patterns(arg)
            .map_err(|err| UiError::InvalidErasureEndpoints.msg(err.to_string()))?;
        arg_patterns.push(patterns);
    }

    let set_indexes = get_set_indexes(
        args,
        &get_total_sizes(&arg_patterns),
        custom_set_drive_count,
        &arg_patterns,
    )?;

    Ok(EndpointSet {
        arg_patterns,
        endpoints: Vec::new(),
        set_indexes,
    })
}

// Parses all input arguments and expands them into the corresponding list
// of endpoints, chunked evenly in accordance with a specific set size. For
// example: {1...64} is divided into 4 sets each of size 16. This applies
// to even distributed setup syntax as well.
pub fn get_all_sets(
    custom_set_drive_count: Option<usize>,
    args: &[&str],
) -> anyhow::Result<Vec<Vec<String>>> {
    let set_args = if !ellipses::has_ellipses(args) {
        let set_indexes = if args.len() > 1 {
            get_set_indexes(args, &[args.len()], custom_set_drive_count, &[])?
        } else {
            // We are in FS setup, proceed forward.
            vec![vec![args.len()]]
        };
        let mut s = EndpointSet {
            arg_patterns: Vec::new(),
            endpoints: args.iter().map(|&a| a.to_owned()).collect(),
            set_indexes,
        };
        s.get()
    } else {
        let mut s = parse_endpoint_set(custom_set_drive_count, args)?;
        s.get()
    };

    // Validate there are no duplicate endpoints across sets.
    let mut unique_args = StringSet::new();
    for sargs in &set_args {
        for arg in sargs {
            ensure!(
                !unique_args.contains(arg),
                UiError::InvalidErasureEndpoints
                    .msg(format!("Input args {:?} has duplicate ellipses", args))
            );
            unique_args.add(arg.clone());
        }
    }

    Ok(set_args)
}

// Reads the erasure set drive count override from the environment.
pub fn get_custom_set_drive_count() -> anyhow::Result<Option<usize>> {
    match std::env::var(ENV_ERASURE_SET_DRIVE_COUNT) {
        Ok(v) if !v.is_empty() => {
            let count = v.parse::<usize>().map_err(|err| {
                UiError::InvalidErasureSetSize
                    .msg(format!("Invalid {} value {:?}: {}", ENV_ERASURE_SET_DRIVE_COUNT, v, err))
            })?;
            Ok(Some(count))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::errors::{AsError, UiErrorItem};

    fn set_sizes_of(set_args: &[Vec<String>]) -> Vec<usize> {
        set_args.iter().map(|s| s.len()).collect()
    }

    #[test]
    fn test_get_set_indexes() {
        // (args, total_sizes, expected per-pool set indexes)
        let cases: &[(Vec<&str>, Vec<usize>, Vec<Vec<usize>>)] = &[
            (vec!["data{1...16}"], vec![16], vec![vec![16]]),
            (vec!["data{1...64}"], vec![64], vec![vec![16, 16, 16, 16]]),
            (vec!["data{1...24}"], vec![24], vec![vec![12, 12]]),
            (vec!["data{1...2}"], vec![2], vec![vec![2]]),
            (vec!["data{1...7}"], vec![7], vec![vec![7]]),
            (
                vec!["data{1...3}", "more{1...3}"],
                vec![3, 3],
                vec![vec![3], vec![3]],
            ),
            (
                vec!["data{1...64}", "more{1...24}"],
                vec![64, 24],
                vec![vec![8; 8], vec![8; 3]],
            ),
        ];

        for (i, (args, total_sizes, expected)) in cases.iter().enumerate() {
            let arg_patterns: Vec<ArgPattern> = args
                .iter()
                .map(|&a| ellipses::find_ellipses_patterns(a).unwrap())
                .collect();
            let got = get_set_indexes(args, total_sizes, None, &arg_patterns)
                .unwrap_or_else(|err| panic!("Test {}: unexpected error {}", i + 1, err));
            assert_eq!(&got, expected, "Test {}", i + 1);
        }
    }

    #[test]
    fn test_get_set_indexes_errors() {
        // A single endpoint is below the minimum erasure set size.
        assert!(get_set_indexes(&["data"], &[1], None, &[]).is_err());
        // 17 is prime and beyond the largest supported set size.
        assert!(get_set_indexes(&["data{1...17}"], &[17], None, &[]).is_err());
        // Empty inputs.
        assert!(get_set_indexes(&[], &[], None, &[]).is_err());
    }

    #[test]
    fn test_custom_set_drive_count() {
        // 64 drives accept an override of 8.
        let got = get_set_indexes(&["data{1...64}"], &[64], Some(8), &[]).unwrap();
        assert_eq!(got, vec![vec![8; 8]]);

        // An override which is not a divisor is rejected with the
        // set-size error, not the endpoint-count error.
        let err = get_set_indexes(&["data{1...64}"], &[64], Some(7), &[]).unwrap_err();
        let item = err.as_error::<UiErrorItem>().unwrap();
        assert!(item.to_string().contains("Invalid set drive count"));

        // An override larger than the drive count is rejected outright.
        assert!(get_set_indexes(&["data{1...4}"], &[4], Some(8), &[]).is_err());
    }

    #[test]
    fn test_symmetry_filter() {
        // 3 hosts x 7 drives: no candidate is compatible with both ranges.
        let args = ["http://node{1...3}/data{1...7}"];
        let arg_patterns = vec![ellipses::find_ellipses_patterns(args[0]).unwrap()];
        let err = get_set_indexes(&args, &[21], None, &arg_patterns).unwrap_err();
        assert!(err.to_string().contains("symmetric"));

        // 3 hosts x 5 drives: only 15 divides evenly by both ranges, one
        // set spanning every host.
        let args = ["http://node{1...3}/data{1...5}"];
        let arg_patterns = vec![ellipses::find_ellipses_patterns(args[0]).unwrap()];
        let got = get_set_indexes(&args, &[15], None, &arg_patterns).unwrap();
        assert_eq!(got, vec![vec![15]]);

        // A range of length 1 is trivially symmetric.
        let args = ["http://node{1...1}/data{1...8}"];
        let arg_patterns = vec![ellipses::find_ellipses_patterns(args[0]).unwrap()];
        let got = get_set_indexes(&args, &[8], None, &arg_patterns).unwrap();
        assert_eq!(got, vec![vec![8]]);
    }

    #[test]
    fn test_get_all_sets_literal_args() {
        // Multiple literal args become one pool sized by the arg count.
        let set_args = get_all_sets(None, &["/mnt/a", "/mnt/b", "/mnt/c", "/mnt/d"]).unwrap();
        assert_eq!(set_args, vec![vec!["/mnt/a", "/mnt/b", "/mnt/c", "/mnt/d"]]);

        // Single literal arg is a single-drive setup.
        let set_args = get_all_sets(None, &["/mnt/a"]).unwrap();
        assert_eq!(set_args, vec![vec!["/mnt/a"]]);

        // Duplicate literal endpoints are rejected.
        assert!(get_all_sets(None, &["/mnt/a", "/mnt/a", "/mnt/b", "/mnt/c"]).is_err());
    }

    #[test]
    fn test_get_all_sets_ellipses() {
        let set_args = get_all_sets(None, &["http://node{1...4}/data{1...16}"]).unwrap();
        assert_eq!(set_sizes_of(&set_args), vec![16, 16, 16, 16]);
        let total: usize = set_sizes_of(&set_args).iter().sum();
        assert_eq!(total, 64);
        // The first set draws four drives from every host.
        for host in 1..=4 {
            let in_first_set = set_args[0]
                .iter()
                .filter(|e| e.starts_with(&format!("http://node{}/", host)))
                .count();
            assert_eq!(in_first_set, 4);
        }

        // Overriding the set drive count reshapes the partition.
        let set_args = get_all_sets(Some(8), &["http://node{1...4}/data{1...16}"]).unwrap();
        assert_eq!(set_sizes_of(&set_args), vec![8; 8]);

        // Overlapping expansions across args are duplicates.
        assert!(get_all_sets(None, &["data{1...4}", "data{1...4}"]).is_err());
    }

    #[test]
    fn test_endpoint_set_partition_preserves_order() {
        let mut s = parse_endpoint_set(None, &["disk{1...8}"]).unwrap();
        let sets = s.get();
        let flattened: Vec<String> = sets.iter().flatten().cloned().collect();
        assert_eq!(
            flattened,
            (1..=8).map(|i| format!("disk{}", i)).collect::<Vec<_>>()
        );
    }

    proptest! {
        #[test]
        fn prop_solver_uniform_and_minimal(total in 2usize..=1024) {
            let divisors: Vec<usize> = (2usize..=16).filter(|s| total % s == 0).collect();
            match get_set_indexes(&["pool"], &[total], None, &[]) {
                Ok(indexes) => {
                    prop_assert!(!divisors.is_empty());
                    let sizes = &indexes[0];
                    let s = sizes[0];
                    // Uniform partition of a supported divisor.
                    prop_assert!(sizes.iter().all(|&v| v == s));
                    prop_assert!((2..=16).contains(&s));
                    prop_assert_eq!(total % s, 0);
                    prop_assert_eq!(sizes.len() * s, total);
                    // Fewest sets, ties to the larger size.
                    for &d in &divisors {
                        let (sets_d, sets_s) = (total / d, total / s);
                        prop_assert!(sets_d > sets_s || (sets_d == sets_s && d <= s));
                    }
                }
                Err(_) => prop_assert!(divisors.is_empty()),
            }
        }
    }
}
