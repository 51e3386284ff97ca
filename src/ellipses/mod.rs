use std::slice::Iter;

use anyhow::{anyhow, bail};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Regex to extract ellipses syntax inputs.
    static ref REGEX_ELLIPSES: Regex =
        Regex::new(r#"(.*)(\{[0-9a-z]*\.\.\.[0-9a-z]*\})(.*)"#).unwrap();
}

// Ellipses constants
const OPEN_BRACES: char = '{';
const CLOSE_BRACES: char = '}';
const ELLIPSES: &str = "...";

// Ellipses pattern, describes the range and also the
// associated prefix and suffixes.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub prefix: String,
    pub suffix: String,
    pub seq: Vec<String>,
}

// A list of patterns provided in the input.
#[derive(Clone, Debug)]
pub struct ArgPattern(Vec<Pattern>);

impl ArgPattern {
    // Expands all the ellipses patterns in the given argument.
    pub fn expand(&self) -> Vec<Vec<String>> {
        let mut labels = Vec::with_capacity(self.0.len());
        for v in &self.0 {
            labels.push(v.expand());
        }
        arg_expander(&labels)
    }

    pub fn iter(&self) -> Iter<'_, Pattern> {
        self.0.iter()
    }

    // The number of label tuples `expand` will produce.
    pub fn total_size(&self) -> usize {
        self.0.iter().map(|p| p.seq.len()).product()
    }
}

impl Pattern {
    // Expands a single ellipses pattern into its labels.
    pub fn expand(&self) -> Vec<String> {
        self.seq
            .iter()
            .map(|s| format!("{}{}{}", self.prefix, s, self.suffix))
            .collect()
    }
}

// Parses an ellipses range pattern of following style
// `{1...64}`
// `{33...64}`
fn parse_ellipses_range(pattern: &str) -> anyhow::Result<Vec<String>> {
    if !pattern.contains(OPEN_BRACES) || !pattern.contains(CLOSE_BRACES) {
        bail!("invalid argument");
    }
    let pattern = pattern.trim_matches(|c| c == OPEN_BRACES || c == CLOSE_BRACES);
    let ellipses_range: Vec<&str> = pattern.split(ELLIPSES).collect();
    if ellipses_range.len() != 2 {
        bail!("invalid argument");
    }
    let mut hexadecimal = false;
    let start = if let Ok(start) = ellipses_range[0].parse::<u64>() {
        start
    } else {
        // Look for hexadecimal conversions if any.
        hexadecimal = true;
        u64::from_str_radix(ellipses_range[0], 16)?
    };
    let end = if let Ok(end) = ellipses_range[1].parse::<u64>() {
        end
    } else {
        // Look for hexadecimal conversions if any.
        hexadecimal = true;
        u64::from_str_radix(ellipses_range[1], 16)?
    };
    if start > end {
        bail!(
            "Incorrect range start {} cannot be bigger than end {}",
            start,
            end
        );
    }

    let mut seq = Vec::new();
    for i in start..=end {
        if ellipses_range[0].starts_with('0') && ellipses_range[0].len() > 1
            || ellipses_range[1].starts_with('0')
        {
            // Zero padded values carry the width of the wider bound.
            if hexadecimal {
                seq.push(format!("{:0width$x}", i, width = ellipses_range[1].len()));
            } else {
                seq.push(format!("{:0width$}", i, width = ellipses_range[1].len()));
            }
        } else if hexadecimal {
            seq.push(format!("{:x}", i));
        } else {
            seq.push(format!("{}", i));
        }
    }
    Ok(seq)
}

// Recursively expands labels into their respective forms. The first label
// list belongs to the rightmost pattern, which therefore varies slowest;
// each produced tuple is ordered left to right for concatenation.
fn arg_expander(labels: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = Vec::new();
    if labels.len() == 1 {
        for v in &labels[0] {
            out.push(vec![v.to_owned()]);
        }
        return out;
    }
    for lbl in &labels[0] {
        for mut r in arg_expander(&labels[1..]) {
            r.push(lbl.to_owned());
            out.push(r);
        }
    }
    out
}

// Returns true if every input arg has an ellipses type pattern.
pub fn has_ellipses(args: &[&str]) -> bool {
    args.iter()
        .all(|&a| a.contains(ELLIPSES) || (a.contains(OPEN_BRACES) && a.contains(CLOSE_BRACES)))
}

fn err_invalid_ellipses_format(arg: &str) -> anyhow::Error {
    anyhow!(
        "Invalid ellipsis format in '{}', Ellipsis range must be provided in format {{N...M}} where N and M are positive integers, M must be greater than N",
        arg
    )
}

// Finds all ellipses patterns, recursively, and parses the ranges
// numerically. Patterns are collected right to left.
pub fn find_ellipses_patterns(arg: &str) -> anyhow::Result<ArgPattern> {
    // We throw an error if arg doesn't have any recognizable ellipses pattern.
    let caps = REGEX_ELLIPSES
        .captures(arg)
        .ok_or_else(|| err_invalid_ellipses_format(arg))?;
    let mut head = caps[1].to_owned();
    let mut range = caps[2].to_owned();
    let mut tail = caps[3].to_owned();

    let mut patterns: Vec<Pattern> = Vec::new();
    let mut pattern_found = REGEX_ELLIPSES.is_match(&head);
    while pattern_found {
        let seq = parse_ellipses_range(&range)?;
        patterns.push(Pattern {
            prefix: String::new(),
            suffix: tail.clone(),
            seq,
        });
        match REGEX_ELLIPSES.captures(&head) {
            Some(caps) => {
                let new_head = caps[1].to_owned();
                range = caps[2].to_owned();
                tail = caps[3].to_owned();
                head = new_head;
                pattern_found = has_ellipses(&[&head]);
            }
            None => break,
        }
    }

    let seq = parse_ellipses_range(&range)?;
    patterns.push(Pattern {
        prefix: head,
        suffix: tail,
        seq,
    });

    // Check if any of the prefix or suffixes now have flower braces
    // left over, in such a case we generally think that there is
    // perhaps a typo in users input and error out accordingly.
    for pattern in &patterns {
        if pattern.prefix.contains(OPEN_BRACES)
            || pattern.prefix.contains(CLOSE_BRACES)
            || pattern.suffix.contains(OPEN_BRACES)
            || pattern.suffix.contains(CLOSE_BRACES)
        {
            return Err(err_invalid_ellipses_format(arg));
        }
    }

    Ok(ArgPattern(patterns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_ellipses() {
        let cases = [
            // Tests for all args without ellipses.
            (vec!["64"], false),
            // Found flower braces, still attempt to parse and throw an error.
            (vec!["{1..64}"], true),
            (vec!["{1..2..}"], true),
            // Test for valid input.
            (vec!["1...64"], true),
            (vec!["{1...2O}"], true),
            (vec!["..."], true),
            (vec!["{-1...1}"], true),
            (vec!["{0...-1}"], true),
            (vec!["{1....4}"], true),
            (vec!["{1...64}"], true),
            (vec!["{...}"], true),
            (vec!["{1...64}", "{65...128}"], true),
            (vec!["http://node{2...3}/export/set{1...64}"], true),
            (
                vec![
                    "http://node{2...3}/export/set{1...64}",
                    "http://node{2...3}/export/set{65...128}",
                ],
                true,
            ),
            (vec!["mydisk-{a...z}{1...20}"], true),
            (vec!["mydisk-{1...4}{1..2.}"], true),
        ];

        for (i, (args, expected_ok)) in cases.iter().enumerate() {
            let got_ok = has_ellipses(args);
            assert_eq!(
                got_ok,
                *expected_ok,
                "Test {}: expected {}, got {}",
                i + 1,
                *expected_ok,
                got_ok
            );
        }
    }

    #[test]
    fn test_find_ellipses_patterns() {
        let cases = [
            // Tests for all invalid inputs
            ("{1..64}", false, 0),
            ("1...64", false, 0),
            ("...", false, 0),
            ("{1...", false, 0),
            ("...64}", false, 0),
            ("{...}", false, 0),
            ("{-1...1}", false, 0),
            ("{0...-1}", false, 0),
            ("{1...2O}", false, 0),
            ("{64...1}", false, 0),
            ("{1....4}", false, 0),
            ("mydisk-{a...z}{1...20}", false, 0),
            ("mydisk-{1...4}{1..2.}", false, 0),
            ("{1..2.}-mydisk-{1...4}", false, 0),
            ("{{1...4}}", false, 0),
            ("{4...02}", false, 0),
            ("{f...z}", false, 0),
            // Test for valid input.
            ("{1...64}", true, 64),
            ("{1...64} {65...128}", true, 4096),
            ("{01...036}", true, 36),
            ("{001...036}", true, 36),
            ("{1...a}", true, 10),
        ];

        for (i, (pattern, expected_success, expected_count)) in cases.iter().enumerate() {
            match find_ellipses_patterns(pattern) {
                Ok(arg_pat) => {
                    assert!(
                        *expected_success,
                        "Test {}: expected failure but passed instead",
                        i + 1,
                    );
                    let got_count = arg_pat.expand().len();
                    assert_eq!(
                        got_count,
                        *expected_count,
                        "Test {}: expected {}, got {}",
                        i + 1,
                        *expected_count,
                        got_count
                    );
                    assert_eq!(arg_pat.total_size(), got_count);
                }
                Err(err) => assert!(
                    !*expected_success,
                    "Test {}: expected success but failed instead {:?}",
                    i + 1,
                    err
                ),
            }
        }
    }

    #[test]
    fn test_expand_tuple_order() {
        // Tuples concatenate left to right; the rightmost range varies
        // slowest so consecutive endpoints cycle through the left range.
        let arg_pat = find_ellipses_patterns("http://node{1...2}/disk{1...2}").unwrap();
        let endpoints: Vec<String> = arg_pat.expand().iter().map(|lbls| lbls.concat()).collect();
        assert_eq!(
            endpoints,
            vec![
                "http://node1/disk1",
                "http://node2/disk1",
                "http://node1/disk2",
                "http://node2/disk2",
            ]
        );
    }

    #[test]
    fn test_zero_padded_expansion() {
        let arg_pat = find_ellipses_patterns("disk{01...04}").unwrap();
        let labels: Vec<String> = arg_pat.expand().iter().map(|lbls| lbls.concat()).collect();
        assert_eq!(labels, vec!["disk01", "disk02", "disk03", "disk04"]);
    }
}
