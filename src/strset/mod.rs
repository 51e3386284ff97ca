use std::collections::HashSet;
use std::fmt;

// A set of strings with sorted slice output, used wherever the
// order of presentation must be stable (error messages, logs).
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct StringSet(HashSet<String>);

impl StringSet {
    pub fn new() -> StringSet {
        StringSet(HashSet::new())
    }

    pub fn from_slice(ss: &[&str]) -> StringSet {
        StringSet(ss.iter().map(|&s| s.into()).collect())
    }

    pub fn from_vec(ss: Vec<String>) -> StringSet {
        StringSet(ss.into_iter().collect())
    }

    pub fn as_slice(&self) -> Vec<&str> {
        let mut ss: Vec<&str> = self.0.iter().map(|s| s as &str).collect();
        ss.sort_unstable();
        ss
    }

    pub fn to_vec(&self) -> Vec<String> {
        let mut ss: Vec<String> = self.0.iter().cloned().collect();
        ss.sort_unstable();
        ss
    }

    pub fn iter(&self) -> std::collections::hash_set::Iter<'_, String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn add(&mut self, s: String) {
        self.0.insert(s);
    }

    pub fn remove(&mut self, s: &str) {
        self.0.remove(s);
    }

    pub fn contains(&self, s: &str) -> bool {
        self.0.contains(s)
    }

    pub fn apply_fn<F>(&self, apply_fn: F) -> StringSet
    where
        F: Fn(&str) -> String,
    {
        StringSet(self.0.iter().map(|s| apply_fn(s)).collect())
    }

    pub fn intersection(&self, other: &StringSet) -> StringSet {
        StringSet(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn union(&self, other: &StringSet) -> StringSet {
        StringSet(self.0.union(&other.0).cloned().collect())
    }
}

impl Default for StringSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StringSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.as_slice().join(","))
    }
}

impl std::iter::FromIterator<String> for StringSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        StringSet(iter.into_iter().collect())
    }
}

impl IntoIterator for StringSet {
    type Item = String;
    type IntoIter = std::collections::hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection() {
        let a = StringSet::from_slice(&["a", "b", "c"]);
        let b = StringSet::from_slice(&["b", "c", "d"]);
        assert_eq!(a.intersection(&b).as_slice(), vec!["b", "c"]);
        assert!(a.intersection(&StringSet::new()).is_empty());
    }

    #[test]
    fn test_display_is_sorted() {
        let s = StringSet::from_slice(&["z", "a", "m"]);
        assert_eq!(s.to_string(), "[a,m,z]");
    }
}
