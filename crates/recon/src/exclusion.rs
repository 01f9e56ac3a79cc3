use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::normalize::{name_key, IdentityKey};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Excluded {
    birth: Option<NaiveDate>,
    reason: String,
}

/// People who must not be migrated, keyed by normalized full name.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    by_name: BTreeMap<String, Vec<Excluded>>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, surname: &str, given_name: &str, birth: Option<NaiveDate>, reason: impl Into<String>) {
        self.by_name
            .entry(name_key(surname, given_name))
            .or_default()
            .push(Excluded { birth, reason: reason.into() });
    }

    /// Reason the identity is excluded, if it is.
    ///
    /// The whole normalized name must match; birth dates only count when both
    /// sides carry one.
    pub fn lookup(&self, key: &IdentityKey) -> Option<&str> {
        self.by_name.get(&key.name)?.iter().find_map(|e| {
            let birth_agrees = match (e.birth, key.birth) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            };
            birth_agrees.then_some(e.reason.as_str())
        })
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, birth: Option<(i32, u32, u32)>) -> IdentityKey {
        IdentityKey { name: name.into(), birth: birth.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)) }
    }

    fn set() -> ExclusionSet {
        let mut set = ExclusionSet::new();
        set.insert("Muster", "Hans", NaiveDate::from_ymd_opt(1970, 1, 1), "2 ranks, 1 function in Fox112 history");
        set.insert(" Beispiel ", "Erika", None, "1 rank, 0 functions in Fox112 history");
        set
    }

    #[test]
    fn full_name_and_birth_date_exclude() {
        let set = set();
        assert_eq!(
            set.lookup(&key("muster, hans", Some((1970, 1, 1)))),
            Some("2 ranks, 1 function in Fox112 history")
        );
        assert!(set.lookup(&key("muster, hans", None)).is_some());
        assert!(set.lookup(&key("beispiel, erika", Some((1990, 3, 3)))).is_some());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn different_birth_date_is_someone_else() {
        assert!(set().lookup(&key("muster, hans", Some((1971, 1, 1)))).is_none());
    }

    #[test]
    fn partial_names_never_exclude() {
        let set = set();
        assert!(set.lookup(&key("muster", None)).is_none());
        assert!(set.lookup(&key("muster, hans peter", None)).is_none());
        assert!(set.lookup(&key("muster, han", None)).is_none());
    }
}
