use crate::error::Result;
use crate::types::SectionKey;
use std::collections::HashMap;
use std::sync::Arc;

/// Membership predicate derived from the tuples recorded under one role key.
///
/// Matching is exact and positional: the predicate is true iff some recorded
/// tuple agrees with every provided argument at its position. There is no
/// transitive closure over role assignments.
#[derive(Debug, Clone)]
pub struct RolePredicate {
    tuples: Arc<Vec<Vec<String>>>,
}

impl RolePredicate {
    /// Returns whether some recorded tuple matches the arguments position-wise.
    pub fn matches(&self, args: &[&str]) -> bool {
        self.tuples.iter().any(|tuple| {
            args.iter()
                .enumerate()
                .all(|(i, arg)| tuple.get(i).is_some_and(|value| value == arg))
        })
    }

    /// Returns the recorded tuples.
    pub fn tuples(&self) -> &[Vec<String>] {
        &self.tuples
    }
}

/// Role grouping rows folded into per-key membership predicates.
#[derive(Debug, Default, Clone)]
pub struct RoleRegistry {
    groups: HashMap<SectionKey, RolePredicate>,
}

impl RoleRegistry {
    /// Folds `[group_key, values...]` rows into a registry.
    ///
    /// Empty rows are skipped; rows keyed by an invalid token are rejected.
    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self> {
        let mut tuples: HashMap<SectionKey, Vec<Vec<String>>> = HashMap::new();
        for row in rows {
            let Some((token, values)) = row.split_first() else {
                continue;
            };
            let key = SectionKey::new(token)?;
            tuples.entry(key).or_default().push(values.to_vec());
        }

        let groups = tuples
            .into_iter()
            .map(|(key, tuples)| {
                (
                    key,
                    RolePredicate {
                        tuples: Arc::new(tuples),
                    },
                )
            })
            .collect();
        Ok(Self { groups })
    }

    /// Returns the membership predicate recorded under a key, if any.
    pub fn predicate(&self, key: &str) -> Option<RolePredicate> {
        self.groups.get(key).cloned()
    }

    /// Returns whether the tuple formed by `args` was recorded under `key`.
    ///
    /// Unknown keys answer `false`.
    pub fn contains(&self, key: &str, args: &[&str]) -> bool {
        self.groups
            .get(key)
            .is_some_and(|predicate| predicate.matches(args))
    }

    /// Iterates over the recorded role keys and their predicates.
    pub fn iter(&self) -> impl Iterator<Item = (&SectionKey, &RolePredicate)> {
        self.groups.iter()
    }

    /// Returns whether no rows were recorded.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
