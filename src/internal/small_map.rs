// SPDX-License-Identifier: MPL-2.0

use std::hash::Hash;

use crate::internal::SmallVec;
use crate::Map;

/// How many entries a [SmallMap] holds before moving to the heap.
const INLINE_LIMIT: usize = 2;

/// A map for a handful of entries.
///
/// Nearly every incompatibility relates one or two packages, so the map
/// starts as a short association list scanned linearly, and only becomes a
/// real hash map once a third key shows up. It never goes back.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SmallMap<K: Eq + Hash, V> {
    Inline(SmallVec<(K, V)>),
    Hashed(Map<K, V>),
}

impl<K: Eq + Hash, V> Default for SmallMap<K, V> {
    fn default() -> Self {
        Self::Inline(SmallVec::new())
    }
}

impl<K: PartialEq + Eq + Hash, V> SmallMap<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        match self {
            Self::Inline(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Self::Hashed(map) => map.get(key),
        }
    }

    /// Insert a value, replacing the previous one under an equal key.
    pub fn insert(&mut self, key: K, value: V) {
        match self {
            Self::Inline(pairs) => {
                if let Some(pair) = pairs.iter_mut().find(|(k, _)| *k == key) {
                    pair.1 = value;
                } else if pairs.len() < INLINE_LIMIT {
                    pairs.push((key, value));
                } else {
                    let mut map: Map<K, V> = pairs.drain(..).collect();
                    map.insert(key, value);
                    *self = Self::Hashed(map);
                }
            }
            Self::Hashed(map) => {
                map.insert(key, value);
            }
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        match self {
            Self::Inline(pairs) => {
                let at = pairs.iter().position(|(k, _)| k == key)?;
                Some(pairs.remove(at).1)
            }
            Self::Hashed(map) => map.remove(key),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Inline(pairs) => pairs.len(),
            Self::Hashed(map) => map.len(),
        }
    }

    pub fn iter(&self) -> SmallMapIter<'_, K, V> {
        match self {
            Self::Inline(pairs) => SmallMapIter::Inline(pairs.iter()),
            Self::Hashed(map) => SmallMapIter::Hashed(map.iter()),
        }
    }
}

impl<K: PartialEq + Eq + Hash, V> FromIterator<(K, V)> for SmallMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

pub enum SmallMapIter<'a, K, V> {
    Inline(std::slice::Iter<'a, (K, V)>),
    Hashed(std::collections::hash_map::Iter<'a, K, V>),
}

impl<'a, K, V> Iterator for SmallMapIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Inline(pairs) => pairs.next().map(|(k, v)| (k, v)),
            Self::Hashed(entries) => entries.next(),
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_inline_up_to_the_limit() {
        let mut map: SmallMap<u32, &str> = SmallMap::default();
        map.insert(1, "a");
        map.insert(2, "b");
        assert!(matches!(map, SmallMap::Inline(_)));
        // Replacing a key does not force a promotion.
        map.insert(2, "b2");
        assert!(matches!(map, SmallMap::Inline(_)));
        assert_eq!(map.get(&2), Some(&"b2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn promotes_to_a_hash_map_on_the_third_key() {
        let mut map: SmallMap<u32, &str> = SmallMap::default();
        for (k, v) in [(1, "a"), (2, "b"), (3, "c")] {
            map.insert(k, v);
        }
        assert!(matches!(map, SmallMap::Hashed(_)));
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&1), Some(&"a"));
        assert_eq!(map.get(&3), Some(&"c"));
        assert_eq!(map.get(&4), None);
    }

    #[test]
    fn removal_works_in_both_representations() {
        let mut inline: SmallMap<u32, u32> = [(1, 10), (2, 20)].into_iter().collect();
        assert_eq!(inline.remove(&1), Some(10));
        assert_eq!(inline.remove(&1), None);
        assert_eq!(inline.len(), 1);

        let mut hashed: SmallMap<u32, u32> = [(1, 10), (2, 20), (3, 30)].into_iter().collect();
        assert_eq!(hashed.remove(&2), Some(20));
        assert_eq!(hashed.len(), 2);
        assert_eq!(hashed.get(&2), None);
    }

    #[test]
    fn iteration_yields_every_entry() {
        let map: SmallMap<u32, u32> = [(1, 10), (2, 20), (3, 30)].into_iter().collect();
        let mut seen: Vec<(u32, u32)> = map.iter().map(|(&k, &v)| (k, v)).collect();
        seen.sort();
        assert_eq!(seen, [(1, 10), (2, 20), (3, 30)]);
    }
}
