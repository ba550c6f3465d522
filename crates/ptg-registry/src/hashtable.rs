//! A small bucketed hash table used as the registry's name index, grounded
//! on PaRSEC's `parsec_hash_table` contract: buckets grow (by doubling the
//! bit width and rehashing) once any bucket exceeds `max_collisions`.
//! Unlike the original this is not itself safe for concurrent resize —
//! the registry is frozen before any worker starts, so all mutation
//! happens single-threaded during program load (Section 4.B).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct NameIndex<V> {
    nb_bits: u32,
    buckets: Vec<Vec<(String, V)>>,
    max_collisions: usize,
}

impl<V: Clone> NameIndex<V> {
    pub fn new(max_collisions: usize) -> Self {
        let nb_bits = 4;
        Self {
            nb_bits,
            buckets: (0..(1u32 << nb_bits)).map(|_| Vec::new()).collect(),
            max_collisions,
        }
    }

    fn bucket_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let h = hasher.finish();
        (h & ((1u64 << self.nb_bits) - 1)) as usize
    }

    pub fn insert(&mut self, key: String, value: V) {
        let idx = self.bucket_index(&key);
        self.buckets[idx].push((key, value));
        if self.buckets[idx].len() > self.max_collisions {
            self.grow();
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        let idx = self.bucket_index(key);
        self.buckets[idx]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn grow(&mut self) {
        self.nb_bits += 1;
        let mut new_buckets: Vec<Vec<(String, V)>> =
            (0..(1u32 << self.nb_bits)).map(|_| Vec::new()).collect();
        for bucket in self.buckets.drain(..) {
            for (k, v) in bucket {
                let mut hasher = DefaultHasher::new();
                k.hash(&mut hasher);
                let h = hasher.finish();
                let idx = (h & ((1u64 << self.nb_bits) - 1)) as usize;
                new_buckets[idx].push((k, v));
            }
        }
        self.buckets = new_buckets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_when_a_bucket_overflows() {
        let mut idx: NameIndex<u32> = NameIndex::new(2);
        for i in 0..50 {
            idx.insert(format!("class_{i}"), i);
        }
        for i in 0..50 {
            assert_eq!(idx.get(&format!("class_{i}")), Some(&i));
        }
    }
}
