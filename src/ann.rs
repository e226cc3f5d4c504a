use rand::prelude::*;
use rand_distr::{Distribution, StandardNormal};
use std::collections::{BTreeSet, HashMap};

use crate::config::Number;

const SEED: u64 = 42;

/// Random-hyperplane LSH over entry indices.
///
/// Only proposes candidates; the caller re-scores them exactly. A vector
/// always lands in its own bucket, so querying with a stored vector finds it.
pub struct RandomProjectionIndex {
    random_vectors: Vec<Vec<Number>>,
    hash_tables: Vec<HashMap<u64, Vec<usize>>>,
    num_tables: usize,
    num_projections: usize,
}

impl RandomProjectionIndex {
    pub fn new(dim: usize, num_projections: usize, num_tables: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(SEED);

        let random_vectors: Vec<Vec<Number>> = (0..num_tables * num_projections)
            .map(|_| {
                (0..dim)
                    .map(|_| -> Number { StandardNormal.sample(&mut rng) })
                    .collect()
            })
            .collect();

        tracing::debug!(
            dim,
            num_projections,
            num_tables,
            "Initialized random projection index"
        );

        RandomProjectionIndex {
            random_vectors,
            hash_tables: vec![HashMap::new(); num_tables],
            num_tables,
            num_projections,
        }
    }

    fn hash_vector(&self, vector: &[Number], table_index: usize) -> u64 {
        let start = table_index * self.num_projections;
        let end = start + self.num_projections;

        self.random_vectors[start..end]
            .iter()
            .map(|rv| {
                rv.iter()
                    .zip(vector.iter())
                    .map(|(&a, &b)| a * b)
                    .sum::<Number>()
            })
            .enumerate()
            .fold(0u64, |acc, (i, proj)| {
                if proj >= 0.0 {
                    acc | (1 << i)
                } else {
                    acc
                }
            })
    }

    pub fn add(&mut self, vector: &[Number], index: usize) {
        for i in 0..self.num_tables {
            let hash = self.hash_vector(vector, i);
            self.hash_tables[i].entry(hash).or_default().push(index);
        }
    }

    /// Entry indices sharing a bucket with `query` (or a bucket one bit away)
    /// in any table, in ascending order.
    pub fn candidates(&self, query: &[Number]) -> Vec<usize> {
        let mut candidates = BTreeSet::new();

        for (i, table) in self.hash_tables.iter().enumerate() {
            let query_hash = self.hash_vector(query, i);

            if let Some(bucket) = table.get(&query_hash) {
                candidates.extend(bucket.iter().copied());
            }

            // Multi-probe
            for j in 0..self.num_projections {
                if let Some(bucket) = table.get(&(query_hash ^ (1 << j))) {
                    candidates.extend(bucket.iter().copied());
                }
            }
        }

        candidates.into_iter().collect()
    }
}
