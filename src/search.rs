use crate::ann::RandomProjectionIndex;
use crate::config::{Number, SearchMethod};
use crate::vector_entry::StoreEntry;
use crate::vector_ops::{dot_simd, is_degenerate, similarity_from_parts};
use rayon::prelude::*;

/// Score of one stored entry, addressed by insertion index.
#[derive(Debug, Clone, Copy)]
pub struct Scored {
    pub index: usize,
    pub score: Number,
}

fn score_entry(query: &[Number], query_magnitude: Number, entry: &StoreEntry) -> Number {
    // A stored zero vector has no direction; it neither matches nor opposes.
    if is_degenerate(entry.magnitude) {
        return 0.0;
    }
    similarity_from_parts(
        dot_simd(query, &entry.vector),
        query_magnitude,
        entry.magnitude,
    )
}

/// Scores every entry. Output stays in insertion order.
pub fn exact_search(entries: &[StoreEntry], query: &[Number], query_magnitude: Number) -> Vec<Scored> {
    entries
        .par_iter()
        .enumerate()
        .map(|(index, entry)| Scored {
            index,
            score: score_entry(query, query_magnitude, entry),
        })
        .collect()
}

/// Scores only the LSH candidates, falling back to the full scan when the
/// index proposes fewer than `top_k`.
pub fn hybrid_search(
    entries: &[StoreEntry],
    index: &RandomProjectionIndex,
    query: &[Number],
    query_magnitude: Number,
    top_k: usize,
) -> Vec<Scored> {
    let candidates = index.candidates(query);
    if candidates.len() < top_k {
        tracing::debug!(
            candidates = candidates.len(),
            top_k,
            "Too few ANN candidates, performing exact search"
        );
        return exact_search(entries, query, query_magnitude);
    }

    candidates
        .par_iter()
        .map(|&i| Scored {
            index: i,
            score: score_entry(query, query_magnitude, &entries[i]),
        })
        .collect()
}

/// Descending by score. `sort_by` is stable, so equal scores keep the order
/// they came in (insertion order for both search paths).
pub fn sort_and_limit_results(mut results: Vec<Scored>, limit: usize) -> Vec<Scored> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}

pub fn run(
    method: SearchMethod,
    entries: &[StoreEntry],
    index: Option<&RandomProjectionIndex>,
    query: &[Number],
    query_magnitude: Number,
    top_k: usize,
) -> Vec<Scored> {
    let all = match (method, index) {
        (SearchMethod::Hybrid, Some(index)) => {
            hybrid_search(entries, index, query, query_magnitude, top_k)
        }
        _ => exact_search(entries, query, query_magnitude),
    };
    sort_and_limit_results(all, top_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_ops::magnitude;

    fn entry(text: &str, vector: Vec<Number>) -> StoreEntry {
        StoreEntry {
            text: text.to_string(),
            magnitude: magnitude(&vector),
            vector,
        }
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let results = vec![
            Scored { index: 0, score: 0.5 },
            Scored { index: 1, score: 0.9 },
            Scored { index: 2, score: 0.5 },
            Scored { index: 3, score: 0.9 },
        ];
        let sorted = sort_and_limit_results(results, 4);
        let order: Vec<_> = sorted.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_zero_stored_vector_scores_zero() {
        let entries = vec![entry("zero", vec![0.0, 0.0]), entry("x", vec![1.0, 0.0])];
        let scored = exact_search(&entries, &[1.0, 0.0], 1.0);
        assert_eq!(scored[0].score, 0.0);
        assert!((scored[1].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hybrid_falls_back_when_short_of_candidates() {
        let entries = vec![
            entry("a", vec![1.0, 0.0, 0.0, 0.0]),
            entry("b", vec![-1.0, 0.0, 0.0, 0.0]),
        ];
        let mut index = RandomProjectionIndex::new(4, 2, 1);
        index.add(&entries[0].vector, 0);
        index.add(&entries[1].vector, 1);

        let results = run(
            SearchMethod::Hybrid,
            &entries,
            Some(&index),
            &[1.0, 0.0, 0.0, 0.0],
            1.0,
            2,
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
    }
}
