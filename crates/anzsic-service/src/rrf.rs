//! Reciprocal Rank Fusion.
//!
//! `score(code) = sum over lists of 1 / (k + rank)`, with a single `k`
//! weighting both lists equally. Pure arithmetic: no I/O, no shared state,
//! identical inputs always produce identical output order.

use std::{cmp::Ordering, collections::BTreeMap};

/// Fused score and provenance for one code.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedHit {
	pub code: String,
	pub rrf_score: f64,
	pub in_vector: bool,
	pub in_fts: bool,
	pub vector_rank: Option<u32>,
	pub fts_rank: Option<u32>,
}
impl FusedHit {
	/// The better of the contributing ranks; used as the tie-break key.
	fn best_rank(&self) -> u32 {
		self.vector_rank
			.unwrap_or(u32::MAX)
			.min(self.fts_rank.unwrap_or(u32::MAX))
	}
}

/// Fuses two ranked `(code, rank)` lists into a single ordering.
///
/// Ordering is score descending, then best contributing rank ascending, then
/// code ascending, so the result is reproducible regardless of input
/// permutation or map iteration order. A code duplicated within one list
/// keeps its best (smallest) rank; contributions are never summed twice.
///
/// Panics if `k` is zero; configuration validation rejects that long before a
/// query reaches this point.
pub fn fuse(
	vector_hits: &[(String, u32)],
	fts_hits: &[(String, u32)],
	k: u32,
) -> Vec<FusedHit> {
	assert!(k > 0, "RRF k must be greater than zero.");

	let mut ranks: BTreeMap<&str, (Option<u32>, Option<u32>)> = BTreeMap::new();

	for (code, rank) in vector_hits {
		let entry = ranks.entry(code.as_str()).or_default();

		entry.0 = Some(entry.0.map_or(*rank, |existing| existing.min(*rank)));
	}
	for (code, rank) in fts_hits {
		let entry = ranks.entry(code.as_str()).or_default();

		entry.1 = Some(entry.1.map_or(*rank, |existing| existing.min(*rank)));
	}

	let mut fused: Vec<FusedHit> = ranks
		.into_iter()
		.map(|(code, (vector_rank, fts_rank))| {
			let mut score = 0.0;

			if let Some(rank) = vector_rank {
				score += 1.0 / f64::from(k + rank);
			}
			if let Some(rank) = fts_rank {
				score += 1.0 / f64::from(k + rank);
			}

			FusedHit {
				code: code.to_string(),
				rrf_score: score,
				in_vector: vector_rank.is_some(),
				in_fts: fts_rank.is_some(),
				vector_rank,
				fts_rank,
			}
		})
		.collect();

	fused.sort_by(|left, right| {
		cmp_score_desc(left.rrf_score, right.rrf_score)
			.then_with(|| left.best_rank().cmp(&right.best_rank()))
			.then_with(|| left.code.cmp(&right.code))
	});

	fused
}

fn cmp_score_desc(a: f64, b: f64) -> Ordering {
	b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
