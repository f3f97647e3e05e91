use questkeeper_core::ports::MemoryHit;
use questkeeper_core::TurnId;

/// Filters external memory hits down to what a campaign is allowed to see
/// after a rewind. A hit is visible iff its `turn_id` does not exceed the
/// watermark; an unset watermark (a campaign never rewound) makes this a
/// no-op.
pub fn filter_memory_hits_by_visibility(
    hits: Vec<MemoryHit>,
    memory_visible_max_turn_id: Option<TurnId>,
) -> Vec<MemoryHit> {
    let Some(max_turn_id) = memory_visible_max_turn_id else {
        return hits;
    };
    hits.into_iter()
        .filter(|hit| hit.turn_id <= max_turn_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(turn_id: i64) -> MemoryHit {
        MemoryHit {
            turn_id: turn_id.into(),
            excerpt: format!("turn {turn_id}"),
            score_milli: 900,
        }
    }

    #[test]
    fn no_watermark_passes_everything_through() {
        let hits = vec![hit(1), hit(100)];
        let filtered = filter_memory_hits_by_visibility(hits.clone(), None);
        assert_eq!(filtered.len(), hits.len());
    }

    #[test]
    fn watermark_drops_hits_above_it() {
        let hits = vec![hit(5), hit(10), hit(15)];
        let filtered = filter_memory_hits_by_visibility(hits, Some(10.into()));
        let ids: Vec<i64> = filtered.iter().map(|h| h.turn_id.get()).collect();
        assert_eq!(ids, vec![5, 10]);
    }

    #[test]
    fn watermark_equal_to_turn_id_is_visible() {
        let filtered = filter_memory_hits_by_visibility(vec![hit(10)], Some(10.into()));
        assert_eq!(filtered.len(), 1);
    }
}
