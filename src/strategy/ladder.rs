//! Depth ladder: the bounded set of active scalps, one per depth slot.

use super::scalp::{Scalp, ScalpState};
use super::StrategyError;
use tracing::info;

/// Insertion-ordered collection of active scalps.
#[derive(Debug, Clone)]
pub struct DepthLadder {
    max_scalps: usize,
    scalps: Vec<Scalp>,
    /// Scalps whose leg 1 completed in the current run
    leg1_completed: u32,
}

impl DepthLadder {
    pub fn new(max_scalps: usize) -> Self {
        Self {
            max_scalps,
            scalps: Vec::with_capacity(max_scalps),
            leg1_completed: 0,
        }
    }

    pub fn max_scalps(&self) -> usize {
        self.max_scalps
    }

    pub fn len(&self) -> usize {
        self.scalps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalps.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.scalps.len() < self.max_scalps
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scalp> {
        self.scalps.iter()
    }

    /// Ids of all active scalps, in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.scalps.iter().map(|s| s.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Scalp> {
        self.scalps.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Scalp> {
        self.scalps.iter_mut().find(|s| s.id == id)
    }

    /// Add a scalp; fails once the ladder holds `max_scalps`.
    pub fn add_scalp(&mut self, scalp: Scalp) -> Result<(), StrategyError> {
        if !self.has_room() {
            return Err(StrategyError::LadderFull {
                max: self.max_scalps,
            });
        }
        self.scalps.push(scalp);
        Ok(())
    }

    /// Remove a scalp, announcing it before handing it back.
    pub fn remove_scalp(&mut self, id: &str) -> Option<Scalp> {
        let index = self.scalps.iter().position(|s| s.id == id)?;
        let scalp = self.scalps.remove(index);

        info!(
            scalp_id = %scalp.id,
            depth = scalp.depth,
            state = %scalp.state(),
            result = ?scalp.result(),
            active = self.scalps.len(),
            "Scalp removed from ladder"
        );
        Some(scalp)
    }

    /// Sorted depths of scalps in `state` or still `new`.
    pub fn depth_list(&self, state: ScalpState) -> Vec<u32> {
        let mut depths: Vec<u32> = self
            .scalps
            .iter()
            .filter(|s| s.state() == state || s.state() == ScalpState::New)
            .map(|s| s.depth)
            .collect();
        depths.sort_unstable();
        depths
    }

    /// Smallest free depths in `1..=max_depth`, at most as many as the
    /// ladder can still take.
    pub fn missed_scalps_depth(&self, state: ScalpState, max_depth: u32) -> Vec<u32> {
        let to_add = i64::from(max_depth) - self.scalps.len() as i64;
        if to_add <= 0 {
            return Vec::new();
        }

        let occupied = self.depth_list(state);
        (1..=max_depth)
            .filter(|depth| occupied.binary_search(depth).is_err())
            .take(to_add as usize)
            .collect()
    }

    /// Count a completed leg 1; returns the count for the current run.
    pub fn record_leg1_completed(&mut self) -> u32 {
        self.leg1_completed += 1;
        self.leg1_completed
    }

    pub fn leg1_completed(&self) -> u32 {
        self.leg1_completed
    }

    /// Start counting a new run.
    pub fn reset_run(&mut self) {
        self.leg1_completed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn scalp_at(depth: u32, state: ScalpState) -> Scalp {
        let ticker = Decimal::ONE;
        let mut scalp = Scalp::new(
            "BTC/USDT",
            "USDT",
            dec!(1),
            depth,
            ticker * Decimal::from(depth),
            "BTC",
            dec!(0.001),
        );
        scalp.force_state(state);
        scalp
    }

    #[test]
    fn test_depth_list() {
        let mut scalps = DepthLadder::new(10);
        assert_eq!(scalps.depth_list(ScalpState::Order1), Vec::<u32>::new());

        for i in 1..=10 {
            scalps.add_scalp(scalp_at(i, ScalpState::Order1)).unwrap();
        }
        assert_eq!(
            scalps.depth_list(ScalpState::Order1),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
        );

        let mut scalps = DepthLadder::new(10);
        for i in 1..=10 {
            let state = if i < 5 {
                ScalpState::Order2
            } else {
                ScalpState::Order1
            };
            scalps.add_scalp(scalp_at(i, state)).unwrap();
        }
        assert_eq!(scalps.depth_list(ScalpState::Order1), vec![5, 6, 7, 8, 9, 10]);

        let missed = scalps.missed_scalps_depth(ScalpState::Order1, 15);
        assert_eq!(missed.len(), 5);
        assert_eq!(missed, vec![1, 2, 3, 4, 11]);
    }

    #[test]
    fn test_new_scalps_reserve_their_depth() {
        let mut scalps = DepthLadder::new(5);
        scalps.add_scalp(scalp_at(2, ScalpState::New)).unwrap();
        scalps.add_scalp(scalp_at(4, ScalpState::Order1)).unwrap();
        scalps.add_scalp(scalp_at(1, ScalpState::Order1Complete)).unwrap();

        assert_eq!(scalps.depth_list(ScalpState::Order1), vec![2, 4]);
        // depth 1 is past leg 1 and no longer reserves its slot
        assert_eq!(scalps.missed_scalps_depth(ScalpState::Order1, 5), vec![1, 3]);
    }

    #[test]
    fn test_missed_depth_bounded_by_room() {
        let mut scalps = DepthLadder::new(3);
        assert_eq!(scalps.missed_scalps_depth(ScalpState::Order1, 3), vec![1, 2, 3]);

        for i in 1..=3 {
            scalps.add_scalp(scalp_at(i, ScalpState::Order2)).unwrap();
        }
        assert!(scalps.missed_scalps_depth(ScalpState::Order1, 3).is_empty());
        assert!(scalps.missed_scalps_depth(ScalpState::Order1, 2).is_empty());
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let mut scalps = DepthLadder::new(4);
        let mut ids = Vec::new();

        for step in 0..40u32 {
            if step % 3 == 2 && !ids.is_empty() {
                let id: String = ids.remove(0);
                assert!(scalps.remove_scalp(&id).is_some());
            } else {
                let scalp = scalp_at(step % 4 + 1, ScalpState::New);
                let id = scalp.id.clone();
                match scalps.add_scalp(scalp) {
                    Ok(()) => ids.push(id),
                    Err(StrategyError::LadderFull { max }) => assert_eq!(max, 4),
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            assert!(scalps.len() <= scalps.max_scalps());
        }
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut scalps = DepthLadder::new(3);
        let first = scalp_at(1, ScalpState::Order1);
        let second = scalp_at(2, ScalpState::Order1);
        let third = scalp_at(3, ScalpState::Order1);
        let (id1, id2, id3) = (first.id.clone(), second.id.clone(), third.id.clone());

        for s in [first, second, third] {
            scalps.add_scalp(s).unwrap();
        }

        let removed = scalps.remove_scalp(&id2).unwrap();
        assert_eq!(removed.depth, 2);
        assert!(scalps.remove_scalp(&id2).is_none());
        assert_eq!(scalps.ids(), vec![id1, id3]);
        assert!(scalps.has_room());
    }

    #[test]
    fn test_run_counter() {
        let mut scalps = DepthLadder::new(2);
        assert_eq!(scalps.record_leg1_completed(), 1);
        assert_eq!(scalps.record_leg1_completed(), 2);
        scalps.reset_run();
        assert_eq!(scalps.leg1_completed(), 0);
    }
}
