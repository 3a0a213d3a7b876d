//! Merge engine: group registry, proximity test, cascading merges, completion.
//!
//! Every piece starts in its own group. After each release the released group is
//! moved rigidly to its new origin, then seams are tested against grid neighbours
//! in a fixed order (ascending piece id, then stored adjacency order). Each hit
//! fuses two groups and the test runs again until nothing else lines up, so a
//! single drop can join any number of groups.

use crate::error::PuzzleError;
use crate::grid::{Direction, GroupId, Piece, PieceGrid, PieceId};
use std::collections::{BTreeMap, BTreeSet};

/// Divisor applied to the smaller piece dimension to get the merge tolerance.
const TOLERANCE_DIVISOR: f64 = 5.0;

/// One fused seam: `piece` (in the released group) met `neighbor` (in `absorbed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRecord {
    pub survivor: GroupId,
    pub absorbed: GroupId,
    pub piece: PieceId,
    pub neighbor: PieceId,
    pub direction: Direction,
}

/// Outcome of one release, after all cascading merges have settled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub merged: bool,
    pub complete: bool,
    /// Released group plus every group id absorbed into it.
    pub updated_group_ids: BTreeSet<GroupId>,
    pub merges: Vec<MergeRecord>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    piece: PieceId,
    neighbor: PieceId,
    direction: Direction,
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    groups: BTreeMap<GroupId, BTreeSet<PieceId>>,
    tolerance: f64,
    history: Vec<MergeRecord>,
}

impl MergeEngine {
    pub fn new(grid: &PieceGrid) -> Self {
        let mut groups: BTreeMap<GroupId, BTreeSet<PieceId>> = BTreeMap::new();
        for piece in grid.pieces() {
            groups.entry(piece.group_id).or_default().insert(piece.id);
        }
        let (w, h) = grid.piece_size();
        Self {
            groups,
            tolerance: f64::from(w.min(h)) / TOLERANCE_DIVISOR,
            history: Vec::new(),
        }
    }

    /// Maximum misalignment (exclusive) at which two seams still fuse.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.groups.len() == 1
    }

    pub fn contains(&self, group: GroupId) -> bool {
        self.groups.contains_key(&group)
    }

    pub fn members(&self, group: GroupId) -> Option<&BTreeSet<PieceId>> {
        self.groups.get(&group)
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &BTreeSet<PieceId>)> {
        self.groups.iter().map(|(id, members)| (*id, members))
    }

    pub fn history(&self) -> &[MergeRecord] {
        &self.history
    }

    /// Top-left of the group's bounding box.
    pub fn origin(&self, pieces: &[Piece], group: GroupId) -> Option<(i32, i32)> {
        let members = self.groups.get(&group)?;
        members
            .iter()
            .filter_map(|&id| pieces.get(id))
            .fold(None::<(i32, i32)>, |acc, p| {
                Some(match acc {
                    None => (p.x, p.y),
                    Some((x, y)) => (x.min(p.x), y.min(p.y)),
                })
            })
    }

    /// Move `group` so its origin lands on `(x, y)`, then fuse every seam that lines up.
    ///
    /// Fails with [`PuzzleError::InvalidGroupId`] before touching any state when the
    /// group is unknown.
    pub fn on_release(
        &mut self,
        grid: &mut PieceGrid,
        group: GroupId,
        x: i32,
        y: i32,
    ) -> Result<MergeResult, PuzzleError> {
        if !self.groups.contains_key(&group) {
            return Err(PuzzleError::InvalidGroupId(group));
        }
        self.translate(grid.pieces_mut(), group, x, y);

        let mut result = MergeResult::default();
        result.updated_group_ids.insert(group);
        while let Some(candidate) = self.find_merge(grid.pieces(), group) {
            let record = self.merge(grid.pieces_mut(), group, candidate);
            result.updated_group_ids.insert(record.absorbed);
            result.merges.push(record);
            self.history.push(record);
        }
        result.merged = !result.merges.is_empty();
        result.complete = self.is_complete();
        Ok(result)
    }

    /// Rigid move: each member is placed relative to the group's smallest correct
    /// coordinates, so offsets inside the group never drift.
    fn translate(&self, pieces: &mut [Piece], group: GroupId, x: i32, y: i32) {
        let Some(members) = self.groups.get(&group) else {
            return;
        };
        let (min_cx, min_cy) = members
            .iter()
            .map(|&id| (pieces[id].correct_x, pieces[id].correct_y))
            .fold((i32::MAX, i32::MAX), |(ax, ay), (cx, cy)| {
                (ax.min(cx), ay.min(cy))
            });
        for &id in members {
            let p = &mut pieces[id];
            p.x = x.saturating_add(p.correct_x - min_cx);
            p.y = y.saturating_add(p.correct_y - min_cy);
        }
    }

    fn find_merge(&self, pieces: &[Piece], group: GroupId) -> Option<Candidate> {
        let members = self.groups.get(&group)?;
        for &id in members {
            let p = &pieces[id];
            for nb in p.adjacent() {
                let q = &pieces[nb.id];
                if q.group_id == p.group_id {
                    continue;
                }
                if self.aligned(p, q, nb.direction) {
                    return Some(Candidate {
                        piece: p.id,
                        neighbor: q.id,
                        direction: nb.direction,
                    });
                }
            }
        }
        None
    }

    /// Proximity test for `q` lying in `direction` from `p`.
    fn aligned(&self, p: &Piece, q: &Piece, direction: Direction) -> bool {
        let (dx, dy) = match direction {
            Direction::Up => (
                p.x.saturating_sub(q.x),
                p.y.saturating_sub(q.y.saturating_add(q.height)),
            ),
            Direction::Down => (
                p.x.saturating_sub(q.x),
                p.y.saturating_add(p.height).saturating_sub(q.y),
            ),
            Direction::Left => (
                p.x.saturating_sub(q.x.saturating_add(q.width)),
                p.y.saturating_sub(q.y),
            ),
            Direction::Right => (
                p.x.saturating_add(p.width).saturating_sub(q.x),
                p.y.saturating_sub(q.y),
            ),
        };
        self.within(dx) && self.within(dy)
    }

    #[inline]
    fn within(&self, delta: i32) -> bool {
        f64::from(delta).abs() < self.tolerance
    }

    /// Absorb the neighbour's group into `survivor` and close the seam exactly.
    /// The released group stays put; the absorbed group snaps onto it at `c.piece`.
    fn merge(&mut self, pieces: &mut [Piece], survivor: GroupId, c: Candidate) -> MergeRecord {
        let absorbed = pieces[c.neighbor].group_id;
        let from = self.groups.remove(&absorbed).unwrap_or_default();

        let (ax, ay, acx, acy) = {
            let a = &pieces[c.piece];
            (a.x, a.y, a.correct_x, a.correct_y)
        };
        for &id in &from {
            let p = &mut pieces[id];
            p.x = ax.saturating_add(p.correct_x - acx);
            p.y = ay.saturating_add(p.correct_y - acy);
            p.group_id = survivor;
        }
        self.groups.entry(survivor).or_default().extend(from);

        MergeRecord {
            survivor,
            absorbed,
            piece: c.piece,
            neighbor: c.neighbor,
            direction: c.direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SIZE: i32 = 100;

    fn setup(n: usize) -> (PieceGrid, MergeEngine) {
        let grid = PieceGrid::build(n, SIZE, SIZE, 0, 0).unwrap();
        let engine = MergeEngine::new(&grid);
        (grid, engine)
    }

    /// Put singleton pieces somewhere without going through a release.
    fn place(grid: &mut PieceGrid, id: PieceId, x: i32, y: i32) {
        let p = &mut grid.pieces_mut()[id];
        p.x = x;
        p.y = y;
    }

    /// Scatter every piece onto a far-away diagonal so nothing lines up by accident.
    fn scatter_apart(grid: &mut PieceGrid) {
        for id in 0..grid.len() {
            let offset = 1000 + id as i32 * 350;
            place(grid, id, offset, offset);
        }
    }

    fn members(engine: &MergeEngine, group: GroupId) -> Vec<PieceId> {
        engine.members(group).unwrap().iter().copied().collect()
    }

    fn assert_rigid(grid: &PieceGrid, engine: &MergeEngine) {
        for (_, members) in engine.groups() {
            let first = &grid.pieces()[*members.iter().next().unwrap()];
            for &id in members {
                let p = &grid.pieces()[id];
                assert_eq!(p.x - first.x, p.correct_x - first.correct_x);
                assert_eq!(p.y - first.y, p.correct_y - first.correct_y);
            }
        }
    }

    #[test]
    fn test_tolerance_uses_smaller_dimension() {
        let grid = PieceGrid::build(2, 64, 40, 0, 0).unwrap();
        let engine = MergeEngine::new(&grid);
        assert!((engine.tolerance() - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_threshold_boundary_right() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 1, 300, 300);

        // |(x + 100) - 300| == 20 == tolerance: no merge.
        let r = engine.on_release(&mut grid, 0, 180, 300).unwrap();
        assert!(!r.merged);
        assert_eq!(engine.group_count(), 4);

        // One unit inside.
        let r = engine.on_release(&mut grid, 0, 181, 300).unwrap();
        assert!(r.merged);
        assert_eq!(members(&engine, 0), vec![0, 1]);
        assert_eq!(r.updated_group_ids, BTreeSet::from([0, 1]));
        // The released piece stays put; its neighbour closes the seam.
        assert_eq!((grid.pieces()[0].x, grid.pieces()[0].y), (181, 300));
        assert_eq!((grid.pieces()[1].x, grid.pieces()[1].y), (281, 300));
    }

    #[test]
    fn test_vertical_misalignment_blocks_merge() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 1, 300, 300);
        let r = engine.on_release(&mut grid, 0, 200, 320).unwrap();
        assert!(!r.merged);
        let r = engine.on_release(&mut grid, 0, 200, 281).unwrap();
        assert!(r.merged);
    }

    #[test]
    fn test_cascade_scenario_2x2() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 0, 0, 0);

        let r = engine.on_release(&mut grid, 1, 105, 4).unwrap();
        assert!(r.merged);
        assert!(!r.complete);
        assert_eq!(members(&engine, 1), vec![0, 1]);
        assert_eq!((grid.pieces()[1].x, grid.pieces()[1].y), (105, 4));
        assert_eq!((grid.pieces()[0].x, grid.pieces()[0].y), (5, 4));

        let r = engine.on_release(&mut grid, 2, 3, 96).unwrap();
        assert!(r.merged);
        assert_eq!(members(&engine, 2), vec![0, 1, 2]);
        assert_eq!(r.merges.len(), 1);
        assert_eq!(r.merges[0].neighbor, 0);
        assert_eq!(r.merges[0].direction, Direction::Up);
        assert_eq!(engine.group_count(), 2);
        assert_eq!((grid.pieces()[2].x, grid.pieces()[2].y), (3, 96));
        assert_eq!((grid.pieces()[0].x, grid.pieces()[0].y), (3, -4));
        assert_rigid(&grid, &engine);
    }

    #[test]
    fn test_single_release_fuses_three_groups() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 0, 0, 0);
        place(&mut grid, 3, 100, 100);

        let r = engine.on_release(&mut grid, 1, 100, 0).unwrap();
        assert!(r.merged);
        assert_eq!(r.merges.len(), 2);
        // Stored order is up, down, left, right: piece 1 meets 3 (down) before 0 (left).
        assert_eq!(r.merges[0].neighbor, 3);
        assert_eq!(r.merges[1].neighbor, 0);
        assert_eq!(members(&engine, 1), vec![0, 1, 3]);
        assert_eq!(r.updated_group_ids, BTreeSet::from([0, 1, 3]));
        assert_eq!(engine.group_count(), 2);
        assert_eq!(engine.history().len(), 2);
    }

    #[test]
    fn test_release_fuses_every_seam_within_tolerance() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 0, 0, 0);
        place(&mut grid, 3, 125, 100);

        // Off by 15 against piece 3 and by 10 against piece 0.
        let r = engine.on_release(&mut grid, 1, 110, 0).unwrap();
        assert_eq!(r.merges.len(), 2);
        assert_eq!(r.merges[0].neighbor, 3);
        assert_eq!(r.merges[1].neighbor, 0);
        assert_eq!(members(&engine, 1), vec![0, 1, 3]);
        assert_eq!(engine.group_count(), 2);
        assert_eq!((grid.pieces()[1].x, grid.pieces()[1].y), (110, 0));
        assert_eq!((grid.pieces()[3].x, grid.pieces()[3].y), (110, 100));
        assert_eq!((grid.pieces()[0].x, grid.pieces()[0].y), (10, 0));
        assert_rigid(&grid, &engine);
    }

    #[test]
    fn test_larger_group_snaps_onto_released_piece() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 0, 0, 0);
        engine.on_release(&mut grid, 1, 100, 0).unwrap();
        assert_eq!(members(&engine, 1), vec![0, 1]);

        let r = engine.on_release(&mut grid, 2, 7, 105).unwrap();
        assert!(r.merged);
        assert_eq!(r.merges[0].absorbed, 1);
        assert_eq!(members(&engine, 2), vec![0, 1, 2]);
        assert_eq!((grid.pieces()[2].x, grid.pieces()[2].y), (7, 105));
        assert_eq!((grid.pieces()[0].x, grid.pieces()[0].y), (7, 5));
        assert_eq!((grid.pieces()[1].x, grid.pieces()[1].y), (107, 5));
    }

    #[test]
    fn test_absorbed_group_snaps_onto_released_group() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 0, 0, 0);
        engine.on_release(&mut grid, 1, 100, 0).unwrap();
        assert_eq!(members(&engine, 1), vec![0, 1]);

        place(&mut grid, 2, 8, 110);
        let r = engine.on_release(&mut grid, 1, 3, 2).unwrap();
        assert!(r.merged);
        // The released pair stays where it was dropped; piece 2 closes the seam.
        assert_eq!((grid.pieces()[0].x, grid.pieces()[0].y), (3, 2));
        assert_eq!((grid.pieces()[2].x, grid.pieces()[2].y), (3, 102));
        assert_rigid(&grid, &engine);
    }

    #[test]
    fn test_release_near_coordinate_limits() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        let r = engine.on_release(&mut grid, 0, i32::MAX - 5, i32::MAX - 5).unwrap();
        assert!(!r.merged);
        assert_eq!(grid.pieces()[0].x, i32::MAX - 5);

        place(&mut grid, 0, 0, 0);
        engine.on_release(&mut grid, 1, 100, 0).unwrap();
        let r = engine.on_release(&mut grid, 1, i32::MAX - 5, 0).unwrap();
        assert!(!r.merged);
        assert_eq!(grid.pieces()[0].x, i32::MAX - 5);
        assert_eq!(grid.pieces()[1].x, i32::MAX);

        let r = engine.on_release(&mut grid, 1, i32::MIN, i32::MIN).unwrap();
        assert!(!r.merged);
        assert_eq!(engine.origin(grid.pieces(), 1), Some((i32::MIN, i32::MIN)));
    }

    #[test]
    fn test_idempotent_release_in_place() {
        let (mut grid, mut engine) = setup(3);
        scatter_apart(&mut grid);
        place(&mut grid, 4, 100, 100);
        engine.on_release(&mut grid, 5, 200, 100).unwrap();
        let origin = engine.origin(grid.pieces(), 5).unwrap();
        let before = grid.pieces().to_vec();
        let r = engine.on_release(&mut grid, 5, origin.0, origin.1).unwrap();
        assert!(!r.merged);
        assert_eq!(r.updated_group_ids, BTreeSet::from([5]));
        assert_eq!(grid.pieces(), &before[..]);
    }

    #[test]
    fn test_invalid_group_leaves_state_untouched() {
        let (mut grid, mut engine) = setup(2);
        scatter_apart(&mut grid);
        place(&mut grid, 0, 0, 0);
        engine.on_release(&mut grid, 1, 100, 0).unwrap();
        let before = grid.pieces().to_vec();

        // Group 0 was absorbed into group 1.
        assert_eq!(
            engine.on_release(&mut grid, 0, 5, 5).unwrap_err(),
            PuzzleError::InvalidGroupId(0)
        );
        assert_eq!(
            engine.on_release(&mut grid, 42, 5, 5).unwrap_err(),
            PuzzleError::InvalidGroupId(42)
        );
        assert_eq!(grid.pieces(), &before[..]);
        assert_eq!(engine.group_count(), 3);
    }

    #[test]
    fn test_rigid_transport_of_three_piece_group() {
        let (mut grid, mut engine) = setup(3);
        scatter_apart(&mut grid);
        place(&mut grid, 0, 0, 0);
        engine.on_release(&mut grid, 1, 100, 0).unwrap();
        engine.on_release(&mut grid, 4, 100, 100).unwrap();
        assert_eq!(members(&engine, 4), vec![0, 1, 4]);

        let r = engine.on_release(&mut grid, 4, 777, 431).unwrap();
        assert!(!r.merged);
        assert_eq!(engine.origin(grid.pieces(), 4), Some((777, 431)));
        let pieces = grid.pieces();
        for a in [0, 1, 4] {
            for b in [0, 1, 4] {
                assert_eq!(
                    pieces[a].x - pieces[b].x,
                    pieces[a].correct_x - pieces[b].correct_x
                );
                assert_eq!(
                    pieces[a].y - pieces[b].y,
                    pieces[a].correct_y - pieces[b].correct_y
                );
            }
        }
    }

    #[test]
    fn test_completion_when_every_group_goes_home() {
        for n in 2..=5 {
            let (mut grid, mut engine) = setup(n);
            scatter_apart(&mut grid);
            let mut last = MergeResult::default();
            for id in 0..grid.len() {
                let group = grid.pieces()[id].group_id;
                let members = engine.members(group).unwrap();
                let home_x = members.iter().map(|&m| grid.pieces()[m].correct_x).min().unwrap();
                let home_y = members.iter().map(|&m| grid.pieces()[m].correct_y).min().unwrap();
                last = engine.on_release(&mut grid, group, home_x, home_y).unwrap();
            }
            assert!(last.complete);
            assert!(engine.is_complete());
            assert_eq!(engine.group_count(), 1);
            assert!(grid.pieces().iter().all(Piece::is_home));
        }
    }

    proptest! {
        #[test]
        fn group_count_is_monotonic(
            releases in prop::collection::vec((0usize..9, 0i32..320, 0i32..320), 1..60)
        ) {
            let (mut grid, mut engine) = setup(3);
            let mut count = engine.group_count();
            for (pick, x, y) in releases {
                let group = grid.pieces()[pick].group_id;
                let r = engine.on_release(&mut grid, group, x, y).unwrap();
                let now = engine.group_count();
                prop_assert!(now <= count);
                prop_assert_eq!(r.merged, now < count);
                prop_assert_eq!(r.merges.len(), count - now);
                prop_assert_eq!(r.complete, now == 1);
                count = now;

                let mut seen = 0;
                for (gid, members) in engine.groups() {
                    prop_assert!(!members.is_empty());
                    for &id in members {
                        prop_assert_eq!(grid.pieces()[id].group_id, gid);
                        seen += 1;
                    }
                }
                prop_assert_eq!(seen, grid.len());
                assert_rigid(&grid, &engine);
            }
        }
    }
}
