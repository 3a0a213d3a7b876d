//! Puzzle session: one game's grid + merge engine, scatter, z-order, hit-testing.

use crate::error::PuzzleError;
use crate::grid::{GroupId, Piece, PieceGrid};
use crate::merge::{MergeEngine, MergeResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

/// Classic distance kept between scattered pieces and the surface edge.
pub const SCATTER_MARGIN: i32 = 20;

/// Fraction of a piece dimension within which a released group snaps home.
const HOME_SNAP_DIVISOR: f64 = 4.0;

/// Geometry and rules for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub difficulty: usize,
    pub piece_width: i32,
    pub piece_height: i32,
    /// Top-left of the solved picture on the surface.
    pub board_x: i32,
    pub board_y: i32,
    /// Area pieces are scattered over (surface pixels).
    pub surface_width: i32,
    pub surface_height: i32,
    pub margin: i32,
    pub snap_home: bool,
}

#[derive(Debug, Clone)]
pub struct PuzzleSession {
    config: SessionConfig,
    grid: PieceGrid,
    engine: MergeEngine,
    /// Draw order, bottom first.
    z_order: Vec<GroupId>,
    seed: u64,
    moves: u32,
}

impl PuzzleSession {
    /// Build the grid and scatter it with a seeded RNG.
    pub fn new(config: SessionConfig, seed: u64) -> Result<Self, PuzzleError> {
        let grid = PieceGrid::build(
            config.difficulty,
            config.piece_width,
            config.piece_height,
            config.board_x,
            config.board_y,
        )?;
        let engine = MergeEngine::new(&grid);
        let z_order = (0..grid.len()).collect();
        let mut session = Self {
            config,
            grid,
            engine,
            z_order,
            seed,
            moves: 0,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        session.scatter(&mut rng);
        crate::log!(
            "new game {}x{} (pieces {}x{}, tolerance {:.1}, seed {})",
            config.difficulty,
            config.difficulty,
            config.piece_width,
            config.piece_height,
            session.engine.tolerance(),
            seed
        );
        Ok(session)
    }

    /// Throw every group to a random spot inside the surface and shuffle the draw order.
    pub fn scatter<R: Rng>(&mut self, rng: &mut R) {
        let groups: Vec<GroupId> = self.engine.groups().map(|(id, _)| id).collect();
        for group in groups {
            let (w, h) = self.group_size(group);
            let margin = self.config.margin;
            let x = random_coord(rng, margin, self.config.surface_width - w - margin);
            let y = random_coord(rng, margin, self.config.surface_height - h - margin);
            self.place_group(group, x, y);
        }
        for i in (1..self.z_order.len()).rev() {
            let j = rng.random_range(0..=i);
            self.z_order.swap(i, j);
        }
    }

    /// Report a finished drag: `group` was dropped with its top-left at `(x, y)`.
    pub fn release(
        &mut self,
        group: GroupId,
        x: i32,
        y: i32,
    ) -> Result<MergeResult, PuzzleError> {
        if !self.engine.contains(group) {
            crate::log!("ignored release of unknown group {}", group);
            return Err(PuzzleError::InvalidGroupId(group));
        }
        let (x, y) = if self.config.snap_home {
            self.home_snap(group, x, y)
        } else {
            (x, y)
        };
        let result = self.engine.on_release(&mut self.grid, group, x, y)?;
        self.moves += 1;

        if result.merged {
            let absorbed: BTreeSet<GroupId> =
                result.merges.iter().map(|m| m.absorbed).collect();
            self.z_order.retain(|g| !absorbed.contains(g));
            for m in &result.merges {
                crate::log!(
                    "merge: piece {} ({:?} edge) met piece {} ({:?} edge); group {} absorbed into {}",
                    m.piece,
                    m.direction,
                    m.neighbor,
                    m.direction.opposite(),
                    m.absorbed,
                    m.survivor
                );
            }
        }
        if result.complete {
            crate::log!("puzzle complete after {} moves", self.moves);
        }
        Ok(result)
    }

    /// Correct origin of the group if the drop is close enough to it.
    fn home_snap(&self, group: GroupId, x: i32, y: i32) -> (i32, i32) {
        let Some((hx, hy)) = self.home_origin(group) else {
            return (x, y);
        };
        let near = |d: i32, size: i32| f64::from(d).abs() < f64::from(size) / HOME_SNAP_DIVISOR;
        if near(x.saturating_sub(hx), self.config.piece_width)
            && near(y.saturating_sub(hy), self.config.piece_height)
        {
            (hx, hy)
        } else {
            (x, y)
        }
    }

    /// Origin the group has when it sits in the solved picture.
    pub fn home_origin(&self, group: GroupId) -> Option<(i32, i32)> {
        let members = self.engine.members(group)?;
        let pieces = self.grid.pieces();
        let x = members.iter().map(|&id| pieces[id].correct_x).min()?;
        let y = members.iter().map(|&id| pieces[id].correct_y).min()?;
        Some((x, y))
    }

    /// Move a group without testing for merges (scatter only).
    fn place_group(&mut self, group: GroupId, x: i32, y: i32) {
        let Some((hx, hy)) = self.home_origin(group) else {
            return;
        };
        let members: Vec<_> = self.members(group).map(|p| p.id).collect();
        let pieces = self.grid.pieces_mut();
        for id in members {
            let p = &mut pieces[id];
            p.x = x + (p.correct_x - hx);
            p.y = y + (p.correct_y - hy);
        }
    }

    /// Bounding box size of a group.
    pub fn group_size(&self, group: GroupId) -> (i32, i32) {
        let Some(members) = self.engine.members(group) else {
            return (0, 0);
        };
        let pieces = self.grid.pieces();
        let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for &id in members {
            let p = &pieces[id];
            x0 = x0.min(p.correct_x);
            y0 = y0.min(p.correct_y);
            x1 = x1.max(p.correct_x + p.width);
            y1 = y1.max(p.correct_y + p.height);
        }
        (x1 - x0, y1 - y0)
    }

    /// Topmost group with a piece under `(x, y)`.
    pub fn group_at(&self, x: i32, y: i32) -> Option<GroupId> {
        let pieces = self.grid.pieces();
        self.z_order.iter().rev().copied().find(|&group| {
            self.engine
                .members(group)
                .is_some_and(|m| m.iter().any(|&id| pieces[id].contains(x, y)))
        })
    }

    pub fn bring_to_front(&mut self, group: GroupId) {
        if let Some(pos) = self.z_order.iter().position(|&g| g == group) {
            let g = self.z_order.remove(pos);
            self.z_order.push(g);
        }
    }

    pub fn z_order(&self) -> &[GroupId] {
        &self.z_order
    }

    pub fn group_origin(&self, group: GroupId) -> Option<(i32, i32)> {
        self.engine.origin(self.grid.pieces(), group)
    }

    pub fn members(&self, group: GroupId) -> impl Iterator<Item = &Piece> {
        self.engine
            .members(group)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.grid.get(id))
    }

    pub fn pieces(&self) -> &[Piece] {
        self.grid.pieces()
    }

    /// Pieces sitting exactly at their correct position.
    pub fn placed_count(&self) -> usize {
        self.grid.pieces().iter().filter(|p| p.is_home()).count()
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.engine.group_count()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.engine.is_complete()
    }

    #[inline]
    pub fn merge_count(&self) -> usize {
        self.engine.history().len()
    }

    #[inline]
    pub fn moves(&self) -> u32 {
        self.moves
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn difficulty(&self) -> usize {
        self.grid.difficulty()
    }

    pub fn board_rect(&self) -> (i32, i32, i32, i32) {
        self.grid.board_rect()
    }
}

fn random_coord<R: Rng>(rng: &mut R, min: i32, max: i32) -> i32 {
    if max <= min {
        min
    } else {
        rng.random_range(min..=max)
    }
}
