//! Piece grid: static piece set, correct positions, grid adjacency.

use crate::error::PuzzleError;

pub type PieceId = usize;
pub type GroupId = usize;

/// Grid direction from a piece towards one of its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Stored adjacency order.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub id: PieceId,
    pub direction: Direction,
}

/// One grid cell of the picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub id: PieceId,
    pub row: usize,
    pub col: usize,
    pub width: i32,
    pub height: i32,
    pub correct_x: i32,
    pub correct_y: i32,
    /// Current top-left position on the surface.
    pub x: i32,
    pub y: i32,
    adjacent: Vec<Neighbor>,
    pub group_id: GroupId,
}

impl Piece {
    pub fn adjacent(&self) -> &[Neighbor] {
        &self.adjacent
    }

    /// True if the piece sits exactly at its correct position.
    pub fn is_home(&self) -> bool {
        self.x == self.correct_x && self.y == self.correct_y
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Neighbour of grid cell `id` in direction `dir`, if it exists.
pub fn neighbor_id(id: PieceId, n: usize, dir: Direction) -> Option<PieceId> {
    let row = id / n;
    let col = id % n;
    match dir {
        Direction::Up if row > 0 => Some(id - n),
        Direction::Down if row + 1 < n => Some(id + n),
        Direction::Left if col > 0 => Some(id - 1),
        Direction::Right if col + 1 < n => Some(id + 1),
        _ => None,
    }
}

/// Authoritative piece list for one game. Built once per game start.
#[derive(Debug, Clone)]
pub struct PieceGrid {
    n: usize,
    piece_width: i32,
    piece_height: i32,
    offset: (i32, i32),
    pieces: Vec<Piece>,
}

impl PieceGrid {
    /// Build the N×N grid with every piece at its correct position and in its own group.
    pub fn build(
        n: usize,
        piece_width: i32,
        piece_height: i32,
        offset_x: i32,
        offset_y: i32,
    ) -> Result<Self, PuzzleError> {
        if n < 2 {
            return Err(PuzzleError::InvalidDifficulty(n));
        }
        if piece_width <= 0 || piece_height <= 0 {
            return Err(PuzzleError::InvalidPieceSize {
                width: piece_width,
                height: piece_height,
            });
        }
        let mut pieces = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                let id = row * n + col;
                let correct_x = offset_x + col as i32 * piece_width;
                let correct_y = offset_y + row as i32 * piece_height;
                let adjacent = Direction::ALL
                    .iter()
                    .filter_map(|&direction| {
                        neighbor_id(id, n, direction).map(|id| Neighbor { id, direction })
                    })
                    .collect();
                pieces.push(Piece {
                    id,
                    row,
                    col,
                    width: piece_width,
                    height: piece_height,
                    correct_x,
                    correct_y,
                    x: correct_x,
                    y: correct_y,
                    adjacent,
                    group_id: id,
                });
            }
        }
        Ok(Self {
            n,
            piece_width,
            piece_height,
            offset: (offset_x, offset_y),
            pieces,
        })
    }

    #[inline]
    pub fn difficulty(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn piece_size(&self) -> (i32, i32) {
        (self.piece_width, self.piece_height)
    }

    /// Board rectangle `(x, y, width, height)` covered by the solved picture.
    pub fn board_rect(&self) -> (i32, i32, i32, i32) {
        let n = self.n as i32;
        (
            self.offset.0,
            self.offset.1,
            self.piece_width * n,
            self.piece_height * n,
        )
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub(crate) fn pieces_mut(&mut self) -> &mut [Piece] {
        &mut self.pieces
    }

    pub fn get(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }
}
