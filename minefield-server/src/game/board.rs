//! Board Definitions and Generation
//!
//! The N×N grid of cells, random mine placement with precomputed
//! adjacency counts, and the redacted per-cell view sent to clients.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::game::state::PlayerId;

// =============================================================================
// FLAG STATE
// =============================================================================

/// Flag marker on a hidden cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagState {
    /// No flag.
    #[default]
    Empty,
    /// Flag placed by `flag_owner`.
    Placed,
    /// Reserved. No transition currently produces it.
    Validated,
}

// =============================================================================
// CELL
// =============================================================================

/// A single board cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Has the cell been revealed?
    pub is_revealed: bool,
    /// Is there a mine under the cell?
    pub is_mine: bool,
    /// Mines among the up-to-8 neighbors (0..=8).
    pub adjacent_mines: u8,
    /// Flag marker.
    pub flag_state: FlagState,
    /// Player who placed the flag (set iff a flag is present).
    pub flag_owner: Option<PlayerId>,
}

impl Cell {
    /// Does the cell carry a flag of any kind?
    #[inline]
    pub fn has_flag(&self) -> bool {
        self.flag_state != FlagState::Empty
    }

    /// Client-safe view of the cell.
    ///
    /// Hidden cells expose only their flag state; mine and adjacency data
    /// leave the server only once the cell is revealed.
    pub fn view(&self) -> CellView {
        if self.is_revealed {
            CellView {
                is_revealed: true,
                is_mine: Some(self.is_mine),
                adjacent_mines: Some(self.adjacent_mines),
                flag_state: self.flag_state,
            }
        } else {
            CellView {
                is_revealed: false,
                is_mine: None,
                adjacent_mines: None,
                flag_state: self.flag_state,
            }
        }
    }
}

/// Redacted cell as serialized to clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellView {
    /// Revealed flag.
    pub is_revealed: bool,
    /// Mine truth (revealed cells only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mine: Option<bool>,
    /// Adjacency count (revealed cells only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacent_mines: Option<u8>,
    /// Flag marker (omitted when empty).
    #[serde(default, skip_serializing_if = "is_empty_flag")]
    pub flag_state: FlagState,
}

fn is_empty_flag(state: &FlagState) -> bool {
    *state == FlagState::Empty
}

// =============================================================================
// BOARD
// =============================================================================

/// Square grid of cells, indexed `(x, y)` with `x` the row.
#[derive(Clone, Debug)]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
    mine_count: usize,
    /// Non-mine cells not yet revealed.
    pub cells_to_reveal: usize,
}

impl Board {
    /// Generate a board with independently placed mines.
    ///
    /// Each cell becomes a mine with `mine_probability`; cells are visited
    /// row by row so the layout is a pure function of the RNG state.
    pub fn generate(size: usize, mine_probability: f64, rng: &mut DeterministicRng) -> Self {
        let mut cells = vec![Cell::default(); size * size];
        for cell in cells.iter_mut() {
            cell.is_mine = rng.chance(mine_probability);
        }
        Self::from_cells(size, cells)
    }

    /// Build a board with mines at exactly the given coordinates.
    ///
    /// Coordinates outside the board are ignored.
    pub fn with_mines(size: usize, mines: &[(usize, usize)]) -> Self {
        let mut cells = vec![Cell::default(); size * size];
        for &(x, y) in mines {
            if x < size && y < size {
                cells[x * size + y].is_mine = true;
            }
        }
        Self::from_cells(size, cells)
    }

    fn from_cells(size: usize, cells: Vec<Cell>) -> Self {
        let mine_count = cells.iter().filter(|c| c.is_mine).count();
        let mut board = Self {
            size,
            cells,
            mine_count,
            cells_to_reveal: size * size - mine_count,
        };

        for x in 0..size {
            for y in 0..size {
                let count = board.neighbors(x, y)
                    .filter(|&(nx, ny)| board.cell(nx, ny).is_mine)
                    .count();
                board.cell_mut(x, y).adjacent_mines = count as u8;
            }
        }

        board
    }

    /// Side length.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of mines placed at generation.
    #[inline]
    pub fn mine_count(&self) -> usize {
        self.mine_count
    }

    /// Convert signed request coordinates into board coordinates.
    pub fn checked_coords(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        let size = self.size as i64;
        if (0..size).contains(&x) && (0..size).contains(&y) {
            Some((x as usize, y as usize))
        } else {
            None
        }
    }

    /// Borrow a cell. Panics on out-of-bounds coordinates.
    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        &self.cells[x * self.size + y]
    }

    /// Mutably borrow a cell. Panics on out-of-bounds coordinates.
    #[inline]
    pub fn cell_mut(&mut self, x: usize, y: usize) -> &mut Cell {
        &mut self.cells[x * self.size + y]
    }

    /// In-bounds Chebyshev neighbors of `(x, y)`, excluding itself.
    pub fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let size = self.size as isize;
        let (x, y) = (x as isize, y as isize);
        (-1isize..=1)
            .flat_map(|dx| (-1isize..=1).map(move |dy| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(move |&(nx, ny)| nx >= 0 && nx < size && ny >= 0 && ny < size)
            .map(|(nx, ny)| (nx as usize, ny as usize))
    }

    /// Rows of cells, for snapshotting.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.size.max(1))
    }

    /// Are all non-mine cells revealed?
    #[inline]
    pub fn is_cleared(&self) -> bool {
        self.cells_to_reveal == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
