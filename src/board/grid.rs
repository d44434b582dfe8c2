use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of rows on the board. Row 0 is the top row.
pub const ROWS: usize = 6;

/// Number of columns on the board.
pub const COLUMNS: usize = 7;

#[derive(Error, Debug, PartialEq)]
pub enum BoardError {
    #[error("Column {0} is outside the board")]
    InvalidColumn(usize),
    #[error("Column {0} is already full")]
    ColumnFull(usize),
}

/// A player's mark on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    Red,
    Green,
}

/// The Connect-Four grid. Marks drop to the lowest empty cell of a column
/// and are immutable once placed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    cells: [[Option<Mark>; COLUMNS]; ROWS],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops a mark into the given column and returns the row it landed in.
    pub fn place(&mut self, mark: Mark, column: usize) -> Result<usize, BoardError> {
        if column >= COLUMNS {
            return Err(BoardError::InvalidColumn(column));
        }

        if self.cells[0][column].is_some() {
            return Err(BoardError::ColumnFull(column));
        }

        for row in (0..ROWS).rev() {
            if self.cells[row][column].is_none() {
                self.cells[row][column] = Some(mark);
                return Ok(row);
            }
        }

        // Unreachable: the top cell was verified empty above.
        Err(BoardError::ColumnFull(column))
    }

    /// A column is playable iff its topmost cell is empty.
    pub fn is_column_playable(&self, column: usize) -> bool {
        column < COLUMNS && self.cells[0][column].is_none()
    }

    /// True iff every column's top cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(|cell| cell.is_some())
    }

    pub fn mark_at(&self, row: usize, column: usize) -> Option<Mark> {
        self.cells.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Checks whether the mark at (row, column) completes a line of four.
    ///
    /// All four lines through the cell are candidates since the last placed
    /// mark can complete any of them; the first satisfied line short-circuits.
    pub fn has_win_at(&self, mark: Mark, row: usize, column: usize) -> bool {
        const DIRECTIONS: [(isize, isize); 4] = [
            (0, 1),  // horizontal
            (1, 0),  // vertical
            (1, 1),  // diagonal, top-left to bottom-right
            (1, -1), // diagonal, top-right to bottom-left
        ];

        DIRECTIONS
            .iter()
            .any(|&(dr, dc)| self.line_length_through(mark, row, column, dr, dc) >= 4)
    }

    /// Counts contiguous same-mark cells on the line through (row, column),
    /// scanning both directions. The origin cell is counted once.
    fn line_length_through(
        &self,
        mark: Mark,
        row: usize,
        column: usize,
        dr: isize,
        dc: isize,
    ) -> usize {
        let forward = self.count_direction(mark, row, column, dr, dc);
        let backward = self.count_direction(mark, row, column, -dr, -dc);

        // The origin cell was visited by both scans; when it does not hold
        // the mark at all, both scans are empty and the line has length zero.
        (forward + backward).saturating_sub(1)
    }

    fn count_direction(&self, mark: Mark, row: usize, column: usize, dr: isize, dc: isize) -> usize {
        let mut count = 0;
        let mut r = row as isize;
        let mut c = column as isize;

        while r >= 0 && r < ROWS as isize && c >= 0 && c < COLUMNS as isize {
            if self.cells[r as usize][c as usize] != Some(mark) {
                break;
            }

            count += 1;
            r += dr;
            c += dc;
        }

        count
    }
}
