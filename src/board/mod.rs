mod grid;

pub use grid::{Board, BoardError, Mark, COLUMNS, ROWS};
