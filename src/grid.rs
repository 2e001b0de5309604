//! Grid model for the dashboard
//!
//! A grid is a list of relative column weights and row weights. Widgets declare a
//! position in whole grid cells; `resolve` validates those positions against the grid
//! and turns them into `CellRect`s. Mapping cells onto terminal characters is done
//! later by `GridSpec::split`, once the terminal size is known.

use std::fmt;

use ratatui::layout::{Constraint, Layout, Rect};
use serde::Deserialize;
use thiserror::Error;

/// Which grid axis a weight belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Column,
    Row,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Column => write!(f, "column"),
            Axis::Row => write!(f, "row"),
        }
    }
}

/// Layout errors. All of them are fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid must declare at least one column and one row")]
    Empty,

    #[error("grid {axis} weight at index {index} must be greater than zero")]
    ZeroWeight { axis: Axis, index: usize },

    #[error("widget '{widget}' must span at least one row and one column")]
    EmptySpan { widget: String },

    #[error(
        "widget '{widget}' spans rows {top}..{bottom} and columns {left}..{right}, \
         outside the {rows}x{columns} grid"
    )]
    OutOfBounds {
        widget: String,
        top: u32,
        bottom: u32,
        left: u32,
        right: u32,
        rows: usize,
        columns: usize,
    },
}

/// Non-fatal layout findings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridWarning {
    /// Two widgets share at least one cell. The later one paints over the earlier one.
    Overlap { earlier: String, later: String },
}

impl fmt::Display for GridWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridWarning::Overlap { earlier, later } => write!(
                f,
                "widget '{}' overlaps widget '{}' and will be drawn on top of it",
                later, earlier
            ),
        }
    }
}

/// Column and row weights of the dashboard grid
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GridSpec {
    pub columns: Vec<u16>,
    pub rows: Vec<u16>,
}

impl GridSpec {
    /// Build a grid, rejecting empty axes and zero weights
    pub fn new(columns: Vec<u16>, rows: Vec<u16>) -> Result<Self, GridError> {
        let spec = Self { columns, rows };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.columns.is_empty() || self.rows.is_empty() {
            return Err(GridError::Empty);
        }
        let axes = [(Axis::Column, &self.columns), (Axis::Row, &self.rows)];
        for (axis, weights) in axes {
            if let Some(index) = weights.iter().position(|w| *w == 0) {
                return Err(GridError::ZeroWeight { axis, index });
            }
        }
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Split a terminal area into one strip per column and one per row,
    /// proportionally to the configured weights
    pub fn split(&self, area: Rect) -> GridAreas {
        let columns = Layout::horizontal(self.columns.iter().map(|w| Constraint::Fill(*w)))
            .split(area)
            .to_vec();
        let rows = Layout::vertical(self.rows.iter().map(|w| Constraint::Fill(*w)))
            .split(area)
            .to_vec();
        GridAreas { columns, rows }
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            columns: vec![1, 1],
            rows: vec![1, 1],
        }
    }
}

/// A widget's declared position, in grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Position {
    pub top: u16,
    pub left: u16,
    pub height: u16,
    pub width: u16,
}

/// A validated rectangle of grid cells
///
/// Always satisfies `top + height <= rows` and `left + width <= columns` for the grid
/// it was resolved against, with `height >= 1` and `width >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRect {
    pub top: u16,
    pub left: u16,
    pub height: u16,
    pub width: u16,
}

impl CellRect {
    pub fn bottom(&self) -> u16 {
        self.top + self.height
    }

    pub fn right(&self) -> u16 {
        self.left + self.width
    }

    pub fn overlaps(&self, other: &CellRect) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }

    /// Center of the rectangle in doubled cell units, so it stays integral
    pub fn center2(&self) -> (i32, i32) {
        (
            2 * self.left as i32 + self.width as i32,
            2 * self.top as i32 + self.height as i32,
        )
    }

    /// Whether a terminal coordinate falls inside this rectangle once laid out
    pub fn contains_point(&self, areas: &GridAreas, x: u16, y: u16) -> bool {
        let area = self.to_area(areas);
        x >= area.x && x < area.right() && y >= area.y && y < area.bottom()
    }

    /// Map this cell rectangle onto concrete terminal coordinates
    pub fn to_area(&self, areas: &GridAreas) -> Rect {
        let first_col = areas.columns[self.left as usize];
        let last_col = areas.columns[(self.right() - 1) as usize];
        let first_row = areas.rows[self.top as usize];
        let last_row = areas.rows[(self.bottom() - 1) as usize];

        Rect::new(
            first_col.x,
            first_row.y,
            last_col.right().saturating_sub(first_col.x),
            last_row.bottom().saturating_sub(first_row.y),
        )
    }
}

/// Concrete strips produced by `GridSpec::split`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAreas {
    pub columns: Vec<Rect>,
    pub rows: Vec<Rect>,
}

/// Output of `resolve`: one rectangle per input placement, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub rects: Vec<CellRect>,
    pub warnings: Vec<GridWarning>,
}

/// Validate widget positions against the grid
///
/// Placements are `(widget name, declared position)` pairs in declaration order.
/// Out-of-bounds or empty rectangles fail; overlapping rectangles only warn.
pub fn resolve<'a, I>(spec: &GridSpec, placements: I) -> Result<Resolution, GridError>
where
    I: IntoIterator<Item = (&'a str, Position)>,
{
    spec.validate()?;

    let rows = spec.row_count();
    let columns = spec.column_count();
    let mut named: Vec<(&str, CellRect)> = Vec::new();
    let mut warnings = Vec::new();

    for (name, pos) in placements {
        if pos.height == 0 || pos.width == 0 {
            return Err(GridError::EmptySpan { widget: name.to_string() });
        }

        let bottom = pos.top as u32 + pos.height as u32;
        let right = pos.left as u32 + pos.width as u32;
        if bottom > rows as u32 || right > columns as u32 {
            return Err(GridError::OutOfBounds {
                widget: name.to_string(),
                top: pos.top as u32,
                bottom,
                left: pos.left as u32,
                right,
                rows,
                columns,
            });
        }

        let rect = CellRect {
            top: pos.top,
            left: pos.left,
            height: pos.height,
            width: pos.width,
        };

        for (earlier, other) in &named {
            if rect.overlaps(other) {
                warnings.push(GridWarning::Overlap {
                    earlier: earlier.to_string(),
                    later: name.to_string(),
                });
            }
        }

        named.push((name, rect));
    }

    Ok(Resolution {
        rects: named.into_iter().map(|(_, rect)| rect).collect(),
        warnings,
    })
}
