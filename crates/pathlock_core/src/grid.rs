//! Grid cells, cardinal directions and the grid coordinate mapper.
//!
//! The mapper converts between integer cells and continuous world
//! positions using the cell-center convention, and owns the static
//! walkability of every cell.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// An integer grid coordinate.
///
/// Serialized as a `(x, y)` tuple so level files stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct GridCell {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridCell {
    /// Create a cell.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell `distance` steps away in `direction`.
    #[must_use]
    pub const fn offset(self, direction: Direction, distance: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx * distance, self.y + dy * distance)
    }

    /// True when both cells share a row or a column.
    #[must_use]
    pub const fn shares_axis_with(self, other: Self) -> bool {
        self.x == other.x || self.y == other.y
    }

    /// Cardinal direction from `self` towards `other`.
    ///
    /// Returns `None` for diagonal pairs and for identical cells.
    #[must_use]
    pub fn direction_to(self, other: Self) -> Option<Direction> {
        match (other.x - self.x, other.y - self.y) {
            (0, 0) => None,
            (0, dy) if dy > 0 => Some(Direction::Up),
            (0, _) => Some(Direction::Down),
            (dx, 0) if dx > 0 => Some(Direction::Right),
            (_, 0) => Some(Direction::Left),
            _ => None,
        }
    }

    /// Cells walked when moving in a straight line from `self` to `other`.
    ///
    /// Excludes `self`, includes `other`. Empty for diagonal or identical
    /// pairs.
    #[must_use]
    pub fn line_to(self, other: Self) -> Vec<Self> {
        let Some(direction) = self.direction_to(other) else {
            return Vec::new();
        };
        let steps = (other.x - self.x).abs() + (other.y - self.y).abs();
        (1..=steps).map(|i| self.offset(direction, i)).collect()
    }
}

impl From<(i32, i32)> for GridCell {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<GridCell> for (i32, i32) {
    fn from(cell: GridCell) -> Self {
        (cell.x, cell.y)
    }
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +y
    Up,
    /// -y
    Down,
    /// -x
    Left,
    /// +x
    Right,
}

impl Direction {
    /// All directions, in the order the selection overlay scans them.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Unit offset for this direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// Static tile state of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// A tile agents can stand on.
    Walkable,
    /// No tile; agents can neither stop on nor cross this cell.
    #[default]
    Void,
}

impl CellType {
    /// Returns true if this cell is walkable.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Walkable)
    }
}

/// Grid dimensions, world placement and walkability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMap {
    /// Grid width in cells.
    width: u32,
    /// Grid height in cells.
    height: u32,
    /// Cell data stored in row-major order.
    cells: Vec<CellType>,
    /// Size of each cell in world units.
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
    /// World position of the grid's lower-left corner.
    origin: Vec2Fixed,
}

impl GridMap {
    /// Create a grid with no tiles.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `cell_size` is not positive.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: Fixed, origin: Vec2Fixed) -> Self {
        assert!(width > 0, "GridMap width must be positive");
        assert!(height > 0, "GridMap height must be positive");
        assert!(
            cell_size > Fixed::ZERO,
            "GridMap cell_size must be positive"
        );

        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![CellType::Void; cell_count],
            cell_size,
            origin,
        }
    }

    /// Create a grid where every cell is walkable, unit cells, origin at zero.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        let mut grid = Self::new(width, height, Fixed::ONE, Vec2Fixed::ZERO);
        grid.cells.fill(CellType::Walkable);
        grid
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// World position of the grid's lower-left corner.
    #[must_use]
    pub const fn origin(&self) -> Vec2Fixed {
        self.origin
    }

    /// Longest straight run that fits on the grid.
    #[must_use]
    pub fn max_dimension(&self) -> i32 {
        self.width.max(self.height) as i32
    }

    #[inline]
    fn cell_index(&self, cell: GridCell) -> Option<usize> {
        if self.in_bounds(cell) {
            Some((cell.y as usize) * (self.width as usize) + (cell.x as usize))
        } else {
            None
        }
    }

    /// Check if a cell is within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, cell: GridCell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Get cell type. Returns `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, cell: GridCell) -> Option<CellType> {
        self.cell_index(cell).map(|index| self.cells[index])
    }

    /// Set cell type. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, cell: GridCell, cell_type: CellType) -> bool {
        match self.cell_index(cell) {
            Some(index) => {
                self.cells[index] = cell_type;
                true
            }
            None => false,
        }
    }

    /// Check if a cell has a walkable tile. Out-of-bounds cells never do.
    #[must_use]
    pub fn is_walkable(&self, cell: GridCell) -> bool {
        self.get_cell(cell).is_some_and(CellType::is_walkable)
    }

    /// Iterate over every walkable cell in row-major order.
    pub fn walkable_cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_walkable())
            .map(move |(i, _)| GridCell::new((i % width) as i32, (i / width) as i32))
    }

    /// Convert a cell to the world position of its center.
    #[must_use]
    pub fn to_world(&self, cell: GridCell) -> Vec2Fixed {
        let half = self.cell_size / Fixed::from_num(2);
        Vec2Fixed::new(
            self.origin.x + Fixed::from_num(cell.x) * self.cell_size + half,
            self.origin.y + Fixed::from_num(cell.y) * self.cell_size + half,
        )
    }

    /// Convert a world position to the nearest cell.
    ///
    /// The result may lie outside the grid; pair with [`Self::in_bounds`].
    #[must_use]
    pub fn to_grid(&self, pos: Vec2Fixed) -> GridCell {
        let half = Fixed::from_num(1) / Fixed::from_num(2);
        let gx = ((pos.x - self.origin.x) / self.cell_size - half).round();
        let gy = ((pos.y - self.origin.y) / self.cell_size - half).round();
        GridCell::new(gx.saturating_to_num::<i32>(), gy.saturating_to_num::<i32>())
    }
}
