//! The procedural object renderer.
//!
//! Expands a decoded recipe into a concrete grid of tile references at an arbitrary
//! requested size. Standard objects partition their rows (and each row's cells) into
//! before/repeat/after groups keyed by the repeat flags; diagonal objects, recognized by
//! a leading control cell, stamp their slope sections stepwise across the grid with
//! silent clipping at the edges.

use super::{Cell, ObjectDef, TileCell};

/// One cell of a rendered grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileRef {
    /// Not covered by any part of the object.
    Hole,
    /// Covered; tile index 0 is the tileset's "no tile here".
    Tile(u16),
    /// Part of an error-marker grid for an unrenderable object.
    Error,
}

/// A rendered object: a dense `width` × `height` grid of tile references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    cells: Vec<TileRef>,
}

impl TileGrid {
    fn filled(width: usize, height: usize, fill: TileRef) -> Self {
        Self { width, height, cells: vec![fill; width * height] }
    }

    /// A grid of nothing but error markers, used for unknown or corrupt objects.
    pub fn error_marker(width: usize, height: usize) -> Self {
        Self::filled(width, height, TileRef::Error)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The cell at (x, y), or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<TileRef> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    /// The rows of the grid, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[TileRef]> {
        self.cells.chunks(self.width.max(1))
    }

    // Writes clip silently: diagonal stamps routinely step past the edges.
    fn set(&mut self, x: isize, y: isize, tile: u16) {
        if x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height {
            self.cells[y as usize * self.width + x as usize] = TileRef::Tile(tile);
        }
    }
}

/// Renders an object definition at the requested size.
///
/// `None` (unknown object id or corrupt recipe), and recipes with no usable first cell,
/// render as a full-size error-marker grid. `full_slope` selects whether a diagonal
/// object spans the longer of the two requested dimensions instead of the shorter.
pub fn render(def: Option<&ObjectDef>, width: usize, height: usize, full_slope: bool) -> TileGrid {
    let Some(def) = def else {
        return TileGrid::error_marker(width, height);
    };
    if width == 0 || height == 0 {
        return TileGrid::filled(width, height, TileRef::Hole);
    }
    match def.rows.first().and_then(|row| row.first()) {
        Some(Cell::Control(byte)) => render_diagonal(def, *byte, width, height, full_slope),
        Some(Cell::Tile(_)) => render_standard(def, width, height),
        None => TileGrid::error_marker(width, height),
    }
}

fn render_standard(def: &ObjectDef, width: usize, height: usize) -> TileGrid {
    let mut grid = TileGrid::filled(width, height, TileRef::Hole);

    // partition rows by the vertical-repeat flag of each row's first tile cell
    let mut before: Vec<&[Cell]> = Vec::new();
    let mut repeat: Vec<&[Cell]> = Vec::new();
    let mut after: Vec<&[Cell]> = Vec::new();
    for row in &def.rows {
        let Some(first) = row.iter().find_map(|cell| match cell {
            Cell::Tile(tile) => Some(tile),
            Cell::Control(_) => None,
        }) else {
            continue;
        };
        if first.control & TileCell::REPEAT_Y != 0 {
            repeat.push(row);
        } else if repeat.is_empty() {
            before.push(row);
        } else {
            after.push(row);
        }
    }
    if before.is_empty() && repeat.is_empty() && after.is_empty() {
        return TileGrid::error_marker(width, height);
    }

    for y in 0..height {
        let row = if repeat.is_empty() && after.is_empty() {
            // no repeat section: the whole recipe tiles vertically
            before[y % before.len()]
        } else if y < before.len() {
            before[y]
        } else if y + after.len() >= height && !after.is_empty() {
            after[y + after.len() - height]
        } else if !repeat.is_empty() {
            repeat[(y - before.len()) % repeat.len()]
        } else {
            after[(y - before.len()) % after.len()]
        };
        render_row(&mut grid, row, y, width);
    }
    grid
}

fn render_row(grid: &mut TileGrid, row: &[Cell], y: usize, width: usize) {
    let mut before: Vec<&TileCell> = Vec::new();
    let mut repeat: Vec<&TileCell> = Vec::new();
    let mut after: Vec<&TileCell> = Vec::new();
    for cell in row {
        // stray control cells inside a standard row draw nothing
        let Cell::Tile(tile) = cell else { continue };
        if tile.control & TileCell::REPEAT_X != 0 {
            repeat.push(tile);
        } else if repeat.is_empty() {
            before.push(tile);
        } else {
            after.push(tile);
        }
    }
    if before.is_empty() && repeat.is_empty() && after.is_empty() {
        return;
    }

    for x in 0..width {
        let tile = if repeat.is_empty() && after.is_empty() {
            before[x % before.len()]
        } else if x < before.len() {
            before[x]
        } else if x + after.len() >= width && !after.is_empty() {
            after[x + after.len() - width]
        } else if !repeat.is_empty() {
            repeat[(x - before.len()) % repeat.len()]
        } else {
            after[(x - before.len()) % after.len()]
        };
        grid.set(x as isize, y as isize, tile.tile);
    }
}

/// A rectangular slope section: rows of tile indices, short rows padded with tile 0.
type Section = Vec<Vec<u16>>;

fn render_diagonal(
    def: &ObjectDef,
    control: u8,
    width: usize,
    height: usize,
    full_slope: bool,
) -> TileGrid {
    let mut grid = TileGrid::filled(width, height, TileRef::Hole);

    let sections = slope_sections(def);
    let Some(main) = sections.first() else {
        return TileGrid::error_marker(width, height);
    };
    let sub = sections.get(1);

    let go_left = control & 0x01 != 0;
    let go_down = control & 0x02 != 0;

    let main_h = main.len() as isize;
    let main_w = main.first().map_or(0, Vec::len) as isize;
    if main_h == 0 || main_w == 0 {
        return TileGrid::error_marker(width, height);
    }
    let sub_h = sub.map_or(0, |s| s.len()) as isize;
    let sub_w = sub.and_then(|s| s.first()).map_or(0, Vec::len) as isize;

    // how many steps the staircase takes: limited by the tighter axis normally,
    // stretched to the looser one for a "full slope" placement
    let by_height = height as isize / main_h;
    let by_width = width as isize / main_w;
    let draw = if full_slope { by_height.max(by_width) } else { by_height.min(by_width) };

    let (mut x, mut y, dx, dy) = match (go_left, go_down) {
        (false, false) => (0, height as isize - main_h - sub_h, main_w, -main_h),
        (true, false) => (width as isize - main_w, height as isize - main_h - sub_h, -main_w, -main_h),
        (false, true) => (0, sub_h, main_w, main_h),
        (true, true) => (width as isize - main_w, sub_h, -main_w, main_h),
    };

    for _ in 0..draw {
        stamp(&mut grid, x, y, main);
        if let Some(sub) = sub {
            let sx = if go_left { x + main_w - sub_w } else { x };
            let sy = if go_down { y - sub_h } else { y + main_h };
            stamp(&mut grid, sx, sy, sub);
        }
        x += dx;
        y += dy;
    }
    grid
}

/// Splits a diagonal recipe into its sections: a new section starts at every row led by
/// a control cell. Each section is normalized to a rectangle of tile indices.
fn slope_sections(def: &ObjectDef) -> Vec<Section> {
    let mut groups: Vec<Vec<&[Cell]>> = Vec::new();
    for row in &def.rows {
        if groups.is_empty() || matches!(row.first(), Some(Cell::Control(_))) {
            groups.push(Vec::new());
        }
        if let Some(group) = groups.last_mut() {
            group.push(row);
        }
    }

    groups
        .into_iter()
        .map(|rows| {
            let tiles_in = |row: &[Cell]| {
                row.iter().filter(|cell| matches!(cell, Cell::Tile(_))).count()
            };
            let width = rows.iter().map(|row| tiles_in(row)).max().unwrap_or(0);
            rows.into_iter()
                .map(|row| {
                    let mut out = vec![0u16; width];
                    let tiles = row.iter().filter_map(|cell| match cell {
                        Cell::Tile(tile) => Some(tile.tile),
                        Cell::Control(_) => None,
                    });
                    for (slot, tile) in out.iter_mut().zip(tiles) {
                        *slot = tile;
                    }
                    out
                })
                .collect()
        })
        .collect()
}

fn stamp(grid: &mut TileGrid, at_x: isize, at_y: isize, block: &Section) {
    for (row_i, row) in block.iter().enumerate() {
        for (col_i, &tile) in row.iter().enumerate() {
            grid.set(at_x + col_i as isize, at_y + row_i as isize, tile);
        }
    }
}
