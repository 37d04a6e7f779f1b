//! Tileset objects: the per-object tile "recipe" bytecode and its index table.
//!
//! Each tileset ships a table of fixed 4-byte index records (16-bit recipe offset, then
//! width and height) and one shared recipe blob, both supplied by the tileset-loading
//! collaborator. A recipe is a byte stream read from the indexed offset: `0xFE` ends the
//! current row, `0xFF` ends the object, any other byte with the high bit set is a
//! one-byte control cell consumed alone, and everything else starts a three-byte tile
//! cell. Decoding trusts the `0xFF` terminator but bounds iteration by the containing
//! buffer, so a corrupt recipe fails cleanly instead of reading unbounded memory.

use byteorder::{BigEndian, ByteOrder};
use log::warn;

use crate::extract::ParseError;

mod render;

pub use render::{render, TileGrid, TileRef};

/// One cell of a decoded recipe row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// A one-byte control cell (high bit set): marks section boundaries and carries the
    /// slope direction flags in diagonal objects.
    Control(u8),
    /// A three-byte tile cell.
    Tile(TileCell),
}

/// A three-byte tile cell: a control byte carrying the repeat flags, a 10-bit tile
/// index, and six bits of per-cell flags.
///
/// Tile index 0 is reserved as "no tile here"; any other value indexes the global tile
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCell {
    pub control: u8,
    pub tile: u16,
    pub flags: u8,
}

impl TileCell {
    /// Control bit: this cell belongs to the row's horizontal repeat section.
    pub const REPEAT_X: u8 = 0x01;
    /// Control bit (on a row's first cell): the row belongs to the vertical repeat
    /// section.
    pub const REPEAT_Y: u8 = 0x02;
}

/// A decoded object recipe: its natural size and its rows of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDef {
    pub width: u8,
    pub height: u8,
    pub rows: Vec<Vec<Cell>>,
}

impl ObjectDef {
    /// Decodes the recipe starting at `offset` within the shared blob.
    ///
    /// A recipe that runs off the end of the buffer — missing `0xFF` terminator or a
    /// truncated tile cell — is a hard error; the caller decides whether that dooms one
    /// object or the whole tileset.
    pub fn decode(data: &[u8], offset: usize, width: u8, height: u8) -> Result<Self, ParseError> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut i = offset;
        loop {
            let Some(&byte) = data.get(i) else {
                return Err(ParseError::UnterminatedRecipe(offset));
            };
            match byte {
                0xFF => break,
                0xFE => {
                    rows.push(std::mem::take(&mut row));
                    i += 1;
                }
                byte if byte & 0x80 != 0 => {
                    row.push(Cell::Control(byte));
                    i += 1;
                }
                control => {
                    let (Some(&low), Some(&extra)) = (data.get(i + 1), data.get(i + 2)) else {
                        return Err(ParseError::UnterminatedRecipe(offset));
                    };
                    row.push(Cell::Tile(TileCell {
                        control,
                        tile: low as u16 | ((extra as u16 & 0x03) << 8),
                        flags: extra >> 2,
                    }));
                    i += 3;
                }
            }
        }
        // tolerate a recipe whose last row is not 0xFE-terminated
        if !row.is_empty() {
            rows.push(row);
        }
        Ok(Self { width, height, rows })
    }
}

/// A tileset's full object table.
#[derive(Debug, Clone, Default)]
pub struct ObjectSet {
    objects: Vec<Option<ObjectDef>>,
}

impl ObjectSet {
    /// Parses the 4-byte index records against the shared recipe blob.
    ///
    /// A corrupt recipe makes that one object unrenderable — it renders as an
    /// error-marker grid — without failing the rest of the tileset.
    pub fn parse(index: &[u8], data: &[u8]) -> Self {
        if index.len() % 4 != 0 {
            warn!("object index length {} is not a multiple of 4; ignoring the tail", index.len());
        }
        let mut objects = Vec::with_capacity(index.len() / 4);
        for rec in index.chunks_exact(4) {
            let offset = BigEndian::read_u16(&rec[0..2]) as usize;
            match ObjectDef::decode(data, offset, rec[2], rec[3]) {
                Ok(def) => objects.push(Some(def)),
                Err(err) => {
                    warn!("object {} has a corrupt recipe: {err}", objects.len());
                    objects.push(None);
                }
            }
        }
        Self { objects }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The decoded definition of one object, if it exists and decoded cleanly.
    pub fn get(&self, object: usize) -> Option<&ObjectDef> {
        self.objects.get(object).and_then(|def| def.as_ref())
    }

    /// Renders one object at the requested size. Unknown object ids and corrupt recipes
    /// yield a full-size error-marker grid rather than failing, so callers can draw a
    /// visible placeholder.
    ///
    /// Rendering is deterministic and allocation-fresh per call; callers are expected to
    /// memoize by (tileset, object id, size), since editors re-request the same object
    /// constantly.
    pub fn render(&self, object: usize, width: usize, height: usize, full_slope: bool) -> TileGrid {
        render(self.get(object), width, height, full_slope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rows_and_cells() {
        // two rows: [tile 0x105 with flags], then [control 0x85, tile 2]
        let data = [
            0x00, 0x05, 0x0D, 0xFE, // tile: control 0, low 0x05, high bits 01, flags 0b11
            0x85, 0x00, 0x02, 0x00, 0xFE, 0xFF,
        ];
        let def = ObjectDef::decode(&data, 0, 1, 2).unwrap();
        assert_eq!(def.rows.len(), 2);
        assert_eq!(
            def.rows[0],
            vec![Cell::Tile(TileCell { control: 0, tile: 0x105, flags: 0x03 })]
        );
        assert_eq!(
            def.rows[1],
            vec![
                Cell::Control(0x85),
                Cell::Tile(TileCell { control: 0, tile: 2, flags: 0 }),
            ]
        );
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let data = [0x00, 0x05, 0x00, 0xFE];
        assert!(matches!(
            ObjectDef::decode(&data, 0, 1, 1),
            Err(ParseError::UnterminatedRecipe(0))
        ));
    }

    #[test]
    fn truncated_cell_is_an_error() {
        let data = [0xFE, 0x00, 0x05]; // tile cell missing its third byte
        assert!(ObjectDef::decode(&data, 0, 1, 1).is_err());
    }

    #[test]
    fn corrupt_object_does_not_doom_the_set() {
        // object 0 is fine, object 1 points at an unterminated recipe
        let data = [0x00, 0x07, 0x00, 0xFE, 0xFF, 0x00, 0x01, 0x00];
        let index = [
            0x00, 0x00, 1, 1, // offset 0
            0x00, 0x05, 1, 1, // offset 5, runs off the end
        ];
        let set = ObjectSet::parse(&index, &data);
        assert_eq!(set.len(), 2);
        assert!(set.get(0).is_some());
        assert!(set.get(1).is_none());
    }
}
