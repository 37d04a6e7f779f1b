//! A library for working with the level archives of a Wii-era console platformer.
//!
//! A level lives on disc as a (usually LZ-compressed) tree archive of named files. The
//! interesting one is the "course" file: a flat blob addressed through an offset/length
//! table of 14 fixed-stride record blocks, which this crate decodes into editable record
//! lists and re-encodes byte-compatibly. Tileset object recipes (the per-object tile
//! layout bytecode) are decoded and rendered here too, since in-editor previews have to
//! match the layout the game itself produces.
//!
//! The three layers, bottom up:
//!
//! - [`extract`] — the LZ compression codec and the named-file archive container.
//! - [`course`] — the course block table, the per-block record codecs, and the [`Area`]
//!   document that ties the record lists together across a load/save cycle.
//! - [`tileset`] — the object recipe decoder and the procedural tile renderer.
//!
//! All operations are synchronous and side-effect-free; callers do the file I/O and pass
//! buffers in and out.
//!
//! [`Area`]: course::Area

pub mod course;
pub mod extract;
pub mod tileset;

pub use extract::{Archive, ParseError};
