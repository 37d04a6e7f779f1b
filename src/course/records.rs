//! Fixed-stride record codecs for the course blocks.
//!
//! Every family is a pure bytes↔records pair with a fixed record stride and big-endian
//! multi-byte fields. Decoding is lenient about block length: historical tools sometimes
//! wrote slightly oversized blocks, so a length that is not a whole number of records is
//! truncated to the largest whole count (with a warning) rather than failing the load.
//! Encoding reproduces the wire layout exactly, including the `0xFF` list terminators
//! the game expects after entrances (2 bytes) and sprites (4 bytes).

use byteorder::{BigEndian, ByteOrder};
use log::warn;

/// First record whose embedded id matches, in block order.
///
/// Cross-references (zone → bounds/background records) resolve by linear scan on an
/// embedded id field; id collisions are not validated and the first match wins, which is
/// what the game itself does. Kept as a named function so a strict, index-based mode can
/// be layered on later without touching the wire format.
pub fn first_by_id<T>(records: &[T], id: u16, id_of: impl Fn(&T) -> u16) -> Option<&T> {
    records.iter().find(|record| id_of(record) == id)
}

fn decode_block<T>(block: &[u8], stride: usize, what: &str, read: impl Fn(&[u8]) -> T) -> Vec<T> {
    let rem = block.len() % stride;
    if rem != 0 {
        warn!("{what} block length {} is not a multiple of {stride}; ignoring {rem} trailing bytes", block.len());
    }
    block.chunks_exact(stride).map(read).collect()
}

fn encode_block<T>(records: &[T], stride: usize, write: impl Fn(&T, &mut [u8])) -> Vec<u8> {
    let mut out = vec![0u8; records.len() * stride];
    for (record, chunk) in records.iter().zip(out.chunks_exact_mut(stride)) {
        write(record, chunk);
    }
    out
}

// ---------------------------------------------------------------------------
// Block 0: tileset names
// ---------------------------------------------------------------------------

/// Length of one zero-padded tileset name slot.
pub const TILESET_NAME_LEN: usize = 32;

/// Number of tileset slots per area.
pub const TILESET_SLOTS: usize = 4;

/// Decodes the four 32-byte zero-padded tileset name slots. An empty name marks an
/// unused slot; missing or non-ASCII slots decode as empty too.
pub fn decode_tileset_names(block: &[u8]) -> [String; 4] {
    let mut names: [String; 4] = Default::default();
    for (slot, name) in names.iter_mut().enumerate() {
        let Some(raw) = block.get(slot * TILESET_NAME_LEN..(slot + 1) * TILESET_NAME_LEN) else {
            continue;
        };
        match std::str::from_utf8(raw) {
            Ok(str) => *name = str.trim_end_matches('\0').to_string(),
            Err(_) => warn!("tileset slot {slot} has a non-UTF-8 name; treating as unused"),
        }
    }
    names
}

pub fn encode_tileset_names(names: &[String; 4]) -> Vec<u8> {
    let mut out = vec![0u8; TILESET_SLOTS * TILESET_NAME_LEN];
    for (slot, name) in names.iter().enumerate() {
        let bytes = name.as_bytes();
        let len = bytes.len().min(TILESET_NAME_LEN);
        out[slot * TILESET_NAME_LEN..slot * TILESET_NAME_LEN + len].copy_from_slice(&bytes[..len]);
    }
    out
}

// ---------------------------------------------------------------------------
// Block 1: area options
// ---------------------------------------------------------------------------

/// Area-wide settings (block 1). One record per area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaOptions {
    /// Initial state of the 64 event flags.
    pub events: u64,
    /// Bit 0: horizontal screen wrap.
    pub flags: u16,
    pub time_limit: u16,
    pub start_entrance: u8,
    pub unknown_0d: u8,
    pub unknown_0e: u16,
    pub unknown_10: u32,
}

impl Default for AreaOptions {
    fn default() -> Self {
        Self {
            events: 0,
            flags: 0,
            time_limit: 400,
            start_entrance: 0,
            unknown_0d: 0,
            unknown_0e: 0,
            unknown_10: 0,
        }
    }
}

impl AreaOptions {
    pub const STRIDE: usize = 20;

    fn read(rec: &[u8]) -> Self {
        Self {
            events: BigEndian::read_u64(&rec[0..8]),
            flags: BigEndian::read_u16(&rec[8..10]),
            time_limit: BigEndian::read_u16(&rec[10..12]),
            start_entrance: rec[12],
            unknown_0d: rec[13],
            unknown_0e: BigEndian::read_u16(&rec[14..16]),
            unknown_10: BigEndian::read_u32(&rec[16..20]),
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_u64(&mut rec[0..8], self.events);
        BigEndian::write_u16(&mut rec[8..10], self.flags);
        BigEndian::write_u16(&mut rec[10..12], self.time_limit);
        rec[12] = self.start_entrance;
        rec[13] = self.unknown_0d;
        BigEndian::write_u16(&mut rec[14..16], self.unknown_0e);
        BigEndian::write_u32(&mut rec[16..20], self.unknown_10);
    }

    /// Decodes the options record, falling back to defaults when the block is too short.
    pub fn decode(block: &[u8]) -> Self {
        match block.get(..Self::STRIDE) {
            Some(rec) => Self::read(rec),
            None => {
                if !block.is_empty() {
                    warn!("area options block is {} bytes, expected {}; using defaults", block.len(), Self::STRIDE);
                }
                Self::default()
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::STRIDE];
        self.write(&mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// Block 2: camera bounds
// ---------------------------------------------------------------------------

/// Y-axis camera scroll thresholds for one zone (block 2), referenced from
/// [`ZoneRecord::bounds_id`] by linear scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraBounds {
    pub upper: i32,
    pub lower: i32,
    /// Threshold adjustments applied in multiplayer.
    pub mp_upper: i32,
    pub mp_lower: i32,
    pub id: u16,
    pub unknown_12: u16,
}

impl CameraBounds {
    pub const STRIDE: usize = 24;

    fn read(rec: &[u8]) -> Self {
        Self {
            upper: BigEndian::read_i32(&rec[0..4]),
            lower: BigEndian::read_i32(&rec[4..8]),
            mp_upper: BigEndian::read_i32(&rec[8..12]),
            mp_lower: BigEndian::read_i32(&rec[12..16]),
            id: BigEndian::read_u16(&rec[16..18]),
            unknown_12: BigEndian::read_u16(&rec[18..20]),
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_i32(&mut rec[0..4], self.upper);
        BigEndian::write_i32(&mut rec[4..8], self.lower);
        BigEndian::write_i32(&mut rec[8..12], self.mp_upper);
        BigEndian::write_i32(&mut rec[12..16], self.mp_lower);
        BigEndian::write_u16(&mut rec[16..18], self.id);
        BigEndian::write_u16(&mut rec[18..20], self.unknown_12);
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        decode_block(block, Self::STRIDE, "camera bounds", Self::read)
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        encode_block(records, Self::STRIDE, Self::write)
    }
}

// ---------------------------------------------------------------------------
// Blocks 4 and 5: background layers
// ---------------------------------------------------------------------------

/// One background layer record (blocks 4 and 5 share this shape), referenced from
/// [`ZoneRecord::bg_a_id`]/[`ZoneRecord::bg_b_id`] by linear scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Background {
    pub id: u16,
    /// Scroll rate indices into the game's fixed rate table.
    pub x_scroll: i16,
    pub y_scroll: i16,
    pub x_pos: i16,
    pub y_pos: i16,
    /// Layering ids of the three image files composing the layer.
    pub file_a: u16,
    pub file_b: u16,
    pub file_c: u16,
    pub zoom: u8,
}

impl Background {
    pub const STRIDE: usize = 24;

    fn read(rec: &[u8]) -> Self {
        Self {
            id: BigEndian::read_u16(&rec[0..2]),
            x_scroll: BigEndian::read_i16(&rec[2..4]),
            y_scroll: BigEndian::read_i16(&rec[4..6]),
            x_pos: BigEndian::read_i16(&rec[6..8]),
            y_pos: BigEndian::read_i16(&rec[8..10]),
            file_a: BigEndian::read_u16(&rec[10..12]),
            file_b: BigEndian::read_u16(&rec[12..14]),
            file_c: BigEndian::read_u16(&rec[14..16]),
            zoom: rec[16],
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_u16(&mut rec[0..2], self.id);
        BigEndian::write_i16(&mut rec[2..4], self.x_scroll);
        BigEndian::write_i16(&mut rec[4..6], self.y_scroll);
        BigEndian::write_i16(&mut rec[6..8], self.x_pos);
        BigEndian::write_i16(&mut rec[8..10], self.y_pos);
        BigEndian::write_u16(&mut rec[10..12], self.file_a);
        BigEndian::write_u16(&mut rec[12..14], self.file_b);
        BigEndian::write_u16(&mut rec[14..16], self.file_c);
        rec[16] = self.zoom;
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        decode_block(block, Self::STRIDE, "background", Self::read)
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        encode_block(records, Self::STRIDE, Self::write)
    }
}

// ---------------------------------------------------------------------------
// Block 6: entrances
// ---------------------------------------------------------------------------

/// One entrance record (block 6). Positions are in tile-sixteenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entrance {
    pub x: u16,
    pub y: u16,
    /// Unique within the level instance (0–255).
    pub id: u8,
    pub dest_area: u8,
    pub dest_entrance: u8,
    pub kind: u8,
    /// Owning zone. Derived, not authoritative: recomputed from the position at save
    /// time because authoring tools routinely leave stale values here.
    pub zone: u8,
    pub layer: u8,
    pub path: u8,
    pub settings: u16,
    /// Exit direction used when this is the far end of a connected pipe.
    pub exit_dir: u8,
}

impl Entrance {
    pub const STRIDE: usize = 20;
    /// Terminator appended after the last record.
    pub const TERMINATOR: [u8; 2] = [0xFF, 0xFF];

    pub const SETTING_FORWARD_PIPE: u16 = 0x0001;
    pub const SETTING_CONNECTED_PIPE: u16 = 0x0002;
    pub const SETTING_REVERSE: u16 = 0x0004;
    pub const SETTING_SPAWN_HALF_TILE: u16 = 0x0008;
    pub const SETTING_ENTERABLE: u16 = 0x0080;

    pub fn enterable(&self) -> bool {
        self.settings & Self::SETTING_ENTERABLE != 0
    }

    fn read(rec: &[u8]) -> Self {
        Self {
            x: BigEndian::read_u16(&rec[0..2]),
            y: BigEndian::read_u16(&rec[2..4]),
            id: rec[4],
            dest_area: rec[5],
            dest_entrance: rec[6],
            kind: rec[7],
            zone: rec[8],
            layer: rec[9],
            path: rec[10],
            settings: BigEndian::read_u16(&rec[12..14]),
            exit_dir: rec[14],
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_u16(&mut rec[0..2], self.x);
        BigEndian::write_u16(&mut rec[2..4], self.y);
        rec[4] = self.id;
        rec[5] = self.dest_area;
        rec[6] = self.dest_entrance;
        rec[7] = self.kind;
        rec[8] = self.zone;
        rec[9] = self.layer;
        rec[10] = self.path;
        BigEndian::write_u16(&mut rec[12..14], self.settings);
        rec[14] = self.exit_dir;
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        let mut out = Vec::new();
        for rec in block.chunks(Self::STRIDE) {
            if rec.len() < Self::STRIDE {
                if !rec.iter().all(|&b| b == 0xFF) {
                    warn!("ignoring {} trailing bytes after the last entrance record", rec.len());
                }
                break;
            }
            if rec[0..2] == Self::TERMINATOR {
                break;
            }
            out.push(Self::read(rec));
        }
        out
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        let mut out = encode_block(records, Self::STRIDE, Self::write);
        out.extend_from_slice(&Self::TERMINATOR);
        out
    }
}

// ---------------------------------------------------------------------------
// Block 7: sprites
// ---------------------------------------------------------------------------

/// One sprite record (block 7).
///
/// The 8-byte settings payload is opaque here: its nybble-addressed fields are
/// interpreted by external sprite-type definitions, and the codec layer only copies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sprite {
    pub kind: u16,
    pub x: u16,
    pub y: u16,
    pub settings: [u8; 8],
    /// Owning zone; recomputed from the position at save time like [`Entrance::zone`].
    pub zone: u8,
}

impl Sprite {
    pub const STRIDE: usize = 16;
    /// Terminator appended after the last record.
    pub const TERMINATOR: [u8; 4] = [0xFF; 4];

    fn read(rec: &[u8]) -> Self {
        let mut settings = [0u8; 8];
        settings.copy_from_slice(&rec[6..14]);
        Self {
            kind: BigEndian::read_u16(&rec[0..2]),
            x: BigEndian::read_u16(&rec[2..4]),
            y: BigEndian::read_u16(&rec[4..6]),
            settings,
            zone: rec[14],
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_u16(&mut rec[0..2], self.kind);
        BigEndian::write_u16(&mut rec[2..4], self.x);
        BigEndian::write_u16(&mut rec[4..6], self.y);
        rec[6..14].copy_from_slice(&self.settings);
        rec[14] = self.zone;
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        let mut out = Vec::new();
        for rec in block.chunks(Self::STRIDE) {
            if rec.len() < Self::STRIDE {
                if !rec.iter().all(|&b| b == 0xFF) {
                    warn!("ignoring {} trailing bytes after the last sprite record", rec.len());
                }
                break;
            }
            if rec[0..2] == [0xFF, 0xFF] {
                break;
            }
            out.push(Self::read(rec));
        }
        out
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        let mut out = encode_block(records, Self::STRIDE, Self::write);
        out.extend_from_slice(&Self::TERMINATOR);
        out
    }
}

// ---------------------------------------------------------------------------
// Block 8: loaded sprite ids
// ---------------------------------------------------------------------------

/// Decodes the list of sprite type ids the game preloads resources for (block 8).
/// Each record is a u16 id and a u16 of padding. The list is parsed for inspection but
/// never trusted: it is regenerated from the sprite list at save time.
pub fn decode_loaded_sprite_ids(block: &[u8]) -> Vec<u16> {
    decode_block(block, 4, "loaded sprite ids", |rec| BigEndian::read_u16(&rec[0..2]))
}

/// Encodes block 8 from the sprites actually present: their type ids, sorted and
/// deduplicated.
pub fn encode_loaded_sprite_ids(sprites: &[Sprite]) -> Vec<u8> {
    let mut ids: Vec<u16> = sprites.iter().map(|s| s.kind).collect();
    ids.sort_unstable();
    ids.dedup();
    encode_block(&ids, 4, |id, rec| BigEndian::write_u16(&mut rec[0..2], *id))
}

// ---------------------------------------------------------------------------
// Block 9: zones
// ---------------------------------------------------------------------------

/// One zone record as stored on the wire (block 9), with unresolved companion-record
/// ids. The document layer resolves these into an inline [`Zone`](super::Zone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneRecord {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
    pub theme: u16,
    pub lighting: u16,
    pub id: u8,
    pub bounds_id: u8,
    pub cam_mode: u8,
    pub cam_zoom: u8,
    pub visibility: u8,
    pub bg_a_id: u8,
    pub bg_b_id: u8,
    pub direction: u8,
    pub music: u8,
    /// Low bits: sound-effect modulation. Bit 7: boss-room flag.
    pub sfx: u8,
}

impl ZoneRecord {
    pub const STRIDE: usize = 24;

    fn read(rec: &[u8]) -> Self {
        Self {
            x: BigEndian::read_u16(&rec[0..2]),
            y: BigEndian::read_u16(&rec[2..4]),
            w: BigEndian::read_u16(&rec[4..6]),
            h: BigEndian::read_u16(&rec[6..8]),
            theme: BigEndian::read_u16(&rec[8..10]),
            lighting: BigEndian::read_u16(&rec[10..12]),
            id: rec[12],
            bounds_id: rec[13],
            cam_mode: rec[14],
            cam_zoom: rec[15],
            visibility: rec[16],
            bg_a_id: rec[17],
            bg_b_id: rec[18],
            direction: rec[19],
            music: rec[20],
            sfx: rec[21],
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_u16(&mut rec[0..2], self.x);
        BigEndian::write_u16(&mut rec[2..4], self.y);
        BigEndian::write_u16(&mut rec[4..6], self.w);
        BigEndian::write_u16(&mut rec[6..8], self.h);
        BigEndian::write_u16(&mut rec[8..10], self.theme);
        BigEndian::write_u16(&mut rec[10..12], self.lighting);
        rec[12] = self.id;
        rec[13] = self.bounds_id;
        rec[14] = self.cam_mode;
        rec[15] = self.cam_zoom;
        rec[16] = self.visibility;
        rec[17] = self.bg_a_id;
        rec[18] = self.bg_b_id;
        rec[19] = self.direction;
        rec[20] = self.music;
        rec[21] = self.sfx;
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        decode_block(block, Self::STRIDE, "zone", Self::read)
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        encode_block(records, Self::STRIDE, Self::write)
    }
}

// ---------------------------------------------------------------------------
// Block 10: locations
// ---------------------------------------------------------------------------

/// One location rectangle (block 10), used by sprites to reference level regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
    /// Unique within the level instance (0–255).
    pub id: u8,
}

impl Location {
    pub const STRIDE: usize = 12;

    fn read(rec: &[u8]) -> Self {
        Self {
            x: BigEndian::read_u16(&rec[0..2]),
            y: BigEndian::read_u16(&rec[2..4]),
            w: BigEndian::read_u16(&rec[4..6]),
            h: BigEndian::read_u16(&rec[6..8]),
            id: rec[8],
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_u16(&mut rec[0..2], self.x);
        BigEndian::write_u16(&mut rec[2..4], self.y);
        BigEndian::write_u16(&mut rec[4..6], self.w);
        BigEndian::write_u16(&mut rec[6..8], self.h);
        rec[8] = self.id;
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        decode_block(block, Self::STRIDE, "location", Self::read)
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        encode_block(records, Self::STRIDE, Self::write)
    }
}

// ---------------------------------------------------------------------------
// Block 11: camera profiles
// ---------------------------------------------------------------------------

/// One event-triggered camera profile (block 11).
///
/// The on-disk record also carries a bounds-block id, but it is synthesized at save time
/// (every real profile points at one shared "defaults" bounds record) and never
/// authored, so it is not part of the in-memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraProfile {
    /// Event flag that activates this profile.
    pub event_id: u16,
    pub cam_mode: u16,
    /// Index into the game's zoom-level list.
    pub zoom: u16,
}

impl CameraProfile {
    pub const STRIDE: usize = 8;

    /// Decodes block 11, dropping the leading all-zero placeholder profile if present.
    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        let records = decode_block(block, Self::STRIDE, "camera profile", |rec| {
            (
                Self {
                    event_id: BigEndian::read_u16(&rec[0..2]),
                    cam_mode: BigEndian::read_u16(&rec[2..4]),
                    zoom: BigEndian::read_u16(&rec[4..6]),
                },
                rec.iter().all(|&b| b == 0),
            )
        });
        let mut out: Vec<Self> = Vec::with_capacity(records.len());
        for (index, (profile, all_zero)) in records.into_iter().enumerate() {
            if index == 0 && all_zero {
                // placeholder emitted to dodge a consumer-side defaulting bug
                continue;
            }
            out.push(profile);
        }
        out
    }

    /// Encodes block 11. An empty profile list produces an empty block; otherwise the
    /// output starts with a throwaway all-zero placeholder profile, and one synthetic
    /// "defaults" bounds record is appended to `bounds` with every real profile's
    /// bounds-id pointing at it.
    pub fn encode_all(profiles: &[Self], bounds: &mut Vec<CameraBounds>) -> Vec<u8> {
        if profiles.is_empty() {
            return Vec::new();
        }

        let defaults_id = bounds.iter().map(|b| b.id + 1).max().unwrap_or(0);
        bounds.push(CameraBounds { id: defaults_id, ..CameraBounds::default() });

        let mut out = vec![0u8; Self::STRIDE];
        for profile in profiles {
            let mut rec = [0u8; Self::STRIDE];
            BigEndian::write_u16(&mut rec[0..2], profile.event_id);
            BigEndian::write_u16(&mut rec[2..4], profile.cam_mode);
            BigEndian::write_u16(&mut rec[4..6], profile.zoom);
            BigEndian::write_u16(&mut rec[6..8], defaults_id);
            out.extend_from_slice(&rec);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Blocks 12 and 13: paths and path nodes
// ---------------------------------------------------------------------------

/// One path header as stored on the wire (block 12): its nodes live in the shared flat
/// node table (block 13), addressed by start index and count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathRecord {
    pub id: u8,
    pub start: u16,
    pub count: u16,
    /// Bit 1: the path loops back to its first node.
    pub flags: u16,
}

impl PathRecord {
    pub const STRIDE: usize = 8;
    pub const FLAG_LOOP: u16 = 0x0002;

    fn read(rec: &[u8]) -> Self {
        Self {
            id: rec[0],
            start: BigEndian::read_u16(&rec[2..4]),
            count: BigEndian::read_u16(&rec[4..6]),
            flags: BigEndian::read_u16(&rec[6..8]),
        }
    }

    fn write(&self, rec: &mut [u8]) {
        rec[0] = self.id;
        BigEndian::write_u16(&mut rec[2..4], self.start);
        BigEndian::write_u16(&mut rec[4..6], self.count);
        BigEndian::write_u16(&mut rec[6..8], self.flags);
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        decode_block(block, Self::STRIDE, "path", Self::read)
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        encode_block(records, Self::STRIDE, Self::write)
    }
}

/// One node of a path (block 13). Node order within a path is its node id.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathNode {
    pub x: u16,
    pub y: u16,
    pub speed: f32,
    pub accel: f32,
    /// Ticks to wait at this node.
    pub delay: u16,
}

impl PathNode {
    pub const STRIDE: usize = 16;

    fn read(rec: &[u8]) -> Self {
        Self {
            x: BigEndian::read_u16(&rec[0..2]),
            y: BigEndian::read_u16(&rec[2..4]),
            speed: BigEndian::read_f32(&rec[4..8]),
            accel: BigEndian::read_f32(&rec[8..12]),
            delay: BigEndian::read_u16(&rec[12..14]),
        }
    }

    fn write(&self, rec: &mut [u8]) {
        BigEndian::write_u16(&mut rec[0..2], self.x);
        BigEndian::write_u16(&mut rec[2..4], self.y);
        BigEndian::write_f32(&mut rec[4..8], self.speed);
        BigEndian::write_f32(&mut rec[8..12], self.accel);
        BigEndian::write_u16(&mut rec[12..14], self.delay);
    }

    pub fn decode_all(block: &[u8]) -> Vec<Self> {
        decode_block(block, Self::STRIDE, "path node", Self::read)
    }

    pub fn encode_all(records: &[Self]) -> Vec<u8> {
        encode_block(records, Self::STRIDE, Self::write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tileset_names_round_trip() {
        let names = [
            "Pa0_jyotyu".to_string(),
            String::new(),
            "Pa2_doukutu".to_string(),
            String::new(),
        ];
        let block = encode_tileset_names(&names);
        assert_eq!(block.len(), 128);
        assert_eq!(decode_tileset_names(&block), names);
    }

    #[test]
    fn entrance_round_trip_with_terminator() {
        let entrances = vec![
            Entrance { x: 160, y: 320, id: 0, kind: 2, settings: Entrance::SETTING_ENTERABLE, ..Default::default() },
            Entrance { x: 400, y: 48, id: 1, dest_area: 1, dest_entrance: 3, path: 2, exit_dir: 1, ..Default::default() },
        ];
        let block = Entrance::encode_all(&entrances);
        assert_eq!(block.len(), 2 * Entrance::STRIDE + 2);
        assert_eq!(&block[block.len() - 2..], &Entrance::TERMINATOR);
        assert_eq!(Entrance::decode_all(&block), entrances);
    }

    #[test]
    fn empty_entrance_list_is_just_a_terminator() {
        let block = Entrance::encode_all(&[]);
        assert_eq!(block, vec![0xFF, 0xFF]);
        assert_eq!(Entrance::decode_all(&block), vec![]);
    }

    #[test]
    fn sprite_round_trip_with_terminator() {
        let sprites = vec![
            Sprite { kind: 92, x: 80, y: 160, settings: [0, 0, 0x30, 0, 0, 0, 0, 1], zone: 0 },
            Sprite { kind: 11, x: 320, y: 160, settings: [0; 8], zone: 1 },
        ];
        let block = Sprite::encode_all(&sprites);
        assert_eq!(block.len(), 2 * Sprite::STRIDE + 4);
        assert_eq!(&block[block.len() - 4..], &Sprite::TERMINATOR);
        assert_eq!(Sprite::decode_all(&block), sprites);
    }

    #[test]
    fn oversized_block_is_truncated_to_whole_records() {
        let mut block = Location::encode_all(&[Location { x: 1, y: 2, w: 3, h: 4, id: 9 }]);
        block.extend_from_slice(&[0xAB; 5]); // historical tools wrote slop like this
        let records = Location::decode_all(&block);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 9);
    }

    #[test]
    fn loaded_sprite_ids_are_sorted_and_deduplicated() {
        let sprites = vec![
            Sprite { kind: 300, ..Default::default() },
            Sprite { kind: 7, ..Default::default() },
            Sprite { kind: 300, ..Default::default() },
        ];
        let block = encode_loaded_sprite_ids(&sprites);
        assert_eq!(decode_loaded_sprite_ids(&block), vec![7, 300]);
    }

    #[test]
    fn zone_and_companions_round_trip() {
        let zones = vec![ZoneRecord {
            x: 0, y: 0, w: 100, h: 100,
            theme: 3, lighting: 1,
            id: 0, bounds_id: 0, cam_mode: 1, cam_zoom: 2,
            visibility: 0, bg_a_id: 0, bg_b_id: 0, direction: 0,
            music: 24, sfx: 0x81,
        }];
        assert_eq!(ZoneRecord::decode_all(&ZoneRecord::encode_all(&zones)), zones);

        let bounds = vec![CameraBounds { upper: -48, lower: 48, mp_upper: -32, mp_lower: 32, id: 0, unknown_12: 0 }];
        assert_eq!(CameraBounds::decode_all(&CameraBounds::encode_all(&bounds)), bounds);

        let bgs = vec![Background { id: 0, x_scroll: 1, y_scroll: -2, x_pos: 0, y_pos: 8, file_a: 1, file_b: 2, file_c: 3, zoom: 0 }];
        assert_eq!(Background::decode_all(&Background::encode_all(&bgs)), bgs);
    }

    #[test]
    fn first_by_id_takes_the_first_match() {
        let bounds = vec![
            CameraBounds { id: 5, upper: 1, ..Default::default() },
            CameraBounds { id: 5, upper: 2, ..Default::default() },
        ];
        let hit = first_by_id(&bounds, 5, |b| b.id).unwrap();
        assert_eq!(hit.upper, 1);
        assert!(first_by_id(&bounds, 6, |b| b.id).is_none());
    }

    #[test]
    fn camera_profiles_round_trip_through_the_placeholder() {
        let profiles = vec![
            CameraProfile { event_id: 4, cam_mode: 1, zoom: 2 },
            CameraProfile { event_id: 9, cam_mode: 0, zoom: 5 },
        ];
        let mut bounds = vec![CameraBounds { id: 0, ..Default::default() }];
        let block = CameraProfile::encode_all(&profiles, &mut bounds);

        // placeholder first, then the real records
        assert_eq!(block.len(), 3 * CameraProfile::STRIDE);
        assert!(block[..CameraProfile::STRIDE].iter().all(|&b| b == 0));
        assert_eq!(CameraProfile::decode_all(&block), profiles);

        // one synthetic defaults bounds record was appended and is pointed at
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[1].id, 1);
        assert_eq!(BigEndian::read_u16(&block[CameraProfile::STRIDE + 6..CameraProfile::STRIDE + 8]), 1);
    }

    #[test]
    fn empty_camera_profiles_stay_empty() {
        let mut bounds = Vec::new();
        assert!(CameraProfile::encode_all(&[], &mut bounds).is_empty());
        assert!(bounds.is_empty());
        assert!(CameraProfile::decode_all(&[]).is_empty());
    }

    #[test]
    fn path_records_round_trip() {
        let paths = vec![PathRecord { id: 1, start: 0, count: 3, flags: PathRecord::FLAG_LOOP }];
        assert_eq!(PathRecord::decode_all(&PathRecord::encode_all(&paths)), paths);

        let nodes = vec![
            PathNode { x: 16, y: 32, speed: 1.5, accel: 0.25, delay: 30 },
            PathNode { x: 64, y: 32, speed: 2.0, accel: 0.0, delay: 0 },
        ];
        assert_eq!(PathNode::decode_all(&PathNode::encode_all(&nodes)), nodes);
    }
}
