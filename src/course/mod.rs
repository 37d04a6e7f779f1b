//! The course file: the 14-block table, the record lists inside it, and the [`Area`]
//! document that ties them together across a load/save cycle.
//!
//! On disc a course is one flat blob: a 112-byte header of 14 big-endian
//! (offset, length) pairs, then a variable-length metadata region, then the 14 blocks
//! laid out contiguously. Block meaning is fixed by position:
//!
//! | # | contents          | # | contents            |
//! |---|-------------------|----|--------------------|
//! | 0 | tileset names     | 7  | sprites            |
//! | 1 | area options      | 8  | loaded sprite ids  |
//! | 2 | camera bounds     | 9  | zones              |
//! | 3 | (unused)          | 10 | locations          |
//! | 4 | background A      | 11 | camera profiles    |
//! | 5 | background B      | 12 | paths              |
//! | 6 | entrances         | 13 | path nodes         |

use byteorder::{BigEndian, ByteOrder};
use log::debug;

pub mod metadata;
pub mod records;

pub use metadata::LevelMetadata;
use records::{
    first_by_id, AreaOptions, Background, CameraBounds, CameraProfile, Entrance, Location,
    PathNode, PathRecord, Sprite, ZoneRecord,
};

use crate::extract::{read, ParseError};

/// Number of blocks in a course file.
pub const BLOCK_COUNT: usize = 14;

/// Size of the offset/length header, and the conventional start of the metadata region.
pub const HEADER_SIZE: usize = BLOCK_COUNT * 8;

/// A course blob split into its 14 blocks plus the metadata region.
///
/// [`split`](Self::split) and [`join`](Self::join) are exact inverses for any
/// canonically laid-out blob (header, 4-byte-aligned metadata, then the blocks
/// contiguous and in order — which is the only layout the game and this crate produce).
#[derive(Debug, Clone, Default)]
pub struct BlockTable {
    pub blocks: [Vec<u8>; BLOCK_COUNT],
    /// Raw bytes between the header and block 0; empty when block 0 starts at 0x70.
    pub metadata: Vec<u8>,
}

impl BlockTable {
    /// Splits a course blob into its blocks via the offset/length header.
    pub fn split(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < HEADER_SIZE {
            return Err(ParseError::ShortBlockTable(data.len()));
        }

        let mut blocks: [Vec<u8>; BLOCK_COUNT] = Default::default();
        let mut ptr = 0;
        let mut block0_offset = None;
        let mut min_offset = data.len();
        for (index, block) in blocks.iter_mut().enumerate() {
            let offset = BigEndian::read_u32(read(data, &mut ptr, 4)?) as usize;
            let length = BigEndian::read_u32(read(data, &mut ptr, 4)?) as usize;
            // a zero-length block's offset is meaningless
            if length == 0 {
                continue;
            }
            *block = data
                .get(offset..offset + length)
                .ok_or(ParseError::BadBlockBounds { index, offset, length })?
                .to_vec();
            if index == 0 {
                block0_offset = Some(offset);
            }
            min_offset = min_offset.min(offset);
        }

        // Metadata fills the gap between the header and block 0 (or the first non-empty
        // block, for the odd file with an empty block 0)
        let first_block = block0_offset.unwrap_or(min_offset);
        let metadata = if first_block > HEADER_SIZE {
            data[HEADER_SIZE..first_block].to_vec()
        } else {
            Vec::new()
        };

        Ok(Self { blocks, metadata })
    }

    /// Re-serializes the blocks contiguously after the header and padded metadata,
    /// preserving block order and recomputing every offset.
    pub fn join(&self) -> Vec<u8> {
        let mut metadata = self.metadata.clone();
        while metadata.len() % 4 != 0 {
            metadata.push(0);
        }

        let mut offset = HEADER_SIZE + metadata.len();
        let mut header = [0u8; HEADER_SIZE];
        for (index, block) in self.blocks.iter().enumerate() {
            BigEndian::write_u32(&mut header[index * 8..index * 8 + 4], offset as u32);
            BigEndian::write_u32(&mut header[index * 8 + 4..index * 8 + 8], block.len() as u32);
            offset += block.len();
        }

        let mut out = Vec::with_capacity(offset);
        out.extend_from_slice(&header);
        out.extend_from_slice(&metadata);
        for block in &self.blocks {
            out.extend_from_slice(block);
        }
        out
    }
}

/// A zone with its companion records resolved inline.
///
/// On the wire a zone references a [`CameraBounds`] and two [`Background`] records by id;
/// loading resolves those (first match wins), and saving re-emits companions 1:1 in zone
/// order with ids equal to the zone's index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Zone {
    pub id: u8,
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
    pub theme: u16,
    pub lighting: u16,
    pub cam_mode: u8,
    pub cam_zoom: u8,
    pub visibility: u8,
    pub direction: u8,
    pub music: u8,
    /// Low bits: sound-effect modulation. Bit 7: boss-room flag.
    pub sfx: u8,
    pub bounds: CameraBounds,
    pub bg_a: Background,
    pub bg_b: Background,
}

impl Zone {
    /// Whether a point (in tile-sixteenths) lies inside this zone.
    pub fn contains(&self, x: u16, y: u16) -> bool {
        let (x, y) = (x as u32, y as u32);
        x >= self.x as u32
            && x < self.x as u32 + self.w as u32
            && y >= self.y as u32
            && y < self.y as u32 + self.h as u32
    }

    /// Squared distance from a point to this zone's rectangle (zero when inside).
    fn distance_sq(&self, x: u16, y: u16) -> u64 {
        let (x, y) = (x as i64, y as i64);
        let dx = (self.x as i64 - x).max(x - (self.x as i64 + self.w as i64)).max(0) as u64;
        let dy = (self.y as i64 - y).max(y - (self.y as i64 + self.h as i64)).max(0) as u64;
        dx * dx + dy * dy
    }
}

/// A path with its nodes pulled out of the shared flat node table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub id: u8,
    pub looping: bool,
    pub nodes: Vec<PathNode>,
}

/// One editable course area: every record list plus the opaque blocks carried through
/// untouched.
///
/// Loading is lenient where the format history demands it (odd block sizes, stale ids);
/// saving performs the multi-pass cross-referencing the game expects (zone-id recompute,
/// companion emission, camera-profile synthesis, path flattening), so record lists must
/// not be mutated concurrently with an in-flight [`save`](Self::save).
#[derive(Debug, Clone, Default)]
pub struct Area {
    pub tilesets: [String; 4],
    pub options: AreaOptions,
    pub zones: Vec<Zone>,
    pub entrances: Vec<Entrance>,
    pub sprites: Vec<Sprite>,
    pub locations: Vec<Location>,
    pub camera_profiles: Vec<CameraProfile>,
    pub paths: Vec<Path>,
    pub metadata: LevelMetadata,
    /// Block 3 has no known meaning; it is carried through byte-for-byte.
    pub raw_block_3: Vec<u8>,
    /// Kept verbatim when block 11 is present but does not look like profile records.
    raw_profiles: Vec<u8>,
}

impl Area {
    /// Decodes a course blob into an editable area.
    pub fn load(data: &[u8]) -> Result<Self, ParseError> {
        let table = BlockTable::split(data)?;

        let bounds = CameraBounds::decode_all(&table.blocks[2]);
        let bgs_a = Background::decode_all(&table.blocks[4]);
        let bgs_b = Background::decode_all(&table.blocks[5]);

        let zones = ZoneRecord::decode_all(&table.blocks[9])
            .into_iter()
            .map(|record| {
                let bounds = first_by_id(&bounds, record.bounds_id as u16, |b| b.id)
                    .copied()
                    .unwrap_or_default();
                let bg_a = first_by_id(&bgs_a, record.bg_a_id as u16, |b| b.id)
                    .copied()
                    .unwrap_or_default();
                let bg_b = first_by_id(&bgs_b, record.bg_b_id as u16, |b| b.id)
                    .copied()
                    .unwrap_or_default();
                Zone {
                    id: record.id,
                    x: record.x,
                    y: record.y,
                    w: record.w,
                    h: record.h,
                    theme: record.theme,
                    lighting: record.lighting,
                    cam_mode: record.cam_mode,
                    cam_zoom: record.cam_zoom,
                    visibility: record.visibility,
                    direction: record.direction,
                    music: record.music,
                    sfx: record.sfx,
                    bounds,
                    bg_a,
                    bg_b,
                }
            })
            .collect();

        let node_table = PathNode::decode_all(&table.blocks[13]);
        let paths = PathRecord::decode_all(&table.blocks[12])
            .into_iter()
            .map(|record| {
                let start = (record.start as usize).min(node_table.len());
                let end = (start + record.count as usize).min(node_table.len());
                if end - start != record.count as usize {
                    debug!("path {} addresses nodes past the node table; clamping", record.id);
                }
                Path {
                    id: record.id,
                    looping: record.flags & PathRecord::FLAG_LOOP != 0,
                    nodes: node_table[start..end].to_vec(),
                }
            })
            .collect();

        // Block 11 is opaque pass-through when it doesn't divide into profile records
        let profile_block = &table.blocks[11];
        let (camera_profiles, raw_profiles) = if profile_block.len() % CameraProfile::STRIDE == 0 {
            (CameraProfile::decode_all(profile_block), Vec::new())
        } else {
            (Vec::new(), profile_block.clone())
        };

        Ok(Self {
            tilesets: records::decode_tileset_names(&table.blocks[0]),
            options: AreaOptions::decode(&table.blocks[1]),
            zones,
            entrances: Entrance::decode_all(&table.blocks[6]),
            sprites: Sprite::decode_all(&table.blocks[7]),
            locations: Location::decode_all(&table.blocks[10]),
            camera_profiles,
            paths,
            metadata: metadata::decode(&table.metadata),
            raw_block_3: table.blocks[3].clone(),
            raw_profiles,
        })
    }

    /// Encodes the area back into a course blob.
    pub fn save(&self) -> Vec<u8> {
        // Pass 1: recompute derived data. Entrance/sprite zone ids are never trusted
        // from the file; authoring tools routinely leave stale values there.
        let mut entrances = self.entrances.clone();
        for entrance in &mut entrances {
            entrance.zone = self.zone_at(entrance.x, entrance.y);
        }
        let mut sprites = self.sprites.clone();
        for sprite in &mut sprites {
            sprite.zone = self.zone_at(sprite.x, sprite.y);
        }

        // Companion records are emitted 1:1, indexed by zone order
        let mut bounds = Vec::with_capacity(self.zones.len());
        let mut bgs_a = Vec::with_capacity(self.zones.len());
        let mut bgs_b = Vec::with_capacity(self.zones.len());
        let mut zone_records = Vec::with_capacity(self.zones.len());
        for (index, zone) in self.zones.iter().enumerate() {
            let index = index as u16;
            bounds.push(CameraBounds { id: index, ..zone.bounds });
            bgs_a.push(Background { id: index, ..zone.bg_a });
            bgs_b.push(Background { id: index, ..zone.bg_b });
            zone_records.push(ZoneRecord {
                x: zone.x,
                y: zone.y,
                w: zone.w,
                h: zone.h,
                theme: zone.theme,
                lighting: zone.lighting,
                id: zone.id,
                bounds_id: index as u8,
                cam_mode: zone.cam_mode,
                cam_zoom: zone.cam_zoom,
                visibility: zone.visibility,
                bg_a_id: index as u8,
                bg_b_id: index as u8,
                direction: zone.direction,
                music: zone.music,
                sfx: zone.sfx,
            });
        }

        // Pass 2: camera profiles (may append a synthetic defaults bounds record)
        let profile_block = if self.camera_profiles.is_empty() {
            self.raw_profiles.clone()
        } else {
            CameraProfile::encode_all(&self.camera_profiles, &mut bounds)
        };

        // Pass 3: flatten paths into the shared node table, dropping empty paths
        let mut path_records = Vec::with_capacity(self.paths.len());
        let mut node_table = Vec::new();
        for path in &self.paths {
            if path.nodes.is_empty() {
                continue;
            }
            path_records.push(PathRecord {
                id: path.id,
                start: node_table.len() as u16,
                count: path.nodes.len() as u16,
                flags: if path.looping { PathRecord::FLAG_LOOP } else { 0 },
            });
            node_table.extend_from_slice(&path.nodes);
        }

        let table = BlockTable {
            blocks: [
                records::encode_tileset_names(&self.tilesets),
                self.options.encode(),
                CameraBounds::encode_all(&bounds),
                self.raw_block_3.clone(),
                Background::encode_all(&bgs_a),
                Background::encode_all(&bgs_b),
                Entrance::encode_all(&entrances),
                Sprite::encode_all(&sprites),
                records::encode_loaded_sprite_ids(&sprites),
                ZoneRecord::encode_all(&zone_records),
                Location::encode_all(&self.locations),
                profile_block,
                PathRecord::encode_all(&path_records),
                PathNode::encode_all(&node_table),
            ],
            metadata: metadata::encode(&self.metadata),
        };
        table.join()
    }

    /// The id of the zone owning a point: the containing zone if any, else the nearest
    /// one by distance to its rectangle, else 0 for an area with no zones. First match
    /// wins on ties, as everywhere else in the format.
    pub fn zone_at(&self, x: u16, y: u16) -> u8 {
        if let Some(zone) = self.zones.iter().find(|z| z.contains(x, y)) {
            return zone.id;
        }
        self.zones
            .iter()
            .min_by_key(|z| z.distance_sq(x, y))
            .map(|z| z.id)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_with(blocks: [Vec<u8>; BLOCK_COUNT], metadata: Vec<u8>) -> Vec<u8> {
        BlockTable { blocks, metadata }.join()
    }

    #[test]
    fn block_table_round_trips() {
        let mut blocks: [Vec<u8>; BLOCK_COUNT] = Default::default();
        blocks[0] = vec![1; 128];
        blocks[6] = vec![2; 40];
        blocks[13] = vec![3; 16];
        let blob = blob_with(blocks, vec![9, 9, 9, 9]);

        let table = BlockTable::split(&blob).unwrap();
        assert_eq!(table.metadata, vec![9, 9, 9, 9]);
        assert_eq!(table.blocks[6], vec![2; 40]);
        assert_eq!(table.join(), blob);
    }

    #[test]
    fn metadata_is_padded_to_four_bytes() {
        let mut table = BlockTable::default();
        table.blocks[0] = vec![5; 8];
        table.metadata = vec![1, 2, 3];
        let blob = table.join();
        // block 0 must start aligned, right after the padded metadata
        let offset = BigEndian::read_u32(&blob[0..4]) as usize;
        assert_eq!(offset, HEADER_SIZE + 4);
        assert_eq!(BlockTable::split(&blob).unwrap().metadata, vec![1, 2, 3, 0]);
    }

    #[test]
    fn absent_metadata_means_block_zero_at_0x70() {
        let mut table = BlockTable::default();
        table.blocks[0] = vec![5; 8];
        let blob = table.join();
        assert_eq!(BigEndian::read_u32(&blob[0..4]) as usize, HEADER_SIZE);
        assert!(BlockTable::split(&blob).unwrap().metadata.is_empty());
    }

    #[test]
    fn short_blob_is_an_error() {
        assert!(matches!(
            BlockTable::split(&[0u8; 60]),
            Err(ParseError::ShortBlockTable(60))
        ));
    }

    #[test]
    fn out_of_range_block_is_an_error() {
        let mut blob = vec![0u8; HEADER_SIZE];
        BigEndian::write_u32(&mut blob[0..4], 0x70);
        BigEndian::write_u32(&mut blob[4..8], 0x100); // past the end
        assert!(matches!(
            BlockTable::split(&blob),
            Err(ParseError::BadBlockBounds { index: 0, .. })
        ));
    }

    fn sample_area() -> Area {
        let mut area = Area::default();
        area.tilesets[0] = "Pa0_jyotyu".to_string();
        area.zones.push(Zone {
            id: 0,
            x: 0,
            y: 0,
            w: 100,
            h: 100,
            theme: 1,
            music: 24,
            bounds: CameraBounds { upper: -48, lower: 48, ..Default::default() },
            bg_a: Background { x_scroll: 1, ..Default::default() },
            bg_b: Background { y_pos: -8, ..Default::default() },
            ..Default::default()
        });
        area.entrances.push(Entrance { x: 50, y: 50, id: 0, kind: 0, zone: 7, ..Default::default() });
        area.entrances.push(Entrance { x: 2000, y: 2000, id: 1, kind: 2, zone: 7, ..Default::default() });
        area.sprites.push(Sprite { kind: 92, x: 80, y: 80, settings: [1; 8], zone: 9 });
        area.locations.push(Location { x: 0, y: 0, w: 16, h: 16, id: 1 });
        area.paths.push(Path {
            id: 1,
            looping: true,
            nodes: vec![
                PathNode { x: 0, y: 0, speed: 1.0, accel: 0.0, delay: 0 },
                PathNode { x: 32, y: 0, speed: 1.0, accel: 0.5, delay: 10 },
            ],
        });
        area.paths.push(Path { id: 2, looping: false, nodes: Vec::new() }); // dropped on save
        area.metadata.title = "test level".to_string();
        area
    }

    #[test]
    fn area_round_trips_through_save_and_load() {
        let area = sample_area();
        let blob = area.save();
        let back = Area::load(&blob).unwrap();

        assert_eq!(back.tilesets, area.tilesets);
        assert_eq!(back.zones, area.zones);
        assert_eq!(back.locations, area.locations);
        assert_eq!(back.metadata, area.metadata);

        // stale zone ids were recomputed: both entrances land in zone 0 (the second by
        // the nearest-zone fallback), and positions/types survived
        assert_eq!(back.entrances.len(), 2);
        assert_eq!([back.entrances[0].zone, back.entrances[1].zone], [0, 0]);
        assert_eq!((back.entrances[1].x, back.entrances[1].y, back.entrances[1].kind), (2000, 2000, 2));
        assert_eq!(back.sprites[0].zone, 0);

        // the empty path was dropped, the real one kept intact
        assert_eq!(back.paths.len(), 1);
        assert_eq!(back.paths[0], area.paths[0]);
    }

    #[test]
    fn saving_twice_is_stable() {
        let blob = sample_area().save();
        let again = Area::load(&blob).unwrap().save();
        assert_eq!(blob, again);
    }

    #[test]
    fn camera_profiles_synthesize_a_defaults_bounds_record() {
        let mut area = sample_area();
        area.camera_profiles.push(CameraProfile { event_id: 3, cam_mode: 1, zoom: 0 });
        let blob = area.save();

        let table = BlockTable::split(&blob).unwrap();
        let bounds = CameraBounds::decode_all(&table.blocks[2]);
        // one per zone plus the synthetic defaults record
        assert_eq!(bounds.len(), area.zones.len() + 1);

        let back = Area::load(&blob).unwrap();
        assert_eq!(back.camera_profiles, area.camera_profiles);
        // the synthetic record is unreferenced by zones, so it vanishes on reload
        assert_eq!(back.zones, area.zones);
    }

    #[test]
    fn unused_block_is_carried_through() {
        let mut area = sample_area();
        area.raw_block_3 = vec![0xAA, 0xBB, 0xCC];
        let back = Area::load(&area.save()).unwrap();
        assert_eq!(back.raw_block_3, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn zone_at_prefers_containment_then_distance() {
        let mut area = Area::default();
        assert_eq!(area.zone_at(10, 10), 0); // no zones at all

        area.zones.push(Zone { id: 4, x: 0, y: 0, w: 100, h: 100, ..Default::default() });
        area.zones.push(Zone { id: 7, x: 500, y: 0, w: 100, h: 100, ..Default::default() });
        assert_eq!(area.zone_at(50, 50), 4);
        assert_eq!(area.zone_at(560, 50), 7);
        assert_eq!(area.zone_at(450, 50), 7); // nearest, not first
        assert_eq!(area.zone_at(200, 50), 4);
    }
}
