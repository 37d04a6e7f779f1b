//! End-to-end test: author an area, pack it into a compressed level archive, and read
//! everything back the way an editor would.

use wiilevel::course::records::{CameraBounds, Entrance, PathNode, Sprite};
use wiilevel::course::{Area, Path, Zone};
use wiilevel::extract::{compress, is_compressed};
use wiilevel::Archive;

fn authored_area() -> Area {
    let mut area = Area::default();
    area.tilesets[0] = "Pa0_jyotyu".to_string();
    area.tilesets[1] = "Pa1_gake".to_string();
    area.options.time_limit = 500;
    area.zones.push(Zone {
        id: 0,
        x: 0,
        y: 0,
        w: 400,
        h: 200,
        theme: 2,
        music: 11,
        bounds: CameraBounds { upper: -64, lower: 64, ..Default::default() },
        ..Default::default()
    });
    // one entrance inside the zone, one far outside it
    area.entrances.push(Entrance { x: 16, y: 16, id: 0, ..Default::default() });
    area.entrances.push(Entrance { x: 5000, y: 5000, id: 1, zone: 250, ..Default::default() });
    area.sprites.push(Sprite { kind: 31, x: 48, y: 32, settings: [0; 8], zone: 99 });
    area.paths.push(Path {
        id: 1,
        looping: false,
        nodes: vec![
            PathNode { x: 0, y: 0, speed: 1.5, accel: 0.0, delay: 0 },
            PathNode { x: 64, y: 16, speed: 1.5, accel: 0.25, delay: 30 },
        ],
    });
    area.metadata.title = "archive round trip".to_string();
    area.metadata.creator = "0.8".to_string();
    area
}

#[test]
fn level_survives_the_full_archive_cycle() {
    let area = authored_area();

    // pack: course blob into a named archive, then compress the whole thing
    let mut archive = Archive::default();
    archive.set("course/course1.bin", area.save());
    archive.set("course/course1_bgdatL1.bin", vec![0xFF, 0xFF]);
    let packed = compress(&archive.to_bytes());
    assert!(is_compressed(&packed));

    // unpack: Archive::load transparently decompresses
    let unpacked = Archive::load(&packed).unwrap();
    let blob = unpacked.get("course/course1.bin").expect("course file present");
    let back = Area::load(blob).unwrap();

    assert_eq!(back.tilesets, area.tilesets);
    assert_eq!(back.options.time_limit, 500);
    assert_eq!(back.zones, area.zones);
    assert_eq!(back.paths, area.paths);
    assert_eq!(back.metadata, area.metadata);

    // stale entrance/sprite zone ids were recomputed on save: the first entrance by
    // containment, the second by nearest-zone fallback
    assert_eq!([back.entrances[0].zone, back.entrances[1].zone], [0, 0]);
    assert_eq!(back.sprites[0].zone, 0);

    // the sibling file is untouched
    assert_eq!(unpacked.get("course/course1_bgdatL1.bin"), Some(&[0xFF, 0xFF][..]));
}

#[test]
fn editing_one_file_keeps_the_rest_byte_identical() {
    let mut archive = Archive::default();
    archive.set("course/course1.bin", authored_area().save());
    archive.set("readme.txt", b"hands off".to_vec());

    let mut edited = Archive::load(&archive.to_bytes()).unwrap();
    let mut area = Area::load(edited.get("course/course1.bin").unwrap()).unwrap();
    area.metadata.title = "renamed".to_string();
    edited.set("course/course1.bin", area.save());

    let reread = Archive::load(&edited.to_bytes()).unwrap();
    assert_eq!(reread.get("readme.txt"), Some(&b"hands off"[..]));
    let reread_area = Area::load(reread.get("course/course1.bin").unwrap()).unwrap();
    assert_eq!(reread_area.metadata.title, "renamed");
}
