//! The named-file tree archive every level ships in.
//!
//! The container flattens a directory tree into one buffer: a 32-byte header, a table of
//! 12-byte nodes (type byte + 24-bit name offset, then two 32-bit words), a string table,
//! and 0x20-aligned file data. A directory node's words are its parent index and the index
//! just past its subtree; a file node's are its absolute data offset and size. The root
//! node's size doubles as the total node count.
//!
//! Only the operations the editor needs are provided: enumerate, read-by-name,
//! overwrite-by-name, and full re-serialization. [`Archive::to_bytes`] recomputes every
//! offset, so a parse/serialize cycle is guaranteed to reproduce the same path→bytes
//! mapping in the same order; it is additionally byte-identical for buffers that
//! [`Archive::to_bytes`] itself produced.

use byteorder::{BigEndian, ByteOrder};

use super::{decompress, is_compressed, read, ParseError};

/// Magic bytes at the start of a raw (uncompressed) archive.
pub const ARC_MAGIC: u32 = 0x55AA_382D;

/// Alignment of file data within the archive.
const DATA_ALIGN: usize = 0x20;

/// One named entry of an [`Archive`]. `data` is `None` for directory entries.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub data: Option<Vec<u8>>,
}

/// The parsed contents of one level archive: an ordered sequence of path→bytes pairs.
///
/// Paths use `/` separators and no leading slash. Directory entries exist as explicit
/// `None` entries when the source archive carried them, but are otherwise implied by path
/// prefixes and never separately validated.
#[derive(Debug, Default, Clone)]
pub struct Archive {
    entries: Vec<Entry>,
}

impl Archive {
    /// Parses a top-level file buffer, decompressing it first if it carries the LZ tag
    /// byte rather than the raw archive magic.
    pub fn load(data: &[u8]) -> Result<Self, ParseError> {
        if is_compressed(data) {
            Self::parse(&decompress(data)?)
        } else {
            Self::parse(data)
        }
    }

    /// Parses a raw (uncompressed) archive buffer.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut ptr = 0;

        let magic = BigEndian::read_u32(read(data, &mut ptr, 4)?);
        if magic != ARC_MAGIC {
            return Err(ParseError::BadMagic(magic));
        }
        let root_offset = BigEndian::read_u32(read(data, &mut ptr, 4)?) as usize;
        let _header_size = BigEndian::read_u32(read(data, &mut ptr, 4)?);
        let _data_offset = BigEndian::read_u32(read(data, &mut ptr, 4)?);

        // Root node: must be a directory; its size word is the total node count
        let mut node_ptr = root_offset;
        let (kind, _name, a, b) = read_node(data, &mut node_ptr)?;
        if kind != 1 {
            return Err(ParseError::BadNode { index: 0, offset: a as usize, size: b as usize });
        }
        let node_count = b as usize;
        let strings_at = root_offset + node_count * 12;

        let mut entries: Vec<Entry> = Vec::with_capacity(node_count.saturating_sub(1));
        // (end index, path prefix) of each open directory
        let mut dirs: Vec<(usize, String)> = vec![(node_count, String::new())];

        for index in 1..node_count {
            while dirs.last().map(|d| index >= d.0) == Some(true) {
                dirs.pop();
            }
            let prefix = dirs.last().map(|d| d.1.as_str()).unwrap_or("");

            let (kind, name_offset, a, b) = read_node(data, &mut node_ptr)?;
            let name = node_name(data, strings_at + name_offset, index)?;
            let path = format!("{prefix}{name}");

            if entries.iter().any(|e| e.path == path) {
                return Err(ParseError::DuplicateName(path));
            }

            match kind {
                // directory: `a` is the parent index, `b` the index past the subtree
                1 => {
                    dirs.push((b as usize, format!("{path}/")));
                    entries.push(Entry { path, data: None });
                }
                // file: `a` is the absolute data offset, `b` the size
                0 => {
                    let (offset, size) = (a as usize, b as usize);
                    let bytes = data
                        .get(offset..offset + size)
                        .ok_or(ParseError::BadNode { index, offset, size })?;
                    entries.push(Entry { path, data: Some(bytes.to_vec()) });
                }
                _ => return Err(ParseError::BadNode { index, offset: a as usize, size: b as usize }),
            }
        }

        Ok(Self { entries })
    }

    /// All entries, in archive order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Looks up a file's bytes by its full path. `None` for unknown paths and for
    /// directory entries.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .and_then(|e| e.data.as_deref())
    }

    /// Replaces a file's bytes, keeping its position in the archive. An unknown path is
    /// appended as a new file entry (parent directories are implied by the path).
    pub fn set(&mut self, path: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| e.path == path) {
            Some(entry) => entry.data = Some(data),
            None => self.entries.push(Entry { path: path.to_string(), data: Some(data) }),
        }
    }

    /// Re-serializes the archive, recomputing the node table, string table, and every
    /// data offset.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut root = Vec::new();
        for entry in &self.entries {
            insert(&mut root, &entry.path, entry.data.as_ref());
        }

        // Root node first, then the tree in depth-first order
        let mut flat = vec![FlatNode {
            is_dir: true,
            name: String::new(),
            parent: 0,
            end: 0,
            data: None,
        }];
        flatten(&root, 0, &mut flat);
        let count = flat.len();
        flat[0].end = count;

        // String table, one zero-terminated name per node in node order
        let mut strings = Vec::new();
        let mut name_offsets = Vec::with_capacity(count);
        for node in &flat {
            name_offsets.push(strings.len());
            strings.extend_from_slice(node.name.as_bytes());
            strings.push(0);
        }

        let header_size = count * 12 + strings.len();
        let data_start = align(0x20 + header_size);

        // Assign file data offsets
        let mut cursor = data_start;
        let mut data_offsets = Vec::with_capacity(count);
        for node in &flat {
            if let Some(data) = &node.data {
                cursor = align(cursor);
                data_offsets.push(cursor);
                cursor += data.len();
            } else {
                data_offsets.push(0);
            }
        }

        let mut out = Vec::with_capacity(cursor);
        let mut word = [0u8; 4];
        BigEndian::write_u32(&mut word, ARC_MAGIC);
        out.extend_from_slice(&word);
        BigEndian::write_u32(&mut word, 0x20);
        out.extend_from_slice(&word);
        BigEndian::write_u32(&mut word, header_size as u32);
        out.extend_from_slice(&word);
        BigEndian::write_u32(&mut word, data_start as u32);
        out.extend_from_slice(&word);
        out.resize(0x20, 0);

        for (index, node) in flat.iter().enumerate() {
            let kind = if node.is_dir { 1u32 } else { 0 };
            BigEndian::write_u32(&mut word, kind << 24 | name_offsets[index] as u32);
            out.extend_from_slice(&word);
            let (a, b) = if node.is_dir {
                (node.parent as u32, node.end as u32)
            } else {
                let len = node.data.as_ref().map(|d| d.len()).unwrap_or(0);
                (data_offsets[index] as u32, len as u32)
            };
            BigEndian::write_u32(&mut word, a);
            out.extend_from_slice(&word);
            BigEndian::write_u32(&mut word, b);
            out.extend_from_slice(&word);
        }
        out.extend_from_slice(&strings);

        for node in &flat {
            if let Some(data) = &node.data {
                out.resize(align(out.len()), 0);
                out.extend_from_slice(data);
            }
        }

        out
    }
}

/// Reads one 12-byte node, returning `(type, name offset, word a, word b)`.
fn read_node(data: &[u8], ptr: &mut usize) -> Result<(u8, usize, u32, u32), ParseError> {
    let word = BigEndian::read_u32(read(data, ptr, 4)?);
    let a = BigEndian::read_u32(read(data, ptr, 4)?);
    let b = BigEndian::read_u32(read(data, ptr, 4)?);
    Ok(((word >> 24) as u8, (word & 0xFF_FFFF) as usize, a, b))
}

/// Reads a node's zero-terminated name out of the string table.
fn node_name(data: &[u8], at: usize, index: usize) -> Result<&str, ParseError> {
    let tail = data
        .get(at..)
        .ok_or(ParseError::BadNode { index, offset: at, size: 0 })?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(ParseError::BadNode { index, offset: at, size: 0 })?;
    std::str::from_utf8(&tail[..end]).map_err(|_| ParseError::Utf8Error(at))
}

#[inline]
fn align(offset: usize) -> usize {
    (offset + DATA_ALIGN - 1) & !(DATA_ALIGN - 1)
}

/// In-memory tree used while re-serializing.
enum TreeNode {
    Dir { name: String, children: Vec<TreeNode> },
    File { name: String, data: Vec<u8> },
}

struct FlatNode {
    is_dir: bool,
    name: String,
    parent: usize,
    end: usize,
    data: Option<Vec<u8>>,
}

/// Inserts one entry into the tree, creating implied parent directories on the way down.
fn insert(root: &mut Vec<TreeNode>, path: &str, data: Option<&Vec<u8>>) {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let Some(last) = parts.pop() else { return };

    let mut children = root;
    for part in parts {
        let at = match children.iter().position(|n| matches!(n, TreeNode::Dir { name, .. } if name == part)) {
            Some(at) => at,
            None => {
                children.push(TreeNode::Dir { name: part.to_string(), children: Vec::new() });
                children.len() - 1
            }
        };
        children = match &mut children[at] {
            TreeNode::Dir { children, .. } => children,
            // the position above only matches directories
            _ => unreachable!(),
        };
    }

    match data {
        Some(data) => {
            match children.iter_mut().find(|n| matches!(n, TreeNode::File { name, .. } if name == last)) {
                Some(TreeNode::File { data: existing, .. }) => *existing = data.clone(),
                _ => children.push(TreeNode::File { name: last.to_string(), data: data.clone() }),
            }
        }
        None => {
            if !children.iter().any(|n| matches!(n, TreeNode::Dir { name, .. } if name == last)) {
                children.push(TreeNode::Dir { name: last.to_string(), children: Vec::new() });
            }
        }
    }
}

/// Appends the tree below `children` to `flat` in depth-first order, filling in each
/// directory's past-the-subtree index.
fn flatten(children: &[TreeNode], parent: usize, flat: &mut Vec<FlatNode>) {
    for node in children {
        let index = flat.len();
        match node {
            TreeNode::File { name, data } => flat.push(FlatNode {
                is_dir: false,
                name: name.clone(),
                parent,
                end: 0,
                data: Some(data.clone()),
            }),
            TreeNode::Dir { name, children } => {
                flat.push(FlatNode {
                    is_dir: true,
                    name: name.clone(),
                    parent,
                    end: 0,
                    data: None,
                });
                flatten(children, index, flat);
                flat[index].end = flat.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::compress;

    fn sample() -> Archive {
        let mut arc = Archive::default();
        arc.set("course/course1.bin", vec![1, 2, 3, 4]);
        arc.set("course/course1_bgdatL1.bin", vec![9; 40]);
        arc.set("readme.txt", b"hi".to_vec());
        arc
    }

    #[test]
    fn parse_reproduces_the_mapping() {
        let arc = sample();
        let bytes = arc.to_bytes();
        let back = Archive::parse(&bytes).unwrap();

        let paths: Vec<&str> = back.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["course", "course/course1.bin", "course/course1_bgdatL1.bin", "readme.txt"]);
        assert_eq!(back.get("course/course1.bin"), Some(&[1, 2, 3, 4][..]));
        assert_eq!(back.get("readme.txt"), Some(&b"hi"[..]));
        assert_eq!(back.get("course"), None);
        assert_eq!(back.get("missing.bin"), None);
    }

    #[test]
    fn serialize_is_stable() {
        // Our own output round-trips byte-identically
        let bytes = sample().to_bytes();
        let again = Archive::parse(&bytes).unwrap().to_bytes();
        assert_eq!(bytes, again);
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut arc = sample();
        arc.set("course/course1.bin", vec![0xEE; 7]);
        let back = Archive::parse(&arc.to_bytes()).unwrap();
        assert_eq!(back.get("course/course1.bin"), Some(&[0xEE; 7][..]));
        // position unchanged
        assert_eq!(back.entries()[1].path, "course/course1.bin");
    }

    #[test]
    fn load_accepts_a_compressed_archive() {
        let raw = sample().to_bytes();
        let packed = compress(&raw);
        let arc = Archive::load(&packed).unwrap();
        assert_eq!(arc.get("readme.txt"), Some(&b"hi"[..]));
    }

    #[test]
    fn bad_magic_is_an_error() {
        assert!(matches!(
            Archive::parse(&[0u8; 0x40]),
            Err(ParseError::BadMagic(0))
        ));
    }

    #[test]
    fn file_data_is_aligned() {
        let bytes = sample().to_bytes();
        let arc = Archive::parse(&bytes).unwrap();
        // find course1.bin's offset in the node table and check alignment
        let data = arc.get("course/course1.bin").unwrap();
        let at = bytes.windows(data.len()).position(|w| w == data).unwrap();
        assert_eq!(at % DATA_ALIGN, 0);
    }
}
