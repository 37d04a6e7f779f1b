//! Best-effort reader/writer for the legacy metadata region of a course blob.
//!
//! Older tool versions stored a key→string mapping (Creator/Title/Author/Group/Webpage/
//! Password) in the gap between the block table header and block 0, serialized with a
//! general object-serialization protocol. This is a minimal structural reimplementation
//! of that protocol, not a faithful one: the reader walks the opcode stream tracking a
//! value stack and a memo table, collects every string pushed, filters out the two
//! wrapper marker strings, and accepts the result only if exactly twelve strings remain
//! and pair up into the expected key set. *Any* deviation — unknown opcode, truncation,
//! wrong key set — falls back to defaults; malformed metadata is never a load error.
//!
//! Writing always uses the canonical form produced by [`encode`].

use std::collections::HashMap;

use log::warn;

/// The two non-data wrapper strings present in every stream; the reader drops them.
const MARKERS: [&str; 2] = ["LevelInfo", "1"];

const KEYS: [&str; 6] = ["Creator", "Title", "Author", "Group", "Webpage", "Password"];

// The opcode subset the structural reader understands.
const PROTO: u8 = 0x80;
const FRAME: u8 = 0x95;
const STOP: u8 = b'.';
const MARK: u8 = b'(';
const EMPTY_DICT: u8 = b'}';
const EMPTY_LIST: u8 = b']';
const EMPTY_TUPLE: u8 = b')';
const NONE: u8 = b'N';
const NEWTRUE: u8 = 0x88;
const NEWFALSE: u8 = 0x89;
const BININT: u8 = b'J';
const BININT1: u8 = b'K';
const BININT2: u8 = b'M';
const BINPUT: u8 = b'q';
const LONG_BINPUT: u8 = b'r';
const BINGET: u8 = b'h';
const LONG_BINGET: u8 = b'j';
const MEMOIZE: u8 = 0x94;
const SHORT_BINSTRING: u8 = b'U';
const BINSTRING: u8 = b'T';
const BINUNICODE: u8 = b'X';
const SHORT_BINUNICODE: u8 = 0x8C;
const SETITEM: u8 = b's';
const SETITEMS: u8 = b'u';
const TUPLE: u8 = b't';
const TUPLE1: u8 = 0x85;
const TUPLE2: u8 = 0x86;
const TUPLE3: u8 = 0x87;

/// The editable level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelMetadata {
    pub creator: String,
    pub title: String,
    pub author: String,
    pub group: String,
    pub webpage: String,
    pub password: String,
}

impl LevelMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn from_pairs(pairs: &HashMap<String, String>) -> Option<Self> {
        if pairs.len() != KEYS.len() || !KEYS.iter().all(|k| pairs.contains_key(*k)) {
            return None;
        }
        Some(Self {
            creator: pairs["Creator"].clone(),
            title: pairs["Title"].clone(),
            author: pairs["Author"].clone(),
            group: pairs["Group"].clone(),
            webpage: pairs["Webpage"].clone(),
            password: pairs["Password"].clone(),
        })
    }

    fn pairs(&self) -> [(&'static str, &str); 6] {
        [
            ("Creator", &self.creator),
            ("Title", &self.title),
            ("Author", &self.author),
            ("Group", &self.group),
            ("Webpage", &self.webpage),
            ("Password", &self.password),
        ]
    }
}

/// Decodes the metadata region. Always succeeds: anything the structural reader cannot
/// make sense of yields defaults.
pub fn decode(data: &[u8]) -> LevelMetadata {
    if data.is_empty() {
        return LevelMetadata::default();
    }
    match walk(data) {
        Some(meta) => meta,
        None => {
            warn!("could not decode the legacy metadata region ({} bytes); using defaults", data.len());
            LevelMetadata::default()
        }
    }
}

/// Encodes metadata in the protocol's canonical form. All-default metadata encodes to an
/// empty region.
pub fn encode(meta: &LevelMetadata) -> Vec<u8> {
    if meta.is_empty() {
        return Vec::new();
    }

    let mut out = vec![PROTO, 2];
    let mut memo = 0u8;

    put_str(&mut out, MARKERS[0], &mut memo);
    put_str(&mut out, MARKERS[1], &mut memo);
    out.push(EMPTY_DICT);
    out.push(BINPUT);
    out.push(memo);
    memo += 1;
    out.push(MARK);
    for (key, value) in meta.pairs() {
        put_str(&mut out, key, &mut memo);
        put_str(&mut out, value, &mut memo);
    }
    out.push(SETITEMS);
    out.push(TUPLE3);
    out.push(BINPUT);
    out.push(memo);
    out.push(STOP);
    out
}

fn put_str(out: &mut Vec<u8>, s: &str, memo: &mut u8) {
    out.push(BINUNICODE);
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    out.push(BINPUT);
    out.push(*memo);
    *memo += 1;
}

#[derive(Clone)]
enum Value {
    Str(String),
    Mark,
    Other,
}

/// Walks the opcode stream. `None` on any structural surprise.
fn walk(data: &[u8]) -> Option<LevelMetadata> {
    let mut ptr = 0;
    let mut stack: Vec<Value> = Vec::new();
    let mut memo: HashMap<u32, Value> = HashMap::new();
    let mut strings: Vec<String> = Vec::new();

    fn take<'a>(data: &'a [u8], ptr: &mut usize, len: usize) -> Option<&'a [u8]> {
        let chunk = data.get(*ptr..*ptr + len)?;
        *ptr += len;
        Some(chunk)
    }

    loop {
        let op = *take(data, &mut ptr, 1)?.first()?;
        match op {
            PROTO => {
                take(data, &mut ptr, 1)?;
            }
            FRAME => {
                take(data, &mut ptr, 8)?;
            }
            MARK => stack.push(Value::Mark),
            EMPTY_DICT | EMPTY_LIST | EMPTY_TUPLE | NONE | NEWTRUE | NEWFALSE => {
                stack.push(Value::Other)
            }
            BININT => {
                take(data, &mut ptr, 4)?;
                stack.push(Value::Other);
            }
            BININT1 => {
                take(data, &mut ptr, 1)?;
                stack.push(Value::Other);
            }
            BININT2 => {
                take(data, &mut ptr, 2)?;
                stack.push(Value::Other);
            }
            SHORT_BINSTRING | SHORT_BINUNICODE => {
                let len = take(data, &mut ptr, 1)?[0] as usize;
                let str = std::str::from_utf8(take(data, &mut ptr, len)?).ok()?.to_string();
                strings.push(str.clone());
                stack.push(Value::Str(str));
            }
            BINSTRING | BINUNICODE => {
                let len = u32::from_le_bytes(take(data, &mut ptr, 4)?.try_into().ok()?) as usize;
                let str = std::str::from_utf8(take(data, &mut ptr, len)?).ok()?.to_string();
                strings.push(str.clone());
                stack.push(Value::Str(str));
            }
            BINPUT => {
                let slot = take(data, &mut ptr, 1)?[0] as u32;
                memo.insert(slot, stack.last()?.clone());
            }
            LONG_BINPUT => {
                let slot = u32::from_le_bytes(take(data, &mut ptr, 4)?.try_into().ok()?);
                memo.insert(slot, stack.last()?.clone());
            }
            MEMOIZE => {
                memo.insert(memo.len() as u32, stack.last()?.clone());
            }
            BINGET => {
                let slot = take(data, &mut ptr, 1)?[0] as u32;
                stack.push(memo.get(&slot)?.clone());
            }
            LONG_BINGET => {
                let slot = u32::from_le_bytes(take(data, &mut ptr, 4)?.try_into().ok()?);
                stack.push(memo.get(&slot)?.clone());
            }
            SETITEM => {
                stack.pop()?;
                stack.pop()?;
            }
            SETITEMS | TUPLE => {
                // pop back to (and including) the matching mark
                loop {
                    match stack.pop()? {
                        Value::Mark => break,
                        _ => continue,
                    }
                }
                if op == TUPLE {
                    stack.push(Value::Other);
                }
            }
            TUPLE1 => {
                stack.pop()?;
                stack.push(Value::Other);
            }
            TUPLE2 => {
                stack.pop()?;
                stack.pop()?;
                stack.push(Value::Other);
            }
            TUPLE3 => {
                stack.pop()?;
                stack.pop()?;
                stack.pop()?;
                stack.push(Value::Other);
            }
            STOP => break,
            _ => return None,
        }
    }

    strings.retain(|s| !MARKERS.contains(&s.as_str()));
    if strings.len() != 12 {
        return None;
    }
    let pairs: HashMap<String, String> = strings
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    LevelMetadata::from_pairs(&pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LevelMetadata {
        LevelMetadata {
            creator: "0.8".to_string(),
            title: "1-1 remix".to_string(),
            author: "somebody".to_string(),
            group: "testers".to_string(),
            webpage: "https://example.invalid".to_string(),
            password: String::new(),
        }
    }

    #[test]
    fn round_trip() {
        let meta = sample();
        assert_eq!(decode(&encode(&meta)), meta);
    }

    #[test]
    fn default_metadata_encodes_to_nothing() {
        assert!(encode(&LevelMetadata::default()).is_empty());
        assert_eq!(decode(&[]), LevelMetadata::default());
    }

    #[test]
    fn missing_key_falls_back_to_defaults() {
        let mut bytes = encode(&sample());
        // corrupt the "Title" key so the expected key set no longer matches
        let at = bytes.windows(5).position(|w| w == b"Title").unwrap();
        bytes[at] = b'X';
        assert_eq!(decode(&bytes), LevelMetadata::default());
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        assert_eq!(decode(&[0xDE, 0xAD, 0xBE, 0xEF]), LevelMetadata::default());
        assert_eq!(decode(b"not an opcode stream at all"), LevelMetadata::default());
    }

    #[test]
    fn truncated_stream_falls_back_to_defaults() {
        let bytes = encode(&sample());
        assert_eq!(decode(&bytes[..bytes.len() / 2]), LevelMetadata::default());
    }

    #[test]
    fn markers_are_filtered_not_required() {
        // a stream with the dict only (no wrapper tuple) still decodes
        let meta = sample();
        let mut out = vec![PROTO, 2, EMPTY_DICT, MARK];
        for (key, value) in meta.pairs() {
            for s in [key, value] {
                out.push(BINUNICODE);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
        out.push(SETITEMS);
        out.push(STOP);
        assert_eq!(decode(&out), meta);
    }
}
