//! Reader for the resource chunk container used by compiled Android XML.
//!
//! Every record starts with a little-endian `(type: u16, header_size: u16, size: u32)`
//! header. A binary XML document is a single `RES_XML_TYPE` chunk whose body holds a
//! string pool, an optional resource id map and the namespace/element node chunks.
//! The records produced here keep string references as raw pool indices; resolving
//! them is left to the consumer, which tracks the current pool as it walks the
//! chunks in file order.

use crate::android::error::{AxmlError, AxmlResult};
use crate::android::value::{TypedValue, ValueType};
use bitflags::bitflags;
use log::debug;
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use std::collections::HashMap;

pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

/// String index meaning "no string".
pub const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;

const CHUNK_HEADER_SIZE: usize = 8;
const NODE_HEADER_SIZE: usize = 16;
const STRING_POOL_HEADER_SIZE: usize = 28;
const ATTRIBUTE_SIZE: usize = 20;
/// XML roots nested deeper than this are rejected.
const MAX_XML_NESTING: usize = 32;

bitflags! {
    /// Flags stored in a string pool header.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct StringPoolFlags: u32 {
        const SORTED = 0x0000_0001;
        const UTF8 = 0x0000_0100;
    }
}

/// Index-addressed table of strings referenced by the other chunks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringPool {
    flags: StringPoolFlags,
    strings: Vec<String>,
}

impl StringPool {
    pub fn from_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StringPool {
            flags: StringPoolFlags::empty(),
            strings: strings.into_iter().map(Into::into).collect(),
        }
    }

    pub fn flags(&self) -> StringPoolFlags {
        self.flags
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Looks up a string; out-of-range indices and [`NO_ENTRY_INDEX`] yield `None`.
    pub fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringPoolChunk {
    pub offset: usize,
    pub pool: StringPool,
}

/// Resource ids of the attribute names, indexed like the string pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceMapChunk {
    pub offset: usize,
    pub ids: Vec<u32>,
}

/// Start or end of a namespace scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceChunk {
    pub offset: usize,
    pub line_number: u32,
    pub prefix: Option<u32>,
    pub uri: Option<u32>,
}

/// One attribute of a start element, as stored in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace: Option<u32>,
    pub name: u32,
    pub raw_value: Option<u32>,
    pub typed_value: TypedValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartElementChunk {
    pub offset: usize,
    pub line_number: u32,
    pub namespace: Option<u32>,
    pub name: u32,
    pub attributes: Vec<XmlAttribute>,
    pub id_index: u16,
    pub class_index: u16,
    pub style_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndElementChunk {
    pub offset: usize,
    pub line_number: u32,
    pub namespace: Option<u32>,
    pub name: u32,
}

/// Character data between tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CdataChunk {
    pub offset: usize,
    pub line_number: u32,
    pub data: Option<u32>,
    pub typed_value: TypedValue,
}

/// A `RES_XML_TYPE` document; children are keyed by their byte offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlChunk {
    pub offset: usize,
    pub chunks: HashMap<usize, Chunk>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    StringPool(StringPoolChunk),
    ResourceMap(ResourceMapChunk),
    NamespaceStart(NamespaceChunk),
    NamespaceEnd(NamespaceChunk),
    StartElement(StartElementChunk),
    EndElement(EndElementChunk),
    Cdata(CdataChunk),
    Xml(XmlChunk),
    /// Any chunk type this reader does not interpret.
    Unknown { offset: usize, chunk_type: u16 },
}

impl Chunk {
    pub fn offset(&self) -> usize {
        match self {
            Chunk::StringPool(chunk) => chunk.offset,
            Chunk::ResourceMap(chunk) => chunk.offset,
            Chunk::NamespaceStart(chunk) | Chunk::NamespaceEnd(chunk) => chunk.offset,
            Chunk::StartElement(chunk) => chunk.offset,
            Chunk::EndElement(chunk) => chunk.offset,
            Chunk::Cdata(chunk) => chunk.offset,
            Chunk::Xml(chunk) => chunk.offset,
            Chunk::Unknown { offset, .. } => *offset,
        }
    }
}

struct ChunkHeader {
    chunk_type: u16,
    header_size: u16,
    chunk_size: u32,
    start: usize,
}

impl ChunkHeader {
    fn end(&self) -> usize {
        self.start + self.chunk_size as usize
    }

    fn body_start(&self) -> usize {
        self.start + self.header_size as usize
    }
}

/// Parses the top-level chunks of a resource file.
pub fn parse_chunks(data: &[u8]) -> AxmlResult<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let header = read_chunk_header(data, offset)?;
        offset = header.end();
        chunks.push(parse_chunk(data, &header, 0)?);
    }
    Ok(chunks)
}

/// Runs `parser` on `data[offset..]`, mapping any failure to a truncation error.
fn parse_at<'a, O, P>(data: &'a [u8], offset: usize, mut parser: P) -> AxmlResult<O>
where
    P: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let input = data.get(offset..).ok_or(AxmlError::Truncated(offset))?;
    parser(input)
        .map(|(_, out)| out)
        .map_err(|_| AxmlError::Truncated(offset))
}

fn header_fields(input: &[u8]) -> IResult<&[u8], (u16, u16, u32)> {
    tuple((le_u16, le_u16, le_u32))(input)
}

fn res_value(input: &[u8]) -> IResult<&[u8], TypedValue> {
    let (input, (_size, _res0, data_type, data)) = tuple((le_u16, le_u8, le_u8, le_u32))(input)?;
    Ok((input, TypedValue::new(ValueType::from(data_type), data)))
}

fn attribute(input: &[u8]) -> IResult<&[u8], XmlAttribute> {
    let (input, (namespace, name, raw_value, typed_value)) =
        tuple((le_u32, le_u32, le_u32, res_value))(input)?;
    Ok((
        input,
        XmlAttribute {
            namespace: entry(namespace),
            name,
            raw_value: entry(raw_value),
            typed_value,
        },
    ))
}

fn entry(index: u32) -> Option<u32> {
    (index != NO_ENTRY_INDEX).then_some(index)
}

fn read_chunk_header(data: &[u8], start: usize) -> AxmlResult<ChunkHeader> {
    let (chunk_type, header_size, chunk_size) = parse_at(data, start, header_fields)?;
    if (header_size as usize) < CHUNK_HEADER_SIZE || chunk_size < header_size as u32 {
        return Err(AxmlError::malformed(
            start,
            format!("invalid chunk sizing (header {header_size}, size {chunk_size})"),
        ));
    }
    let end = start
        .checked_add(chunk_size as usize)
        .ok_or_else(|| AxmlError::malformed(start, "chunk size overflow"))?;
    if end > data.len() {
        return Err(AxmlError::malformed(
            start,
            "chunk extends past end of document",
        ));
    }
    Ok(ChunkHeader {
        chunk_type,
        header_size,
        chunk_size,
        start,
    })
}

fn parse_chunk(data: &[u8], header: &ChunkHeader, depth: usize) -> AxmlResult<Chunk> {
    // Reads for this chunk must stay inside it.
    let body = &data[..header.end()];
    let offset = header.start;
    let chunk = match header.chunk_type {
        RES_XML_TYPE => {
            if depth >= MAX_XML_NESTING {
                return Err(AxmlError::malformed(
                    offset,
                    format!("XML chunks nested deeper than {MAX_XML_NESTING} levels"),
                ));
            }
            Chunk::Xml(XmlChunk {
                offset,
                chunks: parse_children(data, header, depth + 1)?,
            })
        }
        RES_STRING_POOL_TYPE => Chunk::StringPool(StringPoolChunk {
            offset,
            pool: parse_string_pool(body, header)?,
        }),
        RES_XML_RESOURCE_MAP_TYPE => {
            let id_count = (header.end() - header.body_start()) / 4;
            let ids = parse_at(body, header.body_start(), count(le_u32, id_count))?;
            Chunk::ResourceMap(ResourceMapChunk { offset, ids })
        }
        RES_XML_START_NAMESPACE_TYPE | RES_XML_END_NAMESPACE_TYPE => {
            let line_number = node_line_number(body, header)?;
            let (prefix, uri) = parse_at(body, header.body_start(), tuple((le_u32, le_u32)))?;
            let namespace = NamespaceChunk {
                offset,
                line_number,
                prefix: entry(prefix),
                uri: entry(uri),
            };
            if header.chunk_type == RES_XML_START_NAMESPACE_TYPE {
                Chunk::NamespaceStart(namespace)
            } else {
                Chunk::NamespaceEnd(namespace)
            }
        }
        RES_XML_START_ELEMENT_TYPE => Chunk::StartElement(parse_start_element(body, header)?),
        RES_XML_END_ELEMENT_TYPE => {
            let line_number = node_line_number(body, header)?;
            let (namespace, name) = parse_at(body, header.body_start(), tuple((le_u32, le_u32)))?;
            Chunk::EndElement(EndElementChunk {
                offset,
                line_number,
                namespace: entry(namespace),
                name,
            })
        }
        RES_XML_CDATA_TYPE => {
            let line_number = node_line_number(body, header)?;
            let (data_idx, typed_value) =
                parse_at(body, header.body_start(), tuple((le_u32, res_value)))?;
            Chunk::Cdata(CdataChunk {
                offset,
                line_number,
                data: entry(data_idx),
                typed_value,
            })
        }
        chunk_type => {
            debug!("Chunk type {chunk_type:#06x} at offset {offset:#x} is not interpreted");
            Chunk::Unknown { offset, chunk_type }
        }
    };
    Ok(chunk)
}

fn parse_children(
    data: &[u8],
    header: &ChunkHeader,
    depth: usize,
) -> AxmlResult<HashMap<usize, Chunk>> {
    let mut children = HashMap::new();
    let end = header.end();
    let mut offset = header.body_start();
    while offset < end {
        let child = read_chunk_header(&data[..end], offset)?;
        offset = child.end();
        children.insert(child.start, parse_chunk(data, &child, depth)?);
    }
    Ok(children)
}

/// Validates the node header and returns its line number; the comment index is ignored.
fn node_line_number(body: &[u8], header: &ChunkHeader) -> AxmlResult<u32> {
    if (header.header_size as usize) < NODE_HEADER_SIZE {
        return Err(AxmlError::malformed(
            header.start,
            format!("XML node header too small ({})", header.header_size),
        ));
    }
    let (line_number, _comment) = parse_at(
        body,
        header.start + CHUNK_HEADER_SIZE,
        tuple((le_u32, le_u32)),
    )?;
    Ok(line_number)
}

fn parse_start_element(body: &[u8], header: &ChunkHeader) -> AxmlResult<StartElementChunk> {
    let line_number = node_line_number(body, header)?;
    let ext = header.body_start();
    let (namespace, name, attribute_start, attribute_size, attribute_count) = parse_at(
        body,
        ext,
        tuple((le_u32, le_u32, le_u16, le_u16, le_u16)),
    )?;
    let (id_index, class_index, style_index) =
        parse_at(body, ext + 14, tuple((le_u16, le_u16, le_u16)))?;

    let stride = attribute_size as usize;
    if attribute_count > 0 && stride < ATTRIBUTE_SIZE {
        return Err(AxmlError::malformed(
            header.start,
            format!("attribute size {stride} is smaller than {ATTRIBUTE_SIZE}"),
        ));
    }
    let mut attributes = Vec::with_capacity(attribute_count as usize);
    for idx in 0..attribute_count as usize {
        let attr_offset = ext + attribute_start as usize + idx * stride;
        attributes.push(parse_at(body, attr_offset, attribute)?);
    }

    Ok(StartElementChunk {
        offset: header.start,
        line_number,
        namespace: entry(namespace),
        name,
        attributes,
        id_index,
        class_index,
        style_index,
    })
}

fn parse_string_pool(body: &[u8], header: &ChunkHeader) -> AxmlResult<StringPool> {
    if (header.header_size as usize) < STRING_POOL_HEADER_SIZE {
        return Err(AxmlError::malformed(
            header.start,
            format!("string pool header too small ({})", header.header_size),
        ));
    }
    let (string_count, _style_count, flags, strings_start, _styles_start) = parse_at(
        body,
        header.start + CHUNK_HEADER_SIZE,
        tuple((le_u32, le_u32, le_u32, le_u32, le_u32)),
    )?;
    let flags = StringPoolFlags::from_bits_retain(flags);

    let string_count = string_count as usize;
    let table_end = string_count
        .checked_mul(4)
        .and_then(|len| len.checked_add(header.body_start()));
    if table_end.map_or(true, |end| end > header.end()) {
        return Err(AxmlError::malformed(
            header.start,
            format!("string offset table for {string_count} strings exceeds chunk"),
        ));
    }
    let offsets = parse_at(body, header.body_start(), count(le_u32, string_count))?;

    let strings_base = header.start + strings_start as usize;
    let mut strings = Vec::with_capacity(string_count);
    for (index, offset) in offsets.into_iter().enumerate() {
        let absolute = strings_base + offset as usize;
        let text = if flags.contains(StringPoolFlags::UTF8) {
            read_utf8_string(body, absolute, index)?
        } else {
            read_utf16_string(body, absolute, index)?
        };
        strings.push(text);
    }

    Ok(StringPool { flags, strings })
}

fn read_utf8_string(body: &[u8], offset: usize, index: usize) -> AxmlResult<String> {
    // The character count comes first; only the byte length is needed to slice.
    let (_char_len, len_bytes) = read_utf8_length(body, offset)?;
    let cursor = offset + len_bytes;
    let (byte_len, len_bytes) = read_utf8_length(body, cursor)?;
    let cursor = cursor + len_bytes;
    let bytes = body
        .get(cursor..cursor + byte_len)
        .ok_or(AxmlError::Truncated(cursor))?;
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => cesu8::from_java_cesu8(bytes)
            .map(|text| text.into_owned())
            .map_err(|_| AxmlError::InvalidString { index }),
    }
}

fn read_utf16_string(body: &[u8], offset: usize, index: usize) -> AxmlResult<String> {
    let (char_count, header_bytes) = read_utf16_length(body, offset)?;
    let cursor = offset + header_bytes;
    let units = parse_at(body, cursor, count(le_u16, char_count))?;
    String::from_utf16(&units).map_err(|_| AxmlError::InvalidString { index })
}

fn read_utf8_length(body: &[u8], offset: usize) -> AxmlResult<(usize, usize)> {
    let first = parse_at(body, offset, le_u8)?;
    if (first & 0x80) == 0 {
        Ok((first as usize, 1))
    } else {
        let second = parse_at(body, offset + 1, le_u8)?;
        let length = (((first & 0x7F) as usize) << 8) | second as usize;
        Ok((length, 2))
    }
}

fn read_utf16_length(body: &[u8], offset: usize) -> AxmlResult<(usize, usize)> {
    let first = parse_at(body, offset, le_u16)?;
    if (first & 0x8000) == 0 {
        Ok((first as usize, 2))
    } else {
        let second = parse_at(body, offset + 2, le_u16)?;
        let length = (((first & 0x7FFF) as usize) << 16) | second as usize;
        Ok((length, 4))
    }
}
