//! Anvil region container: an 8 KiB header of chunk locations and
//! timestamps, then 4 KiB sectors holding length-prefixed, compressed chunk
//! documents.

use crate::tag::Tag;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

pub const REGION_CHUNKS: usize = 1024;
pub const SECTOR_BYTES: usize = 4096;
const HEADER_SECTORS: usize = 2;
/// Largest chunk a location entry can describe
const MAX_CHUNK_SECTORS: usize = 255;

const GZIP: u8 = 1;
const ZLIB: u8 = 2;
const UNCOMPRESSED: u8 = 3;

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Chunk documents of one region file, by slot `x + 32 * z`.
///
/// Chunks are written zlib-compressed in slot order with zero timestamps,
/// so equal regions encode to equal bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AnvilRegion {
    chunks: Vec<Option<Tag>>,
}

impl Default for AnvilRegion {
    fn default() -> Self {
        AnvilRegion::new()
    }
}

impl AnvilRegion {
    pub fn new() -> Self {
        AnvilRegion {
            chunks: vec![None; REGION_CHUNKS],
        }
    }

    pub fn insert(&mut self, index: usize, chunk: Tag) -> io::Result<()> {
        let slot = self
            .chunks
            .get_mut(index)
            .ok_or_else(|| invalid(format!("chunk slot {} lies outside the region", index)))?;
        *slot = Some(chunk);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.chunks.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut locations = [0u32; REGION_CHUNKS];
        let mut body = Vec::new();

        for (index, chunk) in self.chunks.iter().enumerate() {
            let Some(chunk) = chunk else {
                continue;
            };
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            chunk.write(&mut encoder, "")?;
            let payload = encoder.finish()?;

            // length field and compression byte precede the payload
            let sectors = (payload.len() + 5).div_ceil(SECTOR_BYTES);
            if sectors > MAX_CHUNK_SECTORS {
                return Err(invalid(format!(
                    "chunk slot {} needs {} sectors, at most {} fit",
                    index, sectors, MAX_CHUNK_SECTORS
                )));
            }
            let offset = HEADER_SECTORS + body.len() / SECTOR_BYTES;
            locations[index] = ((offset as u32) << 8) | sectors as u32;

            body.write_u32::<BigEndian>(payload.len() as u32 + 1)?;
            body.write_u8(ZLIB)?;
            body.extend_from_slice(&payload);
            body.resize(body.len().div_ceil(SECTOR_BYTES) * SECTOR_BYTES, 0);
        }

        for location in locations {
            writer.write_u32::<BigEndian>(location)?;
        }
        for _ in 0..REGION_CHUNKS {
            writer.write_u32::<BigEndian>(0)?;
        }
        writer.write_all(&body)
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() < HEADER_SECTORS * SECTOR_BYTES {
            return Err(invalid(format!(
                "region header truncated at {} bytes",
                bytes.len()
            )));
        }

        let mut header = Cursor::new(&bytes[..REGION_CHUNKS * 4]);
        let mut region = AnvilRegion::new();
        for index in 0..REGION_CHUNKS {
            let location = header.read_u32::<BigEndian>()?;
            if location == 0 {
                continue;
            }
            let start = (location >> 8) as usize * SECTOR_BYTES;
            let end = (start + (location & 0xFF) as usize * SECTOR_BYTES).min(bytes.len());
            let sectors = bytes.get(start..end).ok_or_else(|| {
                invalid(format!("chunk slot {} points past the end of the file", index))
            })?;
            region.chunks[index] = Some(read_chunk(index, sectors)?);
        }
        Ok(region)
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader)
    }

    /// Writes to a sibling temp file first, then renames over `path`.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            self.write(&mut writer)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)
    }
}

fn read_chunk(index: usize, sectors: &[u8]) -> io::Result<Tag> {
    let mut cursor = Cursor::new(sectors);
    let length = cursor.read_u32::<BigEndian>()? as usize;
    let scheme = cursor.read_u8()?;
    let payload = sectors
        .get(5..4 + length)
        .ok_or_else(|| invalid(format!("chunk slot {} overruns its sectors", index)))?;

    let (_, tag) = match scheme {
        GZIP => Tag::read(&mut GzDecoder::new(payload))?,
        ZLIB => Tag::read(&mut ZlibDecoder::new(payload))?,
        UNCOMPRESSED => {
            let mut raw = payload;
            Tag::read(&mut raw)?
        }
        other => {
            return Err(invalid(format!(
                "chunk slot {} uses unknown compression {}",
                index, other
            )))
        }
    };
    Ok(tag)
}
