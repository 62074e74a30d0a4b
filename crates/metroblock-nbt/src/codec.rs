use crate::tag::{Compound, Tag};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Nesting limit for lists and compounds when decoding
const MAX_DEPTH: usize = 512;

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn read_len<R: Read>(reader: &mut R) -> io::Result<usize> {
    let length = reader.read_i32::<BigEndian>()?;
    usize::try_from(length).map_err(|_| invalid(format!("Negative array length: {}", length)))
}

fn read_str<R: Read>(reader: &mut R) -> io::Result<String> {
    let length = reader.read_u16::<BigEndian>()?;
    let mut bytes = vec![0u8; length as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))
}

fn write_str<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let length = u16::try_from(value.len())
        .map_err(|_| invalid(format!("String of {} bytes is too long", value.len())))?;
    writer.write_u16::<BigEndian>(length)?;
    writer.write_all(value.as_bytes())
}

fn write_len<W: Write>(writer: &mut W, length: usize) -> io::Result<()> {
    let length =
        i32::try_from(length).map_err(|_| invalid(format!("Array of {} is too long", length)))?;
    writer.write_i32::<BigEndian>(length)
}

impl Tag {
    /// Reads one named tag. A bare end tag yields an empty name.
    pub fn read<R: Read>(reader: &mut R) -> io::Result<(String, Tag)> {
        Tag::read_named(reader, 0)
    }

    fn read_named<R: Read>(reader: &mut R, depth: usize) -> io::Result<(String, Tag)> {
        let type_id = reader.read_u8()?;
        if type_id == 0 {
            return Ok((String::new(), Tag::End));
        }
        let name = read_str(reader)?;
        let tag = Tag::read_payload(reader, type_id, depth)?;
        Ok((name, tag))
    }

    fn read_payload<R: Read>(reader: &mut R, type_id: u8, depth: usize) -> io::Result<Tag> {
        if depth > MAX_DEPTH {
            return Err(invalid(format!("Nesting deeper than {}", MAX_DEPTH)));
        }
        Ok(match type_id {
            0 => Tag::End,
            1 => Tag::Byte(reader.read_i8()?),
            2 => Tag::Short(reader.read_i16::<BigEndian>()?),
            3 => Tag::Int(reader.read_i32::<BigEndian>()?),
            4 => Tag::Long(reader.read_i64::<BigEndian>()?),
            5 => Tag::Float(reader.read_f32::<BigEndian>()?),
            6 => Tag::Double(reader.read_f64::<BigEndian>()?),
            7 => {
                let mut bytes = vec![0i8; read_len(reader)?];
                reader.read_i8_into(&mut bytes)?;
                Tag::ByteArray(bytes)
            }
            8 => Tag::String(read_str(reader)?),
            9 => {
                let element_type = reader.read_u8()?;
                let length = read_len(reader)?;
                if element_type == 0 && length > 0 {
                    return Err(invalid("Non-empty list of end tags".to_owned()));
                }
                let mut list = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    list.push(Tag::read_payload(reader, element_type, depth + 1)?);
                }
                Tag::List(list)
            }
            10 => {
                let mut compound = Compound::new();
                loop {
                    let (name, tag) = Tag::read_named(reader, depth + 1)?;
                    if let Tag::End = tag {
                        break;
                    }
                    compound.insert(name, tag);
                }
                Tag::Compound(compound)
            }
            11 => {
                let mut ints = vec![0i32; read_len(reader)?];
                reader.read_i32_into::<BigEndian>(&mut ints)?;
                Tag::IntArray(ints)
            }
            12 => {
                let mut longs = vec![0i64; read_len(reader)?];
                reader.read_i64_into::<BigEndian>(&mut longs)?;
                Tag::LongArray(longs)
            }
            _ => return Err(invalid(format!("Invalid tag type: {}", type_id))),
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W, name: &str) -> io::Result<()> {
        writer.write_u8(self.type_id())?;
        if !matches!(self, Tag::End) {
            write_str(writer, name)?;
        }
        self.write_payload(writer)
    }

    fn write_payload<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Tag::End => Ok(()),
            Tag::Byte(v) => writer.write_i8(*v),
            Tag::Short(v) => writer.write_i16::<BigEndian>(*v),
            Tag::Int(v) => writer.write_i32::<BigEndian>(*v),
            Tag::Long(v) => writer.write_i64::<BigEndian>(*v),
            Tag::Float(v) => writer.write_f32::<BigEndian>(*v),
            Tag::Double(v) => writer.write_f64::<BigEndian>(*v),
            Tag::ByteArray(v) => {
                write_len(writer, v.len())?;
                v.iter().try_for_each(|b| writer.write_i8(*b))
            }
            Tag::String(v) => write_str(writer, v),
            Tag::List(v) => {
                let element_type = v.first().map(Tag::type_id).unwrap_or(0);
                if v.iter().any(|tag| tag.type_id() != element_type) {
                    return Err(invalid("List elements must share one tag type".to_owned()));
                }
                writer.write_u8(element_type)?;
                write_len(writer, v.len())?;
                v.iter().try_for_each(|tag| tag.write_payload(writer))
            }
            Tag::Compound(v) => {
                for (name, tag) in v {
                    tag.write(writer, name)?;
                }
                writer.write_u8(0)
            }
            Tag::IntArray(v) => {
                write_len(writer, v.len())?;
                v.iter()
                    .try_for_each(|i| writer.write_i32::<BigEndian>(*i))
            }
            Tag::LongArray(v) => {
                write_len(writer, v.len())?;
                v.iter()
                    .try_for_each(|l| writer.write_i64::<BigEndian>(*l))
            }
        }
    }

    /// Encodes the tag under `name` into a fresh buffer.
    pub fn to_bytes(&self, name: &str) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, name)?;
        Ok(buffer)
    }
}
