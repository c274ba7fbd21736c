//! `ar` archive support.
//!
//! Archive members are exposed as borrowed sub-views into the archive's
//! bytes; a member can be handed straight to [`Elf::parse`](crate::Elf::parse).

use std::str;

use fallible_iterator::FallibleIterator;
use relic_common::{cstr_at, Cursor, Endian};

use crate::{ElfError, ElfErrorKind};

const ARMAG: &[u8; 8] = b"!<arch>\n";
const HEADER_SIZE: usize = 60;

/// An `ar` archive over a borrowed byte slice.
pub struct Archive<'data> {
    data: &'data [u8],
    long_names: Option<&'data [u8]>,
}

/// One archive member.
#[derive(Clone, Copy, Debug)]
pub struct Member<'data> {
    /// The member name with the `ar` decorations stripped.
    pub name: &'data [u8],
    /// Offset of the member contents within the archive.
    pub offset: usize,
    /// The member contents.
    pub data: &'data [u8],
}

/// An entry of the archive's symbol index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry<'data> {
    /// The symbol name.
    pub name: &'data [u8],
    /// Offset of the member header defining the symbol.
    pub member_offset: usize,
}

impl<'data> Archive<'data> {
    /// Tests whether the buffer could contain an archive.
    pub fn test(data: &[u8]) -> bool {
        data.get(..ARMAG.len()) == Some(&ARMAG[..])
    }

    /// Parses the archive global header and locates the long-name table.
    pub fn parse(data: &'data [u8]) -> Result<Self, ElfError> {
        if !Self::test(data) {
            return Err(ElfErrorKind::BadMagic.into());
        }
        let mut archive = Archive {
            data,
            long_names: None,
        };

        // The long-name table, when present, precedes all named members.
        let mut iter = RawMemberIter {
            data,
            pos: ARMAG.len(),
        };
        while let Some(member) = iter.next()? {
            if member.raw_name == b"//" {
                archive.long_names = Some(member.data);
                break;
            }
            if member.raw_name != b"/" {
                break;
            }
        }

        Ok(archive)
    }

    /// Iterates the regular members, skipping the index and name tables.
    pub fn members(&self) -> MemberIter<'data> {
        MemberIter {
            inner: RawMemberIter {
                data: self.data,
                pos: ARMAG.len(),
            },
            long_names: self.long_names,
        }
    }

    /// Reads the System V symbol index from the `/` member, if present.
    ///
    /// The index maps symbol names to the file offsets of the members that
    /// define them; both are stored big-endian regardless of the target.
    pub fn symbol_index(&self) -> Result<Vec<IndexEntry<'data>>, ElfError> {
        let mut iter = RawMemberIter {
            data: self.data,
            pos: ARMAG.len(),
        };
        let member = loop {
            match iter.next()? {
                Some(member) if member.raw_name == b"/" => break member,
                Some(_) => continue,
                None => return Ok(Vec::new()),
            }
        };

        let mut cursor = Cursor::new(member.data, Endian::Big);
        let count = cursor.read_u32()? as usize;
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(cursor.read_u32()? as usize);
        }

        let mut entries = Vec::with_capacity(count);
        for member_offset in offsets {
            let name = cursor.read_cstr()?;
            entries.push(IndexEntry {
                name,
                member_offset,
            });
        }
        Ok(entries)
    }
}

struct RawMember<'data> {
    raw_name: &'data [u8],
    data_offset: usize,
    data: &'data [u8],
}

struct RawMemberIter<'data> {
    data: &'data [u8],
    pos: usize,
}

impl<'data> RawMemberIter<'data> {
    fn next(&mut self) -> Result<Option<RawMember<'data>>, ElfError> {
        // Members are aligned to even offsets with a newline pad byte.
        if self.pos % 2 == 1 && self.data.get(self.pos) == Some(&b'\n') {
            self.pos += 1;
        }
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let header = self
            .data
            .get(self.pos..self.pos + HEADER_SIZE)
            .ok_or(ElfErrorKind::Truncated)?;
        if &header[58..60] != b"`\n" {
            return Err(ElfErrorKind::BadEnum {
                field: "ar_fmag",
                value: header[58].into(),
            }
            .into());
        }

        let raw_name = trim_ar_field(&header[..16]);
        let size = parse_ar_decimal(&header[48..58])?;

        let data_offset = self.pos + HEADER_SIZE;
        let data = self
            .data
            .get(data_offset..data_offset + size)
            .ok_or(ElfErrorKind::Truncated)?;
        self.pos = data_offset + size;

        Ok(Some(RawMember {
            raw_name,
            data_offset,
            data,
        }))
    }
}

/// Fallible iterator over the regular members of an [`Archive`].
pub struct MemberIter<'data> {
    inner: RawMemberIter<'data>,
    long_names: Option<&'data [u8]>,
}

impl<'data> FallibleIterator for MemberIter<'data> {
    type Item = Member<'data>;
    type Error = ElfError;

    fn next(&mut self) -> Result<Option<Member<'data>>, ElfError> {
        loop {
            let member = match self.inner.next()? {
                Some(member) => member,
                None => return Ok(None),
            };
            if member.raw_name == b"/" || member.raw_name == b"//" {
                continue;
            }

            let name = if let Some(rest) = member.raw_name.strip_prefix(b"/") {
                // "/nnn" references an offset into the long-name table.
                let offset = parse_ar_decimal(rest)?;
                let table = self.long_names.ok_or(ElfErrorKind::Truncated)?;
                let name = cstr_at(table, offset).ok_or(ElfErrorKind::Truncated)?;
                name.strip_suffix(b"/").unwrap_or(name)
            } else {
                member.raw_name.strip_suffix(b"/").unwrap_or(member.raw_name)
            };

            return Ok(Some(Member {
                name,
                offset: member.data_offset,
                data: member.data,
            }));
        }
    }
}

fn trim_ar_field(field: &[u8]) -> &[u8] {
    let end = field
        .iter()
        .rposition(|&b| b != b' ')
        .map(|p| p + 1)
        .unwrap_or(0);
    &field[..end]
}

fn parse_ar_decimal(field: &[u8]) -> Result<usize, ElfError> {
    let text = str::from_utf8(trim_ar_field(field))
        .map_err(|e| ElfError::new(ElfErrorKind::Truncated, e))?;
    // The long-name table itself may reference offset 0 with an empty field.
    if text.is_empty() {
        return Ok(0);
    }
    text.parse()
        .map_err(|e| ElfError::new(ElfErrorKind::Truncated, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn member(name: &str, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("{name:<16}").as_bytes());
        out.extend_from_slice(b"0           0     0     100644  ");
        out.extend_from_slice(format!("{:<10}", data.len()).as_bytes());
        out.extend_from_slice(b"`\n");
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(b'\n');
        }
        out
    }

    fn archive(members: &[Vec<u8>]) -> Vec<u8> {
        let mut out = ARMAG.to_vec();
        for m in members {
            out.extend_from_slice(m);
        }
        out
    }

    #[test]
    fn test_member_iteration() {
        let data = archive(&[member("a.o/", b"contents a"), member("b.o/", b"bee")]);
        let ar = Archive::parse(&data).unwrap();

        let members: Vec<_> = ar.members().collect::<Vec<_>>().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, b"a.o");
        assert_eq!(members[0].data, b"contents a");
        assert_eq!(members[1].name, b"b.o");
        assert_eq!(members[1].data, b"bee");
    }

    #[test]
    fn test_long_names() {
        let long_table = b"very_long_object_file_name.o/\n";
        let data = archive(&[
            member("//", long_table),
            member("/0", b"payload"),
        ]);
        let ar = Archive::parse(&data).unwrap();

        let members: Vec<_> = ar.members().collect::<Vec<_>>().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(&members[0].name[..], b"very_long_object_file_name.o");
    }

    #[test]
    fn test_symbol_index() {
        // Index member: one symbol "exit" defined by the member at offset 68.
        let mut index = Vec::new();
        index.extend_from_slice(&1u32.to_be_bytes());
        index.extend_from_slice(&68u32.to_be_bytes());
        index.extend_from_slice(b"exit\0");

        let data = archive(&[member("/", &index), member("a.o/", b"text")]);
        let ar = Archive::parse(&data).unwrap();

        let entries = ar.symbol_index().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, b"exit");
        assert_eq!(entries[0].member_offset, 68);
    }

    #[test]
    fn test_not_an_archive() {
        assert!(Archive::parse(b"\x7fELF").is_err());
    }

    #[test]
    fn test_truncated_member() {
        let mut data = archive(&[member("a.o/", b"contents a")]);
        data.truncate(data.len() - 4);
        let ar = Archive::parse(&data).unwrap();
        assert!(ar.members().collect::<Vec<_>>().is_err());
    }
}
