//! A string table builder that reuses existing entries.

use std::collections::HashMap;

/// Builds `.strtab`-style string tables.
///
/// The first byte is always NUL. Adding the same name twice returns the
/// same offset, so rebuilt tables do not grow from repeated section or
/// symbol names.
#[derive(Debug, Default)]
pub struct StringTableBuilder {
    data: Vec<u8>,
    offsets: HashMap<Vec<u8>, u32>,
}

impl StringTableBuilder {
    /// Creates a builder holding only the leading NUL.
    pub fn new() -> Self {
        StringTableBuilder {
            data: vec![0],
            offsets: HashMap::new(),
        }
    }

    /// Interns `name` and returns its offset.
    pub fn add(&mut self, name: &[u8]) -> u32 {
        if name.is_empty() {
            return 0;
        }
        if let Some(&offset) = self.offsets.get(name) {
            return offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(name);
        self.data.push(0);
        self.offsets.insert(name.to_vec(), offset);
        offset
    }

    /// Size of the finished table in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Consumes the builder, returning the table bytes.
    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_intern_reuses_offsets() {
        let mut builder = StringTableBuilder::new();
        let text = builder.add(b".text");
        let data = builder.add(b".data");
        assert_eq!(builder.add(b".text"), text);
        assert_ne!(text, data);

        let table = builder.finish();
        assert_eq!(table[0], 0);
        assert_eq!(&table[text as usize..text as usize + 5], b".text");
        assert_eq!(table.last(), Some(&0));
    }

    #[test]
    fn test_empty_name_is_offset_zero() {
        let mut builder = StringTableBuilder::new();
        assert_eq!(builder.add(b""), 0);
        assert_eq!(builder.size(), 1);
    }
}
