//! Resolution of separate debug-info files via `.gnu_debuglink`.
//!
//! A stripped file can point at its debug companion with a `.gnu_debuglink`
//! section holding the companion's base name and a CRC32 of its contents.
//! [`find_debuginfo`] searches a colon-separated debug path the way the
//! standard `debuginfo-path` convention prescribes and verifies candidates
//! by checksum.

use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use relic_common::Cursor;

use crate::{Elf, ElfError, ElfErrorKind};

/// The search path used when the caller supplies none.
pub const DEFAULT_DEBUG_PATH: &str = ":.debug:/usr/lib/debug";

const CRC_CHUNK: usize = 1 << 20;

/// The decoded contents of a `.gnu_debuglink` section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugLink<'data> {
    /// Base name of the companion debug file.
    pub filename: &'data [u8],
    /// CRC32 of the companion's entire contents.
    pub crc: u32,
}

/// Reads the `.gnu_debuglink` section of an ELF file, if present.
///
/// The section holds a NUL-terminated name, padding to 4-byte alignment,
/// and a 4-byte CRC in the file's data encoding.
pub fn read_debuglink<'data>(elf: &Elf<'data>) -> Result<Option<DebugLink<'data>>, ElfError> {
    let index = match elf.section_by_name(b".gnu_debuglink") {
        Some(index) => index,
        None => return Ok(None),
    };
    let data = elf.raw_section_data(index)?;
    let mut cursor = Cursor::new(data, elf.endian());
    let filename = cursor.read_cstr()?;
    let misalign = cursor.position() % 4;
    if misalign != 0 {
        cursor.skip(4 - misalign)?;
    }
    let crc = cursor.read_u32()?;
    Ok(Some(DebugLink { filename, crc }))
}

/// Computes the IEEE 802.3 CRC32 of a whole file.
///
/// The file is read in bounded chunks so arbitrarily large files never need
/// a single contiguous buffer.
pub fn crc32_file(file: &File) -> Result<u32, ElfError> {
    let mut hasher = crc32fast::Hasher::new();
    let mut reader = file;
    let mut buffer = vec![0u8; CRC_CHUNK];
    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }
    Ok(hasher.finalize())
}

/// Computes the IEEE 802.3 CRC32 of a byte slice.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Locates the separate debug file for `file_name`.
///
/// `link` is the parsed `.gnu_debuglink`; when it is `None` the resolver
/// synthesizes `<basename>.debug` and disables CRC checking. `debug_path`
/// is a colon-separated list of places to look; `None` uses
/// [`DEFAULT_DEBUG_PATH`]. A leading `+` or `-` on the whole path or on a
/// single component overrides whether candidate CRCs are verified.
///
/// Components are tried in order: an empty component means the main file's
/// own directory, an absolute component is searched with the main file's
/// absolute directory appended as a subpath, and a relative component names
/// a subdirectory of the main file's directory.
pub fn find_debuginfo(
    file_name: &Path,
    link: Option<&DebugLink<'_>>,
    debug_path: Option<&str>,
) -> Result<Option<PathBuf>, ElfError> {
    let mut cancheck = true;
    let link_name: PathBuf = match link {
        Some(link) => PathBuf::from(OsStr::from_bytes(link.filename)),
        None => {
            let basename = match file_name.file_name() {
                Some(name) => name,
                None => return Ok(None),
            };
            cancheck = false;
            let mut name = basename.to_os_string();
            name.push(".debug");
            PathBuf::from(name)
        }
    };

    let mut path = debug_path.unwrap_or(DEFAULT_DEBUG_PATH);

    // A leading - or + in the whole path sets whether to check file CRCs.
    let mut defcheck = true;
    if let Some(rest) = path.strip_prefix(['+', '-']) {
        defcheck = path.starts_with('+');
        path = rest;
    }

    let file_dirname = file_name.parent().filter(|p| !p.as_os_str().is_empty());

    for component in path.split(':') {
        // A leading - or + says whether to check file CRCs for this element.
        let mut check = defcheck;
        let mut component = component;
        if let Some(rest) = component.strip_prefix(['+', '-']) {
            check = component.starts_with('+');
            component = rest;
        }
        check = check && cancheck;

        let mut candidate = PathBuf::new();
        if component.is_empty() {
            // An empty entry says to try the main file's directory.
            if let Some(dir) = file_dirname {
                candidate.push(dir);
            }
        } else if component.starts_with('/') {
            // An absolute path says to look there for a subdirectory named
            // by the main file's absolute directory. This cannot be applied
            // to a relative file name.
            let dirname = match file_dirname {
                Some(dir) if dir.is_absolute() => dir,
                _ => continue,
            };
            candidate.push(component);
            candidate.push(dirname.strip_prefix("/").unwrap_or(dirname));
        } else {
            // A relative path says to try a subdirectory of that name in
            // the main file's directory.
            if let Some(dir) = file_dirname {
                candidate.push(dir);
            }
            candidate.push(component);
        }
        candidate.push(&link_name);

        let file = match File::open(&candidate) {
            Ok(file) => file,
            Err(_) => continue,
        };
        if !check {
            return Ok(Some(candidate));
        }
        if let Some(link) = link {
            if crc32_file(&file)? == link.crc {
                return Ok(Some(candidate));
            }
        }
    }

    Ok(None)
}

/// Verifies a resolved debug file against its link record.
pub fn check_crc(path: &Path, link: &DebugLink<'_>) -> Result<(), ElfError> {
    let file = File::open(path)?;
    let got = crc32_file(&file)?;
    if got != link.crc {
        return Err(ElfErrorKind::CrcMismatch {
            expected: link.crc,
            got,
        }
        .into());
    }
    Ok(())
}
