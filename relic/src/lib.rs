//! Relic is a library toolchain for reading, validating, and transforming
//! the ELF executable format and its embedded DWARF debugging information.
//! It consists of multiple largely independent crates bundled together
//! behind this facade.
//!
//! # What's in the package
//!
//! Relic provides the following functionality:
//!
//! - An ELF object model for both classes and byte orders, with typed
//!   views over sections, symbols, relocations, notes, versioning, and
//!   hash tables, plus `ar` archives and transparently decompressed
//!   sections and files
//! - Resolution of separate debug files via `.gnu_debuglink`, verified by
//!   CRC32
//! - A DWARF reader covering abbreviations, compilation units (versions 2
//!   through 5, including skeleton/split units), attribute forms, location
//!   expressions, location and range lists, line-number programs, and
//!   call-frame information from `.debug_frame` and `.eh_frame`
//! - A pedantic validator applying the generic-ABI rules to a whole file,
//!   accumulating every violation
//! - A recombiner that merges a stripped ELF and its debug companion back
//!   into one fully populated file
//!
//! # Usage
//!
//! Add `relic` as a dependency to your `Cargo.toml` and pick features:
//!
//! - **`elf`** (default): the object model, archives, decompression, and
//!   `.gnu_debuglink` handling.
//! - **`dwarf`** (default): the DWARF readers.
//! - **`lint`**: the pedantic validator.
//! - **`unstrip`**: the stripped/debug recombiner.

#![warn(missing_docs)]

#[doc(inline)]
pub use relic_common as common;
#[doc(inline)]
#[cfg(feature = "dwarf")]
pub use relic_dwarf as dwarf;
#[doc(inline)]
#[cfg(feature = "elf")]
pub use relic_elf as elf;
#[doc(inline)]
#[cfg(feature = "lint")]
pub use relic_lint as lint;
#[doc(inline)]
#[cfg(feature = "unstrip")]
pub use relic_unstrip as unstrip;
