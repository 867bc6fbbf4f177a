use crate::core::models::structure::Structure;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing structure file formats.
///
/// Implementors handle format-specific parsing and serialization; the path-based
/// methods are provided on top of the reader/writer ones.
pub trait StructureFormat {
    /// The error type for I/O and parse failures.
    type Error: Error + From<io::Error>;

    /// Reads a structure from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error>;

    /// Writes a structure to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Structure, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(structure: &Structure, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(structure, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
