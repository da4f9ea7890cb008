//! Low-level ZIP container parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all entries
//! 4. For entry reads, hop through the Local File Header to the data
//!
//! The central directory is read once; per-entry data is only touched
//! when an entry is actually opened.

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use std::io::{Cursor, Read};
use std::sync::Arc;

use flate2::read::DeflateDecoder;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP container parser.
///
/// Generic over the reader type so the same code serves local files and
/// any other random-access source.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the container in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// # Errors
    ///
    /// Fails with a container error if no valid EOCD can be found,
    /// indicating the file is not a valid ZIP archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Optimization: first try the simple case where there's no
        // comment, avoiding the backwards search entirely.
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_at(offset, &mut buf).await?;

            // Check for signature and zero-length comment
            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        // EOCD not at the expected location - there may be a trailing
        // ZIP comment, so search backwards from the end of the file.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_at(search_start, &mut buf).await?;

        // Search backwards for EOCD signature (PK\x05\x06)
        for i in (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // Found a potential EOCD - verify the comment length
                // field matches the remaining bytes.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd =
                        EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(Error::container("not a valid ZIP container"))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD indicates ZIP64 extensions are
    /// needed (fields set to 0xFFFF or 0xFFFFFFFF).
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| Error::container("missing ZIP64 locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        // Read the actual ZIP64 EOCD from the offset specified in the locator
        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Enumerate all file entries of the container in central-directory
    /// order.
    ///
    /// Directory rows (names ending in `/`) are skipped; they carry no
    /// data and never appear in listings.
    pub async fn entries(&self) -> Result<Vec<ZipEntry>> {
        // Find and parse the EOCD to get the Central Directory location
        let (eocd, eocd_offset) = self.find_eocd().await?;

        // Get Central Directory info, using ZIP64 if needed
        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset + cd_size > self.size {
            return Err(Error::container("truncated central directory"));
        }

        // Read the entire Central Directory in one request
        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(&cd_data);

        for _ in 0..total_entries {
            if let Some(entry) = self.parse_cdfh(&mut cursor)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Parse one Central Directory File Header from the cursor.
    ///
    /// Returns `None` for directory rows. Handles the ZIP64 extended
    /// information extra field (0x0001) for large entries.
    fn parse_cdfh(&self, cursor: &mut Cursor<&Vec<u8>>) -> Result<Option<ZipEntry>> {
        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor
            .read_exact(&mut sig)
            .map_err(|_| Error::container("truncated central directory"))?;
        if sig != CDFH_SIGNATURE {
            return Err(Error::container("invalid central directory file header"));
        }

        // Read fixed-size header fields
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        // Read the variable-length file name. Lossy conversion keeps
        // non-UTF8 names visible rather than failing the whole listing.
        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor
            .read_exact(&mut file_name_bytes)
            .map_err(|_| Error::container("truncated central directory"))?;
        let name = String::from_utf8_lossy(&file_name_bytes).to_string();

        let is_directory = name.ends_with('/');

        // Parse the extra field for ZIP64 extended information (0x0001).
        // Fields are present only when the header field is saturated.
        let extra_field_end = cursor.position() + extra_field_length as u64;

        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()?;

            if header_id == 0x0001 {
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
                // Skip any remaining ZIP64 fields (disk number start)
                let remaining = extra_field_end.saturating_sub(cursor.position());
                cursor.set_position(cursor.position() + remaining);
            } else {
                // Skip unknown extra fields
                cursor.set_position(cursor.position() + field_size as u64);
            }
        }

        // Ensure cursor is positioned after extra field, then skip the
        // file comment.
        cursor.set_position(extra_field_end);
        cursor.set_position(cursor.position() + file_comment_length as u64);

        if is_directory {
            return Ok(None);
        }

        Ok(Some(ZipEntry {
            name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
        }))
    }

    /// Get the actual data offset for an entry.
    ///
    /// The Local File Header has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry,
    /// so the LFH must be read to find where the data begins.
    pub async fn data_offset(&self, entry: &ZipEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader.read_at(entry.lfh_offset, &mut lfh_buf).await?;

        // Verify LFH signature (PK\x03\x04)
        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(Error::container("invalid local file header"));
        }

        // Read the variable field lengths from fixed positions in the LFH
        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26);

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    /// Read an entry's uncompressed bytes in full.
    ///
    /// Handles the `stored` and `deflate` compression methods; anything
    /// else is a container error. The WACZ payloads this crate deals in
    /// are bounded by their entry size, so entry reads materialize.
    pub async fn read_entry(&self, entry: &ZipEntry) -> Result<Bytes> {
        let data_offset = self.data_offset(entry).await?;

        match entry.compression_method {
            CompressionMethod::Stored => {
                let mut buf = vec![0u8; entry.uncompressed_size as usize];
                self.reader.read_at(data_offset, &mut buf).await?;
                Ok(Bytes::from(buf))
            }
            CompressionMethod::Deflate => {
                let mut compressed = vec![0u8; entry.compressed_size as usize];
                self.reader.read_at(data_offset, &mut compressed).await?;

                // ZIP uses raw DEFLATE, not zlib or gzip wrapped
                let mut decoder = DeflateDecoder::new(&compressed[..]);
                let mut decompressed = Vec::with_capacity(entry.uncompressed_size as usize);
                decoder.read_to_end(&mut decompressed).map_err(|e| {
                    Error::container(format!("inflate failed for '{}': {}", entry.name, e))
                })?;

                Ok(Bytes::from(decompressed))
            }
            CompressionMethod::Unknown(method) => Err(Error::container(format!(
                "unsupported compression method {} for '{}'",
                method, entry.name
            ))),
        }
    }
}
