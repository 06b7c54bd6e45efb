//! Assembling a sigrok srzip session file.
//!
//! An srzip session is a ZIP archive with three entries: `version` (the
//! literal `2`), `metadata` (an INI-style manifest describing the device
//! and capture), and `logic-1-1` (the packed sample data). Session
//! assembly only produces named blobs and hands them to a [`SessionSink`];
//! [`ZipSink`] is the real sink that puts them in a ZIP, stamping every
//! entry with the source capture's mtime both as the DOS timestamp and as
//! a `UT` extended-timestamp extra field.

use std::io::{Seek, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::debug;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::waveforms::{Capture, UNIT_SIZE};

/// WaveForms exports don't say how many DIO lines were exported, but the
/// raw data is 16-bit, so declare all of them
pub const PROBE_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Store,
    Deflate,
}

/// Where session entries end up. Entries arrive in archive order.
pub trait SessionSink {
    type Error;

    fn write_entry(
        &mut self,
        name: &str,
        data: &[u8],
        compression: Compression,
    ) -> Result<(), Self::Error>;
}

/// The `metadata` manifest, in the exact shape libsigrok expects:
/// samplerate rendered in whole MHz, probes named after the DIO lines,
/// probe numbers 1-based but DIO numbers 0-based.
pub fn metadata_manifest(sample_rate_hz: u64, probe_count: usize, unit_size: usize) -> String {
    let mut text = String::new();

    text.push_str("[global]\n");
    text.push_str("sigrok version=0.5.0\n");
    text.push('\n');
    text.push_str("[device 1]\n");
    text.push_str("capturefile=logic-1\n");
    text.push_str(&format!("total probes={}\n", probe_count));
    text.push_str(&format!("samplerate={} MHz\n", sample_rate_hz / 1_000_000));
    text.push_str("total analog=0\n");
    for probe in 0..probe_count {
        text.push_str(&format!("probe{}=DIO {}\n", probe + 1, probe));
    }
    text.push_str(&format!("unitsize={}\n", unit_size));

    text
}

/// Writes the three session entries for a capture, in order. `version` is
/// stored, the other two deflate.
pub fn write_session<S: SessionSink>(sink: &mut S, capture: &Capture) -> Result<(), S::Error> {
    sink.write_entry("version", b"2", Compression::Store)?;

    let manifest = metadata_manifest(capture.sample_rate, PROBE_COUNT, UNIT_SIZE);
    sink.write_entry("metadata", manifest.as_bytes(), Compression::Deflate)?;

    sink.write_entry("logic-1-1", &capture.logic_bytes(), Compression::Deflate)?;

    Ok(())
}

#[derive(Debug, Error)]
pub enum SrzipError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("source mtime is before the unix epoch")]
    MtimeRange,
}

/// [`SessionSink`] writing a real srzip archive.
pub struct ZipSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    /// entry timestamp, truncated to the 2-second DOS resolution
    dos_mtime: zip::DateTime,
    /// full-precision unix mtime for the `UT` extra field
    unix_mtime: u32,
}

impl<W: Write + Seek> ZipSink<W> {
    /// `mtime` is the source capture file's modification time; sigrok
    /// shows it as the capture date.
    pub fn new(inner: W, mtime: SystemTime) -> Result<Self, SrzipError> {
        let unix_mtime = mtime
            .duration_since(UNIX_EPOCH)
            .map_err(|_| SrzipError::MtimeRange)?
            .as_secs()
            .try_into()
            .map_err(|_| SrzipError::MtimeRange)?;

        // DOS timestamps start at 1980, older mtimes keep the epoch default
        let dos_mtime = zip::DateTime::try_from(time::OffsetDateTime::from(mtime))
            .unwrap_or_default();

        Ok(Self {
            writer: ZipWriter::new(inner),
            dos_mtime,
            unix_mtime,
        })
    }

    pub fn finish(mut self) -> Result<(), SrzipError> {
        self.writer.finish()?;
        Ok(())
    }

    // 0x5455 "UT": flags byte with mtime-present, then the unix seconds
    fn extended_timestamp(&self) -> [u8; 9] {
        let mut field = [0u8; 9];
        field[0..2].copy_from_slice(&0x5455u16.to_le_bytes());
        field[2..4].copy_from_slice(&5u16.to_le_bytes());
        field[4] = 0x01;
        field[5..9].copy_from_slice(&self.unix_mtime.to_le_bytes());
        field
    }
}

impl<W: Write + Seek> SessionSink for ZipSink<W> {
    type Error = SrzipError;

    fn write_entry(
        &mut self,
        name: &str,
        data: &[u8],
        compression: Compression,
    ) -> Result<(), SrzipError> {
        let method = match compression {
            Compression::Store => CompressionMethod::Stored,
            Compression::Deflate => CompressionMethod::Deflated,
        };
        let options = FileOptions::default()
            .compression_method(method)
            .last_modified_time(self.dos_mtime);

        debug!(name, len = data.len(), ?compression, "entry");

        // the extra field accumulated here ends up in the local header and
        // again in the central directory entry
        self.writer.start_file_with_extra_data(name, options)?;
        self.writer.write_all(&self.extended_timestamp())?;
        self.writer.end_extra_data()?;
        self.writer.write_all(data)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{metadata_manifest, write_session, Compression, SessionSink};
    use crate::waveforms::Capture;

    #[test]
    fn manifest_shape() {
        let manifest = metadata_manifest(24_000_000, 16, 2);

        let expected = "\
[global]
sigrok version=0.5.0

[device 1]
capturefile=logic-1
total probes=16
samplerate=24 MHz
total analog=0
probe1=DIO 0
probe2=DIO 1
probe3=DIO 2
probe4=DIO 3
probe5=DIO 4
probe6=DIO 5
probe7=DIO 6
probe8=DIO 7
probe9=DIO 8
probe10=DIO 9
probe11=DIO 10
probe12=DIO 11
probe13=DIO 12
probe14=DIO 13
probe15=DIO 14
probe16=DIO 15
unitsize=2
";
        assert_eq!(manifest, expected);
    }

    #[test]
    fn samplerate_truncates_to_whole_mhz() {
        let manifest = metadata_manifest(99_999_999, 1, 2);
        assert!(manifest.contains("samplerate=99 MHz\n"));
    }

    struct RecordingSink {
        entries: Vec<(String, Vec<u8>, Compression)>,
    }

    impl SessionSink for RecordingSink {
        type Error = std::convert::Infallible;

        fn write_entry(
            &mut self,
            name: &str,
            data: &[u8],
            compression: Compression,
        ) -> Result<(), Self::Error> {
            self.entries.push((name.into(), data.to_vec(), compression));
            Ok(())
        }
    }

    #[test]
    fn session_entries_in_order() {
        let capture = Capture {
            sample_rate: 100_000_000,
            samples: vec![0x0102, 0x0304],
        };

        let mut sink = RecordingSink { entries: vec![] };
        write_session(&mut sink, &capture).unwrap();

        let names: Vec<&str> = sink.entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, ["version", "metadata", "logic-1-1"]);

        let (_, version, compression) = &sink.entries[0];
        assert_eq!(version, b"2");
        assert_eq!(*compression, Compression::Store);

        let (_, metadata, compression) = &sink.entries[1];
        assert_eq!(*compression, Compression::Deflate);
        let metadata = std::str::from_utf8(metadata).unwrap();
        assert!(metadata.contains("samplerate=100 MHz\n"));
        assert!(metadata.contains("total probes=16\n"));

        // samples little-endian
        let (_, logic, compression) = &sink.entries[2];
        assert_eq!(*compression, Compression::Deflate);
        assert_eq!(logic, &[0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn zip_sink_roundtrips_through_the_zip_crate() {
        use super::ZipSink;
        use std::io::{Cursor, Read};
        use std::time::{Duration, SystemTime, UNIX_EPOCH};

        let capture = Capture {
            sample_rate: 24_000_000,
            samples: vec![1, 2, 3],
        };
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        let mut buffer = Cursor::new(Vec::new());
        let mut sink = ZipSink::new(&mut buffer, mtime).unwrap();
        write_session(&mut sink, &capture).unwrap();
        sink.finish().unwrap();

        let mut archive = zip::ZipArchive::new(buffer).unwrap();
        assert_eq!(archive.len(), 3);

        {
            let mut entry = archive.by_name("version").unwrap();

            // the UT field made it into the archive with the full mtime
            let mut ut = vec![0x55, 0x54, 0x05, 0x00, 0x01];
            ut.extend_from_slice(&1_700_000_000u32.to_le_bytes());
            let extra = entry.extra_data();
            assert!(extra.windows(ut.len()).any(|w| w == ut));

            let mut version = String::new();
            entry.read_to_string(&mut version).unwrap();
            assert_eq!(version, "2");
        }

        let mut logic = Vec::new();
        archive
            .by_name("logic-1-1")
            .unwrap()
            .read_to_end(&mut logic)
            .unwrap();
        assert_eq!(logic, [1, 0, 2, 0, 3, 0]);

        // pre-epoch mtimes can't go in the UT field
        let too_old = SystemTime::UNIX_EPOCH - Duration::from_secs(1);
        assert!(ZipSink::new(Cursor::new(Vec::new()), too_old).is_err());
    }
}
