//! Small binrw helpers shared by the packet modules.

use std::fmt::Debug;
use std::io::SeekFrom;

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// Records the stream position of a placeholder integer while writing, so
/// the real value (an absolute offset or a size) can be filled in once it
/// is known.
pub struct PosMarker<T> {
    pub pos: core::cell::Cell<u64>,
    pub value: T,
}

impl<T> BinRead for PosMarker<T>
where
    T: BinRead,
{
    type Args<'a> = T::Args<'a>;

    fn read_options<R: binrw::io::Read + binrw::io::Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        T::read_options(reader, endian, args).map(|value| Self {
            pos: core::cell::Cell::new(pos),
            value,
        })
    }
}

impl<T> BinWrite for PosMarker<T>
where
    T: BinWrite<Args<'static> = ()> + Default,
{
    type Args<'a> = ();

    fn write_options<W: binrw::io::Write + binrw::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.pos.set(writer.stream_position()?);
        T::default().write_options(writer, endian, args)
    }
}

impl<T> PosMarker<T>
where
    T: BinWrite<Args<'static> = ()> + TryFrom<u64>,
    T::Error: binrw::error::CustomError + 'static,
{
    /// Seek back to the marker, write `value` there, and return to the
    /// current end of stream.
    pub fn write_back<V, W>(&self, value: V, writer: &mut W, endian: Endian) -> BinResult<()>
    where
        V: TryInto<T>,
        W: binrw::io::Write + binrw::io::Seek,
    {
        let return_to = writer.stream_position()?;
        writer.seek(SeekFrom::Start(self.pos.get()))?;
        value
            .try_into()
            .map_err(|_| binrw::error::Error::Custom {
                pos: self.pos.get(),
                err: Box::new("value does not fit the marker type"),
            })?
            .write_options(writer, endian, ())?;
        writer.seek(SeekFrom::Start(return_to))?;
        Ok(())
    }

    /// Writer for a value whose absolute stream offset must be filled into
    /// the marker.
    #[binrw::writer(writer, endian)]
    pub fn write_aoff<U>(value: &U, write_offset_to: &Self) -> BinResult<()>
    where
        U: BinWrite<Args<'static> = ()>,
    {
        let start_offset = writer.stream_position()?;
        write_offset_to.write_back(start_offset, writer, endian)?;
        value.write_options(writer, endian, ())
    }

    /// Writer for a value whose written size must be filled into the marker.
    #[binrw::writer(writer, endian)]
    pub fn write_size<U>(value: &U, write_size_to: &Self) -> BinResult<()>
    where
        U: BinWrite<Args<'static> = ()>,
    {
        let start_offset = writer.stream_position()?;
        value.write_options(writer, endian, ())?;
        let total_size = writer.stream_position()? - start_offset;
        write_size_to.write_back(total_size, writer, endian)
    }
}

impl<T> Debug for PosMarker<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosMarker")
            .field("pos", &self.pos)
            .field("value", &self.value)
            .finish()
    }
}

impl<T> Default for PosMarker<T>
where
    T: Default,
{
    fn default() -> Self {
        Self {
            pos: core::cell::Cell::new(u64::MAX),
            value: T::default(),
        }
    }
}

/// Writer for a string field encoded as UTF-16LE whose absolute stream
/// offset must be filled into `write_offset_to`.
#[binrw::writer(writer, endian)]
pub fn write_utf16_aoff(value: &String, write_offset_to: &PosMarker<u16>) -> BinResult<()> {
    let start_offset = writer.stream_position()?;
    write_offset_to.write_back(start_offset, writer, endian)?;
    to_utf16_le(value).write_options(writer, endian, ())
}

/// Windows FILETIME: 100ns intervals since 1601-01-01 UTC.
#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileTime {
    pub value: u64,
}

impl FileTime {
    /// Seconds between the FILETIME epoch and the unix epoch.
    const EPOCH_DIFF_SECS: i128 = 11_644_473_600;
    const INTERVALS_PER_SEC: i128 = 10_000_000;

    pub fn now() -> Self {
        time::OffsetDateTime::now_utc().into()
    }

    pub fn to_date_time(&self) -> time::OffsetDateTime {
        let unix_nanos = (self.value as i128 - Self::EPOCH_DIFF_SECS * Self::INTERVALS_PER_SEC) * 100;
        time::OffsetDateTime::from_unix_timestamp_nanos(unix_nanos)
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
    }
}

impl From<time::OffsetDateTime> for FileTime {
    fn from(value: time::OffsetDateTime) -> Self {
        let intervals =
            value.unix_timestamp_nanos() / 100 + Self::EPOCH_DIFF_SECS * Self::INTERVALS_PER_SEC;
        FileTime {
            value: intervals as u64,
        }
    }
}

/// Encodes a little-endian binrw value into a fresh byte vector.
pub fn encode_le<T>(value: &T) -> BinResult<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = std::io::Cursor::new(Vec::new());
    value.write_le(&mut cursor)?;
    Ok(cursor.into_inner())
}

/// Decodes a little-endian binrw value from a byte slice.
pub fn decode_le<T>(bytes: &[u8]) -> BinResult<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_le(&mut std::io::Cursor::new(bytes))
}

/// Encodes a string as UTF-16LE bytes, without a terminator.
pub fn to_utf16_le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
}

/// Decodes UTF-16LE bytes into a string, dropping a trailing NUL if present.
pub fn from_utf16_le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let end = units.iter().position(|&c| c == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}
