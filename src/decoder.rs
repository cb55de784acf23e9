//! Part 10 data set decoding.
//!
//! [`DatasetDecoder`] walks the tag/VR/length/value element stream of a
//! DICOM file with a [`BinaryCursor`], keeps every top-level element in a
//! [`Dataset`] and derives typed metadata and pixel buffers on demand.
//! Sequences are skipped (defined lengths by size, undefined lengths by
//! following item and delimiter tags); only their presence is recorded.

use std::{collections::HashMap, io::Read, path::Path, sync::Arc};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use dicom::core::{
    Tag, VR,
    dictionary::{DataDictionary, DataDictionaryEntry},
};
use dicom_dictionary_std::{StandardDataDictionary, tags};
use flate2::read::DeflateDecoder;
use tracing::debug;
use web_time::Instant;

use crate::{
    binary_cursor::BinaryCursor,
    buffer_pool::BufferPool,
    error::DicomError,
    metadata::{PixelSpacing, RescaleParameters, WindowSettings},
};

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;
const META_GROUP: u16 = 0x0002;
const MAX_SEQUENCE_DEPTH: usize = 64;

const ITEM: Tag = Tag(0xFFFE, 0xE000);
const ITEM_DELIMITATION: Tag = Tag(0xFFFE, 0xE00D);
const SEQUENCE_DELIMITATION: Tag = Tag(0xFFFE, 0xE0DD);

/// Explicit VRs whose value length is stored in 4 bytes after 2 reserved
/// bytes; all others use a 2-byte length.
const LONG_LENGTH_VRS: [&[u8; 2]; 13] = [
    b"OB", b"OD", b"OF", b"OL", b"OV", b"OW", b"SQ", b"SV", b"UC", b"UR", b"UT", b"UN", b"UV",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    ExplicitVrLittleEndian,
    ExplicitVrBigEndian,
    DeflatedExplicitVrLittleEndian,
    /// Any compressed syntax; always explicit VR little endian with
    /// fragmented pixel data.
    Encapsulated(String),
}

impl TransferSyntax {
    pub fn from_uid(uid: &str) -> Self {
        match uid.trim_end_matches(['\0', ' ']) {
            "1.2.840.10008.1.2" => Self::ImplicitVrLittleEndian,
            "1.2.840.10008.1.2.1" => Self::ExplicitVrLittleEndian,
            "1.2.840.10008.1.2.2" => Self::ExplicitVrBigEndian,
            "1.2.840.10008.1.2.1.99" => Self::DeflatedExplicitVrLittleEndian,
            other => Self::Encapsulated(other.to_string()),
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            Self::ImplicitVrLittleEndian => "1.2.840.10008.1.2",
            Self::ExplicitVrLittleEndian => "1.2.840.10008.1.2.1",
            Self::ExplicitVrBigEndian => "1.2.840.10008.1.2.2",
            Self::DeflatedExplicitVrLittleEndian => "1.2.840.10008.1.2.1.99",
            Self::Encapsulated(uid) => uid,
        }
    }

    pub fn little_endian(&self) -> bool {
        !matches!(self, Self::ExplicitVrBigEndian)
    }

    pub fn explicit_vr(&self) -> bool {
        !matches!(self, Self::ImplicitVrLittleEndian)
    }

    pub fn is_encapsulated(&self) -> bool {
        matches!(self, Self::Encapsulated(_))
    }
}

/// One (tag, VR, length, value) record.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub vr: VR,
    /// Declared length; `0xFFFFFFFF` for undefined-length sequences and
    /// encapsulated pixel data.
    pub length: u32,
    /// Raw value bytes. For encapsulated pixel data this is the concatenation
    /// of all fragments after the offset table; for sequences it is empty.
    pub value: Vec<u8>,
}

impl Element {
    pub fn has_undefined_length(&self) -> bool {
        self.length == UNDEFINED_LENGTH
    }
}

/// All top-level elements of one decoded file, keyed by tag.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    elements: HashMap<Tag, Element>,
    transfer_syntax: TransferSyntax,
}

impl Dataset {
    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.transfer_syntax
    }

    /// Cursor over an element's value in the byte order it was encoded with.
    fn cursor<'a>(&self, element: &'a Element) -> BinaryCursor<'a> {
        let little_endian =
            element.tag.group() == META_GROUP || self.transfer_syntax.little_endian();
        BinaryCursor::new(&element.value, little_endian)
    }

    /// Value as text. Binary numeric VRs are formatted, multiple values are
    /// joined with a backslash like their string counterparts.
    pub fn string(&self, tag: Tag) -> Option<String> {
        let element = self.get(tag)?;
        match element.vr {
            VR::US | VR::SS | VR::UL | VR::SL | VR::FL | VR::FD => Some(
                self.numbers(element)
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("\\"),
            ),
            VR::SQ | VR::OB | VR::OW | VR::OF | VR::OD | VR::OL | VR::UN => None,
            _ => {
                let mut offset = 0;
                Some(
                    self.cursor(element)
                        .read_string(&mut offset, element.value.len()),
                )
            }
        }
    }

    fn numbers(&self, element: &Element) -> Vec<f64> {
        let cursor = self.cursor(element);
        let width = match element.vr {
            VR::US | VR::SS => 2,
            VR::UL | VR::SL | VR::FL => 4,
            VR::FD => 8,
            _ => return Vec::new(),
        };
        let mut offset = 0;
        (0..element.value.len() / width)
            .map(|_| match element.vr {
                VR::US => cursor.read_short(&mut offset) as f64,
                VR::SS => cursor.read_short(&mut offset) as i16 as f64,
                VR::UL => cursor.read_uint(&mut offset) as f64,
                VR::SL => cursor.read_int(&mut offset) as f64,
                VR::FL => cursor.read_float(&mut offset) as f64,
                _ => cursor.read_double(&mut offset),
            })
            .collect()
    }

    /// All numeric values of an element, parsing `DS`/`IS` text.
    pub fn float_values(&self, tag: Tag) -> Vec<f64> {
        let Some(element) = self.get(tag) else {
            return Vec::new();
        };
        match element.vr {
            VR::US | VR::SS | VR::UL | VR::SL | VR::FL | VR::FD => self.numbers(element),
            _ => self
                .string(tag)
                .unwrap_or_default()
                .split('\\')
                .filter_map(|part| part.trim().parse::<f64>().ok())
                .collect(),
        }
    }

    pub fn float_value(&self, tag: Tag) -> Option<f64> {
        self.float_values(tag).first().copied()
    }

    pub fn int_value(&self, tag: Tag) -> Option<i64> {
        let element = self.get(tag)?;
        match element.vr {
            VR::US | VR::SS | VR::UL | VR::SL => {
                self.numbers(element).first().map(|&v| v as i64)
            }
            _ => {
                let text = self.string(tag)?;
                let first = text.split('\\').next()?.trim();
                first.parse::<i64>().ok().or_else(|| {
                    first
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.fract() == 0.0)
                        .map(|v| v as i64)
                })
            }
        }
    }
}

struct ElementHeader {
    tag: Tag,
    vr: Option<VR>,
    length: u32,
}

fn implicit_vr(tag: Tag) -> VR {
    if tag.element() == 0x0000 {
        return VR::UL;
    }
    if tag == tags::PIXEL_DATA {
        return VR::OW;
    }
    if tag.group() % 2 == 1 {
        return VR::UN;
    }
    StandardDataDictionary
        .by_tag(tag)
        .map(|entry| entry.vr().relaxed())
        .unwrap_or(VR::UN)
}

fn read_header(
    cursor: &BinaryCursor,
    offset: &mut usize,
    explicit_vr: bool,
) -> Result<ElementHeader, DicomError> {
    let tag = Tag(cursor.read_short(offset), cursor.read_short(offset));

    // Item and delimiter tags never carry a VR.
    if tag.group() == 0xFFFE {
        let length = cursor.read_uint(offset);
        return Ok(ElementHeader {
            tag,
            vr: None,
            length,
        });
    }

    if !explicit_vr {
        let length = cursor.read_uint(offset);
        return Ok(ElementHeader {
            tag,
            vr: Some(implicit_vr(tag)),
            length,
        });
    }

    let code = [cursor.read_byte(offset), cursor.read_byte(offset)];
    let vr = VR::from_binary(code).ok_or_else(|| {
        DicomError::InvalidDicomFormat(format!(
            "unknown value representation {:?} for element {}",
            String::from_utf8_lossy(&code),
            tag
        ))
    })?;
    let length = if LONG_LENGTH_VRS.contains(&&code) {
        cursor.skip(offset, 2);
        cursor.read_uint(offset)
    } else {
        cursor.read_short(offset) as u32
    };
    Ok(ElementHeader {
        tag,
        vr: Some(vr),
        length,
    })
}

fn truncated(tag: Tag, needed: usize, available: usize) -> DicomError {
    DicomError::InvalidDicomFormat(format!(
        "element {tag} needs {needed} bytes but only {available} remain"
    ))
}

/// Skip the items of an undefined-length sequence up to and including its
/// sequence delimiter.
fn skip_sequence(
    cursor: &BinaryCursor,
    offset: &mut usize,
    explicit_vr: bool,
    depth: usize,
) -> Result<(), DicomError> {
    if depth > MAX_SEQUENCE_DEPTH {
        return Err(DicomError::InvalidDicomFormat(
            "sequences nested too deeply".to_string(),
        ));
    }
    loop {
        if cursor.remaining(*offset) < 8 {
            return Err(DicomError::InvalidDicomFormat(
                "sequence is missing its delimiter".to_string(),
            ));
        }
        let header = read_header(cursor, offset, explicit_vr)?;
        match header.tag {
            SEQUENCE_DELIMITATION => return Ok(()),
            ITEM if header.length == UNDEFINED_LENGTH => {
                skip_item(cursor, offset, explicit_vr, depth + 1)?
            }
            ITEM => {
                let length = header.length as usize;
                if length > cursor.remaining(*offset) {
                    return Err(truncated(ITEM, length, cursor.remaining(*offset)));
                }
                cursor.skip(offset, length);
            }
            other => {
                return Err(DicomError::InvalidDicomFormat(format!(
                    "unexpected element {other} inside a sequence"
                )));
            }
        }
    }
}

/// Skip the elements of an undefined-length item up to its item delimiter.
fn skip_item(
    cursor: &BinaryCursor,
    offset: &mut usize,
    explicit_vr: bool,
    depth: usize,
) -> Result<(), DicomError> {
    loop {
        if cursor.remaining(*offset) < 8 {
            return Err(DicomError::InvalidDicomFormat(
                "item is missing its delimiter".to_string(),
            ));
        }
        let header = read_header(cursor, offset, explicit_vr)?;
        if header.tag == ITEM_DELIMITATION {
            return Ok(());
        }
        if header.length == UNDEFINED_LENGTH {
            skip_sequence(cursor, offset, explicit_vr, depth + 1)?;
            continue;
        }
        let length = header.length as usize;
        if length > cursor.remaining(*offset) {
            return Err(truncated(header.tag, length, cursor.remaining(*offset)));
        }
        cursor.skip(offset, length);
    }
}

/// Collect encapsulated pixel data fragments, dropping the basic offset table.
fn read_fragments(cursor: &BinaryCursor, offset: &mut usize) -> Result<Vec<u8>, DicomError> {
    let mut data = Vec::new();
    let mut first = true;
    loop {
        if cursor.remaining(*offset) < 8 {
            return Err(DicomError::InvalidDicomFormat(
                "encapsulated pixel data is missing its delimiter".to_string(),
            ));
        }
        let header = read_header(cursor, offset, true)?;
        match header.tag {
            SEQUENCE_DELIMITATION => return Ok(data),
            ITEM => {
                let length = header.length as usize;
                if length > cursor.remaining(*offset) {
                    return Err(truncated(ITEM, length, cursor.remaining(*offset)));
                }
                let fragment = cursor.read_bytes(offset, length);
                if !first {
                    data.extend_from_slice(&fragment);
                }
                first = false;
            }
            other => {
                return Err(DicomError::InvalidDicomFormat(format!(
                    "unexpected element {other} in encapsulated pixel data"
                )));
            }
        }
    }
}

/// Parse elements until the buffer ends, or until the group changes away
/// from `only_group` when one is given.
fn parse_elements(
    cursor: &BinaryCursor,
    offset: &mut usize,
    explicit_vr: bool,
    only_group: Option<u16>,
    elements: &mut HashMap<Tag, Element>,
) -> Result<(), DicomError> {
    while cursor.remaining(*offset) >= 8 {
        if let Some(group) = only_group {
            let mut peek = *offset;
            if cursor.read_short(&mut peek) != group {
                break;
            }
        }

        let header = read_header(cursor, offset, explicit_vr)?;
        let Some(vr) = header.vr else {
            // Stray delimiters at the top level carry no data.
            continue;
        };

        if header.length == UNDEFINED_LENGTH {
            let value = if header.tag == tags::PIXEL_DATA {
                read_fragments(cursor, offset)?
            } else {
                skip_sequence(cursor, offset, explicit_vr, 0)?;
                Vec::new()
            };
            elements.insert(
                header.tag,
                Element {
                    tag: header.tag,
                    vr: if header.tag == tags::PIXEL_DATA { vr } else { VR::SQ },
                    length: UNDEFINED_LENGTH,
                    value,
                },
            );
            continue;
        }

        let length = header.length as usize;
        let available = cursor.remaining(*offset);
        if length > available {
            if header.tag == tags::PIXEL_DATA {
                // Keep what is there; pixel extraction reports the shortfall.
                let value = cursor.read_bytes(offset, available);
                elements.insert(
                    header.tag,
                    Element {
                        tag: header.tag,
                        vr,
                        length: header.length,
                        value,
                    },
                );
                break;
            }
            return Err(truncated(header.tag, length, available));
        }

        let value = if vr == VR::SQ {
            cursor.skip(offset, length);
            Vec::new()
        } else {
            cursor.read_bytes(offset, length)
        };
        elements.insert(
            header.tag,
            Element {
                tag: header.tag,
                vr,
                length: header.length,
                value,
            },
        );
    }
    Ok(())
}

/// Guess explicit VR from the two bytes after the next tag.
fn looks_explicit(bytes: &[u8], offset: usize) -> bool {
    bytes
        .get(offset + 4..offset + 6)
        .is_some_and(|code| code.iter().all(u8::is_ascii_uppercase))
}

fn parse_dataset(bytes: &[u8]) -> Result<Dataset, DicomError> {
    if bytes.len() < PREAMBLE_LEN + MAGIC.len()
        || &bytes[PREAMBLE_LEN..PREAMBLE_LEN + MAGIC.len()] != MAGIC
    {
        return Err(DicomError::InvalidDicomFormat(
            "missing 128-byte preamble and DICM prefix".to_string(),
        ));
    }

    let mut elements = HashMap::new();
    let mut offset = PREAMBLE_LEN + MAGIC.len();

    // The file meta group is always explicit VR little endian.
    let meta_cursor = BinaryCursor::new(bytes, true);
    parse_elements(
        &meta_cursor,
        &mut offset,
        true,
        Some(META_GROUP),
        &mut elements,
    )?;

    let transfer_syntax = match elements.get(&tags::TRANSFER_SYNTAX_UID) {
        Some(element) => {
            let mut pos = 0;
            let uid = BinaryCursor::new(&element.value, true).read_string(&mut pos, element.value.len());
            TransferSyntax::from_uid(&uid)
        }
        None if looks_explicit(bytes, offset) => TransferSyntax::ExplicitVrLittleEndian,
        None => TransferSyntax::ImplicitVrLittleEndian,
    };

    if transfer_syntax == TransferSyntax::DeflatedExplicitVrLittleEndian {
        let mut inflated = Vec::new();
        DeflateDecoder::new(&bytes[offset.min(bytes.len())..])
            .read_to_end(&mut inflated)
            .map_err(|err| {
                DicomError::InvalidDicomFormat(format!("deflated data set is corrupt: {err}"))
            })?;
        let cursor = BinaryCursor::new(&inflated, true);
        let mut pos = 0;
        parse_elements(&cursor, &mut pos, true, None, &mut elements)?;
    } else {
        let cursor = BinaryCursor::new(bytes, transfer_syntax.little_endian());
        parse_elements(
            &cursor,
            &mut offset,
            transfer_syntax.explicit_vr(),
            None,
            &mut elements,
        )?;
    }

    Ok(Dataset {
        elements,
        transfer_syntax,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LutChannel {
    Red,
    Green,
    Blue,
}

/// A decoded file plus lazily derived metadata and pixel accessors.
#[derive(Clone, Debug)]
pub struct DatasetDecoder {
    dataset: Dataset,
    pool: Option<Arc<BufferPool>>,
}

impl DatasetDecoder {
    /// Decode an in-memory Part 10 file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DicomError> {
        let start = Instant::now();
        let dataset = parse_dataset(bytes)?;
        debug!(
            elements = dataset.len(),
            transfer_syntax = dataset.transfer_syntax.uid(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "decoded data set"
        );
        Ok(Self {
            dataset,
            pool: None,
        })
    }

    /// Read and decode a file, blocking the current thread.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DicomError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| DicomError::from_io(err, path))?;
        Self::from_bytes(&bytes)
    }

    /// Read and decode a file on tokio's blocking pool.
    pub async fn open_async(path: impl AsRef<Path>) -> Result<Self, DicomError> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::open(&path)).await?
    }

    /// Decode an in-memory file on tokio's blocking pool.
    pub async fn from_bytes_async(bytes: Vec<u8>) -> Result<Self, DicomError> {
        tokio::task::spawn_blocking(move || Self::from_bytes(&bytes)).await?
    }

    /// Draw pixel buffers from `pool` instead of allocating them.
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.dataset.transfer_syntax
    }

    /// String value of `tag`, empty when absent.
    pub fn info(&self, tag: Tag) -> String {
        self.dataset.string(tag).unwrap_or_default()
    }

    pub fn int_value(&self, tag: Tag) -> Option<i64> {
        self.dataset.int_value(tag)
    }

    pub fn float_values(&self, tag: Tag) -> Vec<f64> {
        self.dataset.float_values(tag)
    }

    pub fn rows(&self) -> Option<usize> {
        self.int_value(tags::ROWS).and_then(|v| usize::try_from(v).ok())
    }

    pub fn columns(&self) -> Option<usize> {
        self.int_value(tags::COLUMNS).and_then(|v| usize::try_from(v).ok())
    }

    pub fn bits_allocated(&self) -> Option<u16> {
        self.int_value(tags::BITS_ALLOCATED).and_then(|v| u16::try_from(v).ok())
    }

    /// 0 for unsigned samples, 1 for two's complement.
    pub fn pixel_representation(&self) -> u16 {
        self.int_value(tags::PIXEL_REPRESENTATION).unwrap_or(0) as u16
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.int_value(tags::SAMPLES_PER_PIXEL)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(1)
            .max(1)
    }

    pub fn instance_number(&self) -> Option<i64> {
        self.int_value(tags::INSTANCE_NUMBER)
    }

    pub fn modality(&self) -> String {
        self.info(tags::MODALITY)
    }

    pub fn body_part(&self) -> String {
        self.info(tags::BODY_PART_EXAMINED)
    }

    /// Image Position (Patient) of the first pixel, in millimeters.
    pub fn image_position(&self) -> Option<[f64; 3]> {
        match self.float_values(tags::IMAGE_POSITION_PATIENT)[..] {
            [x, y, z, ..] => Some([x, y, z]),
            _ => None,
        }
    }

    /// Row and column direction cosines.
    pub fn image_orientation(&self) -> Option<[f64; 6]> {
        match self.float_values(tags::IMAGE_ORIENTATION_PATIENT)[..] {
            [a, b, c, d, e, f, ..] => Some([a, b, c, d, e, f]),
            _ => None,
        }
    }

    /// First Window Center/Width pair, if both are present.
    pub fn window_settings(&self) -> Option<WindowSettings> {
        let center = self.dataset.float_value(tags::WINDOW_CENTER)?;
        let width = self.dataset.float_value(tags::WINDOW_WIDTH)?;
        Some(WindowSettings::new(center, width))
    }

    /// Pixel Spacing, falling back to Imager Pixel Spacing; the slice axis
    /// uses Slice Thickness, then Spacing Between Slices. Missing or
    /// non-positive components default to 1 mm.
    pub fn pixel_spacing(&self) -> PixelSpacing {
        let positive = |v: &f64| *v > 0.0;
        let in_plane = [tags::PIXEL_SPACING, tags::IMAGER_PIXEL_SPACING]
            .into_iter()
            .map(|tag| self.float_values(tag))
            .find(|values| values.len() >= 2 && values[..2].iter().all(positive));
        // Pixel Spacing is stored as row spacing (y) then column spacing (x).
        let (y, x) = in_plane.map_or((1.0, 1.0), |values| (values[0], values[1]));
        let z = [tags::SLICE_THICKNESS, tags::SPACING_BETWEEN_SLICES]
            .into_iter()
            .filter_map(|tag| self.dataset.float_value(tag))
            .find(positive)
            .unwrap_or(1.0);
        PixelSpacing::new(x, y, z)
    }

    pub fn rescale_parameters(&self) -> RescaleParameters {
        RescaleParameters::new(
            self.dataset.float_value(tags::RESCALE_SLOPE).unwrap_or(1.0),
            self.dataset.float_value(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
        )
    }

    /// Palette color lookup table data for one channel, reduced to 8 bits.
    pub fn palette_lut(&self, channel: LutChannel) -> Option<Vec<u8>> {
        let tag = match channel {
            LutChannel::Red => tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            LutChannel::Green => tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            LutChannel::Blue => tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DATA,
        };
        let element = self.dataset.get(tag)?;
        let mut offset = 0;
        self.dataset
            .cursor(element)
            .read_lut(&mut offset, element.value.len())
    }

    /// Raw bytes of the first frame, checked against rows x columns.
    fn frame_bytes(&self, bytes_per_sample: usize) -> Result<Option<(&[u8], usize)>, DicomError> {
        let Some(element) = self.dataset.get(tags::PIXEL_DATA) else {
            return Ok(None);
        };
        if self.dataset.transfer_syntax.is_encapsulated() {
            return Err(DicomError::InvalidPixelData(format!(
                "compressed pixel data ({}) is not supported",
                self.dataset.transfer_syntax.uid()
            )));
        }
        let (rows, columns) = match (self.rows(), self.columns()) {
            (Some(rows), Some(columns)) if rows > 0 && columns > 0 => (rows, columns),
            _ => {
                return Err(DicomError::InvalidPixelData(
                    "rows and columns must be present and non-zero".to_string(),
                ));
            }
        };
        let count = rows
            .checked_mul(columns)
            .and_then(|n| n.checked_mul(self.samples_per_pixel()));
        let Some((count, needed)) =
            count.and_then(|count| Some((count, count.checked_mul(bytes_per_sample)?)))
        else {
            return Err(DicomError::InvalidPixelData(format!(
                "{rows}x{columns} image is too large to address"
            )));
        };
        if element.value.len() < needed {
            return Err(DicomError::InvalidPixelData(format!(
                "{rows}x{columns} image needs {needed} bytes of pixel data, found {}",
                element.value.len()
            )));
        }
        Ok(Some((&element.value[..needed], count)))
    }

    /// First frame as 16-bit stored values. `None` unless Bits Allocated is 16
    /// and the file has pixel data.
    pub fn pixels_16(&self) -> Result<Option<Vec<u16>>, DicomError> {
        if self.bits_allocated() != Some(16) {
            return Ok(None);
        }
        let Some((bytes, count)) = self.frame_bytes(2)? else {
            return Ok(None);
        };
        let mut pixels = match &self.pool {
            Some(pool) => pool.acquire::<u16>(count),
            None => vec![0u16; count],
        };
        pixels.truncate(count);
        if self.dataset.transfer_syntax.little_endian() {
            LittleEndian::read_u16_into(bytes, &mut pixels);
        } else {
            BigEndian::read_u16_into(bytes, &mut pixels);
        }
        Ok(Some(pixels))
    }

    /// First frame as 8-bit samples. `None` unless Bits Allocated is 8 and the
    /// file has pixel data.
    pub fn pixels_8(&self) -> Result<Option<Vec<u8>>, DicomError> {
        if self.bits_allocated() != Some(8) {
            return Ok(None);
        }
        let Some((bytes, count)) = self.frame_bytes(1)? else {
            return Ok(None);
        };
        let mut pixels = match &self.pool {
            Some(pool) => pool.acquire::<u8>(count),
            None => vec![0u8; count],
        };
        pixels.truncate(count);
        pixels.copy_from_slice(bytes);
        Ok(Some(pixels))
    }
}
