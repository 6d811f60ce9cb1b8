//! Primary-HDU FITS reading and writing.
//!
//! Layout: a header of 80-byte ASCII cards terminated by `END`, padded to a
//! 2880-byte block, followed by big-endian pixel data padded the same way.
//! Only two-dimensional images are supported. Output is always BITPIX -32.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;
use ndarray::Array2;

use crate::consts::{FITS_BLOCK_SIZE, FITS_CARD_SIZE};
use crate::error::{ReductionError, Result};

/// Keywords that describe the data layout and are regenerated on write.
const STRUCTURAL_KEYWORDS: [&str; 7] = ["SIMPLE", "BITPIX", "EXTEND", "BZERO", "BSCALE", "BLANK", "END"];

#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => f.write_str(&format_real(*v)),
            Self::Bool(true) => f.write_str("T"),
            Self::Bool(false) => f.write_str("F"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HeaderCard {
    Value { keyword: String, value: HeaderValue },
    /// COMMENT, HISTORY and other commentary cards.
    Text { keyword: String, text: String },
}

impl HeaderCard {
    pub fn keyword(&self) -> &str {
        match self {
            Self::Value { keyword, .. } | Self::Text { keyword, .. } => keyword,
        }
    }
}

/// Ordered list of header cards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<HeaderCard>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[HeaderCard] {
        &self.cards
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        let keyword = keyword.to_ascii_uppercase();
        self.cards.iter().find_map(|card| match card {
            HeaderCard::Value { keyword: k, value } if *k == keyword => Some(value),
            _ => None,
        })
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    /// Replace the value of `keyword`, or append a new card.
    pub fn set(&mut self, keyword: &str, value: HeaderValue) {
        let keyword = keyword.to_ascii_uppercase();
        for card in &mut self.cards {
            if let HeaderCard::Value { keyword: k, value: v } = card {
                if *k == keyword {
                    *v = value;
                    return;
                }
            }
        }
        self.cards.push(HeaderCard::Value { keyword, value });
    }

    pub fn add_history(&mut self, text: impl Into<String>) {
        self.cards.push(HeaderCard::Text {
            keyword: "HISTORY".into(),
            text: text.into(),
        });
    }

    /// Cards that survive into a derived image (layout keywords dropped).
    fn carried_cards(&self) -> impl Iterator<Item = &HeaderCard> {
        self.cards.iter().filter(|card| {
            let keyword = card.keyword();
            !STRUCTURAL_KEYWORDS.contains(&keyword) && !keyword.starts_with("NAXIS")
        })
    }
}

/// A two-dimensional image with its header. Pixel values are physical
/// (BZERO/BSCALE applied), shape = (height, width).
#[derive(Clone, Debug)]
pub struct FitsImage {
    pub header: FitsHeader,
    pub data: Array2<f32>,
}

impl FitsImage {
    pub fn new(header: FitsHeader, data: Array2<f32>) -> Self {
        Self { header, data }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// Read only the header blocks of a FITS file.
pub fn read_header(path: &Path) -> Result<FitsHeader> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut block = vec![0u8; FITS_BLOCK_SIZE];
    let mut header = FitsHeader::new();
    loop {
        reader.read_exact(&mut block).map_err(|_| {
            ReductionError::Fits(format!("{}: header has no END card", path.display()))
        })?;
        if parse_block(&block, &mut header)? {
            return Ok(header);
        }
    }
}

/// Read a FITS image (header + pixels) through a memory map.
pub fn read_fits(path: &Path) -> Result<FitsImage> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let mut header = FitsHeader::new();
    let mut offset = 0;
    loop {
        if offset + FITS_BLOCK_SIZE > mmap.len() {
            return Err(ReductionError::Fits(format!(
                "{}: header has no END card",
                path.display()
            )));
        }
        let done = parse_block(&mmap[offset..offset + FITS_BLOCK_SIZE], &mut header)?;
        offset += FITS_BLOCK_SIZE;
        if done {
            break;
        }
    }

    let data = decode_data(&header, &mmap[offset..])
        .map_err(|reason| ReductionError::Fits(format!("{}: {reason}", path.display())))?;
    Ok(FitsImage { header, data })
}

/// Write `image` as a BITPIX -32 primary HDU.
pub fn write_fits(path: &Path, image: &FitsImage) -> Result<()> {
    let (h, w) = image.data.dim();
    let mut cards = vec![
        format_value_card("SIMPLE", &HeaderValue::Bool(true)),
        format_value_card("BITPIX", &HeaderValue::Int(-32)),
        format_value_card("NAXIS", &HeaderValue::Int(2)),
        format_value_card("NAXIS1", &HeaderValue::Int(w as i64)),
        format_value_card("NAXIS2", &HeaderValue::Int(h as i64)),
    ];
    for card in image.header.carried_cards() {
        cards.push(match card {
            HeaderCard::Value { keyword, value } => format_value_card(keyword, value),
            HeaderCard::Text { keyword, text } => format_text_card(keyword, text),
        });
    }
    cards.push(pad_card("END".into()));

    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;
    for card in &cards {
        writer.write_all(card.as_bytes())?;
        written += FITS_CARD_SIZE;
    }
    write_padding(&mut writer, written, b' ')?;

    let mut buf = [0u8; 4];
    for &val in image.data.iter() {
        BigEndian::write_f32(&mut buf, val);
        writer.write_all(&buf)?;
    }
    write_padding(&mut writer, h * w * 4, 0)?;
    writer.flush()?;
    Ok(())
}

fn write_padding(w: &mut impl Write, written: usize, fill: u8) -> Result<()> {
    let rem = written % FITS_BLOCK_SIZE;
    if rem != 0 {
        w.write_all(&vec![fill; FITS_BLOCK_SIZE - rem])?;
    }
    Ok(())
}

/// Parse one header block into `header`. Returns true once END was seen.
fn parse_block(block: &[u8], header: &mut FitsHeader) -> Result<bool> {
    for raw in block.chunks_exact(FITS_CARD_SIZE) {
        let card: String = raw
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect();
        let keyword = card[..8].trim_end().to_string();
        if keyword == "END" {
            return Ok(true);
        }
        if keyword.is_empty() {
            continue;
        }
        if &card[8..10] == "= " {
            if let Some(value) = parse_value(&card[10..]) {
                header.cards.push(HeaderCard::Value { keyword, value });
            }
        } else {
            header.cards.push(HeaderCard::Text {
                keyword,
                text: card[8..].trim().to_string(),
            });
        }
    }
    Ok(false)
}

fn parse_value(field: &str) -> Option<HeaderValue> {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        // Quoted string, '' escapes a quote.
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        return Some(HeaderValue::Str(value.trim_end().to_string()));
    }

    let token = field.split('/').next().unwrap_or("").trim();
    match token {
        "" => None,
        "T" => Some(HeaderValue::Bool(true)),
        "F" => Some(HeaderValue::Bool(false)),
        _ => {
            if let Ok(v) = token.parse::<i64>() {
                return Some(HeaderValue::Int(v));
            }
            let normalized = token.replace(['D', 'd'], "E");
            match normalized.parse::<f64>() {
                Ok(v) => Some(HeaderValue::Float(v)),
                Err(_) => Some(HeaderValue::Str(token.to_string())),
            }
        }
    }
}

fn decode_data(header: &FitsHeader, raw: &[u8]) -> std::result::Result<Array2<f32>, String> {
    let bitpix = header.get_i64("BITPIX").ok_or("missing BITPIX")?;
    let naxis = header.get_i64("NAXIS").ok_or("missing NAXIS")?;
    if naxis < 2 {
        return Err(format!("expected a 2-D image, NAXIS = {naxis}"));
    }
    for axis in 3..=naxis {
        if header.get_i64(&format!("NAXIS{axis}")).unwrap_or(1) != 1 {
            return Err(format!("expected a 2-D image, NAXIS = {naxis}"));
        }
    }
    let width = header.get_i64("NAXIS1").ok_or("missing NAXIS1")?;
    let height = header.get_i64("NAXIS2").ok_or("missing NAXIS2")?;
    if width <= 0 || height <= 0 {
        return Err(format!("invalid image dimensions {width}x{height}"));
    }
    let (w, h) = (width as usize, height as usize);
    let bzero = header.get_f64("BZERO").unwrap_or(0.0);
    let bscale = header.get_f64("BSCALE").unwrap_or(1.0);

    let n = w * h;
    let bytes_per_sample = (bitpix.unsigned_abs() / 8) as usize;
    if raw.len() < n * bytes_per_sample {
        return Err(format!(
            "data truncated: expected {} bytes, got {}",
            n * bytes_per_sample,
            raw.len()
        ));
    }
    let raw = &raw[..n * bytes_per_sample];

    let physical: Vec<f32> = match bitpix {
        8 => raw.iter().map(|&v| scale(v as f64, bscale, bzero)).collect(),
        16 => {
            let mut values = vec![0i16; n];
            BigEndian::read_i16_into(raw, &mut values);
            values.into_iter().map(|v| scale(v as f64, bscale, bzero)).collect()
        }
        32 => {
            let mut values = vec![0i32; n];
            BigEndian::read_i32_into(raw, &mut values);
            values.into_iter().map(|v| scale(v as f64, bscale, bzero)).collect()
        }
        -32 => {
            let mut values = vec![0f32; n];
            BigEndian::read_f32_into(raw, &mut values);
            values.into_iter().map(|v| scale(v as f64, bscale, bzero)).collect()
        }
        -64 => {
            let mut values = vec![0f64; n];
            BigEndian::read_f64_into(raw, &mut values);
            values.into_iter().map(|v| scale(v, bscale, bzero)).collect()
        }
        other => return Err(format!("unsupported BITPIX {other}")),
    };

    Array2::from_shape_vec((h, w), physical).map_err(|e| e.to_string())
}

fn scale(v: f64, bscale: f64, bzero: f64) -> f32 {
    (v * bscale + bzero) as f32
}

fn format_value_card(keyword: &str, value: &HeaderValue) -> String {
    let body = match value {
        HeaderValue::Str(s) => {
            let escaped = s.replace('\'', "''");
            format!("'{escaped:<8}'")
        }
        other => format!("{:>20}", other.to_string()),
    };
    pad_card(format!("{keyword:<8}= {body}"))
}

fn format_text_card(keyword: &str, text: &str) -> String {
    pad_card(format!("{keyword:<8}{text}"))
}

fn pad_card(mut card: String) -> String {
    card.retain(|c| c.is_ascii() && !c.is_ascii_control());
    card.truncate(FITS_CARD_SIZE);
    format!("{card:<80}")
}

/// FITS reals need a decimal point or an upper-case exponent.
fn format_real(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v:?}").replace('e', "E")
    }
}
