use std::io::Write;

use nom::{
    bytes::complete::take,
    combinator::{all_consuming, map_res},
    number::complete::be_u32,
    Finish, IResult,
};

use crate::{coord::GeoPoint, Error, SLResult};

/// Simulated location message, as accepted by the device service.
///
/// All integers are big endian `u32`. A message starts with a tag:
///
/// | tag | message        | body                                                      |
/// |-----|----------------|-----------------------------------------------------------|
/// | 0   | set location   | `len` + latitude text, `len` + longitude text             |
/// | 1   | reset location | none                                                      |
///
/// Coordinates are sent as decimal text with exactly six fractional digits (`%f` in C). The
/// service parses the length and the text strictly, so other renderings (exponents, shorter
/// precision) are rejected by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationMessage {
    SetLocation(GeoPoint),
    Reset,
}

pub const TAG_SET_LOCATION: u32 = 0;
pub const TAG_RESET: u32 = 1;

/// Digits after the decimal point in coordinate text.
pub const COORD_PRECISION: usize = 6;

impl LocationMessage {
    pub fn to_bytes(&self) -> SLResult<Vec<u8>> {
        encode(self)
    }
}

impl From<GeoPoint> for LocationMessage {
    fn from(point: GeoPoint) -> Self {
        LocationMessage::SetLocation(point)
    }
}

/// Encode one message frame.
pub fn encode(msg: &LocationMessage) -> SLResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(32);
    write_message(&mut buf, msg).map_err(|e| Error::Encoding(format!("location bytes: {e}")))?;
    Ok(buf)
}

fn write_message<W: Write>(w: &mut W, msg: &LocationMessage) -> std::io::Result<()> {
    match msg {
        LocationMessage::SetLocation(point) => {
            w.write_all(&TAG_SET_LOCATION.to_be_bytes())?;
            write_coord(w, point.latitude())?;
            write_coord(w, point.longitude())
        }
        LocationMessage::Reset => w.write_all(&TAG_RESET.to_be_bytes()),
    }
}

fn write_coord<W: Write>(w: &mut W, deg: f64) -> std::io::Result<()> {
    let text = format!("{deg:.prec$}", prec = COORD_PRECISION);
    let len = u32::try_from(text.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "coordinate text"))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(text.as_bytes())
}

/// A decoded frame, borrowing the coordinate text from the input.
///
/// The service never replies, so nothing here is needed to talk to a device. Decoding is used to
/// inspect what was (or would be) sent.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    SetLocation {
        latitude: &'a str,
        longitude: &'a str,
    },
    Reset,
}

/// Decode exactly one frame. Trailing bytes are an error.
pub fn parse(bytes: &[u8]) -> SLResult<Frame<'_>> {
    let nom_res = all_consuming(nom_parse)(bytes);
    nom_res.finish().map(|(_, frame)| frame).map_err(|e| e.into())
}

fn nom_parse(bytes: &[u8]) -> IResult<&[u8], Frame<'_>> {
    let (rest, tag) = be_u32(bytes)?;
    match tag {
        TAG_SET_LOCATION => {
            let (rest, latitude) = coord_text(rest)?;
            let (rest, longitude) = coord_text(rest)?;
            Ok((
                rest,
                Frame::SetLocation {
                    latitude,
                    longitude,
                },
            ))
        }
        TAG_RESET => Ok((rest, Frame::Reset)),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            bytes,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn coord_text(bytes: &[u8]) -> IResult<&[u8], &str> {
    let (rest, len) = be_u32(bytes)?;
    map_res(take(len), std::str::from_utf8)(rest)
}
