use std::num::ParseIntError;

use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::{debug, trace};

/// Notifications shorter than this are line noise and never reach the [`Reassembler`].
pub const MIN_FRAGMENT_LEN: usize = 10;
const MARKER_OFFSET: usize = 4;
const PAYLOAD_OFFSET: usize = 7;

/// Strip the flag the appliance keeps in bit 7 of most state bytes.
///
/// The bit is an offset rather than a two's-complement sign, so the logical value is always in
/// `0..=127`.
pub const fn clamp(byte: u8) -> u8 {
    if byte < 128 { byte } else { byte - 128 }
}

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("offset {offset} is past the end of a {len} byte telegram")]
    OutOfBounds { offset: usize, len: usize },
    #[error("could not compute the timestamp relative to the current time")]
    Timestamp(#[source] jiff::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum CloudReportError {
    #[error("appliance shadow document is malformed")]
    Json(#[source] serde_json::Error),
    #[error("appliance shadow reports a non-numeric start offset {1:?}")]
    StartOffset(#[source] ParseIntError, String),
}

/// One complete state snapshot of an appliance.
///
/// Byte 0 is never interpreted; everything else is addressed by the offsets the appliance
/// configuration names.
#[derive(Clone, PartialEq, Eq)]
pub struct Telegram(Bytes);

impl Telegram {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex dump, ignoring any whitespace in between the digits.
    pub fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        let digits = text.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        Ok(Self(hex::decode(digits)?.into()))
    }

    /// Build a telegram out of a cloud-relayed appliance shadow document.
    ///
    /// The cloud only reports the state array from `wfaStartOffset` onwards, so the bytes before
    /// it are zero-filled to keep the configured offsets valid.
    pub fn from_cloud_report(document: &str) -> Result<Self, CloudReportError> {
        let shadow =
            serde_json::from_str::<CloudShadow>(document).map_err(CloudReportError::Json)?;
        let reported = shadow.state.reported;
        let offset = reported
            .wfa_start_offset
            .trim()
            .parse::<usize>()
            .map_err(|e| CloudReportError::StartOffset(e, reported.wfa_start_offset.clone()))?;
        let mut bytes = BytesMut::zeroed(offset);
        bytes.extend_from_slice(&reported.wfa);
        Ok(Self(bytes.freeze()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn byte(&self, offset: usize) -> Result<u8, ReadError> {
        self.0.get(offset).copied().ok_or(ReadError::OutOfBounds { offset, len: self.0.len() })
    }

    pub fn clamped(&self, offset: usize) -> Result<u8, ReadError> {
        self.byte(offset).map(clamp)
    }
}

impl std::fmt::Debug for Telegram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Telegram").field(&hex::encode(&self.0)).finish()
    }
}

impl std::fmt::Display for Telegram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

#[derive(serde::Deserialize)]
struct CloudShadow {
    state: CloudState,
}

#[derive(serde::Deserialize)]
struct CloudState {
    reported: CloudReported,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudReported {
    wfa_start_offset: String,
    wfa: Vec<u8>,
}

/// Joins the two BLE notifications an appliance sends per state telegram.
///
/// A fragment with marker `0` (byte 4) starts a new telegram; the next fragment with any other
/// marker completes it. Stray continuations are dropped until the next start fragment, which is
/// fine because the appliance keeps re-sending its state.
///
/// One reassembler must only ever see the notifications of a single connection, in order.
#[derive(Default)]
pub struct Reassembler {
    accumulated: BytesMut,
    expected_index: u8,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, fragment: &[u8]) -> Option<Telegram> {
        let Some(&marker) = fragment.get(MARKER_OFFSET) else {
            debug!(len = fragment.len(), "fragment too short to carry a sequence marker");
            return None;
        };
        let payload = fragment.get(PAYLOAD_OFFSET..).unwrap_or_default();
        trace!(marker, expected = self.expected_index, len = fragment.len(), "fragment");
        if marker == 0 {
            self.accumulated.clear();
            self.accumulated.extend_from_slice(payload);
            self.expected_index = 1;
            None
        } else if self.expected_index == 1 {
            self.accumulated.extend_from_slice(payload);
            self.expected_index = 0;
            Some(Telegram(self.accumulated.split().freeze()))
        } else {
            debug!(marker, "dropping fragment received out of sequence");
            None
        }
    }

    /// [`Reassembler::accumulate`], but first discarding notifications too short to be a
    /// fragment at all.
    pub fn push_notification(&mut self, notification: &[u8]) -> Option<Telegram> {
        if notification.len() < MIN_FRAGMENT_LEN {
            debug!(len = notification.len(), "ignoring short notification");
            return None;
        }
        self.accumulate(notification)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FragmentCodecError {
    #[error("could not read a fragment line")]
    Lines(#[source] LinesCodecError),
    #[error("fragment line {1:?} is not valid hex")]
    Hex(#[source] hex::FromHexError, String),
    #[error("could not read fragments")]
    Io(#[from] std::io::Error),
}

/// Decodes a capture of hex-encoded notifications, one per line, into complete telegrams.
///
/// Blank lines and lines starting with `#` are skipped.
pub struct FragmentCodec {
    lines: LinesCodec,
    reassembler: Reassembler,
}

impl FragmentCodec {
    pub fn new() -> Self {
        Self { lines: LinesCodec::new(), reassembler: Reassembler::new() }
    }

    fn handle_line(&mut self, line: &str) -> Result<Option<Telegram>, FragmentCodecError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let digits = line.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        let notification =
            hex::decode(&digits).map_err(|e| FragmentCodecError::Hex(e, line.to_string()))?;
        Ok(self.reassembler.push_notification(&notification))
    }
}

impl Default for FragmentCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FragmentCodec {
    type Item = Telegram;
    type Error = FragmentCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(line) = self.lines.decode(src).map_err(FragmentCodecError::Lines)? else {
                return Ok(None);
            };
            if let Some(telegram) = self.handle_line(&line)? {
                return Ok(Some(telegram));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(line) = self.lines.decode_eof(src).map_err(FragmentCodecError::Lines)? else {
                return Ok(None);
            };
            if let Some(telegram) = self.handle_line(&line)? {
                return Ok(Some(telegram));
            }
        }
    }
}
