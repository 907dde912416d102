//! The `split` module selects the symbol version and, when the data does
//! not fit a single symbol, shards the accumulated segments into a
//! structured-append sequence.

use core::mem;

use crate::bits;
use crate::types::{EcLevel, Mode, QrError, QrResult, Version};

/// One unit of input accumulated by the encoder, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Payload characters in one encoding mode.
    Data { mode: Mode, bytes: Vec<u8> },

    /// An ECI header switching the interpretation of the following byte
    /// data.
    Eci(u32),
}

impl Segment {
    /// The number of encoded bits this segment occupies at the given
    /// version, header included.
    fn encoded_bits(&self, version: Version) -> usize {
        match self {
            Segment::Data { mode, bytes } => {
                bits::segment_encoded_bits(*mode, version, bytes.len() / mode.bytes_per_char())
            }
            Segment::Eci(designator) => bits::eci_encoded_bits(*designator),
        }
    }
}

/// The total bit length of `segments` encoded at `version`, excluding the
/// terminator and any structured-append header.
pub fn total_encoded_bits(segments: &[Segment], version: Version) -> usize {
    segments.iter().map(|s| s.encoded_bits(version)).sum()
}

/// The structured-append parity byte: the XOR of every payload byte across
/// the whole message. ECI headers do not contribute.
pub fn parity(segments: &[Segment]) -> u8 {
    segments.iter().fold(0, |acc, segment| match segment {
        Segment::Data { bytes, .. } => bytes.iter().fold(acc, |acc, b| acc ^ b),
        Segment::Eci(_) => acc,
    })
}

/// The version and per-symbol segment lists chosen for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub version: Version,
    pub shards: Vec<Vec<Segment>>,
}

/// The largest number of characters of `mode` that fit in `avail_bits`,
/// header included, capped by `want` and by the character count field.
fn max_chars(mode: Mode, version: Version, avail_bits: usize, want: usize) -> usize {
    let length_bits = mode.length_bits_count(version);
    let header = 4 + length_bits;
    if avail_bits <= header {
        return 0;
    }
    let data_avail = avail_bits - header;
    let field_max = (1usize << length_bits) - 1;
    let mut lo = 0;
    let mut hi = want.min(field_max);
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        if mode.data_bits_count(mid) <= data_avail {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Greedily packs the segments into as few structured-append shards as
/// possible at the given version and level. Long segments are split at
/// character boundaries, re-emitting the mode header in the continuation
/// shard; an active ECI header is re-emitted at the start of every
/// continuation shard.
///
/// The returned count is unbounded here; the caller enforces the symbol
/// limit.
fn shard_segments(
    segments: &[Segment],
    version: Version,
    ec_level: EcLevel,
) -> QrResult<Vec<Vec<Segment>>> {
    let capacity = bits::data_capacity_bits(version, ec_level)
        .checked_sub(bits::STRUCTURED_APPEND_BITS)
        .ok_or(QrError::CapacityExceeded)?;

    let mut shards: Vec<Vec<Segment>> = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut used = 0usize;
    let mut active_eci: Option<u32> = None;
    // Whether `current` holds nothing but a re-emitted ECI header yet.
    let mut reopened = false;

    for segment in segments {
        match segment {
            Segment::Eci(designator) => {
                let need = bits::eci_encoded_bits(*designator);
                if used + need > capacity {
                    if current.is_empty() || reopened {
                        return Err(QrError::CapacityExceeded);
                    }
                    shards.push(mem::take(&mut current));
                    used = 0;
                }
                if used + need > capacity {
                    return Err(QrError::CapacityExceeded);
                }
                current.push(Segment::Eci(*designator));
                used += need;
                active_eci = Some(*designator);
                reopened = false;
            }
            Segment::Data { mode, bytes } => {
                let bytes_per_char = mode.bytes_per_char();
                let total_chars = bytes.len() / bytes_per_char;
                let mut offset = 0;
                while offset < total_chars {
                    let take =
                        max_chars(*mode, version, capacity - used, total_chars - offset);
                    if take == 0 {
                        if current.is_empty() || reopened {
                            return Err(QrError::CapacityExceeded);
                        }
                        shards.push(mem::take(&mut current));
                        used = 0;
                        if let Some(designator) = active_eci {
                            let need = bits::eci_encoded_bits(designator);
                            if need > capacity {
                                return Err(QrError::CapacityExceeded);
                            }
                            current.push(Segment::Eci(designator));
                            used = need;
                        }
                        reopened = true;
                        continue;
                    }
                    let chunk =
                        bytes[offset * bytes_per_char..(offset + take) * bytes_per_char].to_vec();
                    used += bits::segment_encoded_bits(*mode, version, take);
                    current.push(Segment::Data {
                        mode: *mode,
                        bytes: chunk,
                    });
                    offset += take;
                    reopened = false;
                }
            }
        }
    }
    if !current.is_empty() || shards.is_empty() {
        shards.push(current);
    }
    Ok(shards)
}

/// Chooses the version and shard layout for the accumulated segments.
///
/// With an explicit version the data either fits one symbol, is sharded at
/// that version, or fails. With automatic selection the smallest version
/// holding everything in one symbol wins; only when even version 40
/// overflows does the message become a structured-append sequence.
///
/// # Errors
///
/// - `QrError::CapacityExceeded` if `max_symbols` is 1 and the data
///   overflows, or if a single character cannot fit any shard.
/// - `QrError::TooManySymbols` if sharding needs more than `max_symbols`
///   symbols.
pub fn select_plan(
    segments: &[Segment],
    explicit_version: Option<Version>,
    ec_level: EcLevel,
    max_symbols: usize,
) -> QrResult<SplitPlan> {
    debug_assert!((1..=16).contains(&max_symbols));

    let single = |version: Version| SplitPlan {
        version,
        shards: vec![segments.to_vec()],
    };

    if let Some(version) = explicit_version {
        if total_encoded_bits(segments, version) <= bits::data_capacity_bits(version, ec_level) {
            return Ok(single(version));
        }
        if max_symbols == 1 {
            return Err(QrError::CapacityExceeded);
        }
        let shards = shard_segments(segments, version, ec_level)?;
        if shards.len() > max_symbols {
            return Err(QrError::TooManySymbols);
        }
        Ok(SplitPlan { version, shards })
    } else {
        for v in 1..=40 {
            let version = Version::new(v)?;
            if total_encoded_bits(segments, version)
                <= bits::data_capacity_bits(version, ec_level)
            {
                return Ok(single(version));
            }
        }
        if max_symbols == 1 {
            return Err(QrError::CapacityExceeded);
        }
        let shards = shard_segments(segments, Version::MAX, ec_level)?;
        if shards.len() > max_symbols {
            return Err(QrError::TooManySymbols);
        }
        Ok(SplitPlan {
            version: Version::MAX,
            shards,
        })
    }
}
