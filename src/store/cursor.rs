// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::error::{GraphError, Result};
use crate::store::adjacency::AdjEntry;

const LIST_TAG: &str = "p";
const MUTUAL_TAG: &str = "m";

/// Opaque cursor for followers/following/blocked/muted list pagination.
/// Encodes the position of the last returned entry; iteration resumes
/// strictly after it, which keeps pages stable under concurrent insertion
/// (new entries sort before the cursor position and never shift what was
/// already returned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCursor {
    pub position: AdjEntry,
}

impl ListCursor {
    pub fn encode(entry: &AdjEntry) -> String {
        encode_parts(&[
            LIST_TAG,
            &entry.created_at.timestamp_micros().to_string(),
            &entry.user_id,
        ])
    }

    pub fn decode(token: &str) -> Result<Self> {
        let parts = decode_parts(token, 3)?;
        if parts[0] != LIST_TAG {
            return Err(malformed(token));
        }
        Ok(ListCursor {
            position: AdjEntry {
                created_at: parse_micros(&parts[1], token)?,
                user_id: parts[2].clone(),
            },
        })
    }
}

/// Cursor for mutual-friend pagination. Also pins which user's following
/// set drives the intersection, so later pages keep the first page's
/// ordering even if the two sets change size relative to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutualCursor {
    /// True when `b`'s following set drives the iteration.
    pub drive_b: bool,
    pub position: AdjEntry,
}

impl MutualCursor {
    pub fn encode(drive_b: bool, entry: &AdjEntry) -> String {
        encode_parts(&[
            MUTUAL_TAG,
            if drive_b { "b" } else { "a" },
            &entry.created_at.timestamp_micros().to_string(),
            &entry.user_id,
        ])
    }

    pub fn decode(token: &str) -> Result<Self> {
        let parts = decode_parts(token, 4)?;
        if parts[0] != MUTUAL_TAG {
            return Err(malformed(token));
        }
        let drive_b = match parts[1].as_str() {
            "a" => false,
            "b" => true,
            _ => return Err(malformed(token)),
        };
        Ok(MutualCursor {
            drive_b,
            position: AdjEntry {
                created_at: parse_micros(&parts[2], token)?,
                user_id: parts[3].clone(),
            },
        })
    }
}

fn encode_parts(parts: &[&str]) -> String {
    URL_SAFE_NO_PAD.encode(parts.join(":"))
}

fn decode_parts(token: &str, expected: usize) -> Result<Vec<String>> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| malformed(token))?;
    let decoded = String::from_utf8(raw).map_err(|_| malformed(token))?;
    let parts: Vec<String> = decoded.splitn(expected, ':').map(String::from).collect();
    if parts.len() != expected {
        return Err(malformed(token));
    }
    Ok(parts)
}

fn parse_micros(value: &str, token: &str) -> Result<DateTime<Utc>> {
    let micros: i64 = value.parse().map_err(|_| malformed(token))?;
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| malformed(token))
}

fn malformed(token: &str) -> GraphError {
    GraphError::InvalidArgument(format!("malformed pagination cursor: {}", token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn list_cursor_round_trips() {
        let entry = AdjEntry::new("user:with:colons", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let token = ListCursor::encode(&entry);
        let decoded = ListCursor::decode(&token).unwrap();
        assert_eq!(decoded.position, entry);
    }

    #[test]
    fn mutual_cursor_round_trips_drive_side() {
        let entry = AdjEntry::new("carol", Utc.timestamp_opt(42, 0).unwrap());
        let token = MutualCursor::encode(true, &entry);
        let decoded = MutualCursor::decode(&token).unwrap();
        assert!(decoded.drive_b);
        assert_eq!(decoded.position, entry);
    }

    #[test]
    fn garbage_tokens_are_invalid_argument() {
        assert!(matches!(
            ListCursor::decode("not-base64!!"),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            ListCursor::decode(&URL_SAFE_NO_PAD.encode("p:abc")),
            Err(GraphError::InvalidArgument(_))
        ));
        // A mutual cursor is not a list cursor.
        let entry = AdjEntry::new("x", Utc::now());
        assert!(ListCursor::decode(&MutualCursor::encode(false, &entry)).is_err());
    }
}
