//! Freshness decision logic.
//!
//! Compares an entry's stored change-detection state against the
//! conditional headers of a fresh response and decides whether the remote
//! content changed and which field to record. Pure logic; the sweep
//! applies the side effects.

use chrono::DateTime;

/// Outcome of comparing a response's freshness signals against stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Signals match the stored state; nothing to record.
    Unchanged,
    /// Last-Modified parsed to a timestamp newer than the stored one.
    ChangedByModified { modified: i64 },
    /// No Last-Modified, but the ETag differs from the stored one.
    ChangedByEtag { etag: String },
    /// The response carries neither Last-Modified nor ETag.
    NoSignal,
}

/// Decide whether an entry changed, from its stored state and the
/// response's `Last-Modified` / `ETag` header values.
///
/// The ETag is consulted only when Last-Modified is entirely absent, even
/// if both headers are present and the ETag changed. Last-Modified values
/// are HTTP-dates (RFC 2822 fixdate); a failed parse propagates so the
/// caller can report it. The timestamp comparison is strict at
/// unix-seconds granularity, so an equal timestamp never re-records.
pub fn evaluate(
    stored_modified: i64,
    stored_etag: &str,
    last_modified: Option<&str>,
    etag: Option<&str>,
) -> Result<Freshness, chrono::ParseError> {
    let Some(modified_text) = last_modified else {
        return Ok(match etag {
            None => Freshness::NoSignal,
            Some(new_etag) if new_etag != stored_etag => Freshness::ChangedByEtag {
                etag: new_etag.to_string(),
            },
            Some(_) => Freshness::Unchanged,
        });
    };

    let parsed = DateTime::parse_from_rfc2822(modified_text)?.timestamp();
    if stored_modified < parsed {
        Ok(Freshness::ChangedByModified { modified: parsed })
    } else {
        Ok(Freshness::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OCT_21_2015: &str = "Wed, 21 Oct 2015 07:28:00 GMT";
    const OCT_21_2015_UNIX: i64 = 1_445_412_480;

    #[test]
    fn no_headers_is_no_signal() {
        let result = evaluate(0, "", None, None).unwrap();
        assert_eq!(result, Freshness::NoSignal);
    }

    #[test]
    fn new_etag_without_last_modified_changes() {
        let result = evaluate(0, "", None, Some("\"abc\"")).unwrap();
        assert_eq!(
            result,
            Freshness::ChangedByEtag {
                etag: "\"abc\"".to_string()
            }
        );
    }

    #[test]
    fn equal_etag_without_last_modified_is_unchanged() {
        let result = evaluate(0, "\"abc\"", None, Some("\"abc\"")).unwrap();
        assert_eq!(result, Freshness::Unchanged);
    }

    #[test]
    fn newer_last_modified_changes() {
        let result = evaluate(0, "", Some(OCT_21_2015), None).unwrap();
        assert_eq!(
            result,
            Freshness::ChangedByModified {
                modified: OCT_21_2015_UNIX
            }
        );
    }

    #[test]
    fn equal_last_modified_is_unchanged() {
        let result = evaluate(OCT_21_2015_UNIX, "", Some(OCT_21_2015), None).unwrap();
        assert_eq!(result, Freshness::Unchanged);
    }

    #[test]
    fn older_last_modified_is_unchanged() {
        let result = evaluate(OCT_21_2015_UNIX + 60, "", Some(OCT_21_2015), None).unwrap();
        assert_eq!(result, Freshness::Unchanged);
    }

    #[test]
    fn both_headers_present_prefers_last_modified() {
        // the etag differs but the stored timestamp is current, so the
        // etag branch must not run
        let result = evaluate(
            OCT_21_2015_UNIX,
            "\"old\"",
            Some(OCT_21_2015),
            Some("\"new\""),
        )
        .unwrap();
        assert_eq!(result, Freshness::Unchanged);
    }

    #[test]
    fn unparseable_last_modified_is_an_error() {
        let result = evaluate(0, "", Some("not a date"), None);
        assert!(result.is_err());
    }

    #[test]
    fn unparseable_last_modified_with_etag_still_errors() {
        // Last-Modified present but garbage must not fall back to the etag
        let result = evaluate(0, "", Some("garbage"), Some("\"abc\""));
        assert!(result.is_err());
    }
}
