//! Timestamp helpers for `AuditEvent.period` and `recorded`.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Render an [`OffsetDateTime`] as a FHIR `instant` (RFC 3339, UTC).
pub fn to_fhir_instant(ts: OffsetDateTime) -> String {
    ts.to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| ts.to_string())
}

/// Current instant, for `AuditEvent.recorded` and the end of `period`.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
