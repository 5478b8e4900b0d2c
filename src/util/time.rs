use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc2822},
    macros::format_description,
};

use crate::error::{Error, Result};

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Formats `at` as an RFC 1123 date in GMT, the form the Date header carries.
pub(crate) fn http_date(at: OffsetDateTime) -> Result<String> {
    at.to_offset(UtcOffset::UTC)
        .format(HTTP_DATE)
        .map_err(|e| Error::signing(format!("failed to format request date: {e}")))
}

pub(crate) fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    PrimitiveDateTime::parse(value, HTTP_DATE)
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| OffsetDateTime::parse(value, &Rfc2822))
        .ok()
}

pub(crate) fn now_with_offset(offset_millis: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() + time::Duration::milliseconds(offset_millis)
}
