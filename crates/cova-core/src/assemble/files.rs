//! Export blobs wrapped as `data:` URIs.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::NaiveDateTime;

use crate::model::FileBlob;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const JSON_MIME: &str = "application/text";

/// Second-precision stamp used in export filenames, e.g. `2020-Mar-27_14.05.09`.
pub fn datestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%b-%d_%H.%M.%S").to_string()
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

pub fn blob(filename: String, mime: &str, bytes: &[u8]) -> FileBlob {
    FileBlob {
        filename,
        content: data_uri(mime, bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn stamp_has_second_precision() {
        let at = NaiveDate::from_ymd_opt(2020, 3, 27)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(datestamp(at), "2020-Mar-27_14.05.09");
    }

    #[test]
    fn uri_is_base64_payload() {
        assert_eq!(data_uri(JSON_MIME, b"{}"), "data:application/text;base64,e30=");
    }
}
