//! Interpretation of `DTEUpload` responses.
//!
//! ```xml
//! <RECEPCIONDTE>
//!   <RUTSENDER>11111111</RUTSENDER>
//!   <STATUS>0</STATUS>
//!   <TRACKID>0123456789</TRACKID>
//! </RECEPCIONDTE>
//! ```
//!
//! A non-zero `STATUS` may come with `DETAIL/ERROR` lines.

use crate::error::{SubmissionError, SubmissionResult};
use crate::xml::XmlDocument;
use serde_json::Value;
use std::fmt;

/// Tracking id assigned by the SII to an accepted upload. `0` means the
/// service accepted the file without returning one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_absent(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message for a non-zero status. `certificate_id` names the sending user
/// in the permission and authentication messages.
pub fn status_message(status: i64, certificate_id: &str) -> String {
    match status {
        1 => format!("User {} is not allowed to upload XML documents to the SII.", certificate_id),
        2 => "The size of the uploaded XML file is wrong, either too large or too small.".to_string(),
        3 => "The uploaded file is truncated, its size differs from the \"size\" parameter.".to_string(),
        5 => format!("User {} is not authenticated (the token may have expired).", certificate_id),
        6 => "The company is not authorized to upload XML documents to the SII.".to_string(),
        7 => "The XML schema is invalid.".to_string(),
        8 => "There is an error in the signature of the XML document.".to_string(),
        9 => "The SII servers are having internal problems.".to_string(),
        99 => "The uploaded XML was already received by the SII.".to_string(),
        other => format!("The upload failed with status code \"{}\", which is unknown.", other),
    }
}

/// Turns a response body into a tracking id or the matching error.
pub fn interpret(body: &str, certificate_id: &str) -> SubmissionResult<TrackId> {
    let tree = XmlDocument::parse(body.trim())
        .and_then(|doc| doc.to_value())
        .map_err(|e| SubmissionError::Protocol(format!("The upload response is not valid XML: {}", e)))?;

    let reception = tree.get("RECEPCIONDTE");
    let status = reception
        .and_then(|r| r.get("STATUS"))
        .and_then(scalar)
        .ok_or_else(|| {
            SubmissionError::Protocol("The upload response does not carry a valid status code.".to_string())
        })?;
    let status: i64 = status.trim().parse().map_err(|_| {
        SubmissionError::Protocol(format!("The upload response status '{}' is not an integer.", status))
    })?;

    if status == 0 {
        let track_id = match reception.and_then(|r| r.get("TRACKID")).and_then(scalar) {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
                SubmissionError::Protocol(format!("The upload response track id '{}' is not an integer.", raw))
            })?,
            _ => 0,
        };
        return Ok(TrackId(track_id));
    }

    let details = detail_lines(&tree);
    let mut message = status_message(status, certificate_id);
    if !details.is_empty() {
        message.push(' ');
        message.push_str(&details.join(" "));
    }
    Err(SubmissionError::RemoteRejection {
        status,
        message,
        details,
    })
}

/// `DETAIL/ERROR` lines, at the root or inside `RECEPCIONDTE`.
fn detail_lines(tree: &Value) -> Vec<String> {
    let error = tree
        .get("DETAIL")
        .or_else(|| tree.get("RECEPCIONDTE").and_then(|r| r.get("DETAIL")))
        .and_then(|d| d.get("ERROR"));

    match error {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        Some(single) => scalar(single).into_iter().collect(),
        None => Vec::new(),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
