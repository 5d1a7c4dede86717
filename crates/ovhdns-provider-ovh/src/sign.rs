//! OVH request signature
//!
//! `"$1$" + sha1_hex(secret + "+" + consumer + "+" + METHOD + "+" + url + "+" + body + "+" + timestamp)`
//!
//! The url is the full URL sent on the wire, query string included.

use sha1::{Digest, Sha1};

pub(crate) fn signature(
    application_secret: &str,
    consumer_key: &str,
    method: &str,
    url: &str,
    body: &str,
    timestamp: i64,
) -> String {
    let payload = format!(
        "{application_secret}+{consumer_key}+{method}+{url}+{body}+{timestamp}"
    );
    format!("$1${}", hex::encode(Sha1::digest(payload.as_bytes())))
}
