//! Default User-Agent string for probe and transfer requests.

/// Default User-Agent (tool name and crate version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("rangeload/{version}")
}
