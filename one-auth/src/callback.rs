//! Redirect callback parameter extraction.

use std::collections::HashMap;

/// Key/value pairs carried by a redirect callback URI.
pub type CallbackParameters = HashMap<String, String>;

/// Extract the parameters of a redirect callback URI.
///
/// The fragment is used when present, otherwise the query. Entries are split on
/// `&` and then `=`; an entry that does not yield exactly a key and a value is
/// dropped, and a repeated key keeps its last value. Keys and values are
/// percent-decoded when they decode to valid UTF-8.
///
/// This never fails: a missing or malformed URI yields whatever could be parsed.
pub fn values_from_uri(uri: Option<&str>) -> CallbackParameters {
    let Some(uri) = uri else {
        return CallbackParameters::new();
    };

    let component = match uri.split_once('#') {
        Some((_, fragment)) => fragment,
        None => uri.split_once('?').map(|(_, query)| query).unwrap_or(""),
    };

    as_map(component)
}

fn as_map(value_string: &str) -> CallbackParameters {
    let mut values = CallbackParameters::new();
    for entry in value_string.split('&').filter(|entry| !entry.is_empty()) {
        let mut pair: Vec<&str> = entry.split('=').collect();
        // Trailing empty pieces do not count, so `key=` has no value.
        while pair.last().is_some_and(|piece| piece.is_empty()) {
            pair.pop();
        }
        if let [key, value] = pair.as_slice() {
            values.insert(decode(key), decode(value));
        }
    }
    values
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
