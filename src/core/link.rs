//! RFC 5988 `Link` header parsing.
//!
//! Memento playback responses carry a `Link` header enumerating related
//! resources: the original URL, the timemap, and first/prev/next/last
//! mementos. Entries look like
//! `<http://example.com/>; rel="original", <https://web.archive.org/...>;
//! rel="prev memento"; datetime="Thu, 16 Aug 2018 11:19:11 GMT"`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::data::Link;

/// Parse a `Link` header value into a map keyed by relation type.
///
/// Relation strings such as `"first memento"` are kept whole. Entries
/// without a `rel` parameter are dropped; a later entry with the same `rel`
/// wins.
pub(crate) fn parse_link_header(value: &str) -> BTreeMap<String, Link> {
    let mut links = BTreeMap::new();
    for entry in split_entries(value) {
        if let Some(link) = parse_entry(&entry) {
            links.insert(link.rel.clone(), link);
        }
    }
    links
}

/// Split a header value on the commas that separate link entries, ignoring
/// commas inside `<...>` targets and quoted parameter values.
fn split_entries(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_target = false;
    let mut in_quotes = false;
    for ch in value.chars() {
        match ch {
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            '"' if !in_target => in_quotes = !in_quotes,
            ',' if !in_target && !in_quotes => {
                if !current.trim().is_empty() {
                    entries.push(current.trim().to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        entries.push(current.trim().to_string());
    }
    entries
}

fn parse_entry(entry: &str) -> Option<Link> {
    let mut parts = entry.split(';');
    let target = parts.next()?.trim();
    let url = target.strip_prefix('<')?.strip_suffix('>')?.to_string();

    let mut rel = None;
    let mut datetime = None;
    for param in parts {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match name.trim().to_ascii_lowercase().as_str() {
            "rel" => rel = Some(value.to_string()),
            "datetime" => datetime = parse_link_datetime(value),
            _ => {}
        }
    }

    Some(Link {
        url,
        rel: rel?,
        datetime,
    })
}

fn parse_link_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const HEADER: &str = "<http://www.noaa.gov/>; rel=\"original\", \
         <https://web.archive.org/web/timemap/link/http://www.noaa.gov/>; rel=\"timemap\"; type=\"application/link-format\", \
         <https://web.archive.org/web/19961101000000/http://www.noaa.gov/>; rel=\"first memento\"; datetime=\"Fri, 01 Nov 1996 00:00:00 GMT\", \
         <https://web.archive.org/web/20180731235941/http://www.noaa.gov/>; rel=\"prev memento\"; datetime=\"Tue, 31 Jul 2018 23:59:41 GMT\", \
         <https://web.archive.org/web/20180801000000/http://www.noaa.gov/>; rel=\"memento\"; datetime=\"Wed, 01 Aug 2018 00:00:00 GMT\"";

    #[test]
    fn test_parse_memento_links() {
        let links = parse_link_header(HEADER);
        assert_eq!(links.len(), 5);
        assert_eq!(links["original"].url, "http://www.noaa.gov/");
        assert_eq!(links["original"].datetime, None);
        assert_eq!(
            links["first memento"].datetime,
            Some(Utc.with_ymd_and_hms(1996, 11, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            links["prev memento"].url,
            "https://web.archive.org/web/20180731235941/http://www.noaa.gov/"
        );
    }

    #[test]
    fn test_comma_inside_target_url() {
        let links =
            parse_link_header("<http://example.com/a,b>; rel=\"original\", <http://example.com/t>; rel=\"timemap\"");
        assert_eq!(links["original"].url, "http://example.com/a,b");
        assert_eq!(links["timemap"].url, "http://example.com/t");
    }

    #[test]
    fn test_entry_without_rel_is_dropped() {
        let links = parse_link_header("<http://example.com/>; type=\"text/html\"");
        assert!(links.is_empty());
    }

    #[test]
    fn test_empty_header() {
        assert!(parse_link_header("").is_empty());
    }
}
