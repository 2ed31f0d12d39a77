//! `Accept` header negotiation.
//!
//! Policy:
//! - a missing or unparsable `q` parameter weighs 1.0;
//! - parsed weights are clamped into `[0, 1]`;
//! - ranges with weight 0 are not acceptable and are dropped;
//! - whitespace around `;` is ignored;
//! - ranges the media type parser rejects keep the raw token before the
//!   first `;`, lowercased, and still honour a `q` parameter;
//! - sorting is stable, so equal weights keep the order they were listed in.

use axum::http::HeaderValue;
use mime::Mime;

/// One media range of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    essence: String,
    quality: f32,
}

impl MediaRange {
    /// The media type without parameters, lowercased (`text/html`).
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }
}

/// Split header values into media ranges, in the order they were listed.
pub fn parse_accept<'a>(values: impl IntoIterator<Item = &'a HeaderValue>) -> Vec<MediaRange> {
    values
        .into_iter()
        .flat_map(|value| {
            String::from_utf8_lossy(value.as_bytes())
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(parse_range)
                .collect::<Vec<_>>()
        })
        .filter(|range| range.quality > 0.0)
        .collect()
}

/// Media ranges sorted by descending weight; ties keep their listed order.
pub fn sorted_by_quality<'a>(
    values: impl IntoIterator<Item = &'a HeaderValue>,
) -> Vec<MediaRange> {
    let mut ranges = parse_accept(values);
    ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    ranges
}

fn parse_range(entry: &str) -> MediaRange {
    let parts: Vec<&str> = entry.split(';').map(str::trim).collect();
    match parts.join(";").parse::<Mime>() {
        Ok(mime) => MediaRange {
            essence: mime.essence_str().to_ascii_lowercase(),
            quality: mime
                .get_param("q")
                .map(|q| parse_quality(q.as_str()))
                .unwrap_or(1.0),
        },
        Err(_) => MediaRange {
            essence: parts.first().copied().unwrap_or_default().to_ascii_lowercase(),
            quality: parts[1..]
                .iter()
                .filter_map(|param| param.split_once('='))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
                .map(|(_, value)| parse_quality(value))
                .unwrap_or(1.0),
        },
    }
}

fn parse_quality(raw: &str) -> f32 {
    match raw.trim().parse::<f32>() {
        Ok(q) if q.is_finite() => q.clamp(0.0, 1.0),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn essences(header: &'static str) -> Vec<String> {
        sorted_by_quality([&HeaderValue::from_static(header)])
            .into_iter()
            .map(|r| r.essence)
            .collect()
    }

    #[test]
    fn test_higher_quality_first() {
        assert_eq!(
            essences("application/xml;q=0.9, application/json;q=1.0"),
            vec!["application/json", "application/xml"]
        );
    }

    #[test]
    fn test_ties_keep_listed_order() {
        assert_eq!(
            essences("text/html, application/json, */*;q=0.1"),
            vec!["text/html", "application/json", "*/*"]
        );
    }

    #[test]
    fn test_malformed_quality_defaults_to_one() {
        let ranges = sorted_by_quality([&HeaderValue::from_static(
            "text/plain;q=0.5, application/json;q=abc",
        )]);
        assert_eq!(ranges[0].essence(), "application/json");
        assert_eq!(ranges[0].quality(), 1.0);
    }

    #[test]
    fn test_zero_quality_is_dropped() {
        assert_eq!(essences("text/html;q=0, application/json"), vec!["application/json"]);
    }

    #[test]
    fn test_unparsable_range_keeps_raw_token() {
        assert_eq!(essences("JSON;level=1"), vec!["json"]);
    }

    #[test]
    fn test_whitespace_before_parameters() {
        let ranges = sorted_by_quality([&HeaderValue::from_static(
            "text/html ; q=0.1, application/json;q=0.9",
        )]);
        assert_eq!(ranges[0].essence(), "application/json");
        assert_eq!(ranges[1].essence(), "text/html");
        assert_eq!(ranges[1].quality(), 0.1);
    }

    #[test]
    fn test_unparsable_range_keeps_quality() {
        let ranges = sorted_by_quality([&HeaderValue::from_static("JSON;q=0.2, text/html;q=0.5")]);
        assert_eq!(ranges[0].essence(), "text/html");
        assert_eq!(ranges[1].essence(), "json");
        assert_eq!(ranges[1].quality(), 0.2);
    }

    #[test]
    fn test_multiple_header_values() {
        let first = HeaderValue::from_static("text/html;q=0.4");
        let second = HeaderValue::from_static("application/json");
        let ranges = sorted_by_quality([&first, &second]);
        assert_eq!(ranges[0].essence(), "application/json");
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn test_case_is_normalized() {
        assert_eq!(essences("Application/JSON"), vec!["application/json"]);
    }
}
