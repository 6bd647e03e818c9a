//! Lookup address for a character page

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `{base}/character/{region}/{server}/{character}?zone={zone}`, each path
/// segment trimmed and percent-encoded on its own.
pub fn character_url(
    base: &str,
    region: &str,
    server: &str,
    character: &str,
    zone_id: &str,
) -> String {
    format!(
        "{}/character/{}/{}/{}?zone={}",
        base.trim_end_matches('/'),
        encode_segment(region),
        encode_segment(server),
        encode_segment(character),
        encode_segment(zone_id),
    )
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment.trim(), SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.warcraftlogs.com";

    #[test]
    fn plain_names() {
        assert_eq!(
            character_url(BASE, "cn", "Illidan", "Stormrage", "45"),
            "https://www.warcraftlogs.com/character/cn/Illidan/Stormrage?zone=45"
        );
    }

    #[test]
    fn encodes_spaces_punctuation_and_cjk() {
        let url = character_url(BASE, "cn", " White Bear ", "Tom/Jerry's?", "45");
        assert_eq!(
            url,
            "https://www.warcraftlogs.com/character/cn/White%20Bear/Tom%2FJerry%27s%3F?zone=45"
        );

        let url = character_url(BASE, "cn", "燃烧之刃", "法师", "45");
        assert_eq!(
            url,
            "https://www.warcraftlogs.com/character/cn/%E7%87%83%E7%83%A7%E4%B9%8B%E5%88%83/%E6%B3%95%E5%B8%88?zone=45"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        assert_eq!(
            character_url("https://example.test/", "cn", "S", "C", "1"),
            "https://example.test/character/cn/S/C?zone=1"
        );
    }
}
