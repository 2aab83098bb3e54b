use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// One line of a decklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckEntry {
    pub quantity: u64,
    pub name: String,
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
}

fn qty_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s+(.+)").expect("valid quantity pattern"))
}

// "(SET) 123" suffix; collector numbers may carry a promo "p" prefix.
fn set_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s\((\w{3,5})\)\s+(p?\w+)\b").expect("valid set/number pattern")
    })
}

/// Parses a pasted decklist, one `<qty> <name> [(SET) <number>]` per line.
///
/// Blank lines, `//` comments and lines without a leading quantity (section
/// headers such as `SIDEBOARD:`) are skipped. Trailing markers like `*F*`
/// are ignored.
pub fn parse_decklist(decklist: &str) -> Vec<DeckEntry> {
    let normalized = decklist.replace("\r\n", "\n");
    let mut entries = Vec::new();

    for raw_line in normalized.trim().lines() {
        let line = raw_line
            .trim()
            .replace(['\u{2019}', '\u{2018}'], "'")
            .replace(" / ", " // ");

        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        match parse_line(&line) {
            Some(entry) => entries.push(entry),
            None => tracing::debug!("Skipping unparsable line: {}", line),
        }
    }

    entries
}

fn parse_line(line: &str) -> Option<DeckEntry> {
    let mut name_part = line;
    let mut set_code = None;
    let mut collector_number = None;

    if let Some(caps) = set_number_regex().captures(line) {
        set_code = Some(caps[1].to_string());
        collector_number = Some(caps[2].trim().to_string());
        let start = caps.get(0).map(|m| m.start()).unwrap_or(line.len());
        name_part = line[..start].trim();
    }

    let caps = qty_name_regex().captures(name_part)?;
    // 只有溢位才會失敗
    let quantity = caps[1].parse::<u64>().unwrap_or(u64::MAX);
    let name: String = caps[2].trim().nfc().collect();

    Some(DeckEntry {
        quantity,
        name,
        set_code,
        collector_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_decklist() {
        let decklist = "
1 Amalia Benavides Aguirre (LCI) 299
1 Sol Ring (2ED) 270
1 Sorin of House Markov / Sorin, Ravenous Neonate (MH3) 470 *F*
4 Swamp (NEO) 298 *F*
1 Totec\u{2019}s Spear (SLD) 1505 *F*

SIDEBOARD:
1 Food (SLD) 1938 *F*
";
        let entries = parse_decklist(decklist);

        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].name, "Amalia Benavides Aguirre");
        assert_eq!(entries[0].set_code.as_deref(), Some("LCI"));
        assert_eq!(entries[0].collector_number.as_deref(), Some("299"));
        assert_eq!(
            entries[2].name,
            "Sorin of House Markov // Sorin, Ravenous Neonate"
        );
        assert_eq!(entries[2].collector_number.as_deref(), Some("470"));
        assert_eq!(entries[3].quantity, 4);
        assert_eq!(entries[4].name, "Totec's Spear");
        assert_eq!(entries[5].name, "Food");
    }

    #[test]
    fn test_parse_oversized_quantities() {
        let entries = parse_decklist("4000000000 Island\n99999999999999999999999 Swamp");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].quantity, 4_000_000_000);
        assert_eq!(entries[1].quantity, u64::MAX);
        assert_eq!(entries[1].name, "Swamp");
    }

    #[test]
    fn test_parse_without_set_suffix() {
        let entries = parse_decklist("2 Lightning Bolt\r\n1 Counterspell");
        assert_eq!(
            entries[0],
            DeckEntry {
                quantity: 2,
                name: "Lightning Bolt".to_string(),
                set_code: None,
                collector_number: None,
            }
        );
        assert_eq!(entries[1].name, "Counterspell");
    }

    #[test]
    fn test_promo_collector_number() {
        let entries = parse_decklist("1 Sol Ring (PLST) p123");
        assert_eq!(entries[0].set_code.as_deref(), Some("PLST"));
        assert_eq!(entries[0].collector_number.as_deref(), Some("p123"));
    }

    #[test]
    fn test_comments_and_headers_are_skipped() {
        let entries = parse_decklist("// Commander\nDeck\n\n1 Sol Ring");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Sol Ring");
    }

    #[test]
    fn test_names_are_nfc_normalized() {
        // "e" + combining acute accent
        let entries = parse_decklist("1 Se\u{301}ance");
        assert_eq!(entries[0].name, "S\u{e9}ance");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_decklist("   \n\n").is_empty());
    }
}
