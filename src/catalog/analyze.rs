use crate::catalog::parser::{parse_decklist, DeckEntry};
use crate::catalog::service::CardService;
use crate::domain::model::CardRow;
use crate::utils::error::{BlingError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct CardAnalysis {
    pub original_card_info: String,
    pub original_card_id: Option<String>,
    pub printings: Vec<CardRow>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub results: Vec<CardAnalysis>,
    pub total_cards_requested: u64,
    pub duration_ms: f64,
}

impl AnalysisReport {
    pub fn time_per_card_ms(&self) -> f64 {
        if self.total_cards_requested == 0 {
            0.0
        } else {
            self.duration_ms / self.total_cards_requested as f64
        }
    }
}

/// Foil price first, then non-foil, ascending; a missing price sorts last.
pub fn compare_by_price(a: &CardRow, b: &CardRow) -> Ordering {
    let key = |card: &CardRow| {
        (
            card.price_foil.unwrap_or(f64::INFINITY),
            card.price_usd.unwrap_or(f64::INFINITY),
        )
    };
    let (a_foil, a_usd) = key(a);
    let (b_foil, b_usd) = key(b);
    a_foil.total_cmp(&b_foil).then(a_usd.total_cmp(&b_usd))
}

/// The printing the user listed, else the cheapest one.
fn pick_original(entry: &DeckEntry, printings: &[CardRow]) -> Option<String> {
    let listed = match (&entry.set_code, &entry.collector_number) {
        (Some(set_code), Some(number)) => printings.iter().find(|p| {
            p.set_code.eq_ignore_ascii_case(set_code) && &p.collector_number == number
        }),
        _ => None,
    };
    listed.or_else(|| printings.first()).map(|p| p.id.clone())
}

pub async fn analyze_decklist(service: &CardService, decklist: &str) -> Result<AnalysisReport> {
    let start = Instant::now();
    tracing::info!("Received decklist for analysis ({} bytes)", decklist.len());

    let entries = parse_decklist(decklist);
    if entries.is_empty() {
        tracing::info!(
            "Analysis completed in {:.2}ms. No cards parsed.",
            start.elapsed().as_secs_f64() * 1000.0
        );
        return Err(BlingError::ValidationError {
            message: "Could not parse any cards from the decklist. Please check the format."
                .to_string(),
        });
    }

    let mut results = Vec::with_capacity(entries.len());
    let mut total_cards_requested = 0u64;

    for entry in &entries {
        total_cards_requested = total_cards_requested.saturating_add(entry.quantity);
        let original_card_info = format!("{}x {}", entry.quantity, entry.name);
        let mut printings = service.find_card_printings_by_name(&entry.name).await?;

        if printings.is_empty() {
            results.push(CardAnalysis {
                original_card_info,
                original_card_id: None,
                printings,
                error: Some(format!(
                    "Could not find any printings for '{}'. It might be a new or unofficial card.",
                    entry.name
                )),
            });
            continue;
        }

        printings.sort_by(compare_by_price);
        let original_card_id = pick_original(entry, &printings);

        results.push(CardAnalysis {
            original_card_info,
            original_card_id,
            printings,
            error: None,
        });
    }

    let report = AnalysisReport {
        results,
        total_cards_requested,
        duration_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    tracing::info!(
        "Analysis completed in {:.2}ms. Total cards requested: {}. Time per card: {:.2}ms.",
        report.duration_ms,
        report.total_cards_requested,
        report.time_per_card_ms()
    );
    Ok(report)
}

/// One CSV row per printing; entries without printings get a single row
/// carrying the error.
pub fn write_report_csv<W: std::io::Write>(report: &AnalysisReport, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "card",
        "is_original",
        "id",
        "name",
        "set_code",
        "collector_number",
        "price_usd",
        "price_foil",
        "scryfall_uri",
        "error",
    ])?;

    let price = |p: Option<f64>| p.map(|v| format!("{:.2}", v)).unwrap_or_default();

    for result in &report.results {
        if result.printings.is_empty() {
            csv_writer.write_record([
                result.original_card_info.as_str(),
                "false",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                result.error.as_deref().unwrap_or(""),
            ])?;
            continue;
        }
        for p in &result.printings {
            let is_original = result.original_card_id.as_deref() == Some(p.id.as_str());
            csv_writer.write_record([
                result.original_card_info.as_str(),
                if is_original { "true" } else { "false" },
                p.id.as_str(),
                p.name.as_str(),
                p.set_code.as_str(),
                p.collector_number.as_str(),
                price(p.price_usd).as_str(),
                price(p.price_foil).as_str(),
                p.scryfall_uri.as_str(),
                "",
            ])?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::tests::row;
    use crate::catalog::store::{write_card_database, CardStore};
    use tempfile::TempDir;

    fn priced(id: &str, set: &str, number: &str, usd: Option<f64>, foil: Option<f64>) -> CardRow {
        let mut card = row(id, "Sol Ring", "Sol Ring", set, usd);
        card.collector_number = number.to_string();
        card.price_foil = foil;
        card
    }

    #[test]
    fn test_sort_foil_then_usd_with_missing_last() {
        let mut cards = vec![
            priced("none", "a", "1", None, None),
            priced("usd-only", "b", "2", Some(0.5), None),
            priced("foil-cheap", "c", "3", Some(9.0), Some(2.0)),
            priced("foil-pricey", "d", "4", Some(1.0), Some(30.0)),
            priced("foil-cheap-usd-cheaper", "e", "5", Some(1.0), Some(2.0)),
        ];

        cards.sort_by(compare_by_price);
        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();

        assert_eq!(
            ids,
            vec![
                "foil-cheap-usd-cheaper",
                "foil-cheap",
                "foil-pricey",
                "usd-only",
                "none"
            ]
        );
    }

    #[test]
    fn test_pick_original_matches_set_case_insensitively() {
        let printings = vec![
            priced("cheap", "c21", "263", Some(0.5), None),
            priced("listed", "2ed", "270", Some(90.0), None),
        ];
        let entry = DeckEntry {
            quantity: 1,
            name: "Sol Ring".to_string(),
            set_code: Some("2ED".to_string()),
            collector_number: Some("270".to_string()),
        };
        assert_eq!(pick_original(&entry, &printings).as_deref(), Some("listed"));

        let unknown = DeckEntry {
            set_code: Some("XXX".to_string()),
            ..entry
        };
        assert_eq!(pick_original(&unknown, &printings).as_deref(), Some("cheap"));
    }

    fn service(dir: &TempDir) -> CardService {
        let path = dir.path().join("cards.db");
        write_card_database(
            &path,
            &[
                priced("sr-2ed", "2ed", "270", Some(90.0), None),
                priced("sr-c21", "c21", "263", Some(0.5), Some(3.0)),
                row("ss-thb", "Shadowspear", "Shadowspear", "thb", Some(1.0)),
                row("ss-sld", "Totec's Spear", "Shadowspear", "sld", Some(25.0)),
            ],
            1000,
        )
        .unwrap();
        CardService::new(CardStore::open(&path).unwrap(), None)
    }

    #[tokio::test]
    async fn test_analyze_decklist() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let report = analyze_decklist(
            &service,
            "1 Sol Ring (2ED) 270\n1 Totec's Spear (SLD) 1\n3 Made Up Card\nSIDEBOARD:",
        )
        .await
        .unwrap();

        assert_eq!(report.total_cards_requested, 5);
        assert_eq!(report.results.len(), 3);

        let sol_ring = &report.results[0];
        assert_eq!(sol_ring.original_card_info, "1x Sol Ring");
        assert_eq!(sol_ring.original_card_id.as_deref(), Some("sr-2ed"));
        assert_eq!(sol_ring.printings[0].id, "sr-c21");

        let spear = &report.results[1];
        assert_eq!(spear.printings.len(), 2);
        assert_eq!(spear.original_card_id.as_deref(), Some("ss-sld"));

        let missing = &report.results[2];
        assert!(missing.printings.is_empty());
        assert!(missing.original_card_id.is_none());
        assert!(missing.error.as_deref().unwrap().contains("Made Up Card"));
    }

    #[tokio::test]
    async fn test_large_quantities_add_up_without_overflow() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let report = analyze_decklist(&service, "4000000000 Sol Ring\n4000000000 Shadowspear")
            .await
            .unwrap();
        assert_eq!(report.total_cards_requested, 8_000_000_000);
        assert_eq!(report.results[0].original_card_info, "4000000000x Sol Ring");

        let report = analyze_decklist(
            &service,
            "18446744073709551615 Sol Ring\n1 Shadowspear",
        )
        .await
        .unwrap();
        assert_eq!(report.total_cards_requested, u64::MAX);
        assert!(report.time_per_card_ms().is_finite());
    }

    #[tokio::test]
    async fn test_analyze_unparsable_decklist() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let result = analyze_decklist(&service, "SIDEBOARD:\nno quantities here").await;
        assert!(matches!(result, Err(BlingError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_csv_report_marks_original() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let report = analyze_decklist(&service, "1 Sol Ring (2ED) 270\n1 Nothing")
            .await
            .unwrap();

        let mut out = Vec::new();
        write_report_csv(&report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4); // header + 2 printings + 1 missing card
        assert!(lines[0].starts_with("card,is_original,id"));
        assert!(lines[1].starts_with("1x Sol Ring,false,sr-c21"));
        assert!(lines[2].starts_with("1x Sol Ring,true,sr-2ed"));
        assert!(lines[3].starts_with("1x Nothing,false"));
    }
}
