use bling_deck::catalog::store::write_card_database;
use bling_deck::catalog::{analyze_decklist, CardService, CardStore, ScryfallClient};
use bling_deck::domain::model::CardRow;
use bling_deck::BlingError;
use httpmock::prelude::*;
use std::time::Duration;
use tempfile::TempDir;

fn card(id: &str, name: &str, real_name: &str, set: &str, number: &str, usd: Option<f64>, foil: Option<f64>) -> CardRow {
    CardRow {
        id: id.to_string(),
        name: name.to_string(),
        real_name: real_name.to_string(),
        set_code: set.to_string(),
        collector_number: number.to_string(),
        image_uri_normal: Some(format!("https://img/{}.jpg", id)),
        scryfall_uri: format!("https://scryfall.com/card/{}/{}", set, number),
        price_usd: usd,
        price_foil: foil,
    }
}

fn seed_database(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("cards.db");
    write_card_database(
        &path,
        &[
            card("ss-thb", "Shadowspear", "Shadowspear", "thb", "236", Some(1.1), Some(2.5)),
            card("ss-sld", "Totec's Spear", "Shadowspear", "sld", "1505", Some(24.0), None),
            card("sr-c21", "Sol Ring", "Sol Ring", "c21", "263", Some(1.5), Some(5.0)),
            card("sr-ltc", "Sol Ring", "Sol Ring", "ltc", "284", Some(1.0), Some(3.0)),
            card(
                "brazen",
                "Brazen Borrower // Petty Theft",
                "Brazen Borrower // Petty Theft",
                "eld",
                "39",
                Some(20.0),
                Some(35.0),
            ),
        ],
        1000,
    )
    .unwrap();
    path
}

#[tokio::test]
async fn test_user_decklist_analysis() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let service = CardService::new(CardStore::open(&path).unwrap(), None);

    let decklist = "1 Totec’s Spear (SLD) 1505\r\n\
                    1 Brazen Borrower / Petty Theft\r\n\
                    // comment line\r\n\
                    4 Sol Ring (LTC) 284\r\n\
                    \r\n\
                    SIDEBOARD:\r\n";
    let report = analyze_decklist(&service, decklist).await.unwrap();

    assert_eq!(report.total_cards_requested, 6);
    assert_eq!(report.results.len(), 3);

    let spear = &report.results[0];
    assert_eq!(spear.original_card_info, "1x Totec's Spear");
    assert_eq!(spear.printings.len(), 2);
    // foil price first; the printing without foil price sorts last
    assert_eq!(spear.printings[0].id, "ss-thb");
    assert_eq!(spear.original_card_id.as_deref(), Some("ss-sld"));

    let brazen = &report.results[1];
    assert!(brazen.error.is_none());
    assert_eq!(brazen.original_card_id.as_deref(), Some("brazen"));

    let sol_ring = &report.results[2];
    assert_eq!(sol_ring.original_card_info, "4x Sol Ring");
    assert_eq!(sol_ring.printings[0].id, "sr-ltc");
    assert_eq!(sol_ring.original_card_id.as_deref(), Some("sr-ltc"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][0]["original_card_id"], "ss-sld");
}

#[tokio::test]
async fn test_missing_card_falls_back_to_scryfall() {
    let server = MockServer::start();
    let search_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/cards/search")
            .query_param("q", "!\"Tarmogoyf\" unique:prints")
            .query_param("order", "usd");
        then.status(200).json_body(serde_json::json!({
            "object": "list",
            "data": [
                {
                    "id": "goyf-mm3", "name": "Tarmogoyf", "set": "mm3", "collector_number": "126",
                    "scryfall_uri": "https://scryfall.com/card/mm3/126",
                    "image_uris": {"normal": "https://img/goyf.jpg"},
                    "prices": {"usd": "14.00", "usd_foil": "30.00"}
                },
                {
                    "id": "goyf-noimg", "name": "Tarmogoyf", "set": "xxx", "collector_number": "1",
                    "scryfall_uri": "https://scryfall.com/card/xxx/1"
                }
            ]
        }));
    });
    let unknown_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/cards/search")
            .query_param("q", "!\"Not A Card\" unique:prints");
        then.status(404).json_body(serde_json::json!({"object": "error", "code": "not_found"}));
    });

    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let client = ScryfallClient::new(server.base_url())
        .unwrap()
        .with_request_delay(Duration::ZERO);
    let service = CardService::new(CardStore::open(&path).unwrap(), Some(client));

    let report = analyze_decklist(&service, "1 Tarmogoyf\n2 Not A Card")
        .await
        .unwrap();

    search_mock.assert();
    unknown_mock.assert();

    let goyf = &report.results[0];
    assert_eq!(goyf.printings.len(), 1);
    assert_eq!(goyf.printings[0].real_name, "Tarmogoyf");
    assert_eq!(goyf.original_card_id.as_deref(), Some("goyf-mm3"));

    let missing = &report.results[1];
    assert!(missing.printings.is_empty());
    assert!(missing
        .error
        .as_deref()
        .unwrap()
        .starts_with("Could not find any printings for 'Not A Card'"));
}

#[tokio::test]
async fn test_empty_decklist_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let service = CardService::new(CardStore::open(&path).unwrap(), None);

    let err = analyze_decklist(&service, "  \n\n").await.unwrap_err();

    assert!(matches!(err, BlingError::ValidationError { .. }));
    assert!(err.to_string().contains("Could not parse any cards"));
}

#[test]
fn test_missing_database_is_fatal() {
    let dir = TempDir::new().unwrap();
    let result = CardStore::open(&dir.path().join("missing.db"));

    assert!(matches!(result, Err(BlingError::DatabaseMissing { .. })));
}
