use serde::{Deserialize, Serialize};

/// A card object as it appears in Scryfall bulk data and search results.
///
/// Only the fields the card database uses are kept; everything else in the
/// (very large) bulk file is skipped by serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCard {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub printed_name: Option<String>,
    #[serde(default)]
    pub flavor_name: Option<String>,
    #[serde(default)]
    pub set: String,
    #[serde(default)]
    pub collector_number: String,
    #[serde(default)]
    pub scryfall_uri: String,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub card_faces: Option<Vec<CardFace>>,
    #[serde(default)]
    pub prices: Option<Prices>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageUris {
    #[serde(default)]
    pub normal: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prices {
    #[serde(default)]
    pub usd: Option<String>,
    #[serde(default)]
    pub usd_foil: Option<String>,
}

impl RawCard {
    /// Front image: the card's own `normal` image, else the first face's.
    pub fn normal_image_uri(&self) -> Option<&str> {
        if let Some(uri) = self.image_uris.as_ref().and_then(|u| u.normal.as_deref()) {
            return Some(uri);
        }
        self.card_faces
            .as_ref()
            .and_then(|faces| faces.first())
            .and_then(|face| face.image_uris.as_ref())
            .and_then(|u| u.normal.as_deref())
    }

    pub fn price_usd(&self) -> Option<f64> {
        self.prices.as_ref().and_then(|p| parse_price(p.usd.as_deref()))
    }

    pub fn price_foil(&self) -> Option<f64> {
        self.prices
            .as_ref()
            .and_then(|p| parse_price(p.usd_foil.as_deref()))
    }
}

fn parse_price(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
}

/// One printing of a card, as stored in the `cards` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRow {
    pub id: String,
    /// Name as printed; differs from `real_name` for alternate-name printings.
    pub name: String,
    pub real_name: String,
    pub set_code: String,
    pub collector_number: String,
    pub image_uri_normal: Option<String>,
    pub scryfall_uri: String,
    pub price_usd: Option<f64>,
    pub price_foil: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub rows: Vec<CardRow>,
    pub skipped: usize,
}
