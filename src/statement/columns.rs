//! Logical statement columns and the header spellings accepted for each.

use serde::{Deserialize, Serialize};

/// A logical field of a royalty statement line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementField {
    Artist,
    TrackTitle,
    Release,
    Isrc,
    Platform,
    Territory,
    Period,
    Quantity,
    Revenue,
    Currency,
    TransactionType,
}

const FIELD_COUNT: usize = 11;

impl StatementField {
    pub const ALL: [StatementField; FIELD_COUNT] = [
        StatementField::Artist,
        StatementField::TrackTitle,
        StatementField::Release,
        StatementField::Isrc,
        StatementField::Platform,
        StatementField::Territory,
        StatementField::Period,
        StatementField::Quantity,
        StatementField::Revenue,
        StatementField::Currency,
        StatementField::TransactionType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::TrackTitle => "track_title",
            Self::Release => "release",
            Self::Isrc => "isrc",
            Self::Platform => "platform",
            Self::Territory => "territory",
            Self::Period => "period",
            Self::Quantity => "quantity",
            Self::Revenue => "revenue",
            Self::Currency => "currency",
            Self::TransactionType => "transaction_type",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    /// Accepted header spellings, already normalized (lowercase, single spaces).
    /// Earlier entries win when a header carries more than one candidate.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Artist => &[
                "artist",
                "artist name",
                "artists",
                "track artist",
                "artista",
                "nombre del artista",
            ],
            Self::TrackTitle => &[
                "track title",
                "track",
                "track name",
                "title",
                "song",
                "titulo",
                "título",
                "titulo de la pista",
                "título de la pista",
                "cancion",
                "canción",
            ],
            Self::Release => &[
                "release",
                "release title",
                "release name",
                "album",
                "álbum",
                "product title",
                "lanzamiento",
                "titulo del lanzamiento",
                "título del lanzamiento",
            ],
            Self::Isrc => &["isrc", "isrc code", "codigo isrc", "código isrc"],
            Self::Platform => &[
                "platform",
                "dsp",
                "store",
                "store name",
                "service",
                "retailer",
                "plataforma",
                "tienda",
            ],
            Self::Territory => &[
                "territory",
                "country",
                "country code",
                "sale country",
                "territorio",
                "pais",
                "país",
            ],
            Self::Period => &[
                "period",
                "sales period",
                "reporting period",
                "date",
                "sale date",
                "month",
                "periodo",
                "período",
                "fecha",
                "mes",
            ],
            Self::Quantity => &[
                "quantity",
                "streams",
                "units",
                "qty",
                "plays",
                "cantidad",
                "reproducciones",
                "unidades",
            ],
            Self::Revenue => &[
                "label share net receipts",
                "revenue",
                "net revenue",
                "net receipts",
                "royalty",
                "royalties",
                "earnings",
                "amount",
                "ingresos",
                "ingresos netos",
                "importe",
                "regalias",
                "regalías",
            ],
            Self::Currency => &["currency", "currency code", "moneda", "divisa"],
            Self::TransactionType => &[
                "transaction type",
                "sale type",
                "type",
                "usage type",
                "tipo de transaccion",
                "tipo de transacción",
                "tipo de venta",
                "tipo",
            ],
        }
    }
}

/// Lowercases, trims and collapses inner whitespace; drops a UTF-8 BOM left on
/// the first header cell by spreadsheet exports.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Column positions of each logical field within one statement file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    positions: [Option<usize>; FIELD_COUNT],
}

impl HeaderMap {
    /// Maps a header record through the synonym table. For every field the
    /// best-ranked synonym present in the header wins; unknown headers are
    /// ignored.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let normalized: Vec<String> = headers.into_iter().map(normalize_header).collect();
        let mut positions = [None; FIELD_COUNT];

        for field in StatementField::ALL {
            positions[field.index()] = field
                .synonyms()
                .iter()
                .find_map(|synonym| normalized.iter().position(|h| h == synonym));
        }

        Self { positions }
    }

    pub fn position(&self, field: StatementField) -> Option<usize> {
        self.positions[field.index()]
    }

    /// Fetches a field's raw value from a row, `None` when the column is not
    /// mapped or the row is too short.
    pub fn get<'r>(&self, field: StatementField, columns: &'r [&'r str]) -> Option<&'r str> {
        self.position(field).and_then(|i| columns.get(i).copied())
    }

    pub fn missing_fields(&self) -> Vec<StatementField> {
        StatementField::ALL
            .into_iter()
            .filter(|f| self.position(*f).is_none())
            .collect()
    }
}
