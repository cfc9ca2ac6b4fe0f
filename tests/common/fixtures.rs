//! Statement files shared by the end-to-end tests
//!
//! Three distributors, three layouts. When the expected totals change,
//! update only this file.

use rust_decimal::Decimal;
use std::str::FromStr;

// ============================================================================
// Statements
// ============================================================================

/// Spanish distributor export: semicolon separated, decimal comma, thousands
/// dots, a BOM and a totals footer.
pub const JANUARY_STATEMENT: &str = "\u{feff}Artista;Título de la pista;Álbum;ISRC;Tienda;País;Periodo;Cantidad;Importe;Moneda\n\
Luna;Marea;Costa;ESA012400001;Spotify;ES;2024M01;100;10,50;EUR\n\
Luna;Faro;Costa;ESA012400002;Apple Music;MX;2024M01;1200;1.020,25;EUR\n\
Río Norte;\"Sal; y arena\";Delta;ESA012400010;Spotify;AR;2024M01;40;3,10;EUR\n\
;;;;;;;;1.033,85;\n";

/// English export: comma separated, decimal point, an empty platform and
/// an unparseable quantity.
pub const FEBRUARY_STATEMENT: &str = "Artist,Track,Release,ISRC,DSP,Territory,Period,Streams,Revenue,Currency\n\
Luna,Marea,Costa,ESA012400001,Spotify,ES,2024M01,50,5.25,EUR\n\
Luna,Marea,Costa,ESA012400001,Deezer,FR,2024M02,20,1.80,EUR\n\
Río Norte,\"Sal; y arena\",Delta,ESA012400010,,AR,2024M02,n/a,0.90,EUR\n";

/// Tab separated export without ISRCs or territories.
pub const MARCH_STATEMENT: &str = "Artist Name\tSong\tStore\tSale Date\tUnits\tEarnings\n\
Aurora Sur\tPrimera luz\tTidal\t2024-03\t300\t12.00\n\
Luna\tMarea (Live)\tSpotify\t2024-03\t10\t0.75\n";

/// A header and nothing else.
pub const HEADER_ONLY_STATEMENT: &str = "Artist;Track;Revenue\n";

// ============================================================================
// Expected totals
// ============================================================================

pub const LUNA: &str = "Luna";
pub const RIO_NORTE: &str = "Río Norte";
pub const AURORA_SUR: &str = "Aurora Sur";

/// ISRC of "Marea", reported by both January and February.
pub const MAREA_ISRC: &str = "ESA012400001";

pub const JANUARY_REVENUE: &str = "1033.85";
pub const JANUARY_STREAMS: u64 = 1340;
pub const FEBRUARY_REVENUE: &str = "7.95";
pub const MARCH_REVENUE: &str = "12.75";

/// January plus February.
pub const TWO_MONTH_REVENUE: &str = "1041.80";
/// All three statements.
pub const ALL_REVENUE: &str = "1054.55";

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}
