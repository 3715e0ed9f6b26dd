use crate::error::{LoopcardError, LoopcardResult};

/// Identifier for a palette in the built-in catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaletteId {
    Sunset,
    Ocean,
    Dusk,
    Meadow,
    Mono,
}

impl PaletteId {
    pub const ALL: [PaletteId; 5] = [
        PaletteId::Sunset,
        PaletteId::Ocean,
        PaletteId::Dusk,
        PaletteId::Meadow,
        PaletteId::Mono,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunset => "sunset",
            Self::Ocean => "ocean",
            Self::Dusk => "dusk",
            Self::Meadow => "meadow",
            Self::Mono => "mono",
        }
    }
}

impl std::str::FromStr for PaletteId {
    type Err = LoopcardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| {
                LoopcardError::validation(format!(
                    "unknown palette '{s}' (expected one of: sunset, ocean, dusk, meadow, mono)"
                ))
            })
    }
}

impl std::fmt::Display for PaletteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, ordered list of gradient color stops. Immutable; the whole
/// catalog is defined at process start.
#[derive(Clone, Copy, Debug)]
pub struct Palette {
    pub id: PaletteId,
    pub label: &'static str,
    pub stops: &'static [&'static str],
}

static REGISTRY: [Palette; 5] = [
    Palette {
        id: PaletteId::Sunset,
        label: "Sunset",
        stops: &["#ff9a5a", "#ff5470", "#7b2d8b"],
    },
    Palette {
        id: PaletteId::Ocean,
        label: "Ocean",
        stops: &["#0fc2c0", "#0a7d9e", "#023859"],
    },
    Palette {
        id: PaletteId::Dusk,
        label: "Dusk",
        stops: &["#f6d365", "#e8837b", "#8e5ba6", "#2b2d5e"],
    },
    Palette {
        id: PaletteId::Meadow,
        label: "Meadow",
        stops: &["#c5e99b", "#53b175", "#1d5c4f"],
    },
    Palette {
        id: PaletteId::Mono,
        label: "Mono",
        stops: &["#1d2430"],
    },
];

impl Palette {
    /// Look up a palette in the static catalog.
    pub fn by_id(id: PaletteId) -> &'static Palette {
        match id {
            PaletteId::Sunset => &REGISTRY[0],
            PaletteId::Ocean => &REGISTRY[1],
            PaletteId::Dusk => &REGISTRY[2],
            PaletteId::Meadow => &REGISTRY[3],
            PaletteId::Mono => &REGISTRY[4],
        }
    }

    pub fn all() -> &'static [Palette] {
        &REGISTRY
    }

    /// Parse the stop strings into RGB triples, preserving order.
    pub fn stops_rgb(&self) -> LoopcardResult<Vec<[u8; 3]>> {
        self.stops.iter().map(|s| parse_hex_rgb(s)).collect()
    }
}

/// Parse `#rrggbb` (leading `#` optional) into an RGB triple.
pub fn parse_hex_rgb(s: &str) -> LoopcardResult<[u8; 3]> {
    let raw = s.trim();
    let raw = raw.strip_prefix('#').unwrap_or(raw);

    fn hex_byte(pair: &str) -> LoopcardResult<u8> {
        u8::from_str_radix(pair, 16)
            .map_err(|_| LoopcardError::validation(format!("invalid hex byte \"{pair}\"")))
    }

    if raw.len() != 6 || !raw.is_ascii() {
        return Err(LoopcardError::validation(format!(
            "color '{s}' must be an RGB hex string like #ff5470"
        )));
    }

    Ok([
        hex_byte(&raw[0..2])?,
        hex_byte(&raw[2..4])?,
        hex_byte(&raw[4..6])?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_total() {
        for id in PaletteId::ALL {
            assert_eq!(Palette::by_id(id).id, id);
        }
    }

    #[test]
    fn every_stop_parses() {
        for palette in Palette::all() {
            let rgb = palette.stops_rgb().unwrap();
            assert!(!rgb.is_empty());
            assert_eq!(rgb.len(), palette.stops.len());
        }
    }

    #[test]
    fn sunset_has_three_stops_and_mono_one() {
        assert_eq!(Palette::by_id(PaletteId::Sunset).stops.len(), 3);
        assert_eq!(Palette::by_id(PaletteId::Mono).stops.len(), 1);
    }

    #[test]
    fn hex_parsing_accepts_hash_and_rejects_junk() {
        assert_eq!(parse_hex_rgb("#ff5470").unwrap(), [0xff, 0x54, 0x70]);
        assert_eq!(parse_hex_rgb("0a7d9e").unwrap(), [0x0a, 0x7d, 0x9e]);
        assert!(parse_hex_rgb("#fff").is_err());
        assert!(parse_hex_rgb("#zzzzzz").is_err());
    }

    #[test]
    fn palette_id_round_trips_through_str() {
        for id in PaletteId::ALL {
            assert_eq!(id.as_str().parse::<PaletteId>().unwrap(), id);
        }
        assert!("neon".parse::<PaletteId>().is_err());
    }
}
