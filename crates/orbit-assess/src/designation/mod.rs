//! Object identifiers and the lexical rules that classify them.

mod codec;

use std::fmt;

use serde::Serialize;

pub use codec::{CodecError, DesignationCodec, MpcDesignationCodec};

/// Immutable identifier of one catalog object.
///
/// The packed form and fitter name are derived once from the unpacked form
/// and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Designation {
    unpacked: String,
    packed: String,
    fitter_name: String,
}

impl Designation {
    pub fn parse<C>(unpacked: &str, codec: &C) -> Result<Self, CodecError>
    where
        C: DesignationCodec + ?Sized,
    {
        let packed = codec.to_packed(unpacked)?;
        Self::from_packed(&packed, codec)
    }

    pub fn from_packed<C>(packed: &str, codec: &C) -> Result<Self, CodecError>
    where
        C: DesignationCodec + ?Sized,
    {
        let packed = packed.trim().to_string();
        let unpacked = codec.to_unpacked(&packed)?;
        let fitter_name = codec.to_fitter_name(&packed)?;
        Ok(Self {
            unpacked,
            packed,
            fitter_name,
        })
    }

    pub fn unpacked(&self) -> &str {
        &self.unpacked
    }

    pub fn packed(&self) -> &str {
        &self.packed
    }

    pub fn fitter_name(&self) -> &str {
        &self.fitter_name
    }

    pub fn orbit_class(&self) -> OrbitClass {
        OrbitClass::of(&self.unpacked)
    }
}

impl fmt::Display for Designation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unpacked)
    }
}

/// Result category an object belongs to; picks both the fitter and the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbitClass {
    Asteroid,
    Comet,
    Satellite,
}

const COMET_MARKERS: &[&str] = &["P/", "C/", "D/", "X/", "I/", "A/"];

impl OrbitClass {
    /// Classifies from the unpacked form alone.
    pub fn of(unpacked: &str) -> Self {
        let text = unpacked.trim();
        if text.starts_with("S/") {
            return OrbitClass::Satellite;
        }
        if COMET_MARKERS.iter().any(|marker| text.starts_with(marker)) {
            return OrbitClass::Comet;
        }
        let head = text.split('/').next().unwrap_or(text);
        let numbered_periodic = head.len() > 1
            && head.ends_with(['P', 'D', 'I'])
            && head[..head.len() - 1].chars().all(|c| c.is_ascii_digit());
        if numbered_periodic {
            OrbitClass::Comet
        } else {
            OrbitClass::Asteroid
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrbitClass::Asteroid => "asteroid",
            OrbitClass::Comet => "comet",
            OrbitClass::Satellite => "satellite",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_derives_packed_and_fitter_name() {
        let designation = Designation::parse("2006  WU224", &MpcDesignationCodec).expect("parses");
        assert_eq!(designation.unpacked(), "2006 WU224");
        assert_eq!(designation.packed(), "K06WM4U");
        assert_eq!(designation.fitter_name(), "2006WU224");
        assert_eq!(designation.to_string(), "2006 WU224");
    }

    #[test]
    fn numbered_input_is_canonicalised() {
        let designation = Designation::parse("(433) Eros", &MpcDesignationCodec).expect("parses");
        assert_eq!(designation.unpacked(), "433");
        assert_eq!(designation.packed(), "00433");
        assert_eq!(designation.fitter_name(), "433");
    }

    #[test]
    fn class_follows_lexical_markers() {
        assert_eq!(OrbitClass::of("2008 WJ19"), OrbitClass::Asteroid);
        assert_eq!(OrbitClass::of("C/2019 Y4"), OrbitClass::Comet);
        assert_eq!(OrbitClass::of("P/2019 LD2"), OrbitClass::Comet);
        assert_eq!(OrbitClass::of("1P"), OrbitClass::Comet);
        assert_eq!(OrbitClass::of("S/2003 J 2"), OrbitClass::Satellite);
        assert_eq!(OrbitClass::of("433"), OrbitClass::Asteroid);
        assert_eq!(OrbitClass::of("2040 P-L"), OrbitClass::Asteroid);
    }

    #[test]
    fn malformed_designations_do_not_parse() {
        let err = Designation::parse("not a designation", &MpcDesignationCodec)
            .expect_err("garbage rejected");
        assert!(matches!(err, CodecError::MalformedDesignation(_)));
    }
}
