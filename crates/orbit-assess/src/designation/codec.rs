use thiserror::Error;

/// Conversion between the human-readable and packed designation encodings.
pub trait DesignationCodec: Send + Sync {
    fn to_packed(&self, unpacked: &str) -> Result<String, CodecError>;
    fn to_unpacked(&self, packed: &str) -> Result<String, CodecError>;

    /// Name used by the external fitters for files and directories.
    fn to_fitter_name(&self, packed: &str) -> Result<String, CodecError> {
        let unpacked = self.to_unpacked(packed)?;
        Ok(unpacked
            .chars()
            .filter(|c| !matches!(c, ' ' | '/' | '(' | ')'))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed designation '{0}'")]
    MalformedDesignation(String),
}

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const COMET_TYPES: &[char] = &['P', 'C', 'D', 'X', 'I', 'A'];
const SATELLITE_PLANETS: &[char] = &['J', 'S', 'U', 'N'];
const SURVEYS: &[(&str, &str)] = &[("P-L", "PLS"), ("T-1", "T1S"), ("T-2", "T2S"), ("T-3", "T3S")];
const NUMBERED_LETTER_LIMIT: u64 = 620_000;
const NUMBERED_TILDE_LIMIT: u64 = NUMBERED_LETTER_LIMIT + 62 * 62 * 62 * 62;

/// Minor Planet Center packing rules for minor planets, comets and natural satellites.
#[derive(Debug, Clone, Copy, Default)]
pub struct MpcDesignationCodec;

impl DesignationCodec for MpcDesignationCodec {
    fn to_packed(&self, unpacked: &str) -> Result<String, CodecError> {
        let text = unpacked.split_whitespace().collect::<Vec<_>>().join(" ");
        let malformed = || CodecError::MalformedDesignation(unpacked.to_string());

        if let Some(rest) = text.strip_prefix("S/") {
            return pack_satellite(rest).ok_or_else(malformed);
        }
        if let Some((kind, rest)) = split_comet_prefix(&text) {
            return pack_comet_provisional(kind, rest).ok_or_else(malformed);
        }
        if let Some(packed) = pack_numbered_comet(&text) {
            return Ok(packed);
        }
        if let Some(number) = numbered_asteroid(&text) {
            return pack_number(number).ok_or_else(malformed);
        }
        if let Some(packed) = pack_survey(&text) {
            return Ok(packed);
        }
        pack_provisional(&text).ok_or_else(malformed)
    }

    fn to_unpacked(&self, packed: &str) -> Result<String, CodecError> {
        let text = packed.trim();
        let malformed = || CodecError::MalformedDesignation(packed.to_string());
        let chars: Vec<char> = text.chars().collect();

        match chars.len() {
            5 => unpack_five(&chars).ok_or_else(malformed),
            7 => unpack_survey(text)
                .or_else(|| unpack_provisional(&chars))
                .ok_or_else(malformed),
            8 if chars[0] == 'S' && SATELLITE_PLANETS.contains(&chars[4]) && chars[7] == '0' => {
                unpack_satellite(&chars).ok_or_else(malformed)
            }
            8 if COMET_TYPES.contains(&chars[0]) => {
                unpack_comet_provisional(&chars).ok_or_else(malformed)
            }
            _ => Err(malformed()),
        }
    }
}

fn base62_digit(value: u64) -> Option<char> {
    BASE62.get(value as usize).map(|b| *b as char)
}

fn base62_value(c: char) -> Option<u64> {
    BASE62.iter().position(|b| *b as char == c).map(|p| p as u64)
}

fn century_letter(year: u32) -> Option<char> {
    match year / 100 {
        18 => Some('I'),
        19 => Some('J'),
        20 => Some('K'),
        _ => None,
    }
}

fn century_from_letter(c: char) -> Option<u32> {
    match c {
        'I' => Some(18),
        'J' => Some(19),
        'K' => Some(20),
        _ => None,
    }
}

fn parse_year(text: &str) -> Option<u32> {
    if text.len() != 4 || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn pack_year(year: u32) -> Option<String> {
    Some(format!("{}{:02}", century_letter(year)?, year % 100))
}

fn unpack_year(chars: &[char]) -> Option<u32> {
    let century = century_from_letter(chars[0])?;
    let tens = chars[1].to_digit(10)?;
    let units = chars[2].to_digit(10)?;
    Some(century * 100 + tens * 10 + units)
}

fn pack_cycle(cycle: u64) -> Option<String> {
    let high = base62_digit(cycle / 10)?;
    Some(format!("{}{}", high, cycle % 10))
}

fn unpack_cycle(high: char, low: char) -> Option<u64> {
    Some(base62_value(high)? * 10 + u64::from(low.to_digit(10)?))
}

fn is_half_month(c: char) -> bool {
    c.is_ascii_uppercase() && c != 'I' && c != 'Z'
}

fn is_order_letter(c: char) -> bool {
    c.is_ascii_uppercase() && c != 'I'
}

fn parse_number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// "2006 WU224" style.
fn pack_provisional(text: &str) -> Option<String> {
    let (year, tail) = text.split_once(' ')?;
    let year = parse_year(year)?;
    let mut letters = tail.chars();
    let half = letters.next().filter(|c| is_half_month(*c))?;
    let order = letters.next().filter(|c| is_order_letter(*c))?;
    let digits: String = letters.collect();
    let cycle = if digits.is_empty() {
        0
    } else {
        parse_number(&digits)?
    };
    Some(format!("{}{}{}{}", pack_year(year)?, half, pack_cycle(cycle)?, order))
}

fn unpack_provisional(chars: &[char]) -> Option<String> {
    let year = unpack_year(chars)?;
    let half = chars[3];
    let order = chars[6];
    if !is_half_month(half) || !is_order_letter(order) {
        return None;
    }
    let cycle = unpack_cycle(chars[4], chars[5])?;
    if cycle == 0 {
        Some(format!("{year} {half}{order}"))
    } else {
        Some(format!("{year} {half}{order}{cycle}"))
    }
}

fn pack_survey(text: &str) -> Option<String> {
    let (number, survey) = text.split_once(' ')?;
    let number = parse_number(number)?;
    let code = SURVEYS
        .iter()
        .find(|(label, _)| *label == survey)
        .map(|(_, code)| *code)?;
    (number < 10_000).then(|| format!("{code}{number:04}"))
}

fn unpack_survey(text: &str) -> Option<String> {
    let (label, _) = SURVEYS.iter().find(|(_, code)| text.starts_with(code))?;
    let number = parse_number(&text[3..])?;
    Some(format!("{number} {label}"))
}

fn numbered_asteroid(text: &str) -> Option<u64> {
    if let Some(rest) = text.strip_prefix('(') {
        let (inner, _) = rest.split_once(')')?;
        return parse_number(inner);
    }
    parse_number(text)
}

fn pack_number(number: u64) -> Option<String> {
    if number == 0 {
        None
    } else if number < 100_000 {
        Some(format!("{number:05}"))
    } else if number < NUMBERED_LETTER_LIMIT {
        Some(format!("{}{:04}", base62_digit(number / 10_000)?, number % 10_000))
    } else if number < NUMBERED_TILDE_LIMIT {
        let mut rest = number - NUMBERED_LETTER_LIMIT;
        let mut digits = ['0'; 4];
        for slot in digits.iter_mut().rev() {
            *slot = base62_digit(rest % 62)?;
            rest /= 62;
        }
        Some(format!("~{}", digits.iter().collect::<String>()))
    } else {
        None
    }
}

fn unpack_five(chars: &[char]) -> Option<String> {
    if chars[0] == '~' {
        let mut value = 0u64;
        for c in &chars[1..] {
            value = value * 62 + base62_value(*c)?;
        }
        return Some((value + NUMBERED_LETTER_LIMIT).to_string());
    }
    if matches!(chars[4], 'P' | 'D' | 'I') && chars[..4].iter().all(char::is_ascii_digit) {
        let number: String = chars[..4].iter().collect();
        return Some(format!("{}{}", parse_number(&number)?, chars[4]));
    }
    let tail: String = chars[1..].iter().collect();
    let low = parse_number(&tail)?;
    let high = if chars[0].is_ascii_digit() {
        u64::from(chars[0].to_digit(10)?)
    } else if chars[0].is_ascii_alphabetic() {
        base62_value(chars[0])?
    } else {
        return None;
    };
    let number = high * 10_000 + low;
    (number > 0).then(|| number.to_string())
}

/// "1P", "0073P", "2I/Borisov".
fn pack_numbered_comet(text: &str) -> Option<String> {
    let head = text.split('/').next()?;
    let kind = head.chars().last()?;
    if !matches!(kind, 'P' | 'D' | 'I') {
        return None;
    }
    let number = parse_number(&head[..head.len() - 1])?;
    (number > 0 && number < 10_000).then(|| format!("{number:04}{kind}"))
}

fn split_comet_prefix(text: &str) -> Option<(char, &str)> {
    let mut chars = text.chars();
    let kind = chars.next().filter(|c| COMET_TYPES.contains(c))?;
    let rest = text.get(1..)?.strip_prefix('/')?;
    Some((kind, rest))
}

/// "C/2019 Y4", "C/2019 Y4-A", "P/2019 LD2".
fn pack_comet_provisional(kind: char, rest: &str) -> Option<String> {
    let (body, fragment) = match rest.split_once('-') {
        Some((body, fragment)) => {
            let mut letters = fragment.chars();
            let letter = letters.next().filter(char::is_ascii_uppercase)?;
            if letters.next().is_some() {
                return None;
            }
            (body, Some(letter.to_ascii_lowercase()))
        }
        None => (rest, None),
    };

    let (year_text, tail) = body.split_once(' ')?;
    let year = parse_year(year_text)?;
    let mut letters = tail.chars();
    let half = letters.next().filter(|c| is_half_month(*c))?;
    let remainder: String = letters.collect();

    if remainder.starts_with(|c: char| c.is_ascii_uppercase()) {
        if fragment.is_some() {
            return None;
        }
        let packed = pack_provisional(&format!("{year} {half}{remainder}"))?;
        return Some(format!("{kind}{packed}"));
    }

    let cycle = parse_number(&remainder)?;
    Some(format!(
        "{kind}{}{half}{}{}",
        pack_year(year)?,
        pack_cycle(cycle)?,
        fragment.unwrap_or('0')
    ))
}

fn unpack_comet_provisional(chars: &[char]) -> Option<String> {
    let kind = chars[0];
    let last = chars[7];
    if last.is_ascii_uppercase() {
        return unpack_provisional(&chars[1..]).map(|body| format!("{kind}/{body}"));
    }
    let year = unpack_year(&chars[1..4])?;
    let half = chars[4];
    if !is_half_month(half) {
        return None;
    }
    let cycle = unpack_cycle(chars[5], chars[6])?;
    match last {
        '0' => Some(format!("{kind}/{year} {half}{cycle}")),
        c if c.is_ascii_lowercase() => Some(format!(
            "{kind}/{year} {half}{cycle}-{}",
            c.to_ascii_uppercase()
        )),
        _ => None,
    }
}

/// "S/2003 J 2".
fn pack_satellite(rest: &str) -> Option<String> {
    let mut parts = rest.split(' ');
    let year = parse_year(parts.next()?)?;
    let planet = parts
        .next()
        .and_then(|p| p.chars().next().filter(|_| p.len() == 1))
        .filter(|c| SATELLITE_PLANETS.contains(c))?;
    let number = parse_number(parts.next()?)?;
    if parts.next().is_some() || number == 0 {
        return None;
    }
    Some(format!("S{}{}{}0", pack_year(year)?, planet, pack_cycle(number)?))
}

fn unpack_satellite(chars: &[char]) -> Option<String> {
    let year = unpack_year(&chars[1..4])?;
    let planet = chars[4];
    let number = unpack_cycle(chars[5], chars[6])?;
    Some(format!("S/{year} {planet} {number}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(value: &str) -> String {
        MpcDesignationCodec.to_packed(value).expect("packs")
    }

    fn unpack(value: &str) -> String {
        MpcDesignationCodec.to_unpacked(value).expect("unpacks")
    }

    #[test]
    fn provisional_designations_pack_with_base62_cycle() {
        assert_eq!(pack("2006 WU224"), "K06WM4U");
        assert_eq!(pack("2016 QW66"), "K16Q66W");
        assert_eq!(pack("2008 WJ19"), "K08W19J");
        assert_eq!(pack("2016 EN210"), "K16EL0N");
        assert_eq!(pack("2009 DU157"), "K09DF7U");
        assert_eq!(pack("2015 XB53"), "K15X53B");
        assert_eq!(pack("2015 XX229"), "K15XM9X");
        assert_eq!(pack("1995 XA"), "J95X00A");
    }

    #[test]
    fn provisional_designations_unpack() {
        assert_eq!(unpack("K06WM4U"), "2006 WU224");
        assert_eq!(unpack("K16EL0N"), "2016 EN210");
        assert_eq!(unpack("J95X00A"), "1995 XA");
    }

    #[test]
    fn extra_whitespace_is_collapsed_before_packing() {
        assert_eq!(pack("  2006   WU224 "), "K06WM4U");
    }

    #[test]
    fn numbered_minor_planets() {
        assert_eq!(pack("(433)"), "00433");
        assert_eq!(pack("(433) Eros"), "00433");
        assert_eq!(pack("100001"), "A0001");
        assert_eq!(pack("620000"), "~0000");
        assert_eq!(pack("620061"), "~000z");
        assert_eq!(unpack("00433"), "433");
        assert_eq!(unpack("A0001"), "100001");
        assert_eq!(unpack("~000z"), "620061");
    }

    #[test]
    fn survey_designations() {
        assert_eq!(pack("2040 P-L"), "PLS2040");
        assert_eq!(pack("3138 T-1"), "T1S3138");
        assert_eq!(unpack("PLS2040"), "2040 P-L");
        assert_eq!(unpack("T1S3138"), "3138 T-1");
    }

    #[test]
    fn comets_and_satellites() {
        assert_eq!(pack("1P"), "0001P");
        assert_eq!(pack("2I/Borisov"), "0002I");
        assert_eq!(unpack("0001P"), "1P");
        assert_eq!(pack("C/2019 Y4"), "CK19Y040");
        assert_eq!(pack("C/2019 Y4-A"), "CK19Y04a");
        assert_eq!(pack("P/2019 LD2"), "PK19L02D");
        assert_eq!(unpack("CK19Y040"), "C/2019 Y4");
        assert_eq!(unpack("CK19Y04a"), "C/2019 Y4-A");
        assert_eq!(unpack("PK19L02D"), "P/2019 LD2");
        assert_eq!(pack("S/2003 J 2"), "SK03J020");
        assert_eq!(unpack("SK03J020"), "S/2003 J 2");
    }

    #[test]
    fn fitter_name_strips_separators() {
        let codec = MpcDesignationCodec;
        assert_eq!(codec.to_fitter_name("K06WM4U").expect("name"), "2006WU224");
        assert_eq!(codec.to_fitter_name("CK19Y040").expect("name"), "C2019Y4");
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let codec = MpcDesignationCodec;
        for bad in ["", "WU224", "2006 wu224", "2006 IA", "3006 AB", "S/2003 Q 2", "C/20 Y4"] {
            assert_eq!(
                codec.to_packed(bad),
                Err(CodecError::MalformedDesignation(bad.to_string())),
                "{bad:?} should not pack"
            );
        }
        assert!(codec.to_unpacked("K06").is_err());
        assert!(codec.to_unpacked("Q06WM4U").is_err());
    }
}
