use serde::Serialize;

pub const YARGITAY_CHAMBERS: u32 = 23;
pub const DANISTAY_CHAMBERS: u32 = 17;

const YARGITAY_BOARDS: &[(&str, &str)] = &[
    ("HGK", "Hukuk Genel Kurulu"),
    ("CGK", "Ceza Genel Kurulu"),
    ("BGK", "Büyük Genel Kurulu"),
    ("HBK", "Hukuk Daireleri Başkanlar Kurulu"),
    ("CBK", "Ceza Daireleri Başkanlar Kurulu"),
];

const DANISTAY_BOARDS: &[(&str, &str)] = &[
    ("DBGK", "Büyük Gen.Kur."),
    ("IDDK", "İdare Dava Daireleri Kurulu"),
    ("VDDK", "Vergi Dava Daireleri Kurulu"),
    ("IBK", "İçtihatları Birleştirme Kurulu"),
    ("IIK", "İdari İşler Kurulu"),
    ("DBK", "Başkanlar Kurulu"),
    ("AYIM", "Askeri Yüksek İdare Mahkemesi"),
    ("AYIMDK", "Askeri Yüksek İdare Mahkemesi Daireler Kurulu"),
    ("AYIMB", "Askeri Yüksek İdare Mahkemesi Başsavcılığı"),
    ("AYIM1", "Askeri Yüksek İdare Mahkemesi 1. Daire"),
    ("AYIM2", "Askeri Yüksek İdare Mahkemesi 2. Daire"),
    ("AYIM3", "Askeri Yüksek İdare Mahkemesi 3. Daire"),
];

const REKABET_DECISION_TYPES: &[(&str, &str, &str)] = &[
    (
        "BD",
        "Birleşme ve Devralma",
        "2fff0979-9f9d-42d7-8c2e-a30705889542",
    ),
    ("DIGER", "Diğer", "dda8feaf-c919-405c-9da1-823f22b45ad9"),
    (
        "MT",
        "Menfi Tespit ve Muafiyet",
        "95ccd210-5304-49c5-b9e0-8ee53c50d4e8",
    ),
    ("OZ", "Özelleştirme", "e1f14505-842b-4af5-95d1-312d6de1a541"),
    ("RI", "Rekabet İhlali", "720614bf-efd1-4dca-9785-b98eb65f2677"),
];

/// Organizational-unit vocabulary a backend filters on.
///
/// Every scheme accepts both the abbreviated code (`H3`, `D5`, `HGK`) and the
/// full unit name, and resolves to the value the backend expects on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitScheme {
    Unsupported,
    YargitayChambers,
    DanistayChambers,
    BedestenUnits,
    RekabetDecisionTypes,
}

impl UnitScheme {
    pub fn resolve(self, value: &str) -> Option<String> {
        let value = value.trim();
        match self {
            Self::Unsupported => None,
            Self::YargitayChambers => resolve_yargitay(value),
            Self::DanistayChambers => resolve_danistay(value),
            Self::BedestenUnits => resolve_yargitay(value).or_else(|| resolve_danistay(value)),
            Self::RekabetDecisionTypes => REKABET_DECISION_TYPES
                .iter()
                .find(|(code, name, guid)| {
                    code.eq_ignore_ascii_case(value)
                        || fold(name) == fold(value)
                        || guid.eq_ignore_ascii_case(value)
                })
                .map(|(_, _, guid)| guid.to_string()),
        }
    }

    pub fn accepts(self, value: &str) -> bool {
        self.resolve(value).is_some()
    }
}

/// `None`, blank and `ALL` all mean "no unit restriction".
pub fn is_unrestricted(unit: Option<&str>) -> bool {
    match unit {
        None => true,
        Some(value) => {
            let value = value.trim();
            value.is_empty() || value.eq_ignore_ascii_case("all")
        }
    }
}

fn resolve_yargitay(value: &str) -> Option<String> {
    if let Some(name) = lookup(YARGITAY_BOARDS, value) {
        return Some(name);
    }
    if let Some(number) = numbered_code(value, "H", YARGITAY_CHAMBERS) {
        return Some(format!("{number}. Hukuk Dairesi"));
    }
    if let Some(number) = numbered_code(value, "C", YARGITAY_CHAMBERS) {
        return Some(format!("{number}. Ceza Dairesi"));
    }
    numbered_name(value, "hukuk dairesi", YARGITAY_CHAMBERS)
        .map(|number| format!("{number}. Hukuk Dairesi"))
        .or_else(|| {
            numbered_name(value, "ceza dairesi", YARGITAY_CHAMBERS)
                .map(|number| format!("{number}. Ceza Dairesi"))
        })
}

fn resolve_danistay(value: &str) -> Option<String> {
    if let Some(name) = lookup(DANISTAY_BOARDS, value) {
        return Some(name);
    }
    numbered_code(value, "D", DANISTAY_CHAMBERS)
        .or_else(|| numbered_name(value, "daire", DANISTAY_CHAMBERS))
        .map(|number| format!("{number}. Daire"))
}

fn lookup(table: &[(&str, &str)], value: &str) -> Option<String> {
    table
        .iter()
        .find(|(code, name)| code.eq_ignore_ascii_case(value) || fold(name) == fold(value))
        .map(|(_, name)| name.to_string())
}

fn numbered_code(value: &str, prefix: &str, max: u32) -> Option<u32> {
    let upper = value.to_uppercase();
    let digits = upper.strip_prefix(prefix)?;
    in_range(digits, max)
}

fn numbered_name(value: &str, suffix: &str, max: u32) -> Option<u32> {
    let folded = fold(value);
    let (number, rest) = folded.split_once('.')?;
    if rest.trim() != suffix {
        return None;
    }
    in_range(number.trim(), max)
}

fn in_range(digits: &str, max: u32) -> Option<u32> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number = digits.parse::<u32>().ok()?;
    (1..=max).contains(&number).then_some(number)
}

fn fold(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(|c| match c {
            'İ' | 'I' | 'ı' => 'i',
            other => other.to_lowercase().next().unwrap_or(other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yargitay_codes_and_names_resolve_to_same_chamber() {
        let scheme = UnitScheme::YargitayChambers;
        assert_eq!(scheme.resolve("H3").as_deref(), Some("3. Hukuk Dairesi"));
        assert_eq!(
            scheme.resolve("3. hukuk dairesi").as_deref(),
            Some("3. Hukuk Dairesi")
        );
        assert_eq!(scheme.resolve("c23").as_deref(), Some("23. Ceza Dairesi"));
        assert_eq!(scheme.resolve("HGK").as_deref(), Some("Hukuk Genel Kurulu"));
    }

    #[test]
    fn chamber_numbers_are_bounded() {
        let scheme = UnitScheme::YargitayChambers;
        assert!(scheme.resolve("H24").is_none());
        assert!(scheme.resolve("H0").is_none());
        assert!(scheme.resolve("H").is_none());
        assert!(scheme.resolve("D3").is_none());
    }

    #[test]
    fn bedesten_covers_both_high_courts() {
        let scheme = UnitScheme::BedestenUnits;
        assert_eq!(scheme.resolve("D17").as_deref(), Some("17. Daire"));
        assert_eq!(scheme.resolve("D18"), None);
        assert_eq!(
            scheme.resolve("IDDK").as_deref(),
            Some("İdare Dava Daireleri Kurulu")
        );
        assert_eq!(scheme.resolve("H1").as_deref(), Some("1. Hukuk Dairesi"));
    }

    #[test]
    fn danistay_chambers_and_boards_resolve() {
        let scheme = UnitScheme::DanistayChambers;
        assert_eq!(scheme.resolve("D3").as_deref(), Some("3. Daire"));
        assert_eq!(scheme.resolve("3. Daire").as_deref(), Some("3. Daire"));
        assert_eq!(scheme.resolve("vddk").as_deref(), Some("Vergi Dava Daireleri Kurulu"));
        assert!(scheme.resolve("H3").is_none());
        assert!(scheme.resolve("D18").is_none());
    }

    #[test]
    fn rekabet_types_resolve_to_guids() {
        let scheme = UnitScheme::RekabetDecisionTypes;
        assert_eq!(
            scheme.resolve("Rekabet İhlali").as_deref(),
            Some("720614bf-efd1-4dca-9785-b98eb65f2677")
        );
        assert_eq!(
            scheme.resolve("bd").as_deref(),
            Some("2fff0979-9f9d-42d7-8c2e-a30705889542")
        );
    }

    #[test]
    fn unsupported_scheme_rejects_everything() {
        assert!(!UnitScheme::Unsupported.accepts("H1"));
    }

    #[test]
    fn blank_and_all_are_unrestricted() {
        assert!(is_unrestricted(None));
        assert!(is_unrestricted(Some("  ")));
        assert!(is_unrestricted(Some("ALL")));
        assert!(!is_unrestricted(Some("H1")));
    }
}
