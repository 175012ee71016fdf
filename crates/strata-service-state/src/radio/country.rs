//! Operator numeric → ISO country lookup.
//!
//! The tracker only needs a pure function from the network's numeric
//! operator id (MCC + MNC) to an ISO 3166 code. [`MccTable`] covers the
//! common mobile country codes; platforms with a full table plug in their
//! own [`CountryLookup`].

/// Pure lookup collaborator.
pub trait CountryLookup: Send + Sync {
    /// ISO country for `numeric`, or an empty string when unknown.
    fn country_for_operator(&self, numeric: &str) -> String;
}

impl<F> CountryLookup for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn country_for_operator(&self, numeric: &str) -> String {
        self(numeric)
    }
}

/// Mobile country code: the first three digits of the operator numeric.
pub fn mcc_of(numeric: &str) -> Option<u16> {
    let digits = numeric.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Built-in MCC table.
#[derive(Debug, Clone, Copy, Default)]
pub struct MccTable;

const MCC_COUNTRIES: &[(u16, &str)] = &[
    (202, "gr"),
    (204, "nl"),
    (206, "be"),
    (208, "fr"),
    (214, "es"),
    (222, "it"),
    (226, "ro"),
    (228, "ch"),
    (232, "at"),
    (234, "gb"),
    (235, "gb"),
    (238, "dk"),
    (240, "se"),
    (242, "no"),
    (244, "fi"),
    (250, "ru"),
    (260, "pl"),
    (262, "de"),
    (268, "pt"),
    (272, "ie"),
    (302, "ca"),
    (310, "us"),
    (311, "us"),
    (312, "us"),
    (313, "us"),
    (314, "us"),
    (315, "us"),
    (316, "us"),
    (334, "mx"),
    (404, "in"),
    (405, "in"),
    (440, "jp"),
    (441, "jp"),
    (450, "kr"),
    (454, "hk"),
    (460, "cn"),
    (466, "tw"),
    (505, "au"),
    (530, "nz"),
    (724, "br"),
    (722, "ar"),
];

impl MccTable {
    pub fn country_for_mcc(mcc: u16) -> Option<&'static str> {
        MCC_COUNTRIES
            .iter()
            .find(|(code, _)| *code == mcc)
            .map(|(_, iso)| *iso)
    }
}

impl CountryLookup for MccTable {
    fn country_for_operator(&self, numeric: &str) -> String {
        mcc_of(numeric)
            .and_then(Self::country_for_mcc)
            .unwrap_or_default()
            .to_string()
    }
}
