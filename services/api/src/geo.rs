//! Geographic normalization for the raw census extracts.
//!
//! State and district names in the source CSVs are free text typed by
//! thousands of operators: misspellings, abbreviations, cities entered as
//! states, decimal artifacts in pincodes. Normalization is a deterministic
//! fallback chain:
//!
//! - State: cleaned text -> alias table -> pincode prefix table -> None.
//!   A row whose state resolves to None is dropped from every aggregate.
//! - District: cleaned text -> alias table -> title case. Never fails;
//!   unresolvable input becomes "Unknown".
//!
//! The tables are data, not configuration. They are compiled in and loaded
//! once at startup into an immutable `GeoTables` shared via `Arc`.

use std::collections::{HashMap, HashSet};

/// Canonical spellings, one per state or union territory. Closed set:
/// anything that does not resolve into this set is not aggregated.
const VALID_STATES: &[&str] = &[
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    // Union territories
    "Andaman and Nicobar Islands",
    "Chandigarh",
    "Dadra and Nagar Haveli and Daman and Diu",
    "Delhi",
    "Jammu and Kashmir",
    "Ladakh",
    "Lakshadweep",
    "Puducherry",
];

/// Cleaned state text -> canonical name. Keys are the output of
/// `clean_state_text`. Includes the common misspellings observed in the
/// extracts plus cities that operators entered in the state column.
const STATE_ALIASES: &[(&str, &str)] = &[
    ("andhra pradesh", "Andhra Pradesh"),
    ("arunachal pradesh", "Arunachal Pradesh"),
    ("assam", "Assam"),
    ("bihar", "Bihar"),
    ("chhattisgarh", "Chhattisgarh"),
    ("chhatisgarh", "Chhattisgarh"),
    ("goa", "Goa"),
    ("gujarat", "Gujarat"),
    ("haryana", "Haryana"),
    ("himachal pradesh", "Himachal Pradesh"),
    ("jharkhand", "Jharkhand"),
    ("karnataka", "Karnataka"),
    ("kerala", "Kerala"),
    ("madhya pradesh", "Madhya Pradesh"),
    ("maharashtra", "Maharashtra"),
    ("manipur", "Manipur"),
    ("meghalaya", "Meghalaya"),
    ("mizoram", "Mizoram"),
    ("nagaland", "Nagaland"),
    ("odisha", "Odisha"),
    ("orissa", "Odisha"),
    ("punjab", "Punjab"),
    ("rajasthan", "Rajasthan"),
    ("sikkim", "Sikkim"),
    ("tamil nadu", "Tamil Nadu"),
    ("tamilnadu", "Tamil Nadu"),
    ("telangana", "Telangana"),
    ("tripura", "Tripura"),
    ("uttar pradesh", "Uttar Pradesh"),
    ("uttarakhand", "Uttarakhand"),
    ("uttaranchal", "Uttarakhand"),
    ("west bengal", "West Bengal"),
    ("westbengal", "West Bengal"),
    ("west bangal", "West Bengal"),
    ("west bengli", "West Bengal"),
    // Union territories and their older names
    ("andaman and nicobar islands", "Andaman and Nicobar Islands"),
    ("andaman nicobar islands", "Andaman and Nicobar Islands"),
    ("chandigarh", "Chandigarh"),
    (
        "dadra and nagar haveli and daman and diu",
        "Dadra and Nagar Haveli and Daman and Diu",
    ),
    (
        "the dadra and nagar haveli and daman and diu",
        "Dadra and Nagar Haveli and Daman and Diu",
    ),
    ("dadra nagar haveli", "Dadra and Nagar Haveli and Daman and Diu"),
    ("dadra and nagar haveli", "Dadra and Nagar Haveli and Daman and Diu"),
    ("daman and diu", "Dadra and Nagar Haveli and Daman and Diu"),
    ("daman diu", "Dadra and Nagar Haveli and Daman and Diu"),
    ("delhi", "Delhi"),
    ("new delhi", "Delhi"),
    ("jammu and kashmir", "Jammu and Kashmir"),
    ("jammu kashmir", "Jammu and Kashmir"),
    ("ladakh", "Ladakh"),
    ("lakshadweep", "Lakshadweep"),
    ("puducherry", "Puducherry"),
    ("pondicherry", "Puducherry"),
    // Cities and localities that show up in the state column
    ("nagpur", "Maharashtra"),
    ("jaipur", "Rajasthan"),
    ("gurgaon", "Haryana"),
    ("pune city", "Maharashtra"),
    ("darbhanga", "Bihar"),
    ("madanapalle", "Andhra Pradesh"),
    ("balanagar", "Telangana"),
    ("puttenahalli", "Karnataka"),
    ("raja annamalai puram", "Tamil Nadu"),
    ("greater kailash 2", "Delhi"),
    ("puthur", "Andhra Pradesh"),
    // Known garbage: mapped explicitly so it never reaches the pincode
    // fallback, then rejected by the valid-state check.
    ("100000", "Unknown"),
    ("561203", "Karnataka"),
];

/// Cleaned district text -> corrected name. Administrative renames and the
/// misspellings the offline cleaning notebook accumulated. Applied before
/// title-casing, so values here are already in their final spelling.
const DISTRICT_ALIASES: &[(&str, &str)] = &[
    // Tamil Nadu
    ("tuticorin", "Thoothukkudi"),
    ("thoothukudi", "Thoothukkudi"),
    ("kancheepuram", "Kanchipuram"),
    ("thiruvallur", "Tiruvallur"),
    ("kanyakumari", "Kanniyakumari"),
    ("villupuram", "Viluppuram"),
    ("thiruvarur", "Tiruvarur"),
    ("tirupathur", "Tirupattur"),
    // Karnataka
    ("bangalore", "Bengaluru"),
    ("belgaum", "Belagavi"),
    ("shimoga", "Shivamogga"),
    ("mysore", "Mysuru"),
    ("tumkur", "Tumakuru"),
    ("bellary", "Ballari"),
    ("gulbarga", "Kalaburagi"),
    ("bijapur", "Vijayapura"),
    ("chikmagalur", "Chikkamagaluru"),
    ("chickmagalur", "Chikkamagaluru"),
    ("chamarajanagar", "Chamarajanagara"),
    ("chamrajnagar", "Chamarajanagara"),
    ("chamrajanagar", "Chamarajanagara"),
    ("mangalore", "Dakshina Kannada"),
    ("davanagere", "Davangere"),
    ("hubli", "Dharwad"),
    ("hubballi", "Dharwad"),
    ("hasan", "Hassan"),
    ("ramanagar", "Ramanagara"),
    // Maharashtra / Madhya Pradesh
    ("gondia", "Gondiya"),
    ("ahmadnagar", "Ahilyanagar"),
    ("ahmednagar", "Ahilyanagar"),
    ("ahmed nagar", "Ahilyanagar"),
    ("aurangabad", "Chhatrapati Sambhajinagar"),
    ("osmanabad", "Dharashiv"),
    ("beed", "Bid"),
    ("buldhana", "Buldana"),
    ("raigarh(mh)", "Raigad"),
    ("bombay", "Mumbai"),
    ("mumbai( sub urban )", "Mumbai Suburban"),
    ("hoshangabad", "Narmadapuram"),
    ("narsimhapur", "Narsinghpur"),
    ("ashok nagar", "Ashoknagar"),
    // Gujarat
    ("ahmadabad", "Ahmedabad"),
    ("banas kantha", "Banaskantha"),
    ("dohad", "Dahod"),
    ("mahesana", "Mehsana"),
    ("panchmahals", "Panchmahal"),
    ("surendra nagar", "Surendranagar"),
    ("dang", "The Dangs"),
    // West Bengal
    ("burdwan", "Bardhaman"),
    ("barddhaman", "Bardhaman"),
    ("hugli", "Hooghly"),
    ("hooghiy", "Hooghly"),
    ("hawrah", "Howrah"),
    ("haora", "Howrah"),
    ("coochbehar", "Cooch Behar"),
    ("darjiling", "Darjeeling"),
    ("north twenty four parganas", "North 24 Parganas"),
    ("south twenty four parganas", "South 24 Parganas"),
    ("24 paraganas south", "South 24 Parganas"),
    ("puruliya", "Purulia"),
    ("malda", "Maldah"),
    // Uttarakhand
    ("hardwar", "Haridwar"),
    // Uttar Pradesh
    ("allahabad", "Prayagraj"),
    ("faizabad", "Ayodhya"),
    ("lakhimpur kheri", "Kheri"),
    ("sant ravidas nagar", "Bhadohi"),
    ("sant ravidas nagar bhadohi", "Bhadohi"),
    ("bara banki", "Barabanki"),
    ("bulandshahar", "Bulandshahr"),
    ("baghpat", "Bagpat"),
    ("shravasti", "Shrawasti"),
    // Andhra Pradesh
    ("ysr", "Y.S.R. Kadapa"),
    ("y s r", "Y.S.R. Kadapa"),
    ("y.s.r.", "Y.S.R. Kadapa"),
    ("y. s. r", "Y.S.R. Kadapa"),
    ("cuddapah", "Y.S.R. Kadapa"),
    ("kadapa", "Y.S.R. Kadapa"),
    ("ysr district", "Y.S.R. Kadapa"),
    ("y s r kadapa", "Y.S.R. Kadapa"),
    ("anantapur", "Ananthapuramu"),
    ("ananthapur", "Ananthapuramu"),
    ("sri potti sriramulu nellore", "Nellore"),
    ("dr. b. r. ambedkar konaseema", "Dr. B.R. Ambedkar Konaseema"),
    ("dr b r ambedkar konaseema", "Dr. B.R. Ambedkar Konaseema"),
    // Telangana / AP split fallout
    ("k v rangareddy", "Rangareddy"),
    ("k v rangareddi", "Rangareddy"),
    ("k.v.rangareddy", "Rangareddy"),
    ("k.v. rangareddy", "Rangareddy"),
    ("rangareddi", "Rangareddy"),
    ("warangal (urban)", "Warangal Urban"),
    ("karim nagar", "Karimnagar"),
    ("medchal malkajgiri", "Medchal-Malkajgiri"),
    ("mahbubnagar", "Mahabubnagar"),
    ("yadadri.", "Yadadri"),
    ("yadadri", "Yadadri"),
    // Bihar
    ("kaimur (bhabua)", "Kaimur"),
    ("kaimur bhabua", "Kaimur"),
    ("bhabua", "Kaimur"),
    ("purbi champaran", "East Champaran"),
    ("paschim champaran", "West Champaran"),
    ("monghyr", "Munger"),
    ("sheikhpura", "Sheikpura"),
    ("samstipur", "Samastipur"),
    // Jharkhand
    ("palamau", "Palamu"),
    ("pashchimi singhbhum", "West Singhbhum"),
    ("purbi singhbhum", "East Singhbhum"),
    ("saraikela-kharsawan", "Seraikela Kharsawan"),
    ("seraikela-kharsawan", "Seraikela Kharsawan"),
    ("hazaribag", "Hazaribagh"),
    ("kodarma", "Koderma"),
    ("pakaur", "Pakur"),
    ("sahebganj", "Sahibganj"),
    // Odisha
    ("baleshwar", "Balasore"),
    ("baleswar", "Balasore"),
    ("keonjhar", "Kendujhar"),
    ("nabarangapur", "Nabarangpur"),
    ("jagatsinghapur", "Jagatsinghpur"),
    ("anugul", "Angul"),
    ("baudh", "Boudh"),
    ("subarnapur", "Sonepur"),
    ("sonapur", "Sonepur"),
    ("jajapur", "Jajpur"),
    ("khorda", "Khordha"),
    ("sundargarh", "Sundergarh"),
    // Chhattisgarh
    ("kabeerdham", "Kabirdham"),
    ("koriya", "Korea"),
    ("janjgir champa", "Janjgir-Champa"),
    ("mohla-manpur-ambagarh chouki", "Mohla-Manpur-Ambagarh Chowki"),
    ("mohla manpur ambagarh chouki", "Mohla-Manpur-Ambagarh Chowki"),
    ("mohalla-manpur-ambagarh chouki", "Mohla-Manpur-Ambagarh Chowki"),
    ("gaurela-pendra-marwahi", "Gaurella Pendra Marwahi"),
    ("gaurela pendra marwahi", "Gaurella Pendra Marwahi"),
    ("sarangarh-bilaigarh", "Sarangarh Bilaigarh"),
    // Punjab
    ("ferozepur", "Firozpur"),
    ("s.a.s nagar", "S.A.S. Nagar"),
    ("s.a.s. nagar", "S.A.S. Nagar"),
    ("s.a.s nagar (mohali)", "S.A.S. Nagar"),
    ("sas nagar mohali", "S.A.S. Nagar"),
    ("mohali", "S.A.S. Nagar"),
    ("muktsar", "Sri Muktsar Sahib"),
    // Haryana
    ("gurgaon", "Gurugram"),
    ("mewat", "Nuh"),
    ("yamuna nagar", "Yamunanagar"),
    // Jammu and Kashmir / Ladakh
    ("baramulla", "Baramula"),
    ("bandipora", "Bandipore"),
    ("budgam", "Badgam"),
    ("shupiyan", "Shopian"),
    ("punch", "Poonch"),
    ("rajauri", "Rajouri"),
    ("ladakh", "Leh"),
    // Rajasthan
    ("chittaurgarh", "Chittorgarh"),
    ("jalor", "Jalore"),
    ("jhunjhunu", "Jhunjhunun"),
    ("didwana-kuchaman", "Didwana Kuchaman"),
    ("khairthal-tijara", "Khairthal Tijara"),
    ("kotputli-behror", "Kotputli Behror"),
    // Himachal Pradesh
    ("lahul spiti", "Lahaul And Spiti"),
    // North East
    ("tamulpur district", "Tamulpur"),
    ("kamrup metro", "Kamrup Metropolitan"),
    ("south salmara mankachar", "South Salmara-Mankachar"),
    ("ri-bhoi", "Ri Bhoi"),
    ("mamit", "Mammit"),
    ("shi-yomi", "Shi Yomi"),
    // Islands / Kerala
    ("nicobar", "Nicobars"),
    ("kasaragod", "Kasargod"),
];

/// Two-digit postal-circle prefixes. The pincode fallback only fires when
/// the state column resolved to nothing, so a coarse circle map is enough.
const PINCODE_ZONES: &[(&str, &str)] = &[
    ("11", "Delhi"),
    ("12", "Haryana"),
    ("13", "Haryana"),
    ("14", "Punjab"),
    ("15", "Punjab"),
    ("16", "Chandigarh"),
    ("17", "Himachal Pradesh"),
    ("18", "Jammu and Kashmir"),
    ("19", "Jammu and Kashmir"),
    ("20", "Uttar Pradesh"),
    ("21", "Uttar Pradesh"),
    ("22", "Uttar Pradesh"),
    ("23", "Uttar Pradesh"),
    ("24", "Uttar Pradesh"),
    ("25", "Uttar Pradesh"),
    ("26", "Uttar Pradesh"),
    ("27", "Uttar Pradesh"),
    ("28", "Uttar Pradesh"),
    ("30", "Rajasthan"),
    ("31", "Rajasthan"),
    ("32", "Rajasthan"),
    ("33", "Rajasthan"),
    ("34", "Rajasthan"),
    ("36", "Gujarat"),
    ("37", "Gujarat"),
    ("38", "Gujarat"),
    ("39", "Gujarat"),
    ("40", "Maharashtra"),
    ("41", "Maharashtra"),
    ("42", "Maharashtra"),
    ("43", "Maharashtra"),
    ("44", "Maharashtra"),
    ("45", "Madhya Pradesh"),
    ("46", "Madhya Pradesh"),
    ("47", "Madhya Pradesh"),
    ("48", "Madhya Pradesh"),
    ("49", "Chhattisgarh"),
    ("50", "Telangana"),
    ("51", "Andhra Pradesh"),
    ("52", "Andhra Pradesh"),
    ("53", "Andhra Pradesh"),
    ("56", "Karnataka"),
    ("57", "Karnataka"),
    ("58", "Karnataka"),
    ("59", "Karnataka"),
    ("60", "Tamil Nadu"),
    ("61", "Tamil Nadu"),
    ("62", "Tamil Nadu"),
    ("63", "Tamil Nadu"),
    ("64", "Tamil Nadu"),
    ("67", "Kerala"),
    ("68", "Kerala"),
    ("69", "Kerala"),
    ("70", "West Bengal"),
    ("71", "West Bengal"),
    ("72", "West Bengal"),
    ("73", "West Bengal"),
    ("74", "West Bengal"),
    ("75", "Odisha"),
    ("76", "Odisha"),
    ("77", "Odisha"),
    ("78", "Assam"),
    ("80", "Bihar"),
    ("81", "Bihar"),
    ("82", "Bihar"),
    ("83", "Jharkhand"),
    ("84", "Bihar"),
    ("85", "Bihar"),
];

/// Three-digit refinements for territories carved out of a parent circle.
/// Consulted before the two-digit zones.
const PINCODE_ZONE_OVERRIDES: &[(&str, &str)] = &[
    ("194", "Ladakh"),
    ("246", "Uttarakhand"),
    ("248", "Uttarakhand"),
    ("249", "Uttarakhand"),
    ("263", "Uttarakhand"),
    ("396", "Dadra and Nagar Haveli and Daman and Diu"),
    ("403", "Goa"),
    ("605", "Puducherry"),
    ("737", "Sikkim"),
    ("744", "Andaman and Nicobar Islands"),
    ("790", "Arunachal Pradesh"),
    ("791", "Arunachal Pradesh"),
    ("792", "Arunachal Pradesh"),
    ("793", "Meghalaya"),
    ("794", "Meghalaya"),
    ("795", "Manipur"),
    ("796", "Mizoram"),
    ("797", "Nagaland"),
    ("798", "Nagaland"),
    ("799", "Tripura"),
    ("814", "Jharkhand"),
    ("815", "Jharkhand"),
    ("816", "Jharkhand"),
    ("822", "Jharkhand"),
    ("825", "Jharkhand"),
    ("826", "Jharkhand"),
    ("827", "Jharkhand"),
    ("828", "Jharkhand"),
    ("829", "Jharkhand"),
];

/// Immutable lookup tables, built once at startup and shared by `Arc`.
pub struct GeoTables {
    state_aliases: HashMap<&'static str, &'static str>,
    valid_states: HashSet<&'static str>,
    district_aliases: HashMap<&'static str, &'static str>,
    zones: HashMap<&'static str, &'static str>,
    zone_overrides: HashMap<&'static str, &'static str>,
}

impl GeoTables {
    pub fn load() -> Self {
        Self {
            state_aliases: STATE_ALIASES.iter().copied().collect(),
            valid_states: VALID_STATES.iter().copied().collect(),
            district_aliases: DISTRICT_ALIASES.iter().copied().collect(),
            zones: PINCODE_ZONES.iter().copied().collect(),
            zone_overrides: PINCODE_ZONE_OVERRIDES.iter().copied().collect(),
        }
    }

    /// Resolve a raw state cell to its canonical name.
    ///
    /// Alias table first; a hit that is not a valid state (explicit garbage
    /// markers) rejects the row without trying the pincode. Only a complete
    /// alias miss falls back to the pincode prefix.
    pub fn normalize_state(&self, raw: &str, pincode: Option<&str>) -> Option<&'static str> {
        let cleaned = clean_state_text(raw);
        if !cleaned.is_empty() {
            if let Some(&canonical) = self.state_aliases.get(cleaned.as_str()) {
                return self.valid_states.contains(canonical).then_some(canonical);
            }
        }
        let canonical = self.state_from_pincode(pincode?)?;
        self.valid_states.contains(canonical).then_some(canonical)
    }

    /// Resolve a raw district cell. Never fails: empty or garbage input
    /// becomes "Unknown", everything else is cleaned, alias-corrected and
    /// title-cased. There is no closed district whitelist at this stage.
    pub fn normalize_district(&self, raw: &str) -> String {
        let cleaned = clean_district_text(raw);
        if cleaned.is_empty() {
            return "Unknown".to_string();
        }
        match self.district_aliases.get(cleaned.as_str()) {
            Some(corrected) => title_case(corrected),
            None => title_case(&cleaned),
        }
    }

    fn state_from_pincode(&self, pincode: &str) -> Option<&'static str> {
        // Exports render pincodes as floats ("560001.0"); keep the integer
        // prefix only.
        let pin = pincode.trim().split('.').next().unwrap_or("");
        if pin.len() < 6 || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.zone_overrides
            .get(&pin[..3])
            .or_else(|| self.zones.get(&pin[..2]))
            .copied()
    }

    #[cfg(test)]
    fn valid_states(&self) -> &HashSet<&'static str> {
        &self.valid_states
    }
}

/// Lowercase, strip everything outside `[a-z0-9 ]`, collapse whitespace.
fn clean_state_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
        } else {
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

/// Lowercase, drop asterisks, keep `[a-z0-9 \-().]`, collapse whitespace.
fn clean_district_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.to_lowercase().chars() {
        match ch {
            '*' => {}
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => out.push(c),
            '-' | '(' | ')' | '.' => out.push(ch),
            _ => out.push(' '),
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase every letter that follows a non-letter, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> GeoTables {
        GeoTables::load()
    }

    #[test]
    fn canonical_states_normalize_to_themselves() {
        let t = tables();
        for state in t.valid_states().clone() {
            assert_eq!(
                t.normalize_state(state, None),
                Some(state),
                "canonical name '{state}' must survive normalization"
            );
        }
    }

    #[test]
    fn state_aliases_and_noise() {
        let t = tables();
        assert_eq!(t.normalize_state("Orissa", None), Some("Odisha"));
        assert_eq!(t.normalize_state("  WEST   BENGAL. ", None), Some("West Bengal"));
        assert_eq!(t.normalize_state("Tamilnadu", None), Some("Tamil Nadu"));
        assert_eq!(t.normalize_state("Pondicherry", None), Some("Puducherry"));
        assert_eq!(t.normalize_state("New Delhi", None), Some("Delhi"));
        assert_eq!(t.normalize_state("Daman & Diu", None), Some("Dadra and Nagar Haveli and Daman and Diu"));
    }

    #[test]
    fn cities_entered_as_states_resolve() {
        let t = tables();
        assert_eq!(t.normalize_state("Nagpur", None), Some("Maharashtra"));
        assert_eq!(t.normalize_state("Greater Kailash-2", None), Some("Delhi"));
    }

    #[test]
    fn pincode_fallback_resolves_unknown_state() {
        let t = tables();
        assert_eq!(t.normalize_state("Gondwanaland", Some("560001")), Some("Karnataka"));
        assert_eq!(t.normalize_state("", Some("110032")), Some("Delhi"));
        // Decimal artifact from float-rendered exports
        assert_eq!(t.normalize_state("???", Some("794001.0")), Some("Meghalaya"));
        // Three-digit override beats the two-digit zone
        assert_eq!(t.normalize_state("x", Some("194101")), Some("Ladakh"));
        assert_eq!(t.normalize_state("x", Some("190001")), Some("Jammu and Kashmir"));
    }

    #[test]
    fn unresolvable_state_is_none() {
        let t = tables();
        assert_eq!(t.normalize_state("Gondwanaland", Some("000000")), None);
        assert_eq!(t.normalize_state("Gondwanaland", None), None);
        assert_eq!(t.normalize_state("", Some("12ab56")), None);
        assert_eq!(t.normalize_state("", Some("123")), None);
    }

    #[test]
    fn garbage_alias_hit_skips_pincode_fallback() {
        // "100000" is explicitly mapped to a non-state; the row is dropped
        // even when a perfectly good pincode is present.
        let t = tables();
        assert_eq!(t.normalize_state("100000", Some("110001")), None);
    }

    #[test]
    fn district_alias_corrections() {
        let t = tables();
        assert_eq!(t.normalize_district("bangalore"), "Bengaluru");
        assert_eq!(t.normalize_district("ALLAHABAD"), "Prayagraj");
        assert_eq!(t.normalize_district("K.V. Rangareddy"), "Rangareddy");
        assert_eq!(t.normalize_district("Y.S.R."), "Y.S.R. Kadapa");
        assert_eq!(t.normalize_district("Mumbai( Sub Urban )"), "Mumbai Suburban");
        assert_eq!(t.normalize_district("medchal malkajgiri"), "Medchal-Malkajgiri");
    }

    #[test]
    fn district_without_alias_is_title_cased() {
        let t = tables();
        assert_eq!(t.normalize_district("north 24 parganas"), "North 24 Parganas");
        assert_eq!(t.normalize_district("  EAST  godavari  "), "East Godavari");
        assert_eq!(t.normalize_district("some-new (district)"), "Some-New (District)");
    }

    #[test]
    fn district_strips_asterisks_and_noise() {
        let t = tables();
        assert_eq!(t.normalize_district("Pune*"), "Pune");
        assert_eq!(t.normalize_district("Kolkata@#"), "Kolkata");
    }

    #[test]
    fn district_never_fails() {
        let t = tables();
        assert_eq!(t.normalize_district(""), "Unknown");
        assert_eq!(t.normalize_district("***"), "Unknown");
        assert_eq!(t.normalize_district("@!#"), "Unknown");
    }

    #[test]
    fn title_case_matches_source_semantics() {
        assert_eq!(title_case("north 24 parganas"), "North 24 Parganas");
        assert_eq!(title_case("y.s.r. kadapa"), "Y.S.R. Kadapa");
        assert_eq!(title_case("medchal-malkajgiri"), "Medchal-Malkajgiri");
        assert_eq!(title_case("BENGALURU"), "Bengaluru");
    }
}
