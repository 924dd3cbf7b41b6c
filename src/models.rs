//! Core data model: the in-flight [`Candidate`] record and its closed
//! set of [`Field`]s.
//!
//! A candidate is built from a raw input name plus any number of date
//! expressions, checked against the local registry, and then enriched by
//! the external sources. Enrichment follows a merge-only-empty policy:
//! a source may only fill a field that is still blank, with the single
//! exception of the source's own reference field.

/// The closed set of attributes a candidate can carry.
///
/// External sources and the row I/O boundary address candidate data
/// exclusively through this enum; the schema mapping translates between
/// these fields and external column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    InputName,
    Name,
    LocalId,
    Surname,
    Forename,
    Gender,
    Birth,
    Death,
    PlaceOfBirth,
    PlaceOfDeath,
    Ulan,
    Wikidata,
    Link,
    Era,
    LifeData,
    LivedBefore,
    LivedAfter,
}

/// A person record being reconciled against the registry and the
/// external knowledge bases.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    /// The raw name as it appeared in the input, untouched.
    pub input_name: String,
    /// Canonical search name, derived once at construction.
    name: String,
    /// Registry id, set once by the authority lookup. Present means the
    /// person already exists and no external resolution is attempted.
    local_id: Option<String>,
    /// Year tokens, kept sorted ascending. Four-digit years sort the
    /// same lexicographically and numerically.
    pub dates: Vec<String>,
    /// True once a rate-limit backoff has been spent on this candidate.
    pub query_failed: bool,

    surname: String,
    forename: String,
    gender: String,
    birth: String,
    death: String,
    place_of_birth: String,
    place_of_death: String,
    ulan: String,
    wikidata: String,
    link: String,
    era: String,
    life_data: String,
    lived_before: String,
    lived_after: String,
}

/// Strip quoting and parenthetical annotations from a raw input name.
///
/// Removes every `"`, trims whitespace, and truncates at the first `(`.
/// Idempotent; two inputs that normalize identically are treated as the
/// same person.
pub fn normalize_name(raw: &str) -> String {
    let name = raw.replace('"', "");
    let name = name.trim();
    match name.split_once('(') {
        Some((head, _)) => head.trim_end().to_string(),
        None => name.to_string(),
    }
}

impl Candidate {
    pub fn new(input_name: &str) -> Self {
        Self {
            input_name: input_name.to_string(),
            name: normalize_name(input_name),
            ..Self::default()
        }
    }

    /// The canonical search name. Never re-derived after construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    /// Record the registry id. A once-set id is never overwritten.
    pub fn set_local_id(&mut self, id: &str) {
        if self.local_id.is_none() && !id.is_empty() {
            self.local_id = Some(id.to_string());
        }
    }

    pub fn earliest_year(&self) -> Option<&str> {
        self.dates.first().map(String::as_str)
    }

    pub fn latest_year(&self) -> Option<&str> {
        self.dates.last().map(String::as_str)
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::InputName => &self.input_name,
            Field::Name => &self.name,
            Field::LocalId => self.local_id.as_deref().unwrap_or(""),
            Field::Surname => &self.surname,
            Field::Forename => &self.forename,
            Field::Gender => &self.gender,
            Field::Birth => &self.birth,
            Field::Death => &self.death,
            Field::PlaceOfBirth => &self.place_of_birth,
            Field::PlaceOfDeath => &self.place_of_death,
            Field::Ulan => &self.ulan,
            Field::Wikidata => &self.wikidata,
            Field::Link => &self.link,
            Field::Era => &self.era,
            Field::LifeData => &self.life_data,
            Field::LivedBefore => &self.lived_before,
            Field::LivedAfter => &self.lived_after,
        }
    }

    /// Set a field unconditionally. Sources use this only for their own
    /// reference field; everything else goes through
    /// [`set_if_empty`](Candidate::set_if_empty).
    pub fn set(&mut self, field: Field, value: &str) {
        match field {
            Field::InputName => self.input_name = value.to_string(),
            // The canonical name is fixed at construction; row refresh is
            // the one path that restores it verbatim.
            Field::Name => self.name = value.to_string(),
            Field::LocalId => self.set_local_id(value),
            Field::Surname => self.surname = value.to_string(),
            Field::Forename => self.forename = value.to_string(),
            Field::Gender => self.gender = value.to_string(),
            Field::Birth => self.birth = value.to_string(),
            Field::Death => self.death = value.to_string(),
            Field::PlaceOfBirth => self.place_of_birth = value.to_string(),
            Field::PlaceOfDeath => self.place_of_death = value.to_string(),
            Field::Ulan => self.ulan = value.to_string(),
            Field::Wikidata => self.wikidata = value.to_string(),
            Field::Link => self.link = value.to_string(),
            Field::Era => self.era = value.to_string(),
            Field::LifeData => self.life_data = value.to_string(),
            Field::LivedBefore => self.lived_before = value.to_string(),
            Field::LivedAfter => self.lived_after = value.to_string(),
        }
    }

    /// Fill a field only if it is currently empty. Returns true when the
    /// value was taken.
    pub fn set_if_empty(&mut self, field: Field, value: &str) -> bool {
        if self.get(field).is_empty() && !value.is_empty() {
            self.set(field, value);
            true
        } else {
            false
        }
    }

    /// Whether any enrichment field beyond the raw input carries data.
    pub fn is_enriched(&self) -> bool {
        [
            &self.surname,
            &self.forename,
            &self.gender,
            &self.birth,
            &self.death,
            &self.place_of_birth,
            &self.place_of_death,
            &self.ulan,
            &self.wikidata,
        ]
        .iter()
        .any(|f| !f.is_empty())
    }

    /// Recompute the derived display fields from the current state:
    /// live-span bounds, the preferred external link, the era label, and
    /// the compact life-data span.
    pub fn refresh_derived(&mut self) {
        self.lived_before = self.earliest_year().unwrap_or("").to_string();
        self.lived_after = self.latest_year().unwrap_or("").to_string();
        self.link = if !self.wikidata.is_empty() {
            self.wikidata.clone()
        } else {
            self.ulan.clone()
        };
        self.set_era();
        self.set_life_data();
    }

    /// Era from the birth year: century prefix plus one, or plus two for
    /// years from xx80 on.
    fn set_era(&mut self) {
        let Some(year) = trailing_year(&self.birth) else {
            return;
        };
        let (Ok(century), Ok(rest)) = (year[..2].parse::<u32>(), year[2..].parse::<u32>()) else {
            return;
        };
        let era = century + if rest >= 80 { 2 } else { 1 };
        self.era = format!("{era}. century");
    }

    fn set_life_data(&mut self) {
        if let (Some(birth), Some(death)) = (trailing_year(&self.birth), trailing_year(&self.death))
        {
            self.life_data = format!("{birth}\u{2013}{death}");
        }
    }
}

/// Last four-digit run in a loosely formatted date string, e.g.
/// `"01.12.1888"` or `"12/12/1938"`.
fn trailing_year(date: &str) -> Option<&str> {
    date.split(|c: char| !c.is_ascii_digit())
        .filter(|part| part.len() == 4)
        .last()
}
