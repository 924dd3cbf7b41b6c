//! Wikidata source (general linked-data graph).
//!
//! Finds humans via the search service, then reads structured given and
//! family names, gender, birth and death timestamps, and places. When
//! the structured name parts are missing, the display label is split at
//! the given-name token — preferring whichever token actually occurs in
//! the label, since an earlier source may already have filled the
//! forename in a different spelling.

use crate::models::{Candidate, Field};
use crate::source::{Binding, ExternalSource};

const QUERY: &str = r#"
SELECT DISTINCT ?item ?itemLabel ?birth ?VornameLabel ?FamiliennameLabel ?death ?genderLabel ?placeOfBirthLabel ?placeOfDeathLabel WHERE {
  hint:Query hint:optimizer "None".
  SERVICE wikibase:mwapi {
    bd:serviceParam wikibase:api "Search";
      wikibase:endpoint "www.wikidata.org";
      mwapi:srsearch "'#NAME#' haswbstatement:P31=Q5".
    ?item wikibase:apiOutputItem mwapi:title.
  }
  SERVICE wikibase:label { bd:serviceParam wikibase:language "[AUTO_LANGUAGE],de,en". }
  OPTIONAL { ?item wdt:P735 ?Vorname. }
  OPTIONAL { ?item wdt:P734 ?Familienname. }
  #VALUES ?livedBefore {"+#LIVEDBEFORE#-01-01"^^xsd:dateTime}
  #VALUES ?livedAfter {"+#LIVEDAFTER#-01-01"^^xsd:dateTime}
  ?item wdt:P569 ?birth;
    wdt:P570 ?death.
  #filter((YEAR(?birth)) < YEAR(?livedBefore))
  #filter(YEAR(?death) >= YEAR(?livedAfter))
  OPTIONAL { ?item wdt:P21 ?gender. }
  OPTIONAL { ?item wdt:P20 ?placeOfDeath. }
  OPTIONAL { ?item wdt:P19 ?placeOfBirth. }
}
"#;

pub struct WikidataSource {
    endpoint: String,
    genders: std::collections::BTreeMap<String, String>,
}

impl WikidataSource {
    pub fn new(endpoint: &str, genders: std::collections::BTreeMap<String, String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            genders,
        }
    }

    /// Translate a gender label through this source's table; labels the
    /// table does not know pass through unchanged (they arrive already
    /// localized by the label service).
    fn translate_gender(&self, label: &str) -> String {
        self.genders
            .get(label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }
}

/// Reformat an ISO-like timestamp into `day.month.year`, truncating to
/// the parts actually present: year-only, month-year, or full date.
fn parse_date(raw: &str) -> String {
    let date = raw.split('T').next().unwrap_or(raw);
    let parts: Vec<&str> = date.split('-').collect();
    match parts.as_slice() {
        [year, month, day, ..] => format!("{day}.{month}.{year}"),
        [year, month] => format!("{month}.{year}"),
        _ => date.to_string(),
    }
}

impl ExternalSource for WikidataSource {
    fn name(&self) -> &str {
        "Wikidata"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_query(&self, candidate: &Candidate) -> String {
        let mut query = QUERY.replace("#NAME#", candidate.name());
        if let (Some(before), Some(after)) = (candidate.earliest_year(), candidate.latest_year()) {
            query = query
                .replace("#filter", "filter")
                .replace("#VALUES", "VALUES")
                .replace("#LIVEDBEFORE#", before)
                .replace("#LIVEDAFTER#", after);
        }
        query
    }

    fn map_result(&self, binding: &Binding, candidate: &mut Candidate) {
        if let Some(reference) = binding.get("item") {
            candidate.set(Field::Wikidata, reference);
        }
        let label = binding.get("itemLabel").map(String::as_str).unwrap_or("");

        // A given name found here becomes the alternate splitting token
        // when an earlier source already filled the forename.
        let mut alt_forename = candidate.get(Field::Forename).to_string();
        if let Some(given) = binding.get("VornameLabel") {
            if candidate.get(Field::Forename).is_empty() {
                candidate.set(Field::Forename, given);
            } else {
                alt_forename = given.clone();
            }
        }

        if let Some(family) = binding.get("FamiliennameLabel") {
            candidate.set_if_empty(Field::Surname, family);
        } else {
            let forename = candidate.get(Field::Forename).to_string();
            let by_forename = label.split(&format!("{forename} ")).count();
            let by_alt = label.split(&format!("{alt_forename} ")).count();
            if by_forename > 1 || by_alt > 1 {
                let token = if by_forename >= by_alt {
                    forename.clone()
                } else {
                    alt_forename
                };
                let parts: Vec<&str> = label.split(&format!("{token} ")).collect();
                candidate.set_if_empty(Field::Surname, parts[1..].join(" ").trim());
                if candidate.get(Field::Forename).is_empty() {
                    let first_word = label.split(' ').next().unwrap_or("");
                    candidate.set(Field::Forename, first_word);
                }
            }
        }

        if let Some(gender) = binding.get("genderLabel") {
            let translated = self.translate_gender(gender);
            candidate.set_if_empty(Field::Gender, &translated);
        }
        if let Some(birth) = binding.get("birth") {
            candidate.set_if_empty(Field::Birth, &parse_date(birth));
        }
        if let Some(death) = binding.get("death") {
            candidate.set_if_empty(Field::Death, &parse_date(death));
        }
        if let Some(place) = binding.get("placeOfBirthLabel") {
            candidate.set_if_empty(Field::PlaceOfBirth, place);
        }
        if let Some(place) = binding.get("placeOfDeathLabel") {
            candidate.set_if_empty(Field::PlaceOfDeath, place);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn source() -> WikidataSource {
        WikidataSource::new("https://query.wikidata.org/sparql", BTreeMap::new())
    }

    fn binding(pairs: &[(&str, &str)]) -> Binding {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn dates_truncate_to_present_parts() {
        assert_eq!(parse_date("1942-10-31T00:00:00Z"), "31.10.1942");
        assert_eq!(parse_date("1942-10"), "10.1942");
        assert_eq!(parse_date("1942"), "1942");
    }

    #[test]
    fn query_with_timeline_activates_values_and_filters() {
        let mut candidate = Candidate::new("Elisàr von Kupffer");
        candidate.add_date("1923-1939");
        let query = source().build_query(&candidate);
        assert!(!query.contains("#VALUES"));
        assert!(!query.contains("#filter"));
        assert!(query.contains(r#"VALUES ?livedBefore {"+1923-01-01"^^xsd:dateTime}"#));
        assert!(query.contains(r#"VALUES ?livedAfter {"+1939-01-01"^^xsd:dateTime}"#));
    }

    #[test]
    fn structured_names_win_over_label_splitting() {
        let mut candidate = Candidate::new("Elisàr von Kupffer");
        source().map_result(
            &binding(&[
                ("item", "http://www.wikidata.org/entity/Q123"),
                ("itemLabel", "Elisàr von Kupffer"),
                ("VornameLabel", "Elisàr"),
                ("FamiliennameLabel", "Kupffer"),
                ("birth", "1872-02-20T00:00:00Z"),
                ("death", "1942-10-31T00:00:00Z"),
            ]),
            &mut candidate,
        );
        assert_eq!(candidate.get(Field::Surname), "Kupffer");
        assert_eq!(candidate.get(Field::Forename), "Elisàr");
        assert_eq!(candidate.get(Field::Death), "31.10.1942");
    }

    #[test]
    fn earlier_forename_is_kept_and_used_as_alternate() {
        // Getty already filled "Elisar von"; the Wikidata given name only
        // serves as the alternate splitting token.
        let mut candidate = Candidate::new("Elisàr von Kupffer");
        candidate.set(Field::Forename, "Elisar von");
        source().map_result(
            &binding(&[
                ("itemLabel", "Elisàr von Kupffer"),
                ("VornameLabel", "Elisàr"),
            ]),
            &mut candidate,
        );
        assert_eq!(candidate.get(Field::Forename), "Elisar von");
        // Label splits at "Elisàr ", not at the Getty spelling.
        assert_eq!(candidate.get(Field::Surname), "von Kupffer");
    }

    #[test]
    fn label_fallback_splits_at_first_word() {
        let mut candidate = Candidate::new("Adhemar Gonzaga");
        source().map_result(
            &binding(&[
                ("item", "http://www.wikidata.org/entity/Q345"),
                ("itemLabel", "Adhemar Gonzaga"),
            ]),
            &mut candidate,
        );
        assert_eq!(candidate.get(Field::Forename), "Adhemar");
        assert_eq!(candidate.get(Field::Surname), "Gonzaga");
    }

    #[test]
    fn places_and_gender_only_fill_gaps() {
        let mut candidate = Candidate::new("A");
        candidate.set(Field::Gender, "weiblich");
        source().map_result(
            &binding(&[
                ("genderLabel", "männlich"),
                ("placeOfBirthLabel", "Basel"),
            ]),
            &mut candidate,
        );
        assert_eq!(candidate.get(Field::Gender), "weiblich");
        assert_eq!(candidate.get(Field::PlaceOfBirth), "Basel");
    }

    #[test]
    fn gender_table_translates_known_labels() {
        let mut table = BTreeMap::new();
        table.insert("male".to_string(), "männlich".to_string());
        let source = WikidataSource::new("https://query.wikidata.org/sparql", table);
        let mut candidate = Candidate::new("A");
        source.map_result(&binding(&[("genderLabel", "male")]), &mut candidate);
        assert_eq!(candidate.get(Field::Gender), "männlich");
    }
}
