//! Getty vocabulary source (controlled-vocabulary authority).
//!
//! Matches the candidate's canonical name exactly against vocabulary
//! labels and reads the preferred biography: estimated birth and death
//! years and, when present, an English gender label that gets translated
//! through the source's own vocabulary table. The display label is
//! `"Surname, Forename"`, so it splits at the first comma.

use crate::models::{Candidate, Field};
use crate::source::{Binding, ExternalSource};

const QUERY: &str = r##"
select distinct * {
  ?g skos:exactMatch [ rdfs:label "#NAME#" ];
     foaf:focus/gvp:biographyPreferred ?bio;
      gvp:prefLabelGVP [xl:literalForm ?label ].

     ?bio
       gvp:estStart ?birth;
       gvp:estEnd ?death;

   optional { ?bio  schema:gender [ rdfs:label ?gender ]
      filter langMatches(lang(?gender), "en")
   }
   #filter (  ?birth < "#LIVEDBEFORE#"^^xsd:gYear && ?death >= "#LIVEDAFTER#"^^xsd:gYear)
}
"##;

pub struct GettySource {
    endpoint: String,
    genders: std::collections::BTreeMap<String, String>,
}

impl GettySource {
    pub fn new(endpoint: &str, genders: std::collections::BTreeMap<String, String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            genders,
        }
    }
}

impl ExternalSource for GettySource {
    fn name(&self) -> &str {
        "Getty"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Substitutes the name and, when the candidate has a timeline,
    /// activates the live-span filter by uncommenting its marker.
    fn build_query(&self, candidate: &Candidate) -> String {
        let mut query = QUERY.replace("#NAME#", candidate.name());
        if let (Some(before), Some(after)) = (candidate.earliest_year(), candidate.latest_year()) {
            query = query
                .replace("#filter", "filter")
                .replace("#LIVEDBEFORE#", before)
                .replace("#LIVEDAFTER#", after);
        }
        query
    }

    fn map_result(&self, binding: &Binding, candidate: &mut Candidate) {
        if let Some(reference) = binding.get("g") {
            candidate.set(Field::Ulan, reference);
        }
        if let Some(label) = binding.get("label") {
            // Vocabulary labels carry no structured name parts; split the
            // display form at the first comma.
            match label.split_once(',') {
                Some((surname, forename)) => {
                    candidate.set_if_empty(Field::Surname, surname);
                    candidate.set_if_empty(Field::Forename, forename.trim());
                }
                None => {
                    candidate.set_if_empty(Field::Surname, label);
                }
            }
        }
        if let Some(gender) = binding.get("gender") {
            if let Some(translated) = self.genders.get(gender) {
                candidate.set_if_empty(Field::Gender, translated);
            }
        }
        if let Some(birth) = binding.get("birth") {
            candidate.set_if_empty(Field::Birth, birth);
        }
        if let Some(death) = binding.get("death") {
            candidate.set_if_empty(Field::Death, death);
        }
    }
}
