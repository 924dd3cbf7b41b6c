//! Registry lookup: does this person already exist?
//!
//! Builds a full-text search against the registry's Person module,
//! limited to a small result page, and returns the first matching
//! record id. Pure read; the merge policy lives with the external
//! sources.

use anyhow::Result;
use async_trait::async_trait;

use crate::session::{xml, SessionClient};

pub const PERSON_SEARCH_PATH: &str = "/ria-ws/application/module/Person/search";

const PERSON_SEARCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<application xmlns="http://www.zetcom.com/ria/ws/module/search"
             xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
             xsi:schemaLocation="http://www.zetcom.com/ria/ws/module/search http://www.zetcom.com/ria/ws/module/search/search_1_1.xsd">
  <modules>
    <module name="Person">
      <search limit="10" offset="0">
        <select><field fieldPath="__id"/></select>
        <fulltext>#TERM#</fulltext>
      </search>
    </module>
  </modules>
</application>"#;

/// Seam between the engine and the registry, so batch logic can be
/// exercised without a live session.
#[async_trait]
pub trait RegistryLookup: Send {
    async fn find_local_id(&mut self, name: &str) -> Result<Option<String>>;
}

pub struct AuthorityLookup<'a> {
    session: &'a SessionClient,
}

impl<'a> AuthorityLookup<'a> {
    pub fn new(session: &'a SessionClient) -> Self {
        Self { session }
    }
}

#[async_trait]
impl RegistryLookup for AuthorityLookup<'_> {
    async fn find_local_id(&mut self, name: &str) -> Result<Option<String>> {
        let body = person_search_body(name);
        let response = self.session.search(PERSON_SEARCH_PATH, body).await?;
        first_person_id(&response)
    }
}

/// Substitute the canonical name into the full-text search template.
pub fn person_search_body(name: &str) -> String {
    PERSON_SEARCH.replace("#TERM#", &quick_xml::escape::escape(name))
}

/// Id of the first module item in a search response, if any matched.
pub fn first_person_id(response: &str) -> Result<Option<String>> {
    xml::first_attr(response, "moduleItem", "id")
}
