/// Address Object Module
///
/// Contacts and groups are stored together with the identifiers of the card
/// they were created from on the CardDAV server. Groups derived from a
/// contact's CATEGORIES property have no such card.
use super::condition::Conditions;
use super::connection::Database;
use super::handle::{DbHandle, Value};
use crate::core::{Result, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

static EMAIL_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^email(:|$)").unwrap());

/// Contact columns copied from the save data when present.
const CONTACT_COLUMNS: &[&str] = &["firstname", "surname", "organization", "showas", "email"];

/// A property of an address object, as produced by the vCard converter.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveValue {
    One(String),
    Many(Vec<String>),
}

impl SaveValue {
    pub fn values(&self) -> &[String] {
        match self {
            SaveValue::One(v) => std::slice::from_ref(v),
            SaveValue::Many(v) => v,
        }
    }

    /// Single text representation; multiple values are joined with `", "`.
    pub fn to_text(&self) -> String {
        self.values().join(", ")
    }
}

impl From<&str> for SaveValue {
    fn from(value: &str) -> Self {
        SaveValue::One(value.to_string())
    }
}

impl From<String> for SaveValue {
    fn from(value: String) -> Self {
        SaveValue::One(value)
    }
}

impl From<Vec<String>> for SaveValue {
    fn from(values: Vec<String>) -> Self {
        SaveValue::Many(values)
    }
}

impl From<Vec<&str>> for SaveValue {
    fn from(values: Vec<&str>) -> Self {
        SaveValue::Many(values.into_iter().map(String::from).collect())
    }
}

/// Address object properties keyed by attribute name (`name`, `email:home`, ...).
pub type SaveData = BTreeMap<String, SaveValue>;

/// The server-side card an address object was created from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CardRef<'a> {
    pub etag: Option<&'a str>,
    pub uri: Option<&'a str>,
    pub vcard: Option<&'a str>,
}

impl<'a> CardRef<'a> {
    pub fn new(etag: &'a str, uri: &'a str, vcard: &'a str) -> Self {
        CardRef {
            etag: Some(etag),
            uri: Some(uri),
            vcard: Some(vcard),
        }
    }

    /// No backing card, as for groups built from CATEGORIES.
    pub fn none() -> Self {
        CardRef::default()
    }
}

/// Builds the aggregate `email` column from every `email` / `email:<type>` property.
pub fn aggregate_email(save_data: &SaveData) -> String {
    save_data
        .iter()
        .filter(|(key, _)| EMAIL_KEY.is_match(key))
        .flat_map(|(_, value)| value.values().iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(", ")
}

impl<H: DbHandle> Database<H> {
    /// Stores a contact, inserting it unless `dbid` names an existing record.
    ///
    /// # Returns
    ///
    /// The database id of the created or updated contact.
    pub fn store_contact(
        &mut self,
        abook_id: &str,
        card: CardRef<'_>,
        save_data: &SaveData,
        dbid: Option<&str>,
    ) -> Result<String> {
        let mut save_data = save_data.clone();
        save_data.insert("email".to_string(), SaveValue::One(aggregate_email(&save_data)));

        let extra: Vec<(&str, Value)> = CONTACT_COLUMNS
            .iter()
            .filter_map(|&col| save_data.get(col).map(|v| (col, Value::Text(v.to_text()))))
            .collect();

        self.store_address_object("contacts", abook_id, card, &save_data, dbid, extra)
    }

    /// Stores a group.
    ///
    /// Groups based on a KIND=group vCard carry the card; groups derived from
    /// CATEGORIES pass `CardRef::none()`.
    pub fn store_group(
        &mut self,
        abook_id: &str,
        save_data: &SaveData,
        dbid: Option<&str>,
        card: CardRef<'_>,
    ) -> Result<String> {
        self.store_address_object("groups", abook_id, card, save_data, dbid, Vec::new())
    }

    /// Inserts a new contact or group, or updates an existing one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if `save_data` has no `name`.
    pub fn store_address_object(
        &mut self,
        table: &str,
        abook_id: &str,
        card: CardRef<'_>,
        save_data: &SaveData,
        dbid: Option<&str>,
        extra: Vec<(&str, Value)>,
    ) -> Result<String> {
        let name = save_data.get("name").ok_or_else(|| {
            StoreError::InvalidArgument(format!("{table} entry without name"))
        })?;
        let card_desc = card.uri.unwrap_or("(entry not backed by card)");

        let (mut columns, mut values): (Vec<&str>, Vec<Value>) = extra.into_iter().unzip();
        columns.push("name");
        values.push(Value::Text(name.to_text()));

        if let Some(etag) = card.etag {
            columns.push("etag");
            values.push(etag.into());
        }
        if let Some(vcard) = card.vcard {
            columns.push("vcard");
            values.push(vcard.into());
        }

        match dbid {
            Some(dbid) => {
                debug!("UPDATE card {}/{} in {}", dbid, card_desc, table);
                self.update(Conditions::id(dbid), &columns, &values, table)?;
                Ok(dbid.to_string())
            }
            None => {
                debug!("INSERT card {} to {}", card_desc, table);
                columns.push("abook_id");
                values.push(abook_id.into());

                if let Some(uri) = card.uri {
                    columns.push("uri");
                    values.push(uri.into());
                }
                if let Some(cuid) = save_data.get("cuid") {
                    columns.push("cuid");
                    values.push(Value::Text(cuid.to_text()));
                }

                self.insert(table, &columns, &values)
            }
        }
    }
}
