use std::fmt::Display;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
#[error("Unrecognized control kind '{0}'. Accepted values: 'text', 'checkbox', 'hidden', 'submit', 'select'")]
pub struct FieldKindParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Checkbox,
    Hidden,
    Submit,
    Select,
}

impl FromStr for FieldKind {
    type Err = FieldKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(FieldKind::Text),
            "checkbox" => Ok(FieldKind::Checkbox),
            "hidden" => Ok(FieldKind::Hidden),
            "submit" => Ok(FieldKind::Submit),
            "select" => Ok(FieldKind::Select),
            _ => Err(FieldKindParseError(s.to_string())),
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Checkbox => write!(f, "checkbox"),
            FieldKind::Hidden => write!(f, "hidden"),
            FieldKind::Submit => write!(f, "submit"),
            FieldKind::Select => write!(f, "select"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// One control of the search form. `options` is only populated for
/// [`FieldKind::Select`] and keeps document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub name: String,
    pub id: Option<String>,
    pub default_value: String,
    pub options: Vec<SelectOption>,
}

impl FieldSpec {
    /// Label used when prompting: the control id if present, otherwise its name.
    pub fn display_name(&self) -> &str {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn find_option(&self, key: &str) -> Option<&SelectOption> {
        let key = key.trim();
        self.options
            .iter()
            .find(|opt| opt.value.eq_ignore_ascii_case(key))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    /// Anything other than `post` (case-insensitive) falls back to GET.
    pub fn from_attr(attr: Option<&str>) -> Self {
        match attr.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => Method::Post,
            _ => Method::Get,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub submit_url: String,
    pub method: Method,
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Display for FormSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} {}", self.method, self.submit_url)?;
        for field in &self.fields {
            write!(f, "│  {} ({})", field.name, field.kind)?;
            if field.kind == FieldKind::Select {
                write!(f, " [{} option(s)]", field.options.len())?;
            }
            writeln!(f)?;
        }
        write!(f, "└─ {} field(s)", self.fields.len())
    }
}

/// Resolved values keyed by field name, kept in schema order so every
/// submission encodes the parameters identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameters(Vec<(String, String)>);

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Catalog-specific card number, e.g. `AB/W31-E058`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIdentifier(String);

impl ItemIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemIdentifier {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub items: Vec<ItemIdentifier>,
    pub next_page_links: Vec<String>,
}

pub const NAME_FIELD: &str = "Card Name";
pub const IMAGE_FIELD: &str = "Card Img";

/// Decoded attributes of one card in the order they were read from the
/// detail page. Serializes as a JSON object with that order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            fields: vec![
                (NAME_FIELD.to_string(), name.into()),
                (IMAGE_FIELD.to_string(), image.into()),
            ],
        }
    }

    pub(crate) fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let (label, value) = (label.into(), value.into());
        match self.fields.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn name(&self) -> &str {
        self.get(NAME_FIELD).unwrap_or_default()
    }

    pub fn image(&self) -> &str {
        self.get(IMAGE_FIELD).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (label, value) in &self.fields {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (label, value) in &self.fields {
            writeln!(f, "{}: {}", label, value)?;
        }
        Ok(())
    }
}
