//! HTTP headers handling
//!
//! This module provides an ordered, multi-valued header collection.
//!
//! Labels are canonicalized to Train-Case on insertion (`content_type` and
//! `CONTENT-TYPE` are both stored as `Content-Type`), so lookups are
//! insensitive to case and to the `_`/`-` separator. Values never contain CR
//! or LF. A label holding a single value reads back as a scalar, a label
//! holding several values reads back as a sequence.

use super::{Error, Result, CRLF, DEFAULT_SEPARATOR};
use indexmap::IndexMap;
use std::fmt;

/// Canonicalize a header label.
///
/// Characters outside `[A-Za-z0-9_-]` are dropped, every `_` or `-` becomes a
/// word break, and each word is capitalized: `content_type` becomes
/// `Content-Type`.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut word_start = true;

    for c in label.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => {
                if word_start {
                    out.push(c.to_ascii_uppercase());
                } else {
                    out.push(c.to_ascii_lowercase());
                }
                word_start = false;
            }
            '_' | '-' => {
                out.push('-');
                word_start = true;
            }
            _ => {}
        }
    }

    out
}

/// Map a camelCase property name to a header label.
///
/// A `-` is inserted where a lowercase letter or digit is followed by a
/// capital, then each word is capitalized. Words that are already fully
/// upper case are kept: `contentType` gives `Content-Type` and `contentMD5`
/// gives `Content-MD5`.
pub fn property_label(name: &str) -> String {
    let mut separated = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if let Some(p) = prev {
                if p.is_ascii_lowercase() || p.is_ascii_digit() {
                    separated.push('-');
                }
            }
        }
        separated.push(c);
        prev = Some(c);
    }

    separated
        .split(['-', '_'])
        .map(|word| {
            let upper = word.chars().any(|c| c.is_ascii_alphabetic())
                && !word.chars().any(|c| c.is_ascii_lowercase());
            if upper && word.len() > 1 {
                word.to_string()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                    }
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Strip CR and LF from a header value
fn clean_value(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

fn is_numeric(label: &str) -> bool {
    let trimmed = label.trim();
    trimmed.bytes().any(|b| b.is_ascii_digit()) && trimmed.parse::<f64>().is_ok()
}

/// Validate and canonicalize a label given by a caller
fn checked_label(label: &str) -> Result<String> {
    if label.is_empty() || is_numeric(label) {
        return Err(Error::InvalidLabel(label.to_string()));
    }

    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return Err(Error::InvalidLabel(label.to_string()));
    }

    Ok(normalized)
}

/// A value handed to [`HeaderCollection::set`]: one entry or a list of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderInput {
    Single(String),
    List(Vec<String>),
}

impl HeaderInput {
    /// Sanitized entries for storage
    fn into_values(self) -> Vec<String> {
        match self {
            HeaderInput::Single(value) => vec![clean_value(&value)],
            HeaderInput::List(values) => values.iter().map(|v| clean_value(v)).collect(),
        }
    }
}

impl From<&str> for HeaderInput {
    fn from(value: &str) -> Self {
        HeaderInput::Single(value.to_string())
    }
}

impl From<String> for HeaderInput {
    fn from(value: String) -> Self {
        HeaderInput::Single(value)
    }
}

impl From<&String> for HeaderInput {
    fn from(value: &String) -> Self {
        HeaderInput::Single(value.clone())
    }
}

impl From<usize> for HeaderInput {
    fn from(value: usize) -> Self {
        HeaderInput::Single(value.to_string())
    }
}

impl From<Vec<String>> for HeaderInput {
    fn from(values: Vec<String>) -> Self {
        HeaderInput::List(values)
    }
}

impl From<Vec<&str>> for HeaderInput {
    fn from(values: Vec<&str>) -> Self {
        HeaderInput::List(values.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for HeaderInput {
    fn from(values: [&str; N]) -> Self {
        HeaderInput::List(values.iter().map(|v| v.to_string()).collect())
    }
}

/// A missing value is stored as an empty string
impl<T: Into<HeaderInput>> From<Option<T>> for HeaderInput {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => HeaderInput::Single(String::new()),
        }
    }
}

/// A stored header value as read back: flattened to a scalar when the label
/// holds a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Single(&'a str),
    Multiple(&'a [String]),
}

impl<'a> FieldValue<'a> {
    fn flatten(values: &'a [String]) -> Self {
        if values.len() == 1 {
            FieldValue::Single(&values[0])
        } else {
            FieldValue::Multiple(values)
        }
    }

    /// Join the entries with `"<separator> "`
    pub fn join(&self, separator: &str) -> String {
        match self {
            FieldValue::Single(value) => value.to_string(),
            FieldValue::Multiple(values) => values.join(&format!("{} ", separator)),
        }
    }

    /// The scalar value, if there is exactly one entry
    pub fn as_single(&self) -> Option<&'a str> {
        match *self {
            FieldValue::Single(value) => Some(value),
            FieldValue::Multiple(_) => None,
        }
    }

    /// All entries in order
    pub fn to_vec(&self) -> Vec<&'a str> {
        match *self {
            FieldValue::Single(value) => vec![value],
            FieldValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        match self {
            FieldValue::Single(_) => 1,
            FieldValue::Multiple(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq<&str> for FieldValue<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_single() == Some(*other)
    }
}

impl<const N: usize> PartialEq<[&str; N]> for FieldValue<'_> {
    fn eq(&self, other: &[&str; N]) -> bool {
        self.to_vec().as_slice() == other.as_slice()
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join(DEFAULT_SEPARATOR))
    }
}

/// Split one header line on its first colon.
///
/// Spaces around the colon are not part of the label or the value.
fn parse_pair(line: &str) -> Result<(&str, &str)> {
    let colon = line
        .find(':')
        .ok_or_else(|| Error::MalformedHeaders(format!("no colon in header line: {:?}", line)))?;

    let label = line[..colon].trim_end_matches(' ');
    let raw_value = &line[colon + 1..];

    if label.trim().is_empty() {
        return Err(Error::MalformedHeaders(format!("empty header label: {:?}", line)));
    }
    if raw_value.is_empty() {
        return Err(Error::MalformedHeaders(format!("empty header value: {:?}", line)));
    }
    if line.contains('\r') {
        return Err(Error::MalformedHeaders(format!("stray carriage return: {:?}", line)));
    }

    Ok((label, raw_value.trim_start_matches(' ')))
}

/// Recognize a header block and split it into label/value pairs.
///
/// Lines are terminated by `\r\n` or `\n`; the final line may omit its line
/// break. An empty block holds zero headers.
pub(crate) fn header_lines(text: &str) -> Result<Vec<(&str, &str)>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let block = text
        .strip_suffix(CRLF)
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text);

    block
        .split('\n')
        .map(|line| parse_pair(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}

/// HTTP headers collection
///
/// An ordered mapping from canonical label to a non-empty list of values.
/// Iteration yields labels in insertion order; replacing a label keeps its
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCollection {
    headers: IndexMap<String, Vec<String>>,
}

impl HeaderCollection {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        HeaderCollection {
            headers: IndexMap::new(),
        }
    }

    /// Create a collection from label/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderInput>,
    {
        let mut headers = HeaderCollection::new();
        headers.add(pairs, true)?;
        Ok(headers)
    }

    /// Set a header.
    ///
    /// Without `append`, or when the label is absent, the stored entries are
    /// replaced. With `append` the new entries go after the existing ones.
    /// An empty list stores nothing: replacing with it removes the label and
    /// appending it is a no-op.
    pub fn set(&mut self, label: &str, value: impl Into<HeaderInput>, append: bool) -> Result<()> {
        let label = checked_label(label)?;
        self.store(label, value.into().into_values(), append);
        Ok(())
    }

    /// Append entries to a header, creating it if needed
    pub fn append(&mut self, label: &str, value: impl Into<HeaderInput>) -> Result<()> {
        self.set(label, value, true)
    }

    /// Replace a header whose label is known to be valid
    pub(crate) fn set_known(&mut self, label: &str, value: impl Into<HeaderInput>) {
        self.store(normalize_label(label), value.into().into_values(), false);
    }

    fn store(&mut self, label: String, values: Vec<String>, append: bool) {
        if values.is_empty() {
            if !append {
                self.headers.shift_remove(&label);
            }
            return;
        }

        match self.headers.get_mut(&label) {
            Some(existing) if append => existing.extend(values),
            Some(existing) => *existing = values,
            None => {
                self.headers.insert(label, values);
            }
        }
    }

    /// Get a header, flattened to a scalar if it holds one entry
    pub fn get(&self, label: &str) -> Result<FieldValue<'_>> {
        self.values(label).map(FieldValue::flatten)
    }

    /// Get a header as one string, entries joined by `"<separator> "`
    pub fn get_joined(&self, label: &str, separator: &str) -> Result<String> {
        self.get(label).map(|value| value.join(separator))
    }

    /// All stored entries of a header
    pub fn values(&self, label: &str) -> Result<&[String]> {
        self.headers
            .get(&normalize_label(label))
            .filter(|values| !values.is_empty())
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NotFound(label.to_string()))
    }

    /// Check if a header exists
    ///
    /// A label that is not a valid header label is never present, so it
    /// yields `false` instead of an `InvalidLabel` error.
    pub fn has(&self, label: &str) -> bool {
        match checked_label(label) {
            Ok(label) => self.headers.contains_key(&label),
            Err(_) => false,
        }
    }

    /// Check if a header has an entry at `index`
    pub fn has_entry(&self, label: &str, index: usize) -> Result<bool> {
        self.values(label).map(|values| index < values.len())
    }

    /// Remove a header with all its entries, returning how many entries were dropped
    pub fn remove(&mut self, label: &str) -> usize {
        self.headers
            .shift_remove(&normalize_label(label))
            .map(|values| values.len())
            .unwrap_or(0)
    }

    /// Remove a single entry; the remaining entries stay contiguous.
    ///
    /// Removing the last entry removes the header.
    pub fn remove_entry(&mut self, label: &str, index: usize) -> Result<String> {
        let key = normalize_label(label);
        let values = self
            .headers
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(label.to_string()))?;

        if index >= values.len() {
            return Err(Error::IndexOutOfRange {
                label: key,
                index,
            });
        }

        let removed = values.remove(index);
        if values.is_empty() {
            self.headers.shift_remove(&key);
        }

        Ok(removed)
    }

    /// Replace every header with the given pairs.
    ///
    /// On error the collection is left untouched.
    pub fn load<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderInput>,
    {
        let mut fresh = HeaderCollection::new();
        fresh.add(pairs, true)?;
        *self = fresh;
        Ok(())
    }

    /// Merge the given pairs into the collection.
    ///
    /// Every label is validated before anything is stored.
    pub fn add<I, K, V>(&mut self, pairs: I, append: bool) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderInput>,
    {
        let checked = pairs
            .into_iter()
            .map(|(label, value)| Ok((checked_label(label.as_ref())?, value.into().into_values())))
            .collect::<Result<Vec<_>>>()?;

        for (label, values) in checked {
            self.store(label, values, append);
        }

        Ok(())
    }

    /// Get a header through its camelCase property name (`contentType`)
    pub fn get_property(&self, name: &str) -> Result<FieldValue<'_>> {
        self.get(&property_label(name))
    }

    /// Set a header through its camelCase property name (`contentType`)
    pub fn set_property(&mut self, name: &str, value: impl Into<HeaderInput>) -> Result<()> {
        self.set(&property_label(name), value, false)
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Clear all headers
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Iterate over labels and their flattened values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldValue<'_>)> {
        self.headers
            .iter()
            .map(|(label, values)| (label.as_str(), FieldValue::flatten(values)))
    }

    /// Serialize the header block.
    ///
    /// With `joined` each label is written once (`Label: v1, v2`), otherwise
    /// a multi-valued label is repeated on one line per entry. Lines are
    /// separated by CRLF and the block carries no trailing line break.
    pub fn build(&self, joined: bool, separator: &str) -> String {
        let mut out = String::new();

        for (label, values) in &self.headers {
            if joined {
                out.push_str(&format!("{}: {}{}", label, values.join(&format!("{} ", separator)), CRLF));
            } else {
                for value in values {
                    out.push_str(&format!("{}: {}{}", label, value, CRLF));
                }
            }
        }

        out.trim_end_matches(['\r', '\n']).to_string()
    }

    /// One `Label: v1, v2` string per label
    pub fn string_list(&self, separator: &str) -> Vec<String> {
        self.headers
            .iter()
            .map(|(label, values)| format!("{}: {}", label, values.join(&format!("{} ", separator))))
            .collect()
    }

    /// Check that `text` is a well-formed header block
    pub fn validate(text: &str) -> bool {
        header_lines(text).is_ok()
    }

    /// Parse a header block into an ordered label to entries mapping.
    ///
    /// Labels are kept as written. With `split_multiple` each value is split
    /// on `separator` and the pieces trimmed. A label repeated on several
    /// lines collects all of its entries.
    pub fn parse_as_array(
        text: &str,
        split_multiple: bool,
        separator: &str,
    ) -> Result<IndexMap<String, Vec<String>>> {
        let mut parsed: IndexMap<String, Vec<String>> = IndexMap::new();

        for (label, value) in header_lines(text)? {
            let entries = parsed.entry(label.to_string()).or_default();
            if split_multiple {
                entries.extend(value.split(separator).map(|piece| piece.trim().to_string()));
            } else {
                entries.push(value.to_string());
            }
        }

        Ok(parsed)
    }

    /// Parse a header block into a collection
    pub fn parse(text: &str, split_multiple: bool, separator: &str) -> Result<Self> {
        HeaderCollection::from_pairs(HeaderCollection::parse_as_array(text, split_multiple, separator)?)
    }
}

impl fmt::Display for HeaderCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build(true, DEFAULT_SEPARATOR))
    }
}

impl<'a> IntoIterator for &'a HeaderCollection {
    type Item = (&'a str, FieldValue<'a>);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, FieldValue<'a>)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
