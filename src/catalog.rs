// catalog.rs - Material -> RGB table and nearest-color lookup
//
// Source format is a JSON object `{ "minecraft:stone": [125, 125, 125], ... }`.
// Entries keep document order; that order breaks distance ties.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::color::Rgb;
use crate::error::CatalogLoadError;

/// Identifier of a placeable block type, e.g. `minecraft:red_wool`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(String);

impl MaterialId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only color table. Construct once, pass by reference.
#[derive(Clone, Debug)]
pub struct ColorCatalog {
    /// Insertion order; index is the tie-break rank.
    entries: Vec<(MaterialId, Rgb)>,
    index: HashMap<MaterialId, usize>,
}

impl ColorCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogLoadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogLoadError> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        let raw = RawEntries::deserialize(&mut de).map_err(json_error)?;
        de.end().map_err(json_error)?;
        Self::from_raw(raw.0)
    }

    pub fn from_json_str(src: &str) -> Result<Self, CatalogLoadError> {
        let mut de = serde_json::Deserializer::from_str(src);
        let raw = RawEntries::deserialize(&mut de).map_err(json_error)?;
        de.end().map_err(json_error)?;
        Self::from_raw(raw.0)
    }

    /// Build from already-validated entries. Duplicates and empty input
    /// are still rejected.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, CatalogLoadError>
    where
        I: IntoIterator<Item = (S, Rgb)>,
        S: Into<String>,
    {
        let mut out = Self { entries: Vec::new(), index: HashMap::new() };
        for (id, rgb) in entries {
            out.push(MaterialId::new(id), rgb)?;
        }
        if out.entries.is_empty() {
            return Err(CatalogLoadError::Empty);
        }
        Ok(out)
    }

    fn from_raw(raw: Vec<(String, Value)>) -> Result<Self, CatalogLoadError> {
        let mut out = Self { entries: Vec::with_capacity(raw.len()), index: HashMap::with_capacity(raw.len()) };
        for (material, value) in raw {
            let rgb = parse_rgb(&material, &value)?;
            out.push(MaterialId::new(material), rgb)?;
        }
        if out.entries.is_empty() {
            return Err(CatalogLoadError::Empty);
        }
        Ok(out)
    }

    fn push(&mut self, id: MaterialId, rgb: Rgb) -> Result<(), CatalogLoadError> {
        if self.index.contains_key(&id) {
            return Err(CatalogLoadError::DuplicateMaterial { material: id.0 });
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, rgb));
        Ok(())
    }

    /// Material whose color is closest to `rgb`. On equal distance the
    /// entry that appeared first in the source wins.
    pub fn nearest_material(&self, rgb: Rgb) -> &MaterialId {
        let mut best = &self.entries[0];
        let mut best_dist = rgb.dist_sq(best.1);
        for entry in &self.entries[1..] {
            let d = rgb.dist_sq(entry.1);
            // Strictly smaller, so earlier entries keep ties
            if d < best_dist {
                best = entry;
                best_dist = d;
            }
        }
        &best.0
    }

    pub fn get(&self, id: &MaterialId) -> Option<Rgb> {
        self.index.get(id).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed catalog
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MaterialId, Rgb)> {
        self.entries.iter().map(|(id, rgb)| (id, *rgb))
    }
}

fn json_error(e: serde_json::Error) -> CatalogLoadError {
    CatalogLoadError::Json(e.to_string())
}

fn parse_rgb(material: &str, value: &Value) -> Result<Rgb, CatalogLoadError> {
    let invalid = || CatalogLoadError::InvalidEntry { material: material.to_string() };
    let channels = value.as_array().ok_or_else(invalid)?;
    if channels.len() != 3 {
        return Err(invalid());
    }

    let mut rgb = [0u8; 3];
    for (slot, channel) in rgb.iter_mut().zip(channels) {
        let v = channel.as_i64().ok_or_else(invalid)?;
        *slot = u8::try_from(v).map_err(|_| CatalogLoadError::ChannelOutOfRange {
            material: material.to_string(),
            value: v,
        })?;
    }
    Ok(Rgb::from(rgb))
}

/// Object entries in document order, keys possibly repeated
struct RawEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping material ids to [r, g, b]")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawEntries, A::Error> {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((k, v)) = map.next_entry::<String, Value>()? {
                    out.push((k, v));
                }
                Ok(RawEntries(out))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
