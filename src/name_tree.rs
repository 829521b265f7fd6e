//! Navigation and repair of the catalog's `/Names/EmbeddedFiles` name tree.
//!
//! A name tree node is either a leaf holding a flat `/Names` array of
//! `[key, value, key, value, …]` pairs, or an intermediate node holding a
//! `/Kids` array of references. Every non-root node carries `/Limits [lo hi]`
//! with the smallest and largest key below it. Keys are sorted by their raw
//! string bytes.

use crate::pdf_utils::{decode_text_string, text_string};
use crate::{EmbedError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

/// Deepest tree the walkers will follow before assuming a `/Kids` cycle.
const MAX_DEPTH: usize = 32;

/// Object ids of the chain from the catalog down to the tree root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainIds {
    pub catalog: ObjectId,
    pub names: ObjectId,
    pub tree: ObjectId,
}

/// Where an existing entry lives: the leaf node and the index of its value
/// inside that leaf's `/Names` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySlot {
    pub leaf: ObjectId,
    pub value_index: usize,
}

fn invalid(msg: impl Into<String>) -> EmbedError {
    EmbedError::InvalidPdf(msg.into())
}

/// Value of a leaf entry: a reference to a file specification, or the
/// specification itself stored inline in the `/Names` array.
#[derive(Debug, Clone, Copy)]
pub enum SpecEntry<'a> {
    Indirect(ObjectId),
    Inline(&'a Dictionary),
}

// ── NameTreeReader ────────────────────────────────────────────────────────────

/// Read-only walker used to list the embedded files of a document.
pub struct NameTreeReader<'a> {
    document: &'a Document,
}

impl<'a> NameTreeReader<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Helper to resolve a value that might be inline or a reference to a dictionary.
    fn resolve_dict(&self, value: &'a Object) -> Option<&'a Dictionary> {
        match value {
            Object::Reference(id) => self.document.get_object(*id).ok()?.as_dict().ok(),
            other => other.as_dict().ok(),
        }
    }

    /// Helper to resolve a value that might be inline or a reference to an array.
    fn resolve_array(&self, value: &'a Object) -> Option<&'a Vec<Object>> {
        match value {
            Object::Reference(id) => self.document.get_object(*id).ok()?.as_array().ok(),
            other => other.as_array().ok(),
        }
    }

    /// Collect `(name, entry)` pairs for every file specification in the
    /// `/Names/EmbeddedFiles` tree, in tree order.
    pub fn collect_file_specs(&self) -> Vec<(String, SpecEntry<'a>)> {
        let catalog = match self.document.catalog() {
            Ok(cat) => cat,
            Err(_) => return Vec::new(),
        };

        let root = catalog
            .get(b"Names")
            .ok()
            .and_then(|v| self.resolve_dict(v))
            .and_then(|names| names.get(b"EmbeddedFiles").ok())
            .and_then(|v| self.resolve_dict(v));

        let mut out = Vec::new();
        if let Some(root) = root {
            self.walk_node(root, 0, &mut out);
        }
        out
    }

    /// Recursively walk a name tree node, collecting leaf entries.
    fn walk_node(&self, node: &'a Dictionary, depth: usize, out: &mut Vec<(String, SpecEntry<'a>)>) {
        if depth > MAX_DEPTH {
            return;
        }

        // Leaf node: has a /Names array of [key, value, key, value, …]
        if let Some(arr) = node.get(b"Names").ok().and_then(|v| self.resolve_array(v)) {
            for pair in arr.chunks_exact(2) {
                let Ok(raw) = pair[0].as_str() else { continue };
                let entry = match &pair[1] {
                    Object::Reference(id) => SpecEntry::Indirect(*id),
                    Object::Dictionary(dict) => SpecEntry::Inline(dict),
                    _ => continue,
                };
                out.push((decode_text_string(raw), entry));
            }
        }

        // Intermediate node: has a /Kids array of references
        if let Some(kids) = node.get(b"Kids").ok().and_then(|v| self.resolve_array(v)) {
            for kid in kids {
                if let Some(kid_dict) = self.resolve_dict(kid) {
                    self.walk_node(kid_dict, depth + 1, out);
                }
            }
        }
    }
}

// ── NameTreeEditor ────────────────────────────────────────────────────────────

/// Resolve-or-create access to each level of the embedded-files chain.
///
/// Inline `/Names` and `/EmbeddedFiles` dictionaries are promoted to indirect
/// objects so every level can be re-linked by reference.
pub struct NameTreeEditor<'a> {
    document: &'a mut Document,
}

impl<'a> NameTreeEditor<'a> {
    pub fn new(document: &'a mut Document) -> Self {
        Self { document }
    }

    fn dict(&self, id: ObjectId) -> Result<&Dictionary> {
        self.document
            .get_object(id)?
            .as_dict()
            .map_err(|_| invalid(format!("object {} {} is not a dictionary", id.0, id.1)))
    }

    fn dict_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        self.document
            .get_object_mut(id)?
            .as_dict_mut()
            .map_err(|_| invalid(format!("object {} {} is not a dictionary", id.0, id.1)))
    }

    /// The catalog's object id, taken from the trailer's `/Root`.
    pub fn catalog_id(&self) -> Result<ObjectId> {
        let id = self
            .document
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| invalid("trailer has no /Root reference"))?;
        self.dict(id)?;
        Ok(id)
    }

    /// Resolve the dictionary stored under `key` in `parent`, creating (or
    /// promoting an inline one) when needed. The parent is re-pointed at the
    /// result before returning.
    fn resolve_child_dict(&mut self, parent: ObjectId, key: &str) -> Result<ObjectId> {
        let existing = self.dict(parent)?.get(key.as_bytes()).ok().cloned();

        // A reference to a missing object is the same as an absent entry.
        let reusable = match &existing {
            Some(Object::Reference(id)) => match self.document.get_object(*id) {
                Ok(Object::Dictionary(_)) => Some(*id),
                Ok(Object::Null) | Err(_) => None,
                Ok(_) => return Err(invalid(format!("/{key} does not reference a dictionary"))),
            },
            Some(Object::Dictionary(_)) | Some(Object::Null) | None => None,
            Some(_) => return Err(invalid(format!("/{key} is not a dictionary"))),
        };

        let id = match (reusable, existing) {
            (Some(id), _) => {
                debug!(key, "reusing existing dictionary");
                id
            }
            (None, Some(Object::Dictionary(inline))) => {
                debug!(key, "promoting inline dictionary");
                self.document.add_object(inline)
            }
            (None, _) => {
                debug!(key, "creating dictionary");
                self.document.add_object(Dictionary::new())
            }
        };

        self.dict_mut(parent)?.set(key, Object::Reference(id));
        Ok(id)
    }

    /// Catalog → `/Names`.
    pub fn resolve_names_dictionary(&mut self, catalog: ObjectId) -> Result<ObjectId> {
        self.resolve_child_dict(catalog, "Names")
    }

    /// `/Names` → `/EmbeddedFiles`.
    pub fn resolve_embedded_files_tree(&mut self, names: ObjectId) -> Result<ObjectId> {
        self.resolve_child_dict(names, "EmbeddedFiles")
    }

    /// Resolve the whole chain down to the tree root and make sure the root
    /// owns an entry map.
    pub fn resolve_chain(&mut self) -> Result<ChainIds> {
        let catalog = self.catalog_id()?;
        let names = self.resolve_names_dictionary(catalog)?;
        let tree = self.resolve_embedded_files_tree(names)?;
        self.ensure_entry_map(tree)?;
        Ok(ChainIds {
            catalog,
            names,
            tree,
        })
    }

    /// A root without `/Kids` must hold a `/Names` array; an empty one is
    /// created when missing.
    pub fn ensure_entry_map(&mut self, tree: ObjectId) -> Result<()> {
        if !self.kid_ids(tree)?.is_empty() {
            return Ok(());
        }
        let has_map = match self.dict(tree)?.get(b"Names") {
            Ok(Object::Array(_)) => true,
            Ok(Object::Reference(id)) => matches!(self.document.get_object(*id), Ok(Object::Array(_))),
            Ok(Object::Null) | Err(_) => false,
            Ok(_) => return Err(invalid("/EmbeddedFiles /Names is not an array")),
        };
        if !has_map {
            debug!("creating empty entry map");
            self.dict_mut(tree)?.set("Names", Object::Array(Vec::new()));
        }
        Ok(())
    }

    /// Write every link of the chain again, whether or not it was created
    /// during this call.
    pub fn relink_chain(&mut self, ids: ChainIds) -> Result<()> {
        self.dict_mut(ids.names)?
            .set("EmbeddedFiles", Object::Reference(ids.tree));
        self.dict_mut(ids.catalog)?
            .set("Names", Object::Reference(ids.names));
        Ok(())
    }

    // ── Entry lookup ──────────────────────────────────────────────────────────

    fn kid_ids(&self, node: ObjectId) -> Result<Vec<ObjectId>> {
        let kids = match self.dict(node)?.get(b"Kids") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match self.document.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => return Err(invalid("/Kids does not reference an array")),
            },
            Ok(Object::Null) | Err(_) => return Ok(Vec::new()),
            Ok(_) => return Err(invalid("/Kids is not an array")),
        };
        kids.iter()
            .map(|kid| kid.as_reference().map_err(|_| invalid("/Kids entry is not a reference")))
            .collect()
    }

    /// Snapshot of a node's `/Names` array; empty when the node has none.
    fn names_of(&self, node: ObjectId) -> Result<Vec<Object>> {
        Ok(match self.dict(node)?.get(b"Names") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => self
                .document
                .get_object(*id)
                .and_then(Object::as_array)
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        })
    }

    /// Mutable access to a node's `/Names` array, creating it when absent.
    fn names_of_mut(&mut self, node: ObjectId) -> Result<&mut Vec<Object>> {
        let current = match self.dict(node)?.get(b"Names") {
            Ok(Object::Reference(id)) => Some(Some(*id)),
            Ok(Object::Array(_)) => Some(None),
            _ => None,
        };

        let target = match current {
            Some(Some(id)) => self.document.get_object_mut(id)?,
            Some(None) => self.dict_mut(node)?.get_mut(b"Names")?,
            None => {
                let node_dict = self.dict_mut(node)?;
                node_dict.set("Names", Object::Array(Vec::new()));
                node_dict.get_mut(b"Names")?
            }
        };
        target
            .as_array_mut()
            .map_err(|_| invalid("name tree /Names is not an array"))
    }

    /// Locate `key` anywhere below `node`.
    pub fn find_entry(&self, node: ObjectId, key: &str) -> Result<Option<EntrySlot>> {
        self.find_in(node, key, 0)
    }

    fn find_in(&self, node: ObjectId, key: &str, depth: usize) -> Result<Option<EntrySlot>> {
        if depth > MAX_DEPTH {
            return Err(invalid("name tree is too deep or cyclic"));
        }

        for (i, pair) in self.names_of(node)?.chunks_exact(2).enumerate() {
            if let Ok(raw) = pair[0].as_str() {
                if decode_text_string(raw) == key {
                    return Ok(Some(EntrySlot {
                        leaf: node,
                        value_index: i * 2 + 1,
                    }));
                }
            }
        }

        for kid in self.kid_ids(node)? {
            if let Some(slot) = self.find_in(kid, key, depth + 1)? {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Return the file specification id stored in `slot`. An inline
    /// dictionary value is promoted to an indirect object first so it can
    /// be mutated in place.
    pub fn spec_id(&mut self, slot: EntrySlot) -> Result<ObjectId> {
        let value = self
            .names_of(slot.leaf)?
            .get(slot.value_index)
            .cloned()
            .ok_or_else(|| invalid("name tree entry has no value"))?;

        match value {
            Object::Reference(id) => match self.document.get_object(id) {
                Ok(Object::Dictionary(_)) => Ok(id),
                _ => Err(invalid("name tree entry does not reference a file specification")),
            },
            Object::Dictionary(inline) => {
                let id = self.document.add_object(inline);
                self.names_of_mut(slot.leaf)?[slot.value_index] = Object::Reference(id);
                Ok(id)
            }
            _ => Err(invalid("name tree entry is not a file specification")),
        }
    }

    // ── Entry insertion ───────────────────────────────────────────────────────

    /// Insert `key → value` below `root`, keeping keys sorted and `/Limits`
    /// up to date on every touched node.
    pub fn insert_entry(&mut self, root: ObjectId, key: &str, value: ObjectId) -> Result<()> {
        let key_obj = text_string(key);
        self.insert_in(root, key_obj, Object::Reference(value), 0)
    }

    fn insert_in(&mut self, node: ObjectId, key: Object, value: Object, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(invalid("name tree is too deep or cyclic"));
        }

        let kids = self.kid_ids(node)?;
        if kids.is_empty() {
            let key_bytes = key.as_str()?.to_vec();
            let names = self.names_of_mut(node)?;
            let pos = names
                .chunks_exact(2)
                .position(|pair| pair[0].as_str().map_or(false, |k| k > key_bytes.as_slice()))
                .map_or(names.len() - names.len() % 2, |pair| pair * 2);
            names.insert(pos, value);
            names.insert(pos, key);
        } else {
            let target = self.choose_kid(&kids, key.as_str()?)?;
            self.insert_in(target, key, value, depth + 1)?;
        }

        // The root never carries /Limits.
        if depth > 0 {
            self.recompute_limits(node)?;
        }
        Ok(())
    }

    /// Pick the kid whose range covers `key`, else the first kid starting
    /// after it, else the last kid.
    fn choose_kid(&self, kids: &[ObjectId], key: &[u8]) -> Result<ObjectId> {
        for &kid in kids {
            match self.limits(kid)? {
                Some((_, hi)) if key <= hi.as_slice() => return Ok(kid),
                Some(_) => continue,
                None => return Ok(kid),
            }
        }
        kids.last()
            .copied()
            .ok_or_else(|| invalid("name tree node has empty /Kids"))
    }

    fn limits(&self, node: ObjectId) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let limits = match self.dict(node)?.get(b"Limits").and_then(Object::as_array) {
            Ok(items) if items.len() == 2 => items,
            _ => return Ok(None),
        };
        match (limits[0].as_str(), limits[1].as_str()) {
            (Ok(lo), Ok(hi)) => Ok(Some((lo.to_vec(), hi.to_vec()))),
            _ => Ok(None),
        }
    }

    /// Set `/Limits` from the node's own contents: first and last key of a
    /// leaf, or the outer limits of its first and last kid.
    fn recompute_limits(&mut self, node: ObjectId) -> Result<()> {
        let kids = self.kid_ids(node)?;
        let bounds = if kids.is_empty() {
            let names = self.names_of(node)?;
            let keys: Vec<&Object> = names.iter().step_by(2).collect();
            match (keys.first(), keys.last()) {
                (Some(lo), Some(hi)) => Some(((*lo).clone(), (*hi).clone())),
                _ => None,
            }
        } else {
            let first = self.limits(kids[0])?;
            let last = self.limits(kids[kids.len() - 1])?;
            match (first, last) {
                (Some((lo, _)), Some((_, hi))) => Some((
                    Object::String(lo, lopdf::StringFormat::Literal),
                    Object::String(hi, lopdf::StringFormat::Literal),
                )),
                _ => None,
            }
        };

        if let Some((lo, hi)) = bounds {
            self.dict_mut(node)?.set("Limits", Object::Array(vec![lo, hi]));
        }
        Ok(())
    }
}
