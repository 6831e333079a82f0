//! In-memory PDF document.
//!
//! [`PdfDocument`] owns the parsed object table and trailer, and provides
//! the operations the signing pipeline needs: page-tree traversal, decoded
//! page content, and access to the Info metadata dictionary. Saving always
//! performs a full deterministic rewrite (no incremental updates).

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::{parser, writer};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;

/// Maximum reference-chain length before declaring a cycle.
const MAX_RESOLVE_DEPTH: u32 = 32;

/// A parsed PDF document.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    objects: BTreeMap<ObjectRef, Object>,
    trailer: Dict,
}

impl PdfDocument {
    /// Open and parse a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("opening PDF {}", path.display());
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parse a PDF from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let parsed = parser::parse_document(data)?;
        Ok(Self {
            objects: parsed.objects,
            trailer: parsed.trailer,
        })
    }

    /// Serialize the document to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        writer::write_document(&self.objects, &self.trailer)
    }

    /// Write the document to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        log::debug!("writing PDF {}", path.display());
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Access the trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Look up an indirect object.
    pub fn get(&self, obj_ref: ObjectRef) -> Option<&Object> {
        self.objects.get(&obj_ref)
    }

    /// Follow reference chains until a direct object is reached.
    pub fn resolve<'a>(&'a self, mut obj: &'a Object) -> Result<&'a Object> {
        let mut depth = 0;
        while let Object::Reference(r) = obj {
            if depth > MAX_RESOLVE_DEPTH {
                return Err(Error::CircularReference(*r));
            }
            obj = self
                .objects
                .get(r)
                .ok_or(Error::ObjectNotFound(r.id, r.gen))?;
            depth += 1;
        }
        Ok(obj)
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Result<&'a Dict> {
        let resolved = self.resolve(obj)?;
        resolved.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: resolved.type_name().to_string(),
        })
    }

    /// The document catalog (trailer /Root).
    pub fn catalog(&self) -> Result<&Dict> {
        let root = self.trailer.get("Root").ok_or(Error::InvalidXref)?;
        self.resolve_dict(root)
    }

    /// References to all page dictionaries, in page-tree order.
    ///
    /// Order is fully determined by the /Kids arrays; nothing here depends
    /// on map iteration.
    pub fn pages(&self) -> Result<Vec<ObjectRef>> {
        let catalog = self.catalog()?;
        let pages_obj = catalog.get("Pages").ok_or_else(|| Error::InvalidObjectType {
            expected: "Pages reference".to_string(),
            found: "missing entry".to_string(),
        })?;

        let mut result = Vec::new();
        let mut visited = HashSet::new();
        self.collect_pages(pages_obj, &mut result, &mut visited)?;
        Ok(result)
    }

    fn collect_pages(
        &self,
        node: &Object,
        result: &mut Vec<ObjectRef>,
        visited: &mut HashSet<ObjectRef>,
    ) -> Result<()> {
        let node_ref = match node.as_reference() {
            Some(r) => r,
            None => {
                log::warn!("page-tree node is not an indirect reference, skipping");
                return Ok(());
            },
        };
        if !visited.insert(node_ref) {
            return Err(Error::CircularReference(node_ref));
        }

        let dict = self.resolve_dict(node)?;
        match dict.get("Type").and_then(|t| t.as_name()) {
            Some("Page") => result.push(node_ref),
            _ => {
                // Treat anything else as an intermediate node; some writers
                // omit /Type /Pages
                if let Some(kids) = dict.get("Kids") {
                    let kids = self.resolve(kids)?;
                    let kids = kids.as_array().ok_or_else(|| Error::InvalidObjectType {
                        expected: "Array".to_string(),
                        found: kids.type_name().to_string(),
                    })?;
                    for kid in kids {
                        self.collect_pages(kid, result, visited)?;
                    }
                }
            },
        }
        Ok(())
    }

    /// Decoded content streams of a page, in /Contents order.
    pub fn page_content_streams(&self, page_ref: ObjectRef) -> Result<Vec<Vec<u8>>> {
        let page = self
            .objects
            .get(&page_ref)
            .ok_or(Error::ObjectNotFound(page_ref.id, page_ref.gen))?;
        let page = self.resolve_dict(page)?;

        let mut streams = Vec::new();
        let Some(contents) = page.get("Contents") else {
            return Ok(streams);
        };

        match self.resolve(contents)? {
            stream @ Object::Stream { .. } => {
                streams.push(stream.decode_stream_data()?);
            },
            Object::Array(items) => {
                for item in items {
                    let resolved = self.resolve(item)?;
                    streams.push(resolved.decode_stream_data()?);
                }
            },
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Stream or Array".to_string(),
                    found: other.type_name().to_string(),
                });
            },
        }
        Ok(streams)
    }

    // -- Info metadata table ------------------------------------------------

    /// Read an entry from the document Info dictionary.
    pub fn metadata(&self, key: &str) -> Option<&Object> {
        let info = self.trailer.get("Info")?;
        let dict = self.resolve_dict(info).ok()?;
        let value = dict.get(key)?;
        self.resolve(value).ok()
    }

    /// Set an entry in the Info dictionary, creating the dictionary if the
    /// document has none. Replaces any previous value for the key; other
    /// entries are preserved.
    pub fn set_metadata(&mut self, key: &str, value: Object) {
        if let Some(info_ref) = self.trailer.get("Info").and_then(|o| o.as_reference()) {
            if let Some(Object::Dictionary(dict)) = self.objects.get_mut(&info_ref) {
                dict.insert(key.to_string(), value);
                return;
            }
        }
        // Some writers put Info directly in the trailer
        if let Some(Object::Dictionary(dict)) = self.trailer.get_mut("Info") {
            dict.insert(key.to_string(), value);
            return;
        }

        let mut dict = Dict::new();
        dict.insert(key.to_string(), value);
        let info_ref = ObjectRef::new(self.next_object_id(), 0);
        self.objects.insert(info_ref, Object::Dictionary(dict));
        self.trailer
            .insert("Info".to_string(), Object::Reference(info_ref));
    }

    /// Remove an entry from the Info dictionary. Returns whether it existed.
    pub fn remove_metadata(&mut self, key: &str) -> bool {
        if let Some(info_ref) = self.trailer.get("Info").and_then(|o| o.as_reference()) {
            return match self.objects.get_mut(&info_ref) {
                Some(Object::Dictionary(dict)) => dict.remove(key).is_some(),
                _ => false,
            };
        }
        match self.trailer.get_mut("Info") {
            Some(Object::Dictionary(dict)) => dict.remove(key).is_some(),
            _ => false,
        }
    }

    fn next_object_id(&self) -> u32 {
        self.objects
            .keys()
            .next_back()
            .map(|r| r.id + 1)
            .unwrap_or(1)
    }

    // -- Builder ------------------------------------------------------------

    /// Build a simple text document, one body string per page.
    ///
    /// Each page gets a US-Letter media box and a single Helvetica content
    /// stream; lines within a page string are separated by `\n`.
    pub fn from_text_pages(pages: &[&str]) -> Self {
        let mut objects = BTreeMap::new();

        let catalog_ref = ObjectRef::new(1, 0);
        let pages_ref = ObjectRef::new(2, 0);
        let font_ref = ObjectRef::new(3, 0);

        let mut catalog = Dict::new();
        catalog.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        catalog.insert("Pages".to_string(), Object::Reference(pages_ref));
        objects.insert(catalog_ref, Object::Dictionary(catalog));

        let mut font = Dict::new();
        font.insert("Type".to_string(), Object::Name("Font".to_string()));
        font.insert("Subtype".to_string(), Object::Name("Type1".to_string()));
        font.insert("BaseFont".to_string(), Object::Name("Helvetica".to_string()));
        objects.insert(font_ref, Object::Dictionary(font));

        let mut kids = Vec::new();
        let mut next_id = 4;
        for text in pages {
            let page_ref = ObjectRef::new(next_id, 0);
            let content_ref = ObjectRef::new(next_id + 1, 0);
            next_id += 2;

            let mut font_map = Dict::new();
            font_map.insert("F1".to_string(), Object::Reference(font_ref));
            let mut resources = Dict::new();
            resources.insert("Font".to_string(), Object::Dictionary(font_map));

            let mut page = Dict::new();
            page.insert("Type".to_string(), Object::Name("Page".to_string()));
            page.insert("Parent".to_string(), Object::Reference(pages_ref));
            page.insert(
                "MediaBox".to_string(),
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            );
            page.insert("Resources".to_string(), Object::Dictionary(resources));
            page.insert("Contents".to_string(), Object::Reference(content_ref));
            objects.insert(page_ref, Object::Dictionary(page));

            objects.insert(
                content_ref,
                Object::Stream {
                    dict: Dict::new(),
                    data: bytes::Bytes::from(text_content_stream(text)),
                },
            );
            kids.push(Object::Reference(page_ref));
        }

        let mut pages_dict = Dict::new();
        pages_dict.insert("Type".to_string(), Object::Name("Pages".to_string()));
        pages_dict.insert("Count".to_string(), Object::Integer(kids.len() as i64));
        pages_dict.insert("Kids".to_string(), Object::Array(kids));
        objects.insert(pages_ref, Object::Dictionary(pages_dict));

        let mut trailer = Dict::new();
        trailer.insert("Root".to_string(), Object::Reference(catalog_ref));

        Self { objects, trailer }
    }
}

/// Build a content stream showing `text`, one `Tj` per line.
fn text_content_stream(text: &str) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 12 Tf\n14 TL\n72 720 Td\n");
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            content.push_str("T*\n");
        }
        content.push('(');
        for c in line.chars() {
            match c {
                '(' => content.push_str("\\("),
                ')' => content.push_str("\\)"),
                '\\' => content.push_str("\\\\"),
                _ => content.push(c),
            }
        }
        content.push_str(") Tj\n");
    }
    content.push_str("ET\n");
    content.into_bytes()
}
