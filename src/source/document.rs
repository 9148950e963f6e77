//! Read-only handle over the input PDF.

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::EngineError;
use crate::geometry::Rect;
use crate::model::Rotation;

/// Page geometry as stored in the source, before any normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// 0-based source index
    pub index: usize,
    /// Visible page rectangle (CropBox, else MediaBox), ignoring `/Rotate`
    pub raw_rect: Rect,
    /// The page's own `/Rotate`
    pub rotation: Rotation,
}

/// The input PDF of one compression invocation.
///
/// Holds the original bytes (handed verbatim to the output on the fast path
/// and on fallback, and to the rasterizer) next to the parsed object graph
/// used for estimation and copy-through. Never mutated.
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    document: Document,
    page_ids: Vec<ObjectId>,
    pages: Vec<PageInfo>,
}

impl SourceDocument {
    /// Parse `bytes`. A document that cannot be parsed, or has no pages, is
    /// a fatal source failure.
    pub fn open(bytes: impl Into<Arc<[u8]>>) -> Result<Self, EngineError> {
        let bytes: Arc<[u8]> = bytes.into();
        let document =
            Document::load_mem(&bytes).map_err(|e| EngineError::Source(e.to_string()))?;

        let page_ids: Vec<ObjectId> = document.get_pages().values().copied().collect();
        if page_ids.is_empty() {
            return Err(EngineError::Source("document has no pages".to_string()));
        }

        let pages = page_ids
            .iter()
            .enumerate()
            .map(|(index, &page_id)| PageInfo {
                index,
                raw_rect: page_rect(&document, page_id),
                rotation: page_rotation(&document, page_id, index),
            })
            .collect();

        log::debug!(
            "Opened source document: {} bytes, {} pages",
            bytes.len(),
            page_ids.len()
        );

        Ok(Self {
            bytes,
            document,
            page_ids,
            pages,
        })
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&PageInfo> {
        self.pages.get(index)
    }

    pub fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.page_ids.get(index).copied()
    }

    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// Follow a reference to the object it names; other objects are returned as is.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj)?.as_dict().ok()
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_object(page_id).ok()?.as_dict().ok()?;
    // Bounded walk: a malformed tree may contain Parent cycles.
    for _ in 0..64 {
        if let Ok(obj) = current.get(key) {
            return Some(obj);
        }
        match current.get(b"Parent") {
            Ok(Object::Reference(parent)) => {
                current = doc.get_object(*parent).ok()?.as_dict().ok()?;
            }
            _ => return None,
        }
    }
    None
}

pub(crate) fn as_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn parse_box(doc: &Document, obj: &Object) -> Option<Rect> {
    let arr = resolve(doc, obj)?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut v = [0.0; 4];
    for (slot, item) in v.iter_mut().zip(arr) {
        *slot = as_f64(resolve(doc, item)?)?;
    }
    Some(Rect::normalized(v[0], v[1], v[2], v[3]))
}

fn page_rect(doc: &Document, page_id: ObjectId) -> Rect {
    let media = inherited_attribute(doc, page_id, b"MediaBox").and_then(|o| parse_box(doc, o));
    let crop = inherited_attribute(doc, page_id, b"CropBox").and_then(|o| parse_box(doc, o));
    crop.filter(|r| !r.is_empty())
        .or(media)
        .unwrap_or_default()
}

fn page_rotation(doc: &Document, page_id: ObjectId, index: usize) -> Rotation {
    let Some(degrees) = inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|o| resolve(doc, o))
        .and_then(as_f64)
    else {
        return Rotation::None;
    };
    Rotation::from_degrees(degrees.round() as i64).unwrap_or_else(|| {
        log::warn!(
            "Page {} has unsupported /Rotate {}, treating as 0",
            index + 1,
            degrees
        );
        Rotation::None
    })
}
