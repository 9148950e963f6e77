//! Destination document assembly.
//!
//! The destination starts as a copy of the source object graph, so
//! copy-through pages keep their objects byte for byte. Output pages are
//! appended in order and hung under a fresh, flat page tree when the
//! document is finished; whatever the new tree no longer reaches is pruned.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::canvas::PageCanvas;
use crate::error::StageFailure;
use crate::source::document::inherited_attribute;
use crate::source::SourceDocument;

/// Keys a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

pub struct DestinationBuilder {
    document: Document,
    source_page_ids: Vec<ObjectId>,
    pages_id: ObjectId,
    output_pages: Vec<ObjectId>,
    /// Source pages already placed as copy-through (their object was reused)
    reused: BTreeSet<ObjectId>,
    /// Source page -> first re-rendered output page made from it
    rendered_from: BTreeMap<ObjectId, ObjectId>,
}

impl DestinationBuilder {
    pub fn new(source: &SourceDocument) -> Self {
        let mut document = source.document().clone();
        let pages_id = document.new_object_id();
        Self {
            document,
            source_page_ids: source.page_ids().to_vec(),
            pages_id,
            output_pages: Vec::new(),
            reused: BTreeSet::new(),
            rendered_from: BTreeMap::new(),
        }
    }

    fn source_page_id(&self, source_index: usize) -> Result<ObjectId, StageFailure> {
        self.source_page_ids
            .get(source_index)
            .copied()
            .ok_or_else(|| {
                StageFailure::Assemble(format!("no source page at index {}", source_index))
            })
    }

    /// Append source page `source_index` unchanged. The first use of a page
    /// keeps its object; later uses get a duplicate page dictionary sharing
    /// the same content and resources.
    pub fn copy_page(&mut self, source_index: usize) -> Result<ObjectId, StageFailure> {
        let page_id = self.source_page_id(source_index)?;

        let mut page = self.document.get_object(page_id)?.as_dict()?.clone();
        // The old tree goes away, so inherited attributes must live on the page.
        for key in INHERITABLE_KEYS {
            if page.get(key).is_err() {
                if let Some(value) = inherited_attribute(&self.document, page_id, key) {
                    page.set(key, value.clone());
                }
            }
        }
        page.set("Parent", Object::Reference(self.pages_id));

        let output_id = if self.reused.insert(page_id) {
            self.document
                .objects
                .insert(page_id, Object::Dictionary(page));
            page_id
        } else {
            self.document.add_object(page)
        };

        self.output_pages.push(output_id);
        Ok(output_id)
    }

    /// Append a re-rendered page drawn from `canvas` in place of source page
    /// `source_index`.
    pub fn add_canvas(
        &mut self,
        source_index: usize,
        canvas: PageCanvas,
    ) -> Result<ObjectId, StageFailure> {
        let source_page_id = self.source_page_id(source_index)?;
        let (width, height, operations, images) = canvas.into_parts();

        let mut xobjects = Dictionary::new();
        for (name, xobject) in images {
            let mut image = xobject.image;
            if let Some(mask) = xobject.soft_mask {
                let mask_id = self.document.add_object(mask);
                image.dict.set("SMask", Object::Reference(mask_id));
            }
            let image_id = self.document.add_object(image);
            xobjects.set(name, Object::Reference(image_id));
        }

        let content = Content { operations }.encode()?;
        let mut content_stream = Stream::new(Dictionary::new(), content);
        content_stream.compress()?;
        let content_id = self.document.add_object(content_stream);

        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Resources" => dictionary! {
                "XObject" => xobjects,
            },
            "Contents" => content_id,
        });

        self.rendered_from.entry(source_page_id).or_insert(page_id);
        self.output_pages.push(page_id);
        Ok(page_id)
    }

    /// Build the page tree and catalog, prune unreachable objects and
    /// serialize. The result is parsed back before it is returned.
    pub fn finish(mut self) -> Result<Vec<u8>, StageFailure> {
        if self.output_pages.is_empty() {
            return Err(StageFailure::Assemble("no output pages".to_string()));
        }

        self.retarget_replaced_pages();

        let kids: Vec<Object> = self
            .output_pages
            .iter()
            .map(|&id| Object::Reference(id))
            .collect();
        let page_count = self.output_pages.len();
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
            }),
        );

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });

        let info = self.document.trailer.get(b"Info").ok().cloned();
        let mut trailer = Dictionary::new();
        trailer.set("Root", Object::Reference(catalog_id));
        if let Some(info @ (Object::Reference(_) | Object::Dictionary(_))) = info {
            trailer.set("Info", info);
        }
        self.document.trailer = trailer;

        let pruned = self.document.prune_objects();
        log::debug!(
            "Assembled {} pages, pruned {} unreachable objects",
            page_count,
            pruned.len()
        );

        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|e| StageFailure::Assemble(e.to_string()))?;

        let reparsed =
            Document::load_mem(&bytes).map_err(|e| StageFailure::Unreadable(e.to_string()))?;
        let reparsed_pages = reparsed.get_pages().len();
        if reparsed_pages != page_count {
            return Err(StageFailure::Unreadable(format!(
                "expected {} pages, found {}",
                page_count, reparsed_pages
            )));
        }

        Ok(bytes)
    }

    /// Source pages that are not reused stay behind in the object graph.
    /// Point anything that still refers to one (link destinations,
    /// annotation parents) at its re-rendered page, or at null when the
    /// page was dropped, then remove the stale page objects.
    fn retarget_replaced_pages(&mut self) {
        let replaced: BTreeMap<ObjectId, Object> = self
            .source_page_ids
            .iter()
            .filter(|id| !self.reused.contains(id))
            .map(|id| {
                let target = self
                    .rendered_from
                    .get(id)
                    .map(|&page| Object::Reference(page))
                    .unwrap_or(Object::Null);
                (*id, target)
            })
            .collect();
        if replaced.is_empty() {
            return;
        }

        for id in replaced.keys() {
            self.document.objects.remove(id);
        }
        for object in self.document.objects.values_mut() {
            retarget(object, &replaced);
        }
    }
}

fn retarget(object: &mut Object, replaced: &BTreeMap<ObjectId, Object>) {
    match object {
        Object::Reference(id) => {
            if let Some(target) = replaced.get(id) {
                *object = target.clone();
            }
        }
        Object::Array(items) => {
            for item in items {
                retarget(item, replaced);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                retarget(value, replaced);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                retarget(value, replaced);
            }
        }
        _ => {}
    }
}
