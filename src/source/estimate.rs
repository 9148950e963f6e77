//! Page weight estimation.
//!
//! A page's weight is the decoded size of its content streams plus the
//! stored size of every image XObject it draws, directly or through form
//! XObjects. Fonts are left out. Any piece that cannot be read counts as
//! zero, which biases an unreadable page toward copy-through.

use std::collections::HashSet;

use lopdf::{Document, Object, ObjectId, Stream};

use super::document::{inherited_attribute, resolve, resolve_dict, SourceDocument};
use crate::model::SizeEstimate;

impl SourceDocument {
    /// Estimate the weight of source page `index`. Out-of-range pages weigh nothing.
    pub fn estimate(&self, index: usize) -> SizeEstimate {
        let Some(page_id) = self.page_id(index) else {
            return SizeEstimate::default();
        };
        let doc = self.document();
        let estimate = SizeEstimate {
            content_stream_bytes: content_stream_bytes(doc, page_id),
            embedded_image_bytes: embedded_image_bytes(doc, page_id),
        };
        log::debug!(
            "Page {} estimate: {} content bytes, {} image bytes",
            index + 1,
            estimate.content_stream_bytes,
            estimate.embedded_image_bytes
        );
        estimate
    }
}

fn content_stream_bytes(doc: &Document, page_id: ObjectId) -> u64 {
    let Some(contents) = doc
        .get_object(page_id)
        .ok()
        .and_then(|o| o.as_dict().ok())
        .and_then(|d| d.get(b"Contents").ok())
    else {
        return 0;
    };

    match resolve(doc, contents) {
        Some(Object::Stream(stream)) => decoded_len(stream),
        Some(Object::Array(parts)) => parts
            .iter()
            .map(|part| match resolve(doc, part) {
                Some(Object::Stream(stream)) => decoded_len(stream),
                _ => 0,
            })
            .sum::<u64>(),
        _ => 0,
    }
}

fn decoded_len(stream: &Stream) -> u64 {
    if stream.dict.get(b"Filter").is_err() {
        return stream.content.len() as u64;
    }
    match stream.decompressed_content() {
        Ok(decoded) => decoded.len() as u64,
        Err(e) => {
            log::debug!("Unreadable content stream counted as empty: {}", e);
            0
        }
    }
}

fn embedded_image_bytes(doc: &Document, page_id: ObjectId) -> u64 {
    let Some(resources) =
        inherited_attribute(doc, page_id, b"Resources").and_then(|r| resolve_dict(doc, r))
    else {
        return 0;
    };

    let mut seen = HashSet::new();
    xobject_refs(doc, resources)
        .into_iter()
        .map(|id| image_bytes_recursive(doc, id, &mut seen))
        .sum()
}

fn xobject_refs(doc: &Document, resources: &lopdf::Dictionary) -> Vec<ObjectId> {
    resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve_dict(doc, x))
        .map(|xobjects| {
            xobjects
                .iter()
                .filter_map(|(_, obj)| obj.as_reference().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn image_bytes_recursive(doc: &Document, id: ObjectId, seen: &mut HashSet<ObjectId>) -> u64 {
    if !seen.insert(id) {
        return 0;
    }
    let Ok(Object::Stream(stream)) = doc.get_object(id) else {
        return 0;
    };

    match stream.dict.get(b"Subtype").and_then(|s| s.as_name()) {
        Ok(b"Image") => {
            let smask = stream
                .dict
                .get(b"SMask")
                .ok()
                .and_then(|s| s.as_reference().ok())
                .map(|mask| image_bytes_recursive(doc, mask, seen))
                .unwrap_or(0);
            stream.content.len() as u64 + smask
        }
        Ok(b"Form") => stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r))
            .map(|res| {
                xobject_refs(doc, res)
                    .into_iter()
                    .map(|child| image_bytes_recursive(doc, child, seen))
                    .sum::<u64>()
            })
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use lopdf::{dictionary, Dictionary};

    use super::*;
    use crate::test_support::{box_array, custom_page_source, multi_page_source};

    fn image(doc: &mut Document, len: usize) -> ObjectId {
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 10i64,
                "Height" => 10i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
            },
            vec![0x55; len],
        ))
    }

    fn form(resources: Dictionary) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => box_array(0, 0, 100, 100),
                "Resources" => resources,
            },
            b"/Im0 Do".to_vec(),
        )
    }

    fn xobjects(entries: Vec<(&str, ObjectId)>) -> Dictionary {
        let mut names = Dictionary::new();
        for (name, id) in entries {
            names.set(name, Object::Reference(id));
        }
        dictionary! { "XObject" => names }
    }

    #[test]
    fn test_plain_content_counts_stored_length() {
        let source = custom_page_source(Dictionary::new(), |doc| {
            let content = doc.add_object(Stream::new(Dictionary::new(), vec![b' '; 1200]));
            dictionary! { "Contents" => content }
        });
        let estimate = source.estimate(0);
        assert_eq!(estimate.content_stream_bytes, 1200);
        assert_eq!(estimate.embedded_image_bytes, 0);
    }

    #[test]
    fn test_compressed_content_counts_decoded_length() {
        let source = custom_page_source(Dictionary::new(), |doc| {
            let mut stream = Stream::new(Dictionary::new(), vec![b'q'; 8000]);
            stream.compress().unwrap();
            assert!(stream.content.len() < 8000);
            let content = doc.add_object(stream);
            dictionary! { "Contents" => content }
        });
        assert_eq!(source.estimate(0).content_stream_bytes, 8000);
    }

    #[test]
    fn test_content_array_is_summed() {
        let source = custom_page_source(Dictionary::new(), |doc| {
            let first = doc.add_object(Stream::new(Dictionary::new(), vec![b' '; 300]));
            let second = doc.add_object(Stream::new(Dictionary::new(), vec![b' '; 200]));
            dictionary! {
                "Contents" => vec![Object::Reference(first), Object::Reference(second)],
            }
        });
        assert_eq!(source.estimate(0).content_stream_bytes, 500);
    }

    #[test]
    fn test_unreadable_content_counts_as_zero() {
        let source = custom_page_source(Dictionary::new(), |doc| {
            let broken = doc.add_object(Stream::new(
                dictionary! { "Filter" => "FlateDecode" },
                b"definitely not zlib data".to_vec(),
            ));
            dictionary! { "Contents" => broken }
        });
        assert_eq!(source.estimate(0).content_stream_bytes, 0);
    }

    #[test]
    fn test_image_and_soft_mask_are_counted() {
        let source = custom_page_source(Dictionary::new(), |doc| {
            let mask = image(doc, 1000);
            let picture = image(doc, 5000);
            if let Ok(Object::Stream(stream)) = doc.get_object_mut(picture) {
                stream.dict.set("SMask", Object::Reference(mask));
            }
            dictionary! { "Resources" => xobjects(vec![("Im0", picture)]) }
        });
        assert_eq!(source.estimate(0).embedded_image_bytes, 6000);
    }

    #[test]
    fn test_images_inside_forms_are_counted_once() {
        let source = custom_page_source(Dictionary::new(), |doc| {
            let picture = image(doc, 5000);
            let form_id = doc.add_object(form(xobjects(vec![("Im0", picture)])));
            dictionary! {
                "Resources" => xobjects(vec![("Fm0", form_id), ("Im0", picture)]),
            }
        });
        assert_eq!(source.estimate(0).embedded_image_bytes, 5000);
    }

    #[test]
    fn test_self_referencing_form_terminates() {
        let source = custom_page_source(Dictionary::new(), |doc| {
            let form_id = doc.new_object_id();
            let picture = image(doc, 700);
            doc.objects.insert(
                form_id,
                Object::Stream(form(xobjects(vec![("Fm0", form_id), ("Im0", picture)]))),
            );
            dictionary! { "Resources" => xobjects(vec![("Fm0", form_id)]) }
        });
        assert_eq!(source.estimate(0).embedded_image_bytes, 700);
    }

    #[test]
    fn test_inherited_resources_are_used() {
        let source = multi_page_source(1);
        let estimate = source.estimate(0);
        assert!(estimate.content_stream_bytes > 0);
        assert_eq!(estimate.embedded_image_bytes, 0);
    }

    #[test]
    fn test_out_of_range_page_weighs_nothing() {
        let source = multi_page_source(1);
        assert_eq!(source.estimate(4), SizeEstimate::default());
    }
}
