//! In-memory fixture documents for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use crate::source::SourceDocument;

fn text_content(label: &str) -> Vec<u8> {
    Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(24)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
            Operation::new("Tj", vec![Object::string_literal(label)]),
            Operation::new("ET", vec![]),
        ],
    }
    .encode()
    .unwrap()
}

/// `page_count` US Letter pages; MediaBox and Resources live on the page
/// tree root and are inherited.
pub fn multi_page_bytes(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let kids: Vec<Object> = (0..page_count)
        .map(|i| {
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                text_content(&format!("Page {}", i + 1)),
            ));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            }))
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn multi_page_source(page_count: usize) -> SourceDocument {
    SourceDocument::open(multi_page_bytes(page_count)).unwrap()
}

/// One page of `width` x `height` points with its own MediaBox
pub fn single_page_source(width: f64, height: f64) -> SourceDocument {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), text_content("Single")));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ],
        "Resources" => Dictionary::new(),
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    SourceDocument::open(bytes).unwrap()
}

/// One page whose dictionary is built by `page`, under a page tree root
/// carrying the `inherited` attributes. `page` may add the objects it
/// refers to.
pub fn custom_page_source(
    inherited: Dictionary,
    page: impl FnOnce(&mut Document) -> Dictionary,
) -> SourceDocument {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_dict = page(&mut doc);
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(pages_id));
    let page_id = doc.add_object(page_dict);

    let mut root = inherited;
    root.set("Type", Object::Name(b"Pages".to_vec()));
    root.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    root.set("Count", Object::Integer(1));
    doc.objects.insert(pages_id, Object::Dictionary(root));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    SourceDocument::open(bytes).unwrap()
}

/// Integer PDF box array
pub fn box_array(x0: i64, y0: i64, x1: i64, y1: i64) -> Object {
    Object::Array(vec![
        Object::Integer(x0),
        Object::Integer(y0),
        Object::Integer(x1),
        Object::Integer(y1),
    ])
}
