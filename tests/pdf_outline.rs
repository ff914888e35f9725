use std::fs;
use std::path::Path;

use lopdf::{dictionary, Document, Object};
use pdf_bookmarks::outline::{read_outline, write_outline};
use pdf_bookmarks::pdf::PdfDocument;
use pdf_bookmarks::text::TextCodec;
use pdf_bookmarks::{BookmarkTree, Converter, Markers};
use sha2::{Digest, Sha256};
use tempfile::tempdir;

fn sample_document(page_count: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..page_count)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn sample_tree() -> BookmarkTree {
    TextCodec::new(Markers::default())
        .expect("default markers")
        .parse("Cover\t1\n第1章 概述\t2\n\t1.1 背景\t3\n\t\tDetails\t\nAppendix\t5")
        .expect("sample parses")
}

fn outlined_bytes() -> Vec<u8> {
    let mut document = PdfDocument::from_document(sample_document(5));
    write_outline(&mut document, &sample_tree()).expect("outline written");
    document.to_bytes().expect("document saved")
}

fn flatten(tree: &BookmarkTree) -> Vec<(u32, String, Option<u32>)> {
    tree.iter()
        .map(|id| {
            let node = &tree[id];
            (node.level(), node.title().to_string(), node.page_num())
        })
        .collect()
}

#[test]
fn writing_the_same_outline_is_deterministic() {
    let hash_a: [u8; 32] = Sha256::digest(outlined_bytes()).into();
    let hash_b: [u8; 32] = Sha256::digest(outlined_bytes()).into();
    assert_eq!(hash_a, hash_b, "identical input must give identical PDF bytes");
}

#[test]
fn outline_survives_save_and_reload() {
    let document = PdfDocument::from_bytes(&outlined_bytes()).expect("reload");
    let tree = read_outline(&document).expect("outline reads");
    assert_eq!(flatten(&tree), flatten(&sample_tree()));
}

#[test]
fn add_replaces_existing_outline() {
    let dir = tempdir().expect("temp dir");
    let input = dir.path().join("book.pdf");
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.json");
    let output = dir.path().join("book_out.pdf");
    let again = dir.path().join("book_again.pdf");
    sample_document(3).save(&input).expect("save input");
    fs::write(&first, "Old A\t1\nOld B\t2").expect("write first");
    fs::write(
        &second,
        r#"{"title": "Root", "page_num": "", "child": [
            {"title": "New", "page_num": 3, "child": [
                {"title": "Inner", "page_num": "", "child": []}
            ]}
        ]}"#,
    )
    .expect("write second");

    let converter = Converter::new(Markers::default()).expect("converter");
    converter.add_bookmarks(&input, &first, &output).expect("first add");
    converter.add_bookmarks(&output, &second, &again).expect("second add");

    let tree = read_outline(&PdfDocument::open(&again).expect("open")).expect("read");
    assert_eq!(
        flatten(&tree),
        vec![
            (1, "New".to_string(), Some(3)),
            (2, "Inner".to_string(), None),
        ]
    );
}

#[test]
fn bookmark_past_last_page_fails_without_output() {
    let dir = tempdir().expect("temp dir");
    let input = dir.path().join("short.pdf");
    let toc = dir.path().join("toc.txt");
    let output = dir.path().join("out.pdf");
    sample_document(2).save(&input).expect("save input");
    fs::write(&toc, "Too far\t9").expect("write toc");

    let converter = Converter::new(Markers::default()).expect("converter");
    assert!(converter.add_bookmarks(&input, &toc, &output).is_err());
    assert!(!Path::new(&output).exists());
}

#[test]
fn exported_json_lists_pages_one_based() {
    let dir = tempdir().expect("temp dir");
    let input = dir.path().join("book.pdf");
    let exported = dir.path().join("book.json");
    fs::write(&input, outlined_bytes()).expect("write input");

    Converter::new(Markers::default())
        .expect("converter")
        .export_bookmarks(&input, &exported)
        .expect("export succeeds");
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&exported).expect("read json")).expect("json");
    assert_eq!(value["child"][0]["title"], "Cover");
    assert_eq!(value["child"][0]["page_num"], 1);
    assert_eq!(value["child"][1]["child"][0]["child"][0]["page_num"], "");
}
