mod common;

use common::*;
use mp4probe::decoders::{MetadataPayload, Record};
use mp4probe::{BoxTree, Content, Error, FourCC, ParseOptions, Registry};

#[test]
fn ftyp_then_moov_with_mvhd() {
    let data = concat(&[boxed(b"ftyp", &[0; 8]), boxed(b"moov", &mvhd(5000))]);
    let tree = BoxTree::parse(&window(data));

    assert!(tree.error().is_none());
    assert_eq!(tree.roots().len(), 2);

    let ftyp = tree.node(tree.roots()[0]);
    assert_eq!((ftyp.typ, ftyp.start, ftyp.size), (FourCC(*b"ftyp"), 0, 16));

    let moov = tree.node(tree.roots()[1]);
    assert!(moov.is_container());
    assert_eq!(moov.children.len(), 1);

    let mvhd = tree.node(moov.children[0]);
    assert_eq!(mvhd.typ, FourCC(*b"mvhd"));
    assert_eq!(mvhd.start, 16 + 8);
    assert_eq!(mvhd.parent, Some(tree.roots()[1]));
    match mvhd.record() {
        Some(Record::MovieHeader(h)) => {
            assert_eq!(h.timescale, 1000);
            assert_eq!(h.duration_seconds(), Some(5.0));
            assert_eq!(h.rate, 1.0);
            assert_eq!(h.next_track_id, 2);
            assert_eq!(h.created.to_rfc3339(), "1904-01-01T00:00:00+00:00");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(tree.find_path("moov/mvhd"), Some(moov.children[0]));
}

#[test]
fn truncated_subtree_keeps_decoded_siblings() {
    // trak declares more than the moov holds; the mvhd before it survives
    let mut trak = boxed(b"trak", &[0; 40]);
    trak.truncate(20);
    let mut moov_body = mvhd(10);
    moov_body.extend_from_slice(&trak);
    let data = concat(&[ftyp(), boxed(b"moov", &moov_body), boxed(b"free", &[])]);

    let tree = BoxTree::parse(&window(data));
    assert!(tree.error().is_none());
    assert_eq!(tree.roots().len(), 3);

    let moov = tree.node(tree.roots()[1]);
    assert_eq!(moov.children.len(), 1);
    assert!(matches!(tree.node(moov.children[0]).record(), Some(Record::MovieHeader(_))));
    let err = moov.error.as_ref().unwrap();
    assert_eq!(err.missing_bytes(), Some(28));

    let issues: Vec<_> = tree.issues().collect();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].0, Some(tree.roots()[1]));
}

#[test]
fn top_level_truncation_is_recorded_on_tree() {
    let mut mdat = boxed(b"mdat", &[0; 64]);
    mdat.truncate(40);
    let data = concat(&[ftyp(), mdat]);
    let tree = BoxTree::parse(&window(data));
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.error().and_then(|e| e.missing_bytes()), Some(32));
}

#[test]
fn decoder_failure_falls_back_to_unparsed() {
    // version 3 is not a valid mvhd
    let bad = full_box(b"mvhd", 3, 0, &[0; 96]);
    let data = boxed(b"moov", &bad);
    let tree = BoxTree::parse(&window(data));

    let id = tree.find_path("moov/mvhd").unwrap();
    let node = tree.node(id);
    assert!(matches!(node.error, Some(Error::DecodeAssumption { .. })));
    match &node.content {
        Content::Unparsed(w) => assert_eq!(w.len(), 100),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_boxes_stay_unparsed() {
    let data = boxed(b"zzzz", b"hello");
    let tree = BoxTree::parse(&window(data));
    match &tree.node(tree.roots()[0]).content {
        Content::Unparsed(w) => assert_eq!(w.materialize().unwrap(), b"hello"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn depth_guard_stops_deep_nesting() {
    let mut data = boxed(b"free", &[]);
    for _ in 0..10 {
        data = boxed(b"udta", &data);
    }
    let opts = ParseOptions { max_depth: 4 };
    let tree = BoxTree::parse_with(&window(data), Registry::standard(), &opts);

    let deepest = tree.iter().last().unwrap();
    assert_eq!(tree.depth(deepest), 4);
    assert!(matches!(
        tree.node(deepest).error,
        Some(Error::DepthExceeded { limit: 4, .. })
    ));
    assert_eq!(tree.len(), 5);
}

#[test]
fn meta_prefix_depends_on_parent() {
    // ISO meta under udta has version and flags before its children
    let hdlr = full_box(b"hdlr", 0, 0, &[0; 20]);
    let mut iso_meta = vec![0, 0, 0, 0];
    iso_meta.extend_from_slice(&hdlr);
    let udta = boxed(b"udta", &boxed(b"meta", &iso_meta));
    // QuickTime meta directly under moov has none
    let qt_meta = boxed(b"meta", &hdlr);
    let data = boxed(b"moov", &concat(&[udta, qt_meta]));

    let tree = BoxTree::parse(&window(data));
    assert!(!tree.has_issues(), "{:?}", tree.issues().collect::<Vec<_>>());
    assert!(tree.find_path("moov/udta/meta/hdlr").is_some());
    assert!(tree.find_path("moov/meta/hdlr").is_some());
}

fn data_box(type_indicator: u32, payload: &[u8]) -> Vec<u8> {
    let mut p = vec![0, 0, 0, 0];
    p.extend_from_slice(payload);
    full_box(b"data", 0, type_indicator, &p)
}

#[test]
fn metadata_items_resolve_key_names() {
    let mut keys = 2u32.to_be_bytes().to_vec();
    for name in [&b"com.apple.quicktime.make"[..], b"com.apple.quicktime.model"] {
        keys.extend_from_slice(&(8 + name.len() as u32).to_be_bytes());
        keys.extend_from_slice(b"mdta");
        keys.extend_from_slice(name);
    }
    let keys = full_box(b"keys", 0, 0, &keys);
    let item = |index: u32, value: &[u8]| boxed(&index.to_be_bytes(), &data_box(1, value));
    let ilst = boxed(b"ilst", &concat(&[item(2, b"iPhone"), item(1, b"Apple")]));
    let meta = boxed(b"meta", &concat(&[keys, ilst]));
    let data = boxed(b"moov", &meta);

    let tree = BoxTree::parse(&window(data));
    assert!(!tree.has_issues(), "{:?}", tree.issues().collect::<Vec<_>>());

    let ilst = tree.find_path("moov/meta/ilst").unwrap();
    let items = tree.node(ilst).children.clone();
    assert_eq!(
        tree.item_name(items[0]).as_deref(),
        Some("com.apple.quicktime.model")
    );
    assert_eq!(
        tree.item_name(items[1]).as_deref(),
        Some("com.apple.quicktime.make")
    );

    let value = tree.node(tree.node(items[0]).children[0]).record();
    match value {
        Some(Record::MetadataValue(v)) => {
            assert_eq!(v.type_indicator, 1);
            assert!(matches!(&v.payload, MetadataPayload::Text(s) if s == "iPhone"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn old_style_items_use_their_code() {
    let ilst = boxed(b"ilst", &boxed(b"\xa9nam", &data_box(1, b"Title")));
    let mut meta = vec![0, 0, 0, 0];
    meta.extend_from_slice(&ilst);
    let data = boxed(b"moov", &boxed(b"udta", &boxed(b"meta", &meta)));

    let tree = BoxTree::parse(&window(data));
    let item = tree.find_all("moov/udta/meta/ilst/\u{a9}nam");
    assert_eq!(item.len(), 1);
    assert_eq!(tree.item_name(item[0]).as_deref(), Some("\u{a9}nam"));
}

#[test]
fn iter_is_preorder() {
    let trak = boxed(b"trak", &boxed(b"tkhd", &[]));
    let data = concat(&[ftyp(), boxed(b"moov", &concat(&[mvhd(1), trak])), boxed(b"mdat", &[])]);
    let tree = BoxTree::parse(&window(data));
    let order: Vec<String> = tree.iter().map(|id| tree.node(id).typ.to_string()).collect();
    assert_eq!(order, ["ftyp", "moov", "mvhd", "trak", "tkhd", "mdat"]);
    assert_eq!(tree.children_of_type(None, FourCC(*b"mdat")).count(), 1);
}
