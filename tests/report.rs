mod common;

use common::*;
use mp4probe::decoders::{MetadataPayload, MetadataValue};
use mp4probe::report::{JsonReport, render_text};
use mp4probe::{
    BoxDecoder, BoxHeader, BoxKey, BoxTree, ByteWindow, ParseOptions, Record, Registry, Status,
    classify, default_registry,
};

#[test]
fn text_rendering_nests_children() {
    let data = concat(&[ftyp(), boxed(b"moov", &mvhd(1000))]);
    let tree = BoxTree::parse(&window(data));
    let text = render_text(&tree);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[0],
        "[1] ftyp  [@0 + 24] { major=isom minor=512 compatible=[isom, mp41] }"
    );
    assert_eq!(lines[1], "[2] moov  [@24 + 116] // 1 children...");
    assert_eq!(lines[2], "{");
    assert!(lines[3].starts_with("    [1] mvhd  [@32 + 108] { version=0 "));
    assert_eq!(lines[4], "}");
    assert_eq!(lines.len(), 5);
}

#[test]
fn text_rendering_reports_errors() {
    let mut trak = boxed(b"trak", &[0; 40]);
    trak.truncate(20);
    let mut mdat = boxed(b"mdat", &[0; 16]);
    mdat.truncate(10);
    let data = concat(&[boxed(b"moov", &trak), mdat]);
    let tree = BoxTree::parse(&window(data));
    let text = render_text(&tree);

    assert!(
        text.contains("    StructuralTruncation: Atom trak@8 Should end at 56, does end at 28 (28 missing)"),
        "{text}"
    );
    let last = text.lines().last().unwrap();
    assert_eq!(
        last,
        "StructuralTruncation: Atom mdat@28 Should end at 52, does end at 38 (14 missing)"
    );
}

/// Decodes a made-up `cust` box into a binary metadata value.
struct CustomDecoder;

impl BoxDecoder for CustomDecoder {
    fn decode(&self, _hdr: &BoxHeader, content: &mut ByteWindow) -> mp4probe::Result<Record> {
        let bytes = content.rest().materialize()?;
        Ok(Record::MetadataValue(MetadataValue {
            type_indicator: 0,
            locale: 0,
            payload: MetadataPayload::Binary(bytes),
        }))
    }
}

#[test]
fn custom_decoder_shows_up_in_json() {
    let registry = default_registry().with_decoder(BoxKey::of(b"cust"), "custom", Box::new(CustomDecoder));
    let data = concat(&[ftyp(), boxed(b"cust", &[0, 1, 2, 3])]);
    let tree = BoxTree::parse_with(&window(data), &registry, &ParseOptions::default());
    let status = classify(&tree, 1_000_000);
    assert_eq!(status, Status::Good);

    let report = JsonReport::new("mem.mp4", &tree, status);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "good");
    assert_eq!(json["status_text"], "GOOD");

    let cust = &json["boxes"][1];
    assert_eq!(cust["typ"], "cust");
    assert_eq!(cust["kind"], "record");
    assert_eq!(cust["decoded"]["kind"], "metadata_value");
    assert_eq!(cust["decoded"]["payload"]["value"], "00010203");

    // without the custom entry the box stays raw
    let plain = BoxTree::parse_with(&window(concat(&[boxed(b"cust", &[9])])), Registry::standard(), &ParseOptions::default());
    let json = serde_json::to_value(JsonReport::new("mem.mp4", &plain, Status::Good)).unwrap();
    assert_eq!(json["boxes"][0]["kind"], "unparsed");
}

#[test]
fn json_names_known_boxes_and_nests() {
    let data = boxed(b"moov", &mvhd(1));
    let tree = BoxTree::parse(&window(data));
    let json = serde_json::to_value(JsonReport::new("x", &tree, Status::Good)).unwrap();
    let moov = &json["boxes"][0];
    assert_eq!(moov["full_name"], "Movie Box");
    assert_eq!(moov["children"][0]["decoded"]["timescale"], 1000);
    assert!(json.get("error").is_none());
}
