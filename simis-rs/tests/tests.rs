use flate2::write::ZlibEncoder;
use flate2::Compression;
use simis_rs::diagnostics::{Diagnostics, Location};
use simis_rs::error::SimisError;
use simis_rs::simis_file::SimisFile;
use simis_rs::token_id::TokenId;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

/// Sink that collects diagnostics so tests can assert on them.
#[derive(Clone, Default)]
struct Collect {
    warnings: Arc<Mutex<Vec<String>>>,
    infos: Arc<Mutex<Vec<String>>>,
}

impl Collect {
    fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }
}

impl Diagnostics for Collect {
    fn info(&mut self, _at: &Location, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn warn(&mut self, _at: &Location, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn fail(&mut self, _at: &Location, message: &str) {
        self.warnings
            .lock()
            .unwrap()
            .push(format!("fatal: {message}"));
    }
}

fn open(bytes: Vec<u8>) -> (SimisFile, Collect) {
    let sink = Collect::default();
    let file = SimisFile::from_reader(Cursor::new(bytes), "test", Box::new(sink.clone()))
        .expect("fixture should open");
    (file, sink)
}

fn text_fixture(body: &str) -> Vec<u8> {
    let mut bytes = b"SIMISA@@@@@@@@@@".to_vec();
    bytes.extend_from_slice(b"JINX0D0t______\r\n");
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn unicode_text_fixture(body: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(utf16le("SIMISA@@@@@@@@@@"));
    bytes.extend(utf16le("JINX0D0t______\r\n"));
    bytes.extend(utf16le(body));
    bytes
}

/// Serializes one binary block: 8-byte header, label length byte, UTF-16
/// label, payload.
fn binary_block(token: u16, flags: u16, label: &str, payload: &[u8]) -> Vec<u8> {
    let label_units: Vec<u16> = label.encode_utf16().collect();
    let length = 1 + 2 * label_units.len() + payload.len();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&token.to_le_bytes());
    bytes.extend_from_slice(&flags.to_le_bytes());
    bytes.extend_from_slice(&(length as u32).to_le_bytes());
    bytes.push(label_units.len() as u8);
    for unit in label_units {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes.extend_from_slice(payload);
    bytes
}

fn binary_fixture(sub_header: &[u8; 16], blocks: &[u8]) -> Vec<u8> {
    let mut bytes = b"SIMISA@@@@@@@@@@".to_vec();
    bytes.extend_from_slice(sub_header);
    bytes.extend_from_slice(blocks);
    bytes
}

fn binary_string(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut bytes = (units.len() as u16).to_le_bytes().to_vec();
    for unit in units {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

#[test]
fn text_round_trip() {
    let (mut file, sink) = open(text_fixture("wagon ( 1 2.5 \"abc\" )"));
    let mut block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Wagon);
    assert_eq!(block.label(), None);
    assert_eq!(block.read_int(), 1);
    assert_eq!(block.read_float(), 2.5);
    assert_eq!(block.read_string(), "abc");
    block.verify_end_of_block();
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn labeled_block() {
    let (mut file, sink) = open(text_fixture("matrix MAIN ( 0 )"));
    let mut block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Matrix);
    assert_eq!(block.label(), Some("MAIN"));
    block.skip();
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn skip_consumes_exactly_the_nested_block() {
    let body = "wagon ( type ( lights ( 1 2 ) ) name ( \"x\" ) ) engine ( )";
    let (mut file, sink) = open(text_fixture(body));
    let mut wagon = file.read_sub_block();
    assert_eq!(wagon.id(), TokenId::Wagon);
    wagon.skip();
    drop(wagon);
    let mut engine = file.read_sub_block();
    assert_eq!(engine.id(), TokenId::Engine);
    assert!(engine.end_of_block());
    engine.verify_end_of_block();
    drop(engine);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn end_of_block_is_idempotent() {
    let (mut file, sink) = open(text_fixture("wagon ( )"));
    let mut block = file.read_sub_block();
    assert!(block.end_of_block());
    assert!(block.end_of_block());
    assert!(block.end_of_block());
    block.verify_end_of_block();
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn doubled_close_bracket_warns_exactly_once() {
    let body = "engine ( comment ( ignored stuff ) foo 5 ) )";
    let (mut file, sink) = open(text_fixture(body));
    let mut engine = file.read_sub_block();
    assert_eq!(engine.id(), TokenId::Engine);

    let mut comment = engine.read_sub_block();
    assert_eq!(comment.id(), TokenId::Comment);
    comment.skip();
    drop(comment);

    assert_eq!(engine.read_string(), "foo");
    assert_eq!(engine.read_int(), 5);
    engine.verify_end_of_block();
    drop(engine);

    // The stray trailing bracket surfaces as one ignorable block.
    assert!(!file.end_of_file());
    let extra = file.read_sub_block();
    assert_eq!(extra.id(), TokenId::Comment);
    drop(extra);
    assert!(file.end_of_file());
    file.verify_end_of_file();
    drop(file);

    let close_bracket_warnings = sink
        .warnings()
        .iter()
        .filter(|w| w.contains("Ignored extra close bracket"))
        .count();
    assert_eq!(close_bracket_warnings, 1);
    assert_eq!(sink.warnings().len(), 1, "{:?}", sink.warnings());
}

#[test]
fn unknown_token_becomes_comment_with_warning() {
    let (mut file, sink) = open(text_fixture("zzz_unknown ( 1 ) wagon ( )"));
    let mut unknown = file.read_sub_block();
    assert_eq!(unknown.id(), TokenId::Comment);
    unknown.skip();
    drop(unknown);
    let wagon = file.read_sub_block();
    assert_eq!(wagon.id(), TokenId::Wagon);
    drop(wagon);
    file.verify_end_of_file();
    drop(file);
    assert_eq!(sink.warnings().len(), 1);
    assert!(sink.warnings()[0].contains("zzz_unknown"));
}

#[test]
fn trailing_comment_before_close_bracket() {
    let body = "maxreleaserate ( 1.4074 #For_train_position_31-45 use ( 1.86 ) )";
    let (mut file, sink) = open(text_fixture(body));
    let mut block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::MaxReleaseRate);
    assert_eq!(block.read_float(), 1.4074);
    block.verify_end_of_block();
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn anonymous_bracket_is_a_comment_block() {
    let body = "( #_fire temp, fire mass ) wagon ( )";
    let (mut file, sink) = open(text_fixture(body));
    let mut comment = file.read_sub_block();
    assert_eq!(comment.id(), TokenId::Comment);
    comment.skip();
    drop(comment);
    let wagon = file.read_sub_block();
    assert_eq!(wagon.id(), TokenId::Wagon);
    drop(wagon);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn missing_open_bracket_after_label_is_a_warning() {
    let (mut file, sink) = open(text_fixture("matrix MAIN 1 )"));
    let block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Matrix);
    assert_eq!(block.label(), Some("MAIN"));
    drop(block);
    file.skip();
    drop(file);
    assert!(sink.warnings().iter().any(|w| w.contains("Expected '('")));
}

#[test]
fn flags_and_vector_reads() {
    let body = "staticflags ( 00000002 ) position ( 1.5 2.5 3.5 )";
    let (mut file, sink) = open(text_fixture(body));
    let mut flags = file.read_sub_block();
    assert_eq!(flags.read_flags(), 2);
    drop(flags);
    let mut position = file.read_sub_block();
    assert_eq!(position.id(), TokenId::Position);
    let v = position.read_vector3();
    assert_eq!((v.x, v.y, v.z), (1.5, 2.5, 3.5));
    drop(position);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn dropping_an_open_block_verifies_it() {
    let (mut file, sink) = open(text_fixture("wagon ( 1 )"));
    let mut block = file.read_sub_block();
    assert_eq!(block.read_int(), 1);
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn verify_id_mismatch_is_informational() {
    let (mut file, sink) = open(text_fixture("wagon ( )"));
    let mut block = file.read_sub_block();
    block.verify_id(TokenId::Engine);
    drop(block);
    drop(file);
    assert!(sink.warnings().is_empty());
    assert!(sink
        .infos()
        .iter()
        .any(|m| m.contains("Expected block engine")));
}

#[test]
fn unicode_text_file() {
    let (mut file, sink) = open(unicode_text_fixture("engine BNSF ( 42 )"));
    let mut block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Engine);
    assert_eq!(block.label(), Some("BNSF"));
    assert_eq!(block.read_int(), 42);
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn improper_header_is_tolerated_with_a_warning() {
    let mut bytes = b"\r\nSIMISA@@@@@@@@@@\r\n".to_vec();
    bytes.extend_from_slice(b"JINX0D0t______\r\n");
    bytes.extend_from_slice(b"wagon ( )");
    let (mut file, sink) = open(bytes);
    let block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Wagon);
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert_eq!(sink.warnings(), vec!["Improper header".to_string()]);
}

#[test]
fn unrecognized_header_is_fatal() {
    let mut bytes = b"BOGUSSIG@@@@@@@@".to_vec();
    bytes.extend_from_slice(b"JINX0D0t______\r\n");
    let result = SimisFile::from_reader(
        Cursor::new(bytes),
        "bogus.wag",
        Box::new(Collect::default()),
    );
    match result {
        Err(SimisError::UnrecognizedHeader { file, header }) => {
            assert_eq!(file, "bogus.wag");
            assert!(header.starts_with("BOGUSSIG"));
        }
        Err(other) => panic!("expected UnrecognizedHeader, got {other:?}"),
        Ok(_) => panic!("a bogus signature should not open"),
    }
}

#[test]
fn unrecognized_sub_header_is_fatal() {
    let bytes = binary_fixture(b"JINX0s1x______\r\n", &[]);
    let result =
        SimisFile::from_reader(Cursor::new(bytes), "bogus.s", Box::new(Collect::default()));
    assert!(matches!(
        result,
        Err(SimisError::UnrecognizedSubHeader { .. })
    ));
}

#[test]
fn binary_round_trip() {
    let mut payload = 1i32.to_le_bytes().to_vec();
    payload.extend_from_slice(&2.5f32.to_le_bytes());
    payload.extend_from_slice(&binary_string("abc"));
    let blocks = binary_block(TokenId::Wagon as u16, 0, "", &payload);
    let (mut file, sink) = open(binary_fixture(b"JINX0s1b______\r\n", &blocks));
    let mut block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Wagon);
    assert_eq!(block.label(), None);
    assert_eq!(block.read_int(), 1);
    assert_eq!(block.read_float(), 2.5);
    assert_eq!(block.read_string(), "abc");
    assert!(block.end_of_block());
    block.verify_end_of_block();
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn binary_label_and_flags() {
    let payload = 7u32.to_le_bytes();
    let blocks = binary_block(TokenId::Matrix as u16, 0x4000, "BOGIE1", &payload);
    let (mut file, sink) = open(binary_fixture(b"JINX0s1b______\r\n", &blocks));
    let mut block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Matrix);
    assert_eq!(block.label(), Some("BOGIE1"));
    assert_eq!(block.flags(), 0x4000);
    assert_eq!(block.read_uint(), 7);
    assert!(block.end_of_block());
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn binary_nested_blocks_balance_their_budgets() {
    let child = binary_block(TokenId::Light as u16, 0, "", &9i32.to_le_bytes());
    let parent = binary_block(TokenId::Lights as u16, 0, "", &child);
    let (mut file, sink) = open(binary_fixture(b"JINX0s1b______\r\n", &parent));
    let mut lights = file.read_sub_block();
    assert_eq!(lights.id(), TokenId::Lights);
    assert!(!lights.end_of_block());
    let mut light = lights.read_sub_block();
    assert_eq!(light.id(), TokenId::Light);
    assert_eq!(light.read_int(), 9);
    assert!(light.end_of_block());
    drop(light);
    // The child's header, label, and payload together account for exactly
    // the bytes the parent had left.
    assert!(lights.end_of_block());
    lights.verify_end_of_block();
    drop(lights);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn binary_skip_drains_the_declared_length() {
    let mut blocks = binary_block(TokenId::Matrix as u16, 0, "", &[0u8; 12]);
    blocks.extend(binary_block(
        TokenId::Wagon as u16,
        0,
        "",
        &5i32.to_le_bytes(),
    ));
    let (mut file, sink) = open(binary_fixture(b"JINX0s1b______\r\n", &blocks));
    let mut first = file.read_sub_block();
    first.skip();
    drop(first);
    let mut second = file.read_sub_block();
    assert_eq!(second.id(), TokenId::Wagon);
    assert_eq!(second.read_int(), 5);
    drop(second);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn binary_truncated_stream_warns_and_closes() {
    // Header declares 10 bytes but only 6 follow.
    let mut blocks = Vec::new();
    blocks.extend_from_slice(&(TokenId::Wagon as u16).to_le_bytes());
    blocks.extend_from_slice(&0u16.to_le_bytes());
    blocks.extend_from_slice(&10u32.to_le_bytes());
    blocks.extend_from_slice(&[0u8; 6]);
    let (mut file, sink) = open(binary_fixture(b"JINX0s1b______\r\n", &blocks));
    let mut block = file.read_sub_block();
    block.skip();
    assert!(block.end_of_block());
    drop(block);
    drop(file);
    assert!(sink
        .warnings()
        .iter()
        .any(|w| w.contains("Unexpected end of file")));
}

#[test]
fn binary_child_cannot_exceed_parent_budget() {
    // A parent whose only child claims far more than the parent holds.
    let mut child = Vec::new();
    child.extend_from_slice(&(TokenId::Light as u16).to_le_bytes());
    child.extend_from_slice(&0u16.to_le_bytes());
    child.extend_from_slice(&100u32.to_le_bytes());
    child.push(0); // label length
    child.extend_from_slice(&3i32.to_le_bytes());
    let parent = binary_block(TokenId::Lights as u16, 0, "", &child);
    let (mut file, sink) = open(binary_fixture(b"JINX0s1b______\r\n", &parent));
    let mut lights = file.read_sub_block();
    let mut light = lights.read_sub_block();
    assert_eq!(light.read_int(), 3);
    assert!(light.end_of_block());
    drop(light);
    assert!(lights.end_of_block());
    drop(lights);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().iter().any(|w| w.contains("claims")));
}

#[test]
fn world_sub_header_offsets_token_numbers() {
    // World files store token numbers relative to the 300 offset.
    let number = TokenId::Static as u16 - 300;
    let blocks = binary_block(number, 0, "", &[]);
    let (mut file, sink) = open(binary_fixture(b"JINX0w1b______\r\n", &blocks));
    let block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Static);
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn compressed_binary_file() {
    let payload = 11i32.to_le_bytes();
    let blocks = binary_block(TokenId::Wagon as u16, 0, "", &payload);
    let mut compressed_body = b"JINX0s1b______\r\n".to_vec();
    compressed_body.extend_from_slice(&blocks);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&compressed_body).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut bytes = b"SIMISA@F@@@@@@@@".to_vec();
    bytes.extend_from_slice(&compressed);

    let (mut file, sink) = open(bytes);
    let mut block = file.read_sub_block();
    assert_eq!(block.id(), TokenId::Wagon);
    assert_eq!(block.read_int(), 11);
    assert!(block.end_of_block());
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink.warnings().is_empty(), "{:?}", sink.warnings());
}

#[test]
fn trailing_bytes_after_top_block_warn() {
    let mut blocks = binary_block(TokenId::Wagon as u16, 0, "", &[]);
    blocks.extend_from_slice(&[1, 2, 3]);
    let (mut file, sink) = open(binary_fixture(b"JINX0s1b______\r\n", &blocks));
    let block = file.read_sub_block();
    drop(block);
    file.verify_end_of_file();
    drop(file);
    assert!(sink
        .warnings()
        .iter()
        .any(|w| w.contains("Expected end of file")));
}

#[test]
fn caller_fatal_aborts_with_context() {
    let (mut file, sink) = open(text_fixture("wagon ( )"));
    let mut block = file.read_sub_block();
    let error = block.error("mass must be positive");
    match error {
        SimisError::Fatal(message) => {
            assert!(message.contains("mass must be positive"));
            assert!(message.contains("test"));
        }
        other => panic!("expected Fatal, got {other:?}"),
    }
    block.skip();
    drop(block);
    file.skip();
    drop(file);
    assert!(sink
        .warnings()
        .iter()
        .any(|w| w.contains("fatal: mass must be positive")));
}

#[test]
fn open_reads_from_a_real_file() {
    let path = std::env::temp_dir().join("simis_rs_open_test.wag");
    std::fs::write(&path, text_fixture("wagon ( name ( \"Box Car\" ) )")).unwrap();

    let mut file = SimisFile::open(&path).unwrap();
    let mut wagon = file.read_sub_block();
    assert_eq!(wagon.id(), TokenId::Wagon);
    let mut name = wagon.read_sub_block();
    assert_eq!(name.id(), TokenId::Name);
    assert_eq!(name.read_string(), "Box Car");
    drop(name);
    drop(wagon);
    drop(file);

    std::fs::remove_file(&path).unwrap();
}
