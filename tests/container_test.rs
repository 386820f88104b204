//! DOCX round trips through the container layer.

use proofmark::container::{
    pack_dir, process_entries, read_docx, unpack_docx, write_docx, PartSelector,
};
use proofmark::{CsvAuditLog, Engine, MemoryAudit, TextAuditLog};

fn part(body: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
    .into_bytes()
}

fn sample_entries() -> Vec<(String, Vec<u8>)> {
    vec![
        ("[Content_Types].xml".to_string(), b"<Types/>".to_vec()),
        (
            "word/document.xml".to_string(),
            part("<w:p><w:r><w:t>第１条（目的）</w:t></w:r></w:p>"),
        ),
        (
            "word/header1.xml".to_string(),
            part("<w:p><w:r><w:t>ヘッダＡ</w:t></w:r></w:p>"),
        ),
        (
            "word/footer1.xml".to_string(),
            part("<w:p><w:r><w:t>ページ２</w:t></w:r></w:p>"),
        ),
        ("word/media/image1.png".to_string(), vec![0x89, b'P', b'N', b'G', 0, 1, 2]),
    ]
}

fn text_of(entries: &[(String, Vec<u8>)], name: &str) -> String {
    let (_, data) = entries.iter().find(|(n, _)| n == name).unwrap();
    String::from_utf8(data.clone()).unwrap()
}

#[test]
fn test_proofreads_document_and_footers_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.docx");
    let output = dir.path().join("output.docx");
    write_docx(&input, &sample_entries()).unwrap();

    let mut entries = read_docx(&input).unwrap();
    let mut audit = MemoryAudit::default();
    let reports = process_entries(&Engine::default(), &mut entries, &PartSelector::default(), &mut audit)
        .unwrap();
    write_docx(&output, &entries).unwrap();

    let parts: Vec<&str> = reports.iter().map(|r| r.part.as_str()).collect();
    assert_eq!(parts, vec!["word/document.xml", "word/footer1.xml"]);

    let written = read_docx(&output).unwrap();
    let names: Vec<&str> = written.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "[Content_Types].xml",
            "word/document.xml",
            "word/header1.xml",
            "word/footer1.xml",
            "word/media/image1.png"
        ]
    );
    assert!(text_of(&written, "word/document.xml").contains(">1</w:t>"));
    assert!(text_of(&written, "word/footer1.xml").contains(">2</w:t>"));
    assert!(text_of(&written, "word/header1.xml").contains("ヘッダＡ"));
    assert_eq!(written[4].1, sample_entries()[4].1);

    let parts: Vec<&str> = audit.records.iter().map(|r| r.part.as_str()).collect();
    assert_eq!(parts, vec!["word/document.xml", "word/footer1.xml"]);
}

#[test]
fn test_selector_extends_to_headers() {
    let mut entries = sample_entries();
    let selector = PartSelector {
        headers: true,
        ..PartSelector::default()
    };
    let mut audit = MemoryAudit::default();
    process_entries(&Engine::default(), &mut entries, &selector, &mut audit).unwrap();
    assert!(text_of(&entries, "word/header1.xml").contains(">A</w:t>"));
    assert_eq!(audit.records.len(), 3);
}

#[test]
fn test_malformed_part_is_reported_and_left_alone() {
    let broken = b"<w:document><w:body><w:p><w:r>".to_vec();
    let mut entries = vec![
        ("word/document.xml".to_string(), broken.clone()),
        ("word/footer1.xml".to_string(), part("<w:p><w:r><w:t>Ｘ</w:t></w:r></w:p>")),
    ];
    let mut audit = MemoryAudit::default();
    let reports =
        process_entries(&Engine::default(), &mut entries, &PartSelector::default(), &mut audit).unwrap();

    assert_eq!(entries[0].1, broken);
    assert_eq!(reports[0].diagnostics.len(), 1);
    assert!(reports[0].diagnostics[0].message.starts_with("malformed XML"));
    assert_eq!(reports[1].spans, 1);
}

#[test]
fn test_unpack_then_pack_keeps_entries() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.docx");
    let unpacked = dir.path().join("xml");
    let repacked = dir.path().join("repacked.docx");
    write_docx(&input, &sample_entries()).unwrap();

    assert_eq!(unpack_docx(&input, &unpacked).unwrap(), 5);
    assert!(unpacked.join("word/media/image1.png").is_file());
    assert_eq!(pack_dir(&unpacked, &repacked).unwrap(), 5);

    let mut expected = sample_entries();
    let mut actual = read_docx(&repacked).unwrap();
    assert_eq!(actual[0].0, "[Content_Types].xml");
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
}

#[test]
fn test_audit_logs_are_written() {
    let mut entries = sample_entries();
    let mut text_log = TextAuditLog::create(Vec::new()).unwrap();
    process_entries(&Engine::default(), &mut entries, &PartSelector::default(), &mut text_log).unwrap();
    let text = String::from_utf8(text_log.into_inner()).unwrap();
    assert!(text.contains("Matched Rule: 全角数字を半角数字に変換"));
    assert!(text.contains("Replaced Text: 2"));

    let mut entries = sample_entries();
    let mut csv_log = CsvAuditLog::new(Vec::new());
    process_entries(&Engine::default(), &mut entries, &PartSelector::default(), &mut csv_log).unwrap();
    let csv = String::from_utf8(csv_log.into_inner().unwrap()).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("part,paragraph,rule"));
    assert_eq!(lines.count(), 2);
}
