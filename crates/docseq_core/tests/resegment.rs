use docseq_core::{
    open_db_in_memory, ExternalServiceError, HeadingDetector, NodeKind, Segment,
    SegmentService, SegmentationService, SequenceError, SequenceService, SqliteNodeRepository,
    TocService, UnavailableService,
};
use rusqlite::Connection;

struct ScriptedSegments(&'static str);

impl SegmentationService for ScriptedSegments {
    fn segment(&self, _text: &str) -> Result<Vec<Segment>, ExternalServiceError> {
        Segment::list_from_json(self.0)
    }
}

struct NoHeadingLines;

impl HeadingDetector for NoHeadingLines {
    fn section_title(&self, _content: &str) -> Option<String> {
        None
    }

    fn is_heading_line(&self, _line: &str) -> bool {
        false
    }
}

const RAW: &str = "Opening words here.\n\nMiddle part of the text.\n\nClosing remarks end it.";

fn sequence(conn: &Connection) -> SequenceService<SqliteNodeRepository<'_>> {
    SequenceService::new(SqliteNodeRepository::try_new(conn).unwrap())
}

fn contents(conn: &Connection, document_uuid: uuid::Uuid) -> Vec<String> {
    sequence(conn)
        .list_nodes(document_uuid)
        .unwrap()
        .into_iter()
        .map(|node| node.content)
        .collect()
}

#[test]
fn segments_from_collaborator_replace_existing_nodes() {
    let conn = open_db_in_memory().unwrap();
    let document = sequence(&conn).create_document("Doc", RAW).unwrap();
    sequence(&conn)
        .bulk_create_nodes(document.document_uuid, &["old".to_string()])
        .unwrap();
    let segmenter = ScriptedSegments(
        r#"{"segments":[{"start_offset":21,"end_offset":45},{"start_offset":0,"end_offset":19}]}"#,
    );

    let result = SegmentService::new(sequence(&conn), segmenter)
        .resegment(document.document_uuid)
        .unwrap();

    assert!(!result.used_fallback);
    assert_eq!(result.nodes_created, 2);
    assert_eq!(
        contents(&conn, document.document_uuid),
        vec!["Opening words here.", "Middle part of the text."]
    );
}

#[test]
fn unavailable_collaborator_uses_paragraph_partitioner() {
    let conn = open_db_in_memory().unwrap();
    let document = sequence(&conn).create_document("Doc", RAW).unwrap();

    let result = SegmentService::new(sequence(&conn), UnavailableService)
        .resegment(document.document_uuid)
        .unwrap();

    assert!(result.used_fallback);
    assert_eq!(result.nodes_created, 3);
    let nodes = sequence(&conn).list_nodes(document.document_uuid).unwrap();
    let positions: Vec<i64> = nodes.iter().map(|node| node.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(nodes[2].content, "Closing remarks end it.");
}

#[test]
fn invalid_segments_trigger_fallback() {
    let conn = open_db_in_memory().unwrap();
    let document = sequence(&conn).create_document("Doc", RAW).unwrap();
    let overlapping = ScriptedSegments(
        r#"{"segments":[{"start_offset":0,"end_offset":30},{"start_offset":20,"end_offset":40}]}"#,
    );

    let result = SegmentService::new(sequence(&conn), overlapping)
        .resegment(document.document_uuid)
        .unwrap();

    assert!(result.used_fallback);
    assert_eq!(result.nodes_created, 3);
}

#[test]
fn resegment_drops_toc_and_outline() {
    let conn = open_db_in_memory().unwrap();
    let document = sequence(&conn).create_document("Doc", RAW).unwrap();
    let segmenter = SegmentService::new(sequence(&conn), UnavailableService);
    segmenter.resegment(document.document_uuid).unwrap();
    TocService::new(sequence(&conn), UnavailableService)
        .generate_table_of_contents(document.document_uuid, false)
        .unwrap();

    segmenter.resegment(document.document_uuid).unwrap();

    let nodes = sequence(&conn).list_nodes(document.document_uuid).unwrap();
    assert!(nodes.iter().all(|node| node.kind == NodeKind::Content));
    assert_eq!(nodes.len(), 3);
    let reloaded = sequence(&conn).get_document(document.document_uuid).unwrap();
    assert!(reloaded.outline.is_none());
}

#[test]
fn partitioner_follows_the_configured_heading_detector() {
    const LINES: &str = "Ownership is the set of rules that govern how a Rust program manages memory.\n\
                         Part Two\n\
                         Every value has an owner, and there can only be one owner at a time.";
    let conn = open_db_in_memory().unwrap();
    let document = sequence(&conn).create_document("Doc", LINES).unwrap();

    let default = SegmentService::new(sequence(&conn), UnavailableService)
        .resegment(document.document_uuid)
        .unwrap();
    assert_eq!(default.nodes_created, 2);
    assert!(contents(&conn, document.document_uuid)[1].starts_with("Part Two\n\n"));

    let custom = SegmentService::new(sequence(&conn), UnavailableService)
        .with_detector(Box::new(NoHeadingLines))
        .resegment(document.document_uuid)
        .unwrap();
    assert!(custom.used_fallback);
    assert_eq!(custom.nodes_created, 1);
    assert_eq!(
        contents(&conn, document.document_uuid),
        vec![
            "Ownership is the set of rules that govern how a Rust program manages memory. \
             Part Two Every value has an owner, and there can only be one owner at a time."
        ]
    );
}

#[test]
fn blank_raw_content_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let document = sequence(&conn).create_document("Doc", "  \n ").unwrap();

    let err = SegmentService::new(sequence(&conn), UnavailableService)
        .resegment(document.document_uuid)
        .unwrap_err();
    assert!(matches!(err, SequenceError::Validation(_)));
}
