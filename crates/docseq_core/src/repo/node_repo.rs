//! Document/node store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist documents and their ordered nodes.
//! - Run every structural mutation in one `IMMEDIATE` transaction.
//! - Route every multi-row position change through `renumber`.
//!
//! # Invariants
//! - `UNIQUE(document_uuid, position)` is checked per row by SQLite, so no
//!   statement here ever writes a position another row still holds.
//! - Node listing is deterministic: `position ASC`.
//! - `character_count` is written together with `content`, always.
//! - A failed operation leaves no partial writes: the transaction is dropped
//!   and rolled back on the first error.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::document::{Document, DocumentId};
use crate::model::node::{character_count, Node, NodeId, NodeKind};
use crate::outline::Outline;
use crate::repo::renumber::{dense_plan, renumber};
use rusqlite::{params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NODE_SELECT_SQL: &str = "SELECT
    node_uuid,
    document_uuid,
    content,
    position,
    character_count,
    kind,
    is_illuminated,
    created_at
FROM nodes";

const DOCUMENT_SELECT_SQL: &str = "SELECT
    document_uuid,
    title,
    raw_content,
    owner,
    is_public,
    outline_json,
    created_at,
    updated_at
FROM documents";

/// Result type used by node store operations.
pub type NodeRepoResult<T> = Result<T, NodeRepoError>;

/// Errors from node store operations.
#[derive(Debug)]
pub enum NodeRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    DocumentNotFound(DocumentId),
    NodeNotFound(NodeId),
    /// Request rejected by a check inside the transaction.
    Validation(String),
    /// A position/kind constraint would have been broken.
    ConstraintViolation(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for NodeRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::Validation(message) => write!(f, "invalid node operation: {message}"),
            Self::ConstraintViolation(message) => {
                write!(f, "node ordering constraint violated: {message}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "node repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "node repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "node repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid node data: {message}"),
        }
    }
}

impl Error for NodeRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for NodeRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for NodeRepoError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(value.to_string())
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Repository interface for documents and their node sequences.
pub trait NodeRepository {
    /// Creates one document with no nodes.
    fn create_document(&self, title: &str, raw_content: &str, owner: &str)
        -> NodeRepoResult<Document>;
    fn get_document(&self, document_uuid: DocumentId) -> NodeRepoResult<Option<Document>>;
    /// Deletes one document and, by cascade, all of its nodes.
    fn delete_document(&self, document_uuid: DocumentId) -> NodeRepoResult<()>;
    /// Copies a document with its nodes and outline under a new id.
    fn duplicate_document(&self, document_uuid: DocumentId) -> NodeRepoResult<Document>;
    fn get_node(&self, node_uuid: NodeId) -> NodeRepoResult<Option<Node>>;
    /// Lists nodes of one document by ascending position.
    fn list_ordered(&self, document_uuid: DocumentId) -> NodeRepoResult<Vec<Node>>;
    /// Inserts one node at `position`, shifting later nodes up.
    fn insert_node(
        &self,
        document_uuid: DocumentId,
        position: i64,
        content: &str,
        kind: NodeKind,
    ) -> NodeRepoResult<Node>;
    /// Deletes one node, shifting later nodes down. Deleting the TOC node
    /// also drops the stored outline.
    fn delete_node(&self, node_uuid: NodeId) -> NodeRepoResult<()>;
    /// Rewrites `node_uuid` to `before` and inserts `after` right behind it.
    fn split_node(&self, node_uuid: NodeId, before: &str, after: &str)
        -> NodeRepoResult<(Node, Node)>;
    /// Absorbs the node at `position + 1` into `node_uuid`.
    fn merge_with_next(&self, node_uuid: NodeId, separator: &str) -> NodeRepoResult<Node>;
    /// Moves one node to `new_position`, keeping others in relative order.
    fn move_node(&self, node_uuid: NodeId, new_position: i64) -> NodeRepoResult<()>;
    /// Renumbers the whole document to follow `ordered`.
    fn apply_order(&self, document_uuid: DocumentId, ordered: &[NodeId]) -> NodeRepoResult<()>;
    /// Deletes nodes across documents and closes every gap.
    fn delete_nodes(&self, node_uuids: &[NodeId]) -> NodeRepoResult<usize>;
    /// Replaces content and recomputes `character_count`.
    fn update_node_content(&self, node_uuid: NodeId, content: &str) -> NodeRepoResult<Node>;
    fn set_illuminated(&self, node_uuid: NodeId, is_illuminated: bool) -> NodeRepoResult<()>;
    /// Sets whether other owners may read the document.
    fn set_public(&self, document_uuid: DocumentId, is_public: bool) -> NodeRepoResult<()>;
    /// Appends content nodes after the current last node.
    fn append_nodes(&self, document_uuid: DocumentId, contents: &[String])
        -> NodeRepoResult<Vec<Node>>;
    /// Drops every node of the document, stores `contents` at `0..`, and
    /// clears the stored outline.
    fn replace_nodes(&self, document_uuid: DocumentId, contents: &[String])
        -> NodeRepoResult<Vec<Node>>;
    /// Inserts a TOC node at position 0 and stores its outline.
    fn install_toc(
        &self,
        document_uuid: DocumentId,
        rendered: &str,
        outline: &Outline,
    ) -> NodeRepoResult<Node>;
    fn find_toc(&self, document_uuid: DocumentId) -> NodeRepoResult<Option<Node>>;
}

/// SQLite-backed node repository.
pub struct SqliteNodeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNodeRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> NodeRepoResult<Self> {
        ensure_node_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn begin(&self) -> NodeRepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl NodeRepository for SqliteNodeRepository<'_> {
    fn create_document(
        &self,
        title: &str,
        raw_content: &str,
        owner: &str,
    ) -> NodeRepoResult<Document> {
        let document_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO documents (document_uuid, title, raw_content, owner, is_public)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![document_uuid.to_string(), title, raw_content, owner],
        )?;
        require_document(self.conn, document_uuid)
    }

    fn get_document(&self, document_uuid: DocumentId) -> NodeRepoResult<Option<Document>> {
        load_document(self.conn, document_uuid)
    }

    fn delete_document(&self, document_uuid: DocumentId) -> NodeRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE document_uuid = ?1;",
            [document_uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(NodeRepoError::DocumentNotFound(document_uuid));
        }
        Ok(())
    }

    fn duplicate_document(&self, document_uuid: DocumentId) -> NodeRepoResult<Document> {
        let tx = self.begin()?;
        let original = require_document(&tx, document_uuid)?;
        let copy_uuid = Uuid::new_v4();
        tx.execute(
            "INSERT INTO documents (document_uuid, title, raw_content, owner, is_public, outline_json)
             VALUES (?1, ?2, ?3, ?4, 0, ?5);",
            params![
                copy_uuid.to_string(),
                format!("{} (copy)", original.title),
                original.raw_content,
                original.owner,
                outline_to_json(original.outline.as_ref())?,
            ],
        )?;
        for node in list_nodes(&tx, document_uuid)? {
            insert_row(
                &tx,
                copy_uuid,
                node.position,
                &node.content,
                node.kind,
                node.is_illuminated,
            )?;
        }
        let copy = require_document(&tx, copy_uuid)?;
        tx.commit()?;
        Ok(copy)
    }

    fn get_node(&self, node_uuid: NodeId) -> NodeRepoResult<Option<Node>> {
        load_node(self.conn, node_uuid)
    }

    fn list_ordered(&self, document_uuid: DocumentId) -> NodeRepoResult<Vec<Node>> {
        list_nodes(self.conn, document_uuid)
    }

    fn insert_node(
        &self,
        document_uuid: DocumentId,
        position: i64,
        content: &str,
        kind: NodeKind,
    ) -> NodeRepoResult<Node> {
        let tx = self.begin()?;
        require_document(&tx, document_uuid)?;
        let node = insert_at(&tx, document_uuid, position, content, kind)?;
        touch_document(&tx, document_uuid)?;
        tx.commit()?;
        Ok(node)
    }

    fn delete_node(&self, node_uuid: NodeId) -> NodeRepoResult<()> {
        let tx = self.begin()?;
        let node = require_node(&tx, node_uuid)?;
        delete_row(&tx, node_uuid)?;
        if node.is_toc() {
            clear_outline(&tx, node.document_uuid)?;
        }
        close_gaps(&tx, node.document_uuid)?;
        touch_document(&tx, node.document_uuid)?;
        tx.commit()?;
        Ok(())
    }

    fn split_node(
        &self,
        node_uuid: NodeId,
        before: &str,
        after: &str,
    ) -> NodeRepoResult<(Node, Node)> {
        let tx = self.begin()?;
        let node = require_node(&tx, node_uuid)?;
        write_content(&tx, node_uuid, before)?;
        let inserted = insert_at(
            &tx,
            node.document_uuid,
            node.position + 1,
            after,
            NodeKind::Content,
        )?;
        let head = require_node(&tx, node_uuid)?;
        touch_document(&tx, node.document_uuid)?;
        tx.commit()?;
        Ok((head, inserted))
    }

    fn merge_with_next(&self, node_uuid: NodeId, separator: &str) -> NodeRepoResult<Node> {
        let tx = self.begin()?;
        let node = require_node(&tx, node_uuid)?;
        let next = node_at(&tx, node.document_uuid, node.position + 1)?.ok_or_else(|| {
            NodeRepoError::Validation(format!("node {node_uuid} has no following node"))
        })?;

        delete_row(&tx, next.node_uuid)?;
        let merged = format!("{}{}{}", node.content, separator, next.content);
        write_content(&tx, node_uuid, &merged)?;
        close_gaps(&tx, node.document_uuid)?;
        let merged_node = require_node(&tx, node_uuid)?;
        touch_document(&tx, node.document_uuid)?;
        tx.commit()?;
        Ok(merged_node)
    }

    fn move_node(&self, node_uuid: NodeId, new_position: i64) -> NodeRepoResult<()> {
        let tx = self.begin()?;
        let node = require_node(&tx, node_uuid)?;
        let mut ordered: Vec<NodeId> = list_nodes(&tx, node.document_uuid)?
            .into_iter()
            .map(|current| current.node_uuid)
            .collect();
        if new_position < 0 || new_position >= ordered.len() as i64 {
            return Err(NodeRepoError::Validation(format!(
                "target position {new_position} outside 0..{}",
                ordered.len()
            )));
        }

        ordered.retain(|id| *id != node_uuid);
        ordered.insert(new_position as usize, node_uuid);
        renumber(&tx, node.document_uuid, &dense_plan(&ordered, 0))?;
        touch_document(&tx, node.document_uuid)?;
        tx.commit()?;
        Ok(())
    }

    fn apply_order(&self, document_uuid: DocumentId, ordered: &[NodeId]) -> NodeRepoResult<()> {
        let tx = self.begin()?;
        require_document(&tx, document_uuid)?;
        let current = list_nodes(&tx, document_uuid)?;
        let same_members = current.len() == ordered.len()
            && current.iter().all(|node| ordered.contains(&node.node_uuid));
        if !same_members {
            return Err(NodeRepoError::Validation(
                "ordering must name every node of the document exactly once".to_string(),
            ));
        }

        renumber(&tx, document_uuid, &dense_plan(ordered, 0))?;
        touch_document(&tx, document_uuid)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_nodes(&self, node_uuids: &[NodeId]) -> NodeRepoResult<usize> {
        let tx = self.begin()?;
        let mut touched: Vec<DocumentId> = Vec::new();
        let mut deleted = 0;
        for node_uuid in node_uuids {
            let node = require_node(&tx, *node_uuid)?;
            delete_row(&tx, *node_uuid)?;
            if node.is_toc() {
                clear_outline(&tx, node.document_uuid)?;
            }
            deleted += 1;
            if !touched.contains(&node.document_uuid) {
                touched.push(node.document_uuid);
            }
        }
        for document_uuid in touched {
            close_gaps(&tx, document_uuid)?;
            touch_document(&tx, document_uuid)?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn update_node_content(&self, node_uuid: NodeId, content: &str) -> NodeRepoResult<Node> {
        write_content(self.conn, node_uuid, content)?;
        require_node(self.conn, node_uuid)
    }

    fn set_illuminated(&self, node_uuid: NodeId, is_illuminated: bool) -> NodeRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE nodes SET is_illuminated = ?2 WHERE node_uuid = ?1;",
            params![node_uuid.to_string(), bool_to_int(is_illuminated)],
        )?;
        if changed == 0 {
            return Err(NodeRepoError::NodeNotFound(node_uuid));
        }
        Ok(())
    }

    fn set_public(&self, document_uuid: DocumentId, is_public: bool) -> NodeRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET is_public = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE document_uuid = ?1;",
            params![document_uuid.to_string(), bool_to_int(is_public)],
        )?;
        if changed == 0 {
            return Err(NodeRepoError::DocumentNotFound(document_uuid));
        }
        Ok(())
    }

    fn append_nodes(
        &self,
        document_uuid: DocumentId,
        contents: &[String],
    ) -> NodeRepoResult<Vec<Node>> {
        let tx = self.begin()?;
        require_document(&tx, document_uuid)?;
        let start = list_nodes(&tx, document_uuid)?.len() as i64;
        let mut created = Vec::with_capacity(contents.len());
        for (offset, content) in contents.iter().enumerate() {
            let node_uuid = insert_row(
                &tx,
                document_uuid,
                start + offset as i64,
                content,
                NodeKind::Content,
                false,
            )?;
            created.push(require_node(&tx, node_uuid)?);
        }
        touch_document(&tx, document_uuid)?;
        tx.commit()?;
        Ok(created)
    }

    fn replace_nodes(
        &self,
        document_uuid: DocumentId,
        contents: &[String],
    ) -> NodeRepoResult<Vec<Node>> {
        let tx = self.begin()?;
        require_document(&tx, document_uuid)?;
        tx.execute(
            "DELETE FROM nodes WHERE document_uuid = ?1;",
            [document_uuid.to_string()],
        )?;
        for (position, content) in contents.iter().enumerate() {
            insert_row(
                &tx,
                document_uuid,
                position as i64,
                content,
                NodeKind::Content,
                false,
            )?;
        }
        clear_outline(&tx, document_uuid)?;
        touch_document(&tx, document_uuid)?;
        let nodes = list_nodes(&tx, document_uuid)?;
        tx.commit()?;
        Ok(nodes)
    }

    fn install_toc(
        &self,
        document_uuid: DocumentId,
        rendered: &str,
        outline: &Outline,
    ) -> NodeRepoResult<Node> {
        let tx = self.begin()?;
        require_document(&tx, document_uuid)?;
        let toc = insert_at(&tx, document_uuid, 0, rendered, NodeKind::Toc)?;
        tx.execute(
            "UPDATE documents
             SET outline_json = ?2
             WHERE document_uuid = ?1;",
            params![document_uuid.to_string(), outline_to_json(Some(outline))?],
        )?;
        touch_document(&tx, document_uuid)?;
        tx.commit()?;
        Ok(toc)
    }

    fn find_toc(&self, document_uuid: DocumentId) -> NodeRepoResult<Option<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE document_uuid = ?1
               AND kind = 'toc';"
        ))?;
        let mut rows = stmt.query([document_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }
}

/// Inserts one node at `position` after making room behind it.
fn insert_at(
    conn: &Connection,
    document_uuid: DocumentId,
    position: i64,
    content: &str,
    kind: NodeKind,
) -> NodeRepoResult<Node> {
    let existing = list_nodes(conn, document_uuid)?;
    let count = existing.len() as i64;
    if position < 0 || position > count {
        return Err(NodeRepoError::Validation(format!(
            "insert position {position} outside 0..={count}"
        )));
    }
    let toc_present = existing.first().is_some_and(Node::is_toc);
    match kind {
        NodeKind::Toc if position != 0 || toc_present => {
            return Err(NodeRepoError::Validation(
                "a document holds at most one TOC node, at position 0".to_string(),
            ));
        }
        NodeKind::Content if position == 0 && toc_present => {
            return Err(NodeRepoError::Validation(
                "position 0 is reserved for the TOC node".to_string(),
            ));
        }
        _ => {}
    }

    let plan: Vec<(NodeId, i64)> = existing
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let index = index as i64;
            let target = if index < position { index } else { index + 1 };
            (node.node_uuid, target)
        })
        .collect();
    renumber(conn, document_uuid, &plan)?;

    let node_uuid = insert_row(conn, document_uuid, position, content, kind, false)?;
    require_node(conn, node_uuid)
}

/// Packs the remaining nodes of a document into `0..n`.
fn close_gaps(conn: &Connection, document_uuid: DocumentId) -> NodeRepoResult<()> {
    let ordered: Vec<NodeId> = list_nodes(conn, document_uuid)?
        .into_iter()
        .map(|node| node.node_uuid)
        .collect();
    renumber(conn, document_uuid, &dense_plan(&ordered, 0))?;
    Ok(())
}

fn insert_row(
    conn: &Connection,
    document_uuid: DocumentId,
    position: i64,
    content: &str,
    kind: NodeKind,
    is_illuminated: bool,
) -> NodeRepoResult<NodeId> {
    let node_uuid = Uuid::new_v4();
    conn.execute(
        "INSERT INTO nodes (
            node_uuid,
            document_uuid,
            content,
            position,
            character_count,
            kind,
            is_illuminated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            node_uuid.to_string(),
            document_uuid.to_string(),
            content,
            position,
            character_count(content),
            kind.as_db(),
            bool_to_int(is_illuminated),
        ],
    )?;
    Ok(node_uuid)
}

fn write_content(conn: &Connection, node_uuid: NodeId, content: &str) -> NodeRepoResult<()> {
    let changed = conn.execute(
        "UPDATE nodes
         SET content = ?2,
             character_count = ?3
         WHERE node_uuid = ?1;",
        params![node_uuid.to_string(), content, character_count(content)],
    )?;
    if changed == 0 {
        return Err(NodeRepoError::NodeNotFound(node_uuid));
    }
    Ok(())
}

fn delete_row(conn: &Connection, node_uuid: NodeId) -> NodeRepoResult<()> {
    let changed = conn.execute(
        "DELETE FROM nodes WHERE node_uuid = ?1;",
        [node_uuid.to_string()],
    )?;
    if changed == 0 {
        return Err(NodeRepoError::NodeNotFound(node_uuid));
    }
    Ok(())
}

fn clear_outline(conn: &Connection, document_uuid: DocumentId) -> NodeRepoResult<()> {
    conn.execute(
        "UPDATE documents SET outline_json = NULL WHERE document_uuid = ?1;",
        [document_uuid.to_string()],
    )?;
    Ok(())
}

fn touch_document(conn: &Connection, document_uuid: DocumentId) -> NodeRepoResult<()> {
    conn.execute(
        "UPDATE documents
         SET updated_at = (strftime('%s', 'now') * 1000)
         WHERE document_uuid = ?1;",
        [document_uuid.to_string()],
    )?;
    Ok(())
}

fn load_node(conn: &Connection, node_uuid: NodeId) -> NodeRepoResult<Option<Node>> {
    let mut stmt = conn.prepare(&format!("{NODE_SELECT_SQL} WHERE node_uuid = ?1;"))?;
    let mut rows = stmt.query([node_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_node_row(row)?));
    }
    Ok(None)
}

fn require_node(conn: &Connection, node_uuid: NodeId) -> NodeRepoResult<Node> {
    load_node(conn, node_uuid)?.ok_or(NodeRepoError::NodeNotFound(node_uuid))
}

fn node_at(
    conn: &Connection,
    document_uuid: DocumentId,
    position: i64,
) -> NodeRepoResult<Option<Node>> {
    let mut stmt = conn.prepare(&format!(
        "{NODE_SELECT_SQL}
         WHERE document_uuid = ?1
           AND position = ?2;"
    ))?;
    let mut rows = stmt.query(params![document_uuid.to_string(), position])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_node_row(row)?));
    }
    Ok(None)
}

fn list_nodes(conn: &Connection, document_uuid: DocumentId) -> NodeRepoResult<Vec<Node>> {
    let mut stmt = conn.prepare(&format!(
        "{NODE_SELECT_SQL}
         WHERE document_uuid = ?1
         ORDER BY position ASC;"
    ))?;
    let mut rows = stmt.query([document_uuid.to_string()])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        nodes.push(parse_node_row(row)?);
    }
    Ok(nodes)
}

fn load_document(conn: &Connection, document_uuid: DocumentId) -> NodeRepoResult<Option<Document>> {
    let mut stmt = conn.prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE document_uuid = ?1;"))?;
    let mut rows = stmt.query([document_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_document_row(row)?));
    }
    Ok(None)
}

fn require_document(conn: &Connection, document_uuid: DocumentId) -> NodeRepoResult<Document> {
    load_document(conn, document_uuid)?.ok_or(NodeRepoError::DocumentNotFound(document_uuid))
}

fn parse_node_row(row: &Row<'_>) -> NodeRepoResult<Node> {
    let node_uuid_text: String = row.get("node_uuid")?;
    let document_uuid_text: String = row.get("document_uuid")?;
    let kind_text: String = row.get("kind")?;
    let kind = NodeKind::from_db(&kind_text).ok_or_else(|| {
        NodeRepoError::InvalidData(format!("invalid node kind `{kind_text}` in nodes.kind"))
    })?;

    Ok(Node {
        node_uuid: parse_uuid(&node_uuid_text, "nodes.node_uuid")?,
        document_uuid: parse_uuid(&document_uuid_text, "nodes.document_uuid")?,
        content: row.get("content")?,
        position: row.get("position")?,
        character_count: row.get("character_count")?,
        kind,
        is_illuminated: parse_flag(row.get("is_illuminated")?, "nodes.is_illuminated")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_document_row(row: &Row<'_>) -> NodeRepoResult<Document> {
    let document_uuid_text: String = row.get("document_uuid")?;
    let outline = row
        .get::<_, Option<String>>("outline_json")?
        .map(|json| {
            serde_json::from_str::<Outline>(&json).map_err(|err| {
                NodeRepoError::InvalidData(format!("invalid outline in documents.outline_json: {err}"))
            })
        })
        .transpose()?;

    Ok(Document {
        document_uuid: parse_uuid(&document_uuid_text, "documents.document_uuid")?,
        title: row.get("title")?,
        raw_content: row.get("raw_content")?,
        owner: row.get("owner")?,
        is_public: parse_flag(row.get("is_public")?, "documents.is_public")?,
        outline,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn outline_to_json(outline: Option<&Outline>) -> NodeRepoResult<Option<String>> {
    outline
        .map(|value| {
            serde_json::to_string(value)
                .map_err(|err| NodeRepoError::InvalidData(format!("outline not serializable: {err}")))
        })
        .transpose()
}

fn parse_flag(value: i64, column: &'static str) -> NodeRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(NodeRepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> NodeRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| NodeRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_node_connection_ready(conn: &Connection) -> NodeRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(NodeRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        (
            "documents",
            &[
                "document_uuid",
                "title",
                "raw_content",
                "owner",
                "is_public",
                "outline_json",
                "created_at",
                "updated_at",
            ],
        ),
        (
            "nodes",
            &[
                "node_uuid",
                "document_uuid",
                "content",
                "position",
                "character_count",
                "kind",
                "is_illuminated",
                "created_at",
            ],
        ),
    ];

    for (table, columns) in required {
        let present = table_columns(conn, table)?;
        if present.is_empty() {
            return Err(NodeRepoError::MissingRequiredTable(table));
        }
        if let Some(column) = columns
            .iter()
            .copied()
            .find(|column| !present.iter().any(|name| name == column))
        {
            return Err(NodeRepoError::MissingRequiredColumn { table, column });
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> NodeRepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
