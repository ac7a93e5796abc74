//! Structural operation executor.
//!
//! # Responsibility
//! - Validate every structural request before a transaction opens.
//! - Enforce document ownership for the acting owner.
//! - Delegate the atomic write to the node repository.
//!
//! # Invariants
//! - Validation, permission and existence failures leave storage untouched.
//! - Position 0 belongs to the TOC node whenever one exists.
//! - Content written by this service is never blank.

use crate::model::document::{Document, DocumentId, LOCAL_OWNER};
use crate::model::node::{Node, NodeId, NodeKind};
use crate::outline::Outline;
use crate::repo::node_repo::{NodeRepoError, NodeRepository};
use log::info;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Maximum paragraphs accepted by one `bulk_create_nodes` call.
pub const MAX_BULK_CREATE: usize = 100;

/// Errors surfaced to callers of structural operations.
#[derive(Debug)]
pub enum SequenceError {
    /// Request is malformed; nothing was written.
    Validation(String),
    /// Acting owner does not own the target document.
    PermissionDenied(DocumentId),
    DocumentNotFound(DocumentId),
    NodeNotFound(NodeId),
    /// Position invariant would have broken; indicates a defect.
    ConstraintViolation(String),
    /// Repository-level failure.
    Repo(NodeRepoError),
}

impl Display for SequenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::PermissionDenied(id) => write!(f, "permission denied for document {id}"),
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::ConstraintViolation(message) => {
                write!(f, "node ordering constraint violated: {message}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SequenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NodeRepoError> for SequenceError {
    fn from(value: NodeRepoError) -> Self {
        match value {
            NodeRepoError::DocumentNotFound(id) => Self::DocumentNotFound(id),
            NodeRepoError::NodeNotFound(id) => Self::NodeNotFound(id),
            NodeRepoError::Validation(message) => Self::Validation(message),
            NodeRepoError::ConstraintViolation(message) => Self::ConstraintViolation(message),
            other => Self::Repo(other),
        }
    }
}

/// Structural operation facade over a node repository.
pub struct SequenceService<R: NodeRepository> {
    repo: R,
    acting_owner: Option<String>,
}

impl<R: NodeRepository> SequenceService<R> {
    /// Creates an unrestricted executor.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            acting_owner: None,
        }
    }

    /// Creates an executor that only mutates documents owned by `owner`.
    pub fn for_owner(repo: R, owner: impl Into<String>) -> Self {
        Self {
            repo,
            acting_owner: Some(owner.into()),
        }
    }

    /// Creates an empty document owned by the acting owner.
    pub fn create_document(
        &self,
        title: &str,
        raw_content: &str,
    ) -> Result<Document, SequenceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SequenceError::Validation(
                "document title must not be blank".to_string(),
            ));
        }
        let owner = self.acting_owner.as_deref().unwrap_or(LOCAL_OWNER);
        self.repo
            .create_document(title, raw_content, owner)
            .map_err(Into::into)
    }

    /// Loads one document the acting owner may read.
    pub fn get_document(&self, document_uuid: DocumentId) -> Result<Document, SequenceError> {
        let document = self.load_document(document_uuid)?;
        if !document.is_public {
            self.authorize(&document)?;
        }
        Ok(document)
    }

    /// Lists nodes of one readable document by position.
    pub fn list_nodes(&self, document_uuid: DocumentId) -> Result<Vec<Node>, SequenceError> {
        self.get_document(document_uuid)?;
        self.repo.list_ordered(document_uuid).map_err(Into::into)
    }

    /// Loads one node of a readable document.
    pub fn get_node(&self, node_uuid: NodeId) -> Result<Node, SequenceError> {
        let node = self.load_node(node_uuid)?;
        self.get_document(node.document_uuid)?;
        Ok(node)
    }

    pub fn delete_document(&self, document_uuid: DocumentId) -> Result<(), SequenceError> {
        self.load_owned_document(document_uuid)?;
        self.repo.delete_document(document_uuid)?;
        info!("event=document_delete module=service status=ok document={document_uuid}");
        Ok(())
    }

    /// Copies a readable document, its nodes, and its outline.
    pub fn duplicate_document(
        &self,
        document_uuid: DocumentId,
    ) -> Result<Document, SequenceError> {
        self.get_document(document_uuid)?;
        self.repo
            .duplicate_document(document_uuid)
            .map_err(Into::into)
    }

    /// Inserts one node at `position`, shifting nodes at `>= position` up.
    pub fn insert_node(
        &self,
        document_uuid: DocumentId,
        position: i64,
        content: &str,
        kind: NodeKind,
    ) -> Result<Node, SequenceError> {
        let started = Instant::now();
        self.load_owned_document(document_uuid)?;
        ensure_not_blank(content)?;
        let nodes = self.repo.list_ordered(document_uuid)?;
        let count = nodes.len() as i64;
        if position < 0 || position > count {
            return Err(SequenceError::Validation(format!(
                "insert position {position} outside 0..={count}"
            )));
        }
        let toc_present = nodes.first().is_some_and(Node::is_toc);
        match kind {
            NodeKind::Toc if position != 0 => {
                return Err(SequenceError::Validation(
                    "a TOC node may only be inserted at position 0".to_string(),
                ));
            }
            NodeKind::Toc if toc_present => {
                return Err(SequenceError::Validation(
                    "document already has a TOC node".to_string(),
                ));
            }
            NodeKind::Content if position == 0 && toc_present => {
                return Err(SequenceError::Validation(
                    "position 0 is reserved for the TOC node".to_string(),
                ));
            }
            _ => {}
        }

        let node = self
            .repo
            .insert_node(document_uuid, position, content, kind)?;
        log_structural("insert", document_uuid, started);
        Ok(node)
    }

    /// Deletes one node and closes the gap.
    pub fn delete_node(&self, node_uuid: NodeId) -> Result<(), SequenceError> {
        let started = Instant::now();
        let node = self.load_owned_node(node_uuid)?;
        self.repo.delete_node(node_uuid)?;
        log_structural("delete", node.document_uuid, started);
        Ok(())
    }

    /// Splits one content node at a character offset.
    ///
    /// Whitespace is trimmed only at the cut. The original node keeps the
    /// first half and a new node holding the second half lands right behind it.
    pub fn split_node(
        &self,
        node_uuid: NodeId,
        offset: usize,
    ) -> Result<(Node, Node), SequenceError> {
        let started = Instant::now();
        let node = self.load_owned_node(node_uuid)?;
        if node.is_toc() {
            return Err(SequenceError::Validation(
                "the TOC node cannot be split".to_string(),
            ));
        }
        let length = node.content.chars().count();
        if offset == 0 || offset >= length {
            return Err(SequenceError::Validation(format!(
                "split offset {offset} must fall strictly inside 0..{length}"
            )));
        }
        let before: String = node.content.chars().take(offset).collect();
        let after: String = node.content.chars().skip(offset).collect();
        let (before, after) = (before.trim_end(), after.trim_start());
        if before.is_empty() || after.is_empty() {
            return Err(SequenceError::Validation(
                "split would leave an empty node".to_string(),
            ));
        }

        let halves = self.repo.split_node(node_uuid, before, after)?;
        log_structural("split", node.document_uuid, started);
        Ok(halves)
    }

    /// Appends the following node's content to this node and removes it.
    pub fn merge_with_next(
        &self,
        node_uuid: NodeId,
        separator: &str,
    ) -> Result<Node, SequenceError> {
        let started = Instant::now();
        let node = self.load_owned_node(node_uuid)?;
        if node.is_toc() {
            return Err(SequenceError::Validation(
                "the TOC node cannot be merged".to_string(),
            ));
        }
        let has_next = self
            .repo
            .list_ordered(node.document_uuid)?
            .iter()
            .any(|candidate| candidate.position == node.position + 1);
        if !has_next {
            return Err(SequenceError::Validation(format!(
                "node {node_uuid} is the last node of its document"
            )));
        }

        let merged = self.repo.merge_with_next(node_uuid, separator)?;
        log_structural("merge", node.document_uuid, started);
        Ok(merged)
    }

    /// Moves one node so that exactly `new_position` nodes precede it.
    pub fn move_node(&self, node_uuid: NodeId, new_position: i64) -> Result<(), SequenceError> {
        let started = Instant::now();
        let node = self.load_owned_node(node_uuid)?;
        let nodes = self.repo.list_ordered(node.document_uuid)?;
        let count = nodes.len() as i64;
        if new_position < 0 || new_position >= count {
            return Err(SequenceError::Validation(format!(
                "target position {new_position} outside 0..{count}"
            )));
        }
        if node.is_toc() && new_position != 0 {
            return Err(SequenceError::Validation(
                "the TOC node must stay at position 0".to_string(),
            ));
        }
        let toc_present = nodes.first().is_some_and(Node::is_toc);
        if !node.is_toc() && toc_present && new_position == 0 {
            return Err(SequenceError::Validation(
                "position 0 is reserved for the TOC node".to_string(),
            ));
        }
        if node.position == new_position {
            return Ok(());
        }

        self.repo.move_node(node_uuid, new_position)?;
        log_structural("move", node.document_uuid, started);
        Ok(())
    }

    /// Reassigns positions for a subset of nodes in one step.
    ///
    /// Nodes not named in `assignments` keep their current position; the
    /// combined result must be a permutation of `0..N`.
    pub fn bulk_set_positions(
        &self,
        document_uuid: DocumentId,
        assignments: &[(NodeId, i64)],
    ) -> Result<usize, SequenceError> {
        let started = Instant::now();
        self.load_owned_document(document_uuid)?;
        let nodes = self.repo.list_ordered(document_uuid)?;
        let count = nodes.len() as i64;

        let mut requested: HashMap<NodeId, i64> = HashMap::with_capacity(assignments.len());
        for &(node_uuid, position) in assignments {
            if !nodes.iter().any(|node| node.node_uuid == node_uuid) {
                return Err(match self.repo.get_node(node_uuid)? {
                    Some(_) => SequenceError::Validation(format!(
                        "node {node_uuid} belongs to another document"
                    )),
                    None => SequenceError::NodeNotFound(node_uuid),
                });
            }
            if position < 0 || position >= count {
                return Err(SequenceError::Validation(format!(
                    "position {position} outside 0..{count}"
                )));
            }
            if requested.insert(node_uuid, position).is_some() {
                return Err(SequenceError::Validation(format!(
                    "node {node_uuid} assigned more than once"
                )));
            }
        }

        let mut slots: Vec<Option<NodeId>> = vec![None; nodes.len()];
        for node in &nodes {
            let target = requested
                .get(&node.node_uuid)
                .copied()
                .unwrap_or(node.position);
            let slot = usize::try_from(target)
                .ok()
                .and_then(|index| slots.get_mut(index))
                .ok_or_else(|| {
                    SequenceError::Validation(format!("position {target} outside 0..{count}"))
                })?;
            if slot.replace(node.node_uuid).is_some() {
                return Err(SequenceError::Validation(format!(
                    "resulting ordering assigns position {target} twice"
                )));
            }
        }
        let ordered: Vec<NodeId> = slots.into_iter().flatten().collect();
        if ordered.len() != nodes.len() {
            return Err(SequenceError::Validation(
                "resulting ordering is not a permutation".to_string(),
            ));
        }
        if let Some(toc) = nodes.iter().find(|node| node.is_toc()) {
            if ordered.first() != Some(&toc.node_uuid) {
                return Err(SequenceError::Validation(
                    "the TOC node must stay at position 0".to_string(),
                ));
            }
        }

        self.repo.apply_order(document_uuid, &ordered)?;
        log_structural("bulk_set_positions", document_uuid, started);
        Ok(assignments.len())
    }

    /// Deletes nodes, possibly across documents, closing every gap.
    pub fn bulk_delete_nodes(&self, node_uuids: &[NodeId]) -> Result<usize, SequenceError> {
        let started = Instant::now();
        let mut seen = HashSet::with_capacity(node_uuids.len());
        let unique: Vec<NodeId> = node_uuids
            .iter()
            .copied()
            .filter(|node_uuid| seen.insert(*node_uuid))
            .collect();
        if unique.is_empty() {
            return Ok(0);
        }

        let mut documents = Vec::new();
        for node_uuid in &unique {
            let node = self.load_owned_node(*node_uuid)?;
            if !documents.contains(&node.document_uuid) {
                documents.push(node.document_uuid);
            }
        }

        let deleted = self.repo.delete_nodes(&unique)?;
        for document_uuid in documents {
            log_structural("bulk_delete", document_uuid, started);
        }
        Ok(deleted)
    }

    /// Replaces node content and recomputes its character count.
    pub fn update_node_content(
        &self,
        node_uuid: NodeId,
        content: &str,
    ) -> Result<Node, SequenceError> {
        self.load_owned_node(node_uuid)?;
        ensure_not_blank(content)?;
        self.repo
            .update_node_content(node_uuid, content)
            .map_err(Into::into)
    }

    /// Flips the illumination flag and returns its new value.
    pub fn toggle_illumination(&self, node_uuid: NodeId) -> Result<bool, SequenceError> {
        let node = self.load_owned_node(node_uuid)?;
        let next = !node.is_illuminated;
        self.repo.set_illuminated(node_uuid, next)?;
        Ok(next)
    }

    /// Appends trimmed, non-blank paragraphs after the last node.
    pub fn bulk_create_nodes(
        &self,
        document_uuid: DocumentId,
        paragraphs: &[String],
    ) -> Result<Vec<Node>, SequenceError> {
        let started = Instant::now();
        self.load_owned_document(document_uuid)?;
        if paragraphs.is_empty() {
            return Err(SequenceError::Validation(
                "no paragraphs provided".to_string(),
            ));
        }
        if paragraphs.len() > MAX_BULK_CREATE {
            return Err(SequenceError::Validation(format!(
                "at most {MAX_BULK_CREATE} paragraphs per call, got {}",
                paragraphs.len()
            )));
        }
        let contents: Vec<String> = paragraphs
            .iter()
            .map(|paragraph| paragraph.trim())
            .filter(|paragraph| !paragraph.is_empty())
            .map(str::to_string)
            .collect();
        if contents.is_empty() {
            return Err(SequenceError::Validation(
                "every paragraph is blank".to_string(),
            ));
        }

        let created = self.repo.append_nodes(document_uuid, &contents)?;
        log_structural("bulk_create", document_uuid, started);
        Ok(created)
    }

    /// Sets whether other owners may read the document.
    pub fn set_visibility(
        &self,
        document_uuid: DocumentId,
        is_public: bool,
    ) -> Result<(), SequenceError> {
        self.load_owned_document(document_uuid)?;
        self.repo.set_public(document_uuid, is_public)?;
        info!(
            "event=document_visibility module=service status=ok document={document_uuid} public={is_public}"
        );
        Ok(())
    }

    /// Flips document visibility and returns the new value.
    pub fn toggle_visibility(&self, document_uuid: DocumentId) -> Result<bool, SequenceError> {
        let document = self.load_owned_document(document_uuid)?;
        let next = !document.is_public;
        self.set_visibility(document_uuid, next)?;
        Ok(next)
    }

    pub fn find_toc(&self, document_uuid: DocumentId) -> Result<Option<Node>, SequenceError> {
        self.get_document(document_uuid)?;
        self.repo.find_toc(document_uuid).map_err(Into::into)
    }

    /// Loads a document the acting owner may mutate.
    pub(crate) fn load_owned_document(
        &self,
        document_uuid: DocumentId,
    ) -> Result<Document, SequenceError> {
        let document = self.load_document(document_uuid)?;
        self.authorize(&document)?;
        Ok(document)
    }

    pub(crate) fn install_toc(
        &self,
        document_uuid: DocumentId,
        rendered: &str,
        outline: &Outline,
    ) -> Result<Node, SequenceError> {
        let started = Instant::now();
        self.load_owned_document(document_uuid)?;
        let toc = self.repo.install_toc(document_uuid, rendered, outline)?;
        log_structural("install_toc", document_uuid, started);
        Ok(toc)
    }

    pub(crate) fn replace_nodes(
        &self,
        document_uuid: DocumentId,
        contents: &[String],
    ) -> Result<Vec<Node>, SequenceError> {
        let started = Instant::now();
        self.load_owned_document(document_uuid)?;
        let nodes = self.repo.replace_nodes(document_uuid, contents)?;
        log_structural("replace", document_uuid, started);
        Ok(nodes)
    }

    fn load_document(&self, document_uuid: DocumentId) -> Result<Document, SequenceError> {
        self.repo
            .get_document(document_uuid)?
            .ok_or(SequenceError::DocumentNotFound(document_uuid))
    }

    fn load_node(&self, node_uuid: NodeId) -> Result<Node, SequenceError> {
        self.repo
            .get_node(node_uuid)?
            .ok_or(SequenceError::NodeNotFound(node_uuid))
    }

    fn load_owned_node(&self, node_uuid: NodeId) -> Result<Node, SequenceError> {
        let node = self.load_node(node_uuid)?;
        self.load_owned_document(node.document_uuid)?;
        Ok(node)
    }

    fn authorize(&self, document: &Document) -> Result<(), SequenceError> {
        match self.acting_owner.as_deref() {
            Some(owner) if !document.is_owned_by(owner) => {
                Err(SequenceError::PermissionDenied(document.document_uuid))
            }
            _ => Ok(()),
        }
    }
}

fn ensure_not_blank(content: &str) -> Result<(), SequenceError> {
    if content.trim().is_empty() {
        return Err(SequenceError::Validation(
            "node content must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn log_structural(op: &str, document_uuid: DocumentId, started: Instant) {
    info!(
        "event=structural_op module=service status=ok op={op} document={document_uuid} duration_ms={}",
        started.elapsed().as_millis()
    );
}
