//! Identity registry of declared types
//!
//! Every struct, union, enum and typedef is stored once, keyed by the
//! identity of its underlying declaration. An entry is reserved with a
//! pending body before its members are resolved, so a recursive reference
//! finds the entry instead of descending again.

use capi_core::{DeclId, DeclaredKind, TypeBody, TypeDecl};
use std::collections::HashMap;

/// Header of a type declaration about to be resolved
#[derive(Debug, Clone)]
pub struct Reservation {
    pub kind: DeclaredKind,
    pub name: String,
    pub spelling: String,
    pub anonymous: bool,
    pub size: Option<u64>,
    pub source: Option<String>,
}

/// Type declarations in discovery order
#[derive(Debug, Default)]
pub struct TypeRegistry {
    index: HashMap<String, DeclId>,
    decls: Vec<TypeDecl>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &str) -> Option<DeclId> {
        self.index.get(key).copied()
    }

    /// Register `key` with a pending body. An existing entry is returned
    /// unchanged.
    pub fn reserve(&mut self, key: impl Into<String>, header: Reservation) -> DeclId {
        let key = key.into();
        if let Some(id) = self.lookup(&key) {
            return id;
        }

        let id = DeclId(self.decls.len() as u32);
        self.decls.push(TypeDecl {
            id,
            kind: header.kind,
            name: header.name,
            spelling: header.spelling,
            anonymous: header.anonymous,
            size: header.size,
            source: header.source,
            body: TypeBody::Pending,
        });
        self.index.insert(key, id);
        id
    }

    /// Fill in the body of a reserved entry
    pub fn complete(&mut self, id: DeclId, body: TypeBody) {
        if let Some(decl) = self.decls.get_mut(id.0 as usize) {
            decl.body = body;
        }
    }

    pub fn get(&self, id: DeclId) -> Option<&TypeDecl> {
        self.decls.get(id.0 as usize)
    }

    pub fn is_pending(&self, id: DeclId) -> bool {
        matches!(self.get(id).map(|d| &d.body), Some(TypeBody::Pending))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDecl> {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
