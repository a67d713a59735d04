//! # Event Detail Inspector
//!
//! Every leaf of one selected result, in document order. Holds its own copy
//! of the result so it stays readable while the page underneath refetches.

use rq_core::{flatten_document, FieldEntry, SearchResult};

#[derive(Debug, Clone, PartialEq)]
pub struct InspectedEvent {
    pub result: SearchResult,
    pub entries: Vec<FieldEntry>,
}

#[derive(Debug, Default)]
pub struct EventDetailInspector {
    selected: Option<InspectedEvent>,
}

impl EventDetailInspector {
    pub fn open(&mut self, result: SearchResult) -> &InspectedEvent {
        let entries = flatten_document(&result.doc);
        self.selected.insert(InspectedEvent { result, entries })
    }

    pub fn close(&mut self) {
        self.selected = None;
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    pub fn selected(&self) -> Option<&InspectedEvent> {
        self.selected.as_ref()
    }

    pub fn entry(&self, index: usize) -> Option<&FieldEntry> {
        self.selected.as_ref()?.entries.get(index)
    }
}
