//! Frame selection.
//!
//! Keeps the frames picked for export, per source and in the order they
//! were picked. The selection is what an export job's frame list is made
//! from.

use crate::frames::index::FrameDescriptor;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reference to one frame of one loaded source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRef {
    pub source_name: String,
    pub frame_id: String,
}

impl FrameRef {
    pub fn new(source_name: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            frame_id: frame_id.into(),
        }
    }
}

impl From<&FrameDescriptor> for FrameRef {
    fn from(frame: &FrameDescriptor) -> Self {
        FrameRef::new(frame.source_name.clone(), frame.frame_id.clone())
    }
}

/// Ordered per-source selection of frame ids.
#[derive(Debug, Clone, Default)]
pub struct FrameSelection {
    selected: IndexMap<String, Vec<String>>,
}

impl FrameSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a frame. Returns `false` if it was already selected.
    pub fn select(&mut self, source_name: &str, frame_id: &str) -> bool {
        let ids = self.selected.entry(source_name.to_string()).or_default();
        if ids.iter().any(|id| id == frame_id) {
            return false;
        }
        ids.push(frame_id.to_string());
        true
    }

    /// Deselect a frame. Returns `false` if it was not selected.
    pub fn deselect(&mut self, source_name: &str, frame_id: &str) -> bool {
        match self.selected.get_mut(source_name) {
            Some(ids) => {
                let before = ids.len();
                ids.retain(|id| id != frame_id);
                ids.len() != before
            }
            None => false,
        }
    }

    /// Replace the selection of a source with all of `frames`.
    ///
    /// Returns the number of frames selected.
    pub fn select_all(&mut self, source_name: &str, frames: &[FrameDescriptor]) -> usize {
        let ids: Vec<String> = frames.iter().map(|frame| frame.frame_id.clone()).collect();
        let count = ids.len();
        self.selected.insert(source_name.to_string(), ids);
        count
    }

    /// Clear the selection of a source. Returns how many frames were selected.
    pub fn deselect_all(&mut self, source_name: &str) -> usize {
        self.selected
            .get_mut(source_name)
            .map(|ids| std::mem::take(ids).len())
            .unwrap_or(0)
    }

    /// Forget a source entirely, e.g. after it was removed from the registry.
    pub fn remove_source(&mut self, source_name: &str) {
        self.selected.shift_remove(source_name);
    }

    pub fn is_selected(&self, source_name: &str, frame_id: &str) -> bool {
        self.selected
            .get(source_name)
            .is_some_and(|ids| ids.iter().any(|id| id == frame_id))
    }

    /// Selected frames of one source, or of every source when `None`.
    pub fn selected(&self, source_name: Option<&str>) -> Vec<FrameRef> {
        self.selected
            .iter()
            .filter(|(name, _)| source_name.map_or(true, |wanted| wanted == name.as_str()))
            .flat_map(|(name, ids)| ids.iter().map(move |id| FrameRef::new(name.clone(), id.clone())))
            .collect()
    }

    /// Total number of selected frames.
    pub fn len(&self) -> usize {
        self.selected.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FrameKind, Laterality};

    fn descriptor(source: &str, id: &str) -> FrameDescriptor {
        FrameDescriptor {
            frame_id: id.to_string(),
            source_name: source.to_string(),
            kind: FrameKind::OctSlice,
            volume_index: None,
            slice_index: Some(0),
            image_index: None,
            laterality: Laterality::Unknown,
            volume_label: None,
            image_label: None,
        }
    }

    #[test]
    fn test_select_and_deselect() {
        let mut selection = FrameSelection::new();
        assert!(selection.select("a.img", "slice2"));
        assert!(selection.select("a.img", "slice0"));
        assert!(!selection.select("a.img", "slice2"));
        assert!(selection.is_selected("a.img", "slice0"));
        assert!(!selection.is_selected("b.img", "slice0"));

        assert!(selection.deselect("a.img", "slice2"));
        assert!(!selection.deselect("a.img", "slice2"));
        assert!(!selection.deselect("b.img", "slice0"));
        assert_eq!(selection.selected(None), vec![FrameRef::new("a.img", "slice0")]);
    }

    #[test]
    fn test_select_all_keeps_order_across_sources() {
        let mut selection = FrameSelection::new();
        let frames = vec![descriptor("b.e2e", "vol0_slice0"), descriptor("b.e2e", "fundus0")];
        selection.select("a.img", "slice1");
        assert_eq!(selection.select_all("b.e2e", &frames), 2);

        let all = selection.selected(None);
        assert_eq!(
            all,
            vec![
                FrameRef::new("a.img", "slice1"),
                FrameRef::new("b.e2e", "vol0_slice0"),
                FrameRef::new("b.e2e", "fundus0"),
            ]
        );
        assert_eq!(selection.selected(Some("b.e2e")).len(), 2);
        assert_eq!(selection.len(), 3);

        assert_eq!(selection.deselect_all("b.e2e"), 2);
        assert_eq!(selection.deselect_all("missing"), 0);
        selection.remove_source("a.img");
        assert!(selection.is_empty());
    }

    #[test]
    fn test_frame_ref_from_descriptor() {
        let frame = descriptor("a.img", "slice3");
        assert_eq!(FrameRef::from(&frame), FrameRef::new("a.img", "slice3"));
    }
}
