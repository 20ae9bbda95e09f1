//! The DOM operations the projector needs.

use std::fmt;

use tapedeck_core::error::Result;

use crate::geometry::{Dimensions, Point, Rect};

/// Point hit-testing support of the hosting engine, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTest {
    /// Full stack of elements under a point.
    ElementsFromPoint,
    /// Topmost element only.
    ElementFromPoint,
    /// No point lookup at all.
    Unsupported,
}

/// Handle-based DOM access.
///
/// Handles are cheap clones referring to live nodes. Implementations are
/// expected to be thread-affine (the UI thread owns the document).
pub trait Dom {
    type Element: Clone + PartialEq + fmt::Debug;
    type Document: Clone + fmt::Debug;

    fn create_element(&self, tag: &str) -> Self::Element;
    /// Append `child` to `parent`, detaching it from any previous parent.
    fn append_child(&self, parent: &Self::Element, child: &Self::Element);
    /// Detach `el` from its parent, if any.
    fn remove(&self, el: &Self::Element);
    /// Set an inline style property; an empty value clears it.
    fn set_style(&self, el: &Self::Element, property: &str, value: &str);

    /// Layout size (`offsetWidth`/`offsetHeight`), unaffected by transforms.
    fn offset_size(&self, el: &Self::Element) -> Dimensions;
    /// Visual rectangle in the host viewport, transforms applied.
    fn bounding_client_rect(&self, el: &Self::Element) -> Rect;

    fn is_frame(&self, el: &Self::Element) -> bool;
    /// Document of a frame element; `None` for non-frames and cross-origin frames.
    fn content_document(&self, frame: &Self::Element) -> Option<Self::Document>;
    /// Offset of the frame's content box within its owner document's viewport.
    fn frame_content_offset(&self, frame: &Self::Element) -> Point;
    /// Scroll offsets of the document's root element.
    fn scroll_offset(&self, doc: &Self::Document) -> Point;

    /// Probed once per projector.
    fn hit_test_support(&self) -> HitTest;
    /// Topmost-first stack of elements at a viewport point.
    fn elements_from_point(&self, doc: &Self::Document, p: Point) -> Result<Vec<Self::Element>>;
    fn element_from_point(&self, doc: &Self::Document, p: Point) -> Result<Option<Self::Element>>;
    fn query_selector(&self, doc: &Self::Document, selector: &str) -> Result<Option<Self::Element>>;
}
