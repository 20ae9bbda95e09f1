//! Scaled replay surface and coordinate projection.
//!
//! Surface layout: `screen` (positioned container) holding the embedding
//! `frame` and an input `overlay` on top of it. The frame is always sized to
//! the recorded dimensions; only the screen's `scale()` transform changes the
//! on-screen size, so viewport-relative units inside the replayed document
//! resolve against the recorded viewport.

use std::cell::Cell;

use crate::dom::{Dom, HitTest};
use crate::geometry::{Dimensions, Point, Rect};

/// How the recorded viewport is fitted into the parent element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    /// Fit both dimensions, centered.
    #[default]
    Embed,
    /// Fit the width, top-anchored; the parent grows to the scaled height.
    AdjustParentHeight,
}

pub struct ViewportProjector<D: Dom> {
    dom: D,
    scale_mode: ScaleMode,
    hit_test: HitTest,

    screen: D::Element,
    frame: D::Element,
    overlay: D::Element,
    parent: Option<D::Element>,

    scale_ratio: f64,
    dimensions: Option<Dimensions>,
    /// Overlay rect; refreshed on `scale`, dropped on `attach`.
    bounding_rect: Cell<Option<Rect>>,
}

fn px(v: f64) -> String {
    format!("{}px", (v * 1e3).round() / 1e3)
}

impl<D: Dom> ViewportProjector<D> {
    pub fn new(dom: D, scale_mode: ScaleMode) -> Self {
        let screen = dom.create_element("div");
        let frame = dom.create_element("iframe");
        let overlay = dom.create_element("div");

        dom.set_style(&screen, "position", "absolute");
        dom.set_style(&screen, "left", "50%");
        dom.set_style(&screen, "top", "50%");
        dom.set_style(&screen, "transform-origin", "left top");
        dom.set_style(&frame, "position", "absolute");
        dom.set_style(&frame, "border", "none");
        dom.set_style(&overlay, "position", "absolute");
        dom.set_style(&overlay, "inset", "0");

        dom.append_child(&screen, &frame);
        dom.append_child(&screen, &overlay);

        let hit_test = dom.hit_test_support();
        tracing::debug!(?hit_test, ?scale_mode, "viewport surface created");

        Self {
            dom,
            scale_mode,
            hit_test,
            screen,
            frame,
            overlay,
            parent: None,
            scale_ratio: 1.0,
            dimensions: None,
            bounding_rect: Cell::new(None),
        }
    }

    /// Mount the surface under `parent`. Re-attaching without `detach` moves
    /// the surface and logs a warning.
    pub fn attach(&mut self, parent: D::Element) {
        if self.parent.is_some() {
            tracing::warn!("reattaching the screen");
        }
        self.dom.append_child(&parent, &self.screen);
        self.parent = Some(parent);
        self.bounding_rect.set(None);
    }

    pub fn detach(&mut self) {
        if self.parent.take().is_some() {
            self.dom.remove(&self.screen);
            self.bounding_rect.set(None);
        }
    }

    /// Fit the recorded `dimensions` into the parent's current size.
    /// No-op while detached.
    pub fn scale(&mut self, dimensions: Dimensions) {
        let Some(parent) = self.parent.clone() else {
            tracing::debug!("scale ignored: surface not attached");
            return;
        };
        let Dimensions {
            width: parent_w,
            height: parent_h,
        } = self.dom.offset_size(&parent);
        let Dimensions { width, height } = dimensions;

        let (raw, translate) = match self.scale_mode {
            ScaleMode::Embed => (
                (parent_w / width).min(parent_h / height),
                "translate(-50%, -50%)",
            ),
            ScaleMode::AdjustParentHeight => (parent_w / width, "translate(-50%, 0)"),
        };
        let ratio = if raw > 1.0 {
            1.0
        } else {
            (raw * 1e3).round() / 1e3
        };
        if !raw.is_finite() || ratio <= 0.0 {
            tracing::warn!(parent_w, parent_h, width, height, "cannot scale into an empty box");
            return;
        }

        self.scale_ratio = ratio;
        self.dimensions = Some(dimensions);

        if self.scale_mode == ScaleMode::AdjustParentHeight {
            self.dom.set_style(&parent, "height", &px(ratio * height));
            self.dom.set_style(&self.screen, "top", "0");
            self.dom.set_style(&self.frame, "top", "0");
        }
        for el in [&self.screen, &self.frame] {
            self.dom.set_style(el, "width", &px(width));
            self.dom.set_style(el, "height", &px(height));
        }
        self.dom
            .set_style(&self.screen, "transform", &format!("scale({ratio}) {translate}"));

        self.bounding_rect
            .set(Some(self.dom.bounding_client_rect(&self.overlay)));
        tracing::debug!(ratio, width, height, "viewport scaled");
    }

    fn bounding_rect(&self) -> Rect {
        if let Some(rect) = self.bounding_rect.get() {
            return rect;
        }
        let rect = self.dom.bounding_client_rect(&self.overlay);
        self.bounding_rect.set(Some(rect));
        rect
    }

    /// Host-page point → pixel in the replayed viewport.
    pub fn to_internal_viewport_coordinates(&self, p: Point) -> Point {
        let local = p - self.bounding_rect().origin();
        Point::new(
            (local.x / self.scale_ratio).round(),
            (local.y / self.scale_ratio).round(),
        )
    }

    /// Scroll offsets of the replayed document (zero when there is none).
    pub fn current_scroll(&self) -> Point {
        self.document()
            .map(|doc| self.dom.scroll_offset(&doc))
            .unwrap_or_default()
    }

    /// Host-page point → replayed document coordinates (scroll included).
    pub fn to_internal_coordinates(&self, p: Point) -> Point {
        self.to_internal_viewport_coordinates(p) + self.current_scroll()
    }

    /// Stack of elements under a replayed-viewport point, descending into
    /// same-origin frames (outer elements first).
    pub fn elements_at_point(&self, p: Point) -> Vec<D::Element> {
        match self.document() {
            Some(doc) => self.elements_in(&doc, p),
            None => Vec::new(),
        }
    }

    fn elements_in(&self, doc: &D::Document, p: Point) -> Vec<D::Element> {
        let mut found = self.hits(doc, p);
        let own = found.len();
        for i in 0..own {
            let Some(el) = found.get(i).cloned() else {
                break;
            };
            if !self.dom.is_frame(&el) {
                continue;
            }
            if let Some(inner) = self.dom.content_document(&el) {
                let inner_p = p - self.dom.frame_content_offset(&el);
                found.extend(self.elements_in(&inner, inner_p));
            }
        }
        found
    }

    fn hits(&self, doc: &D::Document, p: Point) -> Vec<D::Element> {
        let res = match self.hit_test {
            HitTest::ElementsFromPoint => self.dom.elements_from_point(doc, p),
            HitTest::ElementFromPoint => self
                .dom
                .element_from_point(doc, p)
                .map(|el| el.into_iter().collect()),
            HitTest::Unsupported => Ok(Vec::new()),
        };
        res.unwrap_or_else(|e| {
            tracing::error!(x = p.x, y = p.y, error = %e, "hit-test failed");
            Vec::new()
        })
    }

    /// Topmost element at a replayed-viewport point (top-level document only).
    pub fn element_from_internal_point(&self, p: Point) -> Option<D::Element> {
        if self.hit_test == HitTest::Unsupported {
            return None;
        }
        let doc = self.document()?;
        self.dom.element_from_point(&doc, p).unwrap_or_else(|e| {
            tracing::error!(x = p.x, y = p.y, error = %e, "hit-test failed");
            None
        })
    }

    /// Topmost element under a host-page point.
    pub fn element_at_point(&self, p: Point) -> Option<D::Element> {
        self.element_from_internal_point(self.to_internal_viewport_coordinates(p))
    }

    /// First element matching `selector` in the replayed document.
    /// Recorded selectors may contain `/`, which is escaped before lookup.
    pub fn element_by_selector(&self, selector: &str) -> Option<D::Element> {
        if selector.is_empty() {
            return None;
        }
        let doc = self.document()?;
        let safe = selector.replace('/', "\\/");
        self.dom.query_selector(&doc, &safe).unwrap_or_else(|e| {
            tracing::error!(selector, error = %e, "can not select element");
            None
        })
    }

    /// Show or hide the whole surface.
    pub fn display(&self, visible: bool) {
        self.dom
            .set_style(&self.screen, "display", if visible { "" } else { "none" });
    }

    /// Show or hide the embedded frame only.
    pub fn display_frame(&self, visible: bool) {
        self.dom
            .set_style(&self.frame, "display", if visible { "" } else { "none" });
    }

    pub fn set_border_style(&self, border: &str) {
        self.dom.set_style(&self.screen, "border", border);
    }

    pub fn scale_ratio(&self) -> f64 {
        self.scale_ratio
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.scale_mode
    }

    /// Recorded dimensions of the last successful `scale`.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn parent(&self) -> Option<&D::Element> {
        self.parent.as_ref()
    }

    pub fn document(&self) -> Option<D::Document> {
        self.dom.content_document(&self.frame)
    }

    pub fn screen(&self) -> &D::Element {
        &self.screen
    }

    pub fn frame(&self) -> &D::Element {
        &self.frame
    }

    pub fn overlay(&self) -> &D::Element {
        &self.overlay
    }
}
