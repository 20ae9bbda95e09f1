//! In-memory DOM and log capture shared by player tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use tapedeck_core::error::{Result, TapedeckError};
use tapedeck_player::{Dimensions, Dom, HitTest, Point, Rect};

pub type El = usize;
pub type Doc = usize;

#[derive(Default)]
struct Node {
    tag: String,
    parent: Option<El>,
    children: Vec<El>,
    styles: HashMap<String, String>,
    offset: Dimensions,
    rect: Rect,
    content: Option<Doc>,
    content_offset: Point,
}

#[derive(Default)]
struct Document {
    scroll: Point,
    /// Painted boxes, bottom-most first.
    boxes: Vec<(Rect, El)>,
    selectors: HashMap<String, El>,
    broken: bool,
}

#[derive(Default)]
struct State {
    nodes: Vec<Node>,
    docs: Vec<Document>,
}

/// Single-threaded fake DOM; clones share state.
#[derive(Clone)]
pub struct FakeDom {
    state: Rc<RefCell<State>>,
    support: HitTest,
}

impl FakeDom {
    pub fn new(support: HitTest) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::default())),
            support,
        }
    }

    /// Host element with a layout size.
    pub fn container(&self, width: f64, height: f64) -> El {
        let el = self.create_element("div");
        self.set_offset_size(el, width, height);
        el
    }

    pub fn set_offset_size(&self, el: El, width: f64, height: f64) {
        self.state.borrow_mut().nodes[el].offset = Dimensions::new(width, height);
    }

    pub fn set_rect(&self, el: El, rect: Rect) {
        self.state.borrow_mut().nodes[el].rect = rect;
    }

    pub fn new_document(&self) -> Doc {
        let mut st = self.state.borrow_mut();
        st.docs.push(Document::default());
        st.docs.len() - 1
    }

    pub fn load_frame(&self, frame: El, doc: Doc, content_offset: Point) {
        let mut st = self.state.borrow_mut();
        st.nodes[frame].content = Some(doc);
        st.nodes[frame].content_offset = content_offset;
    }

    pub fn paint(&self, doc: Doc, rect: Rect, el: El) {
        self.state.borrow_mut().docs[doc].boxes.push((rect, el));
    }

    pub fn set_scroll(&self, doc: Doc, scroll: Point) {
        self.state.borrow_mut().docs[doc].scroll = scroll;
    }

    pub fn register_selector(&self, doc: Doc, selector: &str, el: El) {
        self.state.borrow_mut().docs[doc]
            .selectors
            .insert(selector.to_string(), el);
    }

    /// Make every lookup in `doc` fail.
    pub fn break_document(&self, doc: Doc) {
        self.state.borrow_mut().docs[doc].broken = true;
    }

    pub fn style(&self, el: El, property: &str) -> Option<String> {
        self.state.borrow().nodes[el].styles.get(property).cloned()
    }

    pub fn parent_of(&self, el: El) -> Option<El> {
        self.state.borrow().nodes[el].parent
    }

    pub fn children(&self, el: El) -> Vec<El> {
        self.state.borrow().nodes[el].children.clone()
    }

    fn hits(&self, doc: Doc, p: Point) -> Result<Vec<El>> {
        let st = self.state.borrow();
        let d = &st.docs[doc];
        if d.broken {
            return Err(TapedeckError::Layout("document is detached".into()));
        }
        Ok(d.boxes
            .iter()
            .rev()
            .filter(|(r, _)| r.contains(p))
            .map(|(_, el)| *el)
            .collect())
    }
}

impl Dom for FakeDom {
    type Element = El;
    type Document = Doc;

    fn create_element(&self, tag: &str) -> El {
        let mut st = self.state.borrow_mut();
        st.nodes.push(Node {
            tag: tag.to_ascii_uppercase(),
            ..Node::default()
        });
        st.nodes.len() - 1
    }

    fn append_child(&self, parent: &El, child: &El) {
        self.remove(child);
        let mut st = self.state.borrow_mut();
        st.nodes[*parent].children.push(*child);
        st.nodes[*child].parent = Some(*parent);
    }

    fn remove(&self, el: &El) {
        let mut st = self.state.borrow_mut();
        if let Some(old) = st.nodes[*el].parent.take() {
            st.nodes[old].children.retain(|c| c != el);
        }
    }

    fn set_style(&self, el: &El, property: &str, value: &str) {
        let mut st = self.state.borrow_mut();
        let styles = &mut st.nodes[*el].styles;
        if value.is_empty() {
            styles.remove(property);
        } else {
            styles.insert(property.to_string(), value.to_string());
        }
    }

    fn offset_size(&self, el: &El) -> Dimensions {
        self.state.borrow().nodes[*el].offset
    }

    fn bounding_client_rect(&self, el: &El) -> Rect {
        self.state.borrow().nodes[*el].rect
    }

    fn is_frame(&self, el: &El) -> bool {
        self.state.borrow().nodes[*el].tag == "IFRAME"
    }

    fn content_document(&self, frame: &El) -> Option<Doc> {
        self.state.borrow().nodes[*frame].content
    }

    fn frame_content_offset(&self, frame: &El) -> Point {
        self.state.borrow().nodes[*frame].content_offset
    }

    fn scroll_offset(&self, doc: &Doc) -> Point {
        self.state.borrow().docs[*doc].scroll
    }

    fn hit_test_support(&self) -> HitTest {
        self.support
    }

    fn elements_from_point(&self, doc: &Doc, p: Point) -> Result<Vec<El>> {
        self.hits(*doc, p)
    }

    fn element_from_point(&self, doc: &Doc, p: Point) -> Result<Option<El>> {
        Ok(self.hits(*doc, p)?.into_iter().next())
    }

    fn query_selector(&self, doc: &Doc, selector: &str) -> Result<Option<El>> {
        let st = self.state.borrow();
        let d = &st.docs[*doc];
        if d.broken || selector.starts_with('[') && !selector.ends_with(']') {
            return Err(TapedeckError::Layout(format!("'{selector}' is not a valid selector")));
        }
        Ok(d.selectors.get(selector).copied())
    }
}

/// Counts WARN events whose message contains `needle`.
pub struct WarnCounter {
    needle: &'static str,
    hits: Arc<AtomicUsize>,
}

impl WarnCounter {
    pub fn new(needle: &'static str) -> (Self, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (
            Self {
                needle,
                hits: Arc::clone(&hits),
            },
            hits,
        )
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut msg = MessageVisitor(String::new());
        event.record(&mut msg);
        if msg.0.contains(self.needle) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn count(hits: &AtomicUsize) -> usize {
    hits.load(Ordering::SeqCst)
}
