//! # riffle
//!
//! An EPUB ingestion and reflow-pagination engine: the core of a
//! document-reading platform, without the platform.
//!
//! riffle opens an EPUB container into an ordered chapter stream, normalizes
//! arbitrary source markup into a flat semantic block model, paginates each
//! chapter dynamically against the current viewport and typography, and
//! keeps character-offset highlight anchors stable across re-renders.
//! Persistence (preferences, reading positions, annotations) is delegated to
//! collaborator traits; no storage backend lives here.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::rc::Rc;
//! use riffle::{LoadOptions, MemoryStore, NullSink, ReaderSession, Viewport};
//!
//! let bytes = std::fs::read("book.epub")?;
//! let store = Rc::new(MemoryStore::new());
//!
//! let mut session = ReaderSession::open(
//!     "book-1",
//!     bytes,
//!     Viewport { width: 800.0, height: 900.0 },
//!     store.clone(),
//!     store,
//!     Box::new(NullSink),
//!     &LoadOptions::default(),
//! )?;
//!
//! session.next_page();
//! println!(
//!     "page {} / {}",
//!     session.virtual_page(),
//!     session.virtual_total()
//! );
//! # Ok::<(), riffle::Error>(())
//! ```

pub mod chapter;
pub mod document;
pub mod error;
pub mod events;
pub mod highlight;
pub mod image;
pub mod layout;
pub mod package;
pub mod session;
pub mod store;
pub mod toc;

mod dom;
pub(crate) mod util;

pub use document::{CancelToken, Document, LoadOptions, load_document};
pub use error::{Error, Result};
pub use events::{EventSink, NullSink};
pub use highlight::{Color, Highlight};
pub use layout::{CharMetrics, Direction, Measure, Transition, Viewport};
pub use session::ReaderSession;
pub use store::{
    AnnotationStore, MemoryStore, PreferenceStore, ReadingPosition, ViewerPreferences,
};
pub use toc::TocEntry;
