//! Geometry and annotation engine for an image-annotation viewer.
//!
//! The crate owns everything between raw pointer events and persisted
//! annotation records: converting screen positions into viewport space,
//! snapping onto existing outlines, driving the per-shape drawing state
//! machine, storing finished annotations by category, and deriving the
//! inflation band around solution outlines. The host viewer feeds pointer
//! events to [`engine::EngineCore`], reacts to the returned
//! [`engine::Action`]s, and paints whatever [`render::project`] emits.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Engine façade and [`engine::Action`] |
//! | [`doc`] | Annotation model and the per-category document store |
//! | [`camera`] | Image, viewport, and screen coordinate conversions |
//! | [`geometry`] | Bounding boxes, distances, segment projection |
//! | [`snap`] | Nearest-outline snapping |
//! | [`draw`] | Drawing state machine |
//! | [`offset`] | Inner and outer ring derivation |
//! | [`data`] | Persisted record format, load and export |
//! | [`persist`] | Async store contract and a JSON file store |
//! | [`render`] | Geometry to draw-command projection |
//! | [`config`] | Tunables with environment overrides |
//! | [`consts`] | Default sizes, offsets, and colors |

pub mod camera;
pub mod config;
pub mod consts;
pub mod data;
pub mod doc;
pub mod draw;
pub mod engine;
pub mod geometry;
pub mod offset;
pub mod persist;
pub mod render;
pub mod snap;
