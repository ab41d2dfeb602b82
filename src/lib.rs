//! Deterministic beat-based animation engine for geometric derivations.
//!
//! The crate animates the classical derivation of the epitrochoid: a circle
//! rolling without slipping around the outside of a fixed circle, with a pen
//! at offset `d` from the rolling center. A [`script::PresentationScript`]
//! drives a [`scene::Scene`] through a sequence of [`anim::Beat`]s on a
//! [`timeline::Scheduler`]; every frame is emitted through a
//! [`render::RenderBackend`], and the committed state after each beat is
//! independent of the sampling frame rate.

#![forbid(unsafe_code)]

pub mod anim;
pub mod anim_ease;
pub mod core;
pub mod error;
pub mod expr;
pub mod kinematics;
pub mod primitive;
pub mod render;
pub mod rewrite;
pub mod scene;
pub mod script;
pub mod timeline;

pub use anim::{AnimationDescriptor, Beat, MorphPlan, UpdateOp};
pub use anim_ease::Ease;
pub use self::core::{Canvas, Fps, FrameIndex, Point, Rgba8, Style, Vec2};
pub use error::{TrochiaError, TrochiaResult};
pub use expr::{GlyphGroup, MathExpr, MonospaceTypesetter, Typesetter};
pub use kinematics::{RollState, RollingContact};
pub use primitive::{Arc, Circle, Dot, Primitive, Segment};
pub use render::{DrawCall, NullBackend, RecordingBackend, RenderBackend};
pub use rewrite::{RelocationProxy, matching_rewrite, relocate_role, replace};
pub use scene::{Group, Node, Scene};
pub use script::{PresentationScript, Stage, script_by_name, script_names};
pub use timeline::{BeatReport, BeatState, Scheduler};
