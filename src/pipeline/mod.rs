//! Pipeline stages for form filling.
//!
//! Each submodule implements exactly one step. The steps that touch the
//! outside world (pdfium, OCR, the model endpoint, fonts) sit behind a
//! trait with one production implementation, so the whole flow can be
//! driven with fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ detect ──▶ classify ──▶ label ──▶ answer ──▶ overlay ──▶ assemble
//! (path)   (pdfium)   (contours)  (ink %)     (OCR)     (LLM)      (glyphs)    (files)
//!                                                 ▲
//!                                              context
//! ```
//!
//! 1. [`input`]    — check the source path is a readable PDF
//! 2. [`render`]   — rasterise every page at a fixed scale; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`detect`]   — find box-shaped outlines that could be answer fields
//! 4. [`classify`] — keep only boxes with (almost) no ink inside
//! 5. [`label`]    — OCR the strip left of, or above, each empty box
//! 6. [`context`]  — load the background document once per run
//! 7. [`answer`]   — one model request per empty box; the only network I/O
//! 8. [`postprocess`] — deterministic cleanup of the model's reply
//! 9. [`overlay`]  — fit and draw the answer inside its box
//! 10. [`assemble`] — write annotated pages and the field report

pub mod answer;
pub mod assemble;
pub mod classify;
pub mod context;
pub mod detect;
pub mod input;
pub mod label;
pub mod overlay;
pub mod postprocess;
pub mod render;
