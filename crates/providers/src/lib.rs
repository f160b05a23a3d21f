//! Text completion backends for Reagent.
//!
//! All backends implement `reagent_core::TextCompletion`.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatCompletion;
