//! Null adapter.
//!
//! Every operation is an immediate no-op returning the empty value for its
//! type. Mountpoints whose adapter kind has no factory are bound to this.

use async_trait::async_trait;

use super::Adapter;

/// Adapter that stores nothing and reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAdapter;

#[async_trait]
impl Adapter for NullAdapter {}
