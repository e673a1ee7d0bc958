//! Route handlers grouped by resource.

pub(crate) mod aas;
pub(crate) mod composer;
pub(crate) mod cycle;
pub(crate) mod events;
pub(crate) mod history;
pub(crate) mod queue;
pub(crate) mod service;
pub(crate) mod settings;
