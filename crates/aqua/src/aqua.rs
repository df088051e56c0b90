//! 🌊 The AQUA console side: everything the notebook UI asks for that isn't a model.
//!
//! - [`ui`]: read-mostly lookups (compartments, buckets, shapes, networks, containers)
//! - [`cli`]: turning a JSON payload into the `ads aqua ...` command line that would do the work

pub mod cli;
pub mod ui;

pub use cli::{CliDetails, ImportModelDetails};
pub use ui::AquaUiApp;
