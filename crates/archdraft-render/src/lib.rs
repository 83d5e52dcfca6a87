//! Archdraft Render - sanitizer, translators, renderer adapter, and the
//! neutral-SVG gate
//!
//! Everything between a committed IR and a neutral SVG. The translators are
//! deterministic compilers; the adapter shells out to the containerized
//! renderers; the neutral gate guarantees no theme styling leaks downstream.

pub mod adapter;
pub mod neutral;
pub mod router;
pub mod sanitize;
pub mod translate;

pub use adapter::{render_subprocess, RenderOutcome};
pub use neutral::{is_neutral, neutralize, NeutralOutcome};
pub use router::{fallback, route, RouteDecision};
pub use sanitize::{Sanitizer, SanitizeOutcome};
pub use translate::translate;
