//! Codemod that moves Testing Library finder queries onto the shared `screen`
//! object: `getByText(...)` becomes `screen.getByText(...)`, query bindings
//! destructured from `render(...)` are dropped, and `screen` is imported from
//! `@testing-library/react` when anything changed.

pub mod calls;
pub mod config;
pub mod destructure;
pub mod gate;
pub mod imports;
pub mod registry;
pub mod runner;
pub mod scanner;
pub mod source_tree;
pub mod transform;

pub use source_tree::{SyntaxError, SyntaxService};
pub use transform::{transform, FileInfo, Migration, MigrationReport};
