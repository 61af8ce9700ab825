mod diagnostic;
mod eval;
mod flag;
mod flag_value;
mod registry;
mod store;
mod test_common;
mod util;

pub use diagnostic::*;
pub use eval::*;
pub use flag::*;
pub use flag_value::*;
pub use registry::*;
