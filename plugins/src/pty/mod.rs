mod portable;

pub use portable::{PortablePty, PtyCommand};
