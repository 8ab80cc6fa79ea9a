//! Process exit codes. Part of the public contract: CI scripts branch on them.

pub const SUCCESS: i32 = 0;
pub const ENGINES_FAILED: i32 = 1; // At least one engine failed a critical stage
pub const INTERNAL_ERROR: i32 = 2; // Config error, bad pattern, unwritable report
pub const NO_ENGINES: i32 = 3; // Discovery matched nothing
