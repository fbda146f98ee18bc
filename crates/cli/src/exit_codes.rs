//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | Success                                            |
//! | 1    | General error (write failure, serialization)       |
//! | 2    | Usage error (bad args, missing or unreadable file) |
//! | 3    | Invalid pipeline configuration                     |
//! | 4    | Input file could not be parsed                     |
//! | 5    | Pipeline run failed                                |
//! | 6    | Evaluation below the requested minimum             |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - output could not be written or serialized.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input file.
pub const EXIT_USAGE: u8 = 2;

/// Config TOML is malformed or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Text, model or gold-standard file is malformed.
pub const EXIT_INPUT_PARSE: u8 = 4;

/// The engine aborted the run (e.g. an unresolvable mapping merge).
pub const EXIT_PIPELINE: u8 = 5;

/// `holdback --min-f1` was not reached.
pub const EXIT_BELOW_MINIMUM: u8 = 6;
