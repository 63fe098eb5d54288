//! Interactive input: the only part of a launch that talks to the operator
//!
//! Questions are plain data ([question::Question]) asked in order by [collect::ask]. Adding an input
//! means adding a question to [question::experiment_questions].

pub mod question;
pub mod collect;
