/*!
 * Types and functions for working with disasters.
 *
 * A disaster describes the aggregate properties of a group of claim records that are judged to
 * belong to the same real-world event.
 */

pub use disaster::Disaster;
pub use time_span::TimeSpan;

mod disaster;
mod time_span;
