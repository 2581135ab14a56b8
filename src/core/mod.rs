/*!
 * Core copy operations
 */

pub mod copy;
pub mod parallel;
pub mod plan;
pub mod progress;
pub mod transfer;
