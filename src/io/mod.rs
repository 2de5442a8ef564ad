/*
 * Low-Level I/O
 *
 * Port I/O primitives used by the serial and peripheral drivers.
 */

pub mod pio;

pub use pio::{Io, Pio, ReadOnly};
