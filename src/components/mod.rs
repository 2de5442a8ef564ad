/*
 * Kernel Components
 *
 * Higher-level building blocks assembled from the drivers and utils
 * layers below them.
 */

pub mod tty;
